#![no_main]

use avl_tree::model::CursorEquivalenceInput;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: CursorEquivalenceInput| {
    avl_tree::model::run_cursor_equivalence(input.values, input.ops);
});
