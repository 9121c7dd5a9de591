extern crate std;

use core::ptr::NonNull;
use std::{collections::VecDeque, fmt, prelude::v1::*};

use crate::{node::Node, AvlTree};

impl<K, V> AvlTree<K, V>
where
    K: fmt::Display,
{
    /// Writes the tree to `w` as a Graphviz digraph, one rank per level.
    ///
    /// Each node is labelled `key:height`; absent children are drawn as points.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
    {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<K, V> {
            Node(NonNull<Node<K, V>>),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut missing = 0;
        let mut links = String::new();

        while !queue.is_empty() {
            use fmt::Write;

            write!(w, "{{rank=same; ")?;

            for _rank_node in 0..queue.len() {
                let node = match queue.pop_front() {
                    Some(Item::Node(node)) => node,
                    Some(Item::Missing(id)) => {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                    None => break,
                };

                let key = unsafe { &node.as_ref().key };
                let height = unsafe { self.links(node).height() };
                write!(w, "\"graph{name}-{key}\" [label=\"{key}:{height}\"]; ")?;

                for child in unsafe { [self.links(node).left(), self.links(node).right()] } {
                    match child {
                        Some(child) => {
                            let child_key = unsafe { &child.as_ref().key };

                            queue.push_back(Item::Node(child));
                            writeln!(
                                links,
                                "\"graph{name}-{key}\" -> \"graph{name}-{child_key}\";"
                            )?;
                        }

                        None => {
                            queue.push_back(Item::Missing(missing));
                            writeln!(
                                links,
                                "\"graph{name}-{key}\" -> \"graph{name}-missing{missing}\";"
                            )?;
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&links)?;

        w.write_str(" }\n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph() {
        let tree: AvlTree<u32, ()> = AvlTree::new();
        let mut out = String::new();

        tree.dotgraph("empty", &mut out).unwrap();

        assert_eq!(out, "digraph \"graph-empty\" {}");
    }

    #[test]
    fn labels_keys_with_heights() {
        let tree: AvlTree<u32, ()> = [(10, ()), (20, ()), (30, ())].into_iter().collect();
        let mut out = String::new();

        tree.dotgraph("t", &mut out).unwrap();

        assert!(out.contains("\"grapht-20\" [label=\"20:1\"]"));
        assert!(out.contains("\"grapht-10\" [label=\"10:0\"]"));
        assert!(out.contains("\"grapht-20\" -> \"grapht-30\";"));
        assert_eq!(out.matches("[shape=point]").count(), 4);
    }
}
