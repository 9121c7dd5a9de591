/// Errors returned by cursor accessors.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The cursor is at the end position, which holds no element.
    #[error("cursor is positioned at the end of the tree")]
    OutOfRange,
}
