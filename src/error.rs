use crate::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// extract-max on a heap holding no nodes
    Empty,
    /// the requested priority does not strictly exceed the current one
    InvalidPriority { current: Priority, requested: Priority },
    /// the key does not name a node owned by this heap
    NodeNotFound,
}

impl std::fmt::Display for HeapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "no nodes in the heap"),
            Self::InvalidPriority { current, requested } => write!(
                f,
                "cannot increase priority from {} to {}",
                current, requested
            ),
            Self::NodeNotFound => write!(f, "node is not owned by this heap"),
        }
    }
}

impl std::error::Error for HeapError {}
