use thiserror::Error;

use crate::{NetworkId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WiredError {
    #[error("unknown wired node {0}")]
    UnknownNode(NodeId),
    #[error("unknown wired network {0}")]
    UnknownNetwork(NetworkId),
}

pub type Result<T> = std::result::Result<T, WiredError>;
