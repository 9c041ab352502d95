use crate::component::ComponentId;
use crate::host::NodeId;
use smartstring::alias::String as SmartString;
use thiserror::Error;

/// Failures reported by a [`HostAdapter`](crate::host::HostAdapter)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("Unknown host node {0:?}")]
    UnknownNode(NodeId),

    #[error("Host refused to create <{tag}>")]
    CreationRefused { tag: SmartString },

    #[error("Host rejected property '{name}'")]
    PropertyRejected { name: SmartString },
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Component {0:?} is not mounted")]
    Detached(ComponentId),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
