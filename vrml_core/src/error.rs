use crate::InterfaceKind;
use thiserror::Error;
use vrml_field::{FieldError, FieldType};
use vrml_ids::NodeID;
use vrml_io::ResourceError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("interface \"{0}\" conflicts with an interface already in the set")]
    Duplicate(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("{node_type} has no {kind} \"{id}\"")]
    UnsupportedInterface {
        node_type: String,
        kind: InterfaceKind,
        id: String,
    },

    #[error("field type mismatch: expected {expected}, found {found}")]
    FieldTypeMismatch { expected: FieldType, found: FieldType },

    #[error("{node_type} does not allow {kind} \"{id}\" to be declared")]
    UnsupportedInterfaceKind {
        node_type: String,
        kind: InterfaceKind,
        id: String,
    },

    #[error("could not allocate a node")]
    AllocationFailure,

    #[error("node {0} has been shut down")]
    ShutDown(NodeID),

    #[error("no node {0}")]
    NoSuchNode(NodeID),

    #[error("no node class \"{0}\"")]
    NoSuchNodeClass(String),

    #[error(transparent)]
    Interface(#[from] InterfaceError),

    #[error(transparent)]
    Field(FieldError),
}

impl From<FieldError> for NodeError {
    fn from(err: FieldError) -> Self {
        match err {
            FieldError::TypeMismatch { expected, found } => {
                NodeError::FieldTypeMismatch { expected, found }
            }
            other => NodeError::Field(other),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("{url}:{line}:{column}: {message}")]
    InvalidVrml {
        url: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("unsupported media type \"{0}\"")]
    BadMediaType(String),

    #[error("no metadata \"{0}\"")]
    NoSuchMetadata(String),

    #[error("node {0} is already initialized")]
    NodeAlreadyInitialized(NodeID),

    #[error("the browser owning this scene is gone")]
    BrowserGone,

    #[error("could not start worker: {0}")]
    Worker(String),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Node(#[from] NodeError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("no script engine for any of: {}", .0.join(", "))]
    NoEngine(Vec<String>),

    #[error("could not load script engine module {path}: {reason}")]
    EngineLoad { path: String, reason: String },

    #[error("\"{0}\" is already claimed by another script engine")]
    AlreadyClaimed(String),

    #[error("directOutput is FALSE")]
    DirectOutputDisabled,

    #[error("script has no interface \"{0}\"")]
    NoSuchInterface(String),

    #[error("script engine error: {0}")]
    Engine(String),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("could not read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Parse(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrowserError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
