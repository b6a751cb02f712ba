use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while invoking a method on an [`Instance`](crate::compose::Instance).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("type '{ty}' has no method '{method}'")]
    UnknownMethod { ty: String, method: String },

    #[error("'{method}' has no shadowed implementation to call")]
    NoSuperMethod { method: String },

    #[error("'{method}' on '{owner}' is not super-bound")]
    SuperUnbound { owner: String, method: String },

    #[error("bad arguments to '{method}': {reason}")]
    BadArguments { method: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

impl CallError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn bad_arguments(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadArguments {
            method: method.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from building a composed type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("'{name}' extends '{base}', which has not been composed")]
    UnknownBase { name: String, base: String },

    #[error("'{name}' extends itself")]
    SelfBase { name: String },
}

/// Errors from the dotted-name namespace tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("cannot assign '{name}': namespace segment '{missing}' does not exist")]
    MissingSegment { name: String, missing: String },

    #[error("'{0}' is not a valid qualified name")]
    InvalidName(String),

    #[error("'{0}' is already bound")]
    Occupied(String),
}

/// Errors produced by a [`ResourceLoader`](crate::loader::ResourceLoader).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("cannot read '{}': {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("invalid manifest '{}': {reason}", .path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("no resource at '{}'", .0.display())]
    NotFound(PathBuf),
}

impl LoadError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            LoadError::Read { path, .. } | LoadError::Manifest { path, .. } => path,
            LoadError::NotFound(path) => path,
        }
    }
}

/// Conditions recorded by the module manager. None of these are raised to the
/// caller of `register`; they are kept for introspection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("composition of '{name}' abandoned: {source}")]
    Compose {
        name: String,
        #[source]
        source: ComposeError,
    },

    #[error("could not bind '{name}': {source}")]
    Namespace {
        name: String,
        #[source]
        source: NamespaceError,
    },

    #[error("circular dependency: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    #[error("resource for '{origin}' failed: {source}")]
    ResourceFailed {
        origin: String,
        #[source]
        source: LoadError,
    },
}
