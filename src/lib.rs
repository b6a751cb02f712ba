//! MoMa: incremental module resolution and single-inheritance type
//! composition.
//!
//! Units are described by [`ModuleDescriptor`]s and handed to a
//! [`ModuleManager`]. The manager composes each one into a [`ComposedType`]
//! as soon as everything it requires has been composed, asks the host for
//! resources that should provide missing names, and tells listeners when the
//! whole graph has settled.

pub mod compose;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod loader;
pub mod namespace;
pub mod resolve;
pub mod runtime;
pub mod span;

pub use compose::{
    ComposedType, ExtensionBody, Instance, Members, MethodResult, Super, SuperBinding,
    TypeComposer,
};
pub use config::{Config, PathPolicy};
pub use error::{CallError, ComposeError, LoadError, NamespaceError, ResolveError};
pub use loader::{FsLoader, ResourceLoader};
pub use namespace::NamespaceRegistry;
pub use resolve::{ModuleDescriptor, ModuleManager, Phase};
pub use runtime::drive;
