use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::instance::{Instance, Super};
use crate::error::CallError;

pub type MethodResult = Result<Value, CallError>;

/// A method body. Receives the instance, a handle to the implementation it
/// shadows, and the call arguments.
pub type MethodFn = Rc<dyn Fn(&mut Instance, &Super<'_>, &[Value]) -> MethodResult>;

/// The member map an extension contributes: default field values and methods.
#[derive(Clone, Default)]
pub struct Members {
    pub(crate) defaults: BTreeMap<String, Value>,
    pub(crate) methods: BTreeMap<String, MethodFn>,
}

impl Members {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, field: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(field.into(), value);
        self
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Instance, &Super<'_>, &[Value]) -> MethodResult + 'static,
    {
        self.methods.insert(name.into(), Rc::new(f));
        self
    }

    pub fn insert_default(&mut self, field: impl Into<String>, value: Value) {
        self.defaults.insert(field.into(), value);
    }

    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty() && self.methods.is_empty()
    }
}

impl fmt::Debug for Members {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Members")
            .field("defaults", &self.defaults)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Either a ready member map or a factory invoked once at composition time.
pub enum ExtensionBody {
    Members(Members),
    Factory(Box<dyn FnOnce() -> Members>),
}

impl ExtensionBody {
    pub fn factory<F>(f: F) -> Self
    where
        F: FnOnce() -> Members + 'static,
    {
        ExtensionBody::Factory(Box::new(f))
    }

    /// Produce the member map, running the factory if there is one.
    pub fn into_members(self) -> Members {
        match self {
            ExtensionBody::Members(members) => members,
            ExtensionBody::Factory(factory) => factory(),
        }
    }

    /// Mutable access to an eager member map. Factories are left untouched.
    pub(crate) fn members_mut(&mut self) -> Option<&mut Members> {
        match self {
            ExtensionBody::Members(members) => Some(members),
            ExtensionBody::Factory(_) => None,
        }
    }
}

impl Default for ExtensionBody {
    fn default() -> Self {
        ExtensionBody::Members(Members::default())
    }
}

impl From<Members> for ExtensionBody {
    fn from(members: Members) -> Self {
        ExtensionBody::Members(members)
    }
}

impl fmt::Debug for ExtensionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionBody::Members(members) => members.fmt(f),
            ExtensionBody::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}
