use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::members::{MethodFn, MethodResult};
use super::ComposedType;
use crate::error::CallError;

/// One implementation of a method in a type's chain.
#[derive(Clone)]
pub(crate) struct Layer {
    pub(crate) owner: Rc<str>,
    pub(crate) func: MethodFn,
    /// Whether this layer may call the implementation it shadows.
    pub(crate) bound: bool,
}

/// Handle to the next layer of a method chain, passed to every method body.
pub struct Super<'a> {
    method: &'a str,
    owner: &'a str,
    rest: &'a [Layer],
    bound: bool,
    initializer: bool,
}

impl Super<'_> {
    /// Run the shadowed implementation.
    ///
    /// At the end of the initializer chain this is a no-op returning `Null`;
    /// for any other method it is `CallError::NoSuperMethod`.
    pub fn call(&self, this: &mut Instance, args: &[Value]) -> MethodResult {
        if !self.bound {
            return Err(CallError::SuperUnbound {
                owner: self.owner.to_string(),
                method: self.method.to_string(),
            });
        }
        invoke(self.method, self.rest, self.initializer, this, args)
    }

    /// True if calling would reach another implementation.
    pub fn exists(&self) -> bool {
        self.bound && !self.rest.is_empty()
    }

    /// Name of the type that defined the currently running layer.
    pub fn owner(&self) -> &str {
        self.owner
    }
}

pub(crate) fn invoke(
    method: &str,
    layers: &[Layer],
    initializer: bool,
    this: &mut Instance,
    args: &[Value],
) -> MethodResult {
    match layers.split_first() {
        None if initializer => Ok(Value::Null),
        None => Err(CallError::NoSuperMethod {
            method: method.to_string(),
        }),
        Some((head, rest)) => {
            let next = Super {
                method,
                owner: &head.owner,
                rest,
                bound: head.bound,
                initializer,
            };
            (head.func)(this, &next, args)
        }
    }
}

/// A live object of a composed type.
pub struct Instance {
    ty: Rc<ComposedType>,
    fields: BTreeMap<String, Value>,
}

impl Instance {
    pub(crate) fn from_defaults(ty: Rc<ComposedType>) -> Self {
        let fields = ty.defaults().clone();
        Self { ty, fields }
    }

    pub fn ty(&self) -> &Rc<ComposedType> {
        &self.ty
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Invoke `method`, starting at the most-derived implementation.
    pub fn call(&mut self, method: &str, args: &[Value]) -> MethodResult {
        let ty = Rc::clone(&self.ty);
        let layers = ty.layers(method).ok_or_else(|| CallError::UnknownMethod {
            ty: ty.name().to_string(),
            method: method.to_string(),
        })?;
        invoke(method, layers, method == ty.initializer(), self, args)
    }

    /// True if this instance's type is `name` or inherits from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.ty.is_subtype_of(name)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("ty", &self.ty.name())
            .field("fields", &self.fields)
            .finish()
    }
}
