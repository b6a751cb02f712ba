use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::compose::{
    ComposedType, Composition, ExtensionBody, Instance, Members, MethodResult, Super, SuperBinding,
};

pub type PreComposeHook = Box<dyn FnOnce(&str)>;
pub type PostComposeHook = Box<dyn FnOnce(&Rc<ComposedType>)>;

/// One unit submitted to the [`ModuleManager`](super::ModuleManager).
pub struct ModuleDescriptor {
    pub name: String,
    pub requires: Vec<String>,
    pub extends: Option<String>,
    pub body: ExtensionBody,
    pub constants: BTreeMap<String, Value>,
    pub aliases: Vec<String>,
    pub decorated: bool,
    /// Overrides the policy implied by `decorated`.
    pub binding: Option<SuperBinding>,
    pub pre_compose: Option<PreComposeHook>,
    pub post_compose: Option<PostComposeHook>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            extends: None,
            body: ExtensionBody::default(),
            constants: BTreeMap::new(),
            aliases: Vec::new(),
            decorated: false,
            binding: None,
            pre_compose: None,
            post_compose: None,
        }
    }

    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.extends = Some(base.into());
        self
    }

    pub fn body(mut self, body: impl Into<ExtensionBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn factory<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Members + 'static,
    {
        self.body = ExtensionBody::factory(f);
        self
    }

    /// Add a default field. Ignored when the body is a factory.
    pub fn default_value(mut self, field: impl Into<String>, value: Value) -> Self {
        if let Some(members) = self.body.members_mut() {
            members.insert_default(field, value);
        }
        self
    }

    /// Add a method. Ignored when the body is a factory.
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Instance, &Super<'_>, &[Value]) -> MethodResult + 'static,
    {
        if let Some(members) = self.body.members_mut() {
            members.methods.insert(name.into(), Rc::new(f));
        }
        self
    }

    pub fn constant(mut self, name: impl Into<String>, value: Value) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn decorated(mut self) -> Self {
        self.decorated = true;
        self
    }

    pub fn binding(mut self, binding: SuperBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn on_pre_compose<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&str) + 'static,
    {
        self.pre_compose = Some(Box::new(f));
        self
    }

    pub fn on_post_compose<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Rc<ComposedType>) + 'static,
    {
        self.post_compose = Some(Box::new(f));
        self
    }

    /// Split off the parts the composer consumes.
    pub(crate) fn into_composition(self) -> (Composition, Option<PostComposeHook>) {
        let binding = self
            .binding
            .unwrap_or_else(|| SuperBinding::from_decorated(self.decorated));
        (
            Composition {
                name: self.name,
                extends: self.extends,
                body: self.body,
                constants: self.constants,
                aliases: self.aliases,
                binding,
            },
            self.post_compose,
        )
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("extends", &self.extends)
            .field("body", &self.body)
            .field("constants", &self.constants)
            .field("aliases", &self.aliases)
            .field("decorated", &self.decorated)
            .finish_non_exhaustive()
    }
}
