//! Type composition: single inheritance with explicit method layering.
//!
//! Every composed type keeps, per method name, the ordered chain of
//! implementations from the most-derived type down to the root. A running
//! method reaches the implementation it shadows through the [`Super`] handle it
//! is given, so there is no per-instance "current super" state to save and
//! restore.

mod instance;
mod members;

pub use instance::{Instance, Super};
pub use members::{ExtensionBody, Members, MethodFn, MethodResult};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::error::{CallError, ComposeError};
use crate::namespace::NamespaceRegistry;
use instance::Layer;

/// Default name of the designated initializer member.
pub const DEFAULT_INITIALIZER: &str = "init";

/// Which members of an extension may call the implementation they shadow.
/// The designated initializer is always bound.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SuperBinding {
    /// Only the initializer.
    #[default]
    Initializer,
    /// The initializer and every method that overrides an inherited one.
    Overrides,
    /// The initializer and the named members.
    Members(BTreeSet<String>),
}

impl SuperBinding {
    /// The policy selected by a descriptor's `decorated` flag.
    pub fn from_decorated(decorated: bool) -> Self {
        if decorated {
            SuperBinding::Overrides
        } else {
            SuperBinding::Initializer
        }
    }

    pub fn binds(&self, member: &str, initializer: &str, is_override: bool) -> bool {
        if member == initializer {
            return true;
        }
        match self {
            SuperBinding::Initializer => false,
            SuperBinding::Overrides => is_override,
            SuperBinding::Members(names) => names.contains(member),
        }
    }
}

/// A runtime type produced by [`TypeComposer`].
pub struct ComposedType {
    name: String,
    base: Option<Rc<ComposedType>>,
    initializer: String,
    defaults: BTreeMap<String, Value>,
    methods: BTreeMap<String, Vec<Layer>>,
    constants: BTreeMap<String, Value>,
    aliases: Vec<String>,
}

impl ComposedType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Rc<ComposedType>> {
        self.base.as_ref()
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn initializer(&self) -> &str {
        &self.initializer
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn constants(&self) -> &BTreeMap<String, Value> {
        &self.constants
    }

    /// Merged default field table (base defaults overlaid with this type's).
    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Owners of each implementation of `method`, most-derived first.
    pub fn method_owners(&self, method: &str) -> Vec<&str> {
        self.layers(method)
            .map(|layers| layers.iter().map(|l| &*l.owner).collect())
            .unwrap_or_default()
    }

    /// This type and its ancestors, most-derived first.
    pub fn lineage(&self) -> Vec<&str> {
        let mut out = vec![self.name()];
        let mut cursor = self.base.as_deref();
        while let Some(ty) = cursor {
            out.push(ty.name());
            cursor = ty.base.as_deref();
        }
        out
    }

    pub fn is_subtype_of(&self, name: &str) -> bool {
        self.lineage().contains(&name)
    }

    /// Build an instance: copy the default table, then run the initializer
    /// chain if the type has one.
    pub fn instantiate(self: &Rc<Self>, args: &[Value]) -> Result<Instance, CallError> {
        let mut instance = Instance::from_defaults(Rc::clone(self));
        if let Some(layers) = self.layers(&self.initializer) {
            instance::invoke(&self.initializer, layers, true, &mut instance, args)?;
        }
        Ok(instance)
    }

    pub(crate) fn layers(&self, method: &str) -> Option<&[Layer]> {
        self.methods.get(method).map(Vec::as_slice)
    }
}

impl fmt::Debug for ComposedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedType")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .field("defaults", &self.defaults)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("constants", &self.constants)
            .field("aliases", &self.aliases)
            .finish()
    }
}

/// Everything the composer needs from a descriptor.
#[derive(Debug, Default)]
pub struct Composition {
    pub name: String,
    pub extends: Option<String>,
    pub body: ExtensionBody,
    pub constants: BTreeMap<String, Value>,
    pub aliases: Vec<String>,
    pub binding: SuperBinding,
}

/// Builds [`ComposedType`]s.
#[derive(Clone, Debug)]
pub struct TypeComposer {
    initializer: String,
}

impl Default for TypeComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeComposer {
    pub fn new() -> Self {
        Self::with_initializer(DEFAULT_INITIALIZER)
    }

    pub fn with_initializer(initializer: impl Into<String>) -> Self {
        Self {
            initializer: initializer.into(),
        }
    }

    pub fn initializer(&self) -> &str {
        &self.initializer
    }

    /// Compose against the base named by `composition.extends`, looked up in
    /// `types`. Fails without running the body's factory if the base is absent.
    pub fn compose(
        &self,
        composition: Composition,
        types: &NamespaceRegistry<Rc<ComposedType>>,
    ) -> Result<Rc<ComposedType>, ComposeError> {
        let base = match composition.extends.as_deref() {
            None => None,
            Some(base) if base == composition.name => {
                return Err(ComposeError::SelfBase {
                    name: composition.name,
                })
            }
            Some(base) => match types.lookup(base) {
                Some(ty) => Some(Rc::clone(ty)),
                None => {
                    return Err(ComposeError::UnknownBase {
                        name: composition.name,
                        base: base.to_string(),
                    })
                }
            },
        };
        Ok(self.compose_with_base(base, composition))
    }

    /// Compose against an already resolved base.
    pub fn compose_with_base(
        &self,
        base: Option<Rc<ComposedType>>,
        composition: Composition,
    ) -> Rc<ComposedType> {
        let Composition {
            name,
            body,
            constants,
            aliases,
            binding,
            ..
        } = composition;
        let members = body.into_members();
        let owner: Rc<str> = Rc::from(name.as_str());

        let mut defaults = base
            .as_ref()
            .map(|b| b.defaults.clone())
            .unwrap_or_default();
        defaults.extend(members.defaults);

        let mut methods = base
            .as_ref()
            .map(|b| b.methods.clone())
            .unwrap_or_default();
        for (method, func) in members.methods {
            let inherited = methods.remove(&method).unwrap_or_default();
            let bound = binding.binds(&method, &self.initializer, !inherited.is_empty());
            let mut chain = Vec::with_capacity(inherited.len() + 1);
            chain.push(Layer {
                owner: Rc::clone(&owner),
                func,
                bound,
            });
            chain.extend(inherited);
            methods.insert(method, chain);
        }

        debug!(
            name = %name,
            base = base.as_ref().map(|b| b.name()).unwrap_or("-"),
            methods = methods.len(),
            "composed type"
        );

        Rc::new(ComposedType {
            name,
            base,
            initializer: self.initializer.clone(),
            defaults,
            methods,
            constants,
            aliases,
        })
    }
}

#[cfg(test)]
mod tests;
