//! Registry of replayable transformations
//!
//! Every module that defines a replayable transformation registers a
//! factory under its registry key at process start: `module::Class` for
//! transformation types, `module::function` for wrapped functions. Replay
//! resolves persisted descriptors through this table instead of loading
//! anything by name at runtime.

use lineage_core::errors::{LineageError, Result};
use lineage_core::{
    Batch, FnTransformation, Invocation, TransformIdentity, Transformation,
    TransformationDescriptor,
};
use std::collections::HashMap;

/// Builds a transformation from its persisted identity and constructor arguments
pub type TransformFactory = Box<dyn Fn(&TransformIdentity) -> Result<Box<dyn Transformation>>>;

#[derive(Default)]
pub struct TransformRegistry {
    factories: HashMap<String, TransformFactory>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `key`, replacing any previous entry
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&TransformIdentity) -> Result<Box<dyn Transformation>> + 'static,
    {
        self.factories.insert(key.into(), Box::new(factory));
        self
    }

    /// Register a plain function under `module::name` (or bare `name`)
    pub fn register_fn<F>(&mut self, module: Option<&str>, name: &str, f: F) -> &mut Self
    where
        F: Fn(Batch, &Invocation) -> Result<Batch> + Clone + 'static,
    {
        let key = TransformIdentity::function(module.map(str::to_string)).registry_key(name);
        let module = module.map(str::to_string);
        let name = name.to_string();
        self.register(key, move |_identity| {
            let transform: Box<dyn Transformation> = match &module {
                Some(m) => Box::new(FnTransformation::new(m.clone(), name.clone(), f.clone())),
                None => Box::new(FnTransformation::anonymous(name.clone(), f.clone())),
            };
            Ok(transform)
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Build a fresh transformation for `descriptor`
    ///
    /// # Errors
    ///
    /// `TransformNotFound` if nothing is registered under the descriptor's
    /// key; any error the factory raises.
    pub fn resolve(&self, descriptor: &TransformationDescriptor) -> Result<Box<dyn Transformation>> {
        let key = descriptor.registry_key();
        let factory = self
            .factories
            .get(&key)
            .ok_or(LineageError::TransformNotFound {
                key,
                transform_id: None,
                batch_id: None,
            })?;
        factory(&descriptor.identity())
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("TransformRegistry").field("keys", &keys).finish()
    }
}
