//! Canonical transformation descriptors
//!
//! A descriptor is everything needed to rebuild and re-run one transformation
//! call: identity, constructor arguments, the RNG attribute and its state
//! before the call, the method name and its arguments.

use crate::errors::Result;
use crate::rng::RngState;
use crate::transform::{Invocation, TransformIdentity, Transformation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationDescriptor {
    pub module_name: Option<String>,
    pub class_name: Option<String>,
    #[serde(default)]
    pub class_args: Vec<Value>,
    #[serde(default)]
    pub class_kwargs: BTreeMap<String, Value>,
    pub class_rng_attr: Option<String>,
    pub rng_state: Option<RngState>,
    pub callable_name: String,
    #[serde(default)]
    pub callable_args: Vec<Value>,
    #[serde(default)]
    pub callable_kwargs: BTreeMap<String, Value>,
    #[serde(default)]
    pub callable_is_stochastic: bool,
}

impl TransformationDescriptor {
    /// Describe `call` on `transform`, snapshotting its RNG as it is right now
    ///
    /// Must run before the transformation is invoked so the snapshot is the
    /// pre-call state shared by the whole batch.
    pub fn capture(transform: &mut dyn Transformation, call: &Invocation) -> Self {
        let identity = transform.describe();
        let callable_is_stochastic = transform.is_stochastic(&call.method);
        let (class_rng_attr, rng_state) = match transform.rng_handle() {
            Some(handle) => (
                Some(handle.attr.to_string()),
                Some(RngState::capture(handle.rng)),
            ),
            None => (None, None),
        };

        Self {
            module_name: identity.module_name,
            class_name: identity.class_name,
            class_args: identity.class_args,
            class_kwargs: identity.class_kwargs,
            class_rng_attr,
            rng_state,
            callable_name: call.method.clone(),
            callable_args: call.args.clone(),
            callable_kwargs: call.kwargs.clone(),
            callable_is_stochastic,
        }
    }

    pub fn identity(&self) -> TransformIdentity {
        TransformIdentity {
            module_name: self.module_name.clone(),
            class_name: self.class_name.clone(),
            class_args: self.class_args.clone(),
            class_kwargs: self.class_kwargs.clone(),
        }
    }

    pub fn invocation(&self) -> Invocation {
        Invocation {
            method: self.callable_name.clone(),
            args: self.callable_args.clone(),
            kwargs: self.callable_kwargs.clone(),
        }
    }

    pub fn registry_key(&self) -> String {
        self.identity().registry_key(&self.callable_name)
    }

    /// Same descriptor with the volatile RNG state removed
    pub fn definition(&self) -> Self {
        Self {
            rng_state: None,
            ..self.clone()
        }
    }

    /// Canonical JSON of the full descriptor
    ///
    /// Object keys inside argument values are sorted, so equal descriptors
    /// always produce byte-identical JSON.
    ///
    /// # Errors
    ///
    /// `Serialization` if JSON encoding fails.
    pub fn canonical(&self) -> Result<CanonicalDescriptor> {
        Ok(CanonicalDescriptor(serde_json::to_string(self)?))
    }

    /// Canonical JSON without RNG state; the de-duplication key
    ///
    /// # Errors
    ///
    /// `Serialization` if JSON encoding fails.
    pub fn definition_key(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.definition())?)
    }

    /// SHA-256 hex digest of [`definition_key`](Self::definition_key)
    ///
    /// # Errors
    ///
    /// `Serialization` if JSON encoding fails.
    pub fn definition_digest(&self) -> Result<String> {
        let key = self.definition_key()?;
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Canonical JSON text of a descriptor, the payload of transformation provenance
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalDescriptor(String);

impl CanonicalDescriptor {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// # Errors
    ///
    /// `Serialization` if the text is not a descriptor.
    pub fn parse(&self) -> Result<TransformationDescriptor> {
        Ok(serde_json::from_str(&self.0)?)
    }
}

impl std::fmt::Display for CanonicalDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
