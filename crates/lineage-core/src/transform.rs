//! Transformation capability interface
//!
//! Every transformation that should be loggable and replayable implements
//! [`Transformation`]: it describes its own identity and constructor
//! arguments, optionally exposes its RNG, and is invoked on a whole batch.
//! Plain functions are wrapped with [`FnTransformation`].

use crate::errors::{LineageError, Result};
use crate::label::Label;
use crate::rng::RngHandle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parallel texts and targets handed to a transformation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    pub texts: Vec<String>,
    pub targets: Vec<Option<Label>>,
}

impl Batch {
    /// # Errors
    ///
    /// `InvalidInput` if the two columns differ in length.
    pub fn new(texts: Vec<String>, targets: Vec<Option<Label>>) -> Result<Self> {
        if texts.len() != targets.len() {
            return Err(LineageError::InvalidInput {
                reason: format!("{} texts but {} targets", texts.len(), targets.len()),
            });
        }
        Ok(Self { texts, targets })
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(String, Option<Label>)> {
        self.texts.into_iter().zip(self.targets).collect()
    }
}

impl FromIterator<(String, Option<Label>)> for Batch {
    fn from_iter<I: IntoIterator<Item = (String, Option<Label>)>>(iter: I) -> Self {
        let (texts, targets) = iter.into_iter().unzip();
        Self { texts, targets }
    }
}

/// Convert an argument for a descriptor, degrading to its `Debug` form
///
/// Serialization failures are recovered here: the descriptor always builds,
/// at reduced replay fidelity for that argument.
pub fn to_arg_value<T>(value: &T) -> Value
where
    T: Serialize + std::fmt::Debug + ?Sized,
{
    serde_json::to_value(value).unwrap_or_else(|err| {
        tracing::warn!(
            component = module_path!(),
            error = %err,
            "argument is not serializable; storing debug representation"
        );
        Value::String(format!("{:?}", value))
    })
}

/// Who a transformation is and how it was constructed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformIdentity {
    pub module_name: Option<String>,
    pub class_name: Option<String>,
    pub class_args: Vec<Value>,
    pub class_kwargs: BTreeMap<String, Value>,
}

impl TransformIdentity {
    pub fn class(module: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            module_name: Some(module.into()),
            class_name: Some(class.into()),
            ..Self::default()
        }
    }

    pub fn function(module: Option<String>) -> Self {
        Self {
            module_name: module,
            ..Self::default()
        }
    }

    pub fn arg<T: Serialize + std::fmt::Debug + ?Sized>(mut self, value: &T) -> Self {
        self.class_args.push(to_arg_value(value));
        self
    }

    pub fn kwarg<T: Serialize + std::fmt::Debug + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Self {
        self.class_kwargs.insert(name.into(), to_arg_value(value));
        self
    }

    /// Registry lookup key: `module::class`, or `module::callable` for functions
    pub fn registry_key(&self, callable: &str) -> String {
        match (&self.module_name, &self.class_name) {
            (Some(m), Some(c)) => format!("{}::{}", m, c),
            (None, Some(c)) => c.clone(),
            (Some(m), None) => format!("{}::{}", m, callable),
            (None, None) => callable.to_string(),
        }
    }
}

/// The method invoked and its non-batch arguments
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Invocation {
    pub method: String,
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

impl Invocation {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn arg<T: Serialize + std::fmt::Debug + ?Sized>(mut self, value: &T) -> Self {
        self.args.push(to_arg_value(value));
        self
    }

    pub fn kwarg<T: Serialize + std::fmt::Debug + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Self {
        self.kwargs.insert(name.into(), to_arg_value(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }
}

/// A batch transformation that can be logged and replayed
pub trait Transformation {
    /// Module, class and constructor arguments; enough for a registry
    /// factory to rebuild an equivalent instance
    fn describe(&self) -> TransformIdentity;

    /// Whether `method` draws from the transformation's RNG
    fn is_stochastic(&self, _method: &str) -> bool {
        false
    }

    /// The generator whose state is captured before each call
    fn rng_handle(&mut self) -> Option<RngHandle<'_>> {
        None
    }

    /// Run `call.method` over the batch
    ///
    /// # Errors
    ///
    /// Any error the transformation raises; it aborts the surrounding apply.
    fn invoke(&mut self, batch: Batch, call: &Invocation) -> Result<Batch>;
}

impl<T: Transformation + ?Sized> Transformation for Box<T> {
    fn describe(&self) -> TransformIdentity {
        (**self).describe()
    }

    fn is_stochastic(&self, method: &str) -> bool {
        (**self).is_stochastic(method)
    }

    fn rng_handle(&mut self) -> Option<RngHandle<'_>> {
        (**self).rng_handle()
    }

    fn invoke(&mut self, batch: Batch, call: &Invocation) -> Result<Batch> {
        (**self).invoke(batch, call)
    }
}

/// Adapter turning a plain function into a [`Transformation`]
///
/// Identity is `(module, None)`; [`FnTransformation::anonymous`] has no
/// module at all and can only be replayed if registered under its bare name.
pub struct FnTransformation<F> {
    module: Option<String>,
    name: String,
    f: F,
}

impl<F> FnTransformation<F>
where
    F: FnMut(Batch, &Invocation) -> Result<Batch>,
{
    pub fn new(module: impl Into<String>, name: impl Into<String>, f: F) -> Self {
        Self {
            module: Some(module.into()),
            name: name.into(),
            f,
        }
    }

    pub fn anonymous(name: impl Into<String>, f: F) -> Self {
        Self {
            module: None,
            name: name.into(),
            f,
        }
    }

    /// An invocation naming this function
    pub fn invocation(&self) -> Invocation {
        Invocation::new(self.name.clone())
    }
}

impl<F> Transformation for FnTransformation<F>
where
    F: FnMut(Batch, &Invocation) -> Result<Batch>,
{
    fn describe(&self) -> TransformIdentity {
        TransformIdentity::function(self.module.clone())
    }

    fn invoke(&mut self, batch: Batch, call: &Invocation) -> Result<Batch> {
        (self.f)(batch, call)
    }
}
