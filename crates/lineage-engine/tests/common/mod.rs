use lineage_core::errors::{LineageError, Result};
use lineage_core::rng::{seeded, RngHandle, TransformRng};
use lineage_core::{
    Batch, BatchSession, Invocation, Label, RecordArena, TransformIdentity, Transformation,
    WordTokenizer,
};
use lineage_engine::TransformRegistry;
use lineage_store::ProvenanceStore;
use rand::Rng;

/// Appends `chars_to_append` repeated `char_multiplier` times and bumps class targets
pub struct AppendChars {
    pub chars_to_append: String,
}

#[allow(dead_code)]
impl AppendChars {
    pub fn new(chars: &str) -> Self {
        Self {
            chars_to_append: chars.to_string(),
        }
    }

    pub fn call(multiplier: u64) -> Invocation {
        Invocation::new("transform_batch").kwarg("char_multiplier", &multiplier)
    }
}

impl Transformation for AppendChars {
    fn describe(&self) -> TransformIdentity {
        TransformIdentity::class("tests", "AppendChars")
            .kwarg("chars_to_append", &self.chars_to_append)
    }

    fn invoke(&mut self, batch: Batch, call: &Invocation) -> Result<Batch> {
        let n = call
            .get("char_multiplier")
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as usize;
        let suffix = self.chars_to_append.repeat(n);
        Ok(batch
            .into_pairs()
            .into_iter()
            .map(|(text, target)| {
                let target = target.map(|t| match t {
                    Label::Class(c) => Label::Class(c + 1),
                    other => other,
                });
                (format!("{}{}", text, suffix), target)
            })
            .collect())
    }
}

/// Appends one random digit per text
pub struct RandomDigit {
    pub rng: TransformRng,
}

#[allow(dead_code)]
impl RandomDigit {
    pub fn new(seed: u64) -> Self {
        Self { rng: seeded(seed) }
    }
}

impl Transformation for RandomDigit {
    fn describe(&self) -> TransformIdentity {
        TransformIdentity::class("tests", "RandomDigit")
    }

    fn is_stochastic(&self, _method: &str) -> bool {
        true
    }

    fn rng_handle(&mut self) -> Option<RngHandle<'_>> {
        Some(RngHandle {
            attr: "rng",
            rng: &mut self.rng,
        })
    }

    fn invoke(&mut self, batch: Batch, _call: &Invocation) -> Result<Batch> {
        let texts = batch
            .texts
            .iter()
            .map(|t| format!("{}{}", t, self.rng.gen_range(0..10)))
            .collect();
        Ok(Batch {
            texts,
            targets: batch.targets,
        })
    }
}

/// Registry for the test transformations
///
/// `RandomDigit` is rebuilt from `replay_seed`, so replay only matches the
/// original run if the recorded RNG state is restored.
#[allow(dead_code)]
pub fn registry(replay_seed: u64) -> TransformRegistry {
    let mut registry = TransformRegistry::new();
    registry.register("tests::AppendChars", |identity: &TransformIdentity| {
        let chars = identity
            .class_kwargs
            .get("chars_to_append")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LineageError::corrupt("AppendChars without chars_to_append"))?;
        let t: Box<dyn Transformation> = Box::new(AppendChars::new(chars));
        Ok(t)
    });
    registry.register("tests::RandomDigit", move |_: &TransformIdentity| {
        let t: Box<dyn Transformation> = Box::new(RandomDigit::new(replay_seed));
        Ok(t)
    });
    registry
}

#[allow(dead_code)]
pub fn inputs(texts: &[(&str, i64)]) -> Vec<(String, Option<Label>)> {
    texts
        .iter()
        .map(|(t, l)| (t.to_string(), Some(Label::Class(*l))))
        .collect()
}

/// One closed session applying `AppendChars("?")` once per multiplier; returns the final pairs
#[allow(dead_code)]
pub fn run_append_session(
    store: &mut dyn ProvenanceStore,
    texts: &[(&str, i64)],
    multipliers: &[u64],
) -> Vec<(String, Option<Label>)> {
    let mut t = AppendChars::new("?");
    let mut arena = RecordArena::new();
    let ids = {
        let mut session =
            BatchSession::open(&mut arena, store.as_sink(), &WordTokenizer, inputs(texts)).unwrap();
        for &n in multipliers {
            session.apply(&mut t, &AppendChars::call(n)).unwrap();
        }
        session.close().unwrap()
    };
    ids.iter()
        .map(|&id| {
            let r = arena.get(id).unwrap();
            (r.text().text().to_string(), r.target().cloned())
        })
        .collect()
}
