use lineage_core::errors::{ExError, ExErrorKind, Result};
use lineage_core::rng::{seeded, RngHandle, TransformRng};
use lineage_core::{
    Batch, Invocation, Label, LineageRecord, ProvenanceSink, TransformIdentity,
    TransformationDescriptor, Transformation,
};
use rand::Rng;

/// Appends `chars_to_append` repeated `char_multiplier` times and bumps class targets
#[allow(dead_code)]
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

/// Drops one random word per text
#[allow(dead_code)]
pub struct DropWord {
    pub rng: TransformRng,
}

#[allow(dead_code)]
impl DropWord {
    pub fn new(seed: u64) -> Self {
        Self { rng: seeded(seed) }
    }
}

impl Transformation for DropWord {
    fn describe(&self) -> TransformIdentity {
        TransformIdentity::class("tests", "DropWord")
    }

    fn is_stochastic(&self, method: &str) -> bool {
        method == "drop_word"
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
            .map(|text| {
                let words: Vec<&str> = text.split(' ').collect();
                let skip = self.rng.gen_range(0..words.len());
                words
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != skip)
                    .map(|(_, w)| *w)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        Ok(Batch {
            texts,
            targets: batch.targets,
        })
    }
}

/// Returns one fewer output than it was given
#[allow(dead_code)]
pub struct Truncating;

impl Transformation for Truncating {
    fn describe(&self) -> TransformIdentity {
        TransformIdentity::class("tests", "Truncating")
    }

    fn invoke(&mut self, mut batch: Batch, _call: &Invocation) -> Result<Batch> {
        batch.texts.pop();
        batch.targets.pop();
        Ok(batch)
    }
}

/// Sink that keeps everything it is told in memory
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingSink {
    pub logged: Vec<(String, String)>,
    pub originals: Vec<(String, Option<Label>)>,
    pub histories: Vec<Vec<TransformationDescriptor>>,
    pub flushes: Vec<bool>,
    pub fail_flush: bool,
    pub fail_log: bool,
    pub fail_history: bool,
}

impl ProvenanceSink for RecordingSink {
    fn log(&mut self, input: &LineageRecord, output: &LineageRecord) -> std::result::Result<(), ExError> {
        self.logged.push((
            input.text().text().to_string(),
            output.text().text().to_string(),
        ));
        if self.fail_log {
            return Err(ExError::new(ExErrorKind::Io)
                .with_op("log")
                .with_message("audit log unavailable"));
        }
        Ok(())
    }

    fn log_original(&mut self, text: &str, target: Option<&Label>) -> std::result::Result<(), ExError> {
        self.originals.push((text.to_string(), target.cloned()));
        Ok(())
    }

    fn log_transform_prov(
        &mut self,
        entries: &[TransformationDescriptor],
    ) -> std::result::Result<(), ExError> {
        self.histories.push(entries.to_vec());
        if self.fail_history {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("log_transform_prov")
                .with_message("history refused"));
        }
        Ok(())
    }

    fn flush(&mut self, force: bool) -> std::result::Result<(), ExError> {
        self.flushes.push(force);
        if self.fail_flush {
            return Err(ExError::new(ExErrorKind::FlushFailure)
                .with_op("flush")
                .with_message("disk full"));
        }
        Ok(())
    }
}
