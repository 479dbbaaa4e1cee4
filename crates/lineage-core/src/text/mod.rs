//! Text units and tokenization

mod tokenizer;

pub use tokenizer::{is_word_char, words, Tokenizer, WordTokenizer, JOINERS};

use serde::{Deserialize, Serialize};

/// A string together with its token sequence
///
/// Built once through a [`Tokenizer`] and never mutated afterwards; a
/// transformation always produces a fresh `TextUnit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    text: String,
    tokens: Vec<String>,
}

impl TextUnit {
    pub fn new(text: impl Into<String>, tokenizer: &dyn Tokenizer) -> Self {
        let text = text.into();
        let tokens = tokenizer.tokenize(&text);
        Self { text, tokens }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl std::fmt::Display for TextUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
