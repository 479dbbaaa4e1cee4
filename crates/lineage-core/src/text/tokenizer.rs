//! Word-boundary tokenizer
//!
//! Splits a string into alternating word and non-word tokens. Word tokens are
//! runs of alphanumerics (plus a fixed set of homoglyphs) that may continue
//! through the joiners `'-_*@` once started. Everything between words is kept
//! verbatim as a single non-word token, so joining the tokens reproduces the
//! input exactly.

/// Characters allowed inside a word, but never at its start
pub const JOINERS: &[char] = &['\'', '-', '_', '*', '@'];

/// Visually confusable characters treated as word characters
const HOMOGLYPHS: &[char] = &[
    '˗', '৭', 'Ȣ', '𝟕', 'б', 'Ƽ', 'Ꮞ', 'Ʒ', 'ᒿ', 'l', 'O', '`', 'ɑ', 'Ь', 'ϲ', 'ԁ', 'е', '𝚏', 'ɡ',
    'հ', 'і', 'ϳ', '𝒌', 'ⅼ', 'ｍ', 'ո', 'о', 'р', 'ԛ', 'ⲅ', 'ѕ', '𝚝', 'ս', 'ѵ', 'ԝ', '×', 'у',
    'ᴢ',
];

/// Splits text into tokens
///
/// Diffing and replay must use the same tokenizer for spans to line up.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Default lossless word/non-word tokenizer
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        scan(text).into_iter().map(|(_, token)| token).collect()
    }
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn tokenize(&self, text: &str) -> Vec<String> {
        self(text)
    }
}

/// Whether `c` can start or continue a word
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || HOMOGLYPHS.contains(&c)
}

/// Only the word tokens of `text`
pub fn words(text: &str) -> Vec<String> {
    scan(text)
        .into_iter()
        .filter_map(|(is_word, token)| is_word.then_some(token))
        .collect()
}

fn scan(text: &str) -> Vec<(bool, String)> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut gap = String::new();

    for c in text.chars() {
        if is_word_char(c) || (!word.is_empty() && JOINERS.contains(&c)) {
            if !gap.is_empty() {
                tokens.push((false, std::mem::take(&mut gap)));
            }
            word.push(c);
        } else {
            if !word.is_empty() {
                tokens.push((true, std::mem::take(&mut word)));
            }
            gap.push(c);
        }
    }
    if !word.is_empty() {
        tokens.push((true, word));
    }
    if !gap.is_empty() {
        tokens.push((false, gap));
    }
    tokens
}
