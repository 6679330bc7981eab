//! Shared types that mirror the KBBI asset bundle format.
//!
//! The asset bundle is a JSON document of the shape `{ stats, lemmas[] }`.
//! Every lemma carries its entries (senses) in dictionary order, and the
//! position of a lemma within `lemmas` is meaningful: daily rotation tables
//! refer to lemmas by that position.
//!
//! All list and text fields default to empty when missing, so a sparse
//! record such as `{"entry": "apel (1)"}` still deserializes into a complete
//! [`Entry`].
//!
//! ```rust
//! use kbbi_types::Lemma;
//!
//! let lemma: Lemma = serde_json::from_str(
//!     r#"{"lemma": "apel", "entries": [{"entry": "apel (1)"}]}"#,
//! ).unwrap();
//! assert_eq!(lemma.entries[0].entry, "apel (1)");
//! assert!(lemma.entries[0].definitions.is_empty());
//! ```

use serde::{Deserialize, Serialize};

/// A headword together with all of its entries.
///
/// E.g. lemma `apel` holds the entries `apel (1)` and `apel (2)`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lemma {
    pub lemma: String,
    pub entries: Vec<Entry>,
}

/// One sense record of a lemma.
///
/// `entry` is the display text of the sense and may end with a sense-number
/// suffix such as `apel (2)`. The remaining fields are carried through
/// untouched.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Entry {
    pub entry: String,
    /// Root word (`kata dasar`), e.g. `suka` for `menyukai`.
    pub base_word: String,
    /// Alternative ways the entry can be referred to. A variant may have no
    /// lemma of its own.
    pub entry_variants: Vec<String>,
    pub pronunciation: String,
    pub definitions: Vec<EntryDefinition>,
    /// Non-standard forms (`bentuk tidak baku`).
    pub non_standard_words: Vec<String>,
    /// Alternative words (`varian`); each one has a lemma in the dictionary.
    #[serde(rename = "variants")]
    pub word_variants: Vec<String>,
    pub compound_words: Vec<String>,
    pub derived_words: Vec<String>,
    pub proverbs: Vec<String>,
    pub metaphors: Vec<String>,
}

/// One meaning of an entry.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntryDefinition {
    pub definition: String,
    /// Lemma this definition points at, for `lihat ...` style definitions.
    pub referenced_lemma: String,
    pub labels: Vec<EntryLabel>,
    pub usage_examples: Vec<String>,
}

/// Label attached to a definition, e.g. `n` / `nomina` / `Kelas Kata`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryLabel {
    pub code: String,
    pub name: String,
    pub kind: String,
}

/// Summary block shipped with the asset bundle.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Stats {
    pub edition: String,
    pub entry_count: u64,
    pub lemma_count: u64,
}

/// Deserialized dictionary asset. `lemmas` keeps the on-disk order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetBundle {
    pub stats: Stats,
    pub lemmas: Vec<Lemma>,
}

impl Lemma {
    /// Convenience constructor used by tooling and tests.
    pub fn new(lemma: impl Into<String>, entries: Vec<Entry>) -> Self {
        Self {
            lemma: lemma.into(),
            entries,
        }
    }
}

impl Entry {
    /// An entry with only its display text set.
    pub fn titled(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_fields() {
        let raw = r#"{
            "stats": {"edition": "VI", "entryCount": 3, "lemmaCount": 2},
            "lemmas": [{
                "lemma": "suka",
                "entries": [{
                    "entry": "suka",
                    "baseWord": "",
                    "variants": ["soka"],
                    "nonStandardWords": ["seka"],
                    "definitions": [{
                        "definition": "mudah sekali",
                        "labels": [{"code": "a", "name": "adjektiva", "kind": "Kelas Kata"}],
                        "usageExamples": ["memang dia -- lupa"]
                    }]
                }]
            }]
        }"#;
        let bundle: AssetBundle = serde_json::from_str(raw).unwrap();
        assert_eq!(bundle.stats.edition, "VI");
        assert_eq!(bundle.stats.lemma_count, 2);
        let entry = &bundle.lemmas[0].entries[0];
        assert_eq!(entry.word_variants, vec!["soka"]);
        assert_eq!(entry.non_standard_words, vec!["seka"]);
        assert_eq!(entry.definitions[0].labels[0].kind, "Kelas Kata");
        assert!(entry.proverbs.is_empty());
    }

    #[test]
    fn serializes_every_field() {
        let value = serde_json::to_value(Entry::titled("apel (1)")).unwrap();
        assert_eq!(value["entry"], "apel (1)");
        assert_eq!(value["variants"], serde_json::json!([]));
        assert_eq!(value["compoundWords"], serde_json::json!([]));
        assert_eq!(value["baseWord"], "");
    }
}
