use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::time::Instant;

use kbbi_types::{AssetBundle, Entry, Lemma, Stats};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::normalize::normalize;
use crate::sense_key::parse_sense_key;

/// Upper bound on the code points that can appear in a search form, used to
/// close the prefix range.
const PREFIX_SENTINEL: char = '\u{FFFF}';

/// Read-only index over the lemmas of one asset bundle.
///
/// Lemmas stay in bundle order; every auxiliary structure refers to them by
/// position.
#[derive(Debug, Clone)]
pub struct LexiconIndex {
    stats: Stats,
    lemmas: Vec<Lemma>,
    senses: Vec<SenseMap>,
    exact: HashMap<String, usize>,
    normalized: HashMap<String, usize>,
    search_order: Vec<SearchKey>,
    longest_lemma_len: usize,
}

/// Sense number to positions in the owning lemma's entries. A number can be
/// claimed by more than one entry.
type SenseMap = HashMap<u32, Vec<usize>>;

#[derive(Debug, Clone)]
struct SearchKey {
    form: String,
    position: usize,
}

/// Which senses of a lemma a lookup should return.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Sense {
    #[default]
    All,
    /// A caller-supplied sense number. `0` selects every sense, negative
    /// numbers are rejected.
    Number(i64),
}

/// A lemma with the entries selected by a lookup, borrowed from the index.
#[derive(Clone, Debug, Serialize)]
pub struct LemmaView<'a> {
    pub lemma: &'a str,
    pub entries: Vec<&'a Entry>,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("asset bundle contains no lemmas")]
    EmptyLexicon,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("unexpected empty lemma")]
    EmptyKey,
    #[error("lemma length too long")]
    KeyTooLong,
    #[error("unexpected entry number: {0}")]
    InvalidSenseNumber(i64),
    #[error("lemma not found")]
    NotFound,
    #[error("lemma's entry not found")]
    SenseNotFound,
    #[error("rotation value {0} outside the lemma range")]
    RotationIndexOutOfRange(i64),
    #[error("rotation slot {slot} outside the rotation table ({len} days)")]
    RotationSlotOutOfRange { slot: usize, len: usize },
}

impl LexiconIndex {
    pub fn build(bundle: AssetBundle) -> Result<Self, BuildError> {
        let start = Instant::now();
        let AssetBundle { stats, lemmas } = bundle;
        if lemmas.is_empty() {
            return Err(BuildError::EmptyLexicon);
        }

        let mut senses = Vec::with_capacity(lemmas.len());
        let mut exact = HashMap::with_capacity(lemmas.len());
        let mut normalized = HashMap::new();
        let mut search_order = Vec::with_capacity(lemmas.len());
        let mut longest_lemma_len = 0usize;

        for (position, lemma) in lemmas.iter().enumerate() {
            let mut sense_map = SenseMap::new();
            for (entry_pos, entry) in lemma.entries.iter().enumerate() {
                if let Some((_, number)) = parse_sense_key(&entry.entry) {
                    sense_map.entry(number).or_default().push(entry_pos);
                }
            }
            senses.push(sense_map);

            exact.insert(lemma.lemma.clone(), position);

            // Punctuation is kept so that `s.t` never resolves to `st.`.
            let folded = normalize(&lemma.lemma, false);
            if folded != lemma.lemma
                && let MapEntry::Vacant(slot) = normalized.entry(folded)
            {
                slot.insert(position);
            }

            longest_lemma_len = longest_lemma_len.max(lemma.lemma.len());
            search_order.push(SearchKey {
                form: normalize(&lemma.lemma, true),
                position,
            });
        }

        search_order.sort_by(|a, b| a.form.cmp(&b.form));

        info!(
            "indexed {} lemmas ({} normalized keys, longest {} bytes) in {} ms",
            lemmas.len(),
            normalized.len(),
            longest_lemma_len,
            start.elapsed().as_millis()
        );

        Ok(Self {
            stats,
            lemmas,
            senses,
            exact,
            normalized,
            search_order,
            longest_lemma_len,
        })
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.lemmas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lemmas.is_empty()
    }

    /// Lemma at a 0-based position in bundle order.
    pub fn lemma_at(&self, position: usize) -> Option<&Lemma> {
        self.lemmas.get(position)
    }

    /// Resolve a 1-based position, as stored in rotation tables.
    pub fn lemma_at_rotation_value(&self, value: i64) -> Result<&Lemma, LookupError> {
        value
            .checked_sub(1)
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| self.lemmas.get(idx))
            .ok_or(LookupError::RotationIndexOutOfRange(value))
    }

    /// Look up a lemma by its exact text, falling back to its
    /// diacritic-free form.
    pub fn lookup(&self, key: &str, sense: Sense) -> Result<LemmaView<'_>, LookupError> {
        if key.is_empty() {
            return Err(LookupError::EmptyKey);
        }
        if key.len() > self.longest_lemma_len {
            return Err(LookupError::KeyTooLong);
        }

        let position = self.position_of(key).ok_or(LookupError::NotFound)?;
        let lemma = &self.lemmas[position];

        let number = match sense {
            Sense::All | Sense::Number(0) => {
                return Ok(LemmaView {
                    lemma: &lemma.lemma,
                    entries: lemma.entries.iter().collect(),
                });
            }
            Sense::Number(n) if n < 0 => return Err(LookupError::InvalidSenseNumber(n)),
            Sense::Number(n) => n,
        };

        if number > lemma.entries.len() as i64 {
            return Err(LookupError::SenseNotFound);
        }
        let claimed = u32::try_from(number)
            .ok()
            .and_then(|n| self.senses[position].get(&n))
            .ok_or(LookupError::SenseNotFound)?;

        Ok(LemmaView {
            lemma: &lemma.lemma,
            entries: claimed
                .iter()
                .filter_map(|&idx| lemma.entries.get(idx))
                .collect(),
        })
    }

    fn position_of(&self, key: &str) -> Option<usize> {
        if let Some(&position) = self.exact.get(key) {
            return Some(position);
        }
        self.normalized.get(&normalize(key, false)).copied()
    }

    /// Lemmas whose search form starts with `prefix`, in search-form order.
    ///
    /// An empty prefix returns the first `limit` lemmas in bundle order
    /// instead.
    pub fn search(&self, prefix: &str, limit: usize) -> Vec<&Lemma> {
        if prefix.is_empty() {
            return self.lemmas.iter().take(limit).collect();
        }

        let prefix = normalize(prefix, true).to_lowercase();
        let mut upper = prefix.clone();
        upper.push(PREFIX_SENTINEL);

        let left = self
            .search_order
            .partition_point(|key| key.form.as_str() < prefix.as_str());
        let right = self
            .search_order
            .partition_point(|key| key.form.as_str() < upper.as_str());

        if left >= self.search_order.len()
            || right <= left
            || !self.search_order[left].form.starts_with(&prefix)
        {
            return Vec::new();
        }

        self.search_order[left..right]
            .iter()
            .take(limit)
            .map(|key| &self.lemmas[key.position])
            .collect()
    }

    pub fn random_lemma(&self) -> &Lemma {
        self.random_lemma_with(&mut rand::thread_rng())
    }

    pub fn random_lemma_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &Lemma {
        &self.lemmas[rng.gen_range(0..self.lemmas.len())]
    }
}

impl LemmaView<'_> {
    pub fn to_lemma(&self) -> Lemma {
        Lemma {
            lemma: self.lemma.to_string(),
            entries: self.entries.iter().map(|&entry| entry.clone()).collect(),
        }
    }
}
