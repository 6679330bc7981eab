use kbbi_types::{AssetBundle, Lemma, Stats};
use thiserror::Error;
use tracing::error;

use crate::index::{BuildError, LemmaView, LexiconIndex, LookupError, Sense};
use crate::rotation::{DailyRotation, RotationError};

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Rotation(#[from] RotationError),
}

/// Lexicon index paired with its daily rotation table.
#[derive(Debug, Clone)]
pub struct Dictionary {
    index: LexiconIndex,
    rotation: DailyRotation,
}

impl Dictionary {
    pub fn new(bundle: AssetBundle, rotation_table: Vec<i64>) -> Result<Self, DictionaryError> {
        let rotation = DailyRotation::new(rotation_table)?;
        let index = LexiconIndex::build(bundle)?;
        Ok(Self::from_parts(index, rotation))
    }

    pub fn from_parts(index: LexiconIndex, rotation: DailyRotation) -> Self {
        Self { index, rotation }
    }

    pub fn index(&self) -> &LexiconIndex {
        &self.index
    }

    pub fn rotation(&self) -> &DailyRotation {
        &self.rotation
    }

    pub fn stats(&self) -> &Stats {
        self.index.stats()
    }

    pub fn lookup(&self, key: &str, sense: Sense) -> Result<LemmaView<'_>, LookupError> {
        self.index.lookup(key, sense)
    }

    pub fn search(&self, prefix: &str, limit: usize) -> Vec<&Lemma> {
        self.index.search(prefix, limit)
    }

    pub fn random_lemma(&self) -> &Lemma {
        self.index.random_lemma()
    }

    pub fn lemma_of_the_day(&self) -> Result<&Lemma, LookupError> {
        self.resolve(self.rotation.today_index())
    }

    /// Lemma referenced by a raw rotation-table index.
    pub fn lemma_of_rotation(&self, rotation_index: usize) -> Result<&Lemma, LookupError> {
        let value = self
            .rotation
            .entry_at(rotation_index)
            .ok_or(LookupError::RotationSlotOutOfRange {
                slot: rotation_index,
                len: self.rotation.len(),
            })?;
        self.resolve(value)
    }

    /// Lemma for a uniformly chosen rotation slot.
    pub fn random_rotation_lemma(&self) -> Result<&Lemma, LookupError> {
        self.lemma_of_rotation(self.rotation.random_index())
    }

    fn resolve(&self, value: i64) -> Result<&Lemma, LookupError> {
        self.index.lemma_at_rotation_value(value).inspect_err(|err| {
            error!(
                "rotation table points outside the dictionary ({} lemmas): {err}",
                self.index.len()
            );
        })
    }
}
