//! In-memory KBBI lexicon built once from a sealed asset bundle.
//!
//! The index keeps lemmas in bundle order and layers three lookups on top:
//! exact text, diacritic-free text (first lemma wins a collision), and a
//! sorted projection of punctuation-free forms for prefix search. A separate
//! rotation table picks a deterministic lemma of the day.
//!
//! Everything is immutable after construction, so a [`Dictionary`] can sit
//! behind an `Arc` and serve any number of readers without locks.
//!
//! # Example
//! ```
//! use kbbi_lexicon::{Dictionary, Sense, parse_sense_key};
//! use kbbi_types::{AssetBundle, Entry, Lemma};
//!
//! let bundle = AssetBundle {
//!     lemmas: vec![Lemma::new(
//!         "apel",
//!         vec![Entry::titled("apel (1)"), Entry::titled("apel (2)")],
//!     )],
//!     ..AssetBundle::default()
//! };
//! let dict = Dictionary::new(bundle, vec![1]).unwrap();
//!
//! let (key, number) = parse_sense_key("apel (2)").unwrap();
//! let view = dict.lookup(key, Sense::Number(number.into())).unwrap();
//! assert_eq!(view.entries[0].entry, "apel (2)");
//! assert_eq!(dict.lemma_of_the_day().unwrap().lemma, "apel");
//! ```

pub mod asset;
pub mod dictionary;
pub mod index;
pub mod normalize;
pub mod rotation;
pub mod sense_key;

pub use asset::{AssetError, AssetKey, LoadMode};
pub use dictionary::{Dictionary, DictionaryError};
pub use index::{BuildError, LemmaView, LexiconIndex, LookupError, Sense};
pub use normalize::normalize;
pub use rotation::{DailyRotation, RotationError};
pub use sense_key::parse_sense_key;
