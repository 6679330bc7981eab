//! Sealed asset files: JSON, gzip-compressed, then encrypted with AES-GCM.
//!
//! The same key and nonce are used for every asset of a deployment, so both
//! are supplied by configuration as hex strings.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use memmap2::Mmap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const NONCE_LEN: usize = 12;

/// Strategy for reading asset files.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map the file.
    #[default]
    Mmap,
    /// Read the file into an owned buffer.
    Owned,
}

/// Raw asset bytes, either mapped or owned.
pub enum AssetBytes {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl AssetBytes {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            AssetBytes::Mmap(m) => m.as_ref(),
            AssetBytes::Owned(v) => v.as_slice(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read asset: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex in {field}: {source}")]
    InvalidHex {
        field: &'static str,
        source: hex::FromHexError,
    },
    #[error("key must be 16 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("nonce must be 12 bytes, got {0}")]
    InvalidNonceLength(usize),
    #[error("failed to decrypt asset")]
    Decrypt,
    #[error("failed to encrypt asset")]
    Encrypt,
    #[error("failed to decompress asset: {0}")]
    Decompress(std::io::Error),
    #[error("failed to compress asset: {0}")]
    Compress(std::io::Error),
    #[error("failed to decode asset json: {0}")]
    Json(#[from] serde_json::Error),
}

/// AES key plus GCM nonce for sealed assets.
#[derive(Clone, PartialEq, Eq)]
pub struct AssetKey {
    key: Vec<u8>,
    nonce: [u8; NONCE_LEN],
}

impl AssetKey {
    pub fn new(key: Vec<u8>, nonce: &[u8]) -> Result<Self, AssetError> {
        if key.len() != 16 && key.len() != 32 {
            return Err(AssetError::InvalidKeyLength(key.len()));
        }
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| AssetError::InvalidNonceLength(nonce.len()))?;
        Ok(Self { key, nonce })
    }

    pub fn from_hex(key: &str, nonce: &str) -> Result<Self, AssetError> {
        let key = hex::decode(key.trim()).map_err(|source| AssetError::InvalidHex {
            field: "key",
            source,
        })?;
        let nonce = hex::decode(nonce.trim()).map_err(|source| AssetError::InvalidHex {
            field: "nonce",
            source,
        })?;
        Self::new(key, &nonce)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, AssetError> {
        let nonce = Nonce::from_slice(&self.nonce);
        let plaintext = match self.key.len() {
            16 => Aes128Gcm::new_from_slice(&self.key)
                .map_err(|_| AssetError::InvalidKeyLength(self.key.len()))?
                .decrypt(nonce, ciphertext),
            _ => Aes256Gcm::new_from_slice(&self.key)
                .map_err(|_| AssetError::InvalidKeyLength(self.key.len()))?
                .decrypt(nonce, ciphertext),
        };
        plaintext.map_err(|_| AssetError::Decrypt)
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, AssetError> {
        let nonce = Nonce::from_slice(&self.nonce);
        let ciphertext = match self.key.len() {
            16 => Aes128Gcm::new_from_slice(&self.key)
                .map_err(|_| AssetError::InvalidKeyLength(self.key.len()))?
                .encrypt(nonce, plaintext),
            _ => Aes256Gcm::new_from_slice(&self.key)
                .map_err(|_| AssetError::InvalidKeyLength(self.key.len()))?
                .encrypt(nonce, plaintext),
        };
        ciphertext.map_err(|_| AssetError::Encrypt)
    }
}

// Keys never show up in logs.
impl fmt::Debug for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetKey(aes-{}-gcm)", self.key.len() * 8)
    }
}

pub fn read_asset_file<P: AsRef<Path>>(path: P, mode: LoadMode) -> Result<AssetBytes, AssetError> {
    let mut file = File::open(path.as_ref())?;
    match mode {
        LoadMode::Mmap => {
            // SAFETY: asset files are written once by tooling and only read here.
            let mmap = unsafe { Mmap::map(&file)? };
            Ok(AssetBytes::Mmap(mmap))
        }
        LoadMode::Owned => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            Ok(AssetBytes::Owned(buf))
        }
    }
}

/// Decrypt, decompress and deserialize a sealed asset.
pub fn open<T: DeserializeOwned>(ciphertext: &[u8], key: &AssetKey) -> Result<T, AssetError> {
    let plaintext = key.decrypt(ciphertext)?;
    let mut json = Vec::new();
    GzDecoder::new(plaintext.as_slice())
        .read_to_end(&mut json)
        .map_err(AssetError::Decompress)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Inverse of [`open`].
pub fn seal<T: Serialize + ?Sized>(value: &T, key: &AssetKey) -> Result<Vec<u8>, AssetError> {
    let json = serde_json::to_vec(value)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(AssetError::Compress)?;
    let compressed = encoder.finish().map_err(AssetError::Compress)?;
    key.encrypt(&compressed)
}
