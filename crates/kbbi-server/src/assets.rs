use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use kbbi_lexicon::asset::{self, AssetBytes, read_asset_file};
use kbbi_lexicon::{AssetKey, Dictionary, LoadMode};
use kbbi_types::AssetBundle;
use tracing::info;

pub const DICTIONARY_ASSET: &str = "dict.db";
pub const ROTATION_ASSET: &str = "wotd.db";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the sealed assets come from.
#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub directory: PathBuf,
    pub key: AssetKey,
    /// Fetch the dictionary asset over HTTP instead of from `directory`.
    pub dictionary_url: Option<String>,
    pub load_mode: LoadMode,
}

/// Read, decrypt and index both assets. Any failure is fatal for startup.
pub async fn load_dictionary(config: &AssetConfig) -> Result<Dictionary> {
    let start = Instant::now();
    let dict_bytes = match &config.dictionary_url {
        Some(url) => {
            info!("reading dictionary asset from {url}");
            download(url).await?
        }
        None => read_local(config, DICTIONARY_ASSET)?,
    };
    let bundle: AssetBundle = asset::open(dict_bytes.as_slice(), &config.key)
        .context("failed to open dictionary asset")?;
    drop(dict_bytes);
    info!(
        "read dictionary asset in {} ms (edition {:?}, {} lemmas, {} entries)",
        start.elapsed().as_millis(),
        bundle.stats.edition,
        bundle.stats.lemma_count,
        bundle.stats.entry_count
    );

    let rotation_bytes = read_local(config, ROTATION_ASSET)?;
    let table: Vec<i64> = asset::open(rotation_bytes.as_slice(), &config.key)
        .context("failed to open rotation asset")?;
    info!("rotation table holds {} days", table.len());

    Dictionary::new(bundle, table).context("failed to build dictionary")
}

fn read_local(config: &AssetConfig, name: &str) -> Result<AssetBytes> {
    let path = config.directory.join(name);
    read_asset_file(&path, config.load_mode)
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn download(url: &str) -> Result<AssetBytes> {
    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .context("failed to build http client")?;
    let bytes = client
        .get(url)
        .send()
        .await
        .and_then(|res| res.error_for_status())
        .with_context(|| format!("failed to download {url}"))?
        .bytes()
        .await
        .with_context(|| format!("failed to read body of {url}"))?;
    Ok(AssetBytes::Owned(bytes.to_vec()))
}
