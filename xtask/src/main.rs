use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use kbbi_lexicon::asset::{self, read_asset_file};
use kbbi_lexicon::{AssetKey, DailyRotation, LexiconIndex, LoadMode};
use kbbi_types::AssetBundle;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Asset maintenance utilities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress and encrypt a JSON document into an asset file.
    Seal {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Decrypt an asset file back to JSON, to stdout unless `--output` is set.
    Open {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Build the index from a dictionary asset and print its counts.
    Stats {
        #[arg(long)]
        input: PathBuf,
        /// Rotation asset to check against the dictionary.
        #[arg(long)]
        rotation: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
    },
}

#[derive(Args)]
struct KeyArgs {
    /// Hex-encoded AES key (16 or 32 bytes).
    #[arg(long, env = "ASSETS_ENCRYPTION_KEY")]
    key: String,
    /// Hex-encoded 12-byte nonce.
    #[arg(long, env = "ASSETS_ENCRYPTION_IV")]
    nonce: String,
}

impl KeyArgs {
    fn asset_key(&self) -> Result<AssetKey> {
        AssetKey::from_hex(&self.key, &self.nonce).context("invalid key material")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Seal { input, output, key } => seal(&input, &output, &key.asset_key()?)?,
        Commands::Open { input, output, key } => {
            open(&input, output.as_deref(), &key.asset_key()?)?
        }
        Commands::Stats {
            input,
            rotation,
            key,
        } => stats(&input, rotation.as_deref(), &key.asset_key()?)?,
    }

    Ok(())
}

fn seal(input: &Path, output: &Path, key: &AssetKey) -> Result<()> {
    let raw = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let value: serde_json::Value = serde_json::from_slice(&raw)
        .with_context(|| format!("{} is not valid JSON", input.display()))?;
    let sealed = asset::seal(&value, key)?;
    fs::write(output, &sealed).with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Sealed {} ({} bytes) into {} ({} bytes).",
        input.display(),
        raw.len(),
        output.display(),
        sealed.len()
    );
    Ok(())
}

fn open(input: &Path, output: Option<&Path>, key: &AssetKey) -> Result<()> {
    let bytes = read_asset_file(input, LoadMode::Owned)?;
    let value: serde_json::Value = asset::open(bytes.as_slice(), key)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let pretty = serde_json::to_string_pretty(&value)?;
    match output {
        Some(path) => {
            fs::write(path, pretty).with_context(|| format!("failed to write {}", path.display()))?;
            println!("Opened {} into {}.", input.display(), path.display());
        }
        None => println!("{pretty}"),
    }
    Ok(())
}

fn stats(input: &Path, rotation: Option<&Path>, key: &AssetKey) -> Result<()> {
    let bytes = read_asset_file(input, LoadMode::Owned)?;
    let bundle: AssetBundle = asset::open(bytes.as_slice(), key)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let declared = bundle.stats.clone();
    let entries: usize = bundle.lemmas.iter().map(|l| l.entries.len()).sum();
    let index = LexiconIndex::build(bundle)?;

    println!("edition:  {}", declared.edition);
    println!("lemmas:   {} (declared {})", index.len(), declared.lemma_count);
    println!("entries:  {entries} (declared {})", declared.entry_count);
    if index.len() as u64 != declared.lemma_count || entries as u64 != declared.entry_count {
        eprintln!("warning: declared counts do not match the asset contents");
    }

    let Some(path) = rotation else {
        return Ok(());
    };
    let bytes = read_asset_file(path, LoadMode::Owned)?;
    let table: Vec<i64> = asset::open(bytes.as_slice(), key)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let rotation = DailyRotation::new(table)?;
    let mut broken = 0usize;
    for day in 0..rotation.len() {
        let resolves = rotation
            .entry_at(day)
            .is_some_and(|value| index.lemma_at_rotation_value(value).is_ok());
        if !resolves {
            broken += 1;
        }
    }
    println!("rotation: {} days", rotation.len());
    if broken > 0 {
        bail!("{broken} rotation values point outside the dictionary");
    }
    Ok(())
}
