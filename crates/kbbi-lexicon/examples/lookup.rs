use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use kbbi_lexicon::asset::{self, read_asset_file};
use kbbi_lexicon::{AssetKey, Dictionary, LoadMode, Sense, parse_sense_key};
use kbbi_types::AssetBundle;

const USAGE: &str = "usage: ASSETS_ENCRYPTION_KEY=<hex> ASSETS_ENCRYPTION_IV=<hex> \
    cargo run -p kbbi-lexicon --example lookup -- <assets-dir> <word>...";

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let assets_dir = args.next().map(PathBuf::from).context(USAGE)?;
    let words: Vec<String> = args.collect();
    if words.is_empty() {
        bail!(USAGE);
    }

    let key = AssetKey::from_hex(
        &env::var("ASSETS_ENCRYPTION_KEY").context(USAGE)?,
        &env::var("ASSETS_ENCRYPTION_IV").context(USAGE)?,
    )?;
    let dict_bytes = read_asset_file(assets_dir.join("dict.db"), LoadMode::Mmap)?;
    let bundle: AssetBundle = asset::open(dict_bytes.as_slice(), &key)
        .with_context(|| format!("opening dict.db in {}", assets_dir.display()))?;
    let wotd_bytes = read_asset_file(assets_dir.join("wotd.db"), LoadMode::Mmap)?;
    let table: Vec<i64> = asset::open(wotd_bytes.as_slice(), &key)
        .with_context(|| format!("opening wotd.db in {}", assets_dir.display()))?;
    let dict = Dictionary::new(bundle, table)?;

    println!("Edition: {}", dict.stats().edition);
    println!("Lemmas : {}", dict.index().len());
    println!("Today  : {}", dict.lemma_of_the_day()?.lemma);

    for word in words {
        let (key, sense) = match parse_sense_key(&word) {
            Some((key, number)) => (key, Sense::Number(number.into())),
            None => (word.as_str(), Sense::All),
        };
        println!("\n{word}");
        match dict.lookup(key, sense) {
            Ok(view) => {
                for entry in view.entries {
                    println!("  {}", entry.entry);
                    for def in &entry.definitions {
                        println!("    - {}", def.definition);
                    }
                }
            }
            Err(err) => {
                println!("  {err}");
                let nearby: Vec<&str> = dict
                    .search(key, 5)
                    .into_iter()
                    .map(|lemma| lemma.lemma.as_str())
                    .collect();
                if !nearby.is_empty() {
                    println!("  did you mean: {}", nearby.join(", "));
                }
            }
        }
    }

    Ok(())
}
