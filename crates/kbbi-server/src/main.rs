use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use axum::http::HeaderName;
use kbbi_lexicon::{AssetKey, LoadMode};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use kbbi_server::rate_limit::RateLimiterLayer;
use kbbi_server::{AppState, AssetConfig, load_dictionary, router};

const DEFAULT_PORT: u16 = 8888;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_ASSETS_DIR: &str = "./assets/";
const DEFAULT_CLIENT_HEADER: &str = "x-forwarded-for";
const MAX_PAGE_SIZE: usize = 100;
const DEFAULT_RATE_LIMIT_RPS: u32 = 5;
const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config()?;
    info!("binding to {}:{}", config.host, config.port);
    match &config.assets.dictionary_url {
        Some(url) => info!("dictionary asset from {url}"),
        None => info!(
            "assets from {} (mode: {:?})",
            config.assets.directory.display(),
            config.assets.load_mode
        ),
    }
    if config.disable_cache {
        info!("cache headers disabled");
    }
    info!(
        "rate limit: {} req/s (burst {}) keyed by {}",
        config.rate_limit_rps, config.rate_limit_burst, config.client_header
    );

    let start = Instant::now();
    let dictionary = load_dictionary(&config.assets).await?;
    info!("dictionary ready in {} ms", start.elapsed().as_millis());

    let state = AppState {
        dictionary: Arc::new(dictionary),
        max_page_size: MAX_PAGE_SIZE,
        disable_cache: config.disable_cache,
    };

    let rate_limiter = RateLimiterLayer::new(
        config.rate_limit_rps,
        config.rate_limit_burst,
        config.client_header,
    );
    let app = router(state)
        .layer(rate_limiter)
        .layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    host: String,
    port: u16,
    assets: AssetConfig,
    disable_cache: bool,
    rate_limit_rps: u32,
    rate_limit_burst: u32,
    client_header: HeaderName,
}

fn load_config() -> anyhow::Result<Config> {
    let flags = parse_flags(env::args().skip(1))?;
    let disable_cache = flags.disable_cache;
    let cli_assets_dir = flags.assets_dir;
    let cli_load_mode = flags.load_mode;

    let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let directory = cli_assets_dir
        .or_else(|| env::var("ASSETS_DIRECTORY").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR));
    let load_mode = match cli_load_mode {
        Some(mode) => mode,
        None => match env::var("ASSETS_LOAD_MODE") {
            Ok(raw) => parse_load_mode(&raw).with_context(|| {
                format!("ASSETS_LOAD_MODE must be mmap or owned, got {raw:?}")
            })?,
            Err(_) => LoadMode::Mmap,
        },
    };
    let dictionary_url = env::var("DICTIONARY_DOWNLOAD_URL")
        .ok()
        .filter(|url| !url.trim().is_empty());

    let Ok(key_hex) = env::var("ASSETS_ENCRYPTION_KEY") else {
        bail!("ASSETS_ENCRYPTION_KEY is required");
    };
    let Ok(nonce_hex) = env::var("ASSETS_ENCRYPTION_IV") else {
        bail!("ASSETS_ENCRYPTION_IV is required");
    };
    let key = AssetKey::from_hex(&key_hex, &nonce_hex).context("invalid asset encryption key")?;

    let rate_limit_rps = env::var("RATE_LIMIT_RPS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_RATE_LIMIT_RPS);
    let rate_limit_burst = env::var("RATE_LIMIT_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_RATE_LIMIT_BURST);
    let client_header = env::var("RATE_LIMIT_CLIENT_HEADER")
        .ok()
        .and_then(|v| HeaderName::try_from(v.trim().to_ascii_lowercase()).ok())
        .unwrap_or_else(|| HeaderName::from_static(DEFAULT_CLIENT_HEADER));

    Ok(Config {
        host,
        port,
        assets: AssetConfig {
            directory,
            key,
            dictionary_url,
            load_mode,
        },
        disable_cache,
        rate_limit_rps,
        rate_limit_burst,
        client_header,
    })
}

#[derive(Debug, Default, PartialEq)]
struct Flags {
    disable_cache: bool,
    assets_dir: Option<PathBuf>,
    load_mode: Option<LoadMode>,
}

fn parse_flags<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Flags> {
    let mut flags = Flags::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-cache" => flags.disable_cache = true,
            "--assets-dir" => {
                let Some(path) = args.next() else {
                    bail!("--assets-dir needs a path");
                };
                flags.assets_dir = Some(PathBuf::from(path));
            }
            _ => {
                if let Some(path) = arg.strip_prefix("--assets-dir=") {
                    if path.is_empty() {
                        bail!("--assets-dir needs a path");
                    }
                    flags.assets_dir = Some(PathBuf::from(path));
                } else if let Some(mode) = arg.strip_prefix("--assets-mode=") {
                    let Some(mode) = parse_load_mode(mode) else {
                        bail!("--assets-mode must be mmap or owned, got {mode:?}");
                    };
                    flags.load_mode = Some(mode);
                } else {
                    bail!("unknown argument {arg:?}");
                }
            }
        }
    }
    Ok(flags)
}

fn parse_load_mode(raw: &str) -> Option<LoadMode> {
    match raw.to_ascii_lowercase().as_str() {
        "mmap" => Some(LoadMode::Mmap),
        "owned" => Some(LoadMode::Owned),
        _ => None,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_known_flags() {
        let flags = parse_flags(args(&[
            "--no-cache",
            "--assets-dir",
            "/srv/kbbi",
            "--assets-mode=owned",
        ]))
        .unwrap();
        assert_eq!(
            flags,
            Flags {
                disable_cache: true,
                assets_dir: Some(PathBuf::from("/srv/kbbi")),
                load_mode: Some(LoadMode::Owned),
            }
        );
        let flags = parse_flags(args(&["--assets-dir=assets", "--assets-mode=MMAP"])).unwrap();
        assert_eq!(flags.assets_dir, Some(PathBuf::from("assets")));
        assert_eq!(flags.load_mode, Some(LoadMode::Mmap));
        assert_eq!(parse_flags(Vec::new()).unwrap(), Flags::default());
    }

    #[test]
    fn rejects_malformed_flags() {
        let err = parse_flags(args(&["--assets-mode=bogus"])).unwrap_err();
        assert!(err.to_string().contains("--assets-mode"));
        let err = parse_flags(args(&["--no-cache", "--assets-dir"])).unwrap_err();
        assert!(err.to_string().contains("--assets-dir"));
        assert!(parse_flags(args(&["--assets-dir="])).is_err());
        assert!(parse_flags(args(&["--verbose"])).is_err());
    }
}
