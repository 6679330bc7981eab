pub mod assets;
pub mod handlers;
pub mod rate_limit;

pub use assets::{AssetConfig, load_dictionary};
pub use handlers::{AppState, router};
