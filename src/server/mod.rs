pub mod api;
pub mod error;

use anyhow::Result;

use crate::config::Config;

pub use api::{router, serve_listener, AppState};
pub use error::ApiError;

pub async fn start(config: &Config) -> Result<()> {
    api::serve(config).await
}
