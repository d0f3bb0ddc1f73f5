pub mod config;
pub mod error;
pub mod theme;

pub use config::{ApiConfig, Config, DashboardConfig, ValidationResult};
pub use error::{AppError, ConfigError, FetchError, ValidationError};
pub use theme::{Theme, ThemeProvider, ThemeStore};

use anyhow::Result;

/// Initialize logging for the application.
///
/// Safe to call more than once; only the first call installs the subscriber.
pub fn init() -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Aether core initialized");
    }
    Ok(())
}
