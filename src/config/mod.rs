// Configuration module
// Public interface for configuration loading

pub mod constants;
mod loader;
mod settings;

pub use loader::{apply_overrides, config_path, load_config, load_config_from};
pub use settings::{BackendConfig, Config, IdentityConfig, LoggingConfig, StreamConfig};
