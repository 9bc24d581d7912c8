pub mod config;

pub use config::{default_config, ProviderConfig};
