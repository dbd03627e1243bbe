pub mod env;
mod loader;

pub use env::{AppConfig, DirectoryConfig, MailApiConfig, PollerConfig};
pub use loader::load_config;
