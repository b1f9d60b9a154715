// Re-export all items from the submodules
mod custody_config;
mod default_configs;
mod env_vars;

pub use custody_config::{load_or_create_config, CustodyConfig, ToolEntry};
pub use env_vars::expand_env_vars;
