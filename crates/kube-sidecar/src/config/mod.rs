pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, LoadedConfig};
pub use schema::{Config, Selector, SelectorKind, ALL_NAMESPACES};
