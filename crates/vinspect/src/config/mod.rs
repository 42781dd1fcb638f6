//! Runtime configuration: JSON file validated against an embedded schema.

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{AnalysisConfig, AssetsConfig, Config, StagesConfig};
