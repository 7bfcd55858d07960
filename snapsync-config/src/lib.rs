//! Configuration types and loading for snapsync services.
//!
//! Configuration is assembled from `configuration/base.*`, an optional
//! `configuration/{environment}.*` override file and `APP_`-prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
