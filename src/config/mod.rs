//! Configuration for precinct.
//!
//! Handles settings files, environment variables, and resolving which
//! database to connect to.

mod connection;
mod settings;

pub use connection::{
    resolve_connection, service_file_path, ConnectionConfig, ConnectionError, ConnectionSource,
    ServiceFile, DEFAULT_PORT,
};
pub use settings::{
    expand_env_vars, ConnectionSettings, DatabaseSettings, LlmSettings, LogFormat,
    LoggingSettings, MetadataSettings, OptimizerSettings, PromptSettings, Settings,
    SettingsError, DEFAULT_MODEL,
};
