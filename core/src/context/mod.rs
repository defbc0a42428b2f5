mod config;
pub mod error;

pub use config::{
    ConfigStorage, JsonFileStorage, MemoryStorage, SETTINGS_FILE_NAME, executable_dir,
};
pub use error::{ConfigError, StartupError};
