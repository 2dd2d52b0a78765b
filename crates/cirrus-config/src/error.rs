use std::path::PathBuf;
use thiserror::Error;

/// 設定エラー
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    ConfigDirNotFound,

    #[error(
        "environments file not found. Looked in:\n\
        - ./environments.yaml\n\
        - ./.cirrus/environments.yaml\n\
        - ~/.config/cirrus/environments.yaml\n\
        Set CIRRUS_ENVIRONMENTS to point at a file directly"
    )]
    EnvironmentsFileNotFound,

    #[error("no environment selected and no default environment configured")]
    NoDefaultEnvironment,

    #[error("environment \"{name}\" not found in {}", .path.display())]
    UnknownEnvironment { name: String, path: PathBuf },

    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
