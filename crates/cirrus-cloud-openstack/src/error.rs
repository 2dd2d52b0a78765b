//! OpenStack provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenStackError {
    #[error("missing environment attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("invalid environment attribute {name}: {reason}")]
    InvalidAttribute { name: &'static str, reason: String },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, OpenStackError>;
