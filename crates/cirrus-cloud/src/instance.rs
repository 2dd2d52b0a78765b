//! Instance and floating IP types
//!
//! These are transient views of backend-owned resources. They are re-fetched
//! on every query and never cached across calls.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-assigned instance identifier.
///
/// The empty string is a reserved sentinel meaning "not found"; it never
/// resolves to an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The "not found" sentinel
    pub fn absent() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Status of an instance as last reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Instance is being built
    Building,
    /// Instance is running
    Running,
    /// Instance is stopped, paused or suspended
    Stopped,
    /// Instance is being deleted
    Deleting,
    /// Instance is in error state
    Error,
    /// Status is unknown
    Unknown,
}

impl InstanceStatus {
    /// Map a compute API server status string
    pub fn from_backend(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "BUILD" | "REBUILD" => InstanceStatus::Building,
            "ACTIVE" => InstanceStatus::Running,
            "SHUTOFF" | "STOPPED" | "PAUSED" | "SUSPENDED" => InstanceStatus::Stopped,
            "DELETED" | "SOFT_DELETED" => InstanceStatus::Deleting,
            "ERROR" => InstanceStatus::Error,
            _ => InstanceStatus::Unknown,
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Building => write!(f, "building"),
            InstanceStatus::Running => write!(f, "running"),
            InstanceStatus::Stopped => write!(f, "stopped"),
            InstanceStatus::Deleting => write!(f, "deleting"),
            InstanceStatus::Error => write!(f, "error"),
            InstanceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A provisioned compute node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,

    /// Server name as known to the backend
    pub name: String,

    pub public_address: Option<String>,

    pub private_address: Option<String>,

    pub status: InstanceStatus,
}

impl Instance {
    pub fn new(id: impl Into<InstanceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            public_address: None,
            private_address: None,
            status: InstanceStatus::Unknown,
        }
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_public_address(mut self, address: impl Into<String>) -> Self {
        self.public_address = Some(address.into());
        self
    }

    pub fn with_private_address(mut self, address: impl Into<String>) -> Self {
        self.private_address = Some(address.into());
        self
    }

    /// Best address to reach the instance from outside: public first
    pub fn dns_name(&self) -> Option<&str> {
        self.public_address
            .as_deref()
            .or(self.private_address.as_deref())
    }
}

/// An allocated public address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIp {
    /// Backend identifier of the allocation
    pub id: String,

    pub address: String,

    /// Instance the address is attached to, if any
    pub instance: Option<InstanceId>,

    pub pool: Option<String>,
}

impl FloatingIp {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            instance: None,
            pool: None,
        }
    }

    pub fn is_associated(&self) -> bool {
        self.instance.as_ref().is_some_and(|id| !id.is_empty())
    }
}

impl fmt::Display for FloatingIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
