//! Bootstrap policy and phases

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether bootstrap must obtain a public address for the control instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapPolicy {
    pub require_public_ip: bool,
}

impl BootstrapPolicy {
    pub fn new(require_public_ip: bool) -> Self {
        Self { require_public_ip }
    }
}

impl Default for BootstrapPolicy {
    fn default() -> Self {
        Self {
            require_public_ip: true,
        }
    }
}

/// Phase of a bootstrap attempt.
///
/// ```text
/// Idle -> InstanceRequested -> [AddressAllocating -> AddressAssociating] -> Provisioned
/// ```
///
/// `Failed` is reachable from every phase except `Provisioned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapPhase {
    Idle,
    InstanceRequested,
    AddressAllocating,
    AddressAssociating,
    Provisioned,
    Failed,
}

impl BootstrapPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BootstrapPhase::Provisioned | BootstrapPhase::Failed)
    }
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapPhase::Idle => write!(f, "idle"),
            BootstrapPhase::InstanceRequested => write!(f, "instance-requested"),
            BootstrapPhase::AddressAllocating => write!(f, "address-allocating"),
            BootstrapPhase::AddressAssociating => write!(f, "address-associating"),
            BootstrapPhase::Provisioned => write!(f, "provisioned"),
            BootstrapPhase::Failed => write!(f, "failed"),
        }
    }
}
