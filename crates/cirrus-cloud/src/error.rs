//! Cloud environment error types

use crate::bootstrap::BootstrapPhase;
use crate::credentials::CredentialError;
use crate::instance::{FloatingIp, Instance, InstanceId};
use thiserror::Error;

/// Failure reported by the cloud backend or the transport in front of it.
///
/// Never mapped onto [`CloudError::NoInstances`] or
/// [`CloudError::PartialInstances`]: a backend that cannot be reached is not
/// the same thing as an instance that does not exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Phase of the floating IP protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatingIpPhase {
    Allocate,
    Associate,
}

/// Floating IP failure, tagged with the phase that failed
#[derive(Error, Debug)]
pub enum FloatingIpError {
    /// No address was obtained; nothing to release.
    #[error("cannot allocate floating IP: {0}")]
    Allocation(#[source] BackendError),

    /// The address was obtained but is not attached to the instance.
    #[error("cannot associate floating IP {address} with instance {instance}: {source}")]
    Association {
        address: FloatingIp,
        instance: InstanceId,
        #[source]
        source: BackendError,
    },
}

impl FloatingIpError {
    pub fn phase(&self) -> FloatingIpPhase {
        match self {
            FloatingIpError::Allocation(_) => FloatingIpPhase::Allocate,
            FloatingIpError::Association { .. } => FloatingIpPhase::Associate,
        }
    }

    /// Address left allocated but unattached, if any
    pub fn orphaned_address(&self) -> Option<&FloatingIp> {
        match self {
            FloatingIpError::Allocation(_) => None,
            FloatingIpError::Association { address, .. } => Some(address),
        }
    }
}

/// Instance metadata resolution errors
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("metadata service unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("metadata service returned status {status} for {key}")]
    Status { key: String, status: u16 },

    #[error("metadata service returned no value for {0}")]
    Empty(String),
}

/// Object storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid storage name: {0}")]
    InvalidName(String),

    #[error("corrupt file {name}: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a bootstrap attempt was aborted
#[derive(Error, Debug)]
pub enum BootstrapCause {
    #[error("environment is already bootstrapped")]
    AlreadyBootstrapped,

    #[error("a bootstrap of this environment is already in progress")]
    InProgress,

    #[error("cannot prepare bootstrap credentials: {0}")]
    Credentials(#[source] CredentialError),

    #[error("cannot start bootstrap instance: {0}")]
    StartInstance(#[source] Box<CloudError>),

    #[error("cannot allocate a public IP as needed: {0}")]
    PublicAddress(#[source] FloatingIpError),

    #[error("cannot save provider state: {0}")]
    ProviderState(#[source] StorageError),

    #[error("cannot write bootstrap credentials: {0}")]
    WriteCredentials(#[source] anyhow::Error),
}

/// A bootstrap attempt that stopped before completing.
///
/// `instance` is set when the control instance was created before the
/// failure; tearing it down is left to the caller.
#[derive(Error, Debug)]
#[error("bootstrap aborted in phase {phase}: {cause}")]
pub struct BootstrapAborted {
    pub phase: BootstrapPhase,
    pub instance: Option<Instance>,
    #[source]
    pub cause: BootstrapCause,
}

/// Cloud environment errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("no instances found")]
    NoInstances,

    /// Carries one entry per requested id, `None` where the id did not resolve.
    #[error("some instances were not found")]
    PartialInstances(Vec<Option<Instance>>),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("cannot stop instances [{}]: {source}", join_ids(.failed))]
    StopInstances {
        failed: Vec<InstanceId>,
        #[source]
        source: BackendError,
    },

    #[error("cannot allocate a public IP as needed for instance {}: {source}", .instance.id)]
    PublicAddress {
        instance: Box<Instance>,
        #[source]
        source: FloatingIpError,
    },

    #[error(transparent)]
    Bootstrap(#[from] BootstrapAborted),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CloudError {
    /// Lookup entries carried by a partial result
    pub fn partial_instances(&self) -> Option<&[Option<Instance>]> {
        match self {
            CloudError::PartialInstances(instances) => Some(instances),
            _ => None,
        }
    }
}

fn join_ids(ids: &[InstanceId]) -> String {
    ids.iter()
        .map(InstanceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_address_message_is_matchable() {
        let cause = BootstrapCause::PublicAddress(FloatingIpError::Allocation(
            BackendError::Api {
                status: 500,
                message: "failed on purpose".to_string(),
            },
        ));
        let err = CloudError::from(BootstrapAborted {
            phase: BootstrapPhase::AddressAllocating,
            instance: None,
            cause,
        });

        let message = err.to_string();
        assert!(message.contains("cannot allocate a public IP as needed"));
        assert!(message.contains("failed on purpose"));
    }

    #[test]
    fn test_floating_ip_error_phase() {
        let allocation = FloatingIpError::Allocation(BackendError::Timeout("pool".into()));
        assert_eq!(allocation.phase(), FloatingIpPhase::Allocate);
        assert!(allocation.orphaned_address().is_none());

        let association = FloatingIpError::Association {
            address: FloatingIp::new("fip-1", "203.0.113.7"),
            instance: InstanceId::new("server-1"),
            source: BackendError::NotFound("server-1".into()),
        };
        assert_eq!(association.phase(), FloatingIpPhase::Associate);
        assert_eq!(
            association.orphaned_address().map(|f| f.address.as_str()),
            Some("203.0.113.7")
        );
    }

    #[test]
    fn test_stop_instances_lists_failed_ids() {
        let err = CloudError::StopInstances {
            failed: vec![InstanceId::new("a"), InstanceId::new("b")],
            source: BackendError::Transport("connection reset".into()),
        };
        assert_eq!(
            err.to_string(),
            "cannot stop instances [a, b]: transport error: connection reset"
        );
    }

    #[test]
    fn test_backend_error_is_transparent() {
        let err = CloudError::from(BackendError::Authentication("bad token".into()));
        assert_eq!(err.to_string(), "authentication failed: bad token");
        assert!(err.partial_instances().is_none());
    }
}
