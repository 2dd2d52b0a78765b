//! Environment trait definitions

use crate::credentials::CredentialWriter;
use crate::error::{MetadataError, Result};
use crate::instance::{Instance, InstanceId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cloud environment as seen by the orchestrator
///
/// Every call goes to the backend; implementations keep no instance cache, so
/// concurrent callers always observe backend-consistent data.
#[async_trait]
pub trait Environ: Send + Sync {
    /// Environment name from configuration
    fn name(&self) -> &str;

    /// Provider type (e.g., "openstack")
    fn provider(&self) -> &str;

    /// Create the first control instance and hand its credentials to `writer`.
    ///
    /// Not re-entrant: run at most one bootstrap per environment at a time.
    async fn bootstrap(&self, writer: &dyn CredentialWriter) -> Result<Instance>;

    /// Instances recorded as state servers by bootstrap
    async fn state_instances(&self) -> Result<Vec<InstanceId>>;

    /// Start a new instance for the given machine
    async fn start_instance(&self, machine: &MachineConfig) -> Result<Instance>;

    /// Stop the given instances
    async fn stop_instances(&self, instances: &[Instance]) -> Result<()>;

    /// Look up instances by id, one result per id in request order.
    ///
    /// Fails with `NoInstances` when none resolve and `PartialInstances`
    /// (carrying the per-id results) when only some do.
    async fn instances(&self, ids: &[InstanceId]) -> Result<Vec<Instance>>;

    /// All instances belonging to this environment
    async fn all_instances(&self) -> Result<Vec<Instance>>;

    /// Stop every instance and forget the provider state
    async fn destroy(&self) -> Result<()>;
}

/// Self-description of the instance the process runs on
#[async_trait]
pub trait InstanceMetadata: Send + Sync {
    async fn public_address(&self) -> std::result::Result<String, MetadataError>;

    async fn private_address(&self) -> std::result::Result<String, MetadataError>;

    async fn instance_id(&self) -> std::result::Result<InstanceId, MetadataError>;
}

/// Where a new machine's agent finds the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// host:port addresses
    pub addrs: Vec<String>,

    /// Entity the agent authenticates as (e.g., "machine-1")
    pub tag: Option<String>,

    pub password: Option<String>,
}

impl ConnectionInfo {
    pub fn new(addrs: Vec<String>) -> Self {
        Self {
            addrs,
            ..Default::default()
        }
    }
}

/// Parameters for starting a machine's instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Logical machine slot (e.g., "0" for the bootstrap machine)
    pub machine_id: String,

    pub state_info: ConnectionInfo,

    pub api_info: ConnectionInfo,

    /// Arbitrary provider options passed through to the instance
    pub options: BTreeMap<String, String>,
}

impl MachineConfig {
    pub fn new(machine_id: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            ..Default::default()
        }
    }

    pub fn with_state_info(mut self, info: ConnectionInfo) -> Self {
        self.state_info = info;
        self
    }

    pub fn with_api_info(mut self, info: ConnectionInfo) -> Self {
        self.api_info = info;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}
