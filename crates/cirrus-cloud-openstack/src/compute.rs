//! Compute API seam
//!
//! The provider talks to the cloud only through [`ComputeApi`]. The HTTP
//! implementation lives in [`crate::nova`]; [`crate::memory`] provides an
//! in-process backend for local runs and tests.

use async_trait::async_trait;
use cirrus_cloud::{BackendError, FloatingIp, Instance, InstanceId, InstanceStatus};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Low-level compute operations used by the provider
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn list_servers(&self) -> Result<Vec<ServerRecord>, BackendError>;

    async fn create_server(&self, spec: &ServerSpec) -> Result<ServerRecord, BackendError>;

    async fn delete_server(&self, id: &str) -> Result<(), BackendError>;

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIpRecord>, BackendError>;

    async fn allocate_floating_ip(&self) -> Result<FloatingIpRecord, BackendError>;

    async fn associate_floating_ip(&self, server_id: &str, address: &str)
    -> Result<(), BackendError>;
}

/// Server as reported by the compute API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub status: String,

    /// Addresses grouped by network name
    #[serde(default)]
    pub addresses: HashMap<String, Vec<ServerAddress>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerAddress {
    pub addr: String,

    #[serde(default)]
    pub version: Option<u8>,

    /// "fixed" or "floating"
    #[serde(rename = "OS-EXT-IPS:type", default)]
    pub kind: Option<String>,
}

impl ServerAddress {
    fn is_floating(&self) -> bool {
        self.kind.as_deref() == Some("floating")
    }

    fn is_fixed(&self) -> bool {
        self.kind.as_deref() == Some("fixed")
    }
}

impl ServerRecord {
    /// Public address: a floating address, else one on the "public" network
    pub fn public_address(&self) -> Option<String> {
        self.addresses
            .values()
            .flatten()
            .find(|a| a.is_floating())
            .or_else(|| self.network_address("public"))
            .map(|a| a.addr.clone())
    }

    /// Private address: a fixed address, else one on the "private" network
    pub fn private_address(&self) -> Option<String> {
        self.network_address("private")
            .or_else(|| self.addresses.values().flatten().find(|a| a.is_fixed()))
            .map(|a| a.addr.clone())
    }

    fn network_address(&self, network: &str) -> Option<&ServerAddress> {
        self.addresses
            .get(network)
            .and_then(|addrs| addrs.iter().find(|a| !a.is_floating()))
    }

    pub fn to_instance(&self) -> Instance {
        Instance {
            id: InstanceId::new(&self.id),
            name: self.name.clone(),
            public_address: self.public_address(),
            private_address: self.private_address(),
            status: InstanceStatus::from_backend(&self.status),
        }
    }
}

/// Create-server request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub name: String,

    #[serde(rename = "imageRef")]
    pub image_ref: String,

    #[serde(rename = "flavorRef")]
    pub flavor_ref: String,

    /// Base64 encoded user data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metadata: BTreeMap<String, String>,
}

/// Floating IP as reported by the compute API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloatingIpRecord {
    /// Some deployments report numeric ids
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    pub ip: String,

    #[serde(default)]
    pub instance_id: Option<String>,

    #[serde(default)]
    pub pool: Option<String>,

    #[serde(default)]
    pub fixed_ip: Option<String>,
}

impl From<FloatingIpRecord> for FloatingIp {
    fn from(record: FloatingIpRecord) -> Self {
        FloatingIp {
            id: record.id,
            address: record.ip,
            instance: record
                .instance_id
                .filter(|id| !id.is_empty())
                .map(InstanceId::new),
            pool: record.pool,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
