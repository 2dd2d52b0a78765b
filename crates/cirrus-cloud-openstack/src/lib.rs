//! OpenStack provider for Cirrus
//!
//! This crate implements the `Environ` trait for OpenStack clouds: Nova
//! servers for instances and floating IPs for public addresses.
//!
//! # Features
//!
//! - Order-preserving bulk instance lookup with partial-result errors
//! - Bootstrap of the first control instance, with an optional public address
//! - Instance metadata resolution, live or from fixed values
//! - In-memory compute backend with failure injection (`MemoryCompute`)
//!
//! # Example
//!
//! ```ignore
//! use cirrus_cloud::{Environ, ProviderSettings};
//! use cirrus_cloud_openstack::{EnvironConfig, OpenStackEnviron};
//!
//! let settings = ProviderSettings::shared();
//! let env = OpenStackEnviron::open(config, settings)?;
//!
//! let instance = env.bootstrap(&writer).await?;
//! let found = env.instances(&[instance.id.clone()]).await?;
//! ```

pub mod bootstrap;
pub mod compute;
pub mod config;
pub mod error;
pub mod instances;
pub mod memory;
pub mod metadata;
pub mod network;
pub mod nova;
pub mod provider;
pub mod userdata;

#[cfg(test)]
mod testing;

pub use bootstrap::{BootstrapCoordinator, Bootstrapped};
pub use compute::{ComputeApi, FloatingIpRecord, ServerAddress, ServerRecord, ServerSpec};
pub use config::EnvironConfig;
pub use error::{OpenStackError, Result};
pub use instances::InstanceManager;
pub use memory::{ControlPointGuard, MemoryCompute};
pub use metadata::{FixedMetadata, MetadataResolver};
pub use network::NetworkAllocator;
pub use nova::{Credentials, NovaClient};
pub use provider::OpenStackEnviron;
