//! Cirrus Cloud Environments
//!
//! This crate provides the provider-agnostic side of Cirrus environments:
//! instance and address types, lookup classification, error kinds, mode
//! toggles, bootstrap credentials and object storage.
//!
//! # Supported Providers
//!
//! - **OpenStack**: Nova servers and floating IPs (`cirrus-cloud-openstack`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   Cirrus CLI                     │
//! │        (cirrus bootstrap / instances / stop)     │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 cirrus-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │        Environment Abstraction            │   │
//! │  │  trait Environ { ... }                    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │    Lookup    │  │   Storage    │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │   openstack   │
//! │   provider    │
//! └───────────────┘
//! ```

pub mod bootstrap;
pub mod credentials;
pub mod error;
pub mod instance;
pub mod lookup;
pub mod provider;
pub mod settings;
pub mod state;
pub mod storage;

// Re-exports
pub use bootstrap::{BootstrapPhase, BootstrapPolicy};
pub use credentials::{CaBundle, CredentialError, CredentialWriter};
pub use error::{
    BackendError, BootstrapAborted, BootstrapCause, CloudError, FloatingIpError, FloatingIpPhase,
    MetadataError, Result, StorageError,
};
pub use instance::{FloatingIp, Instance, InstanceId, InstanceStatus};
pub use lookup::LookupResult;
pub use provider::{ConnectionInfo, Environ, InstanceMetadata, MachineConfig};
pub use settings::{ProviderSettings, Timeouts};
pub use state::{ProviderState, StateStore};
pub use storage::{FileStorage, MemoryStorage, Storage};
