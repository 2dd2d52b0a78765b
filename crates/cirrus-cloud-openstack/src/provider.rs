//! OpenStack environment implementation

use crate::bootstrap::{BootstrapCoordinator, Bootstrapped};
use crate::compute::ComputeApi;
use crate::config::{EnvironConfig, PROVIDER_TYPE};
use crate::error::{OpenStackError, Result};
use crate::instances::InstanceManager;
use crate::network::NetworkAllocator;
use crate::nova::NovaClient;
use async_trait::async_trait;
use cirrus_cloud::{
    BootstrapAborted, BootstrapCause, BootstrapPhase, BootstrapPolicy, CaBundle, CloudError,
    CredentialWriter, Environ, FileStorage, Instance, InstanceId, MachineConfig, ProviderSettings,
    StateStore, Storage, StorageError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// An OpenStack environment
pub struct OpenStackEnviron {
    config: EnvironConfig,
    settings: Arc<ProviderSettings>,
    instances: InstanceManager,
    network: NetworkAllocator,
    state: StateStore,
    use_floating_ip: AtomicBool,
    bootstrap_lock: tokio::sync::Mutex<()>,
}

impl OpenStackEnviron {
    /// Environment over explicit compute and storage backends
    pub fn new(
        config: EnvironConfig,
        compute: Arc<dyn ComputeApi>,
        storage: Arc<dyn Storage>,
        settings: Arc<ProviderSettings>,
    ) -> Result<Self> {
        config.validate()?;

        let instances = InstanceManager::new(
            Arc::clone(&compute),
            config.name.clone(),
            config.image_id(),
            config.default_instance_type.clone(),
        );
        let network = NetworkAllocator::new(compute);

        tracing::debug!(
            environment = %config.name,
            use_floating_ip = config.use_floating_ip,
            "opened environment"
        );
        Ok(Self {
            use_floating_ip: AtomicBool::new(config.use_floating_ip),
            config,
            settings,
            instances,
            network,
            state: StateStore::new(storage),
            bootstrap_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Environment talking to the compute API over HTTP, with file storage
    /// under `storage-dir`
    pub fn open(mut config: EnvironConfig, settings: Arc<ProviderSettings>) -> Result<Self> {
        config.apply_env_defaults();
        config.validate()?;

        let credentials = config.credentials()?;
        let storage_dir = config
            .storage_dir
            .clone()
            .ok_or(OpenStackError::MissingAttribute("storage-dir"))?;

        let compute = Arc::new(NovaClient::new(credentials, Arc::clone(&settings)));
        let storage = Arc::new(FileStorage::new(storage_dir));
        Self::new(config, compute, storage, settings)
    }

    pub fn config(&self) -> &EnvironConfig {
        &self.config
    }

    pub fn settings(&self) -> &Arc<ProviderSettings> {
        &self.settings
    }

    /// Whether started instances get a public address
    pub fn use_floating_ip(&self) -> bool {
        self.use_floating_ip.load(Ordering::SeqCst)
    }

    pub fn set_use_floating_ip(&self, enabled: bool) {
        if self.use_floating_ip.swap(enabled, Ordering::SeqCst) != enabled {
            tracing::debug!(environment = %self.config.name, enabled, "public IP requirement changed");
        }
    }

    /// Bootstrap under an explicit policy.
    ///
    /// Fails with [`BootstrapCause::InProgress`] while another bootstrap of
    /// this environment is running.
    pub async fn bootstrap_with(
        &self,
        policy: BootstrapPolicy,
        writer: &dyn CredentialWriter,
    ) -> cirrus_cloud::Result<Bootstrapped> {
        let aborted_idle = |cause: BootstrapCause| BootstrapAborted {
            phase: BootstrapPhase::Idle,
            instance: None,
            cause,
        };

        let Ok(_guard) = self.bootstrap_lock.try_lock() else {
            return Err(aborted_idle(BootstrapCause::InProgress).into());
        };

        let credentials = CaBundle::from_config(
            &self.config.name,
            self.config.ca_cert.as_deref(),
            self.config.ca_key.as_deref(),
        )
        .map_err(|e| aborted_idle(BootstrapCause::Credentials(e)))?;

        tracing::info!(
            environment = %self.config.name,
            require_public_ip = policy.require_public_ip,
            "bootstrapping environment"
        );
        let coordinator = BootstrapCoordinator::new(
            &self.config.name,
            &self.instances,
            &self.network,
            &self.state,
            credentials,
            policy,
        );
        Ok(coordinator.run(writer).await?)
    }
}

#[async_trait]
impl Environ for OpenStackEnviron {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn provider(&self) -> &str {
        PROVIDER_TYPE
    }

    async fn bootstrap(&self, writer: &dyn CredentialWriter) -> cirrus_cloud::Result<Instance> {
        let policy = BootstrapPolicy::new(self.use_floating_ip());
        let done = self.bootstrap_with(policy, writer).await?;
        Ok(done.instance)
    }

    /// Empty when the environment has not been bootstrapped
    async fn state_instances(&self) -> cirrus_cloud::Result<Vec<InstanceId>> {
        match self.state.load().await {
            Ok(state) => Ok(state.state_instances),
            Err(StorageError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn start_instance(&self, machine: &MachineConfig) -> cirrus_cloud::Result<Instance> {
        let instance = self.instances.start_instance(machine).await?;
        if !self.use_floating_ip() {
            return Ok(instance);
        }

        match self.network.allocate_and_associate(&instance).await {
            Ok(fip) => Ok(instance.with_public_address(fip.address)),
            Err(source) => Err(CloudError::PublicAddress {
                instance: Box::new(instance),
                source,
            }),
        }
    }

    async fn stop_instances(&self, instances: &[Instance]) -> cirrus_cloud::Result<()> {
        self.instances.stop_instances(instances).await
    }

    async fn instances(&self, ids: &[InstanceId]) -> cirrus_cloud::Result<Vec<Instance>> {
        self.instances.instances(ids).await
    }

    async fn all_instances(&self) -> cirrus_cloud::Result<Vec<Instance>> {
        self.instances.all_instances().await
    }

    async fn destroy(&self) -> cirrus_cloud::Result<()> {
        let instances = self.instances.all_instances().await?;
        tracing::info!(environment = %self.config.name, count = instances.len(), "destroying environment");
        self.instances.stop_instances(&instances).await?;
        self.state.remove().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCompute, ops};
    use cirrus_cloud::{BackendError, FloatingIpPhase, MemoryStorage};
    use std::sync::Mutex;

    fn config(use_floating_ip: bool) -> EnvironConfig {
        let yaml = format!(
            "type: openstack\ndefault-image-id: image-1\nuse-floating-ip: {}\n",
            use_floating_ip
        );
        EnvironConfig::from_yaml_value("sample", serde_yaml::from_str(&yaml).unwrap()).unwrap()
    }

    fn environ(compute: &MemoryCompute, use_floating_ip: bool) -> OpenStackEnviron {
        OpenStackEnviron::new(
            config(use_floating_ip),
            Arc::new(compute.clone()),
            Arc::new(MemoryStorage::new()),
            ProviderSettings::shared(),
        )
        .unwrap()
    }

    #[derive(Default)]
    struct Written(Mutex<Vec<String>>);

    impl CredentialWriter for Written {
        fn write(&self, name: &str, cert: &[u8], key: &[u8]) -> anyhow::Result<()> {
            assert!(String::from_utf8_lossy(cert).contains("BEGIN CERTIFICATE"));
            assert!(String::from_utf8_lossy(key).contains("PRIVATE KEY"));
            self.0.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    #[derive(Debug, PartialEq)]
    enum Expect {
        Ok,
        NoInstances,
        Partial,
    }

    #[tokio::test]
    async fn test_instance_gathering() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, false);
        let id0 = env
            .start_instance(&MachineConfig::new("100"))
            .await
            .unwrap()
            .id;
        let id1 = env
            .start_instance(&MachineConfig::new("101"))
            .await
            .unwrap()
            .id;

        let cases: Vec<(Vec<&str>, Expect, usize)> = vec![
            (vec!["id0"], Expect::Ok, 1),
            (vec!["id0", "id0"], Expect::Ok, 2),
            (vec!["id0", "id1"], Expect::Ok, 2),
            (vec!["id1", "id0"], Expect::Ok, 2),
            (vec!["id1", "id0", "id1"], Expect::Ok, 3),
            (vec![""], Expect::NoInstances, 0),
            (vec!["", ""], Expect::NoInstances, 0),
            (vec!["", "", ""], Expect::NoInstances, 0),
            (vec!["id0", ""], Expect::Partial, 2),
            (vec!["", "id1"], Expect::Partial, 2),
            (vec!["id0", "id1", ""], Expect::Partial, 3),
            (vec!["id0", "", "id0"], Expect::Partial, 3),
            (vec!["id0", "id0", ""], Expect::Partial, 3),
            (vec!["", "id0", "id1"], Expect::Partial, 3),
        ];

        for (raw, expect, len) in cases {
            let ids: Vec<InstanceId> = raw
                .iter()
                .map(|s| match *s {
                    "id0" => id0.clone(),
                    "id1" => id1.clone(),
                    _ => InstanceId::absent(),
                })
                .collect();

            let (got, entries) = match env.instances(&ids).await {
                Ok(found) => (
                    Expect::Ok,
                    found.into_iter().map(|i| Some(i.id)).collect::<Vec<_>>(),
                ),
                Err(CloudError::NoInstances) => (Expect::NoInstances, Vec::new()),
                Err(CloudError::PartialInstances(found)) => (
                    Expect::Partial,
                    found.into_iter().map(|i| i.map(|i| i.id)).collect(),
                ),
                Err(other) => panic!("{raw:?}: unexpected error {other}"),
            };

            assert_eq!(got, expect, "{raw:?}");
            assert_eq!(entries.len(), len, "{raw:?}");
            for (requested, entry) in ids.iter().zip(&entries) {
                match entry {
                    Some(id) => assert_eq!(id, requested, "{raw:?}"),
                    None => assert!(requested.is_empty(), "{raw:?}"),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_start_instance_without_public_ip() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, false);

        let instance = env
            .start_instance(&MachineConfig::new("100"))
            .await
            .unwrap();
        assert!(instance.public_address.is_none());
        assert_eq!(compute.count(ops::ALLOCATE_FLOATING_IP), 0);
        assert_eq!(compute.count(ops::ASSOCIATE_FLOATING_IP), 0);
    }

    #[tokio::test]
    async fn test_start_instance_with_public_ip() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, true);

        let instance = env
            .start_instance(&MachineConfig::new("100"))
            .await
            .unwrap();
        assert!(instance.public_address.is_some());

        let found = env.instances(&[instance.id.clone()]).await.unwrap();
        assert_eq!(found[0].public_address, instance.public_address);
    }

    #[tokio::test]
    async fn test_start_instance_public_ip_failure() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, true);
        let _guard = compute.register_control_point(ops::ALLOCATE_FLOATING_IP, || {
            Err(BackendError::Api {
                status: 500,
                message: "failed on purpose".to_string(),
            })
        });

        let err = env
            .start_instance(&MachineConfig::new("100"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot allocate a public IP as needed"));
        match err {
            CloudError::PublicAddress { instance, source } => {
                assert_eq!(instance.name, "cirrus-sample-machine-100");
                assert_eq!(source.phase(), FloatingIpPhase::Allocate);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_toggle_public_ip_requirement() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, true);
        env.set_use_floating_ip(false);
        env.set_use_floating_ip(false);
        assert!(!env.use_floating_ip());

        env.start_instance(&MachineConfig::new("1")).await.unwrap();
        assert_eq!(compute.count(ops::ALLOCATE_FLOATING_IP), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_without_public_ip() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, false);
        let writer = Written::default();

        let instance = env.bootstrap(&writer).await.unwrap();

        assert_eq!(instance.name, "cirrus-sample-machine-0");
        assert_eq!(compute.count(ops::ALLOCATE_FLOATING_IP), 0);
        assert_eq!(compute.count(ops::ASSOCIATE_FLOATING_IP), 0);
        assert_eq!(*writer.0.lock().unwrap(), vec!["sample".to_string()]);
        assert_eq!(env.state_instances().await.unwrap(), vec![instance.id]);
    }

    #[tokio::test]
    async fn test_bootstrap_fails_when_public_ip_error() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, true);
        let writer = Written::default();
        let _guard = compute.register_control_point(ops::ALLOCATE_FLOATING_IP, || {
            Err(BackendError::Api {
                status: 500,
                message: "failed on purpose".to_string(),
            })
        });

        let err = env.bootstrap(&writer).await.unwrap_err();

        assert!(err.to_string().contains("cannot allocate a public IP as needed"));
        assert!(writer.0.lock().unwrap().is_empty());
        assert!(env.state_instances().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_twice() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, false);
        let writer = Written::default();

        env.bootstrap(&writer).await.unwrap();
        let err = env.bootstrap(&writer).await.unwrap_err();
        assert!(err.to_string().contains("environment is already bootstrapped"));
        assert_eq!(compute.count(ops::CREATE_SERVER), 1);
    }

    #[tokio::test]
    async fn test_concurrent_bootstrap_is_rejected() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, false);
        let writer = Written::default();

        let _running = env.bootstrap_lock.try_lock().unwrap();
        let err = env.bootstrap(&writer).await.unwrap_err();

        match err {
            CloudError::Bootstrap(aborted) => {
                assert_eq!(aborted.phase, BootstrapPhase::Idle);
                assert!(matches!(aborted.cause, BootstrapCause::InProgress));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(compute.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_with_explicit_policy() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, false);
        let writer = Written::default();

        let done = env
            .bootstrap_with(BootstrapPolicy::new(true), &writer)
            .await
            .unwrap();
        assert!(done.public_address.is_some());
        assert!(done.phases.contains(&BootstrapPhase::AddressAssociating));
    }

    #[tokio::test]
    async fn test_destroy() {
        let compute = MemoryCompute::new();
        let env = environ(&compute, false);
        env.bootstrap(&Written::default()).await.unwrap();
        env.start_instance(&MachineConfig::new("1")).await.unwrap();
        assert_eq!(env.all_instances().await.unwrap().len(), 2);

        env.destroy().await.unwrap();

        assert!(env.all_instances().await.unwrap().is_empty());
        assert!(env.state_instances().await.unwrap().is_empty());
        env.bootstrap(&Written::default()).await.unwrap();
    }

    #[test]
    fn test_open_requires_storage_dir() {
        let mut config = config(true);
        config.auth_url = Some("https://keystone.example.com/v2.0".to_string());
        config.username = Some("admin".to_string());
        config.password = Some("secret".to_string());
        config.tenant_name = Some("tenant".to_string());

        let err = OpenStackEnviron::open(config.clone(), ProviderSettings::shared())
            .err()
            .unwrap();
        assert!(matches!(err, OpenStackError::MissingAttribute("storage-dir")));

        let dir = tempfile::tempdir().unwrap();
        config.storage_dir = Some(dir.path().to_path_buf());
        let env = OpenStackEnviron::open(config, ProviderSettings::shared()).unwrap();
        assert_eq!(env.provider(), "openstack");
        assert_eq!(env.name(), "sample");
    }
}
