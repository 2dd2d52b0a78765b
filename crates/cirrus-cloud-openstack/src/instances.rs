//! Instance lookup and lifecycle on top of the compute API

use crate::compute::{ComputeApi, ServerSpec};
use crate::userdata;
use cirrus_cloud::{
    BackendError, CloudError, Instance, InstanceId, LookupResult, MachineConfig, Result,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Server metadata key naming the owning environment
pub const ENVIRONMENT_KEY: &str = "cirrus-environment";

/// Server metadata key naming the logical machine
pub const MACHINE_KEY: &str = "cirrus-machine-id";

/// Instance operations with orchestrator-level error semantics.
///
/// Holds no instance cache: every call queries the backend.
pub struct InstanceManager {
    compute: Arc<dyn ComputeApi>,
    environment: String,
    image_id: String,
    flavor: String,
}

impl InstanceManager {
    pub fn new(
        compute: Arc<dyn ComputeApi>,
        environment: impl Into<String>,
        image_id: impl Into<String>,
        flavor: impl Into<String>,
    ) -> Self {
        Self {
            compute,
            environment: environment.into(),
            image_id: image_id.into(),
            flavor: flavor.into(),
        }
    }

    /// Server name for a machine slot: `cirrus-<env>-machine-<id>`
    pub fn server_name(&self, machine_id: &str) -> String {
        format!("{}{}", self.name_prefix(), machine_id)
    }

    fn name_prefix(&self) -> String {
        format!("cirrus-{}-machine-", self.environment)
    }

    /// Resolve `ids` against one listing of the backend's servers
    pub async fn lookup(&self, ids: &[InstanceId]) -> std::result::Result<LookupResult, BackendError> {
        let servers = self.compute.list_servers().await?;
        let result = LookupResult::resolve(ids, servers.iter().map(|s| s.to_instance()));
        tracing::debug!(
            requested = result.len(),
            found = result.found(),
            "resolved instances"
        );
        Ok(result)
    }

    /// Instances for `ids`, one per id in request order
    pub async fn instances(&self, ids: &[InstanceId]) -> Result<Vec<Instance>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.lookup(ids).await?.into_result()
    }

    /// Every server named after this environment
    pub async fn all_instances(&self) -> Result<Vec<Instance>> {
        let prefix = self.name_prefix();
        let servers = self.compute.list_servers().await?;
        Ok(servers
            .iter()
            .filter(|s| s.name.starts_with(&prefix))
            .map(|s| s.to_instance())
            .collect())
    }

    /// Create one server for `machine`
    pub async fn start_instance(&self, machine: &MachineConfig) -> Result<Instance> {
        let user_data = userdata::encode(machine)
            .map_err(|e| CloudError::InvalidConfig(format!("cannot render user data: {}", e)))?;

        let spec = ServerSpec {
            name: self.server_name(&machine.machine_id),
            image_ref: self.image_id.clone(),
            flavor_ref: self.flavor.clone(),
            user_data: Some(user_data),
            metadata: BTreeMap::from([
                (ENVIRONMENT_KEY.to_string(), self.environment.clone()),
                (MACHINE_KEY.to_string(), machine.machine_id.clone()),
            ]),
        };

        tracing::info!(name = %spec.name, image = %spec.image_ref, flavor = %spec.flavor_ref, "starting instance");
        let server = self.compute.create_server(&spec).await?;
        let instance = server.to_instance();
        tracing::info!(instance = %instance.id, "started instance");
        Ok(instance)
    }

    /// Delete every instance, continuing past failures.
    ///
    /// Servers that are already gone count as stopped and empty ids are
    /// skipped. Fails with the ids that could not be stopped and the first
    /// backend error.
    pub async fn stop_instances(&self, instances: &[Instance]) -> Result<()> {
        let mut failed = Vec::new();
        let mut first_error = None;

        for instance in instances.iter().filter(|i| !i.id.is_empty()) {
            match self.compute.delete_server(instance.id.as_str()).await {
                Ok(()) => tracing::info!(instance = %instance.id, "stopped instance"),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(instance = %instance.id, "instance already gone")
                }
                Err(e) => {
                    tracing::warn!(instance = %instance.id, error = %e, "cannot stop instance");
                    failed.push(instance.id.clone());
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(source) => Err(CloudError::StopInstances { failed, source }),
        }
    }
}
