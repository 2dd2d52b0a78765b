//! Floating IP allocation and association

use crate::compute::ComputeApi;
use cirrus_cloud::{FloatingIp, FloatingIpError, Instance};
use std::sync::Arc;

/// Two-phase public address protocol: allocate, then associate.
///
/// There is no retry loop; each phase makes at most one attempt.
pub struct NetworkAllocator {
    compute: Arc<dyn ComputeApi>,
}

impl NetworkAllocator {
    pub fn new(compute: Arc<dyn ComputeApi>) -> Self {
        Self { compute }
    }

    /// Obtain an address, reusing an unassociated one when the pool has it
    pub async fn allocate(&self) -> Result<FloatingIp, FloatingIpError> {
        let existing = self
            .compute
            .list_floating_ips()
            .await
            .map_err(FloatingIpError::Allocation)?;

        let free = existing
            .into_iter()
            .map(FloatingIp::from)
            .find(|fip| !fip.is_associated());
        if let Some(fip) = free {
            tracing::debug!(address = %fip, "reusing floating IP");
            return Ok(fip);
        }

        let fip = self
            .compute
            .allocate_floating_ip()
            .await
            .map(FloatingIp::from)
            .map_err(FloatingIpError::Allocation)?;
        tracing::info!(address = %fip, "allocated floating IP");
        Ok(fip)
    }

    /// Attach `fip` to `instance`.
    ///
    /// On failure the address stays allocated and is returned in the error.
    pub async fn associate(
        &self,
        instance: &Instance,
        mut fip: FloatingIp,
    ) -> Result<FloatingIp, FloatingIpError> {
        match self
            .compute
            .associate_floating_ip(instance.id.as_str(), &fip.address)
            .await
        {
            Ok(()) => {
                tracing::info!(address = %fip, instance = %instance.id, "associated floating IP");
                fip.instance = Some(instance.id.clone());
                Ok(fip)
            }
            Err(source) => Err(FloatingIpError::Association {
                address: fip,
                instance: instance.id.clone(),
                source,
            }),
        }
    }

    pub async fn allocate_and_associate(
        &self,
        instance: &Instance,
    ) -> Result<FloatingIp, FloatingIpError> {
        let fip = self.allocate().await?;
        self.associate(instance, fip).await
    }
}
