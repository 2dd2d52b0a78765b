//! In-memory compute backend
//!
//! Backs the CLI's `--local` mode and the provider tests. Every call is
//! appended to a call log, and a failure can be injected per operation
//! through a named control point.

use crate::compute::{ComputeApi, FloatingIpRecord, ServerAddress, ServerRecord, ServerSpec};
use async_trait::async_trait;
use cirrus_cloud::BackendError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Operation names used by the call log and by control points
pub mod ops {
    pub const LIST_SERVERS: &str = "listServers";
    pub const CREATE_SERVER: &str = "createServer";
    pub const DELETE_SERVER: &str = "deleteServer";
    pub const LIST_FLOATING_IPS: &str = "listFloatingIPs";
    pub const ALLOCATE_FLOATING_IP: &str = "allocateFloatingIP";
    pub const ASSOCIATE_FLOATING_IP: &str = "associateFloatingIP";
}

type ControlPoint = Arc<dyn Fn() -> Result<(), BackendError> + Send + Sync>;

#[derive(Default)]
struct Inner {
    servers: Vec<ServerRecord>,
    floating_ips: Vec<FloatingIpRecord>,
    calls: Vec<String>,
    control_points: HashMap<String, ControlPoint>,
    next_server: u32,
    next_floating_ip: u32,
}

/// Compute backend held in process memory.
///
/// Clones share the same servers, addresses and call log.
#[derive(Clone, Default)]
pub struct MemoryCompute {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCompute {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log the call and run its control point, if one is registered
    fn enter(&self, op: &str) -> Result<(), BackendError> {
        let control = {
            let mut inner = self.lock();
            inner.calls.push(op.to_string());
            inner.control_points.get(op).cloned()
        };
        match control {
            Some(control) => control(),
            None => Ok(()),
        }
    }

    /// Run `control` before every call of `op` until the guard is dropped.
    ///
    /// An `Err` from `control` fails the call without touching backend state.
    pub fn register_control_point<F>(&self, op: &str, control: F) -> ControlPointGuard
    where
        F: Fn() -> Result<(), BackendError> + Send + Sync + 'static,
    {
        self.lock()
            .control_points
            .insert(op.to_string(), Arc::new(control));
        ControlPointGuard {
            inner: Arc::clone(&self.inner),
            op: op.to_string(),
        }
    }

    /// Operations called so far, oldest first
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of calls made to `op`
    pub fn count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Add an allocated, unassociated floating IP to the pool
    pub fn add_floating_ip(&self, address: &str) -> FloatingIpRecord {
        let mut inner = self.lock();
        inner.next_floating_ip += 1;
        let record = FloatingIpRecord {
            id: inner.next_floating_ip.to_string(),
            ip: address.to_string(),
            instance_id: None,
            pool: Some("public".to_string()),
            fixed_ip: None,
        };
        inner.floating_ips.push(record.clone());
        record
    }

    pub fn servers(&self) -> Vec<ServerRecord> {
        self.lock().servers.clone()
    }

    pub fn floating_ips(&self) -> Vec<FloatingIpRecord> {
        self.lock().floating_ips.clone()
    }
}

/// Host `n` inside the /16 named by `prefix`, wrapping after 65535
fn host_address(prefix: [u8; 2], n: u32) -> String {
    format!("{}.{}.{}.{}", prefix[0], prefix[1], (n >> 8) & 0xff, n & 0xff)
}

/// Removes its control point when dropped
pub struct ControlPointGuard {
    inner: Arc<Mutex<Inner>>,
    op: String,
}

impl Drop for ControlPointGuard {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.control_points.remove(&self.op);
    }
}

#[async_trait]
impl ComputeApi for MemoryCompute {
    async fn list_servers(&self) -> Result<Vec<ServerRecord>, BackendError> {
        self.enter(ops::LIST_SERVERS)?;
        Ok(self.lock().servers.clone())
    }

    async fn create_server(&self, spec: &ServerSpec) -> Result<ServerRecord, BackendError> {
        self.enter(ops::CREATE_SERVER)?;
        let mut inner = self.lock();
        inner.next_server += 1;
        let n = inner.next_server;

        let server = ServerRecord {
            id: format!("{:08x}-0000-4000-8000-{:012x}", n, n),
            name: spec.name.clone(),
            status: "ACTIVE".to_string(),
            addresses: HashMap::from([(
                "private".to_string(),
                vec![ServerAddress {
                    addr: host_address([10, 0], n + 1),
                    version: Some(4),
                    kind: Some("fixed".to_string()),
                }],
            )]),
        };
        inner.servers.push(server.clone());
        Ok(server)
    }

    async fn delete_server(&self, id: &str) -> Result<(), BackendError> {
        self.enter(ops::DELETE_SERVER)?;
        let mut inner = self.lock();
        let Some(index) = inner.servers.iter().position(|s| s.id == id) else {
            return Err(BackendError::NotFound(format!("server {}", id)));
        };
        inner.servers.remove(index);
        for fip in inner.floating_ips.iter_mut() {
            if fip.instance_id.as_deref() == Some(id) {
                fip.instance_id = None;
                fip.fixed_ip = None;
            }
        }
        Ok(())
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIpRecord>, BackendError> {
        self.enter(ops::LIST_FLOATING_IPS)?;
        Ok(self.lock().floating_ips.clone())
    }

    async fn allocate_floating_ip(&self) -> Result<FloatingIpRecord, BackendError> {
        self.enter(ops::ALLOCATE_FLOATING_IP)?;
        let mut inner = self.lock();
        inner.next_floating_ip += 1;
        let n = inner.next_floating_ip;
        let record = FloatingIpRecord {
            id: n.to_string(),
            ip: host_address([198, 18], n),
            instance_id: None,
            pool: Some("public".to_string()),
            fixed_ip: None,
        };
        inner.floating_ips.push(record.clone());
        Ok(record)
    }

    async fn associate_floating_ip(
        &self,
        server_id: &str,
        address: &str,
    ) -> Result<(), BackendError> {
        self.enter(ops::ASSOCIATE_FLOATING_IP)?;
        let mut inner = self.lock();
        let inner = &mut *inner;

        let server = inner
            .servers
            .iter_mut()
            .find(|s| s.id == server_id)
            .ok_or_else(|| BackendError::NotFound(format!("server {}", server_id)))?;
        let fip = inner
            .floating_ips
            .iter_mut()
            .find(|f| f.ip == address)
            .ok_or_else(|| BackendError::NotFound(format!("floating IP {}", address)))?;

        if let Some(current) = fip.instance_id.as_deref().filter(|id| *id != server_id) {
            return Err(BackendError::Api {
                status: 409,
                message: format!("floating IP {} is associated with {}", address, current),
            });
        }

        fip.instance_id = Some(server_id.to_string());
        fip.fixed_ip = server.private_address();
        server
            .addresses
            .entry("private".to_string())
            .or_default()
            .push(ServerAddress {
                addr: address.to_string(),
                version: Some(4),
                kind: Some("floating".to_string()),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};
    use std::net::Ipv4Addr;

    fn spec(name: &str) -> ServerSpec {
        ServerSpec {
            name: name.to_string(),
            image_ref: "image".to_string(),
            flavor_ref: "m1.small".to_string(),
            user_data: None,
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_delete_server() {
        let compute = MemoryCompute::new();
        let server = compute.create_server(&spec("a")).await.unwrap();
        assert_eq!(server.private_address().as_deref(), Some("10.0.0.2"));
        assert_eq!(compute.list_servers().await.unwrap().len(), 1);

        compute.delete_server(&server.id).await.unwrap();
        assert!(compute.list_servers().await.unwrap().is_empty());

        let err = compute.delete_server(&server.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_control_point_injects_failure() {
        let compute = MemoryCompute::new();
        let guard = compute.register_control_point(ops::CREATE_SERVER, || {
            Err(BackendError::Api {
                status: 500,
                message: "failed on purpose".to_string(),
            })
        });

        let err = compute.create_server(&spec("a")).await.unwrap_err();
        assert!(err.to_string().contains("failed on purpose"));
        assert!(compute.servers().is_empty());

        drop(guard);
        compute.create_server(&spec("a")).await.unwrap();
        assert_eq!(compute.count(ops::CREATE_SERVER), 2);
    }

    #[tokio::test]
    async fn test_associate_floating_ip() {
        let compute = MemoryCompute::new();
        let server = compute.create_server(&spec("a")).await.unwrap();
        let fip = compute.allocate_floating_ip().await.unwrap();

        compute
            .associate_floating_ip(&server.id, &fip.ip)
            .await
            .unwrap();

        let servers = compute.servers();
        assert_eq!(servers[0].public_address(), Some(fip.ip.clone()));
        let fips = compute.floating_ips();
        assert_eq!(fips[0].instance_id.as_deref(), Some(server.id.as_str()));

        let err = compute
            .associate_floating_ip(&server.id, "198.51.100.1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_addresses_stay_valid_past_one_octet() {
        let compute = MemoryCompute::new();
        let mut private = HashSet::new();
        let mut public = HashSet::new();
        for i in 0..300 {
            let server = compute.create_server(&spec(&i.to_string())).await.unwrap();
            let fip = compute.allocate_floating_ip().await.unwrap();
            private.insert(server.private_address().unwrap().parse::<Ipv4Addr>().unwrap());
            public.insert(fip.ip.parse::<Ipv4Addr>().unwrap());
        }
        assert_eq!(private.len(), 300);
        assert_eq!(public.len(), 300);
        assert!(private.contains(&Ipv4Addr::new(10, 0, 1, 45)));
        assert!(public.contains(&Ipv4Addr::new(198, 18, 1, 44)));
    }

    #[tokio::test]
    async fn test_call_log_order() {
        let compute = MemoryCompute::new();
        compute.list_servers().await.unwrap();
        compute.list_floating_ips().await.unwrap();
        assert_eq!(compute.calls(), vec![ops::LIST_SERVERS, ops::LIST_FLOATING_IPS]);

        compute.clear_calls();
        assert!(compute.calls().is_empty());
    }
}
