//! Instance metadata resolution
//!
//! A running instance learns its own addresses and id from the link-local
//! metadata service. In fixed-metadata mode the answers come from constants
//! and no request is made.

use async_trait::async_trait;
use cirrus_cloud::{InstanceId, InstanceMetadata, MetadataError, ProviderSettings};
use std::sync::Arc;

pub const DEFAULT_METADATA_ENDPOINT: &str = "http://169.254.169.254";

const PUBLIC_IPV4: &str = "latest/meta-data/public-ipv4";
const LOCAL_IPV4: &str = "latest/meta-data/local-ipv4";
const INSTANCE_ID: &str = "latest/meta-data/instance-id";

/// Answers served in fixed-metadata mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedMetadata {
    pub public_address: String,
    pub private_address: String,
    pub instance_id: InstanceId,
}

impl Default for FixedMetadata {
    fn default() -> Self {
        Self {
            public_address: "public.dummy.address.example.com".to_string(),
            private_address: "private.dummy.address.example.com".to_string(),
            instance_id: InstanceId::new("d8e02d56-2648-49a3-bf97-6be8f1204f38"),
        }
    }
}

pub struct MetadataResolver {
    http: reqwest::Client,
    endpoint: String,
    settings: Arc<ProviderSettings>,
    fixed: FixedMetadata,
}

impl MetadataResolver {
    /// Resolver against the well-known metadata endpoint.
    ///
    /// Proxies are bypassed; the service is only reachable on-link.
    pub fn new(settings: Arc<ProviderSettings>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            http,
            endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            settings,
            fixed: FixedMetadata::default(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_fixed(mut self, fixed: FixedMetadata) -> Self {
        self.fixed = fixed;
        self
    }

    async fn fetch(&self, key: &str) -> Result<String, MetadataError> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), key);
        tracing::debug!(%url, "querying instance metadata");

        let unreachable = |e: reqwest::Error| MetadataError::Unreachable {
            url: url.clone(),
            reason: e.to_string(),
        };

        let response = self
            .http
            .get(&url)
            .timeout(self.settings.timeouts().metadata)
            .send()
            .await
            .map_err(unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(unreachable)?;
        let value = body.trim();
        if value.is_empty() {
            return Err(MetadataError::Empty(key.to_string()));
        }
        Ok(value.to_string())
    }
}

#[async_trait]
impl InstanceMetadata for MetadataResolver {
    async fn public_address(&self) -> Result<String, MetadataError> {
        if self.settings.fixed_metadata() {
            return Ok(self.fixed.public_address.clone());
        }
        self.fetch(PUBLIC_IPV4).await
    }

    async fn private_address(&self) -> Result<String, MetadataError> {
        if self.settings.fixed_metadata() {
            return Ok(self.fixed.private_address.clone());
        }
        self.fetch(LOCAL_IPV4).await
    }

    async fn instance_id(&self) -> Result<InstanceId, MetadataError> {
        if self.settings.fixed_metadata() {
            return Ok(self.fixed.instance_id.clone());
        }
        self.fetch(INSTANCE_ID).await.map(InstanceId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubServer;
    use std::time::Duration;

    fn resolver(settings: &Arc<ProviderSettings>, stub: &StubServer) -> MetadataResolver {
        MetadataResolver::new(Arc::clone(settings))
            .unwrap()
            .with_endpoint(stub.url())
    }

    #[tokio::test]
    async fn test_fixed_mode_makes_no_requests() {
        let stub = StubServer::start().await;
        let settings = ProviderSettings::shared();
        settings.use_fixed_metadata(true);
        let metadata = resolver(&settings, &stub);

        assert_eq!(
            metadata.public_address().await.unwrap(),
            "public.dummy.address.example.com"
        );
        assert_eq!(
            metadata.private_address().await.unwrap(),
            "private.dummy.address.example.com"
        );
        assert_eq!(
            metadata.instance_id().await.unwrap().as_str(),
            "d8e02d56-2648-49a3-bf97-6be8f1204f38"
        );
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn test_live_mode_queries_service() {
        let stub = StubServer::start().await;
        stub.route("GET", "/latest/meta-data/public-ipv4", 200, "203.0.113.5\n");
        stub.route("GET", "/latest/meta-data/local-ipv4", 200, "10.0.0.5");
        stub.route("GET", "/latest/meta-data/instance-id", 200, "server-5");
        let metadata = resolver(&ProviderSettings::shared(), &stub);

        assert_eq!(metadata.public_address().await.unwrap(), "203.0.113.5");
        assert_eq!(metadata.private_address().await.unwrap(), "10.0.0.5");
        assert_eq!(metadata.instance_id().await.unwrap().as_str(), "server-5");

        let paths: Vec<_> = stub.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec![
                "/latest/meta-data/public-ipv4",
                "/latest/meta-data/local-ipv4",
                "/latest/meta-data/instance-id"
            ]
        );
    }

    #[tokio::test]
    async fn test_mode_switch_takes_effect() {
        let stub = StubServer::start().await;
        stub.route("GET", "/latest/meta-data/local-ipv4", 200, "10.0.0.5");
        let settings = ProviderSettings::shared();
        let metadata = resolver(&settings, &stub);

        settings.use_fixed_metadata(true);
        assert_eq!(
            metadata.private_address().await.unwrap(),
            "private.dummy.address.example.com"
        );

        settings.use_fixed_metadata(false);
        assert_eq!(metadata.private_address().await.unwrap(), "10.0.0.5");
        assert_eq!(stub.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_value_is_an_error() {
        let stub = StubServer::start().await;
        stub.route("GET", "/latest/meta-data/public-ipv4", 200, "  \n");
        let metadata = resolver(&ProviderSettings::shared(), &stub);

        let err = metadata.public_address().await.unwrap_err();
        assert!(matches!(err, MetadataError::Empty(_)));

        // No route registered: the stub answers 404.
        let err = metadata.private_address().await.unwrap_err();
        assert!(matches!(err, MetadataError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let stub = StubServer::start().await;
        let url = stub.url();
        drop(stub);
        let settings = ProviderSettings::shared();
        settings.use_short_timeouts(true);
        let metadata = MetadataResolver::new(settings).unwrap().with_endpoint(url);

        let err = metadata.instance_id().await.unwrap_err();
        assert!(matches!(err, MetadataError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_short_timeout_applies() {
        let stub = StubServer::start().await;
        stub.route_delayed(
            "GET",
            "/latest/meta-data/instance-id",
            200,
            "server-5",
            Duration::from_secs(2),
        );
        let settings = ProviderSettings::shared();
        settings.use_short_timeouts(true);
        let metadata = resolver(&settings, &stub);

        let err = metadata.instance_id().await.unwrap_err();
        assert!(matches!(err, MetadataError::Unreachable { .. }));
    }
}
