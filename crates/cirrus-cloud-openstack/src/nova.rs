//! Compute API client
//!
//! Authenticates against the identity service (Keystone v2), then talks to
//! the compute endpoint found in the service catalogue. The session token is
//! cached for the client's lifetime and dropped on a 401.

use crate::compute::{ComputeApi, FloatingIpRecord, ServerRecord, ServerSpec};
use async_trait::async_trait;
use cirrus_cloud::{BackendError, ProviderSettings};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Identity service credentials
#[derive(Clone)]
pub struct Credentials {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub tenant_name: String,
    /// Compute endpoint region; the first endpoint is used when unset
    pub region: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant_name", &self.tenant_name)
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    compute_url: String,
}

/// Compute API over HTTP
pub struct NovaClient {
    http: reqwest::Client,
    credentials: Credentials,
    settings: Arc<ProviderSettings>,
    session: Mutex<Option<Session>>,
}

impl NovaClient {
    pub fn new(credentials: Credentials, settings: Arc<ProviderSettings>) -> Self {
        Self::with_http(reqwest::Client::new(), credentials, settings)
    }

    pub fn with_http(
        http: reqwest::Client,
        credentials: Credentials,
        settings: Arc<ProviderSettings>,
    ) -> Self {
        Self {
            http,
            credentials,
            settings,
            session: Mutex::new(None),
        }
    }

    /// Current session, authenticating first if there is none
    async fn session(&self) -> Result<Session, BackendError> {
        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref() {
            return Ok(current.clone());
        }

        let fresh = self.authenticate().await?;
        *session = Some(fresh.clone());
        Ok(fresh)
    }

    async fn authenticate(&self) -> Result<Session, BackendError> {
        let url = format!("{}/tokens", self.credentials.auth_url.trim_end_matches('/'));
        tracing::debug!(%url, username = %self.credentials.username, "authenticating");

        let body = json!({
            "auth": {
                "passwordCredentials": {
                    "username": self.credentials.username,
                    "password": self.credentials.password,
                },
                "tenantName": self.credentials.tenant_name,
            }
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .timeout(self.settings.timeouts().request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(BackendError::Authentication(format!(
                "identity service rejected credentials for {}",
                self.credentials.username
            )));
        }
        let response = check_status(response).await?;
        let access: AccessResponse = decode(response).await?;

        let compute_url = access
            .access
            .compute_endpoint(self.credentials.region.as_deref())
            .ok_or_else(|| {
                BackendError::InvalidResponse(
                    "service catalogue has no compute endpoint".to_string(),
                )
            })?;

        tracing::debug!(%compute_url, "authenticated");
        Ok(Session {
            token: access.access.token.id,
            compute_url,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, BackendError> {
        let session = self.session().await?;
        let url = format!("{}/{}", session.compute_url.trim_end_matches('/'), path);
        tracing::debug!(%method, %url, "compute request");

        let mut request = self
            .http
            .request(method, &url)
            .header("X-Auth-Token", &session.token)
            .timeout(self.settings.timeouts().request);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.session.lock().await.take();
            return Err(BackendError::Authentication(format!(
                "token rejected for {}",
                url
            )));
        }
        check_status(response).await
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(e.to_string())
    } else {
        BackendError::Transport(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let message = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => BackendError::NotFound(url),
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            BackendError::Timeout(e.to_string())
        } else {
            BackendError::InvalidResponse(e.to_string())
        }
    })
}

#[derive(Debug, Deserialize)]
struct AccessResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: String,
}

impl Access {
    fn compute_endpoint(&self, region: Option<&str>) -> Option<String> {
        self.service_catalog
            .iter()
            .filter(|entry| entry.service_type == "compute")
            .flat_map(|entry| entry.endpoints.iter())
            .find(|endpoint| region.is_none_or(|r| endpoint.region.as_deref() == Some(r)))
            .map(|endpoint| endpoint.public_url.clone())
    }
}

#[derive(Deserialize)]
struct ServersResponse {
    servers: Vec<ServerRecord>,
}

#[derive(Deserialize)]
struct ServerResponse {
    server: ServerRecord,
}

#[derive(Deserialize)]
struct FloatingIpsResponse {
    floating_ips: Vec<FloatingIpRecord>,
}

#[derive(Deserialize)]
struct FloatingIpResponse {
    floating_ip: FloatingIpRecord,
}

#[async_trait]
impl ComputeApi for NovaClient {
    async fn list_servers(&self) -> Result<Vec<ServerRecord>, BackendError> {
        let response = self.send(Method::GET, "servers/detail", None).await?;
        let servers: ServersResponse = decode(response).await?;
        Ok(servers.servers)
    }

    async fn create_server(&self, spec: &ServerSpec) -> Result<ServerRecord, BackendError> {
        let body = json!({ "server": spec });
        let response = self.send(Method::POST, "servers", Some(&body)).await?;
        let created: ServerResponse = decode(response).await?;

        // The create response only carries the id and links.
        let mut server = created.server;
        if server.name.is_empty() {
            server.name = spec.name.clone();
        }
        if server.status.is_empty() {
            server.status = "BUILD".to_string();
        }
        Ok(server)
    }

    async fn delete_server(&self, id: &str) -> Result<(), BackendError> {
        self.send(Method::DELETE, &format!("servers/{}", id), None)
            .await?;
        Ok(())
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIpRecord>, BackendError> {
        let response = self.send(Method::GET, "os-floating-ips", None).await?;
        let fips: FloatingIpsResponse = decode(response).await?;
        Ok(fips.floating_ips)
    }

    async fn allocate_floating_ip(&self) -> Result<FloatingIpRecord, BackendError> {
        let body = json!({});
        let response = self
            .send(Method::POST, "os-floating-ips", Some(&body))
            .await?;
        let fip: FloatingIpResponse = decode(response).await?;
        Ok(fip.floating_ip)
    }

    async fn associate_floating_ip(
        &self,
        server_id: &str,
        address: &str,
    ) -> Result<(), BackendError> {
        let body = json!({ "addFloatingIp": { "address": address } });
        self.send(
            Method::POST,
            &format!("servers/{}/action", server_id),
            Some(&body),
        )
        .await?;
        Ok(())
    }
}
