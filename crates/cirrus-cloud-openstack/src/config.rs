//! Typed attributes of one OpenStack environment

use crate::error::{OpenStackError, Result};
use crate::nova::Credentials;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const PROVIDER_TYPE: &str = "openstack";

fn default_provider_type() -> String {
    PROVIDER_TYPE.to_string()
}

fn default_instance_type() -> String {
    "m1.small".to_string()
}

fn default_true() -> bool {
    true
}

/// One entry of `environments.yaml`
///
/// ```yaml
/// type: openstack
/// auth-url: https://keystone.example.com:5000/v2.0
/// username: admin
/// password: secret
/// tenant-name: cirrus
/// region: RegionOne
/// default-image-id: 0f602ea9-c09e-440c-9e29-cfae5635afa3
/// default-instance-type: m1.small
/// use-floating-ip: true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnvironConfig {
    /// Set from the key under `environments:`
    #[serde(default, skip_serializing)]
    pub name: String,

    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    #[serde(default)]
    pub auth_url: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub tenant_name: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub default_image_id: Option<String>,

    #[serde(default = "default_instance_type")]
    pub default_instance_type: String,

    /// Attach a public address to started instances
    #[serde(default = "default_true")]
    pub use_floating_ip: bool,

    /// PEM CA certificate; generated at bootstrap when unset together with `ca-key`
    #[serde(default)]
    pub ca_cert: Option<String>,

    #[serde(default)]
    pub ca_key: Option<String>,

    /// Directory holding the provider-state document
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

impl EnvironConfig {
    /// Parse the attributes of environment `name`
    pub fn from_yaml_value(name: &str, value: serde_yaml::Value) -> Result<Self> {
        let mut config: EnvironConfig = serde_yaml::from_value(value)?;
        config.name = name.to_string();
        Ok(config)
    }

    /// Fill unset credential attributes from `OS_*` environment variables
    pub fn apply_env_defaults(&mut self) {
        let fill = |slot: &mut Option<String>, var: &str| {
            if slot.is_none()
                && let Ok(value) = std::env::var(var)
                && !value.is_empty()
            {
                tracing::debug!(var, "using environment variable");
                *slot = Some(value);
            }
        };
        fill(&mut self.auth_url, "OS_AUTH_URL");
        fill(&mut self.username, "OS_USERNAME");
        fill(&mut self.password, "OS_PASSWORD");
        fill(&mut self.tenant_name, "OS_TENANT_NAME");
        fill(&mut self.region, "OS_REGION_NAME");
    }

    /// Check the attributes every environment needs
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(OpenStackError::MissingAttribute("name"));
        }
        if self.provider_type != PROVIDER_TYPE {
            return Err(OpenStackError::InvalidAttribute {
                name: "type",
                reason: format!("expected \"{}\", got \"{}\"", PROVIDER_TYPE, self.provider_type),
            });
        }
        if self.default_image_id.as_deref().is_none_or(str::is_empty) {
            return Err(OpenStackError::MissingAttribute("default-image-id"));
        }
        if self.default_instance_type.is_empty() {
            return Err(OpenStackError::InvalidAttribute {
                name: "default-instance-type",
                reason: "must not be empty".to_string(),
            });
        }
        if self.ca_cert.is_some() != self.ca_key.is_some() {
            return Err(OpenStackError::InvalidAttribute {
                name: "ca-cert",
                reason: "ca-cert and ca-key must be set together".to_string(),
            });
        }
        Ok(())
    }

    /// Identity service credentials; all but `region` are required
    pub fn credentials(&self) -> Result<Credentials> {
        fn required(value: &Option<String>, name: &'static str) -> Result<String> {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or(OpenStackError::MissingAttribute(name))
        }

        let auth_url = required(&self.auth_url, "auth-url")?;
        if !(auth_url.starts_with("http://") || auth_url.starts_with("https://")) {
            return Err(OpenStackError::InvalidAttribute {
                name: "auth-url",
                reason: format!("not an http(s) URL: {}", auth_url),
            });
        }

        Ok(Credentials {
            auth_url,
            username: required(&self.username, "username")?,
            password: required(&self.password, "password")?,
            tenant_name: required(&self.tenant_name, "tenant-name")?,
            region: self.region.clone().filter(|r| !r.is_empty()),
        })
    }

    pub fn image_id(&self) -> &str {
        self.default_image_id.as_deref().unwrap_or_default()
    }
}
