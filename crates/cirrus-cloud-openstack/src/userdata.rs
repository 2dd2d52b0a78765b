//! Server user data
//!
//! The machine configuration is delivered to a new server as a
//! `#cloud-config` document that drops the agent's settings on disk.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cirrus_cloud::MachineConfig;
use serde::Serialize;
use std::collections::BTreeMap;

/// Where the agent reads its settings on the instance
pub const AGENT_CONFIG_PATH: &str = "/var/lib/cirrus/agent.yaml";

#[derive(Serialize)]
struct CloudConfig {
    write_files: Vec<WriteFile>,
}

#[derive(Serialize)]
struct WriteFile {
    path: &'static str,
    permissions: &'static str,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct AgentConfig<'a> {
    machine_id: &'a str,
    state_addrs: &'a [String],
    api_addrs: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    options: &'a BTreeMap<String, String>,
}

/// Render the `#cloud-config` document for `machine`
pub fn render(machine: &MachineConfig) -> Result<String, serde_yaml::Error> {
    let agent = AgentConfig {
        machine_id: &machine.machine_id,
        state_addrs: &machine.state_info.addrs,
        api_addrs: &machine.api_info.addrs,
        tag: machine.state_info.tag.as_deref(),
        password: machine.state_info.password.as_deref(),
        options: &machine.options,
    };

    let config = CloudConfig {
        write_files: vec![WriteFile {
            path: AGENT_CONFIG_PATH,
            permissions: "0600",
            content: serde_yaml::to_string(&agent)?,
        }],
    };

    Ok(format!("#cloud-config\n{}", serde_yaml::to_string(&config)?))
}

/// Rendered user data, base64 encoded for the create-server request
pub fn encode(machine: &MachineConfig) -> Result<String, serde_yaml::Error> {
    Ok(STANDARD.encode(render(machine)?))
}
