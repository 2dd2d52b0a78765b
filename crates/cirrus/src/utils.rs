use cirrus_cloud::{CredentialWriter, Instance, InstanceStatus, MemoryStorage, ProviderSettings};
use cirrus_cloud_openstack::{EnvironConfig, MemoryCompute, OpenStackEnviron};
use cirrus_config::{ConfigError, Environments};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

/// 環境定義ファイルがないときの `--local` の環境名
const LOCAL_ENVIRONMENT: &str = "local";

/// 選択した環境を開く
pub fn open_environ(
    name: Option<&str>,
    local: bool,
    settings: Arc<ProviderSettings>,
) -> anyhow::Result<OpenStackEnviron> {
    if local {
        let config = local_config(name)?;
        tracing::info!(environment = %config.name, "using in-memory backend");
        let env = OpenStackEnviron::new(
            config,
            Arc::new(MemoryCompute::new()),
            Arc::new(MemoryStorage::new()),
            settings,
        )?;
        return Ok(env);
    }

    let environments = Environments::discover()?;
    let selected = environments.select(name)?;
    let mut config = EnvironConfig::from_yaml_value(&selected.name, selected.attributes)?;
    if config.storage_dir.is_none() {
        config.storage_dir = Some(cirrus_config::default_storage_dir(&selected.name)?);
    }
    Ok(OpenStackEnviron::open(config, settings)?)
}

/// 設定済みの環境、なければ組み込みの環境
fn local_config(name: Option<&str>) -> anyhow::Result<EnvironConfig> {
    match Environments::discover() {
        Ok(environments) => {
            let selected = environments.select(name)?;
            Ok(EnvironConfig::from_yaml_value(
                &selected.name,
                selected.attributes,
            )?)
        }
        Err(ConfigError::EnvironmentsFileNotFound) => {
            let attributes = serde_yaml::from_str("type: openstack\ndefault-image-id: local-image\n")?;
            Ok(EnvironConfig::from_yaml_value(
                name.unwrap_or(LOCAL_ENVIRONMENT),
                attributes,
            )?)
        }
        Err(e) => Err(e.into()),
    }
}

/// ブートストラップの認証情報を PEM ファイルとして書き出す
pub struct FileCredentialWriter {
    dir: PathBuf,
}

impl FileCredentialWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn cert_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}-cert.pem", name))
    }

    pub fn key_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}-private-key.pem", name))
    }
}

impl CredentialWriter for FileCredentialWriter {
    fn write(&self, name: &str, cert: &[u8], key: &[u8]) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.cert_path(name), cert)?;

        let key_path = self.key_path(name);
        std::fs::write(&key_path, key)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

pub fn print_instance_header() {
    println!(
        "{}",
        format!(
            "{:<38} {:<32} {:<10} {:<16} {:<16}",
            "ID", "NAME", "STATUS", "PUBLIC", "PRIVATE"
        )
        .bold()
    );
    println!("{}", "─".repeat(116).dimmed());
}

pub fn print_instance(instance: &Instance) {
    let status = format!("{:<10}", instance.status.to_string());
    let status = match instance.status {
        InstanceStatus::Running => status.green(),
        InstanceStatus::Building => status.yellow(),
        InstanceStatus::Error => status.red(),
        _ => status.dimmed(),
    };
    println!(
        "{} {:<32} {} {:<16} {:<16}",
        format!("{:<38}", instance.id.as_str()).cyan(),
        instance.name,
        status,
        instance.public_address.as_deref().unwrap_or("-"),
        instance.private_address.as_deref().unwrap_or("-"),
    );
}
