use cirrus_cloud::{InstanceMetadata, ProviderSettings};
use cirrus_cloud_openstack::MetadataResolver;
use colored::Colorize;
use std::sync::Arc;

pub async fn handle(
    settings: Arc<ProviderSettings>,
    fixed: bool,
    endpoint: Option<String>,
) -> anyhow::Result<()> {
    settings.use_fixed_metadata(fixed);

    let mut resolver = MetadataResolver::new(settings)?;
    if let Some(endpoint) = endpoint {
        resolver = resolver.with_endpoint(endpoint);
    }

    let instance_id = resolver.instance_id().await?;
    let public_address = resolver.public_address().await?;
    let private_address = resolver.private_address().await?;

    println!("{:<16} {}", "instance-id".bold(), instance_id.as_str().cyan());
    println!("{:<16} {}", "public-address".bold(), public_address);
    println!("{:<16} {}", "private-address".bold(), private_address);
    Ok(())
}
