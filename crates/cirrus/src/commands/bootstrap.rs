use crate::utils::FileCredentialWriter;
use cirrus_cloud::{BootstrapPolicy, Environ};
use cirrus_cloud_openstack::OpenStackEnviron;
use colored::Colorize;

pub async fn handle(env: &OpenStackEnviron, no_public_ip: bool) -> anyhow::Result<()> {
    println!(
        "{} {}",
        "Bootstrapping environment".blue(),
        env.name().cyan()
    );

    let writer = FileCredentialWriter::new(cirrus_config::get_config_dir()?);
    let policy = BootstrapPolicy::new(env.use_floating_ip() && !no_public_ip);
    if !policy.require_public_ip {
        println!("{}", "  public IP: not requested".dimmed());
    }

    let done = env.bootstrap_with(policy, &writer).await?;

    for phase in &done.phases {
        println!("  {} {}", "•".dimmed(), phase);
    }
    println!();
    println!("{}", "✓ Bootstrap complete".green().bold());
    println!("  instance: {}", done.instance.id.as_str().cyan());
    if let Some(fip) = &done.public_address {
        println!("  public address: {}", fip.address.cyan());
    }
    if let Some(address) = &done.instance.private_address {
        println!("  private address: {}", address);
    }
    println!(
        "  CA certificate: {}",
        writer.cert_path(env.name()).display()
    );
    Ok(())
}
