use crate::utils;
use cirrus_cloud::{CloudError, Environ, MachineConfig};
use cirrus_cloud_openstack::OpenStackEnviron;
use colored::Colorize;

pub async fn handle(
    env: &OpenStackEnviron,
    machine_id: &str,
    no_public_ip: bool,
) -> anyhow::Result<()> {
    if no_public_ip {
        env.set_use_floating_ip(false);
    }

    println!("{} {}", "Starting machine".blue(), machine_id.cyan());
    let machine = MachineConfig::new(machine_id);
    match env.start_instance(&machine).await {
        Ok(instance) => {
            utils::print_instance_header();
            utils::print_instance(&instance);
            Ok(())
        }
        Err(CloudError::PublicAddress { instance, source }) => {
            println!(
                "{} {}",
                "Instance started without a public address:".yellow(),
                instance.id.as_str().cyan()
            );
            if let Some(orphan) = source.orphaned_address() {
                println!("  floating IP {} is allocated but not attached", orphan);
            }
            Err(CloudError::PublicAddress { instance, source }.into())
        }
        Err(e) => Err(e.into()),
    }
}
