use crate::utils;
use cirrus_cloud::{CloudError, Environ, InstanceId};
use colored::Colorize;

pub async fn handle(env: &dyn Environ, ids: &[String]) -> anyhow::Result<()> {
    let ids: Vec<InstanceId> = ids.iter().map(|id| InstanceId::new(id.as_str())).collect();

    let found: Vec<Option<_>> = match env.instances(&ids).await {
        Ok(instances) => instances.into_iter().map(Some).collect(),
        Err(CloudError::PartialInstances(found)) => {
            println!("{}", "Some instances were not found".yellow());
            found
        }
        Err(CloudError::NoInstances) => {
            println!("{}", "No instances found".yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    utils::print_instance_header();
    for (id, instance) in ids.iter().zip(&found) {
        match instance {
            Some(instance) => utils::print_instance(instance),
            None => println!("{:<38} {}", id.as_str(), "not found".red()),
        }
    }
    Ok(())
}
