use cirrus_cloud::{CloudError, Environ, InstanceId};
use colored::Colorize;

pub async fn handle(env: &dyn Environ, ids: &[String]) -> anyhow::Result<()> {
    let ids: Vec<InstanceId> = ids.iter().map(|id| InstanceId::new(id.as_str())).collect();

    // 解決できたIDのみ停止する
    let instances = match env.instances(&ids).await {
        Ok(instances) => instances,
        Err(CloudError::PartialInstances(found)) => found.into_iter().flatten().collect(),
        Err(CloudError::NoInstances) => {
            println!("{}", "No instances found".yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    env.stop_instances(&instances).await?;
    for instance in &instances {
        println!("{} {}", "✓ Stopped".green(), instance.id.as_str().cyan());
    }
    Ok(())
}
