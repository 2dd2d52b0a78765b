use crate::utils;
use cirrus_cloud::Environ;
use colored::Colorize;

pub async fn handle(env: &dyn Environ) -> anyhow::Result<()> {
    println!("{} {} ({})", "Environment".bold(), env.name().cyan(), env.provider());

    let state_instances = env.state_instances().await?;
    if state_instances.is_empty() {
        println!("{}", "  not bootstrapped".dimmed());
    } else {
        let ids: Vec<&str> = state_instances.iter().map(|id| id.as_str()).collect();
        println!("  state servers: {}", ids.join(", ").green());
    }

    let instances = env.all_instances().await?;
    println!();
    if instances.is_empty() {
        println!("{}", "No instances".dimmed());
        return Ok(());
    }

    utils::print_instance_header();
    for instance in &instances {
        utils::print_instance(instance);
    }
    Ok(())
}
