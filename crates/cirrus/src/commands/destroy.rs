use cirrus_cloud::Environ;
use colored::Colorize;
use std::io::Write;

pub async fn handle(env: &dyn Environ, yes: bool) -> anyhow::Result<()> {
    if !yes {
        print!(
            "{} {}? [y/N] ",
            "Destroy every instance in environment".red(),
            env.name().cyan()
        );
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("{}", "Cancelled".yellow());
            return Ok(());
        }
    }

    env.destroy().await?;
    println!("{} {}", "✓ Destroyed".green(), env.name().cyan());
    Ok(())
}
