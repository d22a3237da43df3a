//! `agora init`: Write a default config file.

use agora_config::AppConfig;
use anyhow::Context;

use super::GlobalOpts;

pub fn run(opts: &GlobalOpts, force: bool) -> anyhow::Result<()> {
    let config_path = opts.config_path();

    println!("Agora Setup");
    println!("=============\n");

    if let Some(dir) = config_path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() && !force {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\nNext: run `agora hello` to check that agents can connect.\n");

    Ok(())
}
