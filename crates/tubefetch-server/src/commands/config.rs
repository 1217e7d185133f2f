use anyhow::Result;
use std::path::Path;
use tubefetch_core::config::Config;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("# tubefetch configuration (effective)\n");
    println!("{}", toml::to_string_pretty(&config)?);

    println!("# Active strategy order:");
    for (i, strategy) in config.strategies().iter().enumerate() {
        println!("#   {}. {}", i + 1, strategy.name);
    }

    println!("\n# Config sources (later entries override earlier ones):");
    println!("#   1. Built-in defaults");
    if let Some(config_dir) = dirs::config_dir() {
        println!("#   2. {}/tubefetch/config.toml", config_dir.display());
    }
    if let Some(p) = config_path {
        println!("#   3. {} (specified)", p.display());
    }
    println!("#   4. Environment variables (TUBEFETCH_*, nested keys split on __)");

    Ok(())
}
