use std::fs;
use std::path::PathBuf;

use crate::config::generate::generate_starter_config;

/// Writes the starter config to the default location, or prints it when
/// `stdout` is set.
pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = match dirs::home_dir() {
        Some(home_dir) => home_dir.join(".config/logmill/config.yml"),
        None => PathBuf::from("/etc/logmill/config.yml"),
    };

    if config_path.exists() {
        eprintln!(
            "Error: Config file already exists at {}",
            config_path.display()
        );
        eprintln!("Remove it first or use --stdout to print the config");
        std::process::exit(1);
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}
