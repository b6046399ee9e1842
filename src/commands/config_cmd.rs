use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use super::OutputFormat;
use fooddude::config::{Config, ConfigValue};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# fooddude configuration

# Food-composition database (default: <data dir>/foods.db)
# food_db_path: ~/.local/share/fooddude/foods.db

# Local state such as changes waiting to be sent (default: ~/.local/share/fooddude)
# data_dir: ~/.local/share/fooddude

# Whose food log to read and write
user_id: default

# Meal used when a phrase does not name one
default_meal: breakfast

# Document server
# sync:
#   server_url: "http://localhost:8080"
#   api_key: "your-key"

# Speech-to-text for `fooddude voice` (voice-server, openai or disabled)
transcription:
  backend: voice-server
  url: "http://localhost:4000"
  timeout_secs: 30

# Recorder program; the output file path is appended to args
# capture:
#   program: arecord
#   args: ["-q", "-f", "S16_LE", "-r", "16000", "-c", "1", "-t", "wav"]
#   mime: audio/wav
"#;

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        cli_config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
                    }
                    OutputFormat::Text => print_config(config),
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = cli_config_path.unwrap_or_else(Config::default_config_path);

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'fooddude config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

fn print_value<T: std::fmt::Display>(name: &str, value: &ConfigValue<T>) {
    println!("{}: {}", name, value.value);
    println!("  source: {}", value.source);
    println!();
}

fn print_config(config: &Config) {
    println!("Configuration");
    println!("=============\n");

    if let Some(path) = &config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!(
            "Config file: {} (not found)",
            Config::default_config_path().display()
        );
    }
    println!();

    println!("food_db_path: {}", config.food_db_path.value.display());
    println!("  source: {}", config.food_db_path.source);
    println!();
    println!("data_dir: {}", config.data_dir.value.display());
    println!("  source: {}", config.data_dir.source);
    println!();
    print_value("user_id", &config.user_id);
    print_value("default_meal", &config.default_meal);

    println!(
        "sync.server_url: {}",
        config.sync.server_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "sync.api_key: {}",
        if config.sync.api_key.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    println!();

    println!(
        "transcription: {:?} at {}",
        config.transcription.backend, config.transcription.url
    );
    println!(
        "capture: {} {}",
        config.capture.program,
        config.capture.args.join(" ")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file_parses() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, DEFAULT_CONFIG).unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.user_id.value, "default");
        assert!(!config.sync.is_configured());
        assert_eq!(config.transcription.timeout_secs, 30);
    }
}
