// Show the effective configuration

use monomind_orchestration::MonoConfig;

use super::{Command, CommandContext};
use crate::error::CliResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Yaml,
    Json,
}

/// Print the configuration after file and environment sources are merged
pub struct ConfigCommand {
    pub format: ConfigFormat,
}

impl ConfigCommand {
    pub fn new(format: ConfigFormat) -> Self {
        Self { format }
    }

    pub fn render(&self, config: &MonoConfig) -> CliResult<String> {
        Ok(match self.format {
            ConfigFormat::Toml => config.to_toml_string()?,
            ConfigFormat::Yaml => config.to_yaml_string()?,
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        })
    }
}

#[async_trait::async_trait]
impl Command for ConfigCommand {
    async fn execute(&self, context: &CommandContext) -> CliResult<()> {
        if !context.quiet {
            let source = match &context.config_source {
                Some(path) => path.display().to_string(),
                None => "defaults".to_string(),
            };
            eprintln!("{}", context.style().info(&format!("Configuration source: {}", source)));
        }
        println!("{}", self.render(&context.config)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_formats() {
        let config = MonoConfig::default();

        let toml = ConfigCommand::new(ConfigFormat::Toml).render(&config).unwrap();
        assert!(toml.contains("[build]"));

        let yaml = ConfigCommand::new(ConfigFormat::Yaml).render(&config).unwrap();
        assert!(yaml.contains("max_concurrent: 4"));

        let json = ConfigCommand::new(ConfigFormat::Json).render(&config).unwrap();
        let parsed: MonoConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
