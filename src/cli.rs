//! Command-line options shared by the foundry binaries

use std::fs::File;
use std::io::BufReader;

use clap::Args;

use crate::error::Result;
use crate::types::EngineConfig;

/// Engine configuration flags, flattened into each binary's arguments
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Engine configuration file (JSON); flags below override it
    #[arg(long)]
    pub config: Option<String>,

    /// Maximum list nesting depth (default: 10)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Comma-separated list fields to keep inline as JSON text
    #[arg(long)]
    pub inline_fields: Option<String>,
}

impl ConfigArgs {
    /// Load the config file, if any, then apply flag overrides
    pub fn build(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
            None => EngineConfig::default(),
        };

        if let Some(depth) = self.max_depth {
            config.max_depth = depth;
        }
        if let Some(fields_str) = &self.inline_fields {
            config.inline_fields = fields_str
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = TestCli::try_parse_from(["foundry"]).unwrap();
        let config = cli.config.build().unwrap();
        assert_eq!(config.max_depth, 10);
        assert!(config.inline_fields.is_empty());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_depth": 4, "id_field": "key", "inline_fields": ["a"]}}"#).unwrap();
        let path = file.path().display().to_string();

        let cli = TestCli::try_parse_from([
            "foundry",
            "--config",
            path.as_str(),
            "--inline-fields",
            "tags, notes,",
        ])
        .unwrap();
        let config = cli.config.build().unwrap();

        assert_eq!(config.max_depth, 4);
        assert_eq!(config.id_field, "key");
        assert_eq!(config.value_column, "value");
        assert_eq!(config.inline_fields, vec!["tags", "notes"]);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = TestCli::try_parse_from(["foundry", "--config", "/no/such/foundry.json"]).unwrap();
        assert!(cli.config.build().is_err());
    }
}
