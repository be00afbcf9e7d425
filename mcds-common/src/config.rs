use serde::{Deserialize, Serialize};
use anyhow::Result;
use std::path::{Path, PathBuf};

// Which parts of a snapshot get loaded, and from where
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LoadConfig {
    /// Directory holding the manifest and its payload files.
    /// When absent, the directory is taken from the manifest path itself.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub microenv: bool,
    #[serde(default = "default_true")]
    pub graph: bool,
    #[serde(default = "default_true")]
    pub verbose: bool,
}

// Configuration for output settings, loaded from the [output] table
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    pub format: Option<String>, // "json", "bincode", "messagepack"
    #[serde(default = "default_true")]
    pub save_cells: bool,
    #[serde(default = "default_true")]
    pub save_units: bool,
    #[serde(default = "default_true")]
    pub save_concentrations: bool,
    #[serde(default = "default_true")]
    pub save_graphs: bool,
}

fn default_true() -> bool {
    true
}

fn default_base_filename() -> String {
    "mcds".to_string()
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            output_dir: None,
            microenv: true,
            graph: true,
            verbose: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            format: None,
            save_cells: true,
            save_units: true,
            save_concentrations: true,
            save_graphs: true,
        }
    }
}

/// Reader configuration, loaded from a TOML file. Every table is optional.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ReaderConfig {
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output formats understood by the exporters.
pub const OUTPUT_FORMATS: &[&str] = &["json", "bincode", "messagepack"];

impl ReaderConfig {
    /// Loads the reader configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: ReaderConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;

        if config.output.base_filename.trim().is_empty() {
            anyhow::bail!("output.base_filename must not be empty.");
        }
        if let Some(format) = config.output.format.as_deref() {
            if !OUTPUT_FORMATS.contains(&format) {
                anyhow::bail!(
                    "output.format '{}' is not one of {:?}.",
                    format,
                    OUTPUT_FORMATS
                );
            }
        }

        Ok(config)
    }

    /// The output format, defaulting to JSON.
    pub fn output_format(&self) -> &str {
        self.output.format.as_deref().unwrap_or("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ReaderConfig::from_toml_str("").unwrap();
        assert_eq!(config, ReaderConfig::default());
        assert!(config.load.microenv);
        assert!(config.load.graph);
        assert_eq!(config.output.base_filename, "mcds");
        assert_eq!(config.output_format(), "json");
    }

    #[test]
    fn partial_tables_keep_field_defaults() {
        let config = ReaderConfig::from_toml_str(
            r#"
            [load]
            output_dir = "output"
            graph = false

            [output]
            format = "bincode"
            save_graphs = false
            "#,
        )
        .unwrap();
        assert_eq!(config.load.output_dir, Some(PathBuf::from("output")));
        assert!(config.load.microenv);
        assert!(!config.load.graph);
        assert_eq!(config.output_format(), "bincode");
        assert!(config.output.save_cells);
        assert!(!config.output.save_graphs);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = ReaderConfig::from_toml_str("[output]\nformat = \"yaml\"\n").unwrap_err();
        assert!(err.to_string().contains("yaml"), "unexpected error: {}", err);
    }

    #[test]
    fn blank_base_filename_is_rejected() {
        assert!(ReaderConfig::from_toml_str("[output]\nbase_filename = \"  \"\n").is_err());
    }
}
