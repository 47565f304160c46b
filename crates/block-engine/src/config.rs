use crate::grammar::SOURCE_EXTENSION;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Style normalization settings
    pub formatter: FormatterConfig,

    /// Regenerated program layout
    pub assembler: AssemblerConfig,

    /// Export archive layout
    pub archive: ArchiveConfig,
}

impl EngineConfig {
    /// Tighter layout: single blank line between top-level definitions
    pub fn compact() -> Self {
        Self {
            formatter: FormatterConfig {
                max_blank_lines_top_level: 1,
                blank_lines_around_definitions: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.formatter.validate()?;
        self.assembler.validate()?;
        self.archive.validate()
    }
}

/// Configuration for the formatter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Spaces per indentation level
    pub indent_width: usize,

    /// Report lines longer than this many grapheme clusters
    pub max_line_length: Option<usize>,

    /// Maximum consecutive blank lines at column 0
    pub max_blank_lines_top_level: usize,

    /// Maximum consecutive blank lines inside indented code
    pub max_blank_lines_nested: usize,

    /// Exact blank lines before and after top-level definitions
    pub blank_lines_around_definitions: usize,

    /// Apply token spacing rules (commas, brackets, operators, comments)
    pub normalize_spacing: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            indent_width: 4,
            max_line_length: None,
            max_blank_lines_top_level: 2,
            max_blank_lines_nested: 1,
            blank_lines_around_definitions: 2,
            normalize_spacing: true,
        }
    }
}

impl FormatterConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.indent_width == 0 {
            return Err("indent_width must be > 0".to_string());
        }

        if self.max_line_length == Some(0) {
            return Err("max_line_length must be > 0".to_string());
        }

        if self.blank_lines_around_definitions > self.max_blank_lines_top_level {
            return Err(format!(
                "blank_lines_around_definitions ({}) cannot exceed max_blank_lines_top_level ({})",
                self.blank_lines_around_definitions, self.max_blank_lines_top_level
            ));
        }

        Ok(())
    }
}

/// Configuration for the regenerated program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Name of the generated driver function
    pub driver_name: String,

    /// Emit the `if __name__ == '__main__':` trailer
    pub entry_guard: bool,

    /// Move each block's top-level imports into the shared import section
    pub hoist_imports: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            driver_name: "main".to_string(),
            entry_guard: true,
            hoist_imports: false,
        }
    }
}

impl AssemblerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !crate::types::is_identifier(&self.driver_name) {
            return Err(format!(
                "driver_name '{}' is not a valid identifier",
                self.driver_name
            ));
        }
        Ok(())
    }
}

/// Configuration for the export archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Member holding the regenerated program
    pub main_member: String,

    /// Member holding the per-block digest
    pub summary_member: String,

    /// Deflate level (1-9)
    pub compression_level: u8,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            main_member: format!("main.{SOURCE_EXTENSION}"),
            summary_member: "blocks_summary.txt".to_string(),
            compression_level: 6,
        }
    }
}

impl ArchiveConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.main_member.trim().is_empty() || self.summary_member.trim().is_empty() {
            return Err("archive member names must not be empty".to_string());
        }

        if self.main_member == self.summary_member {
            return Err(format!(
                "archive members must differ (both are '{}')",
                self.main_member
            ));
        }

        if !(1..=9).contains(&self.compression_level) {
            return Err(format!(
                "compression_level ({}) must be within 1-9",
                self.compression_level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_configs_valid() {
        assert!(EngineConfig::compact().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        // Invalid: zero indentation
        config.formatter.indent_width = 0;
        assert!(config.validate().is_err());
        config.formatter.indent_width = 4;

        // Invalid: definitions need more blank lines than allowed
        config.formatter.blank_lines_around_definitions = 3;
        assert!(config.validate().is_err());
        config.formatter.blank_lines_around_definitions = 2;

        // Invalid: driver name is not an identifier
        config.assembler.driver_name = "run all".to_string();
        assert!(config.validate().is_err());
        config.assembler.driver_name = "if".to_string();
        assert!(config.validate().is_err());
        config.assembler.driver_name = "main".to_string();

        // Invalid: both members share a name
        config.archive.summary_member = "main.py".to_string();
        assert!(config.validate().is_err());
        config.archive.summary_member = "blocks_summary.txt".to_string();

        // Invalid: compression level out of range
        config.archive.compression_level = 10;
        assert!(config.validate().is_err());
        config.archive.compression_level = 0;
        assert!(config.validate().is_err());
        config.archive.compression_level = 9;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"assembler": {"driver_name": "run"}}"#).unwrap();
        assert_eq!(config.assembler.driver_name, "run");
        assert!(config.assembler.entry_guard);
        assert!(!config.assembler.hoist_imports);
        assert_eq!(config.formatter, FormatterConfig::default());
    }
}
