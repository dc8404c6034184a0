//! CQL library resolution configuration

use crate::content::LibraryContentKind;
use crate::error::{LibraryError, LibraryResult};
use crate::options::TranslatorOptions;
use serde::{Deserialize, Serialize};

/// Configuration for library resolution and caching
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CqlLibraryConfig {
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CqlLibraryConfig {
    pub fn validate(&self) -> LibraryResult<()> {
        self.translator.translator_options()?;

        if self.content.cql_content_types.is_empty() {
            return Err(LibraryError::config("content.cql_content_types must not be empty"));
        }
        if self.content.elm_json_content_types.is_empty() {
            return Err(LibraryError::config(
                "content.elm_json_content_types must not be empty",
            ));
        }
        if self.content.elm_xml_content_types.is_empty() {
            return Err(LibraryError::config(
                "content.elm_xml_content_types must not be empty",
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&level.as_str()) {
            return Err(LibraryError::config(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

/// Compiler options libraries must be built with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default = "default_translator_options")]
    pub options: Vec<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            options: default_translator_options(),
        }
    }
}

impl TranslatorConfig {
    pub fn translator_options(&self) -> LibraryResult<TranslatorOptions> {
        TranslatorOptions::from_names(&self.options)
    }
}

fn default_translator_options() -> Vec<String> {
    TranslatorOptions::default_options()
        .iter()
        .map(|option| option.to_string())
        .collect()
}

/// Attachment content types recognised for each content kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_cql_content_types")]
    pub cql_content_types: Vec<String>,

    #[serde(default = "default_elm_json_content_types")]
    pub elm_json_content_types: Vec<String>,

    #[serde(default = "default_elm_xml_content_types")]
    pub elm_xml_content_types: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            cql_content_types: default_cql_content_types(),
            elm_json_content_types: default_elm_json_content_types(),
            elm_xml_content_types: default_elm_xml_content_types(),
        }
    }
}

impl ContentConfig {
    pub fn content_types(&self, kind: LibraryContentKind) -> &[String] {
        match kind {
            LibraryContentKind::Cql => &self.cql_content_types,
            LibraryContentKind::ElmJson => &self.elm_json_content_types,
            LibraryContentKind::ElmXml => &self.elm_xml_content_types,
        }
    }
}

fn default_cql_content_types() -> Vec<String> {
    vec!["text/cql".to_string()]
}

fn default_elm_json_content_types() -> Vec<String> {
    vec!["application/elm+json".to_string()]
}

fn default_elm_xml_content_types() -> Vec<String> {
    vec!["application/elm+xml".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub mod loader {
    use super::CqlLibraryConfig;
    use crate::error::{LibraryError, LibraryResult};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Load configuration from an optional TOML file plus environment overrides,
    /// e.g. `OCTOFHIR_CQL__LOGGING__LEVEL=debug`.
    pub fn load_config(path: Option<&str>) -> LibraryResult<CqlLibraryConfig> {
        let mut builder = Config::builder();
        if let Some(p) = path {
            let pathbuf = PathBuf::from(p);
            if pathbuf.exists() {
                builder = builder.add_source(File::from(pathbuf));
            } else {
                tracing::debug!(path = p, "Config file does not exist, using defaults");
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("OCTOFHIR_CQL")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("translator.options")
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| LibraryError::config(format!("config build error: {e}")))?;
        let merged: CqlLibraryConfig = cfg
            .try_deserialize()
            .map_err(|e| LibraryError::config(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
