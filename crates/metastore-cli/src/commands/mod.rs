//! CLI subcommands

pub mod delete;
pub mod get;
pub mod info;
pub mod put;
pub mod search;
pub mod update;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use metastore::{DataObjectClient, ResponseParser, StoreConfig};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::output::{report, Outcome};

/// Options shared by every subcommand
pub struct Session {
    config_path: Option<PathBuf>,
    tenant: Option<String>,
}

impl Session {
    pub fn new(config_path: Option<PathBuf>, tenant: Option<String>) -> Self {
        Self {
            config_path,
            tenant,
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    pub fn config(&self) -> Result<StoreConfig> {
        StoreConfig::load(self.config_path()).with_context(|| match self.config_path() {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration from the environment".to_string(),
        })
    }

    pub fn client(&self) -> Result<DataObjectClient> {
        let config = self.config()?;
        if config.backend_type == metastore::BackendType::Embedded {
            report(Outcome::Warning, "Embedded backend: documents live only for this process");
        }
        DataObjectClient::from_config(&config).context("Failed to create backend")
    }
}

/// A JSON object from an inline argument or a file
pub fn read_object(inline: Option<String>, file: Option<PathBuf>) -> Result<Map<String, Value>> {
    let raw = match (inline, file) {
        (Some(raw), None) => raw,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (Some(_), Some(_)) => bail!("Pass either an inline document or --file, not both"),
        (None, None) => bail!("A JSON document is required (inline or --file)"),
    };
    match serde_json::from_str(&raw).context("Failed to parse JSON document")? {
        Value::Object(map) => Ok(map),
        other => bail!("Expected a JSON object, got {}", other),
    }
}

/// Split comma-separated values
pub fn split_list(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pretty-print the raw backend result
pub fn print_raw(parser: Option<&ResponseParser>) -> Result<()> {
    if let Some(parser) = parser {
        let value = parser.to_value()?;
        println!("{}", "Backend response:".dimmed());
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_object_inline() {
        let map = read_object(Some(r#"{"name":"a1"}"#.to_string()), None).unwrap();
        assert_eq!(map["name"], "a1");

        assert!(read_object(Some("[1,2]".to_string()), None).is_err());
        assert!(read_object(None, None).is_err());
    }

    #[test]
    fn test_split_list() {
        let fields = split_list(&["a,b".to_string(), " c ".to_string(), ",".to_string()]);
        assert_eq!(fields, vec!["a", "b", "c"]);
    }
}
