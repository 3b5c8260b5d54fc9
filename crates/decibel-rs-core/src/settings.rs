//! Settings for the decibel-rs framework.
//!
//! This module provides the [`Settings`] struct holding deployment
//! configuration: debug mode, logging, database connection details, and
//! per-model option overrides consumed by definition option resolution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Database connection configuration.
///
/// The model layer never connects itself; these settings are handed to
/// whichever query-executor implementation the application wires in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The database engine identifier (e.g. `mysql`, `sqlite`).
    pub engine: String,
    /// The database name (or file path for SQLite).
    pub name: String,
    /// The database user.
    pub user: String,
    /// The database password.
    pub password: String,
    /// The database host.
    pub host: String,
    /// The database port.
    pub port: u16,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: "sqlite".to_string(),
            name: "decibel.sqlite3".to_string(),
            user: String::new(),
            password: String::new(),
            host: String::new(),
            port: 0,
        }
    }
}

/// The complete set of framework settings.
///
/// # Examples
///
/// ```
/// use decibel_rs_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled. Debug mode enables the definition
    /// hierarchy mirror check and disables search result caching.
    pub debug: bool,
    /// The log filter (e.g. "info", "decibel_rs_model=debug").
    pub log_level: String,
    /// Database connection settings.
    pub database: DatabaseSettings,
    /// Per-deployment model option overrides, keyed by
    /// `"<qualified name>.<option name>"` (e.g. `"blog.Comment.parent_model"`).
    pub model_options: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            database: DatabaseSettings::default(),
            model_options: HashMap::new(),
        }
    }
}

impl Settings {
    /// Parses settings from a TOML string.
    ///
    /// Missing keys take their default values.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Partial {
            debug: Option<bool>,
            log_level: Option<String>,
            database: Option<DatabaseSettings>,
            model_options: Option<HashMap<String, serde_json::Value>>,
        }

        let partial: Partial = toml::from_str(content)?;
        let defaults = Self::default();
        Ok(Self {
            debug: partial.debug.unwrap_or(defaults.debug),
            log_level: partial.log_level.unwrap_or(defaults.log_level),
            database: partial.database.unwrap_or(defaults.database),
            model_options: partial.model_options.unwrap_or(defaults.model_options),
        })
    }

    /// Looks up a deployment-level model option override.
    pub fn model_option(&self, qualified_name: &str, option: &str) -> Option<&serde_json::Value> {
        self.model_options.get(&format!("{qualified_name}.{option}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.log_level, "info");
        assert_eq!(s.database.engine, "sqlite");
        assert!(s.model_options.is_empty());
    }

    #[test]
    fn test_settings_from_toml() {
        let s = Settings::from_toml_str(
            r#"
            debug = false
            log_level = "warn"

            [database]
            engine = "mysql"
            name = "app"
            user = "app"
            password = "secret"
            host = "localhost"
            port = 3306
            "#,
        )
        .unwrap();
        assert!(!s.debug);
        assert_eq!(s.log_level, "warn");
        assert_eq!(s.database.engine, "mysql");
        assert_eq!(s.database.port, 3306);
    }

    #[test]
    fn test_settings_from_toml_partial() {
        let s = Settings::from_toml_str("debug = false").unwrap();
        assert!(!s.debug);
        assert_eq!(s.log_level, "info");
    }

    #[test]
    fn test_model_option_lookup() {
        let mut s = Settings::default();
        s.model_options.insert(
            "blog.Comment.parent_model".to_string(),
            serde_json::json!("blog.Article"),
        );
        assert_eq!(
            s.model_option("blog.Comment", "parent_model"),
            Some(&serde_json::json!("blog.Article"))
        );
        assert!(s.model_option("blog.Comment", "missing").is_none());
    }
}
