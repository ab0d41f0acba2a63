//! Configuration: TOML file + env var overrides + defaults.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FormbarError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub attributes: AttributeConfig,
    pub remote: RemoteConfig,
    pub display: DisplayConfig,
}

/// Names of the classes and attributes the page uses to declare logic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AttributeConfig {
    pub conditional_class: String,
    pub computed_class: String,
    /// Marks a conditional as fade-and-lock instead of show/hide.
    pub readonly_class: String,
    pub form_container_class: String,
    pub expression: String,
    /// Attribute of a computed element naming its output element id.
    pub target: String,
    /// Attribute of the `form` element holding the remote eval URL.
    pub eval_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base for relative eval and page-change URLs.
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    pub page_change_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Text shown by a computed field whose expression is falsy or failed.
    pub placeholder: String,
    pub faded_opacity: f64,
    pub full_opacity: f64,
    pub transition_ms: u64,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            conditional_class: "formbar-conditional".to_string(),
            computed_class: "formbar-evaluate".to_string(),
            readonly_class: "readonly".to_string(),
            form_container_class: "formbar-form".to_string(),
            expression: "expr".to_string(),
            target: "id".to_string(),
            eval_url: "evalurl".to_string(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 5_000,
            page_change_path: "/set_current_form_page".to_string(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            placeholder: "NaN".to_string(),
            faded_opacity: 0.4,
            full_opacity: 1.0,
            transition_ms: 1_500,
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load from `path` if given (it must exist), otherwise start from
    /// defaults. Env overrides and validation apply in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(path).map_err(|source| FormbarError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&raw)?
            }
            Some(path) => {
                return Err(FormbarError::MissingConfig {
                    path: path.to_path_buf(),
                })
            }
            None => Self::default(),
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(raw) = env_var("FORMBAR_REMOTE_BASE_URL") {
            self.remote.base_url = Some(raw);
        }
        set_env_u64("FORMBAR_REMOTE_TIMEOUT_MS", &mut self.remote.timeout_ms)?;
        if let Some(raw) = env_var("FORMBAR_DISPLAY_PLACEHOLDER") {
            self.display.placeholder = raw;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote.timeout_ms == 0 {
            return Err(FormbarError::InvalidConfig {
                details: "remote.timeout_ms must be > 0".to_string(),
            });
        }
        validate_opacity("display.faded_opacity", self.display.faded_opacity)?;
        validate_opacity("display.full_opacity", self.display.full_opacity)?;

        let names = [
            ("attributes.conditional_class", &self.attributes.conditional_class),
            ("attributes.computed_class", &self.attributes.computed_class),
            ("attributes.readonly_class", &self.attributes.readonly_class),
            ("attributes.expression", &self.attributes.expression),
            ("attributes.target", &self.attributes.target),
            ("attributes.eval_url", &self.attributes.eval_url),
        ];
        for (name, value) in names {
            if value.trim().is_empty() {
                return Err(FormbarError::InvalidConfig {
                    details: format!("{name} must not be empty"),
                });
            }
        }
        Ok(())
    }
}

fn validate_opacity(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(FormbarError::InvalidConfig {
            details: format!("{name} must be in [0,1], got {value}"),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u64>().map_err(|error| FormbarError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = Config::from_toml(
            r#"
            [remote]
            timeout_ms = 250

            [attributes]
            expression = "data-rule"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.remote.timeout_ms, 250);
        assert_eq!(cfg.attributes.expression, "data-rule");
        assert_eq!(cfg.attributes.computed_class, "formbar-evaluate");
        assert_eq!(cfg.display.placeholder, "NaN");
    }

    #[test]
    fn out_of_range_opacity_is_rejected() {
        let mut cfg = Config::default();
        cfg.display.faded_opacity = 1.5;
        assert_eq!(cfg.validate().unwrap_err().code(), "FB-1001");
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/formbar.toml"))).unwrap_err();
        assert_eq!(err.code(), "FB-1002");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::from_toml("remote = 3").unwrap_err();
        assert_eq!(err.code(), "FB-1003");
    }
}
