use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use serde_yaml;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bookshelf")]
#[command(about = "Runs the bookshelf service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bookshelf")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct App {
    database: String,
    port: i32,
    #[serde(default)]
    pub turso_url: Option<String>,
    #[serde(default)]
    pub turso_auth_token: Option<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
}

fn default_sync_interval() -> u64 {
    60
}

impl App {
    pub fn get_db(&self) -> &str {
        &self.database
    }

    pub fn get_port(&self) -> i32 {
        self.port
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Auth {
    pub session_secret: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: i64,
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    /// Seeds the admin account at startup when it does not exist yet.
    #[serde(default)]
    pub admin_password: Option<String>,
    /// Accept a stored `legacy_password` that equals the submitted password.
    #[serde(default)]
    pub allow_plaintext_passwords: bool,
}

fn default_session_ttl() -> i64 {
    30 * 24 * 60 * 60
}

fn default_admin_email() -> String {
    "admin@gmail.com".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: App,
    pub auth: Auth,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        Config::from_yaml(&yaml_str)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Config> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.auth.session_secret.trim().is_empty() {
            anyhow::bail!("auth.session_secret must not be empty");
        }
        if self.auth.session_ttl_seconds <= 0 {
            anyhow::bail!("auth.session_ttl_seconds must be positive");
        }
        Ok(())
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!(var = var_name, "environment variable not found");
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_optional_fields() {
        let cfg = Config::from_yaml(
            r#"
app:
  database: bookshelf.db
  port: 8080
auth:
  session_secret: s3cret
"#,
        )
        .unwrap();

        assert_eq!(cfg.app.get_db(), "bookshelf.db");
        assert_eq!(cfg.app.get_port(), 8080);
        assert_eq!(cfg.app.sync_interval_seconds, 60);
        assert_eq!(cfg.auth.admin_email, "admin@gmail.com");
        assert_eq!(cfg.auth.session_ttl_seconds, 30 * 24 * 60 * 60);
        assert!(!cfg.auth.allow_plaintext_passwords);
        assert!(cfg.auth.admin_password.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_substitutes_default_when_variable_unset() {
        let out = Config::substitute_env_vars(
            "secret: ${BOOKSHELF_TEST_SURELY_UNSET_VAR:-fallback}\nport: 1",
        )
        .unwrap();
        assert_eq!(out, "secret: fallback\nport: 1");
    }

    #[test]
    fn test_rejects_empty_session_secret() {
        let cfg = Config::from_yaml(
            r#"
app:
  database: ":memory:"
  port: 1
auth:
  session_secret: ""
"#,
        )
        .unwrap();
        assert!(cfg.validate().is_err());
    }
}
