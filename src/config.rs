use crate::registry::ApiToken;
use crate::version::DEFAULT_PROBE_INTERVAL_MINUTES;
use anyhow::{Context, Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub webserver: Webserver,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Webserver {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    pub token: ApiToken,
    /// Registry serving connector images
    pub public_url: String,
    #[serde(default = "default_registry_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub ca_certificate_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileConfig {
    #[serde(default = "default_schedule")]
    pub schedule: String,
    /// Glob patterns of namespaces whose resources are reconciled
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
    #[serde(default = "default_probe_interval")]
    pub probe_interval_minutes: i64,
    #[serde(default = "default_reconcile_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            namespaces: default_namespaces(),
            probe_interval_minutes: default_probe_interval(),
            timeout_seconds: default_reconcile_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

impl ReconcileConfig {
    pub fn namespace_matcher(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.namespaces {
            builder.add(
                Glob::new(pattern)
                    .with_context(|| format!("Invalid namespace pattern {}", pattern))?,
            );
        }
        builder.build().context("Failed to build namespace matcher")
    }

    pub fn probe_interval(&self) -> Result<chrono::Duration> {
        if self.probe_interval_minutes <= 0 {
            bail!("reconcile.probeIntervalMinutes must be positive");
        }
        chrono::Duration::try_minutes(self.probe_interval_minutes).with_context(|| {
            format!(
                "reconcile.probeIntervalMinutes {} is out of range",
                self.probe_interval_minutes
            )
        })
    }
}

fn default_registry_timeout() -> u64 {
    10
}

fn default_schedule() -> String {
    "*/30 * * * * *".to_string()
}

fn default_namespaces() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_probe_interval() -> i64 {
    DEFAULT_PROBE_INTERVAL_MINUTES
}

fn default_reconcile_timeout() -> u64 {
    60
}

fn default_concurrency() -> usize {
    4
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    info!("Loading config from file {}", path.as_ref().display());
    let yaml_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let expanded = expand_env_vars(&yaml_str)?;

    let config: Config = serde_yaml_ng::from_str(&expanded)
        .context("Failed to parse YAML config after environment variable expansion")?;

    config.reconcile.probe_interval()?;
    if config.reconcile.concurrency == 0 {
        bail!("reconcile.concurrency must be at least 1");
    }
    config.reconcile.namespace_matcher()?;

    Ok(config)
}

/// Replaces `${VAR}` placeholders with environment variables values.
/// Returns an error naming every missing variable.
fn expand_env_vars(input: &str) -> Result<String> {
    let re =
        Regex::new(r"\$\{([^}]+)}").context("Invalid regex pattern for env var substitution")?;

    let mut missing = Vec::new();
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| {
            missing.push(var_name.to_string());
            String::new()
        })
    });

    if !missing.is_empty() {
        bail!("Missing environment variable: {}", missing.join(", "));
    }

    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_expand_env_vars_success() {
        unsafe {
            env::set_var("TEST_VAR", "value123");
        }
        let input = "This is a test: ${TEST_VAR}";
        let expanded = expand_env_vars(input).expect("Expansion should succeed");
        assert_eq!(expanded, "This is a test: value123");
        unsafe {
            env::remove_var("TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_var() {
        let input = "This will fail: ${MISSING_VAR} and ${OTHER_MISSING_VAR}";
        let err = expand_env_vars(input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: MISSING_VAR, OTHER_MISSING_VAR"
        );
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let input = "No variables here";
        let expanded = expand_env_vars(input).expect("Expansion should succeed");
        assert_eq!(expanded, input);
    }

    #[test]
    fn test_load_config_file() {
        unsafe {
            env::set_var("TEST_REGISTRY_TOKEN", "secret_token");
        }
        let yaml_content = r#"
        webserver:
          port: 8080
        registry:
          token: ${TEST_REGISTRY_TOKEN}
          publicUrl: https://public.registry.example.com
          timeoutSeconds: 5
        reconcile:
          schedule: "0 * * * * *"
          namespaces: ["monitoring", "team-*"]
          probeIntervalMinutes: 30
        "#;

        let tmp_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        let path = tmp_file.path();
        fs::write(path, yaml_content).expect("Failed to write to temp file");

        let config = load_config(path).expect("Should load config");
        unsafe {
            env::remove_var("TEST_REGISTRY_TOKEN");
        }

        assert_eq!(config.webserver.port, 8080);
        assert_eq!(config.registry.token.expose_secret(), "secret_token");
        assert_eq!(config.registry.public_url, "https://public.registry.example.com");
        assert_eq!(config.registry.timeout_seconds, 5);
        assert!(config.registry.ca_certificate_paths.is_empty());
        assert_eq!(config.reconcile.schedule, "0 * * * * *");
        assert_eq!(config.reconcile.probe_interval_minutes, 30);
        assert_eq!(config.reconcile.timeout_seconds, 60);
        assert_eq!(config.reconcile.concurrency, 4);

        let matcher = config.reconcile.namespace_matcher().unwrap();
        assert!(matcher.is_match("monitoring"));
        assert!(matcher.is_match("team-payments"));
        assert!(!matcher.is_match("kube-system"));
    }

    #[test]
    fn test_load_config_defaults() {
        let yaml_content = r#"
        webserver:
          port: 9090
        registry:
          token: abc
          publicUrl: https://public.registry.example.com
        "#;

        let tmp_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        fs::write(tmp_file.path(), yaml_content).expect("Failed to write to temp file");

        let config = load_config(tmp_file.path()).expect("Should load config");
        assert_eq!(config.registry.timeout_seconds, 10);
        assert_eq!(config.reconcile.schedule, "*/30 * * * * *");
        assert_eq!(config.reconcile.namespaces, vec!["*"]);
        assert_eq!(config.reconcile.probe_interval_minutes, 15);
        assert!(config.reconcile.namespace_matcher().unwrap().is_match("anything"));
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let yaml_content = r#"
        webserver:
          port: 9090
        registry:
          token: abc
          publicUrl: https://public.registry.example.com
        reconcile:
          concurrency: 0
        "#;

        let tmp_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        fs::write(tmp_file.path(), yaml_content).expect("Failed to write to temp file");

        assert!(load_config(tmp_file.path()).is_err());
    }

    #[test]
    fn test_load_config_rejects_out_of_range_probe_interval() {
        for interval in ["0", "-5", "9223372036854775807"] {
            let yaml_content = format!(
                r#"
        webserver:
          port: 9090
        registry:
          token: abc
          publicUrl: https://public.registry.example.com
        reconcile:
          probeIntervalMinutes: {}
        "#,
                interval
            );

            let tmp_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
            fs::write(tmp_file.path(), yaml_content).expect("Failed to write to temp file");

            let err = load_config(tmp_file.path()).unwrap_err();
            assert!(err.to_string().contains("probeIntervalMinutes"), "{}", err);
        }
    }

    #[test]
    fn test_probe_interval() {
        let reconcile = ReconcileConfig {
            probe_interval_minutes: 30,
            ..Default::default()
        };
        assert_eq!(reconcile.probe_interval().unwrap(), chrono::Duration::minutes(30));
    }
}
