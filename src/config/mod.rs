// ABOUTME: Configuration types and parsing for stratus.yml.
// ABOUTME: Desired-state document plus apply settings and content sync block.

use crate::error::{Error, Result};
use crate::exec::{RetryPolicy, WaiterConfig};
use crate::resource::{self, ParseError, RawResource, ResourceDescriptor};
use crate::types::Address;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "stratus.yml";
pub const CONFIG_FILENAME_ALT: &str = "stratus.yaml";

/// State directory, relative to the directory holding the config file.
pub const STATE_DIR: &str = ".stratus/state";

/// The desired-state document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub project: String,

    #[serde(default)]
    pub resources: Vec<RawResource>,

    #[serde(default)]
    pub content: Option<ContentConfig>,

    #[serde(default)]
    pub settings: Settings,
}

/// Optional post-apply content upload.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    /// Local directory to mirror.
    pub root: PathBuf,
    /// Address of the storage resource receiving the files.
    pub target: Address,
}

/// Apply tuning knobs, all optional.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_condition_timeout", with = "humantime_serde")]
    pub condition_timeout: Duration,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_base_delay", with = "humantime_serde")]
    pub retry_base_delay: Duration,
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_condition_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> Duration {
    Duration::from_millis(500)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval: default_poll_interval(),
            condition_timeout: default_condition_timeout(),
            retries: default_retries(),
            retry_base_delay: default_retry_base_delay(),
        }
    }
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retries,
            base_delay: self.retry_base_delay,
            ..RetryPolicy::default()
        }
    }

    pub fn waiter_config(&self) -> WaiterConfig {
        WaiterConfig {
            poll_interval: self.poll_interval,
            timeout: self.condition_timeout,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Validate the resource entries into descriptors.
    pub fn descriptors(&self) -> std::result::Result<Vec<ResourceDescriptor>, ParseError> {
        resource::parse(&self.resources)
    }

    /// State directory for a project rooted at `dir`.
    pub fn state_dir(dir: &Path) -> PathBuf {
        dir.join(STATE_DIR)
    }
}

/// Write a starter stratus.yml into `dir`.
pub fn init_config(dir: &Path, project: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let project = project.unwrap_or("my-site");
    std::fs::write(&config_path, template_yaml(project))?;

    Ok(())
}

fn template_yaml(project: &str) -> String {
    format!(
        r#"project: {project}

resources:
  - address: storage_bucket.site
    attributes:
      name: {project}-content
      region: eu-west-1
      index_document: index.html

  - address: bucket_policy.site
    attributes:
      bucket: ${{storage_bucket.site.id}}
      public_read: true

  - address: certificate.site
    attributes:
      domain: example.com
      validation_method: dns
    lifecycle:
      create_before_destroy: true

  - address: distribution.cdn
    attributes:
      origin: ${{storage_bucket.site.endpoint}}
      certificate: ${{certificate.site.id}}
      default_root_object: index.html
    depends_on:
      - bucket_policy.site

  - address: dns_record.www
    attributes:
      zone: example.com
      name: www
      record_type: CNAME
      value: ${{distribution.cdn.domain_name}}
      ttl: 300

content:
  root: ./public
  target: storage_bucket.site
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_and_validates() {
        let config = Config::from_yaml(&template_yaml("my-site")).unwrap();
        assert_eq!(config.project, "my-site");
        assert_eq!(config.resources.len(), 5);

        let descriptors = config.descriptors().unwrap();
        assert_eq!(descriptors.len(), 5);

        let content = config.content.unwrap();
        assert_eq!(content.target.as_str(), "storage_bucket.site");
    }

    #[test]
    fn settings_default_when_absent() {
        let config = Config::from_yaml("project: demo\nresources: []\n").unwrap();
        assert_eq!(config.settings.concurrency, 4);
        assert_eq!(config.settings.poll_interval, Duration::from_secs(5));
        assert_eq!(config.settings.condition_timeout, Duration::from_secs(300));
    }

    #[test]
    fn settings_parse_humantime_durations() {
        let yaml = r#"
project: demo
resources: []
settings:
  concurrency: 2
  poll_interval: 250ms
  condition_timeout: 10m
  retries: 5
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.settings.concurrency, 2);
        assert_eq!(config.settings.poll_interval, Duration::from_millis(250));
        assert_eq!(config.settings.condition_timeout, Duration::from_secs(600));
        assert_eq!(config.settings.retry_policy().max_retries, 5);
    }
}
