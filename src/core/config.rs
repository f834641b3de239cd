use crate::core::error::{ConfigError, ReleaseResult};
use crate::core::version::DEFAULT_VERSION_PATTERN;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for tagship
/// Searched in order: tagship.toml, .tagship.toml, .config/tagship.toml
///
/// Every key is optional at the type level; [`TagshipConfig::missing_keys`]
/// decides which ones a release cannot start without, so all of them can be
/// reported in one go.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagshipConfig {
  #[serde(default)]
  pub scm: ScmConfig,
  #[serde(default)]
  pub release: ReleaseSettings,
  #[serde(default)]
  pub project: ProjectConfig,
  #[serde(default)]
  pub build: BuildConfig,
  #[serde(default)]
  pub publish: PublishConfig,

  /// Where this config was read from
  #[serde(skip)]
  pub source: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScmConfig {
  /// Repository base URL; trunk and tags live beneath it
  #[serde(default)]
  pub base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseSettings {
  /// Directory under which `<version>/` working copies are created
  #[serde(default)]
  pub local_tags_dir: Option<PathBuf>,

  /// Run publishing tasks on background workers
  #[serde(default)]
  pub multi_threaded: bool,

  /// Copy the current tree instead of tagging, skip commit and uploads
  #[serde(default)]
  pub dry_run: bool,

  #[serde(default = "default_version_pattern")]
  pub version_pattern: String,
}

fn default_version_pattern() -> String {
  DEFAULT_VERSION_PATTERN.to_string()
}

impl Default for ReleaseSettings {
  fn default() -> Self {
    Self {
      local_tags_dir: None,
      multi_threaded: false,
      dry_run: false,
      version_pattern: default_version_pattern(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
  /// Product name, used for distribution file names
  #[serde(default = "default_project_name")]
  pub name: String,

  /// Module descriptor file name
  #[serde(default = "default_descriptor")]
  pub descriptor: String,

  /// Generated version source file, relative to the working copy
  #[serde(default = "default_version_source")]
  pub version_source: PathBuf,
}

fn default_project_name() -> String {
  "project".to_string()
}

fn default_descriptor() -> String {
  "pom.xml".to_string()
}

fn default_version_source() -> PathBuf {
  PathBuf::from("core/src/main/java/org/infinispan/Version.java")
}

impl Default for ProjectConfig {
  fn default() -> Self {
    Self {
      name: default_project_name(),
      descriptor: default_descriptor(),
      version_source: default_version_source(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
  /// Program and arguments run inside the working copy
  #[serde(default = "default_build_command")]
  pub command: Vec<String>,
}

fn default_build_command() -> Vec<String> {
  ["mvn", "clean", "install", "-Pdistribution"]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      command: default_build_command(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishConfig {
  /// rsync destination for API docs
  #[serde(default)]
  pub docs_target: Option<String>,

  /// scp destination for distribution artifacts
  #[serde(default)]
  pub artifacts_target: Option<String>,

  /// rsync destination for configuration schemas
  #[serde(default)]
  pub schema_target: Option<String>,

  /// Script run inside the unpacked doc directory before upload,
  /// relative to the working copy
  #[serde(default)]
  pub docs_hook: Option<PathBuf>,
}

impl TagshipConfig {
  /// Find config file in search order: tagship.toml, .tagship.toml, .config/tagship.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("tagship.toml"),
      path.join(".tagship.toml"),
      path.join(".config").join("tagship.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from the origin directory and check required keys
  pub fn load(path: &Path) -> ReleaseResult<Self> {
    let config_path = Self::find_config_path(path).ok_or_else(|| ConfigError::NotFound {
      origin: path.to_path_buf(),
    })?;

    let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Invalid {
      path: config_path.clone(),
      reason: e.to_string(),
    })?;

    let mut config = Self::parse(&content).map_err(|reason| ConfigError::Invalid {
      path: config_path.clone(),
      reason,
    })?;
    config.source = config_path;

    config.validate()?;
    Ok(config)
  }

  /// Parse config text without validating required keys
  pub fn parse(content: &str) -> Result<Self, String> {
    toml_edit::de::from_str(content).map_err(|e| e.to_string())
  }

  /// Dotted names of required keys that are absent
  pub fn missing_keys(&self) -> Vec<String> {
    let required: [(&str, bool); 5] = [
      ("scm.base", self.scm.base.is_some()),
      ("release.local_tags_dir", self.release.local_tags_dir.is_some()),
      ("publish.docs_target", self.publish.docs_target.is_some()),
      ("publish.artifacts_target", self.publish.artifacts_target.is_some()),
      ("publish.schema_target", self.publish.schema_target.is_some()),
    ];

    required
      .iter()
      .filter(|(_, present)| !present)
      .map(|(key, _)| key.to_string())
      .collect()
  }

  /// Pre-flight check, run before any mutating step
  pub fn validate(&self) -> ReleaseResult<()> {
    let missing = self.missing_keys();
    if !missing.is_empty() {
      return Err(
        ConfigError::MissingKeys {
          keys: missing,
          path: self.source.clone(),
        }
        .into(),
      );
    }

    if self.build.command.is_empty() {
      return Err(
        ConfigError::Invalid {
          path: self.source.clone(),
          reason: "build.command must name a program".to_string(),
        }
        .into(),
      );
    }

    if let Err(e) = regex::Regex::new(&self.release.version_pattern) {
      return Err(
        ConfigError::Invalid {
          path: self.source.clone(),
          reason: format!("release.version_pattern is not a valid regex: {}", e),
        }
        .into(),
      );
    }

    if self.project.descriptor.contains(['/', '\\']) {
      return Err(
        ConfigError::Invalid {
          path: self.source.clone(),
          reason: format!("project.descriptor '{}' must be a bare file name", self.project.descriptor),
        }
        .into(),
      );
    }

    Ok(())
  }

  /// Repository base with any trailing slash removed
  pub fn scm_base(&self) -> &str {
    self.scm.base.as_deref().unwrap_or_default().trim_end_matches('/')
  }

  pub fn trunk_url(&self) -> String {
    format!("{}/trunk", self.scm_base())
  }

  pub fn tag_url(&self, version: &str) -> String {
    format!("{}/tags/{}", self.scm_base(), version)
  }
}
