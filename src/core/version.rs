//! Release version validation and derived forms

use crate::core::error::{ReleaseError, ReleaseResult};
use regex::RegexBuilder;
use std::fmt;

/// Pattern used when tagship.toml does not override `release.version_pattern`
pub const DEFAULT_VERSION_PATTERN: &str = r"^[0-9]+\.[0-9]+\.[0-9]+(\.[A-Z0-9]+)?$";

/// Characters dropped when deriving the identity bytes
const SEPARATORS: &[char] = &['.'];

/// A validated, normalized release version (e.g. `4.1.1.BETA1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
  /// Validate a candidate version against `pattern`.
  ///
  /// The candidate is trimmed before matching and the pattern is applied
  /// case-insensitively, so `4.1.1.beta1` is accepted and normalized to
  /// `4.1.1.BETA1`.
  pub fn validate(raw: &str, pattern: &str) -> ReleaseResult<Self> {
    let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    let candidate = raw.trim();

    if candidate.is_empty() || !regex.is_match(candidate) {
      return Err(ReleaseError::InvalidVersion {
        raw: raw.to_string(),
        pattern: pattern.to_string(),
      });
    }

    Ok(Self(candidate.to_uppercase()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// `major.minor` form, used as the documentation directory name
  pub fn short(&self) -> String {
    self.0.split('.').take(2).collect::<Vec<_>>().join(".")
  }

  /// Version characters with separators removed
  pub fn identity_bytes(&self) -> Vec<char> {
    derive_identity_bytes(&self.0)
  }

  /// Array literal for the identity bytes: `{'4', '1', '1'}`
  pub fn identity_literal(&self) -> String {
    let elements: Vec<String> = self.identity_bytes().iter().map(|c| format!("'{}'", c)).collect();
    format!("{{{}}}", elements.join(", "))
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for Version {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

/// Split a version into the individual characters embedded in the identity array.
pub fn derive_identity_bytes(version: &str) -> Vec<char> {
  version.chars().filter(|c| !SEPARATORS.contains(c)).collect()
}
