//! Version stamping of the generated `Version.java` source file
//!
//! The file is program source, so it is patched line by line using fixed
//! textual markers rather than parsed. Both markers must be present; a file
//! with only one of them is rejected untouched, since stamping half of the
//! identity would leave the release inconsistent.

use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::core::version::Version;
use crate::utils::write_atomic;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

/// Marks the line holding the identity byte array
pub const BYTES_MARKER: &str = "static final byte[] version_id = ";

/// Marks the line holding the version string constant
pub const STRING_MARKER: &str = "public static final String version =";

static BYTES_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"version_id = .*;").expect("valid regex"));
static STRING_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"version = "[^"]*";"#).expect("valid regex"));
static BYTES_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"version_id = (\{.*\});").expect("valid regex"));
static STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"version = "([^"]*)";"#).expect("valid regex"));

/// Lines rewritten by a stamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampResult {
  pub bytes_line: usize,
  pub string_line: usize,
  /// The file content changed
  pub written: bool,
}

/// The two constants as currently found in a stamped file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedConstants {
  pub identity_literal: String,
  pub version: String,
}

/// Rewrite the identity array and version string in `path` to `version`.
pub fn stamp(path: &Path, version: &Version) -> ReleaseResult<StampResult> {
  if !path.is_file() {
    return Err(ReleaseError::MissingStampTarget { path: path.to_path_buf() });
  }
  let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

  let (stamped, bytes_line, string_line) = stamp_content(&content, version);
  let bytes_line = bytes_line.ok_or_else(|| missing_marker(path, BYTES_MARKER))?;
  let string_line = string_line.ok_or_else(|| missing_marker(path, STRING_MARKER))?;

  let written = stamped != content;
  if written {
    write_atomic(path, stamped.as_bytes())?;
  }
  info!(path = %path.display(), version = %version, written, "stamped version source");

  Ok(StampResult {
    bytes_line,
    string_line,
    written,
  })
}

/// Read back the stamped constants, for consistency verification
pub fn read_stamped(path: &Path) -> ReleaseResult<StampedConstants> {
  if !path.is_file() {
    return Err(ReleaseError::MissingStampTarget { path: path.to_path_buf() });
  }
  let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

  let identity_literal = content
    .lines()
    .filter(|l| l.contains(BYTES_MARKER))
    .find_map(|l| BYTES_LITERAL.captures(l).map(|c| c[1].to_string()))
    .ok_or_else(|| missing_marker(path, BYTES_MARKER))?;
  let version = content
    .lines()
    .filter(|l| !l.contains(BYTES_MARKER) && l.contains(STRING_MARKER))
    .find_map(|l| STRING_LITERAL.captures(l).map(|c| c[1].to_string()))
    .ok_or_else(|| missing_marker(path, STRING_MARKER))?;

  Ok(StampedConstants {
    identity_literal,
    version,
  })
}

fn missing_marker(path: &Path, marker: &str) -> ReleaseError {
  ReleaseError::StampMarkerMissing {
    path: path.to_path_buf(),
    marker: marker.trim().to_string(),
  }
}

/// Pure rewrite; returns the new text and the 1-based line numbers where
/// each marker was stamped.
fn stamp_content(content: &str, version: &Version) -> (String, Option<usize>, Option<usize>) {
  let bytes_replacement = format!("version_id = {};", version.identity_literal());
  let string_replacement = format!("version = \"{}\";", version);

  let mut out = String::with_capacity(content.len());
  let mut bytes_line = None;
  let mut string_line = None;

  for (idx, line) in content.split_inclusive('\n').enumerate() {
    if line.contains(BYTES_MARKER) && BYTES_VALUE.is_match(line) {
      out.push_str(&BYTES_VALUE.replace(line, regex::NoExpand(&bytes_replacement)));
      bytes_line.get_or_insert(idx + 1);
    } else if line.contains(STRING_MARKER) && STRING_VALUE.is_match(line) {
      out.push_str(&STRING_VALUE.replace(line, regex::NoExpand(&string_replacement)));
      string_line.get_or_insert(idx + 1);
    } else {
      out.push_str(line);
    }
  }

  (out, bytes_line, string_line)
}
