//! Error types for tagship with contextual messages and exit codes
//!
//! Every failure in the release pipeline is fatal to the run. The variants
//! here exist so the user sees *which* stage broke and what to do about it,
//! and so `main` can pick the right process exit code.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for tagship
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// Usage was printed (missing or invalid version argument)
  Usage = 0,
  /// Release failed at some stage
  Failure = 1,
  /// Configuration is missing or incomplete
  Config = 2,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for tagship
#[derive(Debug)]
pub enum ReleaseError {
  /// Candidate version does not match the configured pattern
  InvalidVersion { raw: String, pattern: String },

  /// Configuration errors
  Config(ConfigError),

  /// Module descriptor errors
  Descriptor(DescriptorError),

  /// The generated version source file does not exist
  MissingStampTarget { path: PathBuf },

  /// The generated version source file lacks one of the stamp markers
  StampMarkerMissing { path: PathBuf, marker: String },

  /// A file disagrees with the release version after patching
  Inconsistent { path: PathBuf, found: String, expected: String },

  /// SCM client errors
  Scm(ScmError),

  /// Build/verification command failed
  BuildFailed { command: String, status: String },

  /// A file transfer command failed
  Transfer { command: String, status: String },

  /// One or more publishing tasks failed
  Publish(Vec<TaskFailure>),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ReleaseError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  ///
  /// I/O errors are promoted to messages so the context is not lost.
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ReleaseError::Message { message, context, help } => ReleaseError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      ReleaseError::Io(e) => ReleaseError::Message {
        message: ctx_str,
        context: Some(format!("I/O error: {}", e)),
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ReleaseError::InvalidVersion { .. } => ExitCode::Usage,
      ReleaseError::Config(_) => ExitCode::Config,
      _ => ExitCode::Failure,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ReleaseError::Config(e) => e.help_message(),
      ReleaseError::Descriptor(e) => e.help_message(),
      ReleaseError::Scm(e) => e.help_message(),
      ReleaseError::StampMarkerMissing { .. } => {
        Some("The version source file must contain both the version_id array and the version string.".to_string())
      }
      ReleaseError::BuildFailed { .. } => {
        Some("Fix the build in the working copy, then re-run with a new version; the tag already exists.".to_string())
      }
      ReleaseError::Publish(_) => {
        Some("The release is tagged and built. Re-run the failed uploads by hand.".to_string())
      }
      ReleaseError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::InvalidVersion { raw, pattern } => {
        write!(f, "Invalid version '{}' (expected pattern {})", raw, pattern)
      }
      ReleaseError::Config(e) => write!(f, "{}", e),
      ReleaseError::Descriptor(e) => write!(f, "{}", e),
      ReleaseError::MissingStampTarget { path } => {
        write!(f, "Version source file not found: {}", path.display())
      }
      ReleaseError::StampMarkerMissing { path, marker } => {
        write!(f, "Marker '{}' not found in {}", marker, path.display())
      }
      ReleaseError::Inconsistent { path, found, expected } => write!(
        f,
        "Version mismatch in {}: found '{}', expected '{}'",
        path.display(),
        found,
        expected
      ),
      ReleaseError::Scm(e) => write!(f, "{}", e),
      ReleaseError::BuildFailed { command, status } => {
        write!(f, "Build failed: {} ({})", command, status)
      }
      ReleaseError::Transfer { command, status } => {
        write!(f, "Transfer failed: {} ({})", command, status)
      }
      ReleaseError::Publish(failures) => {
        write!(f, "{} publishing task(s) failed", failures.len())?;
        for failure in failures {
          write!(f, "\n  - {}", failure)?;
        }
        Ok(())
      }
      ReleaseError::Io(e) => write!(f, "I/O error: {}", e),
      ReleaseError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ReleaseError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ReleaseError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for ReleaseError {
  fn from(err: io::Error) -> Self {
    ReleaseError::Io(err)
  }
}

impl From<String> for ReleaseError {
  fn from(msg: String) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<&str> for ReleaseError {
  fn from(msg: &str) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<ConfigError> for ReleaseError {
  fn from(err: ConfigError) -> Self {
    ReleaseError::Config(err)
  }
}

impl From<DescriptorError> for ReleaseError {
  fn from(err: DescriptorError) -> Self {
    ReleaseError::Descriptor(err)
  }
}

impl From<ScmError> for ReleaseError {
  fn from(err: ScmError) -> Self {
    ReleaseError::Scm(err)
  }
}

impl From<regex::Error> for ReleaseError {
  fn from(err: regex::Error) -> Self {
    ReleaseError::message(format!("Regex error: {}", err))
  }
}

impl From<glob::PatternError> for ReleaseError {
  fn from(err: glob::PatternError) -> Self {
    ReleaseError::message(format!("Glob pattern error: {}", err))
  }
}

impl From<glob::GlobError> for ReleaseError {
  fn from(err: glob::GlobError) -> Self {
    ReleaseError::message(format!("Directory scan error: {}", err))
  }
}

impl From<zip::result::ZipError> for ReleaseError {
  fn from(err: zip::result::ZipError) -> Self {
    ReleaseError::message(format!("Archive error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// tagship.toml not found
  NotFound { origin: PathBuf },

  /// Required keys absent from the configuration file
  MissingKeys { keys: Vec<String>, path: PathBuf },

  /// File exists but cannot be read or parsed
  Invalid { path: PathBuf, reason: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => Some("Create tagship.toml in the directory you release from.".to_string()),
      ConfigError::MissingKeys { .. } => Some("Add the missing entries to tagship.toml and re-run.".to_string()),
      ConfigError::Invalid { .. } => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { origin } => {
        write!(
          f,
          "No tagship configuration found.\nExpected file: {}/tagship.toml",
          origin.display()
        )
      }
      ConfigError::MissingKeys { keys, path } => write!(
        f,
        "Entries {:?} are missing in configuration file {}! Cannot proceed!",
        keys,
        path.display()
      ),
      ConfigError::Invalid { path, reason } => {
        write!(f, "Invalid configuration in {}: {}", path.display(), reason)
      }
    }
  }
}

/// Module descriptor errors
#[derive(Debug)]
pub enum DescriptorError {
  /// Root descriptor missing or unparsable
  MissingRoot { path: PathBuf, reason: String },

  /// A module declared by the root has no descriptor
  MissingModule { name: String, path: PathBuf },

  /// Descriptor is not well-formed XML
  Parse { path: PathBuf, reason: String },
}

impl DescriptorError {
  fn help_message(&self) -> Option<String> {
    match self {
      DescriptorError::MissingModule { name, .. } => Some(format!(
        "Remove '{}' from <modules> or restore its descriptor before releasing.",
        name
      )),
      _ => None,
    }
  }
}

impl fmt::Display for DescriptorError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DescriptorError::MissingRoot { path, reason } => {
        write!(f, "Root descriptor unusable: {} ({})", path.display(), reason)
      }
      DescriptorError::MissingModule { name, path } => {
        write!(f, "Module '{}' is declared but {} does not exist", name, path.display())
      }
      DescriptorError::Parse { path, reason } => {
        write!(f, "Failed to parse {}: {}", path.display(), reason)
      }
    }
  }
}

/// SCM client errors
#[derive(Debug)]
pub enum ScmError {
  /// svn command exited non-zero
  CommandFailed { command: String, stderr: String },

  /// svn binary could not be started
  Unavailable { reason: String },
}

impl ScmError {
  fn help_message(&self) -> Option<String> {
    match self {
      ScmError::CommandFailed { stderr, .. } if stderr.contains("already exists") => Some(
        "A tag for this version already exists. Releases are never re-cut under the same version.".to_string(),
      ),
      ScmError::Unavailable { .. } => Some("Install the Subversion command line client (svn).".to_string()),
      _ => None,
    }
  }
}

impl fmt::Display for ScmError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ScmError::CommandFailed { command, stderr } => {
        write!(f, "SCM command failed: {}\n{}", command, stderr)
      }
      ScmError::Unavailable { reason } => write!(f, "SCM client unavailable: {}", reason),
    }
  }
}

/// Outcome of a publishing task that did not succeed
#[derive(Debug)]
pub struct TaskFailure {
  pub task: String,
  pub kind: TaskFailureKind,
}

#[derive(Debug)]
pub enum TaskFailureKind {
  /// Task returned an error
  Failed(String),
  /// Task panicked; the panic payload is kept as text
  Panicked(String),
  /// Worker finished without ever reporting an outcome
  OutcomeLost,
}

impl fmt::Display for TaskFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      TaskFailureKind::Failed(msg) => write!(f, "{}: {}", self.task, msg),
      TaskFailureKind::Panicked(msg) => write!(f, "{}: panicked: {}", self.task, msg),
      TaskFailureKind::OutcomeLost => write!(f, "{}: worker exited without reporting an outcome", self.task),
    }
  }
}

/// Result type alias for tagship
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ReleaseError>,
{
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &ReleaseError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
