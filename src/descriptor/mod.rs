//! Module descriptors (`pom.xml`)
//!
//! Descriptors are processed as an event stream rather than a tree: every
//! event outside the three version locations is written back untouched, so
//! a patched file differs from the original only in its version text.
//!
//! - **discovery**: build the [`ModuleSet`] for a working copy
//! - **patch**: rewrite the version fields of one descriptor
//! - **normalize**: strip synthetic namespace aliases from serialized XML

pub mod discovery;
pub mod normalize;
pub mod patch;

pub use discovery::{ModuleSet, discover};
pub use patch::patch_file;

use crate::core::error::{DescriptorError, ReleaseResult, ResultExt};
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs;
use std::path::{Path, PathBuf};

const BOM: char = '\u{feff}';

/// The version-bearing locations of a descriptor, addressed by element path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionField {
  /// `project/parent/version`
  Parent,
  /// `project/version`
  Project,
  /// `project/properties/project-version`
  Property,
}

impl VersionField {
  pub const ALL: [VersionField; 3] = [VersionField::Parent, VersionField::Project, VersionField::Property];

  /// Element path from the document root, local names only
  pub fn path(self) -> &'static [&'static str] {
    match self {
      VersionField::Parent => &["project", "parent", "version"],
      VersionField::Project => &["project", "version"],
      VersionField::Property => &["project", "properties", "project-version"],
    }
  }

  fn at(path: &[String]) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|field| field.path().iter().copied().eq(path.iter().map(String::as_str)))
  }
}

/// A parsed module descriptor
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
  path: PathBuf,
  content: String,
  fields: Vec<(VersionField, String)>,
  modules: Vec<String>,
}

impl ModuleDescriptor {
  /// Read and fully scan a descriptor. Malformed XML is an error.
  pub fn load(path: &Path) -> ReleaseResult<Self> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Self::from_content(path, content)
  }

  pub fn from_content(path: &Path, content: String) -> ReleaseResult<Self> {
    let scan = scan(path, &content, None)?;
    Ok(Self {
      path: path.to_path_buf(),
      content,
      fields: scan.fields,
      modules: scan.modules,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn content(&self) -> &str {
    &self.content
  }

  /// Present version fields in document order, with their current text
  pub fn version_fields(&self) -> &[(VersionField, String)] {
    &self.fields
  }

  pub fn field(&self, field: VersionField) -> Option<&str> {
    self
      .fields
      .iter()
      .find(|(f, _)| *f == field)
      .map(|(_, value)| value.as_str())
  }

  /// Module names from every `<modules><module>` element
  pub fn declared_modules(&self) -> &[String] {
    &self.modules
  }

  /// Serialize with every present version field set to `version`
  pub(crate) fn render(&self, version: &str) -> Result<String, DescriptorError> {
    let scan = scan(&self.path, &self.content, Some(version))?;
    let bytes = scan.output.unwrap_or_default();
    let mut rendered = String::from_utf8(bytes).map_err(|e| DescriptorError::Parse {
      path: self.path.clone(),
      reason: e.to_string(),
    })?;
    // The reader consumes a leading byte order mark
    if self.content.starts_with(BOM) && !rendered.starts_with(BOM) {
      rendered.insert(0, BOM);
    }
    Ok(rendered)
  }
}

struct Scan {
  fields: Vec<(VersionField, String)>,
  modules: Vec<String>,
  output: Option<Vec<u8>>,
}

/// Single pass over a descriptor.
///
/// Collects version fields and declared modules; when `replacement` is set,
/// also re-emits the document with the version fields replaced.
fn scan(path: &Path, content: &str, replacement: Option<&str>) -> Result<Scan, DescriptorError> {
  let parse_error = |reason: String| DescriptorError::Parse {
    path: path.to_path_buf(),
    reason,
  };

  let mut reader = Reader::from_str(content);
  let mut writer = replacement.map(|_| Writer::new(Vec::with_capacity(content.len())));

  let mut stack: Vec<String> = Vec::new();
  let mut fields: Vec<(VersionField, String)> = Vec::new();
  let mut modules: Vec<String> = Vec::new();
  let mut field_text: Option<(VersionField, String)> = None;
  let mut module_text: Option<String> = None;
  let mut replaced = false;
  let mut saw_root = false;

  loop {
    let event = reader
      .read_event()
      .map_err(|e| parse_error(format!("{} at byte {}", e, reader.buffer_position())))?;

    match event {
      Event::Start(start) => {
        if stack.is_empty() && saw_root {
          return Err(parse_error("multiple root elements".to_string()));
        }
        saw_root = true;
        stack.push(String::from_utf8_lossy(start.local_name().as_ref()).into_owned());

        if let Some(field) = VersionField::at(&stack) {
          field_text = Some((field, String::new()));
          replaced = false;
        } else if is_module_path(&stack) {
          module_text = Some(String::new());
        }
        emit(&mut writer, Event::Start(start)).map_err(parse_error)?;
      }
      Event::Empty(start) => {
        if stack.is_empty() && saw_root {
          return Err(parse_error("multiple root elements".to_string()));
        }
        saw_root = true;
        stack.push(String::from_utf8_lossy(start.local_name().as_ref()).into_owned());
        let field = VersionField::at(&stack);
        stack.pop();

        match (field, replacement) {
          (Some(field), Some(version)) => {
            fields.push((field, String::new()));
            let end = start.to_end().into_owned();
            emit(&mut writer, Event::Start(start)).map_err(parse_error)?;
            emit(&mut writer, Event::Text(BytesText::new(version))).map_err(parse_error)?;
            emit(&mut writer, Event::End(end)).map_err(parse_error)?;
          }
          (field, _) => {
            if let Some(field) = field {
              fields.push((field, String::new()));
            }
            emit(&mut writer, Event::Empty(start)).map_err(parse_error)?;
          }
        }
      }
      Event::End(end) => {
        if VersionField::at(&stack).is_some()
          && let Some((field, text)) = field_text.take()
        {
          if let Some(version) = replacement
            && !replaced
          {
            emit(&mut writer, Event::Text(BytesText::new(version))).map_err(parse_error)?;
          }
          fields.push((field, text.trim().to_string()));
        } else if is_module_path(&stack)
          && let Some(text) = module_text.take()
        {
          let name = text.trim();
          if !name.is_empty() {
            modules.push(name.to_string());
          }
        }

        if stack.pop().is_none() {
          return Err(parse_error("unexpected closing tag".to_string()));
        }
        emit(&mut writer, Event::End(end)).map_err(parse_error)?;
      }
      Event::Text(text) => {
        if let Some((_, value)) = field_text.as_mut() {
          value.push_str(&text.unescape().map_err(|e| parse_error(e.to_string()))?);
          if let Some(version) = replacement {
            if !replaced {
              emit(&mut writer, Event::Text(BytesText::new(version))).map_err(parse_error)?;
              replaced = true;
            }
            continue;
          }
        } else if let Some(value) = module_text.as_mut() {
          value.push_str(&text.unescape().map_err(|e| parse_error(e.to_string()))?);
        }
        emit(&mut writer, Event::Text(text)).map_err(parse_error)?;
      }
      Event::CData(data) => {
        let raw = String::from_utf8_lossy(&data).into_owned();
        if let Some((_, value)) = field_text.as_mut() {
          value.push_str(&raw);
          if let Some(version) = replacement {
            if !replaced {
              emit(&mut writer, Event::Text(BytesText::new(version))).map_err(parse_error)?;
              replaced = true;
            }
            continue;
          }
        } else if let Some(value) = module_text.as_mut() {
          value.push_str(&raw);
        }
        emit(&mut writer, Event::CData(data)).map_err(parse_error)?;
      }
      Event::Eof => break,
      other => emit(&mut writer, other).map_err(parse_error)?,
    }
  }

  if !stack.is_empty() {
    return Err(parse_error(format!("unexpected end of document inside <{}>", stack.join("/"))));
  }
  if !saw_root {
    return Err(parse_error("no root element".to_string()));
  }

  Ok(Scan {
    fields,
    modules,
    output: writer.map(Writer::into_inner),
  })
}

fn is_module_path(stack: &[String]) -> bool {
  stack.len() >= 2 && stack[stack.len() - 2] == "modules" && stack[stack.len() - 1] == "module"
}

fn emit(writer: &mut Option<Writer<Vec<u8>>>, event: Event<'_>) -> Result<(), String> {
  if let Some(writer) = writer.as_mut() {
    writer.write_event(event).map_err(|e| e.to_string())?;
  }
  Ok(())
}
