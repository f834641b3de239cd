//! Namespace prefix normalization for serialized descriptors
//!
//! Tree-based XML serializers that do not track the original prefixes emit
//! generated aliases (`ns0`, `ns1`, ...) for every namespace. Hand-authored
//! POMs use the default namespace and `xsi` for the schema instance, so the
//! aliases are mapped back before a file is written:
//!
//! - `ns0` (the POM namespace) collapses to the default namespace
//! - `ns1` (the schema instance namespace) becomes `xsi`
//!
//! Documents that do not declare the generated aliases are returned as-is.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static DEFAULT_ALIAS_DECL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\s)xmlns:ns0=").expect("valid regex"));
static DEFAULT_ALIAS_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<(/?)ns0:").expect("valid regex"));
static XSI_ALIAS_DECL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\s)xmlns:ns1=").expect("valid regex"));
static XSI_ALIAS_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<(/?)ns1:").expect("valid regex"));
static XSI_ALIAS_ATTR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(\s)ns1:([A-Za-z_][\w.\-]*\s*=)").expect("valid regex"));

/// Map generated namespace aliases back to the conventional prefixes.
pub fn normalize_namespace_prefixes(xml: &str) -> Cow<'_, str> {
  let has_default_alias = DEFAULT_ALIAS_DECL.is_match(xml);
  let has_xsi_alias = XSI_ALIAS_DECL.is_match(xml);
  if !has_default_alias && !has_xsi_alias {
    return Cow::Borrowed(xml);
  }

  let mut out = xml.to_string();
  if has_default_alias {
    out = DEFAULT_ALIAS_DECL.replace_all(&out, "${1}xmlns=").into_owned();
    out = DEFAULT_ALIAS_TAG.replace_all(&out, "<${1}").into_owned();
  }
  if has_xsi_alias {
    out = XSI_ALIAS_DECL.replace_all(&out, "${1}xmlns:xsi=").into_owned();
    out = XSI_ALIAS_TAG.replace_all(&out, "<${1}xsi:").into_owned();
    out = XSI_ALIAS_ATTR.replace_all(&out, "${1}xsi:${2}").into_owned();
  }
  Cow::Owned(out)
}
