//! The contract between the lowering engine and the resolution authority ("adapter").
//!
//! The engine never knows what a theme path or helper call means in the target system. It
//! asks the adapter, which answers with an expression plus the imports that expression
//! needs, or explicitly declines.

use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

mod mapping_adapter;
mod session;

pub use mapping_adapter::*;
pub use session::*;

/// Where an import in the output comes from.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSpec {
  pub from: String,
  pub names: Vec<ImportedName>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedName {
  /// `default`, `*` or the exported name.
  pub imported: String,
  pub local: Option<String>,
}

impl ImportSpec {
  pub fn named(from: impl Into<String>, imported: impl Into<String>) -> Self {
    ImportSpec {
      from: from.into(),
      names: vec![ImportedName {
        imported: imported.into(),
        local: None,
      }],
    }
  }
}

/// What a value request refers to.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValueLookup {
  /// `props.theme.colors.primary` -> `colors.primary`
  Theme { path: String },
  /// `var(--brand, red)` -> `--brand` with fallback `red`
  CssVariable {
    name: String,
    fallback: Option<String>,
  },
  /// An identifier imported from another module, optionally followed by a member path.
  ImportedValue {
    imported: String,
    source: String,
    path: Option<String>,
  },
}

impl ValueLookup {
  /// Theme and imported values bail the whole file when they cannot be resolved.
  pub fn is_terminal_when_unresolved(&self) -> bool {
    !matches!(self, ValueLookup::CssVariable { .. })
  }
}

impl Display for ValueLookup {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ValueLookup::Theme { path } => write!(f, "theme.{path}"),
      ValueLookup::CssVariable { name, .. } => write!(f, "var({name})"),
      ValueLookup::ImportedValue {
        imported,
        source,
        path,
      } => {
        write!(f, "{imported}")?;
        if let Some(path) = path {
          write!(f, ".{path}")?;
        }
        write!(f, " from \"{source}\"")
      }
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveValueContext {
  pub file_path: String,
  pub lookup: ValueLookup,
  /// CSS property the value is used for, when known.
  pub css_property: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedValue {
  pub expr: String,
  #[serde(default)]
  pub imports: Vec<ImportSpec>,
}

/// Statically known shape of a helper call argument.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CallArg {
  Literal(String),
  Number(f64),
  ThemePath(String),
  /// Anything the classifier does not understand. Passed through, never guessed.
  Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveCallContext {
  pub file_path: String,
  pub callee_imported_name: String,
  pub callee_source: String,
  pub args: Vec<CallArg>,
  /// Set when the call computes one property's value rather than a whole block.
  pub css_property: Option<String>,
}

/// How a resolved call is applied in the target system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CallUsage {
  /// The expression is a value used inside `stylex.create`.
  Create,
  /// The expression is a full style reference passed to `stylex.props`.
  Props,
}

impl FromStr for CallUsage {
  type Err = AdapterError;

  fn from_str(usage: &str) -> Result<Self, Self::Err> {
    match usage {
      "create" => Ok(CallUsage::Create),
      "props" => Ok(CallUsage::Props),
      other => Err(AdapterError::InvalidUsage {
        usage: other.to_string(),
      }),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCall {
  pub usage: CallUsage,
  pub expr: String,
  pub imports: Vec<ImportSpec>,
}

/// How the interpolated component relates to the styled one in a selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectorRelation {
  /// `${Parent}:hover &`
  Ancestor,
  /// `&:has(${Child}:hover)`
  Descendant,
  /// `${Sibling}:focus + &`
  Sibling,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveSelectorContext {
  pub file_path: String,
  pub selector: String,
  pub relation: SelectorRelation,
  /// Pseudo-class on the referenced element, e.g. `:hover`.
  pub pseudo: Option<String>,
  /// Local name of the interpolated component, when it is an identifier.
  pub component: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSelector {
  /// Expression used as a computed condition key, e.g. `stylex.when.ancestor(":hover")`.
  pub expr: String,
  #[serde(default)]
  pub imports: Vec<ImportSpec>,
}

/// Contract violations by the adapter. These are bugs in the resolution authority, as
/// opposed to `Ok(None)`, which means "this reference has no mapping".
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum AdapterError {
  #[error("adapter returned no result for {request}")]
  MissingResult { request: String },
  #[error("adapter returned an invalid call usage `{usage}` (expected `create` or `props`)")]
  InvalidUsage { usage: String },
  #[error("adapter returned a malformed result: {reason}")]
  Malformed { reason: String },
}

/// The resolution authority. Implementations may cache internally, but every call must be
/// answerable on its own.
#[cfg_attr(test, automock)]
pub trait ResolutionAdapter {
  fn resolve_value(&self, ctx: &ResolveValueContext) -> Result<Option<ResolvedValue>, AdapterError>;

  fn resolve_call(&self, ctx: &ResolveCallContext) -> Result<Option<ResolvedCall>, AdapterError>;

  fn resolve_selector(
    &self,
    ctx: &ResolveSelectorContext,
  ) -> Result<Option<ResolvedSelector>, AdapterError>;
}
