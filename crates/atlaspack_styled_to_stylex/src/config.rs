use std::collections::HashSet;

use anyhow::Context;
use serde::Deserialize;

use crate::diagnostic::DiagnosticCode;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoweringConfig {
  ///
  /// Module specifiers `styled` and `css` are imported from.
  ///
  /// Defaults to `["styled-components"]`
  ///
  pub import_sources: Vec<String>,
  ///
  /// Module the stylex namespace is imported from in the output.
  ///
  /// Defaults to `@stylexjs/stylex`
  ///
  pub stylex_import_source: String,
  ///
  /// Local name of the stylex namespace import.
  ///
  /// Defaults to `stylex`
  ///
  pub stylex_namespace: String,
  ///
  /// Name of the emitted `stylex.create` object.
  ///
  /// Defaults to `styles`
  ///
  pub styles_ident: String,
  ///
  /// Patterns that abort the whole file instead of dropping the single declaration.
  ///
  /// Defaults to none
  ///
  pub strict_patterns: HashSet<DiagnosticCode>,
  ///
  /// Keep unhandled interpolations outside pseudo/media contexts as per-render inline
  /// styles instead of dropping them.
  ///
  /// Defaults to `true`
  ///
  pub inline_style_fallback: bool,
}

impl Default for LoweringConfig {
  fn default() -> Self {
    Self {
      import_sources: vec!["styled-components".to_string()],
      stylex_import_source: "@stylexjs/stylex".to_string(),
      stylex_namespace: "stylex".to_string(),
      styles_ident: "styles".to_string(),
      strict_patterns: HashSet::new(),
      inline_style_fallback: true,
    }
  }
}

impl LoweringConfig {
  pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
    serde_json::from_str(json).context("Invalid styled lowering configuration")
  }

  pub fn is_strict(&self, code: DiagnosticCode) -> bool {
    self.strict_patterns.contains(&code)
  }

  pub fn is_styled_source(&self, source: &str) -> bool {
    self.import_sources.iter().any(|import_source| import_source == source)
  }
}
