use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::rule_parser::RuleParseError;
use crate::runner::RunnerError;

/// Machine-readable reason attached to every diagnostic.
///
/// The kebab-case form is what `strictPatterns` in the configuration refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
  SpecificityHack,
  UnsupportedSelector,
  KeyframesInComponent,
  HigherOrderFactory,
  ThemeUnresolved,
  ImportedValueUnresolved,
  AdapterMissingResult,
  AdapterMalformedResult,
  SwitchMissingDefault,
  SwitchUnresolvableCase,
  UnhandledThemeExpression,
  UnhandledInterpolation,
  MultipleDynamicSegments,
  DynamicPropertyName,
  UnresolvedCall,
  UnresolvableBranch,
  SelectorUnresolved,
  UnsupportedMixin,
  ResolutionStopped,
}

impl DiagnosticCode {
  pub fn as_str(&self) -> &'static str {
    match self {
      DiagnosticCode::SpecificityHack => "specificity-hack",
      DiagnosticCode::UnsupportedSelector => "unsupported-selector",
      DiagnosticCode::KeyframesInComponent => "keyframes-in-component",
      DiagnosticCode::HigherOrderFactory => "higher-order-factory",
      DiagnosticCode::ThemeUnresolved => "theme-unresolved",
      DiagnosticCode::ImportedValueUnresolved => "imported-value-unresolved",
      DiagnosticCode::AdapterMissingResult => "adapter-missing-result",
      DiagnosticCode::AdapterMalformedResult => "adapter-malformed-result",
      DiagnosticCode::SwitchMissingDefault => "switch-missing-default",
      DiagnosticCode::SwitchUnresolvableCase => "switch-unresolvable-case",
      DiagnosticCode::UnhandledThemeExpression => "unhandled-theme-expression",
      DiagnosticCode::UnhandledInterpolation => "unhandled-interpolation",
      DiagnosticCode::MultipleDynamicSegments => "multiple-dynamic-segments",
      DiagnosticCode::DynamicPropertyName => "dynamic-property-name",
      DiagnosticCode::UnresolvedCall => "unresolved-call",
      DiagnosticCode::UnresolvableBranch => "unresolvable-branch",
      DiagnosticCode::SelectorUnresolved => "selector-unresolved",
      DiagnosticCode::UnsupportedMixin => "unsupported-mixin",
      DiagnosticCode::ResolutionStopped => "resolution-stopped",
    }
  }
}

impl Display for DiagnosticCode {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
  Error,
  Warning,
}

/// How much of the output a diagnostic invalidated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BailScope {
  File,
  Component,
  Declaration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
  pub line: usize,
  pub column: usize,
}

/// A user facing report about something that was not migrated.
///
/// Carries enough location information (component, selector, property, line) for a person
/// to find and migrate the case by hand.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
  pub message: String,
  pub code: DiagnosticCode,
  pub severity: Severity,
  pub scope: BailScope,
  pub component: Option<String>,
  pub selector: Option<String>,
  pub property: Option<String>,
  pub loc: Option<SourceLocation>,
  pub hints: Option<Vec<String>>,
}

impl Diagnostic {
  pub fn new(code: DiagnosticCode, scope: BailScope, message: impl Into<String>) -> Self {
    let severity = match scope {
      BailScope::Declaration => Severity::Warning,
      BailScope::Component | BailScope::File => Severity::Error,
    };
    Diagnostic {
      message: message.into(),
      code,
      severity,
      scope,
      component: None,
      selector: None,
      property: None,
      loc: None,
      hints: None,
    }
  }

  pub fn with_component(mut self, component: impl Into<String>) -> Self {
    self.component = Some(component.into());
    self
  }

  pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
    self.selector = Some(selector.into());
    self
  }

  pub fn with_property(mut self, property: Option<&str>) -> Self {
    self.property = property.map(str::to_string);
    self
  }

  pub fn with_loc(mut self, loc: Option<SourceLocation>) -> Self {
    self.loc = loc;
    self
  }

  pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
    self.hints.get_or_insert_with(Vec::new).push(hint.into());
    self
  }

  pub fn is_file_bail(&self) -> bool {
    self.scope == BailScope::File
  }
}

impl Display for Diagnostic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}] {}", self.code, self.message)?;
    if let Some(component) = &self.component {
      write!(f, " (component `{component}`")?;
      if let Some(selector) = &self.selector {
        write!(f, ", selector `{selector}`")?;
      }
      if let Some(property) = &self.property {
        write!(f, ", property `{property}`")?;
      }
      f.write_str(")")?;
    }
    if let Some(loc) = &self.loc {
      write!(f, " at {}:{}", loc.line, loc.column)?;
    }
    Ok(())
  }
}

/// Where in a component the engine currently is. Attached to every diagnostic raised there.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiagnosticSite {
  pub component: Option<String>,
  pub selector: Option<String>,
  pub property: Option<String>,
  pub loc: Option<SourceLocation>,
}

impl DiagnosticSite {
  pub fn component(name: &str, loc: Option<SourceLocation>) -> Self {
    DiagnosticSite {
      component: Some(name.to_string()),
      loc,
      ..Default::default()
    }
  }

  pub fn at(&self, selector: &str, property: Option<&str>) -> Self {
    DiagnosticSite {
      component: self.component.clone(),
      selector: Some(selector.to_string()),
      property: property.map(str::to_string),
      loc: self.loc,
    }
  }

  pub fn diagnostic(&self, code: DiagnosticCode, scope: BailScope, message: impl Into<String>) -> Diagnostic {
    Diagnostic {
      component: self.component.clone(),
      selector: self.selector.clone(),
      property: self.property.clone(),
      loc: self.loc,
      ..Diagnostic::new(code, scope, message)
    }
  }
}

/// Failures that are not a normal bail: the input or the configuration is broken.
#[derive(Debug, Error)]
pub enum LoweringError {
  #[error("Failed to parse module {file}: {message}")]
  Parse { file: String, message: String },
  #[error("Failed to parse styles of `{component}`: {source}")]
  RuleParse {
    component: String,
    #[source]
    source: RuleParseError,
  },
  #[error("Slot {slot} of `{component}` has no matching template expression")]
  MissingSlot { component: String, slot: usize },
  #[error("Resolution adapter is misconfigured: {0}")]
  Configuration(String),
  #[error("Failed to emit styles: {0}")]
  Emit(#[from] RunnerError),
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_display_includes_location_context() {
    let diagnostic = Diagnostic::new(
      DiagnosticCode::UnhandledInterpolation,
      BailScope::Declaration,
      "Could not lower interpolation",
    )
    .with_component("Button")
    .with_selector("&:hover")
    .with_property(Some("color"))
    .with_loc(Some(SourceLocation { line: 3, column: 9 }));

    assert_eq!(
      diagnostic.to_string(),
      "[unhandled-interpolation] Could not lower interpolation (component `Button`, selector `&:hover`, property `color`) at 3:9"
    );
    assert_eq!(diagnostic.severity, Severity::Warning);
  }

  #[test]
  fn test_site_fills_location_fields() {
    let site = DiagnosticSite::component("Card", Some(SourceLocation { line: 1, column: 14 }));
    let diagnostic = site.at("&:hover", None).diagnostic(
      DiagnosticCode::SpecificityHack,
      BailScope::File,
      "Specificity hacks cannot be migrated",
    );

    assert_eq!(diagnostic.component.as_deref(), Some("Card"));
    assert_eq!(diagnostic.selector.as_deref(), Some("&:hover"));
    assert_eq!(diagnostic.property, None);
    assert_eq!(diagnostic.severity, Severity::Error);
    assert!(diagnostic.is_file_bail());
  }

  #[test]
  fn test_codes_round_trip_through_serde() {
    let code: DiagnosticCode = serde_json::from_str("\"switch-missing-default\"").unwrap();
    assert_eq!(code, DiagnosticCode::SwitchMissingDefault);
    assert_eq!(code.as_str(), "switch-missing-default");
  }
}
