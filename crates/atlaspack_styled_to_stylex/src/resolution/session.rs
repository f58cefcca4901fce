use std::collections::BTreeSet;

use swc_core::ecma::ast::{Expr, Lit};

use super::*;
use crate::diagnostic::{BailScope, Diagnostic, DiagnosticCode, DiagnosticSite, LoweringError};
use crate::runner::parse_expr;
use crate::styled_decl::StyleValue;

/// What the engine gets back from a session request.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<T> {
  Resolved(T),
  /// The adapter explicitly has no mapping. The caller picks the fallback.
  Declined,
  /// The file has bailed, either now or earlier. Nothing more should be lowered.
  Stopped,
}

/// A validated adapter expression.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedExpr {
  pub source: String,
  /// Literal strings and numbers come back as literals so they can collapse with
  /// surrounding static text.
  pub value: StyleValue,
}

impl ResolvedExpr {
  /// The compile-time string this expression evaluates to, if it is one.
  pub fn static_text(&self) -> Option<String> {
    match &self.value {
      StyleValue::Literal(text) => Some(text.clone()),
      StyleValue::Number(number) => Some(number.to_string()),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionCall {
  pub usage: CallUsage,
  pub expr: ResolvedExpr,
}

/// Per-file wrapper around a [`ResolutionAdapter`].
///
/// Validates every result, collects imports and turns contract violations into file
/// bails. Once the file has bailed the session is stopped for good: no further request
/// reaches the adapter.
pub struct ResolutionSession<'a> {
  adapter: &'a dyn ResolutionAdapter,
  file_path: String,
  stopped: bool,
  imports: BTreeSet<ImportSpec>,
  diagnostics: Vec<Diagnostic>,
  adapter_calls: usize,
}

impl<'a> ResolutionSession<'a> {
  pub fn new(adapter: &'a dyn ResolutionAdapter, file_path: impl Into<String>) -> Self {
    ResolutionSession {
      adapter,
      file_path: file_path.into(),
      stopped: false,
      imports: BTreeSet::new(),
      diagnostics: Vec::new(),
      adapter_calls: 0,
    }
  }

  pub fn file_path(&self) -> &str {
    &self.file_path
  }

  pub fn is_stopped(&self) -> bool {
    self.stopped
  }

  pub fn adapter_calls(&self) -> usize {
    self.adapter_calls
  }

  /// Abort the file. Used for every file-level bail, not only adapter ones.
  pub fn stop(&mut self, diagnostic: Diagnostic) {
    tracing::warn!(
      code = %diagnostic.code,
      component = diagnostic.component.as_deref().unwrap_or_default(),
      "{}",
      diagnostic.message
    );
    self.stopped = true;
    self.diagnostics.push(diagnostic);
  }

  pub fn report(&mut self, diagnostic: Diagnostic) {
    if diagnostic.is_file_bail() {
      self.stop(diagnostic);
      return;
    }
    tracing::warn!(
      code = %diagnostic.code,
      component = diagnostic.component.as_deref().unwrap_or_default(),
      property = diagnostic.property.as_deref().unwrap_or_default(),
      "{}",
      diagnostic.message
    );
    self.diagnostics.push(diagnostic);
  }

  pub fn diagnostics(&self) -> &[Diagnostic] {
    &self.diagnostics
  }

  /// Imports requested by every resolved expression, sorted and deduplicated.
  pub fn imports(&self) -> Vec<ImportSpec> {
    self.imports.iter().cloned().collect()
  }

  pub fn into_parts(self) -> (Vec<ImportSpec>, Vec<Diagnostic>) {
    (self.imports.into_iter().collect(), self.diagnostics)
  }

  pub fn resolve_value(
    &mut self,
    lookup: ValueLookup,
    css_property: Option<&str>,
    site: &DiagnosticSite,
  ) -> Result<Resolution<ResolvedExpr>, LoweringError> {
    if self.stopped {
      return Ok(Resolution::Stopped);
    }

    let ctx = ResolveValueContext {
      file_path: self.file_path.clone(),
      lookup,
      css_property: css_property.map(str::to_string),
    };
    self.adapter_calls += 1;
    tracing::debug!(lookup = %ctx.lookup, "Resolving value");
    let request = ctx.lookup.to_string();

    match self.adapter.resolve_value(&ctx) {
      Ok(Some(resolved)) => Ok(self.accept(resolved.expr, resolved.imports, &request, site)),
      Ok(None) if ctx.lookup.is_terminal_when_unresolved() => {
        let code = match ctx.lookup {
          ValueLookup::ImportedValue { .. } => DiagnosticCode::ImportedValueUnresolved,
          _ => DiagnosticCode::ThemeUnresolved,
        };
        self.stop(
          site
            .diagnostic(
              code,
              BailScope::File,
              format!("Could not resolve `{request}`; resolution stopped for this file"),
            )
            .with_hint("Add a mapping for this reference to the resolution adapter"),
        );
        Ok(Resolution::Stopped)
      }
      Ok(None) => Ok(Resolution::Declined),
      Err(error) => self.adapter_failed(error, &request, site),
    }
  }

  pub fn resolve_call(
    &mut self,
    callee_imported_name: &str,
    callee_source: &str,
    args: Vec<CallArg>,
    css_property: Option<&str>,
    site: &DiagnosticSite,
  ) -> Result<Resolution<SessionCall>, LoweringError> {
    if self.stopped {
      return Ok(Resolution::Stopped);
    }

    let ctx = ResolveCallContext {
      file_path: self.file_path.clone(),
      callee_imported_name: callee_imported_name.to_string(),
      callee_source: callee_source.to_string(),
      args,
      css_property: css_property.map(str::to_string),
    };
    self.adapter_calls += 1;
    let request = format!(
      "{}({}) from \"{}\"",
      ctx.callee_imported_name,
      describe_args(&ctx.args),
      ctx.callee_source
    );
    tracing::debug!(%request, "Resolving call");

    match self.adapter.resolve_call(&ctx) {
      Ok(Some(resolved)) => Ok(
        match self.accept(resolved.expr, resolved.imports, &request, site) {
          Resolution::Resolved(expr) => Resolution::Resolved(SessionCall {
            usage: resolved.usage,
            expr,
          }),
          Resolution::Declined => Resolution::Declined,
          Resolution::Stopped => Resolution::Stopped,
        },
      ),
      Ok(None) => Ok(Resolution::Declined),
      Err(error) => self.adapter_failed(error, &request, site),
    }
  }

  pub fn resolve_selector(
    &mut self,
    ctx: ResolveSelectorContext,
    site: &DiagnosticSite,
  ) -> Result<Resolution<ResolvedExpr>, LoweringError> {
    if self.stopped {
      return Ok(Resolution::Stopped);
    }

    self.adapter_calls += 1;
    let request = format!("selector `{}`", ctx.selector);
    tracing::debug!(%request, "Resolving selector");

    match self.adapter.resolve_selector(&ctx) {
      Ok(Some(resolved)) => Ok(self.accept(resolved.expr, resolved.imports, &request, site)),
      Ok(None) => Ok(Resolution::Declined),
      Err(error) => self.adapter_failed(error, &request, site),
    }
  }

  fn accept(
    &mut self,
    expr: String,
    imports: Vec<ImportSpec>,
    request: &str,
    site: &DiagnosticSite,
  ) -> Resolution<ResolvedExpr> {
    let parsed = match parse_expr(&expr) {
      Ok(parsed) => parsed,
      Err(error) => {
        self.stop(site.diagnostic(
          DiagnosticCode::AdapterMalformedResult,
          BailScope::File,
          format!(
            "Resolution adapter returned `{expr}` for {request} in {}, which is not an expression: {error}",
            self.file_path
          ),
        ));
        return Resolution::Stopped;
      }
    };

    let value = match &*parsed {
      Expr::Lit(Lit::Str(text)) => StyleValue::Literal(text.value.to_string()),
      Expr::Lit(Lit::Num(number)) => StyleValue::Number(number.value),
      _ => StyleValue::Expr(expr.trim().to_string()),
    };
    self.imports.extend(imports);
    Resolution::Resolved(ResolvedExpr {
      source: expr.trim().to_string(),
      value,
    })
  }

  fn adapter_failed<T>(
    &mut self,
    error: AdapterError,
    request: &str,
    site: &DiagnosticSite,
  ) -> Result<Resolution<T>, LoweringError> {
    let code = match &error {
      AdapterError::InvalidUsage { .. } => {
        return Err(LoweringError::Configuration(format!(
          "{error} while resolving {request} in {}",
          self.file_path
        )));
      }
      AdapterError::MissingResult { .. } => DiagnosticCode::AdapterMissingResult,
      AdapterError::Malformed { .. } => DiagnosticCode::AdapterMalformedResult,
    };
    self.stop(
      site
        .diagnostic(
          code,
          BailScope::File,
          format!("{error} while resolving {request} in {}", self.file_path),
        )
        .with_hint("This is a bug in the resolution adapter, not in the styles"),
    );
    Ok(Resolution::Stopped)
  }
}

fn describe_args(args: &[CallArg]) -> String {
  args
    .iter()
    .map(|arg| match arg {
      CallArg::Literal(text) => format!("\"{text}\""),
      CallArg::Number(number) => number.to_string(),
      CallArg::ThemePath(path) => format!("theme.{path}"),
      CallArg::Unknown => "<unknown>".to_string(),
    })
    .collect::<Vec<_>>()
    .join(", ")
}
