//! Lowers styled-components declarations into static stylex style objects.
//!
//! [`lower_file`] is the entry point. It collects the `styled` declarations of one module,
//! lowers each of them with the help of a [`ResolutionAdapter`] and prints the resulting
//! `stylex.create` calls. Anything that cannot be expressed statically is reported as a
//! [`Diagnostic`] rather than guessed at.

use std::path::Path;

use serde::Serialize;

use crate::collect::{collect_styled_decls, Collected};
use crate::lower::FileLowering;
use crate::resolution::ResolutionSession;

pub mod classify;
pub mod collect;
pub mod condition;
pub mod config;
pub mod css_ir;
pub mod diagnostic;
pub mod dimensions;
pub mod emit;
pub mod lower;
pub mod naming;
pub mod resolution;
pub mod rule_parser;
pub mod runner;
pub mod styled_decl;
pub mod wrappers;

pub use config::LoweringConfig;
pub use diagnostic::{BailScope, Diagnostic, DiagnosticCode, LoweringError, SourceLocation};
pub use emit::emit_styles;
pub use resolution::{ImportSpec, MappingAdapter, ResolutionAdapter};
pub use styled_decl::StyledDecl;
pub use wrappers::{ConsumerUsage, ConsumerUsageMap};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoweredFile {
  pub decls: Vec<StyledDecl>,
  /// Imports the emitted styles depend on.
  pub imports: Vec<ImportSpec>,
  /// Component and declaration level reports. The file itself was lowered.
  pub diagnostics: Vec<Diagnostic>,
  pub styles_code: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FileOutcome {
  Lowered(LoweredFile),
  /// The file must be left untouched. At least one diagnostic has file scope.
  Bailed { diagnostics: Vec<Diagnostic> },
}

impl FileOutcome {
  pub fn diagnostics(&self) -> &[Diagnostic] {
    match self {
      FileOutcome::Lowered(file) => &file.diagnostics,
      FileOutcome::Bailed { diagnostics } => diagnostics,
    }
  }
}

/// Lower every styled component of one source file.
///
/// Returns `Err` only for input that cannot be processed at all (a syntax error, a template
/// the rule parser rejects). Unsupported patterns come back as diagnostics inside the
/// [`FileOutcome`].
#[tracing::instrument(level = "debug", skip_all, fields(file = %file_path.display()))]
pub fn lower_file(
  source: &str,
  file_path: &Path,
  adapter: &dyn ResolutionAdapter,
  config: &LoweringConfig,
  usage: &ConsumerUsageMap,
) -> Result<FileOutcome, LoweringError> {
  let file = file_path.to_string_lossy().to_string();
  let parsed = runner::parse_module(source, file_path).map_err(|error| LoweringError::Parse {
    file: file.clone(),
    message: error.to_string(),
  })?;

  let Collected {
    scope,
    mut decls,
    file_bails,
    mut allocator,
  } = collect_styled_decls(&parsed.module, config)?;

  let mut session = ResolutionSession::new(adapter, file);
  if let Some(bail) = file_bails.into_iter().next() {
    session.stop(
      Diagnostic::new(bail.code, BailScope::File, bail.message).with_loc(parsed.location(bail.span)),
    );
  }

  {
    let mut lowering = FileLowering::new(&scope, config, &mut session, &mut allocator);
    for decl in decls.iter_mut() {
      if lowering.session().is_stopped() {
        break;
      }
      let loc = parsed.location(decl.span);
      lowering.lower_styled_decl(decl, loc)?;
    }
  }

  if session.is_stopped() {
    let (_, diagnostics) = session.into_parts();
    tracing::debug!(diagnostics = diagnostics.len(), "File left untouched");
    return Ok(FileOutcome::Bailed { diagnostics });
  }

  let (imports, diagnostics) = session.into_parts();
  wrappers::propagate_wrapper_requirements(&mut decls, usage);
  let styles_code = emit::emit_styles(&decls, &imports, config)?;
  tracing::debug!(
    components = decls.len(),
    bailed = decls.iter().filter(|decl| decl.bail.is_some()).count(),
    "Lowered file"
  );

  Ok(FileOutcome::Lowered(LoweredFile {
    decls,
    imports,
    diagnostics,
    styles_code,
  }))
}

#[cfg(test)]
mod tests {
  use indoc::indoc;
  use pretty_assertions::assert_eq;
  use tracing_test::traced_test;

  use super::*;

  #[test]
  #[traced_test]
  fn test_dropped_declarations_are_reported_and_logged() {
    let config = LoweringConfig {
      inline_style_fallback: false,
      ..Default::default()
    };
    let outcome = lower_file(
      indoc! {r#"
        import styled from "styled-components";
        const Bar = styled.div`
          color: black;
          height: ${(p) => Math.max(p.$height, 10)};
        `;
      "#},
      Path::new("Bar.tsx"),
      &MappingAdapter::default(),
      &config,
      &ConsumerUsageMap::new(),
    )
    .unwrap();

    let FileOutcome::Lowered(file) = &outcome else {
      panic!("expected the file to lower");
    };
    assert_eq!(outcome.diagnostics().len(), 1);
    assert_eq!(outcome.diagnostics()[0].scope, BailScope::Declaration);
    assert!(!file.decls[0].base_style.contains_key("height"));
    assert!(logs_contain("Dropped declaration"));
  }

  #[test]
  fn test_files_without_styled_imports_emit_nothing() {
    let outcome = lower_file(
      "export const answer = 42;",
      Path::new("answer.ts"),
      &MappingAdapter::default(),
      &LoweringConfig::default(),
      &ConsumerUsageMap::new(),
    )
    .unwrap();

    let FileOutcome::Lowered(file) = outcome else {
      panic!("expected the file to lower");
    };
    assert!(file.decls.is_empty());
    assert_eq!(file.styles_code, "");
  }
}
