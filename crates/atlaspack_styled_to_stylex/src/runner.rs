use std::path::Path;

use swc_core::common::input::StringInput;
use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, SourceMap, Span, Spanned};
use swc_core::ecma::ast::{EsVersion, Expr, Module};
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::codegen::{Config as CodegenConfig, Emitter, Node};
use swc_core::ecma::parser::lexer::Lexer;
use swc_core::ecma::parser::{parse_file_as_expr, EsSyntax, Parser, Syntax, TsSyntax};

use crate::diagnostic::SourceLocation;

/// A parsed module together with the source map its spans point into.
pub struct ParsedModule {
  pub module: Module,
  pub source_map: Lrc<SourceMap>,
}

impl ParsedModule {
  pub fn location(&self, span: Span) -> Option<SourceLocation> {
    if span.lo.is_dummy() {
      return None;
    }
    let loc = self.source_map.lookup_char_pos(span.lo);
    Some(SourceLocation {
      line: loc.line,
      column: loc.col_display + 1,
    })
  }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
  #[error("Failed to parse module: {0:?}")]
  SwcParse(swc_core::ecma::parser::error::Error),
  #[error("IO Error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Invalid utf-8 output: {0}")]
  InvalidUtf8Output(#[from] std::string::FromUtf8Error),
  #[error("Unexpected input after expression: `{0}`")]
  TrailingInput(String),
}

pub fn syntax_for_path(path: &Path) -> Syntax {
  let name = path.to_string_lossy();
  if name.ends_with(".ts") || name.ends_with(".tsx") || name.ends_with(".mts") {
    Syntax::Typescript(TsSyntax {
      tsx: name.ends_with(".tsx"),
      ..Default::default()
    })
  } else {
    Syntax::Es(EsSyntax {
      jsx: true,
      ..Default::default()
    })
  }
}

/// Parse `code` as a module using the syntax implied by `path`.
pub fn parse_module(code: &str, path: &Path) -> Result<ParsedModule, RunnerError> {
  let source_map: Lrc<SourceMap> = Default::default();
  let source_file = source_map.new_source_file(
    Lrc::new(FileName::Real(path.to_path_buf())),
    code.to_string(),
  );
  let lexer = Lexer::new(
    syntax_for_path(path),
    EsVersion::latest(),
    StringInput::from(&*source_file),
    None,
  );
  let mut parser = Parser::new_from(lexer);
  let module = parser.parse_module().map_err(RunnerError::SwcParse)?;
  Ok(ParsedModule { module, source_map })
}

/// Parse a standalone expression, as returned by a resolution adapter.
pub fn parse_expr(code: &str) -> Result<Box<Expr>, RunnerError> {
  let source_map: Lrc<SourceMap> = Default::default();
  let source_file = source_map.new_source_file(Lrc::new(FileName::Anon), code.to_string());
  let mut recovered = Vec::new();
  let expr = parse_file_as_expr(
    &source_file,
    Syntax::Typescript(TsSyntax {
      tsx: true,
      ..Default::default()
    }),
    EsVersion::latest(),
    None,
    &mut recovered,
  )
  .map_err(RunnerError::SwcParse)?;
  if let Some(error) = recovered.into_iter().next() {
    return Err(RunnerError::SwcParse(error));
  }

  let consumed = (expr.span().hi - source_file.start_pos).0 as usize;
  let rest = code.get(consumed..).unwrap_or("").trim().trim_start_matches(';').trim();
  if !rest.is_empty() {
    return Err(RunnerError::TrailingInput(rest.to_string()));
  }
  Ok(expr)
}

fn emit_node<N: Node>(node: &N) -> Result<String, RunnerError> {
  let source_map: Lrc<SourceMap> = Default::default();
  let mut output_buffer = vec![];
  {
    let writer = JsWriter::new(source_map.clone(), "\n", &mut output_buffer, None);
    let mut cfg = CodegenConfig::default();
    cfg.target = EsVersion::latest();
    let mut emitter = Emitter {
      cfg,
      cm: source_map.clone(),
      comments: None,
      wr: writer,
    };
    node.emit_with(&mut emitter)?;
  }
  Ok(String::from_utf8(output_buffer)?)
}

/// Print an expression back to source.
pub fn emit_expr(expr: &Expr) -> Result<String, RunnerError> {
  emit_node(expr)
}

pub fn emit_module(module: &Module) -> Result<String, RunnerError> {
  emit_node(module)
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_parse_and_emit_expression() {
    let expr = parse_expr("tokens.colors.primary").unwrap();
    assert_eq!(emit_expr(&expr).unwrap(), "tokens.colors.primary");
  }

  #[test]
  fn test_parse_expr_rejects_garbage() {
    assert!(parse_expr("tokens.(").is_err());
    assert!(parse_expr("a b").is_err());
  }

  #[test]
  fn test_parse_module_reports_locations() {
    let parsed = parse_module("const a = 1;\nconst b = 2;\n", Path::new("file.tsx")).unwrap();
    let second = &parsed.module.body[1];
    let span = match second {
      swc_core::ecma::ast::ModuleItem::Stmt(stmt) => stmt.span(),
      _ => unreachable!(),
    };
    assert_eq!(
      parsed.location(span),
      Some(SourceLocation { line: 2, column: 1 })
    );
  }
}
