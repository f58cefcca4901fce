//! Pattern grammar over interpolation expressions.
//!
//! Every interpolation is matched against an ordered list of shapes. The first match wins;
//! nothing is evaluated, and anything unrecognized comes back as [`Classified::Unhandled`].

use swc_core::ecma::ast::{ArrowExpr, BlockStmtOrExpr, Expr};

use crate::collect::ModuleScope;
use crate::condition::VariantCondition;
use crate::diagnostic::DiagnosticCode;
use crate::resolution::CallArg;

mod access;
mod call;
mod conditional;
mod selector;
mod switch;
mod template;

pub use access::{access, bind_arrow, touches_theme, unwrap_expr, Access, PropsBindings};
pub use selector::{classify_selector_slot, SelectorSlot};

/// A `css` helper template, or anything that behaves like one.
#[derive(Clone, Debug)]
pub struct CssBlock {
  pub quasis: Vec<String>,
  pub exprs: Vec<Expr>,
  /// Bindings visible to the block's own interpolations.
  pub bindings: PropsBindings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOperator {
  /// `??`
  Nullish,
  /// `||`
  Or,
}

impl LogicalOperator {
  pub fn as_str(&self) -> &'static str {
    match self {
      LogicalOperator::Nullish => "??",
      LogicalOperator::Or => "||",
    }
  }
}

/// What `theme.<path>[p.<prop>]` falls back to.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexedFallback {
  /// `|| p.<prop>` / `?? p.<prop>`
  Prop(LogicalOperator),
  /// `?? "literal"`
  Static(LogicalOperator, String),
  /// `p.<prop> ? theme.<path>[p.<prop>] : "literal"`
  WhenUnset(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexedTheme {
  pub path: String,
  pub prop: String,
  pub fallback: Option<IndexedFallback>,
}

#[derive(Clone, Debug)]
pub enum Branch {
  /// `null`, `undefined`, `false` or an empty string.
  Empty,
  Value(Box<Classified>),
  Css(CssBlock),
  Nested(Box<Conditional>),
}

/// `condition ? consequent : alternate`, normalized so the condition is positive.
#[derive(Clone, Debug)]
pub struct Conditional {
  pub condition: VariantCondition,
  pub consequent: Branch,
  pub alternate: Branch,
}

#[derive(Clone, Debug)]
pub struct SwitchArm {
  pub values: Vec<String>,
  pub block: CssBlock,
}

#[derive(Clone, Debug)]
pub struct SwitchEnumeration {
  pub prop: String,
  pub arms: Vec<SwitchArm>,
  /// Literal values stacked onto the `default` case.
  pub default_values: Vec<String>,
  pub default: CssBlock,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HelperCall {
  pub imported: String,
  pub source: String,
  pub args: Vec<CallArg>,
  /// `helper(args)(props)`
  pub curried: bool,
}

#[derive(Clone, Debug)]
pub enum TemplatePiece {
  Text(String),
  Slot(Classified),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Unhandled {
  pub code: DiagnosticCode,
  pub reason: String,
  pub touches_theme: bool,
}

#[derive(Clone, Debug)]
pub enum Classified {
  Static(String),
  Theme {
    path: String,
  },
  IndexedTheme(IndexedTheme),
  Prop {
    name: String,
  },
  LogicalDefault {
    operator: LogicalOperator,
    left: Box<Classified>,
    right: Box<Classified>,
  },
  Conditional(Conditional),
  Switch(SwitchEnumeration),
  Call(HelperCall),
  Template(Vec<TemplatePiece>),
  ImportedValue {
    imported: String,
    source: String,
    path: Option<String>,
  },
  Css(CssBlock),
  /// A recognized shape that cannot be migrated without changing behavior.
  Rejected {
    code: DiagnosticCode,
    reason: String,
  },
  Unhandled(Unhandled),
}

impl Classified {
  fn unhandled(code: DiagnosticCode, reason: impl Into<String>, touches_theme: bool) -> Self {
    Classified::Unhandled(Unhandled {
      code,
      reason: reason.into(),
      touches_theme,
    })
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
  StaticLiteral,
  ThemeAccess,
  IndexedTheme,
  PropAccess,
  LogicalDefault,
  Conditional,
  Switch,
  Call,
  TemplateLiteral,
  ImportedValue,
  CssHelper,
}

pub struct ClassifyContext<'a> {
  pub scope: &'a ModuleScope,
  pub bindings: &'a PropsBindings,
}

impl<'a> ClassifyContext<'a> {
  pub fn new(scope: &'a ModuleScope, bindings: &'a PropsBindings) -> Self {
    ClassifyContext { scope, bindings }
  }
}

type Matcher = fn(&Expr, &ClassifyContext) -> Option<Classified>;

/// More specific shapes come first: an indexed theme lookup is also a theme access, and a
/// prop access inside a call is still a call.
const PATTERNS: &[(ShapeKind, Matcher)] = &[
  (ShapeKind::StaticLiteral, access::match_static),
  (ShapeKind::IndexedTheme, access::match_indexed_theme),
  (ShapeKind::ThemeAccess, access::match_theme),
  (ShapeKind::PropAccess, access::match_prop),
  (ShapeKind::LogicalDefault, access::match_logical_default),
  (ShapeKind::Conditional, conditional::match_conditional),
  (ShapeKind::Switch, switch::match_invoked_switch),
  (ShapeKind::Call, call::match_call),
  (ShapeKind::TemplateLiteral, template::match_template),
  (ShapeKind::ImportedValue, template::match_imported_value),
  (ShapeKind::CssHelper, template::match_css_helper),
];

/// Classify one interpolation. Arrow functions bind their props parameter first.
pub fn classify(expr: &Expr, ctx: &ClassifyContext) -> Classified {
  match unwrap_expr(expr) {
    Expr::Arrow(arrow) => classify_arrow(arrow, ctx),
    expr => classify_value(expr, ctx),
  }
}

fn classify_arrow(arrow: &ArrowExpr, ctx: &ClassifyContext) -> Classified {
  let bindings = match bind_arrow(arrow, ctx.bindings) {
    Ok(bindings) => bindings,
    Err(reason) => {
      return Classified::unhandled(
        DiagnosticCode::UnhandledInterpolation,
        reason,
        touches_theme(&Expr::Arrow(arrow.clone()), ctx.bindings),
      )
    }
  };
  let inner = ClassifyContext::new(ctx.scope, &bindings);
  match &*arrow.body {
    BlockStmtOrExpr::Expr(body) => classify_value(body, &inner),
    BlockStmtOrExpr::BlockStmt(block) => switch::classify_block(block, &inner).unwrap_or_else(|| {
      Classified::unhandled(
        DiagnosticCode::UnhandledInterpolation,
        "block-body",
        touches_theme(&Expr::Arrow(arrow.clone()), ctx.bindings),
      )
    }),
  }
}

/// Classify an expression in the bindings already in scope.
pub fn classify_value(expr: &Expr, ctx: &ClassifyContext) -> Classified {
  let expr = unwrap_expr(expr);
  for (kind, matcher) in PATTERNS {
    if let Some(classified) = matcher(expr, ctx) {
      tracing::trace!(?kind, "Matched interpolation shape");
      return classified;
    }
  }

  let reason = match expr {
    Expr::Arrow(_) | Expr::Fn(_) => "nested-function",
    Expr::Call(_) => "unsupported-call",
    Expr::Member(_) => "unsupported-member-access",
    _ => "unsupported-expression",
  };
  Classified::unhandled(
    DiagnosticCode::UnhandledInterpolation,
    reason,
    touches_theme(expr, ctx.bindings),
  )
}

#[cfg(test)]
pub(crate) mod test_utils {
  use swc_core::ecma::ast::Expr;

  use super::*;
  use crate::runner::parse_expr;

  pub fn expr(code: &str) -> Expr {
    *parse_expr(code).unwrap()
  }

  pub fn classify_code(code: &str, scope: &ModuleScope) -> Classified {
    classify(&expr(code), &ClassifyContext::new(scope, &PropsBindings::default()))
  }
}
