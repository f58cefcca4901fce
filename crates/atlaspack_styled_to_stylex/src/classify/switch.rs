use swc_core::ecma::ast::{BlockStmt, BlockStmtOrExpr, Callee, Expr, Stmt, SwitchStmt};

use super::access::static_text;
use super::template::css_block;
use super::*;

fn rejected(code: DiagnosticCode, reason: impl Into<String>) -> Classified {
  Classified::Rejected {
    code,
    reason: reason.into(),
  }
}

/// The expression a case body returns, looking through a wrapping block.
fn returned_expr(stmts: &[Stmt]) -> Option<&Expr> {
  match stmts {
    [Stmt::Return(ret)] => ret.arg.as_deref(),
    [Stmt::Block(block)] => returned_expr(&block.stmts),
    _ => None,
  }
}

fn enumerate(switch: &SwitchStmt, ctx: &ClassifyContext) -> Classified {
  let prop = match access(&switch.discriminant, ctx.bindings) {
    Some(Access::Prop(prop)) => prop,
    _ => {
      return Classified::unhandled(
        DiagnosticCode::UnhandledInterpolation,
        "switch-discriminant",
        touches_theme(&switch.discriminant, ctx.bindings),
      )
    }
  };

  let mut arms = Vec::new();
  let mut default = None;
  let mut default_values = Vec::new();
  let mut stacked = Vec::new();
  let mut stacked_default = false;

  for case in &switch.cases {
    match &case.test {
      Some(test) => match static_text(test, ctx) {
        Some(value) => stacked.push(value),
        None => {
          return rejected(
            DiagnosticCode::SwitchUnresolvableCase,
            format!("unresolvable switch case over `{prop}`: case test is not a literal"),
          )
        }
      },
      None => stacked_default = true,
    }
    if case.cons.is_empty() {
      continue;
    }

    let label = if stacked_default {
      "default".to_string()
    } else {
      stacked.join(", ")
    };
    let Some(block) = returned_expr(&case.cons).and_then(|returned| css_block(returned, ctx)) else {
      return rejected(
        DiagnosticCode::SwitchUnresolvableCase,
        format!("unresolvable switch case `{label}` over `{prop}`: it must return a css block"),
      );
    };

    if stacked_default {
      default_values = std::mem::take(&mut stacked);
      default = Some(block);
      stacked_default = false;
    } else {
      arms.push(SwitchArm {
        values: std::mem::take(&mut stacked),
        block,
      });
    }
  }

  if !stacked.is_empty() || stacked_default {
    return rejected(
      DiagnosticCode::SwitchUnresolvableCase,
      format!("unresolvable switch case over `{prop}`: trailing case has no body"),
    );
  }

  match default {
    Some(default) => Classified::Switch(SwitchEnumeration {
      prop,
      arms,
      default_values,
      default,
    }),
    None => rejected(
      DiagnosticCode::SwitchMissingDefault,
      format!("missing default case in switch over `{prop}`"),
    ),
  }
}

/// A block body: either a lone `switch`, or a lone `return`.
pub(super) fn classify_block(block: &BlockStmt, ctx: &ClassifyContext) -> Option<Classified> {
  match block.stmts.as_slice() {
    [Stmt::Switch(switch)] => Some(enumerate(switch, ctx)),
    [Stmt::Return(ret)] => ret.arg.as_deref().map(|returned| classify_value(returned, ctx)),
    _ => None,
  }
}

/// `(() => { switch (p.size) { ... } })()`
pub(super) fn match_invoked_switch(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  let Expr::Call(call) = expr else {
    return None;
  };
  let Callee::Expr(callee) = &call.callee else {
    return None;
  };
  let Expr::Arrow(arrow) = unwrap_expr(callee) else {
    return None;
  };
  if !call.args.is_empty() || !arrow.params.is_empty() {
    return None;
  }
  match &*arrow.body {
    BlockStmtOrExpr::BlockStmt(block) => match block.stmts.as_slice() {
      [Stmt::Switch(switch)] => Some(enumerate(switch, ctx)),
      _ => None,
    },
    BlockStmtOrExpr::Expr(_) => None,
  }
}
