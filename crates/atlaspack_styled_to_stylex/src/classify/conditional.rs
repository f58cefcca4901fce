use swc_core::ecma::ast::{BinaryOp, Expr, Lit, UnaryOp};

use super::access::static_text;
use super::template::css_block;
use super::*;

/// The condition tested by `test`, when it is a prop read, its negation or an equality
/// against a string literal.
pub fn condition_of(test: &Expr, ctx: &ClassifyContext) -> Option<VariantCondition> {
  match unwrap_expr(test) {
    Expr::Unary(unary) if unary.op == UnaryOp::Bang => Some(condition_of(&unary.arg, ctx)?.negate()),
    Expr::Bin(bin) => {
      let equal = match bin.op {
        BinaryOp::EqEqEq | BinaryOp::EqEq => true,
        BinaryOp::NotEqEq | BinaryOp::NotEq => false,
        _ => return None,
      };
      let (prop, value) = match (access(&bin.left, ctx.bindings), access(&bin.right, ctx.bindings)) {
        (Some(Access::Prop(prop)), _) => (prop, string_literal(&bin.right, ctx)?),
        (_, Some(Access::Prop(prop))) => (prop, string_literal(&bin.left, ctx)?),
        _ => return None,
      };
      let condition = VariantCondition::equals(prop, value);
      Some(if equal { condition } else { condition.negate() })
    }
    test => match access(test, ctx.bindings)? {
      Access::Prop(prop) => Some(VariantCondition::truthy(prop)),
      _ => None,
    },
  }
}

fn string_literal(expr: &Expr, ctx: &ClassifyContext) -> Option<String> {
  match unwrap_expr(expr) {
    Expr::Lit(Lit::Str(text)) => Some(text.value.to_string()),
    Expr::Tpl(tpl) if tpl.exprs.is_empty() => static_text(expr, ctx),
    Expr::Ident(_) => static_text(expr, ctx),
    _ => None,
  }
}

fn is_empty_branch(expr: &Expr) -> bool {
  match unwrap_expr(expr) {
    Expr::Lit(Lit::Null(_)) => true,
    Expr::Lit(Lit::Bool(value)) => !value.value,
    Expr::Lit(Lit::Str(text)) => text.value.trim().is_empty(),
    Expr::Tpl(tpl) => {
      tpl.exprs.is_empty()
        && tpl
          .quasis
          .iter()
          .all(|quasi| quasi.raw.trim().is_empty())
    }
    Expr::Ident(ident) => &*ident.sym == "undefined",
    _ => false,
  }
}

fn branch(expr: &Expr, ctx: &ClassifyContext) -> Result<Branch, String> {
  let expr = unwrap_expr(expr);
  if is_empty_branch(expr) {
    return Ok(Branch::Empty);
  }
  if let Some(nested) = conditional(expr, ctx) {
    return nested.map(|nested| Branch::Nested(Box::new(nested)));
  }
  if let Some(block) = css_block(expr, ctx) {
    return Ok(Branch::Css(block));
  }

  match classify_value(expr, ctx) {
    Classified::Unhandled(unhandled) => Err(unhandled.reason),
    Classified::Rejected { reason, .. } => Err(reason),
    classified => Ok(Branch::Value(Box::new(classified))),
  }
}

/// `None` when `expr` is not a conditional at all, `Some(Err(_))` when it is one but a
/// branch cannot be classified.
fn conditional(expr: &Expr, ctx: &ClassifyContext) -> Option<Result<Conditional, String>> {
  let (condition, consequent, alternate) = match expr {
    Expr::Cond(cond) => (
      condition_of(&cond.test, ctx)?,
      branch(&cond.cons, ctx),
      branch(&cond.alt, ctx),
    ),
    Expr::Bin(bin) if bin.op == BinaryOp::LogicalAnd => (
      condition_of(&bin.left, ctx)?,
      branch(&bin.right, ctx),
      Ok(Branch::Empty),
    ),
    _ => return None,
  };

  let consequent = match consequent {
    Ok(branch) => branch,
    Err(reason) => return Some(Err(reason)),
  };
  let alternate = match alternate {
    Ok(branch) => branch,
    Err(reason) => return Some(Err(reason)),
  };

  Some(Ok(if condition.is_positive() {
    Conditional {
      condition,
      consequent,
      alternate,
    }
  } else {
    Conditional {
      condition: condition.negate(),
      consequent: alternate,
      alternate: consequent,
    }
  }))
}

pub(super) fn match_conditional(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  Some(match conditional(expr, ctx)? {
    Ok(conditional) => Classified::Conditional(conditional),
    Err(reason) => Classified::unhandled(
      DiagnosticCode::UnresolvableBranch,
      format!("unresolvable-branch: {reason}"),
      touches_theme(expr, ctx.bindings),
    ),
  })
}
