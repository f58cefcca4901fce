use swc_core::ecma::ast::{CallExpr, Callee, Expr, Lit, MemberProp};

use super::access::static_text;
use super::*;

fn call_arg(expr: &Expr, ctx: &ClassifyContext) -> CallArg {
  let expr = unwrap_expr(expr);
  if let Expr::Lit(Lit::Num(number)) = expr {
    return CallArg::Number(number.value);
  }
  if let Some(text) = static_text(expr, ctx) {
    return CallArg::Literal(text);
  }
  match access(expr, ctx.bindings) {
    Some(Access::Theme(path)) => CallArg::ThemePath(path),
    _ => CallArg::Unknown,
  }
}

/// `(imported name, source)` of a callee rooted at an import.
fn imported_callee(callee: &Expr, ctx: &ClassifyContext) -> Option<(String, String)> {
  match unwrap_expr(callee) {
    Expr::Ident(ident) => {
      let binding = ctx.scope.imports.get(&*ident.sym)?;
      let imported = match binding.imported.as_str() {
        "*" | "default" => ident.sym.to_string(),
        imported => imported.to_string(),
      };
      Some((imported, binding.source.clone()))
    }
    // `mixins.truncate()` on a namespace import
    Expr::Member(member) => {
      let Expr::Ident(object) = unwrap_expr(&member.obj) else {
        return None;
      };
      let binding = ctx.scope.imports.get(&*object.sym)?;
      let MemberProp::Ident(name) = &member.prop else {
        return None;
      };
      (binding.imported == "*").then(|| (name.sym.to_string(), binding.source.clone()))
    }
    _ => None,
  }
}

fn helper_call(call: &CallExpr, ctx: &ClassifyContext, curried: bool) -> Option<HelperCall> {
  let Callee::Expr(callee) = &call.callee else {
    return None;
  };
  let (imported, source) = imported_callee(callee, ctx)?;
  let args = call
    .args
    .iter()
    .map(|arg| {
      if arg.spread.is_some() {
        CallArg::Unknown
      } else {
        call_arg(&arg.expr, ctx)
      }
    })
    .collect();
  Some(HelperCall {
    imported,
    source,
    args,
    curried,
  })
}

fn is_props_arg(call: &CallExpr, ctx: &ClassifyContext) -> bool {
  match call.args.as_slice() {
    [arg] if arg.spread.is_none() => match unwrap_expr(&arg.expr) {
      Expr::Ident(ident) => ctx.bindings.props_ident.as_deref() == Some(&*ident.sym),
      _ => false,
    },
    _ => false,
  }
}

pub(super) fn match_call(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  let Expr::Call(call) = expr else {
    return None;
  };

  if let Callee::Expr(callee) = &call.callee {
    if let Expr::Call(inner) = unwrap_expr(callee) {
      if is_props_arg(call, ctx) {
        return helper_call(inner, ctx, true).map(Classified::Call);
      }
    }
  }

  helper_call(call, ctx, false).map(Classified::Call)
}

#[cfg(test)]
mod tests {
  use super::super::test_utils::*;
  use super::*;
  use crate::collect::ImportBinding;
  use pretty_assertions::assert_eq;

  fn scope() -> ModuleScope {
    let mut scope = ModuleScope::default();
    scope.imports.insert(
      "spacing".into(),
      ImportBinding {
        source: "@acme/design".into(),
        imported: "space".into(),
      },
    );
    scope.imports.insert(
      "mixins".into(),
      ImportBinding {
        source: "./mixins".into(),
        imported: "*".into(),
      },
    );
    scope
  }

  #[test]
  fn test_arguments_are_classified_without_guessing() {
    let Classified::Call(call) = classify_code("p => spacing(2, 'x', p.theme.space.md, p.size, ...rest)", &scope())
    else {
      panic!("expected a call");
    };
    assert_eq!(
      call,
      HelperCall {
        imported: "space".into(),
        source: "@acme/design".into(),
        args: vec![
          CallArg::Number(2.0),
          CallArg::Literal("x".into()),
          CallArg::ThemePath("space.md".into()),
          CallArg::Unknown,
          CallArg::Unknown,
        ],
        curried: false,
      }
    );
  }

  #[test]
  fn test_curried_namespace_call() {
    let Classified::Call(call) = classify_code("props => mixins.focusRing('inset')(props)", &scope()) else {
      panic!("expected a call");
    };
    assert_eq!(call.imported, "focusRing");
    assert_eq!(call.source, "./mixins");
    assert!(call.curried);
  }

  #[test]
  fn test_local_calls_are_not_helper_calls() {
    assert!(matches!(
      classify_code("p => darken(p.color)", &scope()),
      Classified::Unhandled(_)
    ));
  }
}
