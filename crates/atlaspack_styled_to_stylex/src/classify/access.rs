use indexmap::IndexMap;
use swc_core::ecma::ast::{
  ArrowExpr, BinaryOp, Expr, Ident, IdentName, Lit, MemberExpr, MemberProp, ObjectPatProp, Pat,
  PropName, UnaryOp,
};
use swc_core::ecma::visit::{Visit, VisitWith};

use super::*;

/// Names the props parameter of the enclosing arrow function binds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropsBindings {
  /// `p` in `p => ...`.
  pub props_ident: Option<String>,
  /// Local name -> prop name, from destructuring (`{ $size: size }`).
  pub props: IndexMap<String, String>,
  /// Local name -> theme path prefix. `theme` maps to the empty prefix, `colors` in
  /// `{ theme: { colors } }` to `colors`.
  pub theme: IndexMap<String, String>,
}

impl PropsBindings {
  /// Whether an arrow parameter shadows `name`.
  pub fn binds(&self, name: &str) -> bool {
    self.props_ident.as_deref() == Some(name)
      || self.props.contains_key(name)
      || self.theme.contains_key(name)
  }
}

/// Bind the parameter of `arrow` on top of `inherited`.
pub fn bind_arrow(arrow: &ArrowExpr, inherited: &PropsBindings) -> Result<PropsBindings, &'static str> {
  let mut bindings = inherited.clone();
  match arrow.params.as_slice() {
    [] => Ok(bindings),
    [Pat::Ident(ident)] => {
      let name = ident.id.sym.to_string();
      bindings.props.shift_remove(&name);
      bindings.theme.shift_remove(&name);
      bindings.props_ident = Some(name);
      Ok(bindings)
    }
    [Pat::Object(object)] => {
      bindings.props_ident = None;
      for prop in &object.props {
        match prop {
          ObjectPatProp::Assign(assign) if assign.value.is_none() => {
            let name = assign.key.sym.to_string();
            if name == "theme" {
              bindings.theme.insert(name, String::new());
            } else {
              bindings.props.insert(name.clone(), name);
            }
          }
          ObjectPatProp::KeyValue(key_value) => {
            let Some(key) = prop_name_text(&key_value.key) else {
              return Err("computed-destructuring");
            };
            match (&*key_value.value, key == "theme") {
              (Pat::Ident(local), true) => {
                bindings.theme.insert(local.id.sym.to_string(), String::new());
              }
              (Pat::Ident(local), false) => {
                bindings.props.insert(local.id.sym.to_string(), key);
              }
              (Pat::Object(theme), true) => bind_theme_pattern(&theme.props, "", &mut bindings)?,
              _ => return Err("nested-destructuring"),
            }
          }
          ObjectPatProp::Assign(_) => return Err("destructuring-default"),
          ObjectPatProp::Rest(_) => return Err("rest-pattern"),
        }
      }
      Ok(bindings)
    }
    [_] => Err("unsupported-param"),
    _ => Err("multiple-params"),
  }
}

fn bind_theme_pattern(
  props: &[ObjectPatProp],
  prefix: &str,
  bindings: &mut PropsBindings,
) -> Result<(), &'static str> {
  for prop in props {
    match prop {
      ObjectPatProp::Assign(assign) if assign.value.is_none() => {
        bindings
          .theme
          .insert(assign.key.sym.to_string(), join_path(prefix, &assign.key.sym));
      }
      ObjectPatProp::KeyValue(key_value) => {
        let Some(key) = prop_name_text(&key_value.key) else {
          return Err("computed-destructuring");
        };
        let path = join_path(prefix, &key);
        match &*key_value.value {
          Pat::Ident(local) => {
            bindings.theme.insert(local.id.sym.to_string(), path);
          }
          Pat::Object(nested) => bind_theme_pattern(&nested.props, &path, bindings)?,
          _ => return Err("nested-destructuring"),
        }
      }
      _ => return Err("destructuring-default"),
    }
  }
  Ok(())
}

fn join_path(prefix: &str, segment: &str) -> String {
  if prefix.is_empty() {
    segment.to_string()
  } else {
    format!("{prefix}.{segment}")
  }
}

fn prop_name_text(name: &PropName) -> Option<String> {
  match name {
    PropName::Ident(IdentName { sym, .. }) => Some(sym.to_string()),
    PropName::Str(text) => Some(text.value.to_string()),
    _ => None,
  }
}

/// Strips parentheses and TypeScript-only wrappers.
pub fn unwrap_expr(expr: &Expr) -> &Expr {
  match expr {
    Expr::Paren(paren) => unwrap_expr(&paren.expr),
    Expr::TsAs(ts_as) => unwrap_expr(&ts_as.expr),
    Expr::TsNonNull(non_null) => unwrap_expr(&non_null.expr),
    Expr::TsConstAssertion(assertion) => unwrap_expr(&assertion.expr),
    Expr::TsSatisfies(satisfies) => unwrap_expr(&satisfies.expr),
    _ => expr,
  }
}

/// A read of the props object.
#[derive(Clone, Debug, PartialEq)]
pub enum Access {
  /// `p.size`, or `size` destructured from props.
  Prop(String),
  /// `p.theme.colors.primary` -> `colors.primary`
  Theme(String),
  /// `p.theme.colors[p.variant]`
  IndexedTheme { path: String, prop: String },
}

enum Segment<'a> {
  Name(String),
  Index(&'a Expr),
}

pub fn access(expr: &Expr, bindings: &PropsBindings) -> Option<Access> {
  let mut segments = Vec::new();
  let mut current = unwrap_expr(expr);
  let root = loop {
    match current {
      Expr::Member(MemberExpr { obj, prop, .. }) => {
        segments.push(match prop {
          MemberProp::Ident(name) => Segment::Name(name.sym.to_string()),
          MemberProp::Computed(computed) => match unwrap_expr(&computed.expr) {
            Expr::Lit(Lit::Str(text)) => Segment::Name(text.value.to_string()),
            index => Segment::Index(index),
          },
          MemberProp::PrivateName(_) => return None,
        });
        current = unwrap_expr(obj);
      }
      Expr::Ident(Ident { sym, .. }) => break sym.to_string(),
      _ => return None,
    }
  };
  segments.reverse();

  if bindings.props_ident.as_deref() == Some(root.as_str()) {
    let mut segments = segments.into_iter();
    let Some(Segment::Name(first)) = segments.next() else {
      return None;
    };
    let rest: Vec<Segment> = segments.collect();
    if first == "theme" {
      return theme_access("", rest, bindings);
    }
    return rest.is_empty().then_some(Access::Prop(first));
  }

  if let Some(prop) = bindings.props.get(&root) {
    return segments.is_empty().then(|| Access::Prop(prop.clone()));
  }

  if let Some(prefix) = bindings.theme.get(&root) {
    return theme_access(prefix, segments, bindings);
  }

  None
}

fn theme_access(prefix: &str, segments: Vec<Segment>, bindings: &PropsBindings) -> Option<Access> {
  let mut path = prefix.to_string();
  let count = segments.len();
  for (position, segment) in segments.into_iter().enumerate() {
    match segment {
      Segment::Name(name) => path = join_path(&path, &name),
      Segment::Index(index) if position + 1 == count && !path.is_empty() => {
        return match access(index, bindings) {
          Some(Access::Prop(prop)) => Some(Access::IndexedTheme { path, prop }),
          _ => None,
        };
      }
      Segment::Index(_) => return None,
    }
  }
  (!path.is_empty()).then_some(Access::Theme(path))
}

struct ThemeFinder<'a> {
  bindings: &'a PropsBindings,
  found: bool,
}

impl Visit for ThemeFinder<'_> {
  fn visit_ident(&mut self, ident: &Ident) {
    if &*ident.sym == "theme" || self.bindings.theme.contains_key(&*ident.sym) {
      self.found = true;
    }
  }

  fn visit_member_expr(&mut self, member: &MemberExpr) {
    if let MemberProp::Ident(name) = &member.prop {
      if &*name.sym == "theme" {
        self.found = true;
        return;
      }
    }
    member.visit_children_with(self);
  }
}

/// Whether `expr` reads anything from the theme.
pub fn touches_theme(expr: &Expr, bindings: &PropsBindings) -> bool {
  let mut finder = ThemeFinder {
    bindings,
    found: false,
  };
  expr.visit_with(&mut finder);
  finder.found
}

/// Compile-time text of a literal, a literal module constant or an expression-free template.
pub(super) fn static_text(expr: &Expr, ctx: &ClassifyContext) -> Option<String> {
  match unwrap_expr(expr) {
    Expr::Lit(Lit::Str(text)) => Some(text.value.to_string()),
    Expr::Lit(Lit::Num(number)) => Some(number.value.to_string()),
    Expr::Unary(unary) if unary.op == UnaryOp::Minus => match unwrap_expr(&unary.arg) {
      Expr::Lit(Lit::Num(number)) => Some((-number.value).to_string()),
      _ => None,
    },
    Expr::Tpl(tpl) if tpl.exprs.is_empty() => tpl
      .quasis
      .first()
      .map(|quasi| quasi.cooked.as_ref().unwrap_or(&quasi.raw).to_string()),
    Expr::Ident(ident) if !ctx.bindings.binds(&ident.sym) => {
      ctx.scope.constants.get(&*ident.sym).cloned()
    }
    _ => None,
  }
}

pub(super) fn match_static(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  static_text(expr, ctx).map(Classified::Static)
}

pub(super) fn match_theme(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  match access(expr, ctx.bindings)? {
    Access::Theme(path) => Some(Classified::Theme { path }),
    _ => None,
  }
}

pub(super) fn match_prop(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  match access(expr, ctx.bindings)? {
    Access::Prop(name) => Some(Classified::Prop { name }),
    _ => None,
  }
}

fn logical_operator(op: BinaryOp) -> Option<LogicalOperator> {
  match op {
    BinaryOp::NullishCoalescing => Some(LogicalOperator::Nullish),
    BinaryOp::LogicalOr => Some(LogicalOperator::Or),
    _ => None,
  }
}

pub(super) fn match_indexed_theme(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  let indexed = |expr: &Expr| match access(expr, ctx.bindings) {
    Some(Access::IndexedTheme { path, prop }) => Some((path, prop)),
    _ => None,
  };

  if let Some((path, prop)) = indexed(expr) {
    return Some(Classified::IndexedTheme(IndexedTheme {
      path,
      prop,
      fallback: None,
    }));
  }

  match expr {
    Expr::Bin(bin) => {
      let operator = logical_operator(bin.op)?;
      let (path, prop) = indexed(unwrap_expr(&bin.left))?;
      let fallback = match access(&bin.right, ctx.bindings) {
        Some(Access::Prop(other)) if other == prop => IndexedFallback::Prop(operator),
        _ => IndexedFallback::Static(operator, static_text(&bin.right, ctx)?),
      };
      Some(Classified::IndexedTheme(IndexedTheme {
        path,
        prop,
        fallback: Some(fallback),
      }))
    }
    Expr::Cond(cond) => {
      let Some(Access::Prop(tested)) = access(&cond.test, ctx.bindings) else {
        return None;
      };
      let (path, prop) = indexed(unwrap_expr(&cond.cons))?;
      if tested != prop {
        return None;
      }
      let fallback = static_text(&cond.alt, ctx)?;
      Some(Classified::IndexedTheme(IndexedTheme {
        path,
        prop,
        fallback: Some(IndexedFallback::WhenUnset(fallback)),
      }))
    }
    _ => None,
  }
}

/// `a ?? b` / `a || b` with a prop or theme read on one side and a literal or theme read on
/// the other.
pub(super) fn match_logical_default(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  let Expr::Bin(bin) = expr else {
    return None;
  };
  let operator = logical_operator(bin.op)?;

  let side = |expr: &Expr| match access(expr, ctx.bindings) {
    Some(Access::Prop(name)) => Some((Classified::Prop { name }, true)),
    Some(Access::Theme(path)) => Some((Classified::Theme { path }, true)),
    _ => static_text(expr, ctx).map(|text| (Classified::Static(text), false)),
  };
  let (left, left_is_access) = side(&bin.left)?;
  let (right, right_is_access) = side(&bin.right)?;
  if !left_is_access && !right_is_access {
    return None;
  }
  if matches!(left, Classified::Prop { .. }) && matches!(right, Classified::Prop { .. }) {
    return None;
  }

  Some(Classified::LogicalDefault {
    operator,
    left: Box::new(left),
    right: Box::new(right),
  })
}

#[cfg(test)]
mod tests {
  use super::super::test_utils::*;
  use super::*;
  use pretty_assertions::assert_eq;

  fn arrow_bindings(code: &str) -> Result<PropsBindings, &'static str> {
    let Expr::Arrow(arrow) = expr(code) else {
      panic!("expected an arrow function");
    };
    bind_arrow(&arrow, &PropsBindings::default())
  }

  #[test]
  fn test_destructured_bindings() {
    let bindings =
      arrow_bindings("({ $size: size, disabled, theme: { colors, space: { md } } }) => null").unwrap();

    assert_eq!(bindings.props_ident, None);
    assert_eq!(
      bindings.props,
      IndexMap::from([
        ("size".to_string(), "$size".to_string()),
        ("disabled".to_string(), "disabled".to_string()),
      ])
    );
    assert_eq!(
      bindings.theme,
      IndexMap::from([
        ("colors".to_string(), "colors".to_string()),
        ("md".to_string(), "space.md".to_string()),
      ])
    );
  }

  #[test]
  fn test_rejected_parameters() {
    assert_eq!(arrow_bindings("({ ...rest }) => null"), Err("rest-pattern"));
    assert_eq!(arrow_bindings("({ a = 1 }) => null"), Err("destructuring-default"));
    assert_eq!(arrow_bindings("(a, b) => null"), Err("multiple-params"));
  }

  #[test]
  fn test_access_shapes() {
    let bindings = arrow_bindings("p => null").unwrap();
    assert_eq!(
      access(&expr("p.theme.colors['primary']"), &bindings),
      Some(Access::Theme("colors.primary".into()))
    );
    assert_eq!(
      access(&expr("p.theme.space[p.gap]"), &bindings),
      Some(Access::IndexedTheme {
        path: "space".into(),
        prop: "gap".into()
      })
    );
    assert_eq!(access(&expr("(p.$active as boolean)"), &bindings), Some(Access::Prop("$active".into())));
    assert_eq!(access(&expr("p.user.name"), &bindings), None);
    assert_eq!(access(&expr("p.theme"), &bindings), None);
    assert_eq!(access(&expr("other.color"), &bindings), None);

    let destructured = arrow_bindings("({ theme: { colors } }) => null").unwrap();
    assert_eq!(
      access(&expr("colors.primary"), &destructured),
      Some(Access::Theme("colors.primary".into()))
    );
  }

  #[test]
  fn test_touches_theme() {
    let bindings = arrow_bindings("({ theme: { colors } }) => null").unwrap();
    assert!(touches_theme(&expr("darken(colors.primary)"), &bindings));
    assert!(touches_theme(&expr("p => p.theme.mode === 'dark'"), &PropsBindings::default()));
    assert!(!touches_theme(&expr("p => p.size * 2"), &PropsBindings::default()));
  }

  #[test]
  fn test_indexed_theme_fallbacks() {
    let scope = ModuleScope::default();
    let Classified::IndexedTheme(indexed) = classify_code("p => p.theme.color[p.variant] || p.variant", &scope)
    else {
      panic!("expected an indexed theme lookup");
    };
    assert_eq!(indexed.fallback, Some(IndexedFallback::Prop(LogicalOperator::Or)));

    let Classified::IndexedTheme(indexed) =
      classify_code("p => p.variant ? p.theme.color[p.variant] : 'inherit'", &scope)
    else {
      panic!("expected an indexed theme lookup");
    };
    assert_eq!(indexed.fallback, Some(IndexedFallback::WhenUnset("inherit".into())));
  }

  #[test]
  fn test_logical_default() {
    let scope = ModuleScope::default();
    assert!(matches!(
      classify_code("p => p.color ?? p.theme.colors.text", &scope),
      Classified::LogicalDefault { operator: LogicalOperator::Nullish, .. }
    ));
    assert!(matches!(
      classify_code("p => p.a || p.b", &scope),
      Classified::Unhandled(_)
    ));
  }
}
