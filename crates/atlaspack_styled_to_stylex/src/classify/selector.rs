use swc_core::ecma::ast::Expr;

use super::*;

/// What an interpolation inside a selector refers to.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectorSlot {
  /// Another component, by local name.
  Component(String),
  Unknown,
}

pub fn classify_selector_slot(expr: &Expr, scope: &ModuleScope) -> SelectorSlot {
  match unwrap_expr(expr) {
    Expr::Ident(ident) => {
      let name = ident.sym.to_string();
      let is_component = scope.components.contains(&name)
        || (scope.imports.contains_key(&name) && name.starts_with(|c: char| c.is_ascii_uppercase()));
      if is_component {
        SelectorSlot::Component(name)
      } else {
        SelectorSlot::Unknown
      }
    }
    _ => SelectorSlot::Unknown,
  }
}

#[cfg(test)]
mod tests {
  use super::super::test_utils::*;
  use super::*;
  use crate::collect::ImportBinding;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_component_references() {
    let mut scope = ModuleScope::default();
    scope.components.insert("Card".into());
    scope.imports.insert(
      "Icon".into(),
      ImportBinding {
        source: "./Icon".into(),
        imported: "default".into(),
      },
    );
    scope.imports.insert(
      "rem".into(),
      ImportBinding {
        source: "./utils".into(),
        imported: "rem".into(),
      },
    );

    assert_eq!(classify_selector_slot(&expr("Card"), &scope), SelectorSlot::Component("Card".into()));
    assert_eq!(classify_selector_slot(&expr("Icon"), &scope), SelectorSlot::Component("Icon".into()));
    assert_eq!(classify_selector_slot(&expr("rem"), &scope), SelectorSlot::Unknown);
    assert_eq!(classify_selector_slot(&expr("p => p.a"), &scope), SelectorSlot::Unknown);
  }
}
