use swc_core::ecma::ast::{Expr, Lit, MemberProp, Tpl};

use super::*;

fn block_from_tpl(tpl: &Tpl, bindings: &PropsBindings) -> CssBlock {
  CssBlock {
    quasis: tpl.quasis.iter().map(|quasi| quasi.raw.to_string()).collect(),
    exprs: tpl.exprs.iter().map(|expr| (**expr).clone()).collect(),
    bindings: bindings.clone(),
  }
}

/// A nested block of CSS: `css\`...\``, a local `css` helper, or CSS text.
pub fn css_block(expr: &Expr, ctx: &ClassifyContext) -> Option<CssBlock> {
  match unwrap_expr(expr) {
    Expr::TaggedTpl(tagged) => {
      let Expr::Ident(tag) = unwrap_expr(&tagged.tag) else {
        return None;
      };
      (ctx.scope.css_ident.as_deref() == Some(&*tag.sym))
        .then(|| block_from_tpl(&tagged.tpl, ctx.bindings))
    }
    Expr::Ident(ident) => ctx.scope.css_helpers.get(&*ident.sym).cloned(),
    Expr::Tpl(tpl) if looks_like_css(&tpl.quasis.iter().map(|q| q.raw.to_string()).collect::<String>()) => {
      Some(block_from_tpl(tpl, ctx.bindings))
    }
    Expr::Lit(Lit::Str(text)) if looks_like_css(&text.value) => Some(CssBlock {
      quasis: vec![text.value.to_string()],
      exprs: Vec::new(),
      bindings: ctx.bindings.clone(),
    }),
    _ => None,
  }
}

/// Plain strings are values unless they carry at least one declaration.
fn looks_like_css(text: &str) -> bool {
  text.contains(':') && (text.contains(';') || text.contains('{'))
}

pub(super) fn match_css_helper(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  css_block(expr, ctx).map(Classified::Css)
}

pub(super) fn match_template(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  let Expr::Tpl(tpl) = expr else {
    return None;
  };
  if tpl.exprs.is_empty() {
    return None;
  }
  if let Some(block) = css_block(expr, ctx) {
    return Some(Classified::Css(block));
  }

  let mut pieces = Vec::new();
  for (index, quasi) in tpl.quasis.iter().enumerate() {
    let text = quasi.cooked.as_ref().unwrap_or(&quasi.raw).to_string();
    if !text.is_empty() {
      pieces.push(TemplatePiece::Text(text));
    }
    if let Some(embedded) = tpl.exprs.get(index) {
      pieces.push(TemplatePiece::Slot(classify_value(embedded, ctx)));
    }
  }
  Some(Classified::Template(pieces))
}

/// An identifier or static member chain rooted at an import.
pub(super) fn match_imported_value(expr: &Expr, ctx: &ClassifyContext) -> Option<Classified> {
  let mut path = Vec::new();
  let mut current = expr;
  let root = loop {
    match current {
      Expr::Member(member) => {
        match &member.prop {
          MemberProp::Ident(name) => path.push(name.sym.to_string()),
          MemberProp::Computed(computed) => match unwrap_expr(&computed.expr) {
            Expr::Lit(Lit::Str(text)) => path.push(text.value.to_string()),
            _ => return None,
          },
          MemberProp::PrivateName(_) => return None,
        }
        current = unwrap_expr(&member.obj);
      }
      Expr::Ident(ident) => break ident.sym.to_string(),
      _ => return None,
    }
  };
  let binding = ctx.scope.imports.get(&root)?;
  path.reverse();

  // `import * as tokens` and `import tokens` are addressed by their local name.
  let imported = match binding.imported.as_str() {
    "*" | "default" => root,
    imported => imported.to_string(),
  };
  Some(Classified::ImportedValue {
    imported,
    source: binding.source.clone(),
    path: (!path.is_empty()).then(|| path.join(".")),
  })
}

#[cfg(test)]
mod tests {
  use super::super::test_utils::*;
  use super::*;
  use crate::collect::ImportBinding;
  use pretty_assertions::assert_eq;

  fn scope() -> ModuleScope {
    let mut scope = ModuleScope {
      css_ident: Some("css".into()),
      ..Default::default()
    };
    scope.imports.insert(
      "tokens".into(),
      ImportBinding {
        source: "./tokens".into(),
        imported: "*".into(),
      },
    );
    scope.imports.insert(
      "brand".into(),
      ImportBinding {
        source: "./brand".into(),
        imported: "brandColor".into(),
      },
    );
    scope.css_helpers.insert(
      "truncate".into(),
      CssBlock {
        quasis: vec!["overflow: hidden;".into()],
        exprs: vec![],
        bindings: PropsBindings::default(),
      },
    );
    scope
  }

  #[test]
  fn test_template_pieces() {
    let Classified::Template(pieces) = classify_code("p => `${p.theme.space.sm} ${p.gap}px`", &scope())
    else {
      panic!("expected a template");
    };
    assert_eq!(pieces.len(), 4);
    assert!(matches!(&pieces[0], TemplatePiece::Slot(Classified::Theme { path }) if path == "space.sm"));
    assert!(matches!(&pieces[1], TemplatePiece::Text(text) if text == " "));
    assert!(matches!(&pieces[2], TemplatePiece::Slot(Classified::Prop { name }) if name == "gap"));
    assert!(matches!(&pieces[3], TemplatePiece::Text(text) if text == "px"));
  }

  #[test]
  fn test_imported_values() {
    let scope = scope();
    let Classified::ImportedValue {
      imported,
      source,
      path,
    } = classify_code("tokens.space['md']", &scope)
    else {
      panic!("expected an imported value");
    };
    assert_eq!(
      (imported.as_str(), source.as_str(), path.as_deref()),
      ("tokens", "./tokens", Some("space.md"))
    );

    let Classified::ImportedValue { imported, path, .. } = classify_code("brand", &scope) else {
      panic!("expected an imported value");
    };
    assert_eq!((imported.as_str(), path), ("brandColor", None));
  }

  #[test]
  fn test_css_helpers() {
    let scope = scope();
    assert!(matches!(classify_code("truncate", &scope), Classified::Css(_)));
    let Classified::Css(block) = classify_code("p => css`color: ${p.color};`", &scope) else {
      panic!("expected a css block");
    };
    assert_eq!(block.quasis, vec!["color: ".to_string(), ";".to_string()]);
    assert_eq!(block.bindings.props_ident.as_deref(), Some("p"));
  }
}
