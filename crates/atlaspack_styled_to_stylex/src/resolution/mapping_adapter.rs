use anyhow::Context;
use indexmap::IndexMap;
use serde::Deserialize;

use super::*;

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum MappedValue {
  Expr(String),
  Full(ResolvedValue),
}

impl MappedValue {
  fn to_resolved(&self) -> ResolvedValue {
    match self {
      MappedValue::Expr(expr) => ResolvedValue {
        expr: expr.clone(),
        imports: Vec::new(),
      },
      MappedValue::Full(resolved) => resolved.clone(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMapping {
  /// Kept as written so that a typo surfaces as [`AdapterError::InvalidUsage`].
  pub usage: String,
  /// Expression template. `$0`, `$1`, ... are replaced by the literal arguments.
  pub expr: String,
  #[serde(default)]
  pub imports: Vec<ImportSpec>,
}

/// A resolution adapter driven by a static table, typically loaded from JSON:
///
/// ```json
/// {
///   "theme": { "colors.primary": { "expr": "vars.primary", "imports": [...] } },
///   "cssVariables": { "--brand": "vars.brand" },
///   "importedValues": { "./tokens": { "tokens.space.md": "space.md" } },
///   "calls": { "./mixins": { "truncate": { "usage": "props", "expr": "mixins.truncate" } } },
///   "selectors": { "ancestor:hover": "stylex.when.ancestor(\":hover\")" }
/// }
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MappingAdapter {
  pub theme: IndexMap<String, MappedValue>,
  pub css_variables: IndexMap<String, MappedValue>,
  /// Module specifier -> `imported[.path]` -> value.
  pub imported_values: IndexMap<String, IndexMap<String, MappedValue>>,
  /// Module specifier -> helper name -> mapping.
  pub calls: IndexMap<String, IndexMap<String, CallMapping>>,
  /// `<relation><pseudo>` (e.g. `ancestor:hover`, `sibling`) -> condition expression.
  pub selectors: IndexMap<String, MappedValue>,
}

impl MappingAdapter {
  pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
    serde_json::from_str(json).context("Invalid resolution mapping")
  }
}

impl ResolutionAdapter for MappingAdapter {
  fn resolve_value(&self, ctx: &ResolveValueContext) -> Result<Option<ResolvedValue>, AdapterError> {
    let mapped = match &ctx.lookup {
      ValueLookup::Theme { path } => self.theme.get(path),
      ValueLookup::CssVariable { name, .. } => self.css_variables.get(name),
      ValueLookup::ImportedValue {
        imported,
        source,
        path,
      } => {
        let key = match path {
          Some(path) => format!("{imported}.{path}"),
          None => imported.clone(),
        };
        self
          .imported_values
          .get(source)
          .and_then(|values| values.get(&key))
      }
    };
    Ok(mapped.map(MappedValue::to_resolved))
  }

  fn resolve_call(&self, ctx: &ResolveCallContext) -> Result<Option<ResolvedCall>, AdapterError> {
    let Some(mapping) = self
      .calls
      .get(&ctx.callee_source)
      .and_then(|helpers| helpers.get(&ctx.callee_imported_name))
    else {
      return Ok(None);
    };

    let usage: CallUsage = mapping.usage.parse()?;
    let mut expr = mapping.expr.clone();
    // Highest index first so `$1` does not eat the prefix of `$10`.
    for (index, arg) in ctx.args.iter().enumerate().rev() {
      let placeholder = format!("${index}");
      if !expr.contains(&placeholder) {
        continue;
      }
      let text = match arg {
        CallArg::Literal(text) => text.clone(),
        CallArg::Number(number) => number.to_string(),
        CallArg::ThemePath(path) => path.clone(),
        CallArg::Unknown => return Ok(None),
      };
      expr = expr.replace(&placeholder, &text);
    }

    Ok(Some(ResolvedCall {
      usage,
      expr,
      imports: mapping.imports.clone(),
    }))
  }

  fn resolve_selector(
    &self,
    ctx: &ResolveSelectorContext,
  ) -> Result<Option<ResolvedSelector>, AdapterError> {
    let relation = match ctx.relation {
      SelectorRelation::Ancestor => "ancestor",
      SelectorRelation::Descendant => "descendant",
      SelectorRelation::Sibling => "sibling",
    };
    let key = format!("{relation}{}", ctx.pseudo.as_deref().unwrap_or_default());
    Ok(self.selectors.get(&key).map(|mapped| {
      let resolved = mapped.to_resolved();
      ResolvedSelector {
        expr: resolved.expr,
        imports: resolved.imports,
      }
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  fn adapter() -> MappingAdapter {
    MappingAdapter::from_json_str(indoc! {r#"
      {
        "theme": {
          "colors.primary": {
            "expr": "brandVars.primary",
            "imports": [{ "from": "./brand.stylex", "names": [{ "imported": "brandVars" }] }]
          },
          "space.sm": "\"4px\""
        },
        "importedValues": {
          "./tokens": { "tokens.radius": "tokens.radius" }
        },
        "calls": {
          "./utils": {
            "rem": { "usage": "create", "expr": "\"$0rem\"" },
            "broken": { "usage": "style", "expr": "x" }
          }
        },
        "selectors": { "ancestor:hover": "stylex.when.ancestor(\":hover\")" }
      }
    "#})
    .unwrap()
  }

  fn call(name: &str, args: Vec<CallArg>) -> ResolveCallContext {
    ResolveCallContext {
      file_path: "a.tsx".into(),
      callee_imported_name: name.into(),
      callee_source: "./utils".into(),
      args,
      css_property: None,
    }
  }

  #[test]
  fn test_value_lookups() {
    let adapter = adapter();
    let resolved = adapter
      .resolve_value(&ResolveValueContext {
        file_path: "a.tsx".into(),
        lookup: ValueLookup::Theme {
          path: "colors.primary".into(),
        },
        css_property: Some("color".into()),
      })
      .unwrap()
      .unwrap();
    assert_eq!(resolved.expr, "brandVars.primary");
    assert_eq!(resolved.imports, vec![ImportSpec::named("./brand.stylex", "brandVars")]);

    let imported = adapter
      .resolve_value(&ResolveValueContext {
        file_path: "a.tsx".into(),
        lookup: ValueLookup::ImportedValue {
          imported: "tokens".into(),
          source: "./tokens".into(),
          path: Some("radius".into()),
        },
        css_property: None,
      })
      .unwrap();
    assert_eq!(imported.map(|value| value.expr).as_deref(), Some("tokens.radius"));

    let missing = adapter
      .resolve_value(&ResolveValueContext {
        file_path: "a.tsx".into(),
        lookup: ValueLookup::Theme {
          path: "colors.unknown".into(),
        },
        css_property: None,
      })
      .unwrap();
    assert_eq!(missing, None);
  }

  #[test]
  fn test_call_arguments_are_substituted() {
    let resolved = adapter()
      .resolve_call(&call("rem", vec![CallArg::Number(2.0)]))
      .unwrap()
      .unwrap();
    assert_eq!(resolved.usage, CallUsage::Create);
    assert_eq!(resolved.expr, "\"2rem\"");
  }

  #[test]
  fn test_unknown_arguments_are_never_guessed() {
    assert_eq!(adapter().resolve_call(&call("rem", vec![CallArg::Unknown])).unwrap(), None);
  }

  #[test]
  fn test_invalid_usage_is_reported() {
    assert_eq!(
      adapter().resolve_call(&call("broken", vec![])),
      Err(AdapterError::InvalidUsage {
        usage: "style".into()
      })
    );
  }

  #[test]
  fn test_selector_lookup_by_relation_and_pseudo() {
    let adapter = adapter();
    let hover = adapter
      .resolve_selector(&ResolveSelectorContext {
        file_path: "a.tsx".into(),
        selector: "__SLOT_0__:hover &".into(),
        relation: SelectorRelation::Ancestor,
        pseudo: Some(":hover".into()),
        component: Some("Card".into()),
      })
      .unwrap();
    assert_eq!(
      hover.map(|selector| selector.expr).as_deref(),
      Some("stylex.when.ancestor(\":hover\")")
    );

    let focus = adapter
      .resolve_selector(&ResolveSelectorContext {
        file_path: "a.tsx".into(),
        selector: "__SLOT_0__:focus + &".into(),
        relation: SelectorRelation::Sibling,
        pseudo: Some(":focus".into()),
        component: None,
      })
      .unwrap();
    assert_eq!(focus, None);
  }
}
