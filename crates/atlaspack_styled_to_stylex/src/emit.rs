//! Prints the style objects of lowered components as a `stylex.create` module.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::LoweringConfig;
use crate::resolution::{ImportSpec, ImportedName};
use crate::runner::{emit_module, parse_module, RunnerError};
use crate::styled_decl::{ConditionKey, StyleObject, StyleValue, StyledDecl, VariantDimension};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());

fn quote(text: &str) -> String {
  serde_json::Value::from(text).to_string()
}

fn object_key(key: &str) -> String {
  if IDENTIFIER.is_match(key) {
    key.to_string()
  } else {
    quote(key)
  }
}

fn condition_key(key: &ConditionKey) -> String {
  match key {
    ConditionKey::Default => "default".to_string(),
    ConditionKey::Literal(text) => quote(text),
    ConditionKey::Computed(_) => key.as_key(),
  }
}

fn value_source(value: &StyleValue) -> String {
  match value {
    StyleValue::Literal(text) => quote(text),
    StyleValue::Number(number) => number.to_string(),
    StyleValue::Expr(expr) => expr.clone(),
    StyleValue::Null => "null".to_string(),
    StyleValue::Conditional(map) => braces(
      map
        .iter()
        .map(|(key, value)| format!("{}: {}", condition_key(key), value_source(value))),
    ),
    StyleValue::Nested(object) => object_source(object),
  }
}

fn braces(entries: impl Iterator<Item = String>) -> String {
  let entries: Vec<String> = entries.collect();
  if entries.is_empty() {
    "{}".to_string()
  } else {
    format!("{{ {} }}", entries.join(", "))
  }
}

fn object_source(object: &StyleObject) -> String {
  braces(
    object
      .iter()
      .map(|(key, value)| format!("{}: {}", object_key(key), value_source(value))),
  )
}

fn import_lines(imports: &[ImportSpec]) -> Vec<String> {
  let mut by_source: BTreeMap<&str, BTreeSet<&ImportedName>> = BTreeMap::new();
  for spec in imports {
    by_source.entry(spec.from.as_str()).or_default().extend(spec.names.iter());
  }

  let mut lines = Vec::new();
  for (from, names) in by_source {
    let mut default = None;
    let mut named = Vec::new();
    for name in names {
      match (name.imported.as_str(), name.local.as_deref()) {
        ("default", Some(local)) => default = Some(local),
        ("*", Some(local)) => lines.push(format!("import * as {local} from {};", quote(from))),
        ("default" | "*", None) => {
          tracing::warn!(from, imported = %name.imported, "Skipping import without a local name");
        }
        (imported, Some(local)) if imported != local => named.push(format!("{imported} as {local}")),
        (imported, _) => named.push(imported.to_string()),
      }
    }

    let mut clauses = Vec::new();
    if let Some(default) = default {
      clauses.push(default.to_string());
    }
    if !named.is_empty() {
      clauses.push(format!("{{ {} }}", named.join(", ")));
    }
    if !clauses.is_empty() {
      lines.push(format!("import {} from {};", clauses.join(", "), quote(from)));
    }
  }
  lines
}

fn create_entries(decl: &StyledDecl) -> Vec<String> {
  let mut entries = vec![format!(
    "{}: {}",
    object_key(&decl.style_key),
    object_source(&decl.base_style)
  )];
  for (condition, key) in &decl.variant_style_keys {
    if let Some(styles) = decl.variant_buckets.get(condition) {
      entries.push(format!("{}: {}", object_key(key), object_source(styles)));
    }
  }
  for (key, styles) in &decl.compound_styles {
    entries.push(format!("{}: {}", object_key(key), object_source(styles)));
  }
  for style_fn in &decl.style_fns {
    let param = match &style_fn.param_type {
      Some(param_type) => format!("{}: {param_type}", style_fn.param),
      None => style_fn.param.clone(),
    };
    entries.push(format!(
      "{}: ({param}) => ({})",
      object_key(&style_fn.style_key),
      object_source(&style_fn.styles)
    ));
  }
  entries
}

fn dimension_source(dimension: &VariantDimension, config: &LoweringConfig) -> String {
  format!(
    "const {} = {}.create({});",
    dimension.variant_object_name,
    config.stylex_namespace,
    braces(
      dimension
        .variants
        .iter()
        .map(|(variant, styles)| format!("{}: {}", object_key(variant), object_source(styles)))
    )
  )
}

/// Emits imports, the `styles` object and one object per variant dimension. Components that
/// bailed are left out. Returns an empty string when nothing was lowered.
pub fn emit_styles(
  decls: &[StyledDecl],
  imports: &[ImportSpec],
  config: &LoweringConfig,
) -> Result<String, RunnerError> {
  let lowered: Vec<&StyledDecl> = decls.iter().filter(|decl| decl.bail.is_none()).collect();
  if lowered.is_empty() {
    return Ok(String::new());
  }

  let mut lines = import_lines(imports);
  lines.push(format!(
    "import * as {} from {};",
    config.stylex_namespace,
    quote(&config.stylex_import_source)
  ));

  let entries: Vec<String> = lowered.iter().flat_map(|decl| create_entries(decl)).collect();
  lines.push(format!(
    "const {} = {}.create({});",
    config.styles_ident,
    config.stylex_namespace,
    braces(entries.into_iter())
  ));
  for decl in &lowered {
    for dimension in &decl.variant_dimensions {
      lines.push(dimension_source(dimension, config));
    }
  }

  let source = lines.join("\n");
  let parsed = parse_module(&source, Path::new("styles.tsx"))?;
  emit_module(&parsed.module)
}

#[cfg(test)]
mod tests {
  use indexmap::IndexMap;

  use super::*;
  use crate::styled_decl::{StyleFn, StyledBase};
  use pretty_assertions::assert_eq;

  fn literal(text: &str) -> StyleValue {
    StyleValue::Literal(text.to_string())
  }

  fn button() -> StyledDecl {
    let mut decl = StyledDecl::new("Button", StyledBase::Intrinsic("button".into()), "button");
    decl.base_style.insert(
      "color".into(),
      StyleValue::Conditional(IndexMap::from([
        (ConditionKey::Default, StyleValue::Expr("tokens.text".into())),
        (ConditionKey::Literal(":hover".into()), literal("red")),
      ])),
    );
    decl
      .base_style
      .insert("--ring".into(), literal("2px"));
    decl
  }

  #[test]
  fn test_values_and_keys() {
    assert_eq!(object_key("backgroundColor"), "backgroundColor");
    assert_eq!(object_key("::before"), "\"::before\"");
    assert_eq!(
      value_source(&StyleValue::Conditional(IndexMap::from([
        (ConditionKey::Default, StyleValue::Null),
        (ConditionKey::Computed("stylex.when.ancestor(\":hover\")".into()), StyleValue::Number(1.0)),
      ]))),
      "{ default: null, [stylex.when.ancestor(\":hover\")]: 1 }"
    );
  }

  #[test]
  fn test_imports_are_grouped_by_source() {
    let imports = vec![
      ImportSpec::named("./tokens.stylex", "tokens"),
      ImportSpec {
        from: "./tokens.stylex".into(),
        names: vec![ImportedName {
          imported: "spacing".into(),
          local: Some("space".into()),
        }],
      },
      ImportSpec {
        from: "./theme".into(),
        names: vec![ImportedName {
          imported: "default".into(),
          local: Some("theme".into()),
        }],
      },
    ];
    assert_eq!(
      import_lines(&imports),
      vec![
        "import theme from \"./theme\";".to_string(),
        "import { spacing as space, tokens } from \"./tokens.stylex\";".to_string(),
      ]
    );
  }

  #[test]
  fn test_emits_a_valid_module() {
    let mut decl = button();
    decl.style_fns.push(StyleFn {
      style_key: "buttonBySize".into(),
      param: "size".into(),
      param_type: Some("\"small\" | \"large\"".into()),
      styles: IndexMap::from([("width".to_string(), StyleValue::Expr("size".into()))]),
    });
    let mut bailed = StyledDecl::new("Broken", StyledBase::Intrinsic("div".into()), "broken");
    bailed.bail = Some("selector".into());

    let code = emit_styles(
      &[decl, bailed],
      &[ImportSpec::named("./tokens.stylex", "tokens")],
      &LoweringConfig::default(),
    )
    .unwrap();

    assert!(code.contains("import { tokens } from \"./tokens.stylex\";"), "{code}");
    assert!(code.contains("import * as stylex from \"@stylexjs/stylex\";"), "{code}");
    assert!(code.contains("const styles = stylex.create({"), "{code}");
    assert!(code.contains("\":hover\": \"red\""), "{code}");
    assert!(code.contains("\"--ring\": \"2px\""), "{code}");
    assert!(code.contains("buttonBySize"), "{code}");
    assert!(!code.contains("broken"), "{code}");
  }

  #[test]
  fn test_nothing_to_emit() {
    assert_eq!(emit_styles(&[], &[], &LoweringConfig::default()).unwrap(), "");
  }
}
