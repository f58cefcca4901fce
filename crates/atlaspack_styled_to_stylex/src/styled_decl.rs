use indexmap::IndexMap;
use serde::Serialize;
use swc_core::common::Span;
use swc_core::ecma::ast::Expr;

use crate::css_ir::CssRuleIR;

/// Style object keyed by camelCase CSS property (or a pseudo-element such as `::before`).
pub type StyleObject = IndexMap<String, StyleValue>;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum StyleValue {
  /// A string literal in the output.
  Literal(String),
  Number(f64),
  /// JavaScript expression source that is static at build time (`tokens.primary`).
  Expr(String),
  Null,
  /// `{ default: ..., ":hover": ..., "@media ...": ... }`
  Conditional(IndexMap<ConditionKey, StyleValue>),
  /// Pseudo-element styles.
  Nested(StyleObject),
}

impl StyleValue {
  /// The value applied outside every condition.
  pub fn default_value(&self) -> &StyleValue {
    match self {
      StyleValue::Conditional(map) => map
        .get(&ConditionKey::Default)
        .map(StyleValue::default_value)
        .unwrap_or(&StyleValue::Null),
      other => other,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConditionKey {
  Default,
  /// A pseudo-class or at-rule, emitted as a string key.
  Literal(String),
  /// An expression key such as `stylex.when.ancestor(":hover")`.
  Computed(String),
}

impl ConditionKey {
  /// Key text as it appears in an object literal; computed keys keep their brackets.
  pub fn as_key(&self) -> String {
    match self {
      ConditionKey::Default => "default".to_string(),
      ConditionKey::Literal(key) => key.clone(),
      ConditionKey::Computed(expr) => format!("[{expr}]"),
    }
  }
}

impl Serialize for ConditionKey {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.as_key())
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum StyledBase {
  Intrinsic(String),
  Component(String),
}

/// Declared type information for a single prop.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropTypeInfo {
  /// Members of a union-of-string-literals type, in declaration order.
  pub literal_union: Option<Vec<String>>,
  pub is_boolean: bool,
  pub optional: bool,
}

impl PropTypeInfo {
  /// TypeScript source for the union, e.g. `"a" | "b"`.
  pub fn union_source(&self) -> Option<String> {
    let members = self.literal_union.as_ref()?;
    Some(
      members
        .iter()
        .map(|member| format!("\"{member}\""))
        .collect::<Vec<_>>()
        .join(" | "),
    )
  }
}

pub type PropTypes = IndexMap<String, PropTypeInfo>;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttrsInfo {
  /// Statically known attributes from `.attrs({ ... })`, as expression source.
  pub static_attrs: IndexMap<String, String>,
  /// Source of a function-form `.attrs(props => ...)` that runs per render.
  pub dynamic_source: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ShouldForwardProp {
  /// Props blocked by `!["a", "b"].includes(prop)`.
  DropProps { props: Vec<String> },
  /// Any other predicate, kept as source.
  Source { source: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantDimension {
  pub prop_name: String,
  pub variant_object_name: String,
  pub variants: IndexMap<String, StyleObject>,
  pub default_value: Option<String>,
  pub namespace_boolean_prop: Option<String>,
  pub is_disabled_namespace: bool,
  pub is_optional: bool,
}

/// One branch of a multi-prop decision cascade. Branches are tested in order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundBranch {
  /// Conditions that must all hold, as display strings.
  pub conditions: Vec<String>,
  pub style_key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundVariant {
  pub props: Vec<String>,
  pub branches: Vec<CompoundBranch>,
  /// Applied when no branch matches.
  pub fallback_style_key: Option<String>,
}

/// A style whose value is only known at render time.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleFn {
  pub style_key: String,
  pub param: String,
  /// TypeScript type of the parameter when the prop's declared type is known.
  pub param_type: Option<String>,
  pub styles: StyleObject,
}

/// Declarations that stay computed per render via the `style` attribute.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineStyleProp {
  pub property: String,
  /// Source of the original interpolation; it is called with the props at render time.
  pub expr: String,
}

/// A full style reference (`helperStyles.focusRing`) applied next to the component's own styles.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleRef {
  pub expr: String,
  /// Condition the reference is applied under, if any.
  pub condition: Option<String>,
}

/// Everything known about one styled component while it is being lowered.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyledDecl {
  pub local_name: String,
  pub base: StyledBase,
  pub style_key: String,
  pub exported: bool,
  #[serde(skip)]
  pub span: Span,
  #[serde(skip)]
  pub rules: Vec<CssRuleIR>,
  #[serde(skip)]
  pub template_expressions: Vec<Expr>,
  pub props_type: PropTypes,
  pub attrs_info: Option<AttrsInfo>,
  pub should_forward_prop: Option<ShouldForwardProp>,

  pub base_style: StyleObject,
  /// Condition display string -> style subset. Emptied into `variant_dimensions` where possible.
  pub variant_buckets: IndexMap<String, StyleObject>,
  /// Condition display string -> style key.
  pub variant_style_keys: IndexMap<String, String>,
  pub variant_dimensions: Vec<VariantDimension>,
  pub compound_variants: Vec<CompoundVariant>,
  /// Style key -> style object for compound branches.
  pub compound_styles: IndexMap<String, StyleObject>,
  pub style_fns: Vec<StyleFn>,
  pub inline_style_props: Vec<InlineStyleProp>,
  pub style_refs: Vec<StyleRef>,
  pub needs_wrapper: bool,
  pub supports_external_styles: bool,
  /// Set when this component could not be lowered; it is left untouched in the output.
  pub bail: Option<String>,
}

impl StyledDecl {
  pub fn new(local_name: impl Into<String>, base: StyledBase, style_key: impl Into<String>) -> Self {
    StyledDecl {
      local_name: local_name.into(),
      base,
      style_key: style_key.into(),
      exported: false,
      span: Span::default(),
      rules: Vec::new(),
      template_expressions: Vec::new(),
      props_type: PropTypes::new(),
      attrs_info: None,
      should_forward_prop: None,
      base_style: StyleObject::new(),
      variant_buckets: IndexMap::new(),
      variant_style_keys: IndexMap::new(),
      variant_dimensions: Vec::new(),
      compound_variants: Vec::new(),
      compound_styles: IndexMap::new(),
      style_fns: Vec::new(),
      inline_style_props: Vec::new(),
      style_refs: Vec::new(),
      needs_wrapper: false,
      supports_external_styles: false,
      bail: None,
    }
  }

  /// Component this one wraps, when it is another local component.
  pub fn extends(&self) -> Option<&str> {
    match &self.base {
      StyledBase::Component(name) => Some(name),
      StyledBase::Intrinsic(_) => None,
    }
  }

  /// Every style key this declaration will emit, in emission order.
  pub fn style_keys(&self) -> Vec<&str> {
    let mut keys = vec![self.style_key.as_str()];
    keys.extend(self.variant_style_keys.values().map(String::as_str));
    keys.extend(self.compound_styles.keys().map(String::as_str));
    keys.extend(self.style_fns.iter().map(|style_fn| style_fn.style_key.as_str()));
    keys
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_default_value_of_nested_conditionals() {
    let value = StyleValue::Conditional(IndexMap::from([
      (
        ConditionKey::Default,
        StyleValue::Conditional(IndexMap::from([
          (ConditionKey::Default, StyleValue::Literal("red".into())),
          (ConditionKey::Literal(":hover".into()), StyleValue::Literal("blue".into())),
        ])),
      ),
      (
        ConditionKey::Literal("@media (min-width: 1px)".into()),
        StyleValue::Literal("green".into()),
      ),
    ]));
    assert_eq!(value.default_value(), &StyleValue::Literal("red".into()));
    assert_eq!(StyleValue::Number(1.0).default_value(), &StyleValue::Number(1.0));
  }

  #[test]
  fn test_union_source() {
    let info = PropTypeInfo {
      literal_union: Some(vec!["a".into(), "b".into()]),
      ..Default::default()
    };
    assert_eq!(info.union_source().as_deref(), Some(r#""a" | "b""#));
  }
}
