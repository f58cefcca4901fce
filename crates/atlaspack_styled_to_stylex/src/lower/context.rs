use indexmap::IndexMap;

use crate::condition::VariantCondition;
use crate::styled_decl::{
  CompoundVariant, ConditionKey, InlineStyleProp, StyleFn, StyleObject, StyleRef, StyleValue,
  VariantDimension,
};

/// Where a lowered value is written.
#[derive(Clone, Debug, PartialEq)]
pub(super) enum Sink {
  Base,
  /// A variant bucket applied when every condition holds.
  Bucket(Vec<VariantCondition>),
  /// One branch of a compound variant, by style key.
  Compound(String),
  /// Scratch object a switch arm is lowered into.
  Detached,
}

impl Sink {
  /// The sink for styles that only apply when `condition` also holds.
  pub fn with(&self, condition: VariantCondition) -> Option<Sink> {
    match self {
      Sink::Base => Some(Sink::Bucket(vec![condition])),
      Sink::Bucket(conditions) => {
        let mut conditions = conditions.clone();
        if !conditions.contains(&condition) {
          conditions.push(condition);
        }
        Some(Sink::Bucket(conditions))
      }
      Sink::Compound(_) | Sink::Detached => None,
    }
  }

  pub fn condition(&self) -> Option<String> {
    match self {
      Sink::Bucket(conditions) => Some(bucket_key(conditions)),
      _ => None,
    }
  }
}

/// Bucket key for a conjunction of conditions.
pub(super) fn bucket_key(conditions: &[VariantCondition]) -> String {
  conditions
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(" && ")
}

/// Selector context a declaration is lowered in, accumulated while walking nested rules.
#[derive(Clone, Debug, Default, PartialEq)]
pub(super) struct RuleScope {
  /// Full selector, for diagnostics.
  pub selector: String,
  /// Outermost first.
  pub at_rules: Vec<String>,
  /// Pseudo-classes and resolved relational conditions, outermost first.
  pub conditions: Vec<ConditionKey>,
  pub pseudo_element: Option<String>,
}

impl RuleScope {
  pub fn root() -> Self {
    RuleScope {
      selector: "&".to_string(),
      ..Default::default()
    }
  }

  pub fn is_root(&self) -> bool {
    self.at_rules.is_empty() && self.conditions.is_empty() && self.pseudo_element.is_none()
  }

  /// At-rules nest outside pseudo-classes.
  pub fn path(&self) -> Vec<ConditionKey> {
    self
      .at_rules
      .iter()
      .cloned()
      .map(ConditionKey::Literal)
      .chain(self.conditions.iter().cloned())
      .collect()
  }
}

/// Everything lowered for one component so far. Cloned to roll back multi-branch
/// constructs that fail part way.
#[derive(Clone, Debug, Default)]
pub(super) struct StyleState {
  pub base: StyleObject,
  pub buckets: IndexMap<String, StyleObject>,
  pub bucket_conditions: IndexMap<String, Vec<VariantCondition>>,
  pub compounds: Vec<CompoundVariant>,
  pub compound_styles: IndexMap<String, StyleObject>,
  pub style_fns: Vec<StyleFn>,
  /// Prop -> index into `style_fns`.
  pub style_fn_props: IndexMap<String, usize>,
  pub dimensions: Vec<VariantDimension>,
  pub inline_style_props: Vec<InlineStyleProp>,
  pub style_refs: Vec<StyleRef>,
  pub detached: StyleObject,
}

impl StyleState {
  fn object_mut(&mut self, sink: &Sink) -> &mut StyleObject {
    match sink {
      Sink::Base => &mut self.base,
      Sink::Bucket(conditions) => {
        let key = bucket_key(conditions);
        self
          .bucket_conditions
          .entry(key.clone())
          .or_insert_with(|| conditions.clone());
        self.buckets.entry(key).or_default()
      }
      Sink::Compound(key) => self.compound_styles.entry(key.clone()).or_default(),
      Sink::Detached => &mut self.detached,
    }
  }

  pub fn place(&mut self, sink: &Sink, property: &str, value: StyleValue, scope: &RuleScope) {
    let seed = match sink {
      Sink::Base => StyleValue::Null,
      _ => base_default(&self.base, property, scope),
    };
    let path = scope.path();
    let object = self.object_mut(sink);
    place_in(
      object,
      property,
      value,
      &path,
      scope.pseudo_element.as_deref(),
      &seed,
    );
  }
}

/// What the base style applies for `property` in the scope's pseudo-element.
pub(super) fn base_default(base: &StyleObject, property: &str, scope: &RuleScope) -> StyleValue {
  let object = match &scope.pseudo_element {
    Some(element) => match base.get(element) {
      Some(StyleValue::Nested(nested)) => nested,
      _ => return StyleValue::Null,
    },
    None => base,
  };
  object
    .get(property)
    .map(|value| value.default_value().clone())
    .unwrap_or(StyleValue::Null)
}

/// Writes `value` for `property` under `path`, merging with what is already there so that
/// every context touching one property ends up in a single conditional map.
pub(super) fn place_in(
  object: &mut StyleObject,
  property: &str,
  value: StyleValue,
  path: &[ConditionKey],
  element: Option<&str>,
  seed: &StyleValue,
) {
  if let Some(element) = element {
    let entry = object
      .entry(element.to_string())
      .or_insert_with(|| StyleValue::Nested(StyleObject::new()));
    if !matches!(entry, StyleValue::Nested(_)) {
      *entry = StyleValue::Nested(StyleObject::new());
    }
    if let StyleValue::Nested(nested) = entry {
      place_in(nested, property, value, path, None, seed);
    }
    return;
  }

  let current = object.get(property).cloned();
  object.insert(property.to_string(), nest(current, path, value, seed));
}

fn nest(
  current: Option<StyleValue>,
  path: &[ConditionKey],
  value: StyleValue,
  seed: &StyleValue,
) -> StyleValue {
  let Some((key, rest)) = path.split_first() else {
    return match current {
      Some(StyleValue::Conditional(mut map)) => {
        map.insert(ConditionKey::Default, value);
        StyleValue::Conditional(map)
      }
      _ => value,
    };
  };

  let mut map = match current {
    Some(StyleValue::Conditional(map)) => map,
    Some(other) => IndexMap::from([(ConditionKey::Default, other)]),
    None => IndexMap::from([(ConditionKey::Default, seed.clone())]),
  };
  let inherited = map
    .get(&ConditionKey::Default)
    .map(|value| value.default_value().clone())
    .unwrap_or(StyleValue::Null);
  let next = nest(map.get(key).cloned(), rest, value, &inherited);
  map.insert(key.clone(), next);
  StyleValue::Conditional(map)
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn literal(text: &str) -> StyleValue {
    StyleValue::Literal(text.to_string())
  }

  fn scope(at_rules: &[&str], pseudos: &[&str]) -> RuleScope {
    RuleScope {
      selector: "&".into(),
      at_rules: at_rules.iter().map(|at_rule| at_rule.to_string()).collect(),
      conditions: pseudos
        .iter()
        .map(|pseudo| ConditionKey::Literal(pseudo.to_string()))
        .collect(),
      pseudo_element: None,
    }
  }

  #[test]
  fn test_contexts_share_one_conditional_map() {
    let mut state = StyleState::default();
    state.place(&Sink::Base, "color", literal("red"), &scope(&[], &[":hover"]));
    state.place(
      &Sink::Base,
      "color",
      literal("blue"),
      &scope(&["@media (min-width: 768px)"], &[]),
    );

    assert_eq!(
      state.base["color"],
      StyleValue::Conditional(IndexMap::from([
        (ConditionKey::Default, StyleValue::Null),
        (ConditionKey::Literal(":hover".into()), literal("red")),
        (
          ConditionKey::Literal("@media (min-width: 768px)".into()),
          literal("blue")
        ),
      ]))
    );
  }

  #[test]
  fn test_later_base_value_becomes_the_default() {
    let mut state = StyleState::default();
    state.place(&Sink::Base, "color", literal("red"), &scope(&[], &[":focus"]));
    state.place(&Sink::Base, "color", literal("black"), &RuleScope::root());

    assert_eq!(state.base["color"].default_value(), &literal("black"));
  }

  #[test]
  fn test_at_rules_nest_outside_pseudos() {
    let mut state = StyleState::default();
    state.place(&Sink::Base, "color", literal("black"), &RuleScope::root());
    state.place(
      &Sink::Base,
      "color",
      literal("red"),
      &scope(&["@media (hover: hover)"], &[":hover"]),
    );

    assert_eq!(
      state.base["color"],
      StyleValue::Conditional(IndexMap::from([
        (ConditionKey::Default, literal("black")),
        (
          ConditionKey::Literal("@media (hover: hover)".into()),
          StyleValue::Conditional(IndexMap::from([
            (ConditionKey::Default, literal("black")),
            (ConditionKey::Literal(":hover".into()), literal("red")),
          ]))
        ),
      ]))
    );
  }

  #[test]
  fn test_buckets_are_seeded_from_the_base_value() {
    let mut state = StyleState::default();
    state.place(&Sink::Base, "opacity", literal("1"), &RuleScope::root());
    let active = Sink::Base.with(VariantCondition::truthy("$active")).unwrap();
    state.place(&active, "opacity", literal("0.5"), &scope(&[], &[":hover"]));

    assert_eq!(
      state.buckets["$active"]["opacity"],
      StyleValue::Conditional(IndexMap::from([
        (ConditionKey::Default, literal("1")),
        (ConditionKey::Literal(":hover".into()), literal("0.5")),
      ]))
    );
    assert_eq!(
      state.bucket_conditions["$active"],
      vec![VariantCondition::truthy("$active")]
    );
  }

  #[test]
  fn test_pseudo_elements_are_nested_objects() {
    let mut state = StyleState::default();
    let before = RuleScope {
      pseudo_element: Some("::before".into()),
      ..RuleScope::root()
    };
    state.place(&Sink::Base, "content", literal("\"\""), &before);

    assert_eq!(
      state.base["::before"],
      StyleValue::Nested(IndexMap::from([("content".to_string(), literal("\"\""))]))
    );
  }

  #[test]
  fn test_conjunctions_are_keyed_by_every_condition() {
    let sink = Sink::Base
      .with(VariantCondition::truthy("$a"))
      .and_then(|sink| sink.with(VariantCondition::equals("size", "small")))
      .unwrap();
    assert_eq!(sink.condition().as_deref(), Some("$a && size === \"small\""));
    assert_eq!(Sink::Compound("x".into()).with(VariantCondition::truthy("$a")), None);
  }
}
