//! Promotes equality variant buckets into enumerated lookup tables.
//!
//! Pure over its inputs: buckets keyed by condition display string with the conditions each
//! key was built from, the proposed style key of each bucket, the base style object and the
//! declared prop types.

use indexmap::{IndexMap, IndexSet};

use crate::condition::{pascal, VariantCondition};
use crate::styled_decl::{PropTypes, StyleObject, VariantDimension};

/// Name of the entry used when more than one enumeration member is left uncovered.
pub const DEFAULT_VARIANT: &str = "default";

pub struct GroupingInput<'a> {
  pub style_key: &'a str,
  pub buckets: &'a IndexMap<String, StyleObject>,
  /// Conditions each bucket applies under, by bucket key.
  pub conditions: &'a IndexMap<String, Vec<VariantCondition>>,
  pub style_keys: &'a IndexMap<String, String>,
  pub base_style: &'a StyleObject,
  pub prop_types: &'a PropTypes,
}

#[derive(Debug, Default, PartialEq)]
pub struct GroupedVariants {
  pub dimensions: Vec<VariantDimension>,
  pub remaining_buckets: IndexMap<String, StyleObject>,
  pub remaining_style_keys: IndexMap<String, String>,
  /// CSS properties the base style no longer needs to carry.
  pub props_to_strip: IndexSet<String>,
}

/// Name of the style object a dimension is emitted as.
pub fn dimension_name(style_key: &str, prop: &str, namespace: Option<&str>) -> String {
  match namespace {
    Some(flag) => format!("{style_key}{}{}Variants", pascal(prop), pascal(flag)),
    None => format!("{style_key}{}Variants", pascal(prop)),
  }
}

/// `default`, or `default2`, `default3` and so on when a real member already has that name.
pub fn fallback_variant_name(is_taken: impl Fn(&str) -> bool) -> String {
  if !is_taken(DEFAULT_VARIANT) {
    return DEFAULT_VARIANT.to_string();
  }
  (2..)
    .map(|suffix| format!("{DEFAULT_VARIANT}{suffix}"))
    .find(|name| !is_taken(name))
    .unwrap_or_else(|| DEFAULT_VARIANT.to_string())
}

/// A single observed literal only becomes a dimension when its complement is known to be
/// exactly one other literal.
fn qualifies(observed: &[(String, String)], union: Option<&Vec<String>>) -> bool {
  match observed {
    [] => false,
    [(value, _)] => union.is_some_and(|members| members.len() == 2 && members.contains(value)),
    _ => true,
  }
}

fn in_union(union: Option<&Vec<String>>, name: &str) -> bool {
  union.is_some_and(|members| members.iter().any(|member| member == name))
}

fn touched_properties(variants: &IndexMap<String, StyleObject>) -> IndexSet<String> {
  variants
    .values()
    .flat_map(|styles| styles.keys().cloned())
    .collect()
}

/// The condition of a bucket guarded by exactly one test. Conjunctions never group.
fn sole_condition<'a>(input: &GroupingInput<'a>, key: &str) -> Option<&'a VariantCondition> {
  match input.conditions.get(key).map(Vec::as_slice) {
    Some([condition]) => Some(condition),
    _ => None,
  }
}

pub fn group_variant_dimensions(input: &GroupingInput) -> GroupedVariants {
  let mut equality: IndexMap<String, Vec<(String, String)>> = IndexMap::new();
  for key in input.buckets.keys() {
    if let Some(VariantCondition::Equals { prop, value }) = sole_condition(input, key) {
      equality
        .entry(prop.clone())
        .or_default()
        .push((value.clone(), key.clone()));
    }
  }

  let mut grouped = GroupedVariants {
    remaining_buckets: input.buckets.clone(),
    remaining_style_keys: input.style_keys.clone(),
    ..Default::default()
  };

  for (prop, observed) in equality {
    let info = input.prop_types.get(&prop);
    let union = info.and_then(|info| info.literal_union.as_ref());
    if !qualifies(&observed, union) {
      continue;
    }

    let mut variants = IndexMap::new();
    for (value, key) in &observed {
      if let Some(styles) = grouped.remaining_buckets.shift_remove(key) {
        variants.insert(value.clone(), styles);
      }
      grouped.remaining_style_keys.shift_remove(key);
    }

    let touched = touched_properties(&variants);
    let fallback: StyleObject = touched
      .iter()
      .filter_map(|property| {
        input
          .base_style
          .get(property)
          .map(|value| (property.clone(), value.clone()))
      })
      .collect();

    let default_value = {
      let taken = |name: &str| variants.contains_key(name) || in_union(union, name);
      match union {
        Some(members) => {
          let uncovered: Vec<&String> = members
            .iter()
            .filter(|member| !variants.contains_key(*member))
            .collect();
          match uncovered.as_slice() {
            [] => None,
            [only] => Some((*only).clone()),
            _ => (!fallback.is_empty()).then(|| fallback_variant_name(taken)),
          }
        }
        None => (!fallback.is_empty()).then(|| fallback_variant_name(taken)),
      }
    };
    if let Some(name) = &default_value {
      variants.insert(name.clone(), fallback);
    }

    let is_optional = info.map_or(true, |info| info.optional);
    let fully_covered = union.is_some_and(|members| {
      members
        .iter()
        .all(|member| variants.contains_key(member))
    });
    let mut dimension = VariantDimension {
      prop_name: prop.clone(),
      variant_object_name: dimension_name(input.style_key, &prop, None),
      variants,
      default_value,
      namespace_boolean_prop: None,
      is_disabled_namespace: false,
      is_optional,
    };

    // Only the first overlapping flag splits the dimension; later flags stay buckets.
    let overlap = grouped.remaining_buckets.iter().find_map(|(key, styles)| {
      let Some(VariantCondition::Truthy { prop: flag }) = sole_condition(input, key) else {
        return None;
      };
      let shared: Vec<String> = styles
        .keys()
        .filter(|property| touched.contains(*property))
        .cloned()
        .collect();
      (!shared.is_empty()).then(|| (key.clone(), flag.clone(), shared))
    });

    let Some((flag_key, flag, shared)) = overlap else {
      grouped.dimensions.push(dimension);
      continue;
    };

    tracing::debug!(prop = %prop, flag = %flag, ?shared, "Splitting dimension into namespaces");
    let flag_styles = grouped
      .remaining_buckets
      .get(&flag_key)
      .cloned()
      .unwrap_or_default();

    // Both namespaces must define every shared property, the base no longer carries it.
    // A value outside the observed members needs an entry of its own.
    if dimension.default_value.is_none() && (is_optional || !fully_covered) {
      let name = fallback_variant_name(|name| {
        dimension.variants.contains_key(name) || in_union(union, name)
      });
      dimension.variants.insert(name.clone(), StyleObject::new());
      dimension.default_value = Some(name);
    }
    for styles in dimension.variants.values_mut() {
      for property in &shared {
        if styles.contains_key(property) {
          continue;
        }
        if let Some(value) = input.base_style.get(property) {
          styles.insert(property.clone(), value.clone());
        }
      }
    }

    let mut disabled = dimension.clone();
    disabled.variant_object_name = dimension_name(input.style_key, &prop, Some(&flag));
    disabled.is_disabled_namespace = true;
    for styles in disabled.variants.values_mut() {
      for property in &shared {
        if let Some(value) = flag_styles.get(property) {
          styles.insert(property.clone(), value.clone());
        }
      }
    }
    dimension.namespace_boolean_prop = Some(flag.clone());
    disabled.namespace_boolean_prop = Some(flag);

    if let Some(bucket) = grouped.remaining_buckets.get_mut(&flag_key) {
      for property in &shared {
        bucket.shift_remove(property);
      }
      if bucket.is_empty() {
        grouped.remaining_buckets.shift_remove(&flag_key);
        grouped.remaining_style_keys.shift_remove(&flag_key);
      }
    }
    grouped.props_to_strip.extend(shared);
    grouped.dimensions.push(dimension);
    grouped.dimensions.push(disabled);
  }

  grouped
}
