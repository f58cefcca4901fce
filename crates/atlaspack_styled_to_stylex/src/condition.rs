use std::fmt::Display;
use std::fmt::Formatter;

use inflector::Inflector;
use serde::Serialize;

/// The condition a variant bucket is applied under.
///
/// Buckets are keyed by the display form of the condition (`$active`, `!$active`,
/// `size === "small"`), which [`VariantCondition::parse`] inverts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VariantCondition {
  Truthy { prop: String },
  Falsy { prop: String },
  Equals { prop: String, value: String },
  NotEquals { prop: String, value: String },
}

impl VariantCondition {
  pub fn truthy(prop: impl Into<String>) -> Self {
    VariantCondition::Truthy { prop: prop.into() }
  }

  pub fn equals(prop: impl Into<String>, value: impl Into<String>) -> Self {
    VariantCondition::Equals {
      prop: prop.into(),
      value: value.into(),
    }
  }

  pub fn prop(&self) -> &str {
    match self {
      VariantCondition::Truthy { prop }
      | VariantCondition::Falsy { prop }
      | VariantCondition::Equals { prop, .. }
      | VariantCondition::NotEquals { prop, .. } => prop,
    }
  }

  pub fn negate(&self) -> VariantCondition {
    match self.clone() {
      VariantCondition::Truthy { prop } => VariantCondition::Falsy { prop },
      VariantCondition::Falsy { prop } => VariantCondition::Truthy { prop },
      VariantCondition::Equals { prop, value } => VariantCondition::NotEquals { prop, value },
      VariantCondition::NotEquals { prop, value } => VariantCondition::Equals { prop, value },
    }
  }

  /// Whether this is the positive form (`prop` or `prop === "x"`).
  pub fn is_positive(&self) -> bool {
    matches!(
      self,
      VariantCondition::Truthy { .. } | VariantCondition::Equals { .. }
    )
  }

  /// Parses the display form back. Anything unrecognized (compound conditions, ...) is `None`.
  pub fn parse(text: &str) -> Option<VariantCondition> {
    let text = text.trim();
    for (operator, equal) in [(" === ", true), (" !== ", false)] {
      if let Some((prop, value)) = text.split_once(operator) {
        let prop = prop.trim();
        let value = value.trim();
        if !is_prop_name(prop) || value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
          return None;
        }
        let value = &value[1..value.len() - 1];
        // A quote inside the value means the text joined several conditions.
        if value.contains('"') {
          return None;
        }
        let value = value.to_string();
        let prop = prop.to_string();
        return Some(if equal {
          VariantCondition::Equals { prop, value }
        } else {
          VariantCondition::NotEquals { prop, value }
        });
      }
    }
    if let Some(prop) = text.strip_prefix('!') {
      return is_prop_name(prop).then(|| VariantCondition::Falsy {
        prop: prop.to_string(),
      });
    }
    is_prop_name(text).then(|| VariantCondition::Truthy {
      prop: text.to_string(),
    })
  }

  /// PascalCase suffix used when naming the style bucket for this condition.
  pub fn style_key_suffix(&self) -> String {
    match self {
      VariantCondition::Truthy { prop } => pascal(prop),
      VariantCondition::Falsy { prop } => format!("Not{}", pascal(prop)),
      VariantCondition::Equals { prop, value } => format!("{}{}", pascal(prop), pascal(value)),
      VariantCondition::NotEquals { prop, value } => {
        format!("{}Not{}", pascal(prop), pascal(value))
      }
    }
  }
}

impl Display for VariantCondition {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      VariantCondition::Truthy { prop } => write!(f, "{prop}"),
      VariantCondition::Falsy { prop } => write!(f, "!{prop}"),
      VariantCondition::Equals { prop, value } => write!(f, "{prop} === \"{value}\""),
      VariantCondition::NotEquals { prop, value } => write!(f, "{prop} !== \"{value}\""),
    }
  }
}

fn is_prop_name(text: &str) -> bool {
  let mut chars = text.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// `$isActive` -> `IsActive`, `x-large` -> `XLarge`.
pub fn pascal(text: &str) -> String {
  let cleaned: String = text
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
    .collect();
  let pascal = cleaned.trim().to_pascal_case();
  if pascal.is_empty() {
    "Value".to_string()
  } else if pascal.starts_with(|c: char| c.is_ascii_digit()) {
    format!("V{pascal}")
  } else {
    pascal
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_display_and_parse_invert_each_other() {
    let conditions = [
      VariantCondition::truthy("$draggable"),
      VariantCondition::Falsy {
        prop: "disabled".into(),
      },
      VariantCondition::equals("size", "small"),
      VariantCondition::NotEquals {
        prop: "variant".into(),
        value: "primary".into(),
      },
    ];
    for condition in conditions {
      assert_eq!(VariantCondition::parse(&condition.to_string()), Some(condition));
    }
  }

  #[test]
  fn test_parse_rejects_compound_conditions() {
    assert_eq!(VariantCondition::parse("$a && $b"), None);
    assert_eq!(VariantCondition::parse("size === small"), None);
    assert_eq!(
      VariantCondition::parse("size === \"small\" && kind === \"a\""),
      None
    );
  }

  #[test]
  fn test_style_key_suffix() {
    assert_eq!(VariantCondition::truthy("$draggable").style_key_suffix(), "Draggable");
    assert_eq!(
      VariantCondition::truthy("$draggable").negate().style_key_suffix(),
      "NotDraggable"
    );
    assert_eq!(
      VariantCondition::equals("size", "x-large").style_key_suffix(),
      "SizeXLarge"
    );
  }
}
