use std::fmt::Write;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static SLOT_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"__SLOT_(\d+)__").unwrap());

/// Placeholder text standing in for slot `id` while the template is treated as CSS.
pub fn slot_placeholder(id: usize) -> String {
  format!("__SLOT_{id}__")
}

/// Slot ids referenced by `text`, in order of appearance.
pub fn slot_ids_in(text: &str) -> Vec<usize> {
  SLOT_PLACEHOLDER
    .captures_iter(text)
    .filter_map(|captures| captures.get(1))
    .filter_map(|id| id.as_str().parse().ok())
    .collect()
}

/// Replaces every placeholder in `text` with `replacement(id)`.
pub fn replace_slots(text: &str, mut replacement: impl FnMut(usize) -> String) -> String {
  SLOT_PLACEHOLDER
    .replace_all(text, |captures: &regex::Captures| {
      captures
        .get(1)
        .and_then(|id| id.as_str().parse().ok())
        .map(&mut replacement)
        .unwrap_or_else(|| captures[0].to_string())
    })
    .into_owned()
}

/// Returns the slot id when `text` is nothing but a single placeholder.
pub fn sole_slot(text: &str) -> Option<usize> {
  let trimmed = text.trim();
  let captures = SLOT_PLACEHOLDER.captures(trimmed)?;
  let whole = captures.get(0)?;
  if whole.start() == 0 && whole.end() == trimmed.len() {
    captures.get(1)?.as_str().parse().ok()
  } else {
    None
  }
}

/// One selector scope within a parsed template.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CssRuleIR {
  pub selector: String,
  /// Wrapping at-rules, outermost first. Non-empty means the rule is never part of the
  /// base style.
  pub at_rule_stack: Vec<String>,
  pub declarations: Vec<CssDeclarationIR>,
}

impl CssRuleIR {
  pub fn is_root(&self) -> bool {
    self.selector == "&" && self.at_rule_stack.is_empty()
  }

  pub fn slot_ids(&self) -> Vec<usize> {
    let mut ids = slot_ids_in(&self.selector);
    for at_rule in &self.at_rule_stack {
      ids.extend(slot_ids_in(at_rule));
    }
    for declaration in &self.declarations {
      ids.extend(declaration.slot_ids());
    }
    ids
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CssDeclarationIR {
  /// `None` for a bare interpolation standing in for a whole block (mixins, conditional css).
  pub property: Option<String>,
  pub value: CssValue,
  pub value_raw: String,
  pub important: bool,
}

impl CssDeclarationIR {
  pub fn slot_ids(&self) -> Vec<usize> {
    let mut ids = self
      .property
      .as_deref()
      .map(slot_ids_in)
      .unwrap_or_default();
    if let CssValue::Interpolated(parts) = &self.value {
      ids.extend(parts.iter().filter_map(|part| match part {
        ValuePart::Slot(id) => Some(*id),
        ValuePart::Static(_) => None,
      }));
    }
    ids
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CssValue {
  Static(String),
  Interpolated(Vec<ValuePart>),
}

impl CssValue {
  /// Splits raw value text on slot placeholders. Text without placeholders stays static.
  pub fn from_raw(raw: &str) -> CssValue {
    let raw = raw.trim();
    if !SLOT_PLACEHOLDER.is_match(raw) {
      return CssValue::Static(raw.to_string());
    }

    let mut parts = Vec::new();
    let mut last = 0;
    for captures in SLOT_PLACEHOLDER.captures_iter(raw) {
      let (Some(whole), Some(id)) = (captures.get(0), captures.get(1)) else {
        continue;
      };
      if whole.start() > last {
        parts.push(ValuePart::Static(raw[last..whole.start()].to_string()));
      }
      if let Ok(id) = id.as_str().parse() {
        parts.push(ValuePart::Slot(id));
      }
      last = whole.end();
    }
    if last < raw.len() {
      parts.push(ValuePart::Static(raw[last..].to_string()));
    }
    CssValue::Interpolated(parts)
  }

  pub fn has_slots(&self) -> bool {
    matches!(self, CssValue::Interpolated(_))
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ValuePart {
  Static(String),
  Slot(usize),
}

/// Renders rules back to CSS-ish text. Used in diagnostics and debug logging.
pub fn describe_rules(rules: &[CssRuleIR]) -> String {
  let mut out = String::new();
  for rule in rules {
    let _ = write!(out, "{}", rule.at_rule_stack.join(" "));
    if !rule.at_rule_stack.is_empty() {
      out.push(' ');
    }
    let _ = write!(out, "{} {{", rule.selector);
    for declaration in &rule.declarations {
      match &declaration.property {
        Some(property) => {
          let _ = write!(out, " {}: {};", property, declaration.value_raw);
        }
        None => {
          let _ = write!(out, " {};", declaration.value_raw);
        }
      }
    }
    out.push_str(" }\n");
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_value_without_slots_is_static() {
    assert_eq!(
      CssValue::from_raw("  1px solid red "),
      CssValue::Static("1px solid red".into())
    );
  }

  #[test]
  fn test_value_splits_on_placeholders() {
    assert_eq!(
      CssValue::from_raw("1px solid __SLOT_3__"),
      CssValue::Interpolated(vec![
        ValuePart::Static("1px solid ".into()),
        ValuePart::Slot(3),
      ])
    );
    assert_eq!(
      CssValue::from_raw("__SLOT_0__px"),
      CssValue::Interpolated(vec![ValuePart::Slot(0), ValuePart::Static("px".into())])
    );
  }

  #[test]
  fn test_sole_slot() {
    assert_eq!(sole_slot(" __SLOT_12__ "), Some(12));
    assert_eq!(sole_slot("__SLOT_1__px"), None);
    assert_eq!(sole_slot("red"), None);
  }

  #[test]
  fn test_replace_slots() {
    assert_eq!(
      replace_slots("__SLOT_0__:hover &", |id| format!("${{slot{id}}}")),
      "${slot0}:hover &"
    );
  }

  #[test]
  fn test_slot_ids_in_order() {
    assert_eq!(slot_ids_in("__SLOT_2__ __SLOT_0__ a"), vec![2, 0]);
  }
}
