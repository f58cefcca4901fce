use std::collections::HashSet;

use inflector::Inflector;

/// Hands out style keys that are unique within one file.
#[derive(Clone, Debug, Default)]
pub struct StyleKeyAllocator {
  used: HashSet<String>,
}

impl StyleKeyAllocator {
  /// `wanted` if it is free, otherwise `wanted2`, `wanted3`, ...
  pub fn allocate(&mut self, wanted: &str) -> String {
    let wanted = if wanted.is_empty() { "style" } else { wanted };
    if self.used.insert(wanted.to_string()) {
      return wanted.to_string();
    }
    let mut suffix = 2;
    loop {
      let candidate = format!("{wanted}{suffix}");
      if self.used.insert(candidate.clone()) {
        return candidate;
      }
      suffix += 1;
    }
  }

  pub fn is_used(&self, key: &str) -> bool {
    self.used.contains(key)
  }
}

/// `StyledButton` -> `styledButton`
pub fn component_style_key(local_name: &str) -> String {
  let mut chars = local_name.trim_start_matches(['_', '$']).chars();
  match chars.next() {
    Some(first) => first.to_lowercase().chain(chars).collect(),
    None => "style".to_string(),
  }
}

/// CSS property name as a style object key: `background-color` -> `backgroundColor`,
/// `-webkit-line-clamp` -> `WebkitLineClamp`. Custom properties are kept as written.
pub fn camel_case_property(property: &str) -> String {
  let property = property.trim();
  if property.starts_with("--") {
    return property.to_string();
  }
  match property.strip_prefix('-') {
    Some(vendor) => vendor.to_pascal_case(),
    None => property.to_camel_case(),
  }
}

/// Parameter name for a style function over `prop`: `$size` -> `size`.
pub fn param_name(prop: &str) -> String {
  let trimmed = prop.trim_start_matches('$');
  if trimmed.is_empty() {
    "value".to_string()
  } else {
    trimmed.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_allocator_suffixes_collisions() {
    let mut allocator = StyleKeyAllocator::default();
    assert_eq!(allocator.allocate("button"), "button");
    assert_eq!(allocator.allocate("button"), "button2");
    assert_eq!(allocator.allocate("button"), "button3");
    assert!(allocator.is_used("button2"));
  }

  #[test]
  fn test_property_names() {
    assert_eq!(camel_case_property("background-color"), "backgroundColor");
    assert_eq!(camel_case_property("-webkit-line-clamp"), "WebkitLineClamp");
    assert_eq!(camel_case_property("--brand-color"), "--brand-color");
    assert_eq!(camel_case_property("color"), "color");
  }

  #[test]
  fn test_component_style_keys() {
    assert_eq!(component_style_key("StyledButton"), "styledButton");
    assert_eq!(component_style_key("_Hidden"), "hidden");
    assert_eq!(param_name("$size"), "size");
  }
}
