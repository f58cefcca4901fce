use once_cell::sync::Lazy;
use regex::Regex;

use crate::diagnostic::DiagnosticCode;
use crate::resolution::SelectorRelation;

const PSEUDOS: &str = r"(?:\s*:[a-zA-Z-]+(?:\([^()]*\))?)*";
const ELEMENT: &str = r"(?P<element>::[a-zA-Z-]+)?";

static OWN: Lazy<Regex> =
  Lazy::new(|| Regex::new(&format!(r"^&(?P<pseudos>{PSEUDOS}){ELEMENT}$")).unwrap());

static ANCESTOR: Lazy<Regex> = Lazy::new(|| {
  Regex::new(&format!(
    r"^__SLOT_(?P<slot>\d+)__(?P<state>{PSEUDOS})\s+&(?P<pseudos>{PSEUDOS}){ELEMENT}$"
  ))
  .unwrap()
});

static SIBLING: Lazy<Regex> = Lazy::new(|| {
  Regex::new(&format!(
    r"^__SLOT_(?P<slot>\d+)__(?P<state>{PSEUDOS})\s*[+~]\s*&(?P<pseudos>{PSEUDOS}){ELEMENT}$"
  ))
  .unwrap()
});

static DESCENDANT: Lazy<Regex> = Lazy::new(|| {
  Regex::new(&format!(
    r"^&:has\(\s*__SLOT_(?P<slot>\d+)__(?P<state>{PSEUDOS})\s*\)(?P<pseudos>{PSEUDOS}){ELEMENT}$"
  ))
  .unwrap()
});

static PSEUDO: Lazy<Regex> = Lazy::new(|| Regex::new(r":[a-zA-Z-]+(?:\([^()]*\))?").unwrap());

/// Pseudo-elements that are still commonly written with a single colon.
const LEGACY_ELEMENTS: &[&str] = &[":before", ":after", ":first-line", ":first-letter"];

/// Another component the styled one is related to through the selector.
#[derive(Clone, Debug, PartialEq)]
pub(super) struct RelatedSlot {
  pub slot: usize,
  pub relation: SelectorRelation,
  /// State of the related element, e.g. `:hover`.
  pub pseudo: Option<String>,
}

/// One comma-separated selector the component's own element is styled through.
#[derive(Clone, Debug, Default, PartialEq)]
pub(super) struct SelectorTarget {
  pub pseudos: Vec<String>,
  pub pseudo_element: Option<String>,
  pub related: Option<RelatedSlot>,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) struct SelectorRejection {
  pub code: DiagnosticCode,
  pub message: String,
}

fn reject(code: DiagnosticCode, message: String) -> SelectorRejection {
  SelectorRejection { code, message }
}

/// Splits on commas outside parentheses.
fn split_selector_list(selector: &str) -> Vec<&str> {
  let mut parts = Vec::new();
  let mut depth = 0usize;
  let mut start = 0;
  for (index, c) in selector.char_indices() {
    match c {
      '(' => depth += 1,
      ')' => depth = depth.saturating_sub(1),
      ',' if depth == 0 => {
        parts.push(selector[start..index].trim());
        start = index + 1;
      }
      _ => {}
    }
  }
  parts.push(selector[start..].trim());
  parts
}

fn pseudo_list(text: &str) -> (Vec<String>, Option<String>) {
  let mut pseudos = Vec::new();
  let mut element = None;
  for found in PSEUDO.find_iter(text) {
    let pseudo = found.as_str();
    if LEGACY_ELEMENTS.contains(&pseudo) {
      element = Some(format!(":{pseudo}"));
    } else {
      pseudos.push(pseudo.to_string());
    }
  }
  (pseudos, element)
}

fn target(captures: &regex::Captures, related: Option<RelatedSlot>) -> SelectorTarget {
  let (pseudos, legacy_element) = pseudo_list(captures.name("pseudos").map_or("", |m| m.as_str()));
  SelectorTarget {
    pseudos,
    pseudo_element: captures
      .name("element")
      .map(|element| element.as_str().to_string())
      .or(legacy_element),
    related,
  }
}

fn related(captures: &regex::Captures, relation: SelectorRelation) -> Option<RelatedSlot> {
  let slot = captures.name("slot")?.as_str().parse().ok()?;
  let state: String = captures
    .name("state")
    .map_or("", |m| m.as_str())
    .split_whitespace()
    .collect();
  Some(RelatedSlot {
    slot,
    relation,
    pseudo: (!state.is_empty()).then_some(state),
  })
}

/// Breaks a resolved selector into the conditions it applies under. Anything that needs
/// cascade semantics without a static equivalent is rejected.
pub(super) fn analyze_selector(selector: &str) -> Result<Vec<SelectorTarget>, SelectorRejection> {
  let mut targets = Vec::new();
  for part in split_selector_list(selector) {
    if part.contains("&&") {
      return Err(reject(
        DiagnosticCode::SpecificityHack,
        format!("Selector `{part}` raises specificity by repeating `&`, which has no static equivalent"),
      ));
    }
    if part.contains(":global") {
      return Err(reject(
        DiagnosticCode::UnsupportedSelector,
        format!("Global selector `{part}` cannot be scoped to the component"),
      ));
    }

    if part.contains("__SLOT_") {
      let forms = [
        (&*ANCESTOR, SelectorRelation::Ancestor),
        (&*SIBLING, SelectorRelation::Sibling),
        (&*DESCENDANT, SelectorRelation::Descendant),
      ];
      let matched = forms.iter().find_map(|(pattern, relation)| {
        let captures = pattern.captures(part)?;
        let related = related(&captures, *relation)?;
        Some(target(&captures, Some(related)))
      });
      match matched {
        Some(target) => targets.push(target),
        None => {
          return Err(reject(
            DiagnosticCode::UnsupportedSelector,
            format!("Component selector `{part}` relies on cascade semantics that cannot be expressed statically"),
          ))
        }
      }
      continue;
    }

    match OWN.captures(part) {
      Some(captures) => targets.push(target(&captures, None)),
      None => {
        return Err(reject(
          DiagnosticCode::UnsupportedSelector,
          format!("Selector `{part}` targets elements other than the component itself"),
        ))
      }
    }
  }
  Ok(targets)
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn own(pseudos: &[&str], element: Option<&str>) -> SelectorTarget {
    SelectorTarget {
      pseudos: pseudos.iter().map(|pseudo| pseudo.to_string()).collect(),
      pseudo_element: element.map(str::to_string),
      related: None,
    }
  }

  #[test]
  fn test_own_states_and_elements() {
    assert_eq!(analyze_selector("&"), Ok(vec![own(&[], None)]));
    assert_eq!(
      analyze_selector("&:hover:not(:disabled)"),
      Ok(vec![own(&[":hover", ":not(:disabled)"], None)])
    );
    assert_eq!(
      analyze_selector("&:focus-visible::after"),
      Ok(vec![own(&[":focus-visible"], Some("::after"))])
    );
    assert_eq!(analyze_selector("&:before"), Ok(vec![own(&[], Some("::before"))]));
    assert_eq!(
      analyze_selector("&:hover, &:focus"),
      Ok(vec![own(&[":hover"], None), own(&[":focus"], None)])
    );
  }

  #[test]
  fn test_related_components() {
    assert_eq!(
      analyze_selector("__SLOT_2__:hover &"),
      Ok(vec![SelectorTarget {
        related: Some(RelatedSlot {
          slot: 2,
          relation: SelectorRelation::Ancestor,
          pseudo: Some(":hover".into()),
        }),
        ..Default::default()
      }])
    );
    assert_eq!(
      analyze_selector("__SLOT_0__:focus + &"),
      Ok(vec![SelectorTarget {
        related: Some(RelatedSlot {
          slot: 0,
          relation: SelectorRelation::Sibling,
          pseudo: Some(":focus".into()),
        }),
        ..Default::default()
      }])
    );
    assert_eq!(
      analyze_selector("&:has(__SLOT_1__:checked)::after"),
      Ok(vec![SelectorTarget {
        pseudo_element: Some("::after".into()),
        related: Some(RelatedSlot {
          slot: 1,
          relation: SelectorRelation::Descendant,
          pseudo: Some(":checked".into()),
        }),
        ..Default::default()
      }])
    );
  }

  #[test]
  fn test_rejections() {
    let code = |selector: &str| analyze_selector(selector).map_err(|rejection| rejection.code);
    assert_eq!(code("&&"), Err(DiagnosticCode::SpecificityHack));
    assert_eq!(code("&& &:hover"), Err(DiagnosticCode::SpecificityHack));
    assert_eq!(code("& > span"), Err(DiagnosticCode::UnsupportedSelector));
    assert_eq!(code("&.active"), Err(DiagnosticCode::UnsupportedSelector));
    assert_eq!(code("&[aria-checked]"), Err(DiagnosticCode::UnsupportedSelector));
    assert_eq!(code(":global(.dark) &"), Err(DiagnosticCode::UnsupportedSelector));
    assert_eq!(code("&:hover __SLOT_0__"), Err(DiagnosticCode::UnsupportedSelector));
  }
}
