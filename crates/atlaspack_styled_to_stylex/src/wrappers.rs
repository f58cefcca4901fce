//! Decides which lowered components still need a wrapper component at render time.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::styled_decl::StyledDecl;

/// How consumers in other files use an exported component.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsumerUsage {
  /// Some consumer passes `className`.
  pub class_name: bool,
  /// Some consumer passes `style`.
  pub style: bool,
}

impl ConsumerUsage {
  pub fn overrides_styles(&self) -> bool {
    self.class_name || self.style
  }
}

/// Exported component name -> usage, precomputed across the project.
pub type ConsumerUsageMap = IndexMap<String, ConsumerUsage>;

/// Anything that has to happen per render rather than at build time.
fn has_runtime_behavior(decl: &StyledDecl) -> bool {
  !decl.variant_buckets.is_empty()
    || !decl.variant_dimensions.is_empty()
    || !decl.compound_variants.is_empty()
    || !decl.style_fns.is_empty()
    || !decl.inline_style_props.is_empty()
    || !decl.style_refs.is_empty()
    || decl.attrs_info.is_some()
    || decl.should_forward_prop.is_some()
}

/// Marks components that need a wrapper, then pushes the requirement from each
/// `styled(Local)` component down to `Local` until nothing changes.
pub fn propagate_wrapper_requirements(decls: &mut [StyledDecl], usage: &ConsumerUsageMap) {
  for decl in decls.iter_mut() {
    let overridden = decl.exported
      && usage
        .get(&decl.local_name)
        .is_some_and(ConsumerUsage::overrides_styles);
    if overridden {
      decl.supports_external_styles = true;
      decl.needs_wrapper = true;
    }
    if has_runtime_behavior(decl) {
      decl.needs_wrapper = true;
    }
  }

  let index: IndexMap<String, usize> = decls
    .iter()
    .enumerate()
    .map(|(position, decl)| (decl.local_name.clone(), position))
    .collect();
  let edges: Vec<(usize, usize)> = decls
    .iter()
    .enumerate()
    .filter_map(|(position, decl)| {
      let base = index.get(decl.extends()?)?;
      Some((position, *base))
    })
    .collect();

  for _ in 0..decls.len() {
    let mut changed = false;
    for (extending, base) in &edges {
      let requires = decls[*extending].needs_wrapper || decls[*extending].bail.is_some();
      let base = &mut decls[*base];
      if requires && !(base.needs_wrapper && base.supports_external_styles) {
        base.needs_wrapper = true;
        base.supports_external_styles = true;
        changed = true;
      }
    }
    if !changed {
      break;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::styled_decl::{StyleValue, StyledBase};
  use pretty_assertions::assert_eq;

  fn decl(name: &str, base: StyledBase) -> StyledDecl {
    StyledDecl::new(name, base, name.to_lowercase())
  }

  #[test]
  fn test_consumer_overrides_require_external_styles() {
    let mut button = decl("Button", StyledBase::Intrinsic("button".into()));
    button.exported = true;
    let mut decls = vec![button];
    let usage = ConsumerUsageMap::from([(
      "Button".to_string(),
      ConsumerUsage {
        class_name: true,
        style: false,
      },
    )]);

    propagate_wrapper_requirements(&mut decls, &usage);
    assert!(decls[0].needs_wrapper);
    assert!(decls[0].supports_external_styles);
  }

  #[test]
  fn test_requirements_flow_down_extension_chains() {
    let base = decl("Base", StyledBase::Intrinsic("div".into()));
    let middle = decl("Middle", StyledBase::Component("Base".into()));
    let mut top = decl("Top", StyledBase::Component("Middle".into()));
    top
      .base_style
      .insert("color".into(), StyleValue::Literal("red".into()));
    top.inline_style_props.push(crate::styled_decl::InlineStyleProp {
      property: "width".into(),
      expr: "(p) => p.width".into(),
    });
    let mut decls = vec![base, middle, top];

    propagate_wrapper_requirements(&mut decls, &ConsumerUsageMap::new());
    let flags: Vec<(bool, bool)> = decls
      .iter()
      .map(|decl| (decl.needs_wrapper, decl.supports_external_styles))
      .collect();
    assert_eq!(flags, vec![(true, true), (true, true), (true, false)]);
  }

  #[test]
  fn test_static_components_need_nothing() {
    let mut decls = vec![decl("Plain", StyledBase::Intrinsic("p".into()))];
    let usage: ConsumerUsageMap = serde_json::from_str(r#"{ "Plain": { "style": true } }"#).unwrap();

    propagate_wrapper_requirements(&mut decls, &usage);
    assert!(!decls[0].needs_wrapper);
  }
}
