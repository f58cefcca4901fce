use std::cell::Cell;
use std::path::Path;

use atlaspack_styled_to_stylex::resolution::{
  AdapterError, ResolveCallContext, ResolveSelectorContext, ResolveValueContext, ResolvedCall,
  ResolvedSelector, ResolvedValue,
};
use atlaspack_styled_to_stylex::styled_decl::{ConditionKey, StyleValue};
use atlaspack_styled_to_stylex::{
  lower_file, ConsumerUsage, ConsumerUsageMap, DiagnosticCode, FileOutcome, ImportSpec, LoweredFile,
  LoweringConfig, MappingAdapter, ResolutionAdapter,
};
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
        "color": "vars.color",
        "space.sm": "\"4px\""
      }
    }
  "#})
  .unwrap()
}

/// Counts value requests that reach the wrapped adapter.
struct CountingAdapter {
  inner: MappingAdapter,
  value_calls: Cell<usize>,
}

impl ResolutionAdapter for CountingAdapter {
  fn resolve_value(&self, ctx: &ResolveValueContext) -> Result<Option<ResolvedValue>, AdapterError> {
    self.value_calls.set(self.value_calls.get() + 1);
    self.inner.resolve_value(ctx)
  }

  fn resolve_call(&self, ctx: &ResolveCallContext) -> Result<Option<ResolvedCall>, AdapterError> {
    self.inner.resolve_call(ctx)
  }

  fn resolve_selector(
    &self,
    ctx: &ResolveSelectorContext,
  ) -> Result<Option<ResolvedSelector>, AdapterError> {
    self.inner.resolve_selector(ctx)
  }
}

fn run(source: &str, adapter: &dyn ResolutionAdapter, usage: &ConsumerUsageMap) -> FileOutcome {
  lower_file(
    source,
    Path::new("src/Component.tsx"),
    adapter,
    &LoweringConfig::default(),
    usage,
  )
  .unwrap()
}

fn lowered(source: &str) -> LoweredFile {
  match run(source, &adapter(), &ConsumerUsageMap::new()) {
    FileOutcome::Lowered(file) => file,
    FileOutcome::Bailed { diagnostics } => panic!("file bailed: {diagnostics:?}"),
  }
}

fn literal(text: &str) -> StyleValue {
  StyleValue::Literal(text.to_string())
}

#[test]
fn test_theme_values_resolve_with_their_imports() {
  let file = lowered(indoc! {r#"
    import styled from "styled-components";
    export const Title = styled.h1`
      color: ${(p) => p.theme.colors.primary};
    `;
  "#});

  let title = &file.decls[0];
  assert_eq!(title.base_style["color"], StyleValue::Expr("brandVars.primary".into()));
  assert!(title.variant_buckets.is_empty());
  assert_eq!(file.imports, vec![ImportSpec::named("./brand.stylex", "brandVars")]);
  assert!(
    file.styles_code.contains("import { brandVars } from \"./brand.stylex\";"),
    "{}",
    file.styles_code
  );
  assert!(file.styles_code.contains("color: brandVars.primary"), "{}", file.styles_code);
}

#[test]
fn test_boolean_ternary_becomes_a_variant_bucket() {
  let file = lowered(indoc! {r#"
    import styled from "styled-components";
    const Handle = styled.div<{ $draggable?: boolean }>`
      cursor: ${(p) => (p.$draggable ? "move" : "pointer")};
    `;
  "#});

  let handle = &file.decls[0];
  assert_eq!(handle.base_style["cursor"], literal("pointer"));
  assert_eq!(handle.variant_buckets["$draggable"]["cursor"], literal("move"));
  assert_eq!(handle.variant_style_keys["$draggable"], "handleDraggable");
  assert!(handle.style_fns.is_empty());
  assert!(handle.needs_wrapper);
}

#[test]
fn test_switch_without_default_bails_the_file() {
  let outcome = run(
    indoc! {r#"
      import styled, { css } from "styled-components";
      const Avatar = styled.img<{ size: "tiny" | "small" | "medium" }>`
        ${({ size }) => {
          switch (size) {
            case "tiny":
              return css`width: 16px; height: 16px;`;
            case "small":
              return css`width: 24px; height: 24px;`;
            case "medium":
              return css`width: 32px; height: 32px;`;
          }
        }}
      `;
    "#},
    &adapter(),
    &ConsumerUsageMap::new(),
  );

  let FileOutcome::Bailed { diagnostics } = outcome else {
    panic!("expected the file to bail");
  };
  assert_eq!(diagnostics[0].code, DiagnosticCode::SwitchMissingDefault);
  assert!(diagnostics[0].message.contains("missing default case"));
}

#[test]
fn test_pseudo_and_media_rules_share_one_property_map() {
  let file = lowered(indoc! {r#"
    import styled from "styled-components";
    const Link = styled.a`
      &:hover {
        color: red;
      }
      @media (min-width: 600px) {
        color: blue;
      }
    `;
  "#});

  let link = &file.decls[0];
  assert_eq!(link.base_style.len(), 1);
  let StyleValue::Conditional(color) = &link.base_style["color"] else {
    panic!("expected a conditional color, got {:?}", link.base_style["color"]);
  };
  assert_eq!(color[&ConditionKey::Default], StyleValue::Null);
  assert_eq!(color[&ConditionKey::Literal(":hover".into())], literal("red"));
  let media = color
    .iter()
    .find_map(|(key, value)| match key {
      ConditionKey::Literal(key) if key.starts_with("@media") => Some(value),
      _ => None,
    });
  assert_eq!(media, Some(&literal("blue")));
}

#[test]
fn test_indexed_theme_lookup_becomes_a_typed_style_function() {
  let file = lowered(indoc! {r#"
    import styled from "styled-components";
    const Swatch = styled.div<{ variant: "a" | "b" | "c" }>`
      background: ${(p) => p.theme.color[p.variant]};
    `;
  "#});

  let swatch = &file.decls[0];
  assert!(swatch.bail.is_none());
  assert_eq!(swatch.style_fns.len(), 1);
  let style_fn = &swatch.style_fns[0];
  assert_eq!(style_fn.param, "variant");
  assert_eq!(style_fn.param_type.as_deref(), Some(r#""a" | "b" | "c""#));
  assert_eq!(
    style_fn.styles["background"],
    StyleValue::Expr("vars.color[variant]".into())
  );
}

#[test]
fn test_template_literals_of_static_values_collapse() {
  let file = lowered(indoc! {r#"
    import styled from "styled-components";
    const GUTTER = "16px";
    const Grid = styled.div`
      padding: ${(p) => `${p.theme.space.sm} 0`};
      margin: ${GUTTER} ${GUTTER};
    `;
  "#});

  let grid = &file.decls[0];
  assert_eq!(grid.base_style["padding"], literal("4px 0"));
  assert_eq!(grid.base_style["margin"], literal("16px 16px"));
  assert!(!file.styles_code.contains('`'), "{}", file.styles_code);
}

#[test]
fn test_unresolved_theme_reference_stops_all_resolution() {
  let adapter = CountingAdapter {
    inner: adapter(),
    value_calls: Cell::new(0),
  };
  let outcome = run(
    indoc! {r#"
      import styled from "styled-components";
      const First = styled.div`
        color: ${(p) => p.theme.colors.unknown};
      `;
      const Second = styled.div`
        color: ${(p) => p.theme.colors.primary};
        border-color: ${(p) => p.theme.colors.primary};
      `;
    "#},
    &adapter,
    &ConsumerUsageMap::new(),
  );

  let FileOutcome::Bailed { diagnostics } = outcome else {
    panic!("expected the file to bail");
  };
  assert_eq!(adapter.value_calls.get(), 1);
  assert_eq!(diagnostics.len(), 1);
  assert_eq!(diagnostics[0].code, DiagnosticCode::ThemeUnresolved);
  assert_eq!(diagnostics[0].component.as_deref(), Some("First"));
}

#[test]
fn test_lowering_is_idempotent() {
  let source = indoc! {r#"
    import styled, { css } from "styled-components";
    const Button = styled.button<{ $primary?: boolean; size?: "small" | "large" }>`
      padding: 4px;
      color: ${(p) => p.theme.colors.primary};
      ${(p) => p.$primary && css`
        font-weight: bold;
      `}
      ${(p) => p.size === "small" && css`
        padding: 2px;
      `}
    `;
  "#};

  let first = lowered(source);
  let second = lowered(source);
  assert_eq!(
    serde_json::to_value(&first.decls).unwrap(),
    serde_json::to_value(&second.decls).unwrap()
  );
  assert_eq!(first.styles_code, second.styles_code);
}

#[test]
fn test_overridden_exports_and_their_bases_need_wrappers() {
  let usage = ConsumerUsageMap::from([(
    "Fancy".to_string(),
    ConsumerUsage {
      class_name: false,
      style: true,
    },
  )]);
  let outcome = run(
    indoc! {r#"
      import styled from "styled-components";
      const Plain = styled.div`
        color: black;
      `;
      export const Fancy = styled(Plain)`
        color: hotpink;
      `;
    "#},
    &adapter(),
    &usage,
  );

  let FileOutcome::Lowered(file) = outcome else {
    panic!("expected the file to lower");
  };
  let flags: Vec<(bool, bool)> = file
    .decls
    .iter()
    .map(|decl| (decl.needs_wrapper, decl.supports_external_styles))
    .collect();
  assert_eq!(flags, vec![(true, true), (true, true)]);
}

#[test]
fn test_syntax_errors_are_errors() {
  let result = lower_file(
    "const = ;",
    Path::new("broken.tsx"),
    &adapter(),
    &LoweringConfig::default(),
    &ConsumerUsageMap::new(),
  );
  assert!(result.is_err());
}

#[test]
fn test_nested_conditional_keeps_its_conjunction_bucket() {
  let file = lowered(indoc! {r#"
    import styled, { css } from "styled-components";
    const Button = styled.button<{ size: "small" | "large"; kind?: "a" | "b" }>`
      ${(p) => p.size === "small" && css`
        padding: 2px;
        ${(q) => q.kind === "a" && css`color: red;`}
      `}
      ${(p) => p.size === "large" && css`padding: 8px;`}
    `;
  "#});

  let button = &file.decls[0];
  assert!(button.bail.is_none());
  let size = &button.variant_dimensions[0];
  assert_eq!(size.prop_name, "size");
  assert_eq!(size.variants.keys().collect::<Vec<_>>(), vec!["small", "large"]);
  assert_eq!(size.variants["small"]["padding"], literal("2px"));
  assert_eq!(size.default_value, None);

  let nested = r#"size === "small" && kind === "a""#;
  assert_eq!(button.variant_buckets[nested]["color"], literal("red"));
  assert_eq!(button.variant_style_keys[nested], "buttonSizeSmallKindA");
}

#[test]
fn test_unresolved_imported_value_stops_all_resolution() {
  let adapter = CountingAdapter {
    inner: adapter(),
    value_calls: Cell::new(0),
  };
  let outcome = run(
    indoc! {r#"
      import styled from "styled-components";
      import { tokens } from "./tokens";
      const First = styled.div`
        color: ${tokens.missing};
      `;
      const Second = styled.div`
        color: ${tokens.missing};
        border-color: ${(p) => p.theme.colors.primary};
      `;
    "#},
    &adapter,
    &ConsumerUsageMap::new(),
  );

  let FileOutcome::Bailed { diagnostics } = outcome else {
    panic!("expected the file to bail");
  };
  assert_eq!(adapter.value_calls.get(), 1);
  assert_eq!(diagnostics.len(), 1);
  assert_eq!(diagnostics[0].code, DiagnosticCode::ImportedValueUnresolved);
  assert_eq!(diagnostics[0].component.as_deref(), Some("First"));
}
