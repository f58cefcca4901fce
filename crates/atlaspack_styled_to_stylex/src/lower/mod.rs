//! Lowers the parsed rules of one styled declaration into static style objects.
//!
//! Each declaration is classified and then claimed by the first handler that can express it:
//! the base style, a variant bucket, a style function or the inline style fallback. What
//! no handler claims is dropped with a warning, or aborts the file when the pattern needs a
//! semantic refactor.

use std::mem;

use indexmap::IndexMap;
use swc_core::ecma::ast::Expr;

use crate::classify::{
  classify, classify_selector_slot, touches_theme, unwrap_expr, ClassifyContext, PropsBindings,
  SelectorSlot, Unhandled,
};
use crate::collect::ModuleScope;
use crate::condition::{pascal, VariantCondition};
use crate::config::LoweringConfig;
use crate::css_ir::{replace_slots, slot_ids_in, slot_placeholder, CssDeclarationIR, CssRuleIR, CssValue, ValuePart};
use crate::diagnostic::{BailScope, Diagnostic, DiagnosticCode, DiagnosticSite, LoweringError, SourceLocation};
use crate::dimensions::{group_variant_dimensions, GroupingInput};
use crate::naming::{camel_case_property, param_name, StyleKeyAllocator};
use crate::resolution::{Resolution, ResolutionSession, ResolveSelectorContext};
use crate::rule_parser::resolve_selector;
use crate::runner::emit_expr;
use crate::styled_decl::{ConditionKey, InlineStyleProp, PropTypes, StyleFn, StyleObject, StyleValue, StyledDecl};

mod context;
mod handlers;
mod selector;
mod value;

use context::{base_default, place_in, RuleScope, Sink, StyleState};
use handlers::Payload;
use selector::{analyze_selector, RelatedSlot};
use value::{compose, Composed, Item};

/// Per-file lowering context. Holds everything that must stay consistent across the
/// components of one file: the resolution session and the style key allocator.
pub struct FileLowering<'a, 's> {
  scope: &'a ModuleScope,
  config: &'a LoweringConfig,
  session: &'a mut ResolutionSession<'s>,
  allocator: &'a mut StyleKeyAllocator,
}

impl<'a, 's> FileLowering<'a, 's> {
  pub fn new(
    scope: &'a ModuleScope,
    config: &'a LoweringConfig,
    session: &'a mut ResolutionSession<'s>,
    allocator: &'a mut StyleKeyAllocator,
  ) -> Self {
    FileLowering {
      scope,
      config,
      session,
      allocator,
    }
  }

  pub fn session(&self) -> &ResolutionSession<'s> {
    self.session
  }

  /// Lower `decl` in place. Component bails are recorded on the declaration, file bails stop
  /// the session; only broken input comes back as an error.
  #[tracing::instrument(level = "debug", skip_all, fields(component = %decl.local_name))]
  pub fn lower_styled_decl(
    &mut self,
    decl: &mut StyledDecl,
    loc: Option<SourceLocation>,
  ) -> Result<(), LoweringError> {
    if self.session.is_stopped() {
      return Ok(());
    }

    let rules = mem::take(&mut decl.rules);
    let exprs = mem::take(&mut decl.template_expressions);
    let result = self.lower_rules_of(decl, &rules, &exprs, loc);
    decl.rules = rules;
    decl.template_expressions = exprs;
    result
  }

  fn lower_rules_of(
    &mut self,
    decl: &mut StyledDecl,
    rules: &[CssRuleIR],
    exprs: &[Expr],
    loc: Option<SourceLocation>,
  ) -> Result<(), LoweringError> {
    check_slots(rules, exprs.len(), &decl.local_name)?;

    let bindings = PropsBindings::default();
    let slots = Slots {
      exprs,
      bindings: &bindings,
    };
    let mut lowering = DeclLowering {
      component: decl.local_name.clone(),
      style_key: decl.style_key.clone(),
      props_type: decl.props_type.clone(),
      site: DiagnosticSite::component(&decl.local_name, loc),
      state: StyleState::default(),
      file: self,
    };
    let outcome = lowering.lower_rules(rules, &RuleScope::root(), &Sink::Base, slots, Mode::PerDeclaration);
    let site = lowering.site.clone();
    let state = lowering.state;

    match outcome {
      Ok(()) => {
        self.apply(decl, state);
        Ok(())
      }
      Err(Failure::Component(diagnostic)) => {
        self.bail_component(decl, diagnostic);
        Ok(())
      }
      Err(Failure::Unlowered(unhandled)) => {
        let diagnostic = site.diagnostic(unhandled.code, BailScope::Component, unhandled.reason);
        self.bail_component(decl, diagnostic);
        Ok(())
      }
      Err(Failure::File) => Ok(()),
      Err(Failure::Hard(error)) => Err(error),
    }
  }

  fn bail_component(&mut self, decl: &mut StyledDecl, diagnostic: Diagnostic) {
    decl.bail = Some(diagnostic.message.clone());
    self.session.report(diagnostic);
  }

  /// Moves lowered state onto the declaration, promoting equality buckets to dimensions
  /// and giving every remaining bucket a unique style key.
  fn apply(&mut self, decl: &mut StyledDecl, state: StyleState) {
    let proposed: IndexMap<String, String> = state
      .bucket_conditions
      .iter()
      .map(|(key, conditions)| {
        let suffix: String = conditions.iter().map(VariantCondition::style_key_suffix).collect();
        (key.clone(), format!("{}{suffix}", decl.style_key))
      })
      .collect();

    let grouped = group_variant_dimensions(&GroupingInput {
      style_key: &decl.style_key,
      buckets: &state.buckets,
      conditions: &state.bucket_conditions,
      style_keys: &proposed,
      base_style: &state.base,
      prop_types: &decl.props_type,
    });

    let mut base_style = state.base;
    for property in &grouped.props_to_strip {
      base_style.shift_remove(property);
    }

    let variant_style_keys = grouped
      .remaining_style_keys
      .iter()
      .map(|(condition, key)| (condition.clone(), self.allocator.allocate(key)))
      .collect();

    let mut dimensions = state.dimensions;
    for mut dimension in grouped.dimensions {
      dimension.variant_object_name = self.allocator.allocate(&dimension.variant_object_name);
      dimensions.push(dimension);
    }

    decl.base_style = base_style;
    decl.variant_buckets = grouped.remaining_buckets;
    decl.variant_style_keys = variant_style_keys;
    decl.variant_dimensions = dimensions;
    decl.compound_variants = state.compounds;
    decl.compound_styles = state.compound_styles;
    decl.style_fns = state.style_fns;
    decl.inline_style_props = state.inline_style_props;
    decl.style_refs = state.style_refs;

    tracing::debug!(
      buckets = decl.variant_buckets.len(),
      dimensions = decl.variant_dimensions.len(),
      compounds = decl.compound_variants.len(),
      style_fns = decl.style_fns.len(),
      "Lowered styled component"
    );
  }
}

fn check_slots(rules: &[CssRuleIR], available: usize, component: &str) -> Result<(), LoweringError> {
  match rules
    .iter()
    .flat_map(CssRuleIR::slot_ids)
    .find(|slot| *slot >= available)
  {
    Some(slot) => Err(LoweringError::MissingSlot {
      component: component.to_string(),
      slot,
    }),
    None => Ok(()),
  }
}

/// Template expressions a set of rules refers to, and the props bindings they are
/// classified in.
#[derive(Clone, Copy)]
struct Slots<'e> {
  exprs: &'e [Expr],
  bindings: &'e PropsBindings,
}

impl<'e> Slots<'e> {
  fn expr(&self, slot: usize, component: &str) -> Result<&'e Expr, Failure> {
    self.exprs.get(slot).ok_or_else(|| {
      Failure::Hard(LoweringError::MissingSlot {
        component: component.to_string(),
        slot,
      })
    })
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
  /// Unlowerable declarations are dropped one by one.
  PerDeclaration,
  /// Any unlowerable declaration fails the whole construct.
  AllOrNothing,
}

/// Why lowering stopped short.
#[derive(Debug)]
enum Failure {
  /// Nothing could express the declaration. Settled by the nearest per-declaration walk.
  Unlowered(Unhandled),
  /// The component is left as it is.
  Component(Diagnostic),
  /// The session has been stopped; the diagnostic is already recorded.
  File,
  Hard(LoweringError),
}

impl Failure {
  fn unlowered(code: DiagnosticCode, reason: impl Into<String>) -> Self {
    Failure::Unlowered(Unhandled {
      code,
      reason: reason.into(),
      touches_theme: false,
    })
  }
}

impl From<LoweringError> for Failure {
  fn from(error: LoweringError) -> Self {
    Failure::Hard(error)
  }
}

/// `Stopped` ends the walk, `Declined` is left to the caller.
fn resolved<T>(resolution: Resolution<T>) -> Result<Option<T>, Failure> {
  match resolution {
    Resolution::Resolved(value) => Ok(Some(value)),
    Resolution::Declined => Ok(None),
    Resolution::Stopped => Err(Failure::File),
  }
}

struct DeclLowering<'l, 'a, 's> {
  file: &'l mut FileLowering<'a, 's>,
  component: String,
  style_key: String,
  props_type: PropTypes,
  site: DiagnosticSite,
  state: StyleState,
}

impl DeclLowering<'_, '_, '_> {
  fn file_bail(&mut self, site: &DiagnosticSite, code: DiagnosticCode, message: impl Into<String>) -> Failure {
    self
      .file
      .session
      .stop(site.diagnostic(code, BailScope::File, message));
    Failure::File
  }

  fn classify_slot(&self, slot: usize, slots: Slots) -> Result<crate::classify::Classified, Failure> {
    let expr = slots.expr(slot, &self.component)?;
    Ok(classify(expr, &ClassifyContext::new(self.file.scope, slots.bindings)))
  }

  fn lower_rules(
    &mut self,
    rules: &[CssRuleIR],
    parent: &RuleScope,
    sink: &Sink,
    slots: Slots,
    mode: Mode,
  ) -> Result<(), Failure> {
    for rule in rules {
      let scopes = self.rule_scopes(rule, parent, slots)?;
      for scope in &scopes {
        for declaration in &rule.declarations {
          match self.lower_declaration(declaration, scope, sink, slots, mode) {
            Err(Failure::Unlowered(unhandled)) if mode == Mode::PerDeclaration => {
              self.settle(declaration, scope, sink, slots, unhandled)?
            }
            outcome => outcome?,
          }
        }
      }
    }
    Ok(())
  }

  /// Selector text with interpolated components written back as `${Name}`.
  fn display_selector(&self, selector: &str, slots: Slots) -> String {
    replace_slots(selector, |slot| {
      match slots
        .exprs
        .get(slot)
        .map(|expr| classify_selector_slot(expr, self.file.scope))
      {
        Some(SelectorSlot::Component(name)) => format!("${{{name}}}"),
        _ => "${…}".to_string(),
      }
    })
  }

  /// The contexts a rule's declarations apply in: one per selector in its comma list.
  fn rule_scopes(&mut self, rule: &CssRuleIR, parent: &RuleScope, slots: Slots) -> Result<Vec<RuleScope>, Failure> {
    let selector = resolve_selector(&parent.selector, &self.display_selector(&rule.selector, slots));
    let site = self.site.at(&selector, None);

    let mut at_rules = parent.at_rules.clone();
    for at_rule in &rule.at_rule_stack {
      if at_rule.trim_start().starts_with("@keyframes") {
        return Err(self.file_bail(
          &site,
          DiagnosticCode::KeyframesInComponent,
          format!("`{at_rule}` declared inside a component cannot be hoisted"),
        ));
      }
      at_rules.push(self.at_rule_text(at_rule, slots, &site)?);
    }

    let targets = match analyze_selector(&rule.selector) {
      Ok(targets) => targets,
      Err(rejection) => return Err(self.file_bail(&site, rejection.code, rejection.message)),
    };

    let mut scopes = Vec::with_capacity(targets.len());
    for target in targets {
      if parent.pseudo_element.is_some() && target.pseudo_element.is_some() {
        return Err(self.file_bail(
          &site,
          DiagnosticCode::UnsupportedSelector,
          format!("Selector `{selector}` nests one pseudo-element inside another"),
        ));
      }

      let mut conditions = parent.conditions.clone();
      if let Some(related) = &target.related {
        conditions.push(self.related_condition(related, &selector, slots, &site)?);
      }
      conditions.extend(target.pseudos.into_iter().map(ConditionKey::Literal));
      scopes.push(RuleScope {
        selector: selector.clone(),
        at_rules: at_rules.clone(),
        conditions,
        pseudo_element: target
          .pseudo_element
          .or_else(|| parent.pseudo_element.clone()),
      });
    }
    Ok(scopes)
  }

  /// At-rule prelude with interpolations resolved to static text.
  fn at_rule_text(&mut self, at_rule: &str, slots: Slots, site: &DiagnosticSite) -> Result<String, Failure> {
    let mut text = at_rule.split_whitespace().collect::<Vec<_>>().join(" ");
    for slot in slot_ids_in(&text) {
      let classified = self.classify_slot(slot, slots)?;
      let Some(resolved) = self.static_text(classified, None, site)? else {
        return Err(Failure::Component(site.diagnostic(
          DiagnosticCode::UnhandledInterpolation,
          BailScope::Component,
          format!("At-rule `{at_rule}` interpolates a value that is not known at build time"),
        )));
      };
      text = text.replace(&slot_placeholder(slot), &resolved);
    }
    Ok(text)
  }

  fn related_condition(
    &mut self,
    related: &RelatedSlot,
    selector: &str,
    slots: Slots,
    site: &DiagnosticSite,
  ) -> Result<ConditionKey, Failure> {
    let expr = slots.expr(related.slot, &self.component)?;
    let component = match classify_selector_slot(expr, self.file.scope) {
      SelectorSlot::Component(name) => Some(name),
      SelectorSlot::Unknown => None,
    };
    let ctx = ResolveSelectorContext {
      file_path: self.file.session.file_path().to_string(),
      selector: selector.to_string(),
      relation: related.relation,
      pseudo: related.pseudo.clone(),
      component,
    };

    match resolved(self.file.session.resolve_selector(ctx, site)?)? {
      Some(expr) => Ok(ConditionKey::Computed(expr.source)),
      None => Err(Failure::Component(
        site
          .diagnostic(
            DiagnosticCode::SelectorUnresolved,
            BailScope::Component,
            format!("No mapping for component selector `{selector}`"),
          )
          .with_hint("Add a selector mapping to the resolution adapter or migrate the component by hand"),
      )),
    }
  }

  fn lower_declaration(
    &mut self,
    declaration: &CssDeclarationIR,
    scope: &RuleScope,
    sink: &Sink,
    slots: Slots,
    mode: Mode,
  ) -> Result<(), Failure> {
    let Some(property) = declaration.property.as_deref() else {
      return self.lower_mixin(declaration, scope, sink, slots, mode);
    };
    if !slot_ids_in(property).is_empty() {
      return Err(Failure::unlowered(
        DiagnosticCode::DynamicPropertyName,
        format!("property name `{property}` is interpolated"),
      ));
    }
    let site = self.site.at(&scope.selector, Some(property));

    let mut items = Vec::new();
    match &declaration.value {
      CssValue::Static(text) => items.push(Item::Text(text.clone())),
      CssValue::Interpolated(parts) => {
        for part in parts {
          items.push(match part {
            ValuePart::Static(text) => Item::Text(text.clone()),
            ValuePart::Slot(slot) => Item::Slot(self.classify_slot(*slot, slots)?),
          });
        }
      }
    }
    if declaration.important {
      items.push(Item::Text(" !important".to_string()));
    }

    let (before, conditional, after) = value::split_at_conditional(items);
    if let Some(conditional) = conditional {
      let before = self.static_pieces(before, property, &site)?;
      let after = self.static_pieces(after, property, &site)?;
      let payload = Payload::Value {
        property: property.to_string(),
        key: camel_case_property(property),
        before,
        after,
      };
      return self.lower_conditional(conditional, scope, sink, &payload);
    }

    let pieces = self.evaluate_items(before, Some(property), &site)?;
    let composed = compose(pieces).map_err(|segments| {
      Failure::unlowered(
        DiagnosticCode::MultipleDynamicSegments,
        format!("value depends on more than one prop ({})", segments.0.join(", ")),
      )
    })?;
    self.place_composed(&camel_case_property(property), composed, scope, sink)
  }

  fn place_composed(&mut self, key: &str, composed: Composed, scope: &RuleScope, sink: &Sink) -> Result<(), Failure> {
    match composed {
      Composed::Static(value) => {
        self.state.place(sink, key, value, scope);
        Ok(())
      }
      Composed::Dynamic { prop, value } if *sink == Sink::Base => {
        self.add_style_fn(key, prop, value, scope);
        Ok(())
      }
      Composed::Dynamic { prop, .. } => Err(Failure::unlowered(
        DiagnosticCode::UnresolvableBranch,
        format!("value of `{key}` reads `{prop}` inside a conditional block"),
      )),
    }
  }

  /// One style function per prop; every property computed from that prop shares it.
  fn add_style_fn(&mut self, key: &str, prop: String, value: StyleValue, scope: &RuleScope) {
    let index = match self.state.style_fn_props.get(&prop) {
      Some(index) => *index,
      None => {
        let style_key = self
          .file
          .allocator
          .allocate(&format!("{}By{}", self.style_key, pascal(&prop)));
        let param_type = self.props_type.get(&prop).and_then(|info| {
          if info.is_boolean {
            Some("boolean".to_string())
          } else {
            info.union_source()
          }
        });
        self.state.style_fns.push(StyleFn {
          style_key,
          param: param_name(&prop),
          param_type,
          styles: StyleObject::new(),
        });
        let index = self.state.style_fns.len() - 1;
        self.state.style_fn_props.insert(prop, index);
        index
      }
    };

    let seed = base_default(&self.state.base, key, scope);
    let path = scope.path();
    place_in(
      &mut self.state.style_fns[index].styles,
      key,
      value,
      &path,
      scope.pseudo_element.as_deref(),
      &seed,
    );
  }

  /// Decide what happens to a declaration nothing could lower.
  fn settle(
    &mut self,
    declaration: &CssDeclarationIR,
    scope: &RuleScope,
    sink: &Sink,
    slots: Slots,
    unhandled: Unhandled,
  ) -> Result<(), Failure> {
    let site = self.site.at(&scope.selector, declaration.property.as_deref());
    if unhandled.touches_theme {
      return Err(self.file_bail(
        &site,
        DiagnosticCode::UnhandledThemeExpression,
        format!("Theme-dependent interpolation could not be lowered ({})", unhandled.reason),
      ));
    }

    if let Some(inline) = self.inline_fallback(declaration, scope, sink, slots) {
      tracing::debug!(
        component = %self.component,
        property = %inline.property,
        "Keeping declaration as an inline style"
      );
      self.state.inline_style_props.push(inline);
      return Ok(());
    }

    if self.file.config.is_strict(unhandled.code) {
      return Err(self.file_bail(
        &site,
        unhandled.code,
        format!("`{}` is a strict pattern: {}", unhandled.code, unhandled.reason),
      ));
    }

    let shown = self.display_selector(&declaration.value_raw, slots);
    let described = match &declaration.property {
      Some(property) => format!("{property}: {shown}"),
      None => shown,
    };
    self.file.session.report(site.diagnostic(
      unhandled.code,
      BailScope::Declaration,
      format!("Dropped declaration `{described}`: {}", unhandled.reason),
    ));
    Ok(())
  }

  /// A lone prop-reading arrow on the root selector can keep running at render time.
  fn inline_fallback(
    &self,
    declaration: &CssDeclarationIR,
    scope: &RuleScope,
    sink: &Sink,
    slots: Slots,
  ) -> Option<InlineStyleProp> {
    let property = declaration.property.as_deref()?;
    if !self.file.config.inline_style_fallback || !scope.is_root() || *sink != Sink::Base || declaration.important {
      return None;
    }
    let CssValue::Interpolated(parts) = &declaration.value else {
      return None;
    };
    let [ValuePart::Slot(slot)] = parts.as_slice() else {
      return None;
    };
    let expr = slots.exprs.get(*slot)?;
    if !matches!(unwrap_expr(expr), Expr::Arrow(_)) || touches_theme(expr, slots.bindings) {
      return None;
    }
    Some(InlineStyleProp {
      property: camel_case_property(property),
      expr: emit_expr(expr).ok()?,
    })
  }
}
