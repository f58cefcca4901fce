use indexmap::{IndexMap, IndexSet};

use super::value::Piece;
use super::*;
use crate::classify::{Branch, Classified, Conditional, CssBlock, HelperCall, SwitchEnumeration};
use crate::css_ir::sole_slot;
use crate::dimensions::{dimension_name, fallback_variant_name};
use crate::resolution::{CallUsage, SessionCall};
use crate::rule_parser::parse_template;
use crate::styled_decl::{CompoundBranch, CompoundVariant, StyleRef, VariantDimension};

/// What the branches of a conditional produce.
pub(super) enum Payload {
  /// A value for one property, with the text around the conditional slot.
  Value {
    property: String,
    key: String,
    before: Vec<Piece>,
    after: Vec<Piece>,
  },
  /// Whole declaration blocks.
  Block,
}

impl DeclLowering<'_, '_, '_> {
  /// Lowers every branch or none: a failure restores the state from before the conditional.
  pub(super) fn lower_conditional(
    &mut self,
    conditional: Conditional,
    scope: &RuleScope,
    sink: &Sink,
    payload: &Payload,
  ) -> Result<(), Failure> {
    let snapshot = self.state.clone();
    let result = self.lower_chain(conditional, scope, sink, payload);
    if result.is_err() {
      self.state = snapshot;
    }
    result
  }

  fn lower_chain(&mut self, conditional: Conditional, scope: &RuleScope, sink: &Sink, payload: &Payload) -> Result<(), Failure> {
    let mut chain = Vec::new();
    let mut current = conditional;
    let otherwise = loop {
      chain.push((current.condition, current.consequent));
      match current.alternate {
        Branch::Nested(next) => current = *next,
        other => break other,
      }
    };

    let props: IndexSet<String> = chain
      .iter()
      .map(|(condition, _)| condition.prop().to_string())
      .collect();
    if props.len() > 1 {
      return self.lower_compound(chain, otherwise, props, scope, sink, payload);
    }

    // The unconditional value goes first so buckets are seeded from it.
    if let Payload::Value { .. } = payload {
      self.lower_branch(otherwise, scope, sink, payload)?;
      for (condition, body) in chain {
        let branch_sink = self.branch_sink(sink, condition)?;
        self.lower_branch(body, scope, &branch_sink, payload)?;
      }
      return Ok(());
    }

    let mut else_sink = Some(sink.clone());
    for (condition, body) in chain {
      else_sink = else_sink.and_then(|else_sink| else_sink.with(condition.negate()));
      let branch_sink = self.branch_sink(sink, condition)?;
      self.lower_branch(body, scope, &branch_sink, payload)?;
    }
    if matches!(otherwise, Branch::Empty) {
      return Ok(());
    }
    let else_sink = else_sink.ok_or_else(nested_conditional)?;
    self.lower_branch(otherwise, scope, &else_sink, payload)
  }

  fn branch_sink(&self, sink: &Sink, condition: VariantCondition) -> Result<Sink, Failure> {
    sink.with(condition).ok_or_else(nested_conditional)
  }

  /// A cascade over several props. Branches are tested in order, so they cannot be merged
  /// into per-prop buckets.
  fn lower_compound(
    &mut self,
    chain: Vec<(VariantCondition, Branch)>,
    otherwise: Branch,
    props: IndexSet<String>,
    scope: &RuleScope,
    sink: &Sink,
    payload: &Payload,
  ) -> Result<(), Failure> {
    if *sink != Sink::Base {
      return Err(nested_conditional());
    }

    let conditions: Vec<Vec<String>> = chain
      .iter()
      .map(|(condition, _)| vec![condition.to_string()])
      .collect();
    let existing = self.state.compounds.iter().position(|compound| {
      compound.props.iter().eq(props.iter())
        && compound
          .branches
          .iter()
          .map(|branch| &branch.conditions)
          .eq(conditions.iter())
    });
    let index = match existing {
      Some(index) => index,
      None => {
        let branches = chain
          .iter()
          .zip(conditions)
          .map(|((condition, _), conditions)| CompoundBranch {
            conditions,
            style_key: self
              .file
              .allocator
              .allocate(&format!("{}{}", self.style_key, condition.style_key_suffix())),
          })
          .collect();
        self.state.compounds.push(CompoundVariant {
          props: props.into_iter().collect(),
          branches,
          fallback_style_key: None,
        });
        self.state.compounds.len() - 1
      }
    };

    for (position, (_, body)) in chain.into_iter().enumerate() {
      let key = self.state.compounds[index].branches[position].style_key.clone();
      self.state.compound_styles.entry(key.clone()).or_default();
      self.lower_branch(body, scope, &Sink::Compound(key), payload)?;
    }

    if matches!(otherwise, Branch::Empty) {
      return Ok(());
    }
    let key = match self.state.compounds[index].fallback_style_key.clone() {
      Some(key) => key,
      None => {
        let key = self.file.allocator.allocate(&format!("{}Fallback", self.style_key));
        self.state.compounds[index].fallback_style_key = Some(key.clone());
        key
      }
    };
    self.state.compound_styles.entry(key.clone()).or_default();
    self.lower_branch(otherwise, scope, &Sink::Compound(key), payload)
  }

  fn lower_branch(&mut self, branch: Branch, scope: &RuleScope, sink: &Sink, payload: &Payload) -> Result<(), Failure> {
    match (branch, payload) {
      (Branch::Empty, _) => Ok(()),
      (Branch::Nested(nested), _) => self.lower_chain(*nested, scope, sink, payload),
      (
        Branch::Value(value),
        Payload::Value {
          property,
          key,
          before,
          after,
        },
      ) => {
        let site = self.site.at(&scope.selector, Some(property.as_str()));
        let mut pieces = before.clone();
        pieces.extend(self.evaluate(*value, Some(property.as_str()), &site)?);
        pieces.extend(after.iter().cloned());
        match compose(pieces) {
          Ok(Composed::Static(value)) => {
            self.state.place(sink, key, value, scope);
            Ok(())
          }
          _ => Err(Failure::unlowered(
            DiagnosticCode::UnresolvableBranch,
            format!("branch value for `{property}` is not known at build time"),
          )),
        }
      }
      (Branch::Css(block), Payload::Block) => self.lower_block(&block, scope, sink, Mode::AllOrNothing),
      (Branch::Value(value), Payload::Block) => match *value {
        Classified::Static(text) => self.lower_static_block(&text, scope, sink, Mode::AllOrNothing),
        Classified::Call(call) => self.lower_mixin_call(call, scope, sink),
        _ => Err(Failure::unlowered(
          DiagnosticCode::UnsupportedMixin,
          "branch of a conditional block is neither css nor a style helper",
        )),
      },
      (Branch::Css(_), Payload::Value { property, .. }) => Err(Failure::unlowered(
        DiagnosticCode::UnresolvableBranch,
        format!("css block used as the value of `{property}`"),
      )),
    }
  }

  fn lower_block(&mut self, block: &CssBlock, scope: &RuleScope, sink: &Sink, mode: Mode) -> Result<(), Failure> {
    let rules = parse_template(&block.quasis).map_err(|source| LoweringError::RuleParse {
      component: self.component.clone(),
      source,
    })?;
    check_slots(&rules, block.exprs.len(), &self.component)?;
    let slots = Slots {
      exprs: &block.exprs,
      bindings: &block.bindings,
    };
    self.lower_rules(&rules, scope, sink, slots, mode)
  }

  /// A string used as a block. Text that does not parse as declarations is not CSS.
  fn lower_static_block(&mut self, text: &str, scope: &RuleScope, sink: &Sink, mode: Mode) -> Result<(), Failure> {
    let Ok(rules) = parse_template(&[text.to_string()]) else {
      return Err(Failure::unlowered(
        DiagnosticCode::UnsupportedMixin,
        format!("`{text}` is not a declaration block"),
      ));
    };
    let bindings = PropsBindings::default();
    let slots = Slots {
      exprs: &[],
      bindings: &bindings,
    };
    self.lower_rules(&rules, scope, sink, slots, mode)
  }

  /// A bare interpolation standing in for declarations.
  pub(super) fn lower_mixin(
    &mut self,
    declaration: &CssDeclarationIR,
    scope: &RuleScope,
    sink: &Sink,
    slots: Slots,
    mode: Mode,
  ) -> Result<(), Failure> {
    let Some(slot) = sole_slot(&declaration.value_raw) else {
      return Err(Failure::unlowered(
        DiagnosticCode::UnhandledInterpolation,
        format!("`{}` is not a declaration", declaration.value_raw),
      ));
    };
    let site = self.site.at(&scope.selector, None);

    match self.classify_slot(slot, slots)? {
      Classified::Css(block) => self.lower_block(&block, scope, sink, mode),
      Classified::Conditional(conditional) => self.lower_conditional(conditional, scope, sink, &Payload::Block),
      Classified::Switch(switch) => self.lower_switch(switch, scope, sink, &site),
      Classified::Call(call) => self.lower_mixin_call(call, scope, sink),
      Classified::Static(text) => self.lower_static_block(&text, scope, sink, mode),
      Classified::Rejected { code, reason } => Err(self.file_bail(&site, code, reason)),
      Classified::Unhandled(unhandled) => Err(Failure::Unlowered(unhandled)),
      _ => Err(Failure::unlowered(
        DiagnosticCode::UnsupportedMixin,
        "interpolation used as a declaration block is not a css block",
      )),
    }
  }

  /// Helpers the adapter maps to a full style reference are applied next to the
  /// component's own styles, under the current bucket condition.
  fn lower_mixin_call(&mut self, call: HelperCall, scope: &RuleScope, sink: &Sink) -> Result<(), Failure> {
    let site = self.site.at(&scope.selector, None);
    let HelperCall {
      imported,
      source,
      args,
      ..
    } = call;

    match resolved(self.file.session.resolve_call(&imported, &source, args, None, &site)?)? {
      Some(SessionCall {
        usage: CallUsage::Props,
        expr,
      }) => {
        if !scope.is_root() || !matches!(sink, Sink::Base | Sink::Bucket(_)) {
          return Err(Failure::unlowered(
            DiagnosticCode::UnsupportedMixin,
            format!("style reference `{}` cannot be applied under a selector or at-rule", expr.source),
          ));
        }
        let style_ref = StyleRef {
          expr: expr.source,
          condition: sink.condition(),
        };
        if !self.state.style_refs.contains(&style_ref) {
          self.state.style_refs.push(style_ref);
        }
        Ok(())
      }
      Some(SessionCall {
        usage: CallUsage::Create,
        ..
      }) => Err(Failure::unlowered(
        DiagnosticCode::UnsupportedMixin,
        format!("`{imported}` resolves to a value, not a declaration block"),
      )),
      None => Err(Failure::unlowered(
        DiagnosticCode::UnresolvedCall,
        format!("no mapping for `{imported}` from \"{source}\""),
      )),
    }
  }

  /// A `switch` over one prop becomes a dimension directly. Every case must lower.
  fn lower_switch(
    &mut self,
    switch: SwitchEnumeration,
    scope: &RuleScope,
    sink: &Sink,
    site: &DiagnosticSite,
  ) -> Result<(), Failure> {
    if *sink != Sink::Base {
      return Err(nested_conditional());
    }
    let SwitchEnumeration {
      prop,
      arms,
      default_values,
      default,
    } = switch;

    let mut variants: IndexMap<String, StyleObject> = IndexMap::new();
    for arm in arms {
      let styles = self.lower_detached(&arm.block, scope, site, &prop)?;
      for value in arm.values {
        variants.insert(value, styles.clone());
      }
    }
    let default_styles = self.lower_detached(&default, scope, site, &prop)?;
    for value in default_values {
      variants
        .entry(value)
        .or_insert_with(|| default_styles.clone());
    }

    let info = self.props_type.get(&prop).cloned();
    let members = info
      .as_ref()
      .and_then(|info| info.literal_union.clone())
      .unwrap_or_default();
    let uncovered: Vec<&String> = members
      .iter()
      .filter(|member| !variants.contains_key(*member))
      .collect();
    // An arm such as `case "default":` keeps its own entry.
    let default_name = match uncovered.as_slice() {
      [only] => (*only).clone(),
      _ => fallback_variant_name(|name| {
        variants.contains_key(name) || members.iter().any(|member| member == name)
      }),
    };
    variants.insert(default_name.clone(), default_styles);

    let name = self
      .file
      .allocator
      .allocate(&dimension_name(&self.style_key, &prop, None));
    tracing::debug!(prop = %prop, dimension = %name, "Lowered switch into a dimension");
    self.state.dimensions.push(VariantDimension {
      prop_name: prop,
      variant_object_name: name,
      variants,
      default_value: Some(default_name),
      namespace_boolean_prop: None,
      is_disabled_namespace: false,
      is_optional: info.map_or(true, |info| info.optional),
    });
    Ok(())
  }

  /// Lowers one switch case on its own. A case that cannot be lowered fails the file.
  fn lower_detached(
    &mut self,
    block: &CssBlock,
    scope: &RuleScope,
    site: &DiagnosticSite,
    prop: &str,
  ) -> Result<StyleObject, Failure> {
    let outer = std::mem::take(&mut self.state.detached);
    let result = self.lower_block(block, scope, &Sink::Detached, Mode::AllOrNothing);
    let styles = std::mem::replace(&mut self.state.detached, outer);
    match result {
      Ok(()) => Ok(styles),
      Err(Failure::Unlowered(unhandled)) => Err(self.file_bail(
        site,
        DiagnosticCode::SwitchUnresolvableCase,
        format!("unresolvable switch case over `{prop}`: {}", unhandled.reason),
      )),
      Err(failure) => Err(failure),
    }
  }
}

fn nested_conditional() -> Failure {
  Failure::unlowered(
    DiagnosticCode::UnresolvableBranch,
    "conditional nested inside a compound branch or switch case",
  )
}
