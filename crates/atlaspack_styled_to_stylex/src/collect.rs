//! First pass over a module: finds styled declarations and everything the classifier needs
//! to know about the module they live in.

use indexmap::{IndexMap, IndexSet};
use swc_core::common::{Span, Spanned};
use swc_core::ecma::ast::{
  ArrowExpr, BlockStmtOrExpr, CallExpr, Callee, Decl, ExportSpecifier, Expr, Function, ImportDecl,
  ImportSpecifier, Lit, MemberProp, Module, ModuleDecl, ModuleExportName, ModuleItem, ObjectLit, Pat,
  Prop, PropName, PropOrSpread, Stmt, TaggedTpl, TsEntityName, TsKeywordTypeKind, TsLit, TsType,
  TsTypeElement, TsUnionOrIntersectionType, UnaryOp, VarDecl,
};
use swc_core::ecma::visit::{Visit, VisitWith};

use crate::classify::{unwrap_expr, CssBlock, PropsBindings};
use crate::config::LoweringConfig;
use crate::diagnostic::{DiagnosticCode, LoweringError};
use crate::naming::{component_style_key, StyleKeyAllocator};
use crate::rule_parser::parse_template;
use crate::runner::emit_expr;
use crate::styled_decl::{AttrsInfo, PropTypeInfo, PropTypes, ShouldForwardProp, StyledBase, StyledDecl};

#[derive(Clone, Debug, PartialEq)]
pub struct ImportBinding {
  pub source: String,
  /// `default`, `*` or the exported name.
  pub imported: String,
}

/// Module-level facts the classifier consults.
#[derive(Clone, Debug, Default)]
pub struct ModuleScope {
  pub styled_ident: Option<String>,
  pub css_ident: Option<String>,
  pub keyframes_ident: Option<String>,
  /// Local name -> import, for every import that is not the styling library itself.
  pub imports: IndexMap<String, ImportBinding>,
  /// `const GUTTER = "16px"`
  pub constants: IndexMap<String, String>,
  /// `const truncate = css\`...\``
  pub css_helpers: IndexMap<String, CssBlock>,
  /// Local names of styled components.
  pub components: IndexSet<String>,
  /// `type Size = "small" | "large"`
  pub type_aliases: IndexMap<String, Vec<String>>,
  /// Interfaces and type literal aliases, by name.
  pub prop_tables: IndexMap<String, PropTypes>,
}

/// A pattern found while collecting that makes the whole file unmigratable.
#[derive(Clone, Debug, PartialEq)]
pub struct FileBail {
  pub code: DiagnosticCode,
  pub message: String,
  pub span: Span,
}

pub struct Collected {
  pub scope: ModuleScope,
  pub decls: Vec<StyledDecl>,
  pub file_bails: Vec<FileBail>,
  pub allocator: StyleKeyAllocator,
}

struct TagInfo<'a> {
  base: StyledBase,
  attrs: Option<AttrsInfo>,
  should_forward_prop: Option<ShouldForwardProp>,
  props_type: Option<&'a TsType>,
}

#[tracing::instrument(level = "trace", skip_all)]
pub fn collect_styled_decls(module: &Module, config: &LoweringConfig) -> Result<Collected, LoweringError> {
  let mut scope = ModuleScope::default();
  for item in &module.body {
    if let ModuleItem::ModuleDecl(ModuleDecl::Import(import)) = item {
      collect_import(import, config, &mut scope);
    }
  }
  for item in &module.body {
    if let Some(decl) = item_decl(item) {
      collect_types(decl, &mut scope);
    }
  }

  let exported_names = exported_names(module);
  let mut allocator = StyleKeyAllocator::default();
  let mut decls = Vec::new();

  for item in &module.body {
    let exported_decl = matches!(item, ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(_)));
    let Some(Decl::Var(var)) = item_decl(item) else {
      continue;
    };
    for (name, init, span) in declarators(var) {
      if let Some(text) = literal_text(init) {
        scope.constants.insert(name, text);
        continue;
      }
      let Expr::TaggedTpl(tagged) = init else {
        continue;
      };

      if scope.css_ident.as_deref() == Some(tag_root(&tagged.tag).unwrap_or_default())
        && matches!(unwrap_expr(&tagged.tag), Expr::Ident(_))
      {
        scope.css_helpers.insert(
          name,
          CssBlock {
            quasis: raw_quasis(tagged),
            exprs: tagged.tpl.exprs.iter().map(|expr| (**expr).clone()).collect(),
            bindings: PropsBindings::default(),
          },
        );
        continue;
      }

      let Some(styled) = scope.styled_ident.as_deref() else {
        continue;
      };
      let Some(tag) = parse_tag(&tagged.tag, styled) else {
        continue;
      };

      let quasis = raw_quasis(tagged);
      let rules = parse_template(&quasis).map_err(|source| LoweringError::RuleParse {
        component: name.clone(),
        source,
      })?;

      let style_key = allocator.allocate(&component_style_key(&name));
      let mut decl = StyledDecl::new(name.clone(), tag.base, style_key);
      decl.exported = exported_decl || exported_names.contains(&name);
      decl.span = span;
      decl.rules = rules;
      decl.template_expressions = tagged.tpl.exprs.iter().map(|expr| (**expr).clone()).collect();
      decl.attrs_info = tag.attrs;
      decl.should_forward_prop = tag.should_forward_prop;
      decl.props_type = tagged
        .type_params
        .as_ref()
        .and_then(|params| params.params.first())
        .map(|ty| &**ty)
        .or(tag.props_type)
        .map(|ty| prop_types(ty, &scope))
        .unwrap_or_default();

      tracing::debug!(component = %decl.local_name, style_key = %decl.style_key, "Collected styled component");
      scope.components.insert(name);
      decls.push(decl);
    }
  }

  let mut file_bails = Vec::new();
  if let Some(styled) = scope.styled_ident.as_deref() {
    let mut finder = FactoryFinder {
      styled,
      depth: 0,
      found: Vec::new(),
    };
    module.visit_with(&mut finder);
    file_bails.extend(finder.found.into_iter().map(|span| FileBail {
      code: DiagnosticCode::HigherOrderFactory,
      message: "Styled components created inside a function cannot be migrated statically".into(),
      span,
    }));
  }

  Ok(Collected {
    scope,
    decls,
    file_bails,
    allocator,
  })
}

fn collect_import(import: &ImportDecl, config: &LoweringConfig, scope: &mut ModuleScope) {
  if import.type_only {
    return;
  }
  let source = import.src.value.to_string();
  let styling = config.is_styled_source(&source);

  for specifier in &import.specifiers {
    let (local, imported) = match specifier {
      ImportSpecifier::Named(named) => {
        let imported = match &named.imported {
          Some(ModuleExportName::Ident(ident)) => ident.sym.to_string(),
          Some(ModuleExportName::Str(text)) => text.value.to_string(),
          None => named.local.sym.to_string(),
        };
        (named.local.sym.to_string(), imported)
      }
      ImportSpecifier::Default(default) => (default.local.sym.to_string(), "default".to_string()),
      ImportSpecifier::Namespace(namespace) => (namespace.local.sym.to_string(), "*".to_string()),
    };

    if styling {
      match imported.as_str() {
        "default" | "styled" => scope.styled_ident = Some(local),
        "css" => scope.css_ident = Some(local),
        "keyframes" => scope.keyframes_ident = Some(local),
        _ => {}
      }
    } else {
      scope.imports.insert(local, ImportBinding { source: source.clone(), imported });
    }
  }
}

fn item_decl(item: &ModuleItem) -> Option<&Decl> {
  match item {
    ModuleItem::Stmt(Stmt::Decl(decl)) => Some(decl),
    ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => Some(&export.decl),
    _ => None,
  }
}

fn declarators(var: &VarDecl) -> Vec<(String, &Expr, Span)> {
  var
    .decls
    .iter()
    .filter_map(|declarator| {
      let Pat::Ident(name) = &declarator.name else {
        return None;
      };
      let init = declarator.init.as_deref()?;
      Some((name.id.sym.to_string(), unwrap_expr(init), declarator.span))
    })
    .collect()
}

fn exported_names(module: &Module) -> IndexSet<String> {
  let mut names = IndexSet::new();
  for item in &module.body {
    match item {
      ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(named)) if named.src.is_none() => {
        for specifier in &named.specifiers {
          if let ExportSpecifier::Named(named) = specifier {
            if let ModuleExportName::Ident(ident) = &named.orig {
              names.insert(ident.sym.to_string());
            }
          }
        }
      }
      ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(export)) => {
        if let Expr::Ident(ident) = unwrap_expr(&export.expr) {
          names.insert(ident.sym.to_string());
        }
      }
      _ => {}
    }
  }
  names
}

fn literal_text(expr: &Expr) -> Option<String> {
  match expr {
    Expr::Lit(Lit::Str(text)) => Some(text.value.to_string()),
    Expr::Lit(Lit::Num(number)) => Some(number.value.to_string()),
    Expr::Unary(unary) if unary.op == UnaryOp::Minus => match unwrap_expr(&unary.arg) {
      Expr::Lit(Lit::Num(number)) => Some((-number.value).to_string()),
      _ => None,
    },
    Expr::Tpl(tpl) if tpl.exprs.is_empty() => tpl
      .quasis
      .first()
      .map(|quasi| quasi.cooked.as_ref().unwrap_or(&quasi.raw).to_string()),
    _ => None,
  }
}

fn raw_quasis(tagged: &TaggedTpl) -> Vec<String> {
  tagged.tpl.quasis.iter().map(|quasi| quasi.raw.to_string()).collect()
}

/// The identifier a tag expression is ultimately built from.
fn tag_root(tag: &Expr) -> Option<&str> {
  match unwrap_expr(tag) {
    Expr::Ident(ident) => Some(&ident.sym),
    Expr::Member(member) => tag_root(&member.obj),
    Expr::Call(call) => match &call.callee {
      Callee::Expr(callee) => tag_root(callee),
      _ => None,
    },
    _ => None,
  }
}

fn parse_tag<'a>(tag: &'a Expr, styled: &str) -> Option<TagInfo<'a>> {
  match unwrap_expr(tag) {
    Expr::Member(member) => {
      let Expr::Ident(object) = unwrap_expr(&member.obj) else {
        return None;
      };
      let MemberProp::Ident(element) = &member.prop else {
        return None;
      };
      (&*object.sym == styled).then(|| TagInfo {
        base: StyledBase::Intrinsic(element.sym.to_string()),
        attrs: None,
        should_forward_prop: None,
        props_type: None,
      })
    }
    Expr::Call(call) => {
      let Callee::Expr(callee) = &call.callee else {
        return None;
      };
      match unwrap_expr(callee) {
        Expr::Ident(ident) if &*ident.sym == styled => {
          let base = match call.args.first().map(|arg| unwrap_expr(&arg.expr)) {
            Some(Expr::Ident(component)) => StyledBase::Component(component.sym.to_string()),
            Some(Expr::Lit(Lit::Str(element))) => StyledBase::Intrinsic(element.value.to_string()),
            _ => return None,
          };
          Some(TagInfo {
            base,
            attrs: None,
            should_forward_prop: None,
            props_type: None,
          })
        }
        Expr::Member(member) => {
          let MemberProp::Ident(method) = &member.prop else {
            return None;
          };
          let mut info = parse_tag(&member.obj, styled)?;
          match &*method.sym {
            "attrs" => {
              info.attrs = call.args.first().map(|arg| attrs_info(&arg.expr));
              if let Some(type_args) = &call.type_args {
                info.props_type = type_args.params.first().map(|ty| &**ty).or(info.props_type);
              }
            }
            "withConfig" => {
              info.should_forward_prop = call
                .args
                .first()
                .and_then(|arg| match unwrap_expr(&arg.expr) {
                  Expr::Object(object) => should_forward_prop(object),
                  _ => None,
                });
            }
            _ => return None,
          }
          Some(info)
        }
        _ => None,
      }
    }
    _ => None,
  }
}

fn prop_key(name: &PropName) -> Option<String> {
  match name {
    PropName::Ident(ident) => Some(ident.sym.to_string()),
    PropName::Str(text) => Some(text.value.to_string()),
    _ => None,
  }
}

fn attrs_info(arg: &Expr) -> AttrsInfo {
  match unwrap_expr(arg) {
    Expr::Object(object) => {
      let mut info = AttrsInfo::default();
      for prop in &object.props {
        let PropOrSpread::Prop(prop) = prop else {
          continue;
        };
        if let Prop::KeyValue(key_value) = &**prop {
          if let (Some(key), Ok(value)) = (prop_key(&key_value.key), emit_expr(&key_value.value)) {
            info.static_attrs.insert(key, value);
          }
        }
      }
      info
    }
    other => AttrsInfo {
      static_attrs: IndexMap::new(),
      dynamic_source: emit_expr(other).ok(),
    },
  }
}

/// `shouldForwardProp: (prop) => !["a", "b"].includes(prop)` becomes a drop list; any other
/// predicate is kept as source.
fn should_forward_prop(config: &ObjectLit) -> Option<ShouldForwardProp> {
  let value = config.props.iter().find_map(|prop| match prop {
    PropOrSpread::Prop(prop) => match &**prop {
      Prop::KeyValue(key_value) if prop_key(&key_value.key).as_deref() == Some("shouldForwardProp") => {
        Some(&*key_value.value)
      }
      _ => None,
    },
    PropOrSpread::Spread(_) => None,
  })?;

  if let Expr::Arrow(arrow) = unwrap_expr(value) {
    if let Some(props) = dropped_props(arrow) {
      return Some(ShouldForwardProp::DropProps { props });
    }
  }
  emit_expr(value)
    .ok()
    .map(|source| ShouldForwardProp::Source { source })
}

fn dropped_props(arrow: &ArrowExpr) -> Option<Vec<String>> {
  let [Pat::Ident(param)] = arrow.params.as_slice() else {
    return None;
  };
  let BlockStmtOrExpr::Expr(body) = &*arrow.body else {
    return None;
  };
  let Expr::Unary(negation) = unwrap_expr(body) else {
    return None;
  };
  if negation.op != UnaryOp::Bang {
    return None;
  }
  let Expr::Call(CallExpr {
    callee: Callee::Expr(callee),
    args,
    ..
  }) = unwrap_expr(&negation.arg)
  else {
    return None;
  };
  let Expr::Member(member) = unwrap_expr(callee) else {
    return None;
  };
  let (Expr::Array(array), MemberProp::Ident(method)) = (unwrap_expr(&member.obj), &member.prop) else {
    return None;
  };
  let is_param = matches!(
    args.as_slice(),
    [arg] if matches!(unwrap_expr(&arg.expr), Expr::Ident(ident) if ident.sym == param.id.sym)
  );
  if &*method.sym != "includes" || !is_param {
    return None;
  }

  array
    .elems
    .iter()
    .map(|element| match element.as_ref().map(|element| unwrap_expr(&element.expr)) {
      Some(Expr::Lit(Lit::Str(text))) => Some(text.value.to_string()),
      _ => None,
    })
    .collect()
}

fn collect_types(decl: &Decl, scope: &mut ModuleScope) {
  match decl {
    Decl::TsInterface(interface) => {
      let mut table = PropTypes::new();
      for parent in &interface.extends {
        if let Expr::Ident(parent) = unwrap_expr(&parent.expr) {
          if let Some(inherited) = scope.prop_tables.get(&*parent.sym) {
            table.extend(inherited.clone());
          }
        }
      }
      table.extend(members_prop_types(&interface.body.body, scope));
      scope.prop_tables.insert(interface.id.sym.to_string(), table);
    }
    Decl::TsTypeAlias(alias) => {
      let name = alias.id.sym.to_string();
      if let Some(members) = literal_union(&alias.type_ann, scope) {
        scope.type_aliases.insert(name, members);
      } else if matches!(unwrap_type(&alias.type_ann), TsType::TsTypeLit(_) | TsType::TsUnionOrIntersectionType(_)) {
        let table = prop_types(&alias.type_ann, scope);
        scope.prop_tables.insert(name, table);
      }
    }
    _ => {}
  }
}

fn unwrap_type(ty: &TsType) -> &TsType {
  match ty {
    TsType::TsParenthesizedType(paren) => unwrap_type(&paren.type_ann),
    _ => ty,
  }
}

fn prop_types(ty: &TsType, scope: &ModuleScope) -> PropTypes {
  match unwrap_type(ty) {
    TsType::TsTypeLit(literal) => members_prop_types(&literal.members, scope),
    TsType::TsTypeRef(reference) => match &reference.type_name {
      TsEntityName::Ident(ident) => scope.prop_tables.get(&*ident.sym).cloned().unwrap_or_default(),
      _ => PropTypes::new(),
    },
    TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsIntersectionType(intersection)) => {
      let mut table = PropTypes::new();
      for member in &intersection.types {
        table.extend(prop_types(member, scope));
      }
      table
    }
    _ => PropTypes::new(),
  }
}

fn members_prop_types(members: &[TsTypeElement], scope: &ModuleScope) -> PropTypes {
  let mut table = PropTypes::new();
  for member in members {
    let TsTypeElement::TsPropertySignature(signature) = member else {
      continue;
    };
    let name = match &*signature.key {
      Expr::Ident(ident) => ident.sym.to_string(),
      Expr::Lit(Lit::Str(text)) => text.value.to_string(),
      _ => continue,
    };
    let mut info = PropTypeInfo {
      optional: signature.optional,
      ..Default::default()
    };
    if let Some(annotation) = &signature.type_ann {
      let ty = unwrap_type(&annotation.type_ann);
      info.is_boolean = matches!(
        ty,
        TsType::TsKeywordType(keyword) if keyword.kind == TsKeywordTypeKind::TsBooleanKeyword
      );
      info.literal_union = literal_union(ty, scope);
      if let TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(union)) = ty {
        info.optional |= union.types.iter().any(|member| {
          matches!(
            unwrap_type(member),
            TsType::TsKeywordType(keyword) if keyword.kind == TsKeywordTypeKind::TsUndefinedKeyword
          )
        });
      }
    }
    table.insert(name, info);
  }
  table
}

/// Members of a union of string literals. `undefined` members are skipped.
fn literal_union(ty: &TsType, scope: &ModuleScope) -> Option<Vec<String>> {
  match unwrap_type(ty) {
    TsType::TsLitType(literal) => match &literal.lit {
      TsLit::Str(text) => Some(vec![text.value.to_string()]),
      _ => None,
    },
    TsType::TsTypeRef(reference) => match &reference.type_name {
      TsEntityName::Ident(ident) => scope.type_aliases.get(&*ident.sym).cloned(),
      _ => None,
    },
    TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(union)) => {
      let mut members = Vec::new();
      for member in &union.types {
        match unwrap_type(member) {
          TsType::TsKeywordType(keyword) if keyword.kind == TsKeywordTypeKind::TsUndefinedKeyword => {}
          member => members.extend(literal_union(member, scope)?),
        }
      }
      (!members.is_empty()).then_some(members)
    }
    _ => None,
  }
}

/// Finds styled templates created inside functions.
struct FactoryFinder<'a> {
  styled: &'a str,
  depth: usize,
  found: Vec<Span>,
}

impl Visit for FactoryFinder<'_> {
  fn visit_function(&mut self, function: &Function) {
    self.depth += 1;
    function.visit_children_with(self);
    self.depth -= 1;
  }

  fn visit_arrow_expr(&mut self, arrow: &ArrowExpr) {
    self.depth += 1;
    arrow.visit_children_with(self);
    self.depth -= 1;
  }

  fn visit_tagged_tpl(&mut self, tagged: &TaggedTpl) {
    if self.depth > 0 && tag_root(&tagged.tag) == Some(self.styled) {
      self.found.push(tagged.span());
    }
    tagged.visit_children_with(self);
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::*;
  use crate::runner::parse_module;
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  fn collect(code: &str) -> Collected {
    let parsed = parse_module(code, Path::new("Button.tsx")).unwrap();
    collect_styled_decls(&parsed.module, &LoweringConfig::default()).unwrap()
  }

  #[test]
  fn test_collects_styled_declarations() {
    let collected = collect(indoc! {r#"
      import styled, { css } from "styled-components";
      import { tokens } from "./tokens";

      type Size = "small" | "large";
      interface ButtonProps {
        $size?: Size;
        $disabled: boolean;
      }

      const GUTTER = "16px";
      const truncate = css`
        overflow: hidden;
      `;

      export const Button = styled.button<ButtonProps>`
        padding: ${GUTTER};
        ${truncate}
      `;
      const Primary = styled(Button).attrs({ type: "button" })`
        color: ${tokens.primary};
      `;
      export { Primary };
    "#});

    assert_eq!(collected.scope.styled_ident.as_deref(), Some("styled"));
    assert_eq!(collected.scope.css_ident.as_deref(), Some("css"));
    assert_eq!(collected.scope.constants.get("GUTTER").map(String::as_str), Some("16px"));
    assert!(collected.scope.css_helpers.contains_key("truncate"));
    assert!(collected.scope.imports.contains_key("tokens"));
    assert!(collected.file_bails.is_empty());

    let names: Vec<(&str, &str, bool)> = collected
      .decls
      .iter()
      .map(|decl| (decl.local_name.as_str(), decl.style_key.as_str(), decl.exported))
      .collect();
    assert_eq!(names, vec![("Button", "button", true), ("Primary", "primary", true)]);

    let button = &collected.decls[0];
    assert_eq!(button.base, StyledBase::Intrinsic("button".into()));
    assert_eq!(button.template_expressions.len(), 2);
    let size = &button.props_type["$size"];
    assert_eq!(size.literal_union, Some(vec!["small".to_string(), "large".to_string()]));
    assert!(size.optional);
    assert!(button.props_type["$disabled"].is_boolean);

    let primary = &collected.decls[1];
    assert_eq!(primary.extends(), Some("Button"));
    assert_eq!(
      primary.attrs_info.as_ref().map(|attrs| attrs.static_attrs.clone()),
      Some(IndexMap::from([("type".to_string(), "\"button\"".to_string())]))
    );
  }

  #[test]
  fn test_should_forward_prop_drop_list() {
    let collected = collect(indoc! {r#"
      import styled from "styled-components";
      const Box = styled.div.withConfig({
        shouldForwardProp: (prop) => !["$gap", "$align"].includes(prop),
      })`
        display: flex;
      `;
    "#});

    assert_eq!(
      collected.decls[0].should_forward_prop,
      Some(ShouldForwardProp::DropProps {
        props: vec!["$gap".into(), "$align".into()]
      })
    );
  }

  #[test]
  fn test_higher_order_factory_bails() {
    let collected = collect(indoc! {r#"
      import styled from "styled-components";
      export const withSpacing = (Component) => styled(Component)`
        margin: 8px;
      `;
    "#});

    assert!(collected.decls.is_empty());
    assert_eq!(collected.file_bails.len(), 1);
    assert_eq!(collected.file_bails[0].code, DiagnosticCode::HigherOrderFactory);
  }

  #[test]
  fn test_style_keys_are_unique() {
    let collected = collect(indoc! {r#"
      import styled from "styled-components";
      const Title = styled.h1`margin: 0;`;
      const title = styled.h2`margin: 0;`;
    "#});

    let keys: Vec<&str> = collected.decls.iter().map(|decl| decl.style_key.as_str()).collect();
    assert_eq!(keys, vec!["title", "title2"]);
  }
}
