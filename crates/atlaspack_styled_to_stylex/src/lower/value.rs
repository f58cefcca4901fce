use once_cell::sync::Lazy;
use regex::Regex;

use super::*;
use crate::classify::{Classified, Conditional, HelperCall, IndexedFallback, IndexedTheme, LogicalOperator, TemplatePiece};
use crate::resolution::{CallUsage, ResolvedExpr, SessionCall, ValueLookup};

static CSS_VARIABLE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"var\(\s*(--[A-Za-z0-9_-]+)\s*(?:,\s*([^()]*?))?\s*\)").unwrap());

static PLAIN_REFERENCE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*$").unwrap());

/// One piece of a declaration value before classification.
#[derive(Debug)]
pub(super) enum Item {
  Text(String),
  Slot(Classified),
}

/// One evaluated piece of a declaration value.
#[derive(Clone, Debug, PartialEq)]
pub(super) enum Piece {
  Text(String),
  Number(f64),
  /// Build-time expression source.
  Expr(String),
  /// Expression over the style function parameter for `prop`.
  Dynamic { prop: String, expr: String },
}

#[derive(Debug, PartialEq)]
pub(super) enum Composed {
  Static(StyleValue),
  Dynamic { prop: String, value: StyleValue },
}

/// The props a value depends on, when there is more than one.
#[derive(Debug, PartialEq)]
pub(super) struct MultipleDynamicSegments(pub Vec<String>);

/// Splits value items around the first conditional slot.
pub(super) fn split_at_conditional(items: Vec<Item>) -> (Vec<Item>, Option<Conditional>, Vec<Item>) {
  let mut before = Vec::new();
  let mut conditional = None;
  let mut after = Vec::new();
  for item in items {
    match item {
      Item::Slot(Classified::Conditional(found)) if conditional.is_none() => conditional = Some(found),
      item if conditional.is_none() => before.push(item),
      item => after.push(item),
    }
  }
  (before, conditional, after)
}

/// JavaScript string literal for `text`.
pub(super) fn js_string(text: &str) -> String {
  serde_json::Value::from(text).to_string()
}

fn number_text(number: f64) -> String {
  number.to_string()
}

fn escape_template(text: &str) -> String {
  text
    .replace('\\', "\\\\")
    .replace('`', "\\`")
    .replace("${", "\\${")
}

fn merge_text(pieces: Vec<Piece>) -> Vec<Piece> {
  let mut merged: Vec<Piece> = Vec::with_capacity(pieces.len());
  for piece in pieces {
    if let (Some(Piece::Text(last)), Piece::Text(text)) = (merged.last_mut(), &piece) {
      last.push_str(text);
      continue;
    }
    merged.push(piece);
  }
  merged
}

/// Combines evaluated pieces into one style value. Static text and numbers collapse into a
/// single literal; anything else becomes a template literal.
pub(super) fn compose(pieces: Vec<Piece>) -> Result<Composed, MultipleDynamicSegments> {
  let dynamic: Vec<String> = pieces
    .iter()
    .filter_map(|piece| match piece {
      Piece::Dynamic { prop, .. } => Some(prop.clone()),
      _ => None,
    })
    .collect();
  if dynamic.len() > 1 {
    return Err(MultipleDynamicSegments(dynamic));
  }

  let pieces = if pieces.len() > 1 {
    merge_text(
      pieces
        .into_iter()
        .map(|piece| match piece {
          Piece::Number(number) => Piece::Text(number_text(number)),
          piece => piece,
        })
        .collect(),
    )
  } else {
    pieces
  };

  let value = match pieces.as_slice() {
    [] => StyleValue::Literal(String::new()),
    [Piece::Text(text)] => StyleValue::Literal(text.trim().to_string()),
    [Piece::Number(number)] => StyleValue::Number(*number),
    [Piece::Expr(expr)] | [Piece::Dynamic { expr, .. }] => StyleValue::Expr(expr.clone()),
    pieces => {
      let mut template = String::from("`");
      for piece in pieces {
        match piece {
          Piece::Text(text) => template.push_str(&escape_template(text)),
          Piece::Number(number) => template.push_str(&number_text(*number)),
          Piece::Expr(expr) | Piece::Dynamic { expr, .. } => {
            template.push_str("${");
            template.push_str(expr);
            template.push('}');
          }
        }
      }
      template.push('`');
      StyleValue::Expr(template)
    }
  };

  Ok(match dynamic.into_iter().next() {
    Some(prop) => Composed::Dynamic { prop, value },
    None => Composed::Static(value),
  })
}

/// Expression source of a composed value.
fn value_source(value: &StyleValue) -> String {
  match value {
    StyleValue::Literal(text) => js_string(text),
    StyleValue::Number(number) => number_text(*number),
    StyleValue::Expr(expr) => expr.clone(),
    _ => "null".to_string(),
  }
}

/// Parenthesizes anything that is not a plain member chain.
fn operand(source: &str) -> String {
  if PLAIN_REFERENCE.is_match(source) {
    source.to_string()
  } else {
    format!("({source})")
  }
}

fn piece_of(expr: ResolvedExpr) -> Piece {
  match expr.value {
    StyleValue::Literal(text) => Piece::Text(text),
    StyleValue::Number(number) => Piece::Number(number),
    _ => Piece::Expr(expr.source),
  }
}

impl DeclLowering<'_, '_, '_> {
  pub(super) fn evaluate_items(
    &mut self,
    items: Vec<Item>,
    property: Option<&str>,
    site: &DiagnosticSite,
  ) -> Result<Vec<Piece>, Failure> {
    let mut pieces = Vec::new();
    for item in items {
      match item {
        Item::Text(text) => pieces.extend(self.expand_text(&text, property, site)?),
        Item::Slot(classified) => pieces.extend(self.evaluate(classified, property, site)?),
      }
    }
    Ok(pieces)
  }

  /// Pieces distributed into both sides of a conditional; they may not read props.
  pub(super) fn static_pieces(
    &mut self,
    items: Vec<Item>,
    property: &str,
    site: &DiagnosticSite,
  ) -> Result<Vec<Piece>, Failure> {
    let pieces = self.evaluate_items(items, Some(property), site)?;
    if let Some(Piece::Dynamic { prop, .. }) = pieces.iter().find(|piece| matches!(piece, Piece::Dynamic { .. })) {
      return Err(Failure::unlowered(
        DiagnosticCode::UnresolvableBranch,
        format!("text around a conditional reads `{prop}`"),
      ));
    }
    Ok(pieces)
  }

  /// Build-time text of an interpolation, if it has one.
  pub(super) fn static_text(
    &mut self,
    classified: Classified,
    property: Option<&str>,
    site: &DiagnosticSite,
  ) -> Result<Option<String>, Failure> {
    let mut text = String::new();
    for piece in self.evaluate(classified, property, site)? {
      match piece {
        Piece::Text(part) => text.push_str(&part),
        Piece::Number(number) => text.push_str(&number_text(number)),
        Piece::Expr(_) | Piece::Dynamic { .. } => return Ok(None),
      }
    }
    Ok(Some(text))
  }

  /// Static CSS text, with `var(--x)` references the adapter maps replaced.
  fn expand_text(&mut self, text: &str, property: Option<&str>, site: &DiagnosticSite) -> Result<Vec<Piece>, Failure> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for captures in CSS_VARIABLE.captures_iter(text) {
      let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
        continue;
      };
      let lookup = ValueLookup::CssVariable {
        name: name.as_str().to_string(),
        fallback: captures.get(2).map(|fallback| fallback.as_str().to_string()),
      };
      let Some(expr) = resolved(self.file.session.resolve_value(lookup, property, site)?)? else {
        continue;
      };
      if whole.start() > last {
        pieces.push(Piece::Text(text[last..whole.start()].to_string()));
      }
      pieces.push(piece_of(expr));
      last = whole.end();
    }
    if last < text.len() || pieces.is_empty() {
      pieces.push(Piece::Text(text[last..].to_string()));
    }
    Ok(pieces)
  }

  pub(super) fn evaluate(
    &mut self,
    classified: Classified,
    property: Option<&str>,
    site: &DiagnosticSite,
  ) -> Result<Vec<Piece>, Failure> {
    match classified {
      Classified::Static(text) => self.expand_text(&text, property, site),
      Classified::Theme { path } => self.lookup(ValueLookup::Theme { path }, property, site),
      Classified::ImportedValue { imported, source, path } => self.lookup(
        ValueLookup::ImportedValue {
          imported,
          source,
          path,
        },
        property,
        site,
      ),
      Classified::Prop { name } => Ok(vec![Piece::Dynamic {
        expr: param_name(&name),
        prop: name,
      }]),
      Classified::IndexedTheme(indexed) => self.indexed_theme(indexed, property, site),
      Classified::LogicalDefault { operator, left, right } => {
        self.logical_default(operator, *left, *right, property, site)
      }
      Classified::Call(call) => self.value_call(call, property, site),
      Classified::Template(template) => {
        let mut pieces = Vec::new();
        for piece in template {
          match piece {
            TemplatePiece::Text(text) => pieces.push(Piece::Text(text)),
            TemplatePiece::Slot(slot) => pieces.extend(self.evaluate(slot, property, site)?),
          }
        }
        Ok(pieces)
      }
      Classified::Rejected { code, reason } => Err(self.file_bail(site, code, reason)),
      Classified::Unhandled(unhandled) => Err(Failure::Unlowered(unhandled)),
      Classified::Conditional(_) => Err(Failure::unlowered(
        DiagnosticCode::UnresolvableBranch,
        "conditional nested inside a composed value",
      )),
      Classified::Switch(_) | Classified::Css(_) => Err(Failure::unlowered(
        DiagnosticCode::UnhandledInterpolation,
        "style block used where a value is expected",
      )),
    }
  }

  fn lookup(&mut self, lookup: ValueLookup, property: Option<&str>, site: &DiagnosticSite) -> Result<Vec<Piece>, Failure> {
    let described = lookup.to_string();
    match resolved(self.file.session.resolve_value(lookup, property, site)?)? {
      Some(expr) => Ok(vec![piece_of(expr)]),
      None => Err(Failure::unlowered(
        DiagnosticCode::ThemeUnresolved,
        format!("no mapping for `{described}`"),
      )),
    }
  }

  /// `theme.<path>[p.<prop>]` becomes a lookup on the resolved table, keyed by the style
  /// function parameter.
  fn indexed_theme(
    &mut self,
    indexed: IndexedTheme,
    property: Option<&str>,
    site: &DiagnosticSite,
  ) -> Result<Vec<Piece>, Failure> {
    let IndexedTheme { path, prop, fallback } = indexed;
    let Some(table) = resolved(self.file.session.resolve_value(
      ValueLookup::Theme { path: path.clone() },
      property,
      site,
    )?)?
    else {
      return Err(Failure::unlowered(
        DiagnosticCode::ThemeUnresolved,
        format!("no mapping for `theme.{path}`"),
      ));
    };

    let param = param_name(&prop);
    let lookup = format!("{}[{param}]", operand(&table.source));
    let expr = match fallback {
      None => lookup,
      Some(IndexedFallback::Prop(operator)) => format!("{lookup} {} {param}", operator.as_str()),
      Some(IndexedFallback::Static(operator, text)) => {
        format!("{lookup} {} {}", operator.as_str(), js_string(&text))
      }
      Some(IndexedFallback::WhenUnset(text)) => format!("{param} ? {lookup} : {}", js_string(&text)),
    };
    Ok(vec![Piece::Dynamic { prop, expr }])
  }

  fn logical_default(
    &mut self,
    operator: LogicalOperator,
    left: Classified,
    right: Classified,
    property: Option<&str>,
    site: &DiagnosticSite,
  ) -> Result<Vec<Piece>, Failure> {
    let left = self.evaluate(left, property, site)?;
    let right = self.evaluate(right, property, site)?;
    let multiple = |segments: MultipleDynamicSegments| {
      Failure::unlowered(
        DiagnosticCode::MultipleDynamicSegments,
        format!("default value mixes props ({})", segments.0.join(", ")),
      )
    };
    let left = compose(left).map_err(multiple)?;
    let right = compose(right).map_err(multiple)?;

    // A left side known at build time decides the result on its own.
    match (&left, operator) {
      (Composed::Static(StyleValue::Literal(text)), LogicalOperator::Nullish) => {
        return Ok(vec![Piece::Text(text.clone())]);
      }
      (Composed::Static(StyleValue::Literal(text)), LogicalOperator::Or) if !text.is_empty() => {
        return Ok(vec![Piece::Text(text.clone())]);
      }
      (Composed::Static(StyleValue::Number(number)), LogicalOperator::Nullish) => {
        return Ok(vec![Piece::Number(*number)]);
      }
      (Composed::Static(StyleValue::Number(number)), LogicalOperator::Or) if *number != 0.0 => {
        return Ok(vec![Piece::Number(*number)]);
      }
      _ => {}
    }

    let mut props = Vec::new();
    let mut side = |composed: Composed| match composed {
      Composed::Static(value) => value_source(&value),
      Composed::Dynamic { prop, value } => {
        if !props.contains(&prop) {
          props.push(prop);
        }
        value_source(&value)
      }
    };
    let left = operand(&side(left));
    let right = operand(&side(right));
    let expr = format!("{left} {} {right}", operator.as_str());

    match props.as_slice() {
      [] => Ok(vec![Piece::Expr(expr)]),
      [prop] => Ok(vec![Piece::Dynamic {
        prop: prop.clone(),
        expr,
      }]),
      _ => Err(Failure::unlowered(
        DiagnosticCode::MultipleDynamicSegments,
        format!("default value mixes props ({})", props.join(", ")),
      )),
    }
  }

  fn value_call(&mut self, call: HelperCall, property: Option<&str>, site: &DiagnosticSite) -> Result<Vec<Piece>, Failure> {
    let HelperCall {
      imported,
      source,
      args,
      ..
    } = call;
    match resolved(self.file.session.resolve_call(&imported, &source, args, property, site)?)? {
      Some(SessionCall {
        usage: CallUsage::Create,
        expr,
      }) => Ok(vec![piece_of(expr)]),
      Some(SessionCall {
        usage: CallUsage::Props,
        ..
      }) => Err(Failure::unlowered(
        DiagnosticCode::UnresolvedCall,
        format!("`{imported}` resolves to a style reference, not a value"),
      )),
      None => Err(Failure::unlowered(
        DiagnosticCode::UnresolvedCall,
        format!("no mapping for `{imported}` from \"{source}\""),
      )),
    }
  }
}
