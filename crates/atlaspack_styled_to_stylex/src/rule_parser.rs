//! Turns the text of a styled template into a flat list of [`CssRuleIR`].
//!
//! Interpolations are replaced by `__SLOT_<id>__` placeholders before parsing, so the
//! parser only ever sees CSS text. Nesting is resolved the way styled-components does it:
//! `&` refers to the enclosing selector and at-rules wrap whatever is inside them.

use crate::css_ir::{slot_ids_in, slot_placeholder, sole_slot, CssDeclarationIR, CssRuleIR, CssValue, ValuePart};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RuleParseError {
  #[error("Unclosed block in styled template")]
  UnclosedBlock,
  #[error("Unexpected `}}` at offset {offset} in styled template")]
  UnexpectedClose { offset: usize },
  #[error("Expected `property: value` but found `{statement}`")]
  MissingColon { statement: String },
}

/// Parsed but not yet flattened template content.
#[derive(Clone, Debug, PartialEq)]
enum CssNode {
  Declaration(CssDeclarationIR),
  Block {
    prelude: String,
    children: Vec<CssNode>,
  },
}

/// Parse the raw quasis of a template literal. Slot `i` sits between `quasis[i]` and
/// `quasis[i + 1]`.
pub fn parse_template(quasis: &[String]) -> Result<Vec<CssRuleIR>, RuleParseError> {
  let css = strip_comments(&join_quasis(quasis));
  let (nodes, _) = parse_nodes(&css, 0, false)?;
  let mut rules = Vec::new();
  flatten(&nodes, "&", &[], &mut rules);
  Ok(rules)
}

/// Joins quasis with placeholders. A slot standing alone on its line is a statement of its
/// own (usually a mixin), so it gets a terminating `;` when the author left it out.
fn join_quasis(quasis: &[String]) -> String {
  let mut out = String::new();
  for (index, quasi) in quasis.iter().enumerate() {
    out.push_str(quasi);
    if index + 1 >= quasis.len() {
      break;
    }

    let line_start = out
      .rfind(|c| matches!(c, '\n' | '{' | ';' | '}'))
      .map(|i| i + 1)
      .unwrap_or(0);
    let alone_before = out[line_start..].trim().is_empty();
    out.push_str(&slot_placeholder(index));

    let next = &quasis[index + 1];
    let next_line = next.split('\n').next().unwrap_or("");
    let next_trimmed = next_line.trim_start();
    let alone_after = next_trimmed.is_empty() || next_trimmed.starts_with('}');
    if alone_before && alone_after && !next_trimmed.starts_with(';') {
      out.push(';');
    }
  }
  out
}

fn strip_comments(css: &str) -> String {
  let bytes = css.as_bytes();
  let mut out = String::with_capacity(css.len());
  let mut i = 0;
  let mut segment_start = 0;
  let mut in_str: u8 = 0;
  while i < bytes.len() {
    let b = bytes[i];
    if in_str != 0 {
      if b == b'\\' {
        i += 2;
        continue;
      }
      if b == in_str {
        in_str = 0;
      }
      i += 1;
      continue;
    }
    if b == b'"' || b == b'\'' {
      in_str = b;
      i += 1;
      continue;
    }
    if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
      out.push_str(&css[segment_start..i]);
      let end = css[i + 2..].find("*/").map(|p| i + 2 + p + 2).unwrap_or(bytes.len());
      i = end;
      segment_start = end;
      continue;
    }
    i += 1;
  }
  if segment_start < bytes.len() {
    out.push_str(&css[segment_start..]);
  }
  out
}

fn parse_nodes(css: &str, start: usize, nested: bool) -> Result<(Vec<CssNode>, usize), RuleParseError> {
  let bytes = css.as_bytes();
  let mut nodes = Vec::new();
  let mut i = start;
  let mut statement_start = start;
  let mut in_str: u8 = 0;
  let mut paren = 0usize;

  while i < bytes.len() {
    let b = bytes[i];
    if in_str != 0 {
      if b == b'\\' {
        i += 2;
        continue;
      }
      if b == in_str {
        in_str = 0;
      }
      i += 1;
      continue;
    }
    match b {
      b'"' | b'\'' => in_str = b,
      b'(' => paren += 1,
      b')' => paren = paren.saturating_sub(1),
      b';' if paren == 0 => {
        push_statement(&css[statement_start..i], &mut nodes)?;
        statement_start = i + 1;
      }
      b'{' if paren == 0 => {
        let prelude = collapse_whitespace(&css[statement_start..i]);
        let (children, end) = parse_nodes(css, i + 1, true)?;
        nodes.push(CssNode::Block { prelude, children });
        i = end;
        statement_start = end;
        continue;
      }
      b'}' if paren == 0 => {
        if !nested {
          return Err(RuleParseError::UnexpectedClose { offset: i });
        }
        push_statement(&css[statement_start..i], &mut nodes)?;
        return Ok((nodes, i + 1));
      }
      _ => {}
    }
    i += 1;
  }

  if nested {
    return Err(RuleParseError::UnclosedBlock);
  }
  push_statement(&css[statement_start..], &mut nodes)?;
  Ok((nodes, bytes.len()))
}

fn push_statement(text: &str, nodes: &mut Vec<CssNode>) -> Result<(), RuleParseError> {
  let text = text.trim();
  if text.is_empty() {
    return Ok(());
  }

  if let Some(slot) = sole_slot(text) {
    nodes.push(CssNode::Declaration(bare_slot(slot, text)));
    return Ok(());
  }

  let Some(colon) = find_top_level(text, b':') else {
    // Several mixins on one line: `${a} ${b}`
    let ids = slot_ids_in(text);
    let only_slots = !ids.is_empty()
      && ids
        .iter()
        .fold(text.to_string(), |rest, id| rest.replace(&slot_placeholder(*id), ""))
        .trim()
        .is_empty();
    if only_slots {
      for id in ids {
        nodes.push(CssNode::Declaration(bare_slot(id, &slot_placeholder(id))));
      }
      return Ok(());
    }
    return Err(RuleParseError::MissingColon {
      statement: text.to_string(),
    });
  };

  let property = text[..colon].trim().to_string();
  let mut value = text[colon + 1..].trim().to_string();
  let important = strip_important(&mut value);
  nodes.push(CssNode::Declaration(CssDeclarationIR {
    property: Some(property),
    value: CssValue::from_raw(&value),
    value_raw: value,
    important,
  }));
  Ok(())
}

fn bare_slot(slot: usize, raw: &str) -> CssDeclarationIR {
  CssDeclarationIR {
    property: None,
    value: CssValue::Interpolated(vec![ValuePart::Slot(slot)]),
    value_raw: raw.trim().to_string(),
    important: false,
  }
}

fn strip_important(value: &mut String) -> bool {
  let lower = value.to_ascii_lowercase();
  let Some(bang) = lower.rfind('!') else {
    return false;
  };
  if lower[bang + 1..].trim() != "important" {
    return false;
  }
  value.truncate(bang);
  let trimmed = value.trim_end().len();
  value.truncate(trimmed);
  true
}

fn find_top_level(text: &str, needle: u8) -> Option<usize> {
  let bytes = text.as_bytes();
  let mut in_str: u8 = 0;
  let mut paren = 0usize;
  let mut i = 0;
  while i < bytes.len() {
    let b = bytes[i];
    if in_str != 0 {
      if b == b'\\' {
        i += 2;
        continue;
      }
      if b == in_str {
        in_str = 0;
      }
    } else if b == b'"' || b == b'\'' {
      in_str = b;
    } else if b == b'(' {
      paren += 1;
    } else if b == b')' {
      paren = paren.saturating_sub(1);
    } else if b == needle && paren == 0 {
      return Some(i);
    }
    i += 1;
  }
  None
}

fn split_top_level_commas(text: &str) -> Vec<String> {
  let mut parts = Vec::new();
  let mut rest = text;
  while let Some(comma) = find_top_level(rest, b',') {
    parts.push(rest[..comma].trim().to_string());
    rest = &rest[comma + 1..];
  }
  parts.push(rest.trim().to_string());
  parts.into_iter().filter(|part| !part.is_empty()).collect()
}

fn collapse_whitespace(text: &str) -> String {
  text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a nested selector against its parent, expanding comma lists.
pub fn resolve_selector(parent: &str, child: &str) -> String {
  let parents = split_top_level_commas(parent);
  let children = split_top_level_commas(child);
  let mut resolved = Vec::with_capacity(parents.len() * children.len());
  for parent in &parents {
    for child in &children {
      if child.contains('&') {
        resolved.push(child.replace('&', parent));
      } else {
        resolved.push(format!("{parent} {child}"));
      }
    }
  }
  collapse_whitespace(&resolved.join(", "))
}

fn flatten(nodes: &[CssNode], selector: &str, at_rules: &[String], out: &mut Vec<CssRuleIR>) {
  let mut pending: Vec<CssDeclarationIR> = Vec::new();
  for node in nodes {
    match node {
      CssNode::Declaration(declaration) => pending.push(declaration.clone()),
      CssNode::Block { prelude, children } => {
        flush(&mut pending, selector, at_rules, out);
        if prelude.starts_with('@') {
          let mut stack = at_rules.to_vec();
          stack.push(prelude.clone());
          flatten(children, selector, &stack, out);
        } else {
          flatten(children, &resolve_selector(selector, prelude), at_rules, out);
        }
      }
    }
  }
  flush(&mut pending, selector, at_rules, out);
}

fn flush(pending: &mut Vec<CssDeclarationIR>, selector: &str, at_rules: &[String], out: &mut Vec<CssRuleIR>) {
  if pending.is_empty() {
    return;
  }
  out.push(CssRuleIR {
    selector: selector.to_string(),
    at_rule_stack: at_rules.to_vec(),
    declarations: std::mem::take(pending),
  });
}
