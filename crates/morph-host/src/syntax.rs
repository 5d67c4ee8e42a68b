//! Syntax-tree helpers over the TypeScript grammar
//!
//! Small traversal utilities shared by the host and the migrators. All of
//! them skip `comment` nodes where children are enumerated, since comments
//! are extras that may appear between any two tokens.

use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::HostError;

/// Node kinds that name a symbol
pub const IDENTIFIER_KINDS: &[&str] = &[
    "identifier",
    "type_identifier",
    "shorthand_property_identifier",
    "shorthand_property_identifier_pattern",
];

/// The TypeScript grammar
#[inline]
#[must_use]
pub fn language() -> Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

/// Create a parser for TypeScript
///
/// # Errors
///
/// Returns [`HostError::ParserInit`] when the grammar version is not
/// supported by the linked tree-sitter runtime.
pub fn parser() -> Result<Parser, HostError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language())
        .map_err(|e| HostError::ParserInit(e.to_string()))?;
    Ok(parser)
}

/// Parse TypeScript source text
///
/// # Errors
///
/// Returns an error when the parser cannot be created or yields no tree.
pub fn parse(path: &std::path::Path, text: &str) -> Result<Tree, HostError> {
    parser()?
        .parse(text, None)
        .ok_or_else(|| HostError::ParseFailed(path.to_path_buf()))
}

/// Whether a node kind names a symbol
#[inline]
#[must_use]
pub fn is_identifier_like(kind: &str) -> bool {
    IDENTIFIER_KINDS.contains(&kind)
}

/// All nodes below `node` (inclusive), pre-order
#[must_use]
pub fn descendants(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        out.push(current);
        let mut cursor = current.walk();
        let children: Vec<_> = current.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

/// Direct children, comments excluded
#[must_use]
pub fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let out = node
        .children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    out
}

/// Direct named children, comments excluded
#[must_use]
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let out = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    out
}

/// Every child stored under a field name, comments excluded
#[must_use]
pub fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let out = node
        .children_by_field_name(field, &mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    out
}

/// First direct child of a kind
#[must_use]
pub fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// Nearest ancestor (exclusive) of a kind
#[must_use]
pub fn first_ancestor<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == kind {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}

/// Whether `node` lies inside an ancestor of `kind`
#[inline]
#[must_use]
pub fn is_inside(node: Node<'_>, kind: &str) -> bool {
    first_ancestor(node, kind).is_some()
}

/// Walk up through nested union types to the outermost one
#[must_use]
pub fn outermost_union(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if parent.kind() == "union_type" {
            current = parent;
        } else {
            break;
        }
    }
    current
}

/// Members of a union type in source order
///
/// The grammar nests unions to the left, `a | b | c` is
/// `union(union(a, b), c)`; this flattens them.
#[must_use]
pub fn flatten_union(node: Node<'_>) -> Vec<Node<'_>> {
    if node.kind() != "union_type" {
        return vec![node];
    }
    named_children(node)
        .into_iter()
        .flat_map(flatten_union)
        .collect()
}

/// Arguments of a call or `new` expression
#[must_use]
pub fn call_arguments(call: Node<'_>) -> Vec<Node<'_>> {
    call.child_by_field_name("arguments")
        .map(named_children)
        .unwrap_or_default()
}

/// The `<...>` type argument list of a call, if any
#[must_use]
pub fn type_arguments(call: Node<'_>) -> Option<Node<'_>> {
    call.child_by_field_name("type_arguments")
        .or_else(|| child_of_kind(call, "type_arguments"))
}

/// Decorators attached to a class member
///
/// Field definitions carry their decorators as children, methods have them
/// as preceding siblings in the class body.
#[must_use]
pub fn decorators_of(member: Node<'_>) -> Vec<Node<'_>> {
    let mut found: Vec<_> = children(member)
        .into_iter()
        .filter(|child| child.kind() == "decorator")
        .collect();
    let mut preceding = Vec::new();
    let mut sibling = member.prev_sibling();
    while let Some(node) = sibling {
        match node.kind() {
            "decorator" => preceding.push(node),
            "comment" => {}
            _ => break,
        }
        sibling = node.prev_sibling();
    }
    preceding.reverse();
    preceding.append(&mut found);
    preceding
}

/// Name of a decorator: `Effect` for both `@Effect` and `@Effect(...)`
#[must_use]
pub fn decorator_name<'s>(decorator: Node<'_>, source: &'s str) -> Option<&'s str> {
    let expr = named_children(decorator).into_iter().next()?;
    let target = match expr.kind() {
        "call_expression" => expr.child_by_field_name("function")?,
        _ => expr,
    };
    Some(&source[target.byte_range()])
}

/// Last dotted segment of an expression's text: `A.B.C` gives `C`
#[inline]
#[must_use]
pub fn last_segment(text: &str) -> &str {
    text.rsplit('.').next().unwrap_or(text).trim()
}
