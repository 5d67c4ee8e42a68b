//! Source units
//!
//! A [`SourceUnit`] owns one file's text and its syntax tree. Every applied
//! edit batch reparses the unit, so nodes obtained before [`SourceUnit::apply`]
//! must not be reused afterwards; the borrow checker enforces this since
//! nodes borrow the unit.

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tree_sitter::{Node, Tree};

use crate::edit::{apply_edits, TextEdit};
use crate::error::HostError;
use crate::imports::{ImportDecl, ReExport};
use crate::syntax;

/// Kind of a top-level declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    /// `enum X {}`
    Enum,
    /// `class X {}`
    Class,
    /// `type X = ...`
    TypeAlias,
    /// `function x() {}`
    Function,
    /// `interface X {}`
    Interface,
    /// `const x = ...` and friends
    Variable,
}

impl DeclarationKind {
    fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "enum_declaration" => Some(Self::Enum),
            "class_declaration" | "abstract_class_declaration" => Some(Self::Class),
            "type_alias_declaration" => Some(Self::TypeAlias),
            "function_declaration" | "generator_function_declaration" => Some(Self::Function),
            "interface_declaration" => Some(Self::Interface),
            "lexical_declaration" | "variable_declaration" => Some(Self::Variable),
            _ => None,
        }
    }
}

/// A top-level declaration of a unit
#[derive(Debug, Clone, Copy)]
pub struct Declaration<'t> {
    /// What is declared
    pub kind: DeclarationKind,
    /// The declaration node (`class_declaration`, `variable_declarator`, ...)
    pub node: Node<'t>,
    /// The enclosing top-level statement (`export_statement` when exported)
    pub statement: Node<'t>,
    /// Whether the statement exports the name
    pub exported: bool,
}

/// One parsed TypeScript file
pub struct SourceUnit {
    path: PathBuf,
    text: String,
    tree: Tree,
    loaded_hash: blake3::Hash,
    persisted_hash: blake3::Hash,
}

impl fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceUnit")
            .field("path", &self.path)
            .field("len", &self.text.len())
            .field("changed", &self.is_changed())
            .finish_non_exhaustive()
    }
}

impl SourceUnit {
    /// Parse a unit from text
    ///
    /// # Errors
    ///
    /// Returns an error when the parser cannot produce a tree.
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self, HostError> {
        let path = path.into();
        let text = text.into();
        let tree = syntax::parse(&path, &text)?;
        if tree.root_node().has_error() {
            tracing::debug!(path = %path.display(), "unit parsed with syntax errors");
        }
        let hash = blake3::hash(text.as_bytes());
        Ok(Self {
            path,
            text,
            tree,
            loaded_hash: hash,
            persisted_hash: hash,
        })
    }

    /// Read and parse a unit from disk
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Io`] when the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let text = std::fs::read_to_string(path).map_err(|e| HostError::io(path, e))?;
        Self::parse(path, text)
    }

    /// Unit path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current text
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Current syntax tree
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Root `program` node
    #[inline]
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text of a node
    #[inline]
    #[must_use]
    pub fn text_of(&self, node: Node<'_>) -> &str {
        &self.text[node.byte_range()]
    }

    /// Source text of a byte range
    #[inline]
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> &str {
        &self.text[range]
    }

    /// Smallest named node spanning a byte range
    #[must_use]
    pub fn node_at(&self, range: Range<usize>) -> Option<Node<'_>> {
        self.root()
            .named_descendant_for_byte_range(range.start, range.end)
    }

    /// File name without directories
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// 1-based line of a byte offset
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        let end = offset.min(self.text.len());
        self.text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
    }

    /// Whether the tree contains syntax errors
    #[inline]
    #[must_use]
    pub fn has_syntax_errors(&self) -> bool {
        self.root().has_error()
    }

    /// Apply an edit batch and reparse
    ///
    /// Returns the number of edits applied. An empty batch leaves the unit
    /// untouched.
    ///
    /// # Errors
    ///
    /// Fails on overlapping or out-of-range edits, leaving the unit unchanged.
    pub fn apply(&mut self, edits: Vec<TextEdit>) -> Result<usize, HostError> {
        if edits.is_empty() {
            return Ok(0);
        }
        let count = edits.len();
        let text = apply_edits(&self.path, &self.text, edits)?;
        self.replace_text(text)?;
        Ok(count)
    }

    /// Replace the whole text and reparse
    ///
    /// # Errors
    ///
    /// Fails when the parser yields no tree.
    pub fn replace_text(&mut self, text: String) -> Result<(), HostError> {
        let tree = syntax::parse(&self.path, &text)?;
        self.text = text;
        self.tree = tree;
        Ok(())
    }

    /// Whether the text differs from what was loaded
    #[must_use]
    pub fn is_changed(&self) -> bool {
        blake3::hash(self.text.as_bytes()) != self.loaded_hash
    }

    /// Whether the text differs from what was last written
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        blake3::hash(self.text.as_bytes()) != self.persisted_hash
    }

    /// Record the current text as persisted
    pub fn mark_persisted(&mut self) {
        self.persisted_hash = blake3::hash(self.text.as_bytes());
    }

    /// Top-level declarations in source order
    #[must_use]
    pub fn declarations(&self) -> Vec<Declaration<'_>> {
        let mut out = Vec::new();
        for statement in syntax::named_children(self.root()) {
            let (inner, exported) = if statement.kind() == "export_statement" {
                match statement.child_by_field_name("declaration") {
                    Some(decl) => (decl, true),
                    None => continue,
                }
            } else {
                (statement, false)
            };
            let Some(kind) = DeclarationKind::from_node_kind(inner.kind()) else {
                continue;
            };
            if kind == DeclarationKind::Variable {
                for declarator in syntax::named_children(inner) {
                    if declarator.kind() == "variable_declarator" {
                        out.push(Declaration {
                            kind,
                            node: declarator,
                            statement,
                            exported,
                        });
                    }
                }
            } else {
                out.push(Declaration {
                    kind,
                    node: inner,
                    statement,
                    exported,
                });
            }
        }
        out
    }

    /// Declared name of a declaration
    #[must_use]
    pub fn name_of(&self, declaration: &Declaration<'_>) -> Option<&str> {
        declaration
            .node
            .child_by_field_name("name")
            .map(|name| self.text_of(name))
    }

    /// Top-level declarations of one kind
    #[must_use]
    pub fn declarations_of(&self, kind: DeclarationKind) -> Vec<Declaration<'_>> {
        self.declarations()
            .into_iter()
            .filter(|decl| decl.kind == kind)
            .collect()
    }

    /// Find a top-level declaration by name
    #[must_use]
    pub fn declaration(&self, name: &str) -> Option<Declaration<'_>> {
        self.declarations()
            .into_iter()
            .find(|decl| self.name_of(decl) == Some(name))
    }

    /// Names exported by this unit's own declarations and local export lists
    #[must_use]
    pub fn exported_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .declarations()
            .iter()
            .filter(|decl| decl.exported)
            .filter_map(|decl| self.name_of(decl).map(str::to_string))
            .collect();
        for statement in syntax::named_children(self.root()) {
            if statement.kind() != "export_statement"
                || statement.child_by_field_name("source").is_some()
            {
                continue;
            }
            if let Some(clause) = syntax::child_of_kind(statement, "export_clause") {
                for spec in syntax::named_children(clause) {
                    let exported = spec
                        .child_by_field_name("alias")
                        .or_else(|| spec.child_by_field_name("name"));
                    if let Some(name) = exported {
                        names.push(self.text_of(name).to_string());
                    }
                }
            }
        }
        names
    }

    /// Import statements in source order
    #[must_use]
    pub fn imports(&self) -> Vec<ImportDecl> {
        syntax::named_children(self.root())
            .into_iter()
            .filter(|node| node.kind() == "import_statement")
            .filter_map(|node| ImportDecl::from_node(node, &self.text))
            .collect()
    }

    /// `export ... from` statements in source order
    #[must_use]
    pub fn re_exports(&self) -> Vec<ReExport> {
        syntax::named_children(self.root())
            .into_iter()
            .filter(|node| node.kind() == "export_statement")
            .filter_map(|node| ReExport::from_node(node, &self.text))
            .collect()
    }

    /// The comment directly above a node, if nothing but whitespace separates them
    #[must_use]
    pub fn leading_comment<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        let previous = node.prev_sibling()?;
        if previous.kind() != "comment" {
            return None;
        }
        let gap = &self.text[previous.end_byte()..node.start_byte()];
        let newlines = gap.chars().filter(|&c| c == '\n').count();
        (gap.trim().is_empty() && newlines <= 1).then_some(previous)
    }

    /// The `/** */` doc comment directly above a node
    #[must_use]
    pub fn leading_doc<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        self.leading_comment(node)
            .filter(|comment| self.text_of(*comment).starts_with("/**"))
    }

    /// Start offset of a statement including its doc comment
    #[must_use]
    pub fn start_with_doc(&self, statement: Node<'_>) -> usize {
        self.leading_doc(statement)
            .map_or(statement.start_byte(), |doc| doc.start_byte())
    }

    /// Range removing a statement cleanly
    ///
    /// Covers the doc comment, the indentation before it and the rest of the
    /// last line including its newline.
    #[must_use]
    pub fn removal_range(&self, statement: Node<'_>) -> Range<usize> {
        self.removal_range_of(self.start_with_doc(statement)..statement.end_byte())
    }

    /// Widen a range to its indentation and the end of its last line
    #[must_use]
    pub fn removal_range_of(&self, range: Range<usize>) -> Range<usize> {
        let bytes = self.text.as_bytes();
        let mut start = range.start;
        while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
            start -= 1;
        }
        let mut end = range.end;
        while end < bytes.len() && matches!(bytes[end], b' ' | b'\t' | b';') {
            end += 1;
        }
        if end < bytes.len() && bytes[end] == b'\n' {
            end += 1;
        }
        // never leave two blank lines behind
        let blank_before = start == 0 || self.text[..start].ends_with("\n\n");
        if blank_before && end < bytes.len() && bytes[end] == b'\n' {
            end += 1;
        } else if end == bytes.len() && start > 0 && self.text[..start].ends_with("\n\n") {
            start -= 1;
        }
        start..end
    }

    /// Offset right after the last top-level import, or 0
    #[must_use]
    pub fn import_insertion_point(&self) -> usize {
        syntax::named_children(self.root())
            .into_iter()
            .filter(|node| node.kind() == "import_statement")
            .map(|node| node.end_byte())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ACTIONS: &str = r"import { Action } from '@ngrx/store';

export enum ErrorActionTypes {
  TimeoutError = '[Error] Communication Timeout Error',
}

/** raised on timeouts */
export class TimeoutError implements Action {
  readonly type = ErrorActionTypes.TimeoutError;
  constructor(public payload: { error: string }) {}
}

export type ErrorActions = TimeoutError;
";

    #[test]
    fn lists_declarations() {
        let unit = SourceUnit::parse("error.actions.ts", ACTIONS).unwrap();
        let kinds: Vec<_> = unit.declarations().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DeclarationKind::Enum,
                DeclarationKind::Class,
                DeclarationKind::TypeAlias
            ]
        );
        assert_eq!(
            unit.exported_names(),
            vec!["ErrorActionTypes", "TimeoutError", "ErrorActions"]
        );
    }

    #[test]
    fn removal_range_takes_doc_comment() {
        let unit = SourceUnit::parse("error.actions.ts", ACTIONS).unwrap();
        let class = unit.declaration("TimeoutError").unwrap();
        let range = unit.removal_range(class.statement);
        let removed = unit.slice(range);
        assert!(removed.starts_with("/** raised on timeouts */"));
        assert!(removed.ends_with("}\n\n"));
    }

    #[test]
    fn removal_at_end_of_file_takes_preceding_blank_line() {
        let unit = SourceUnit::parse("error.actions.ts", ACTIONS).unwrap();
        let alias = unit.declaration("ErrorActions").unwrap();
        let range = unit.removal_range(alias.statement);
        assert_eq!(unit.slice(range), "\nexport type ErrorActions = TimeoutError;\n");
    }

    #[test]
    fn apply_reparses_and_tracks_change() {
        let mut unit = SourceUnit::parse("a.ts", "const a = 1;\n").unwrap();
        assert!(!unit.is_changed());
        unit.apply(vec![TextEdit::replace(10..11, "2")]).unwrap();
        assert_eq!(unit.text(), "const a = 2;\n");
        assert!(unit.is_changed());
        assert!(unit.is_dirty());
        unit.mark_persisted();
        assert!(!unit.is_dirty());
        assert!(unit.declaration("a").is_some());
    }

    #[test]
    fn failed_batch_leaves_unit_untouched() {
        let mut unit = SourceUnit::parse("a.ts", "const a = 1;").unwrap();
        let err = unit
            .apply(vec![TextEdit::replace(0..5, "x"), TextEdit::replace(2..4, "y")])
            .unwrap_err();
        assert!(matches!(err, HostError::OverlappingEdits { .. }));
        assert_eq!(unit.text(), "const a = 1;");
    }

    #[test]
    fn lines_are_one_based() {
        let unit = SourceUnit::parse("a.ts", "a;\nb;\nc;").unwrap();
        assert_eq!(unit.line_of(0), 1);
        assert_eq!(unit.line_of(3), 2);
        assert_eq!(unit.line_of(6), 3);
    }
}
