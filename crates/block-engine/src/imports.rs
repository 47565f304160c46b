use crate::grammar::{self, kind, SyntaxTree};
use crate::parser::TopLevelNode;
use crate::types::{Block, Diagnostic, DiagnosticKind, Outcome, TopLevelKind};
use std::collections::HashSet;

/// Canonical single-line text of an import statement
pub type ImportStatement = String;

/// Collect import statements across blocks.
///
/// Blocks are scanned in order, imports within a block in textual order;
/// the first occurrence of each canonical statement wins. A block that does
/// not parse contributes nothing.
pub fn extract_imports<'a, I>(blocks: I) -> Outcome<Vec<ImportStatement>>
where
    I: IntoIterator<Item = &'a Block>,
{
    let mut outcome = Outcome::clean(Vec::new());
    let mut seen = HashSet::new();

    for block in blocks {
        let tree = match SyntaxTree::parse(&block.source) {
            Ok(tree) => tree,
            Err(err) => {
                outcome.push(
                    Diagnostic::new(
                        DiagnosticKind::Extraction,
                        format!("imports skipped: {err}"),
                    )
                    .for_block(&block.name),
                );
                continue;
            }
        };

        for statement in block_imports(&tree) {
            if seen.insert(statement.clone()) {
                outcome.value.push(statement);
            }
        }
    }

    log::debug!("Collected {} unique imports", outcome.value.len());
    outcome
}

/// Canonical imports declared at the top level of one parsed block
pub fn block_imports(tree: &SyntaxTree) -> Vec<ImportStatement> {
    tree.top_level()
        .iter()
        .filter(|node| node.kind() == TopLevelKind::Import)
        .filter_map(canonical_import)
        .collect()
}

/// Render an import on one line: no parentheses, comments, continuations or
/// trailing commas, single spaces, dotted names joined tightly.
pub fn canonical_import(node: &TopLevelNode<'_>) -> Option<ImportStatement> {
    let syntax = node.syntax_node();
    if !matches!(
        syntax.kind(),
        kind::IMPORT | kind::IMPORT_FROM | kind::FUTURE_IMPORT
    ) {
        return None;
    }

    let source = node.text();
    let offset = syntax.start_byte();
    let mut tokens: Vec<&str> = grammar::leaf_tokens(syntax)
        .into_iter()
        .filter(|token| {
            !matches!(
                token.kind(),
                kind::COMMENT | kind::LINE_CONTINUATION | "(" | ")"
            )
        })
        .map(|token| &source[token.start_byte() - offset..token.end_byte() - offset])
        .collect();

    if tokens.last() == Some(&",") {
        tokens.pop();
    }

    let mut line = String::new();
    let mut prev: Option<&str> = None;
    for token in tokens {
        let is_dots = token.chars().all(|c| c == '.');
        let tight = match prev {
            None => true,
            Some(_) if token == "," => true,
            Some(p) if p.chars().all(|c| c == '.') => token != "import",
            Some(p) => is_dots && p != "from",
        };
        if !tight {
            line.push(' ');
        }
        line.push_str(token);
        prev = Some(token);
    }

    (!line.is_empty()).then_some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockCollection;
    use pretty_assertions::assert_eq;

    fn collection(items: &[(&str, &str)]) -> BlockCollection {
        items
            .iter()
            .map(|(name, source)| Block::new(*name, *source))
            .collect()
    }

    fn canonical(source: &str) -> Vec<String> {
        block_imports(&SyntaxTree::parse(source).unwrap())
    }

    #[test]
    fn test_dedup_in_first_seen_order() {
        let blocks = collection(&[
            ("A", "import os\nimport sys"),
            ("B", "import sys\nimport json"),
        ]);
        let outcome = extract_imports(&blocks);

        assert!(outcome.is_clean());
        assert_eq!(outcome.value, ["import os", "import sys", "import json"]);
    }

    #[test]
    fn test_canonical_forms() {
        assert_eq!(canonical("import  os.path  as  p"), ["import os.path as p"]);
        assert_eq!(
            canonical("from collections import (\n    OrderedDict,  # ordered\n    defaultdict,\n)\n"),
            ["from collections import OrderedDict, defaultdict"]
        );
        assert_eq!(canonical("from . import sibling"), ["from . import sibling"]);
        assert_eq!(canonical("from ..pkg.mod import *"), ["from ..pkg.mod import *"]);
        assert_eq!(
            canonical("from __future__ import annotations"),
            ["from __future__ import annotations"]
        );
        assert_eq!(canonical("import a, b as c"), ["import a, b as c"]);
    }

    #[test]
    fn test_equivalent_spellings_dedup() {
        let blocks = collection(&[
            ("one", "from os import (path,\n    sep)\n\ndef one():\n    pass\n"),
            ("two", "from os import path, sep\n\ndef two():\n    pass\n"),
        ]);
        assert_eq!(extract_imports(&blocks).value, ["from os import path, sep"]);
    }

    #[test]
    fn test_only_top_level_imports_are_collected() {
        let blocks = collection(&[("f", "def f():\n    import re\n    return re\n")]);
        assert!(extract_imports(&blocks).value.is_empty());
    }

    #[test]
    fn test_unparseable_block_is_isolated() {
        let blocks = collection(&[
            ("good", "import os\n\ndef good():\n    pass\n"),
            ("bad", "import json\ndef bad(:\n"),
            ("also_good", "import sys\n\ndef also_good():\n    pass\n"),
        ]);
        let outcome = extract_imports(&blocks);

        assert_eq!(outcome.value, ["import os", "import sys"]);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Extraction);
        assert_eq!(outcome.diagnostics[0].block.as_deref(), Some("bad"));
    }
}
