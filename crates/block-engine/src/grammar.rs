use crate::error::{EngineError, Result};
use tree_sitter::{Node, Parser, Tree};

/// Node kinds of the Python grammar the engine relies on
pub(crate) mod kind {
    pub const MODULE: &str = "module";
    pub const BLOCK: &str = "block";
    pub const FUNCTION: &str = "function_definition";
    pub const CLASS: &str = "class_definition";
    pub const DECORATED: &str = "decorated_definition";
    pub const IMPORT: &str = "import_statement";
    pub const IMPORT_FROM: &str = "import_from_statement";
    pub const FUTURE_IMPORT: &str = "future_import_statement";
    pub const EXPRESSION_STATEMENT: &str = "expression_statement";
    pub const STRING: &str = "string";
    pub const CONCATENATED_STRING: &str = "concatenated_string";
    pub const COMMENT: &str = "comment";
    pub const LINE_CONTINUATION: &str = "line_continuation";
    pub const PRINT_STATEMENT: &str = "print_statement";
    pub const EXEC_STATEMENT: &str = "exec_statement";
}

/// File extension of generated programs
pub const SOURCE_EXTENSION: &str = "py";

/// Create a parser for the source grammar
pub fn new_parser() -> Result<Parser> {
    let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| EngineError::tree_sitter(format!("Failed to set language: {e}")))?;
    Ok(parser)
}

/// Parsed source text that is known to be free of syntax errors
pub struct SyntaxTree {
    source: String,
    tree: Tree,
}

impl SyntaxTree {
    /// Parse `source`, failing on the first syntax error
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = new_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| EngineError::tree_sitter("Parser returned no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(match first_error(root) {
                Some(node) => syntax_error(source, node),
                None => EngineError::syntax(1, 1, "invalid syntax"),
            });
        }
        if let Some(node) = first_legacy_statement(root) {
            let pos = node.start_position();
            let message = if node.kind() == kind::EXEC_STATEMENT {
                "`exec` statement; call `exec(...)` instead"
            } else {
                "`print` statement without parentheses"
            };
            return Err(EngineError::syntax(pos.row + 1, pos.column + 1, message));
        }

        Ok(Self {
            source: source.to_string(),
            tree,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by `node`
    pub(crate) fn text(&self, node: Node<'_>) -> &str {
        &self.source[node.start_byte()..node.end_byte()]
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}

/// Python 2 statements the grammar still accepts.
///
/// A `print` whose first argument is parenthesized, or that uses `>>`, is
/// still a valid expression statement and is left alone.
fn first_legacy_statement(node: Node<'_>) -> Option<Node<'_>> {
    let legacy = match node.kind() {
        kind::EXEC_STATEMENT => true,
        kind::PRINT_STATEMENT => !node
            .named_child(0)
            .is_some_and(|arg| matches!(arg.kind(), "parenthesized_expression" | "chevron")),
        _ => false,
    };
    if legacy {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.named_children(&mut cursor).collect();
    children.into_iter().find_map(first_legacy_statement)
}

fn syntax_error(source: &str, node: Node<'_>) -> EngineError {
    let pos = node.start_position();
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let snippet = source[node.start_byte()..node.end_byte()]
            .lines()
            .next()
            .unwrap_or_default()
            .trim();
        let snippet: String = snippet.chars().take(24).collect();
        if snippet.is_empty() {
            "invalid syntax".to_string()
        } else {
            format!("unexpected `{snippet}`")
        }
    };
    EngineError::syntax(pos.row + 1, pos.column + 1, message)
}

/// Terminal tokens of `root` in source order.
///
/// String literals are kept whole so nothing inside them is ever rewritten.
pub(crate) fn leaf_tokens(root: Node<'_>) -> Vec<Node<'_>> {
    let mut tokens = Vec::new();
    collect_tokens(root, &mut tokens);
    tokens
}

fn collect_tokens<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.start_byte() == node.end_byte() {
        return;
    }
    if node.child_count() == 0 || node.kind() == kind::STRING {
        out.push(node);
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_tokens(child, out);
    }
}

/// Number of `block` nodes enclosing `node`
pub(crate) fn block_depth(node: Node<'_>) -> usize {
    let mut depth = 0;
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == kind::BLOCK {
            depth += 1;
        }
        current = parent.parent();
    }
    depth
}

/// Innermost statement containing `node` (a child of `module` or `block`)
pub(crate) fn enclosing_statement(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        let parent = current.parent()?;
        if matches!(parent.kind(), kind::MODULE | kind::BLOCK) {
            return Some(current);
        }
        current = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_source() {
        let tree = SyntaxTree::parse("def hello():\n    return 1\n").unwrap();
        assert_eq!(tree.root().kind(), kind::MODULE);
        assert_eq!(tree.root().named_child_count(), 1);
    }

    #[test]
    fn test_parse_reports_position() {
        let err = SyntaxTree::parse("x = 1\ndef broken(:\n    pass\n")
            .err()
            .expect("syntax error");
        match err {
            EngineError::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_python2_statements_are_rejected() {
        for source in [
            "def f():\n    print 'hi'\n",
            "print x, y\n",
            "exec 'x = 1'\n",
            "def g():\n    if True:\n        exec code in ns\n",
        ] {
            let err = SyntaxTree::parse(source).err().expect(source);
            assert!(err.is_syntax(), "{source}: {err}");
        }

        match SyntaxTree::parse("def f():\n    print 'hi'\n") {
            Err(EngineError::Syntax { line, column, .. }) => assert_eq!((line, column), (2, 5)),
            other => panic!("unexpected result: {:?}", other.err()),
        }

        assert!(SyntaxTree::parse("print('hi')\n").is_ok());
        assert!(SyntaxTree::parse("print('a', end='')\nexec('x = 1')\n").is_ok());
        assert!(SyntaxTree::parse("print = log\nprinter = print\n").is_ok());
    }

    #[test]
    fn test_leaf_tokens_keep_strings_whole() {
        let tree = SyntaxTree::parse("x = f\"a {b} c\"\n").unwrap();
        let kinds: Vec<_> = leaf_tokens(tree.root()).iter().map(|n| n.kind()).collect();
        assert_eq!(kinds, ["identifier", "=", "string"]);
    }

    #[test]
    fn test_block_depth() {
        let tree = SyntaxTree::parse("def f():\n    if x:\n        y = 1\n").unwrap();
        let tokens = leaf_tokens(tree.root());
        let y = tokens
            .iter()
            .find(|n| tree.text(**n) == "y")
            .copied()
            .unwrap();
        let stmt = enclosing_statement(y).unwrap();
        assert_eq!(stmt.kind(), kind::EXPRESSION_STATEMENT);
        assert_eq!(block_depth(stmt), 2);
    }
}
