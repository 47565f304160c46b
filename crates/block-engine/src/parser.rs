use crate::config::FormatterConfig;
use crate::error::{EngineError, Result};
use crate::formatter::Formatter;
use crate::grammar::{kind, SyntaxTree};
use crate::types::{Block, BlockCollection, Diagnostic, DiagnosticKind, Outcome, TopLevelKind};
use tree_sitter::Node;

/// Body substituted when a function cannot be reconstructed
pub const STUB_BODY: &str = "...  # source unavailable";

/// Turns a parsed top-level node back into source text
pub trait Unparse {
    /// Reconstruct the source of `node`, failing with `EngineError::Reconstruction`
    fn unparse(&self, node: &TopLevelNode<'_>) -> Result<String>;
}

/// Reconstructs nodes from the byte range they cover in the parsed text
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceUnparser;

impl Unparse for SourceUnparser {
    fn unparse(&self, node: &TopLevelNode<'_>) -> Result<String> {
        let syntax = node.syntax_node();
        if syntax.has_error() {
            return Err(EngineError::reconstruction(format!(
                "node at line {} contains syntax errors",
                node.start_line()
            )));
        }
        if syntax.start_position().column != 0 {
            return Err(EngineError::reconstruction(format!(
                "node at line {} does not start at column 0",
                node.start_line()
            )));
        }

        let text = syntax
            .utf8_text(node.source.as_bytes())
            .map_err(|e| EngineError::reconstruction(format!("invalid UTF-8 in node: {e}")))?;

        let mut text = text.trim_end().to_string();
        text.push('\n');
        Ok(text)
    }
}

impl SyntaxTree {
    /// Top-level statements in source order (comments skipped)
    pub fn top_level(&self) -> Vec<TopLevelNode<'_>> {
        let root = self.root();
        let mut cursor = root.walk();
        root.named_children(&mut cursor)
            .filter(|node| node.kind() != kind::COMMENT)
            .map(|node| TopLevelNode::new(node, self.source()))
            .collect()
    }

    /// Whether a top-level `def` (decorated or not) is named `name`
    pub fn defines_function(&self, name: &str) -> bool {
        self.top_level().iter().any(|node| node.name() == Some(name))
    }
}

/// A top-level statement of a parsed script
#[derive(Debug, Clone, Copy)]
pub struct TopLevelNode<'t> {
    node: Node<'t>,
    function: Option<Node<'t>>,
    source: &'t str,
    kind: TopLevelKind,
}

impl<'t> TopLevelNode<'t> {
    fn new(node: Node<'t>, source: &'t str) -> Self {
        let function = match node.kind() {
            kind::FUNCTION => Some(node),
            kind::DECORATED => node
                .child_by_field_name("definition")
                .filter(|def| def.kind() == kind::FUNCTION),
            _ => None,
        };
        let kind = if function.is_some() {
            TopLevelKind::Function
        } else if matches!(
            node.kind(),
            kind::IMPORT | kind::IMPORT_FROM | kind::FUTURE_IMPORT
        ) {
            TopLevelKind::Import
        } else {
            TopLevelKind::Other
        };

        Self {
            node,
            function,
            source,
            kind,
        }
    }

    pub const fn kind(&self) -> TopLevelKind {
        self.kind
    }

    /// Underlying syntax node (decorators included for functions)
    pub const fn syntax_node(&self) -> Node<'t> {
        self.node
    }

    /// The `def` node itself, without decorators
    pub const fn function_node(&self) -> Option<Node<'t>> {
        self.function
    }

    /// Function name, for function nodes
    pub fn name(&self) -> Option<&'t str> {
        let name = self.function?.child_by_field_name("name")?;
        Some(&self.source[name.start_byte()..name.end_byte()])
    }

    /// Raw source text of the statement
    pub fn text(&self) -> &'t str {
        &self.source[self.node.start_byte()..self.node.end_byte()]
    }

    /// 1-based first line
    pub fn start_line(&self) -> usize {
        self.node.start_position().row + 1
    }

    /// `[async ]def name(params)[ -> ret]`, without the trailing colon
    pub fn signature(&self) -> Option<String> {
        let function = self.function?;
        let field = |name: &str| {
            function
                .child_by_field_name(name)
                .map(|n| &self.source[n.start_byte()..n.end_byte()])
        };

        let is_async = function.child(0).is_some_and(|first| first.kind() == "async");
        let mut signature = String::new();
        if is_async {
            signature.push_str("async ");
        }
        signature.push_str("def ");
        signature.push_str(field("name")?);
        signature.push_str(field("parameters").unwrap_or("()"));
        if let Some(ret) = field("return_type") {
            signature.push_str(" -> ");
            signature.push_str(ret);
        }
        Some(signature)
    }
}

/// Splits scripts into function blocks
#[derive(Debug, Clone)]
pub struct StructuralParser<U = SourceUnparser> {
    unparser: U,
    formatter: Formatter,
}

impl StructuralParser<SourceUnparser> {
    #[must_use]
    pub fn new(config: FormatterConfig) -> Self {
        Self::with_unparser(config, SourceUnparser)
    }
}

impl Default for StructuralParser<SourceUnparser> {
    fn default() -> Self {
        Self::new(FormatterConfig::default())
    }
}

impl<U: Unparse> StructuralParser<U> {
    /// Create a parser with a custom reconstruction strategy
    pub fn with_unparser(config: FormatterConfig, unparser: U) -> Self {
        Self {
            unparser,
            formatter: Formatter::new(config),
        }
    }

    /// Parse `source` into a structural tree
    pub fn parse_top_level(&self, source: &str) -> Result<SyntaxTree> {
        SyntaxTree::parse(source)
    }

    /// Reconstruct a node's source, substituting a stub body under the
    /// original signature when reconstruction fails
    pub fn parse_function_body(&self, node: &TopLevelNode<'_>) -> Outcome<String> {
        match self.unparser.unparse(node) {
            Ok(text) => Outcome::clean(text),
            Err(err) => {
                let stub = node
                    .signature()
                    .map(|signature| format!("{signature}:\n    {STUB_BODY}\n"))
                    .unwrap_or_default();
                let mut diagnostic = Diagnostic::new(DiagnosticKind::Reconstruction, err.to_string());
                if let Some(name) = node.name() {
                    diagnostic = diagnostic.for_block(name);
                }
                Outcome::degraded(stub, diagnostic)
            }
        }
    }

    /// Split a script into formatted function blocks.
    ///
    /// Fails only when the script itself is not valid source. A later
    /// definition with an existing name replaces the earlier one in place.
    pub fn parse_script(&self, source: &str) -> Result<Outcome<BlockCollection>> {
        let tree = self.parse_top_level(source)?;
        let mut outcome = Outcome::clean(BlockCollection::new());
        let mut skipped = 0usize;

        for node in tree.top_level() {
            let Some(name) = node.name() else {
                skipped += 1;
                continue;
            };

            let text = outcome.absorb(self.parse_function_body(&node));
            let formatted = outcome.absorb(self.formatter.format(&text).for_block(name));
            if outcome.value.insert(Block::new(name, formatted)).is_some() {
                log::debug!("Function '{name}' redefined at line {}", node.start_line());
            }
        }

        log::debug!(
            "Parsed {} function blocks ({skipped} other top-level statements skipped)",
            outcome.value.len()
        );
        Ok(outcome)
    }

    /// Format a single hand-written block; fails if it is not valid source
    /// or does not define a top-level function called `name`
    pub fn parse_block(&self, name: &str, source: &str) -> Result<Outcome<Block>> {
        let tree = self.parse_top_level(source)?;
        if !tree.defines_function(name) {
            return Err(EngineError::MissingFunction {
                name: name.to_string(),
            });
        }
        Ok(self
            .formatter
            .format(source)
            .for_block(name)
            .map(|formatted| Block::new(name, formatted)))
    }
}
