//! Regenerates one runnable program from a block collection.
//!
//! ```text
//! imports (deduplicated, first seen)
//!
//! block sources (collection order, as written)
//!
//! def main():
//!     first()
//!     second()
//!
//! if __name__ == '__main__':
//!     main()
//! ```

use crate::config::{AssemblerConfig, EngineConfig, FormatterConfig};
use crate::formatter::Formatter;
use crate::grammar::SyntaxTree;
use crate::imports::{self, ImportStatement};
use crate::types::{
    is_identifier, Block, BlockCollection, Diagnostic, DiagnosticKind, Outcome, TopLevelKind,
};
use serde::Serialize;

/// Structured sections of a regenerated program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegeneratedProgram {
    /// Deduplicated imports in first-seen order
    pub imports: Vec<ImportStatement>,

    /// Formatted block sources in collection order
    pub blocks: Vec<Block>,

    /// Name of the generated driver function
    pub driver_name: String,

    /// Functions the driver calls, in order
    pub calls: Vec<String>,

    /// Whether the `__main__` trailer is emitted
    pub entry_guard: bool,
}

impl RegeneratedProgram {
    /// Source of the driver function
    pub fn driver(&self) -> String {
        let mut driver = format!("def {}():\n", self.driver_name);
        if self.calls.is_empty() {
            driver.push_str("    pass\n");
        }
        for call in &self.calls {
            driver.push_str(&format!("    {call}()\n"));
        }
        driver
    }

    /// Concatenate all sections (unformatted)
    pub fn render(&self) -> String {
        let mut text = String::new();

        if !self.imports.is_empty() {
            text.push_str(&self.imports.join("\n"));
            text.push_str("\n\n");
        }

        for block in &self.blocks {
            let source = block.source.trim_end();
            if source.is_empty() {
                continue;
            }
            text.push_str(source);
            text.push_str("\n\n");
        }

        text.push_str(&self.driver());
        if self.entry_guard {
            text.push_str(&format!(
                "\n\nif __name__ == '__main__':\n    {}()\n",
                self.driver_name
            ));
        }
        text
    }
}

/// Composes imports, blocks and a driver into one program
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    config: AssemblerConfig,
    formatter: Formatter,
}

impl Assembler {
    #[must_use]
    pub fn new(config: AssemblerConfig, formatter: FormatterConfig) -> Self {
        Self {
            config,
            formatter: Formatter::new(formatter),
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.assembler.clone(), config.formatter.clone())
    }

    /// Build the program sections.
    ///
    /// Blocks that do not parse are left out of every section.
    pub fn assemble(&self, blocks: &BlockCollection) -> Outcome<RegeneratedProgram> {
        let mut outcome = Outcome::clean(());
        let mut valid = Vec::with_capacity(blocks.len());
        let mut sections = Vec::with_capacity(blocks.len());
        let mut calls = Vec::with_capacity(blocks.len());

        for block in blocks {
            let tree = match SyntaxTree::parse(&block.source) {
                Ok(tree) => tree,
                Err(err) => {
                    outcome.push(
                        Diagnostic::new(DiagnosticKind::Syntax, format!("block excluded: {err}"))
                            .for_block(&block.name),
                    );
                    continue;
                }
            };

            let formatted = if self.config.hoist_imports {
                self.formatter.format(&without_imports(&tree))
            } else {
                self.formatter.format(&block.source)
            };
            let formatted = outcome.absorb(formatted.for_block(&block.name));

            if !is_identifier(&block.name) {
                outcome.push(
                    Diagnostic::new(
                        DiagnosticKind::Style,
                        "name is not an identifier; left out of the driver",
                    )
                    .for_block(&block.name),
                );
            } else if !tree.defines_function(&block.name) {
                outcome.push(
                    Diagnostic::new(
                        DiagnosticKind::Style,
                        "no top-level function with this name; left out of the driver",
                    )
                    .for_block(&block.name),
                );
            } else {
                calls.push(block.name.clone());
            }

            sections.push(Block::new(block.name.clone(), formatted));
            valid.push(block);
        }

        let imports = outcome.absorb(imports::extract_imports(valid.iter().copied()));

        let mut driver_name = self.config.driver_name.clone();
        while sections.iter().any(|block| block.name == driver_name) {
            driver_name.push('_');
        }
        if driver_name != self.config.driver_name {
            outcome.push(Diagnostic::new(
                DiagnosticKind::Style,
                format!(
                    "a block is named '{}'; driver renamed to '{driver_name}'",
                    self.config.driver_name
                ),
            ));
        }

        log::debug!(
            "Assembled {} of {} blocks with {} imports",
            sections.len(),
            blocks.len(),
            imports.len()
        );

        outcome.map(|()| RegeneratedProgram {
            imports,
            blocks: sections,
            driver_name,
            calls,
            entry_guard: self.config.entry_guard,
        })
    }

    /// Regenerate the whole program as formatted text.
    ///
    /// The driver assumes every block is a zero-argument callable.
    pub fn generate_main_file(&self, blocks: &BlockCollection) -> Outcome<String> {
        let mut outcome = self.assemble(blocks).map(|program| program.render());
        let text = std::mem::take(&mut outcome.value);
        let formatted = outcome.absorb(self.formatter.format(&text));
        outcome.map(|_| formatted)
    }
}

/// Block text with its top-level imports removed.
///
/// Falls back to the full text if removal would leave invalid source.
fn without_imports(tree: &SyntaxTree) -> String {
    let source = tree.source();
    let mut ranges: Vec<(usize, usize)> = tree
        .top_level()
        .iter()
        .filter(|node| node.kind() == TopLevelKind::Import)
        .map(|node| {
            let syntax = node.syntax_node();
            (syntax.start_byte(), statement_end(source, syntax.end_byte()))
        })
        .collect();

    if ranges.is_empty() {
        return source.to_string();
    }

    ranges.sort_unstable();
    let mut body = String::with_capacity(source.len());
    let mut cursor = 0;
    for (start, end) in ranges {
        if start >= cursor {
            body.push_str(&source[cursor..start]);
            cursor = end;
        }
    }
    body.push_str(&source[cursor..]);

    if SyntaxTree::parse(&body).is_ok() {
        body
    } else {
        source.to_string()
    }
}

/// Extend a statement end over a `;` separator, or over the rest of its
/// line (trailing comment included) when nothing else shares it
fn statement_end(source: &str, end: usize) -> usize {
    let mut rest = source[end..].trim_start_matches([' ', '\t']);

    if let Some(after) = rest.strip_prefix(';') {
        let after = after.trim_start_matches([' ', '\t']);
        if !after.is_empty() && !after.starts_with(['\n', '#']) {
            return source.len() - after.len();
        }
        rest = after;
    }

    if rest.is_empty() || rest.starts_with(['\n', '#']) {
        return match rest.find('\n') {
            Some(newline) => source.len() - rest.len() + newline + 1,
            None => source.len(),
        };
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn collection(items: &[(&str, &str)]) -> BlockCollection {
        items
            .iter()
            .map(|(name, source)| Block::new(*name, *source))
            .collect()
    }

    fn assembler() -> Assembler {
        Assembler::from_config(&EngineConfig::default())
    }

    fn hoisting_assembler() -> Assembler {
        let config = AssemblerConfig {
            hoist_imports: true,
            ..Default::default()
        };
        Assembler::new(config, FormatterConfig::default())
    }

    #[test]
    fn test_generate_main_file() {
        let blocks = collection(&[
            ("alpha", "import os\n\ndef alpha():\n    return os.sep\n"),
            ("beta", "import sys\nimport os\n\ndef beta():\n    return sys.argv\n"),
        ]);
        let outcome = assembler().generate_main_file(&blocks);

        assert!(outcome.is_clean());
        assert_eq!(
            outcome.value,
            "import os\nimport sys\n\nimport os\n\n\ndef alpha():\n    return os.sep\n\n\nimport sys\nimport os\n\n\ndef beta():\n    return sys.argv\n\n\ndef main():\n    alpha()\n    beta()\n\n\nif __name__ == '__main__':\n    main()\n"
        );
    }

    #[test]
    fn test_hoisted_imports() {
        let blocks = collection(&[
            ("alpha", "import os  # path helpers\n\ndef alpha():\n    return os.sep\n"),
            ("beta", "import sys\nimport os\n\ndef beta():\n    return sys.argv\n"),
        ]);
        let outcome = hoisting_assembler().generate_main_file(&blocks);

        assert!(outcome.is_clean());
        assert_eq!(
            outcome.value,
            "import os\nimport sys\n\n\ndef alpha():\n    return os.sep\n\n\ndef beta():\n    return sys.argv\n\n\ndef main():\n    alpha()\n    beta()\n\n\nif __name__ == '__main__':\n    main()\n"
        );
    }

    #[test]
    fn test_unformattable_program_falls_back_to_raw_text() {
        // Assembler::new does not validate, so this driver name renders as invalid source
        let config = AssemblerConfig {
            driver_name: "run all".to_string(),
            ..Default::default()
        };
        let assembler = Assembler::new(config, FormatterConfig::default());
        let blocks = collection(&[("a", "def a( ):\n  pass\n")]);

        let raw = assembler.assemble(&blocks).value.render();
        let outcome = assembler.generate_main_file(&blocks);

        assert_eq!(outcome.value, raw);
        assert!(outcome.value.starts_with("def a():\n    pass\n\ndef run all():\n"));
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Formatting && d.block.is_none()));
    }

    #[test]
    fn test_blocks_without_their_function_stay_out_of_the_driver() {
        let blocks = collection(&[
            ("foo", "def bar():\n    pass\n"),
            ("class", "x = 1\n"),
            ("ok", "def ok():\n    pass\n"),
        ]);
        let outcome = assembler().assemble(&blocks);

        assert_eq!(outcome.value.calls, ["ok"]);
        assert_eq!(outcome.value.blocks.len(), 3);
        let flagged: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Style)
            .filter_map(|d| d.block.as_deref())
            .collect();
        assert_eq!(flagged, ["foo", "class"]);
    }

    #[test]
    fn test_empty_collection_gets_pass_driver() {
        let outcome = assembler().generate_main_file(&BlockCollection::new());
        assert_eq!(
            outcome.value,
            "def main():\n    pass\n\n\nif __name__ == '__main__':\n    main()\n"
        );
    }

    #[test]
    fn test_driver_calls_follow_collection_order() {
        let blocks = collection(&[
            ("zeta", "def zeta():\n    pass\n"),
            ("alpha", "def alpha():\n    pass\n"),
        ]);
        let program = assembler().assemble(&blocks).value;
        assert_eq!(program.calls, ["zeta", "alpha"]);
        assert_eq!(program.driver(), "def main():\n    zeta()\n    alpha()\n");
    }

    #[test]
    fn test_unparseable_block_is_excluded() {
        let blocks = collection(&[
            ("good", "import os\n\ndef good():\n    pass\n"),
            ("bad", "import json\ndef bad(:\n"),
            ("fine", "def fine():\n    pass\n"),
        ]);
        let outcome = assembler().assemble(&blocks);

        assert_eq!(outcome.value.imports, ["import os"]);
        assert_eq!(outcome.value.calls, ["good", "fine"]);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Syntax);
        assert_eq!(outcome.diagnostics[0].block.as_deref(), Some("bad"));
    }

    #[test]
    fn test_driver_name_collision() {
        let blocks = collection(&[("main", "def main():\n    pass\n")]);
        let outcome = assembler().assemble(&blocks);

        assert_eq!(outcome.value.driver_name, "main_");
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Style);
        assert!(outcome.value.render().ends_with("    main_()\n"));
    }

    #[test]
    fn test_entry_guard_is_optional() {
        let config = AssemblerConfig {
            driver_name: "run".to_string(),
            entry_guard: false,
            ..Default::default()
        };
        let assembler = Assembler::new(config, FormatterConfig::default());
        let text = assembler
            .generate_main_file(&collection(&[("a", "def a():\n    pass\n")]))
            .value;
        assert_eq!(text, "def a():\n    pass\n\n\ndef run():\n    a()\n");
    }

    #[test]
    fn test_without_imports() {
        let strip = |source: &str| without_imports(&SyntaxTree::parse(source).unwrap());

        assert_eq!(strip("import os\ndef f():\n    pass\n"), "def f():\n    pass\n");
        assert_eq!(strip("import os; x = 1\n"), "x = 1\n");
        assert_eq!(strip("import os  # paths\nx = 1\n"), "x = 1\n");
        assert_eq!(strip("import os;  # paths\nx = 1\n"), "x = 1\n");
        assert_eq!(strip("import os  # paths"), "");
        assert_eq!(
            strip("def f():\n    import re\n"),
            "def f():\n    import re\n"
        );
    }
}
