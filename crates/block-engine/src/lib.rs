//! # CodeFlow Block Engine
//!
//! Splits Python scripts into independently editable function blocks and
//! regenerates a single runnable program from any collection of them.
//!
//! ## Philosophy
//!
//! The engine is stateless and never aborts a batch over one bad block:
//! - Only a syntax error at the script or block boundary is returned as `Err`
//! - Finer-grained failures degrade (stub body, original text, sentinel) and
//!   are reported as [`Diagnostic`]s inside an [`Outcome`]
//! - Formatting is deterministic and idempotent
//!
//! ## Architecture
//!
//! ```text
//! Script text
//!     │
//!     ├──> StructuralParser (tree-sitter) → top-level nodes
//!     │    └─> Unparse (stub body on failure) → Formatter → Block
//!     │
//!     ├──> BlockCollection (caller owned, insertion ordered)
//!     │    ├─> extract_imports    → deduplicated import lines
//!     │    └─> extract_docstrings → present / absent / unavailable
//!     │
//!     └──> Assembler → imports + blocks + driver + trailer → Formatter
//!          └─> Packager → main.py + blocks_summary.txt (zip)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use codeflow_block_engine::{Assembler, EngineConfig, StructuralParser};
//!
//! let parser: StructuralParser = StructuralParser::default();
//! let script = "import os\n\ndef cwd():\n    return os.getcwd()\n";
//!
//! let blocks = parser.parse_script(script).unwrap().value;
//! let program = Assembler::from_config(&EngineConfig::default()).generate_main_file(&blocks);
//!
//! assert!(program.value.contains("    cwd()\n"));
//! ```

mod archive;
mod assembler;
mod config;
mod docstrings;
mod error;
mod formatter;
mod grammar;
mod imports;
mod parser;
mod types;

pub use archive::{build_summary, Packager};
pub use assembler::{Assembler, RegeneratedProgram};
pub use config::{ArchiveConfig, AssemblerConfig, EngineConfig, FormatterConfig};
pub use docstrings::{extract_docstring, extract_docstrings};
pub use error::{EngineError, Result};
pub use formatter::Formatter;
pub use grammar::{SyntaxTree, SOURCE_EXTENSION};
pub use imports::{block_imports, canonical_import, extract_imports, ImportStatement};
pub use parser::{SourceUnparser, StructuralParser, TopLevelNode, Unparse, STUB_BODY};
pub use types::{
    is_identifier, Block, BlockCollection, Diagnostic, DiagnosticKind, Docstring,
    DocumentationEntry, Outcome, TopLevelKind,
};
