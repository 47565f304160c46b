use crate::error::{EngineError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Reserved words that can never name a function
const KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Check whether `name` can be used as a function name in generated code
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let re = IDENT.get_or_init(|| {
        Regex::new(r"^[_\p{L}][_\p{L}\p{N}]*$").expect("identifier pattern is valid")
    });
    re.is_match(name) && !KEYWORDS.contains(&name)
}

/// A single named top-level function definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Function identifier, unique within a collection
    pub name: String,

    /// Canonically formatted function definition text
    pub source: String,
}

impl Block {
    /// Create a new block
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Number of source lines
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.source.lines().count()
    }
}

/// Ordered, name-keyed set of blocks.
///
/// Insertion order decides driver-call order and import scan order. Inserting
/// an existing name replaces its source and keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Block>", into = "Vec<Block>")]
pub struct BlockCollection {
    blocks: Vec<Block>,
}

impl BlockCollection {
    /// Create an empty collection
    #[must_use]
    pub const fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate blocks in collection order
    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    /// Block names in collection order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.name.as_str())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.name == name)
    }

    /// Insert or replace a block, returning the previous source if any
    pub fn insert(&mut self, block: Block) -> Option<String> {
        match self.position(&block.name) {
            Some(idx) => Some(std::mem::replace(&mut self.blocks[idx].source, block.source)),
            None => {
                self.blocks.push(block);
                None
            }
        }
    }

    /// Add a new block; fails if the name is taken or not an identifier
    pub fn create(&mut self, name: &str, source: impl Into<String>) -> Result<()> {
        if !is_identifier(name) {
            return Err(EngineError::InvalidBlockName(name.to_string()));
        }
        if self.contains(name) {
            return Err(EngineError::DuplicateBlock(name.to_string()));
        }
        self.blocks.push(Block::new(name, source));
        Ok(())
    }

    /// Replace the source of an existing block
    pub fn update(&mut self, name: &str, source: impl Into<String>) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| EngineError::BlockNotFound(name.to_string()))?;
        self.blocks[idx].source = source.into();
        Ok(())
    }

    /// Remove a block, preserving the order of the rest
    pub fn remove(&mut self, name: &str) -> Result<Block> {
        let idx = self
            .position(name)
            .ok_or_else(|| EngineError::BlockNotFound(name.to_string()))?;
        Ok(self.blocks.remove(idx))
    }

    /// Merge another collection with mapping-update semantics.
    ///
    /// Returns the number of blocks that were newly added.
    pub fn merge(&mut self, other: BlockCollection) -> usize {
        let mut added = 0;
        for block in other.blocks {
            if self.insert(block).is_none() {
                added += 1;
            }
        }
        added
    }
}

impl TryFrom<Vec<Block>> for BlockCollection {
    type Error = EngineError;

    fn try_from(blocks: Vec<Block>) -> Result<Self> {
        let mut collection = Self::new();
        for block in blocks {
            if collection.contains(&block.name) {
                return Err(EngineError::DuplicateBlock(block.name));
            }
            collection.blocks.push(block);
        }
        Ok(collection)
    }
}

impl From<BlockCollection> for Vec<Block> {
    fn from(collection: BlockCollection) -> Self {
        collection.blocks
    }
}

impl FromIterator<Block> for BlockCollection {
    fn from_iter<I: IntoIterator<Item = Block>>(iter: I) -> Self {
        let mut collection = Self::new();
        for block in iter {
            collection.insert(block);
        }
        collection
    }
}

impl<'a> IntoIterator for &'a BlockCollection {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

/// Tag of a top-level statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TopLevelKind {
    /// `def` / `async def`, decorators included
    Function,
    /// `import` / `from ... import`
    Import,
    /// Anything else
    Other,
}

/// Documentation outcome for one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum Docstring {
    /// Leading string literal of the function body
    Present(String),
    /// The function has no (or an empty) docstring
    Absent,
    /// The block could not be parsed
    Unavailable,
}

impl Docstring {
    pub const NO_DOCSTRING: &'static str = "No docstring provided.";
    pub const EXTRACTION_FAILED: &'static str = "Error extracting docstring.";

    /// Display text, with sentinels for the non-present outcomes
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Present(text) => text,
            Self::Absent => Self::NO_DOCSTRING,
            Self::Unavailable => Self::EXTRACTION_FAILED,
        }
    }
}

/// Docstring of a named block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationEntry {
    pub block_name: String,
    pub docstring: Docstring,
}

impl DocumentationEntry {
    #[must_use]
    pub fn text(&self) -> &str {
        self.docstring.text()
    }
}

/// Category of a non-fatal problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Unit of input was not parseable and was left out
    Syntax,
    /// Function source was replaced by a stub
    Reconstruction,
    /// Normalization was skipped and the original text kept
    Formatting,
    /// Imports or docstring could not be read from a block
    Extraction,
    /// Advisory only; output is unaffected
    Style,
}

impl DiagnosticKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Reconstruction => "reconstruction",
            Self::Formatting => "formatting",
            Self::Extraction => "extraction",
            Self::Style => "style",
        }
    }
}

/// A reported, non-fatal degradation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,

    /// Block the problem belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,

    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            block: None,
            message: message.into(),
        }
    }

    /// Builder: attach block name
    #[must_use]
    pub fn for_block(mut self, name: impl Into<String>) -> Self {
        self.block = Some(name.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.block {
            Some(block) => write!(f, "[{}] {block}: {}", self.kind.as_str(), self.message),
            None => write!(f, "[{}] {}", self.kind.as_str(), self.message),
        }
    }
}

/// A value together with the diagnostics recorded while producing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Outcome<T> {
    /// Value produced without any degradation
    pub const fn clean(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    /// Value produced through a fallback
    pub fn degraded(value: T, diagnostic: Diagnostic) -> Self {
        let mut outcome = Self::clean(value);
        outcome.push(diagnostic);
        outcome
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Record a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Take the value of another outcome, keeping its diagnostics
    pub fn absorb<U>(&mut self, other: Outcome<U>) -> U {
        self.diagnostics.extend(other.diagnostics);
        other.value
    }

    /// Attach a block name to diagnostics that have none
    #[must_use]
    pub fn for_block(mut self, name: &str) -> Self {
        for diagnostic in &mut self.diagnostics {
            if diagnostic.block.is_none() {
                diagnostic.block = Some(name.to_string());
            }
        }
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }

    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }
}
