use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while parsing, assembling or packaging blocks
#[derive(Error, Debug)]
pub enum EngineError {
    /// Source text is not syntactically valid (1-based position of the first error)
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// A parsed function could not be turned back into source text
    #[error("Reconstruction error: {0}")]
    Reconstruction(String),

    /// The normalization pass could not be applied
    #[error("Formatting error: {0}")]
    Formatting(String),

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// Writing the export archive failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A block with this name is already in the collection
    #[error("Block '{0}' already exists")]
    DuplicateBlock(String),

    /// No block with this name in the collection
    #[error("Block '{0}' not found")]
    BlockNotFound(String),

    /// Block names must be valid identifiers
    #[error("Invalid block name: '{0}'")]
    InvalidBlockName(String),

    /// The block source has no top-level `def` matching the block name
    #[error("Block '{name}' does not define a top-level function named '{name}'")]
    MissingFunction { name: String },
}

impl EngineError {
    /// Create a syntax error
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a reconstruction error
    pub fn reconstruction(msg: impl Into<String>) -> Self {
        Self::Reconstruction(msg.into())
    }

    /// Create a formatting error
    pub fn formatting(msg: impl Into<String>) -> Self {
        Self::Formatting(msg.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitter(msg.into())
    }

    /// Create an archive error
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// True for the only failure kind that is escalated to callers
    pub const fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}

impl From<zip::result::ZipError> for EngineError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::archive(err.to_string())
    }
}
