use anyhow::{Context, Result};
use codeflow_block_engine::BlockCollection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROJECT_PATH: &str = ".codeflow/project.json";
const PROJECT_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    schema_version: u32,
    blocks: BlockCollection,
}

/// Caller-owned block collection persisted between invocations
pub struct ProjectStore {
    path: PathBuf,
    blocks: BlockCollection,
}

impl ProjectStore {
    /// Load the project at `path`; a missing file is an empty project
    pub fn open(path: &Path) -> Result<Self> {
        let blocks = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read project {}", path.display()))?;
            let file: ProjectFile = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid project file {}", path.display()))?;
            if file.schema_version != PROJECT_SCHEMA_VERSION {
                anyhow::bail!(
                    "Unsupported project schema_version {} (expected {PROJECT_SCHEMA_VERSION})",
                    file.schema_version
                );
            }
            file.blocks
        } else {
            log::debug!("No project at {}, starting empty", path.display());
            BlockCollection::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            blocks,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn blocks(&self) -> &BlockCollection {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut BlockCollection {
        &mut self.blocks
    }

    /// Write the project as pretty JSON, creating parent directories
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = ProjectFile {
            schema_version: PROJECT_SCHEMA_VERSION,
            blocks: self.blocks.clone(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)
            .with_context(|| format!("Failed to write project {}", self.path.display()))?;

        log::debug!(
            "Saved {} blocks to {}",
            self.blocks.len(),
            self.path.display()
        );
        Ok(())
    }
}
