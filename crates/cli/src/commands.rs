use crate::output::CommandOutput;
use crate::project::ProjectStore;
use anyhow::{Context, Result};
use codeflow_block_engine::{
    build_summary, extract_docstrings, Assembler, EngineConfig, EngineError, Formatter, Packager,
    StructuralParser,
};
use serde_json::json;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Block source supplied inline or from a file
pub enum SourceInput {
    Inline(String),
    File(PathBuf),
}

impl SourceInput {
    fn read(&self) -> Result<String> {
        match self {
            Self::Inline(code) => Ok(code.clone()),
            Self::File(path) => read_text(path),
        }
    }
}

/// Read a file, or stdin for `-`
pub fn read_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read source from stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Everything a command needs: settings and the caller-owned project
pub struct Session {
    config: EngineConfig,
    store: ProjectStore,
}

impl Session {
    pub fn new(config: EngineConfig, store: ProjectStore) -> Self {
        Self { config, store }
    }

    fn parser(&self) -> StructuralParser {
        StructuralParser::new(self.config.formatter.clone())
    }

    fn assembler(&self) -> Assembler {
        Assembler::from_config(&self.config)
    }

    /// Split a script into blocks and merge them into the project
    pub fn parse(&mut self, path: &Path) -> Result<CommandOutput> {
        let source = read_text(path)?;
        let parsed = self
            .parser()
            .parse_script(&source)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let (blocks, diagnostics) = parsed.into_parts();

        let names: Vec<String> = blocks.names().map(str::to_string).collect();
        let found = blocks.len();
        let added = self.store.blocks_mut().merge(blocks);
        self.store.save()?;

        log::info!("Parsed {found} functions from {}", path.display());
        Ok(CommandOutput::new(
            format!(
                "Parsed {found} functions ({added} new, {} replaced)",
                found - added
            ),
            json!({ "parsed": names, "added": added, "total": self.store.blocks().len() }),
        )
        .with_diagnostics(diagnostics))
    }

    /// Create a new block from hand-written source
    pub fn add(&mut self, name: &str, input: &SourceInput) -> Result<CommandOutput> {
        if self.store.blocks().contains(name) {
            return Err(EngineError::DuplicateBlock(name.to_string()).into());
        }
        let source = input.read()?;
        let (block, diagnostics) = self.parser().parse_block(name, &source)?.into_parts();

        self.store.blocks_mut().create(name, block.source)?;
        self.store.save()?;

        Ok(CommandOutput::new(
            format!("Added block '{name}'"),
            json!({ "name": name, "total": self.store.blocks().len() }),
        )
        .with_diagnostics(diagnostics))
    }

    /// Replace the source of an existing block (reformatted)
    pub fn edit(&mut self, name: &str, input: &SourceInput) -> Result<CommandOutput> {
        if !self.store.blocks().contains(name) {
            return Err(EngineError::BlockNotFound(name.to_string()).into());
        }
        let source = input.read()?;
        let (block, diagnostics) = self.parser().parse_block(name, &source)?.into_parts();

        self.store.blocks_mut().update(name, block.source)?;
        self.store.save()?;

        Ok(CommandOutput::new(
            format!("Updated block '{name}'"),
            json!({ "name": name }),
        )
        .with_diagnostics(diagnostics))
    }

    pub fn remove(&mut self, name: &str) -> Result<CommandOutput> {
        self.store.blocks_mut().remove(name)?;
        self.store.save()?;

        Ok(CommandOutput::new(
            format!("Removed block '{name}'"),
            json!({ "name": name, "total": self.store.blocks().len() }),
        ))
    }

    pub fn list(&self) -> CommandOutput {
        let blocks = self.store.blocks();
        let text: String = blocks
            .iter()
            .map(|block| format!("{}\t{} lines\n", block.name, block.line_count()))
            .collect();
        let data: Vec<_> = blocks
            .iter()
            .map(|block| json!({ "name": block.name, "lines": block.line_count() }))
            .collect();
        CommandOutput::new(text, json!(data))
    }

    /// One block's source, or the digest of all of them
    pub fn show(&self, name: Option<&str>) -> Result<CommandOutput> {
        let blocks = self.store.blocks();
        match name {
            Some(name) => {
                let block = blocks
                    .get(name)
                    .ok_or_else(|| EngineError::BlockNotFound(name.to_string()))?;
                Ok(CommandOutput::new(block.source.clone(), json!(block)))
            }
            None => Ok(CommandOutput::new(build_summary(blocks), json!(blocks))),
        }
    }

    /// Documentation preview per block
    pub fn docs(&self) -> CommandOutput {
        let entries = extract_docstrings(self.store.blocks());
        let text: String = entries
            .iter()
            .map(|entry| format!("### {}\n{}\n\n", entry.block_name, entry.text()))
            .collect();
        CommandOutput::new(text, json!(entries))
    }

    /// Regenerated program, printed or written to `output`
    pub fn generate(&self, output: Option<&Path>) -> Result<CommandOutput> {
        let (program, diagnostics) = self
            .assembler()
            .generate_main_file(self.store.blocks())
            .into_parts();

        let result = match output {
            Some(path) => {
                fs::write(path, &program)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                CommandOutput::new(
                    format!("Wrote {}", path.display()),
                    json!({ "path": path, "program": program }),
                )
            }
            None => CommandOutput::new(program.clone(), json!({ "program": program })),
        };
        Ok(result.with_diagnostics(diagnostics))
    }

    /// Write the zip archive with the program and block digest
    pub fn export(&self, output: &Path) -> Result<CommandOutput> {
        let blocks = self.store.blocks();
        let (program, diagnostics) = self.assembler().generate_main_file(blocks).into_parts();

        let archive = Packager::new(self.config.archive.clone()).create_archive(&program, blocks)?;
        let bytes = archive.into_inner();
        fs::write(output, &bytes)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        log::info!("Exported {} blocks to {}", blocks.len(), output.display());
        Ok(CommandOutput::new(
            format!("Exported {} blocks to {}", blocks.len(), output.display()),
            json!({
                "path": output,
                "bytes": bytes.len(),
                "members": [self.config.archive.main_member, self.config.archive.summary_member],
            }),
        )
        .with_diagnostics(diagnostics))
    }

    /// Normalize arbitrary source text without touching the project
    pub fn format(&self, path: &Path) -> Result<CommandOutput> {
        let source = read_text(path)?;
        let (formatted, diagnostics) = Formatter::new(self.config.formatter.clone())
            .format(&source)
            .into_parts();
        Ok(
            CommandOutput::new(formatted.clone(), json!({ "formatted": formatted }))
                .with_diagnostics(diagnostics),
        )
    }

    pub fn project_path(&self) -> &Path {
        self.store.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn session(dir: &Path) -> Session {
        let store = ProjectStore::open(&dir.join("project.json")).unwrap();
        Session::new(EngineConfig::default(), store)
    }

    #[test]
    fn add_edit_remove_cycle() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        session
            .add("greet", &SourceInput::Inline("def greet( ):\n  return 'hi'".into()))
            .unwrap();
        assert!(session
            .add("greet", &SourceInput::Inline("def greet():\n    pass\n".into()))
            .is_err());

        session
            .edit("greet", &SourceInput::Inline("def greet():\n  return 'hello'\n".into()))
            .unwrap();
        let shown = session.show(Some("greet")).unwrap();
        assert_eq!(shown.text, "def greet():\n    return 'hello'\n");

        session.remove("greet").unwrap();
        assert!(session.show(Some("greet")).is_err());
        assert!(session.edit("greet", &SourceInput::Inline("x = 1".into())).is_err());
    }

    #[test]
    fn invalid_block_is_rejected_without_touching_project() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        let err = session
            .add("broken", &SourceInput::Inline("def broken(:\n".into()))
            .unwrap_err();
        assert!(err.to_string().contains("Syntax error"));
        assert!(session.list().text.is_empty());
    }

    #[test]
    fn block_must_define_its_own_name() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());

        let err = session
            .add("foo", &SourceInput::Inline("def bar():\n    pass\n".into()))
            .unwrap_err();
        assert!(err.to_string().contains("does not define"));
        assert!(session.list().text.is_empty());

        session
            .add("foo", &SourceInput::Inline("def foo():\n    pass\n".into()))
            .unwrap();
        assert!(session
            .edit("foo", &SourceInput::Inline("def bar():\n    pass\n".into()))
            .is_err());
        assert_eq!(session.show(Some("foo")).unwrap().text, "def foo():\n    pass\n");
    }

    #[test]
    fn parse_merges_and_persists() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("script.py");
        fs::write(&script, "def a():\n    pass\n\ndef b():\n    pass\n").unwrap();

        let mut first = session(dir.path());
        let output = first.parse(&script).unwrap();
        assert_eq!(output.data["added"], 2);

        let mut second = session(dir.path());
        let output = second.parse(&script).unwrap();
        assert_eq!(output.data["added"], 0);
        assert_eq!(output.data["total"], 2);
        assert_eq!(second.list().text, "a\t2 lines\nb\t2 lines\n");
    }
}
