use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{Session, SourceInput};
use output::CommandOutput;
use project::{ProjectStore, DEFAULT_PROJECT_PATH};
use std::path::PathBuf;

mod commands;
mod output;
mod project;
mod settings;

#[derive(Parser)]
#[command(name = "codeflow")]
#[command(about = "Collect Python functions as blocks and regenerate one runnable program", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project file holding the block collection
    #[arg(long, global = true, default_value = DEFAULT_PROJECT_PATH)]
    project: PathBuf,

    /// Engine settings (defaults to ./codeflow.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print a JSON envelope on stdout (implies --quiet)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a script into function blocks and merge them into the project
    Parse {
        /// Script path, or `-` for stdin
        file: PathBuf,
    },

    /// Add a new block
    Add(BlockArgs),

    /// Replace the source of an existing block
    Edit(BlockArgs),

    /// Remove a block
    Remove { name: String },

    /// List blocks in order
    List,

    /// Print one block, or all of them
    Show { name: Option<String> },

    /// Preview the docstring of every block
    Docs,

    /// Print or write the regenerated program
    Generate {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the program and block summary into a zip archive
    Export {
        #[arg(short, long, default_value = "codeflow_project.zip")]
        output: PathBuf,
    },

    /// Normalize source text without touching the project
    Format {
        /// Source path, or `-` for stdin
        file: PathBuf,
    },
}

#[derive(Args)]
struct BlockArgs {
    /// Function name of the block
    name: String,

    /// Inline source
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    code: Option<String>,

    /// Read source from a file (`-` for stdin)
    #[arg(long)]
    file: Option<PathBuf>,
}

impl BlockArgs {
    fn input(&self) -> SourceInput {
        match (&self.code, &self.file) {
            (Some(code), _) => SourceInput::Inline(code.clone()),
            (None, Some(path)) => SourceInput::File(path.clone()),
            (None, None) => SourceInput::Inline(String::new()),
        }
    }
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON consumers
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let json = cli.json;
    match run(cli) {
        Ok(output) => output::emit(&output, json),
        Err(err) => {
            output::emit_error(&err, json)?;
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<CommandOutput> {
    let config = settings::load_config(cli.config.as_deref())?;
    let store = ProjectStore::open(&cli.project)?;
    let mut session = Session::new(config, store);
    log::debug!("Using project {}", session.project_path().display());

    match cli.command {
        Commands::Parse { file } => session.parse(&file),
        Commands::Add(args) => session.add(&args.name, &args.input()),
        Commands::Edit(args) => session.edit(&args.name, &args.input()),
        Commands::Remove { name } => session.remove(&name),
        Commands::List => Ok(session.list()),
        Commands::Show { name } => session.show(name.as_deref()),
        Commands::Docs => Ok(session.docs()),
        Commands::Generate { output } => session.generate(output.as_deref()),
        Commands::Export { output } => session.export(&output),
        Commands::Format { file } => session.format(&file),
    }
}
