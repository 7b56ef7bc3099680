use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notebook_runner::{
    logging,
    script::{Chain, Replace},
    suite, EnvScope, NotebookRunner, RunRequest, RunnerConfig,
};
use std::num::NonZeroU64;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "nbrun", version)]
#[command(about = "Run Jupyter notebooks as tests by executing their code cells as a script", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set the verbosity level (can be repeated for more verbose output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Use JSON log format
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file path (JSON, YAML or TOML)
    #[arg(short, long, global = true, env = "NBRUN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single notebook
    Run {
        /// Notebook file
        notebook: PathBuf,

        /// Default for INPUT_DATA_DIR
        #[arg(short, long)]
        input: PathBuf,

        /// Default for OUTPUT_DATA_DIR
        #[arg(short, long)]
        output: PathBuf,

        /// Default for BATCH_SIZE (must be greater than zero)
        #[arg(short, long)]
        batch_size: Option<NonZeroU64>,

        /// Remove the output directory after a successful run
        #[arg(long)]
        clean_up: bool,

        /// Replace text in every extracted line (repeatable, applied in order)
        #[arg(long = "replace", value_name = "FROM=TO")]
        replacements: Vec<Replace>,

        /// Keep the generated script in this directory instead of a temporary one
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Interpreter used to execute the script
        #[arg(long)]
        interpreter: Option<String>,

        /// Pass notebook variables to the child only, leaving this process untouched
        #[arg(long)]
        isolated_env: bool,
    },

    /// Print the script extracted from a notebook
    Extract {
        /// Notebook file
        notebook: PathBuf,

        /// Write the script to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replace text in every extracted line (repeatable, applied in order)
        #[arg(long = "replace", value_name = "FROM=TO")]
        replacements: Vec<Replace>,
    },

    /// Run the named notebook cases
    Suite {
        /// Case names to run (all when empty)
        cases: Vec<String>,

        /// List cases and their resolved paths without running them
        #[arg(long)]
        list: bool,

        /// Directory notebook paths are relative to
        #[arg(long)]
        notebooks_root: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.verbose, cli.quiet, cli.json)?;

    let config = RunnerConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let passed = match cli.command {
        Commands::Run {
            notebook,
            input,
            output,
            batch_size,
            clean_up,
            replacements,
            workdir,
            interpreter,
            isolated_env,
        } => {
            let mut config = config;
            if let Some(interpreter) = interpreter {
                config.interpreter = interpreter;
            }
            if isolated_env {
                config.env_scope = EnvScope::Child;
            }

            let mut request = RunRequest::new(notebook, input, output).clean_up(clean_up);
            if let Some(batch_size) = batch_size {
                request = request.batch_size(batch_size);
            }
            if !replacements.is_empty() {
                request = request.transform(chain(replacements));
            }

            run_notebook(config, request, workdir).await?
        }

        Commands::Extract {
            notebook,
            output,
            replacements,
        } => {
            extract_script(notebook, output, replacements)?;
            true
        }

        Commands::Suite {
            cases,
            list,
            notebooks_root,
        } => {
            let mut config = config;
            if let Some(root) = notebooks_root {
                config.notebooks_root = root;
            }
            run_suite(config, &cases, list).await?
        }

        Commands::Config => {
            print!("{}", config.to_yaml()?);
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

fn chain(replacements: Vec<Replace>) -> Chain {
    Chain(
        replacements
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn notebook_runner::LineTransform>)
            .collect(),
    )
}

async fn run_notebook(
    config: RunnerConfig,
    request: RunRequest,
    workdir: Option<PathBuf>,
) -> Result<bool> {
    let runner = NotebookRunner::new(config);
    let notebook = request.notebook_path.display().to_string();

    // The temporary directory must outlive the run.
    let _tempdir;
    let workdir = match workdir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create work directory {}", dir.display()))?;
            dir
        }
        None => {
            let dir = tempfile::tempdir().context("Failed to create temporary directory")?;
            let path = dir.path().to_path_buf();
            _tempdir = dir;
            path
        }
    };

    match runner.run(request, &workdir).await {
        Ok(outcome) => {
            logging::success(&format!(
                "{} ({} lines, {:.1}s)",
                notebook,
                outcome.script_lines,
                outcome.elapsed.as_secs_f64()
            ));
            Ok(true)
        }
        Err(e) if e.is_execution_failure() => {
            logging::failure(&format!("{}\n{}", notebook, e));
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to run {}", notebook)),
    }
}

fn extract_script(notebook: PathBuf, output: Option<PathBuf>, replacements: Vec<Replace>) -> Result<()> {
    let parsed = notebook_runner::Notebook::from_file(&notebook)?;
    let transform = chain(replacements);
    let script = notebook_runner::Script::from_notebook(&parsed, Some(&transform));

    match output {
        Some(path) => {
            std::fs::write(&path, script.render())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} lines to {}", script.len(), path.display());
        }
        None => println!("{}", script),
    }
    Ok(())
}

async fn run_suite(config: RunnerConfig, names: &[String], list: bool) -> Result<bool> {
    let cases = suite::select_cases(names)?;

    if list {
        for case in &cases {
            let request = case.request(&config.notebooks_root, &config.dataset_dir, config.batch_size);
            println!("{}", case.name);
            println!("  notebook: {}", request.notebook_path.display());
            println!("  input:    {}", request.input_path.display());
            println!("  output:   {}", request.output_path.display());
        }
        return Ok(true);
    }

    info!(
        "Running {} notebook case(s) from {}",
        cases.len(),
        config.notebooks_root.display()
    );
    let runner = NotebookRunner::new(config);
    let report = suite::run_cases(&runner, &cases).await;

    println!();
    for case in &report.cases {
        match &case.result {
            Ok(outcome) => logging::success(&format!(
                "{} ({:.1}s)",
                case.name,
                outcome.elapsed.as_secs_f64()
            )),
            Err(e) => logging::failure(&format!("{}: {}", case.name, e)),
        }
    }
    println!();
    println!(
        "{} passed, {} failed in {:.1}s",
        report.passed(),
        report.failed(),
        report.elapsed.as_secs_f64()
    );

    Ok(report.success())
}
