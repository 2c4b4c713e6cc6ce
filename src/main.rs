use clap::Parser;
use env_logger::Env;
use log::{error, info, LevelFilter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use idlgen::emit::{emit, JsonEmitter, OutlineEmitter};
use idlgen::{driver, harness, Config, ConfigOverrides, IdlError, InterfaceDescription};

#[derive(Parser)]
#[command(name = "idlgen")]
#[command(about = "IDL communication-function generator", long_about = None)]
struct Cli {
    /// Interface description file(s)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target backend: native-v2, native-v4 or socket
    #[arg(short, long)]
    backend: Option<String>,

    /// Fixed-region ordering: declaration, ascending-size or descending-size
    #[arg(long)]
    sort_policy: Option<String>,

    /// Function generated error paths call
    #[arg(long)]
    error_hook: Option<String>,

    /// Also write the test-harness manifest
    #[arg(long)]
    harness: bool,

    /// Print an outline of every generated function
    #[arg(long)]
    dump: bool,

    /// Generate but write nothing
    #[arg(long)]
    check: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp(None);
    let _ = builder.try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("{}", err);
            ExitCode::from(2)
        }
    }
}

/// Returns whether every operation of every file was generated.
fn run(cli: &Cli) -> Result<bool, IdlError> {
    let overrides = ConfigOverrides {
        backend: cli.backend.clone(),
        generate_test_harness: cli.harness,
        sort_policy: cli.sort_policy.clone(),
        error_hook: cli.error_hook.clone(),
    };
    let config = Config::load(cli.config.as_deref(), &overrides)?;
    info!("backend: {}", config.backend);

    let mut complete = true;
    for path in &cli.files {
        complete &= process_file(path, &config, cli)?;
    }
    Ok(complete)
}

fn process_file(path: &Path, config: &Config, cli: &Cli) -> Result<bool, IdlError> {
    info!("processing {}", path.display());
    let description = InterfaceDescription::load(path)?;
    let output = driver::generate_description(&description, config)?;

    if cli.dump {
        let mut outline = OutlineEmitter::new();
        emit(&output, &mut outline)?;
        print!("{}", outline.text());
    }

    if !cli.check {
        let mut json = JsonEmitter::new(&cli.output);
        emit(&output, &mut json)?;
        if config.generate_test_harness {
            harness::write_manifest(&output, &cli.output)?;
        }
    }

    if output.has_errors() {
        error!(
            "{}: {} operation(s) could not be generated",
            path.display(),
            output.errors.len()
        );
    }
    Ok(!output.has_errors())
}
