//! apicheck CLI - contract-test a REST API against its OpenAPI document

mod storage;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

use apicheck_core::{Config, VerdictStatus};
use apicheck_runner::{Filter, ResolvedSpec, Suite};

#[derive(Parser)]
#[command(name = "apicheck")]
#[command(about = "Contract-test a REST API against its OpenAPI document")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the endpoint test methods
    Run {
        /// Config file (default: apicheck.json, .apicheck.json or apicheck.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// OpenAPI (Swagger 2.0 / OpenAPI 3.x) document, YAML or JSON
        #[arg(long)]
        openapi: String,

        /// Debug logging (overridden by RUST_LOG)
        #[arg(long)]
        debug: bool,

        /// Show the requests a run would make without sending them
        #[arg(long)]
        dry_run: bool,

        /// Also save summary.json / failures.json under this directory
        #[arg(long)]
        report_dir: Option<String>,

        /// Test runner arguments after `--`: `-k PATTERN`, `-f`, test names
        #[arg(last = true)]
        runner_args: Vec<String>,
    },

    /// Write an example apicheck.json
    Init,

    /// Check the config and OpenAPI document without sending requests
    Doctor {
        #[arg(short, long)]
        config: Option<String>,

        #[arg(long, default_value = "openapi.yaml")]
        openapi: String,
    },

    /// Export JSON Schema for the report format
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

/// Arguments passed through to the test runner after `--`.
#[derive(Parser, Debug, Default)]
#[command(name = "runner", no_binary_name = true)]
struct RunnerArgs {
    /// Only run methods whose name contains PATTERN
    #[arg(short = 'k', value_name = "PATTERN")]
    patterns: Vec<String>,

    /// Stop after the first failed or errored method
    #[arg(short, long)]
    failfast: bool,

    /// Test method names to run
    tests: Vec<String>,
}

impl From<RunnerArgs> for Filter {
    fn from(args: RunnerArgs) -> Self {
        Self {
            patterns: args.patterns,
            names: args.tests,
            failfast: args.failfast,
        }
    }
}

fn init_tracing(debug: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if debug {
        "debug"
    } else {
        "info"
    };

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());

    let _ = fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    ExitCode::from(exit_status(run(cli)))
}

/// Process exit status for a command result; errors are printed and map to 3.
fn exit_status(result: Result<i32>) -> u8 {
    match result {
        Ok(code) => u8::try_from(code).unwrap_or(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            3
        }
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(Path::new(path))?,
        None => Config::load_default()?,
    };
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run {
            config,
            openapi,
            debug,
            dry_run,
            report_dir,
            runner_args,
        } => {
            init_tracing(debug, cli.output == OutputFormat::Silent);

            let filter: Filter = RunnerArgs::try_parse_from(&runner_args)
                .context("invalid test runner arguments")?
                .into();
            debug!(?filter, "runner arguments");

            let cfg = load_config(config.as_deref())?;
            let spec = ResolvedSpec::load(Path::new(&openapi))?;
            let suite = Suite::from_parts(cfg, spec)?;

            // Dry run: show plan and exit
            if dry_run {
                let plan = suite.plan(&filter);
                suite.cleanup();
                match cli.output {
                    OutputFormat::Terminal => println!("{}", plan.to_terminal()),
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                    OutputFormat::Silent => {}
                }
                return Ok(0);
            }

            let report = suite.run(&filter);
            let verdict = report.verdict();

            match cli.output {
                OutputFormat::Terminal => {
                    println!("{}", report.to_terminal());
                    if verdict.status == VerdictStatus::Fail {
                        println!("{}: {}", verdict.status, verdict.reason);
                    }
                }
                OutputFormat::Json => {
                    let json_output = serde_json::json!({
                        "verdict": verdict,
                        "totals": report.totals(),
                        "report": report,
                    });
                    println!("{}", serde_json::to_string_pretty(&json_output)?);
                }
                OutputFormat::Silent => {}
            }

            let base_url = suite.context().session.base_url().to_string();
            let backend = suite.context().spec.backend().as_str();
            let requests = suite.cleanup();

            if let Some(dir) = report_dir {
                let data = storage::ReportData {
                    base_url: &base_url,
                    openapi: Path::new(&openapi),
                    backend,
                    report: &report,
                    verdict: &verdict,
                    requests,
                };
                match storage::save_report(Path::new(&dir), &data) {
                    Ok(path) => {
                        if cli.output != OutputFormat::Silent {
                            eprintln!("Report saved: {}", path.display());
                        }
                    }
                    Err(e) => eprintln!("Warning: failed to save report: {e}"),
                }
            }

            Ok(verdict.exit_code)
        }

        Commands::Init => {
            let config_path = "apicheck.json";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - base_url: API under test");
            println!("  - session: bearer token, headers, timeout");
            println!("  - test_cases: valid IDs per endpoint fixture");
            Ok(0)
        }

        Commands::Doctor { config, openapi } => {
            println!("apicheck doctor");
            println!("===============\n");

            let mut ok = true;

            match load_config(config.as_deref()).and_then(|c| {
                c.validate()?;
                Ok(c)
            }) {
                Ok(cfg) => {
                    println!("[OK] Config (base_url: {})", cfg.effective_base_url());
                    let fixtures = cfg.test_cases.len();
                    println!("[OK] {fixtures} fixture(s) configured");
                }
                Err(e) => {
                    ok = false;
                    println!("[NG] Config: {e:#}");
                }
            }

            match ResolvedSpec::load(Path::new(&openapi)) {
                Ok(spec) => {
                    println!(
                        "[OK] OpenAPI document {} (version {}, backend {})",
                        spec.source().display(),
                        spec.version(),
                        spec.backend()
                    );
                    let mut schemas = spec.schema_names();
                    schemas.sort_unstable();
                    println!("[OK] {} schema(s): {}", schemas.len(), schemas.join(", "));
                }
                Err(e) => {
                    ok = false;
                    println!("[NG] OpenAPI document {openapi}: {e}");
                }
            }

            if !ok {
                println!("\nCreate config file:");
                println!("  apicheck init");
                return Ok(1);
            }

            println!("\nReady to run!");
            Ok(0)
        }

        Commands::Schema => {
            let schema = apicheck_core::schema::generate_schema();
            println!("{schema}");
            Ok(0)
        }
    }
}
