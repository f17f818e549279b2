//! Command-line surfaces of the stage executables and the `ci-metadata` utility.
//!
//! Each stage binary is a thin `main` around [`stage_main`]. Everything
//! between argument parsing and the exit code lives here so it can be driven
//! from tests: [`run`] for stages, [`run_metadata`] for the utility.
//!
//! ## Exit codes
//! - `0`: every step succeeded
//! - [`EXIT_USAGE`]: a required option was missing or empty (usage on stdout)
//! - [`EXIT_METADATA`]: config, descriptor or CI metadata could not be resolved
//! - [`EXIT_COMMAND`]: an external tool failed or could not be launched

use anyhow::Result;
use ci_stages_core::app_info::read_app_info;
use ci_stages_core::ci_info::{ci_info_path, get_property, set_properties};
use ci_stages_core::error::{StageError, UsageError};
use ci_stages_core::runner::ProcessRunner;
use ci_stages_core::stages::{
    run_stage, Stage, StageInputs, StageReport, CI_METADATA_DIR_FLAG, REPO_DIR_FLAG,
};
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::load_config::{resolve_config, CONFIG_ENV};

pub const EXIT_USAGE: u8 = 1;
pub const EXIT_METADATA: u8 = 2;
pub const EXIT_COMMAND: u8 = 3;

/// Options shared by the compile, test and publish executables.
///
/// Paths are taken as plain strings so that an empty value reaches input
/// validation instead of being rejected by the parser.
#[derive(Parser, Debug, Default)]
#[clap(version)]
pub struct StageArgs {
    /// Path to the git repository directory of the application
    #[clap(long, value_name = "PATH")]
    pub repo_dir: Option<String>,

    /// Path to the app CI metadata folder
    #[clap(long, value_name = "PATH")]
    pub ci_metadata_dir: Option<String>,

    /// YAML file overriding path conventions and tool locations
    #[clap(long, value_name = "FILE", env = CONFIG_ENV)]
    pub config: Option<PathBuf>,
}

impl StageArgs {
    pub fn command_for(stage: Stage) -> clap::Command {
        Self::command()
            .name(binary_name(stage))
            .about(about(stage))
    }

    /// Parses the process arguments for `stage`, exiting on malformed flags.
    pub fn parse_for(stage: Stage) -> Self {
        let matches = Self::command_for(stage).get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}

pub fn binary_name(stage: Stage) -> &'static str {
    match stage {
        Stage::Compile => "ci-compile",
        Stage::Test => "ci-test",
        Stage::Publish => "ci-publish",
    }
}

fn about(stage: Stage) -> &'static str {
    match stage {
        Stage::Compile => {
            "Increment the build number, remove previous containers and run the compile compose service"
        }
        Stage::Test => "Run the test compose service (--ci-metadata-dir is accepted but not required)",
        Stage::Publish => "Build the container image for the current CI version",
    }
}

/// Installs the fmt subscriber on stderr; stdout belongs to the external tools.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Validates inputs, loads config and drives `stage` with real processes.
pub async fn run(stage: Stage, args: StageArgs) -> Result<StageReport> {
    tracing::info!(stage = %stage, "trace_initialised");

    let inputs = StageInputs::validate(
        stage,
        args.repo_dir.map(PathBuf::from),
        args.ci_metadata_dir.map(PathBuf::from),
    )?;
    let config = resolve_config(args.config.as_deref())?;
    let runner = ProcessRunner::new();

    tracing::info!(stage = %stage, repo_dir = %inputs.repo_dir.display(), "Starting stage");
    match run_stage(stage, &inputs, &config, &runner).await {
        Ok(report) => {
            tracing::info!(stage = %stage, app = %report.app.name, steps = report.steps.len(), "Stage succeeded");
            Ok(report)
        }
        Err(e) => {
            tracing::error!(stage = %stage, error = %e, "Stage failed");
            Err(e.into())
        }
    }
}

/// Maps an error to the process exit status.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<UsageError>().is_some() {
        return EXIT_USAGE;
    }
    match err.downcast_ref::<StageError>() {
        Some(StageError::Usage(_)) => EXIT_USAGE,
        Some(StageError::Step { .. }) => EXIT_COMMAND,
        Some(StageError::Metadata(_)) | None => EXIT_METADATA,
    }
}

/// Turns a run result into an exit code, printing usage for missing options.
pub fn finish<T>(result: Result<T>, mut command: clap::Command) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            let status = exit_status(&err);
            if status == EXIT_USAGE {
                println!("{err}");
                println!();
                println!("{}", command.render_help());
            } else {
                eprintln!("Error: {err:#}");
            }
            ExitCode::from(status)
        }
    }
}

/// Entry point shared by the three stage binaries.
pub async fn stage_main(stage: Stage) -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = StageArgs::parse_for(stage);
    let result = run(stage, args).await;
    finish(result, StageArgs::command_for(stage))
}

/// Reads and edits CI metadata files.
#[derive(Parser, Debug)]
#[clap(
    name = "ci-metadata",
    version,
    about = "Inspect and update the CI metadata of an application"
)]
pub struct MetadataCli {
    #[clap(subcommand)]
    pub command: MetadataCommand,
}

#[derive(Subcommand, Debug)]
pub enum MetadataCommand {
    /// Print the CI info file path of the application checked out at --repo-dir
    Path {
        /// Path to the git repository directory of the application
        #[clap(long, value_name = "PATH")]
        repo_dir: Option<String>,
        /// Path to the app CI metadata folder
        #[clap(long, value_name = "PATH")]
        ci_metadata_dir: Option<String>,
        /// YAML file overriding path conventions
        #[clap(long, value_name = "FILE", env = CONFIG_ENV)]
        config: Option<PathBuf>,
    },
    /// Print a dotted property (e.g. ci-data.current-version), or null when absent
    Get {
        /// CI info file to read
        #[clap(long, short = 'f', value_name = "FILE")]
        file: Option<String>,
        /// Dotted property path
        #[clap(long, short = 'p')]
        property: Option<String>,
    },
    /// Write a JSON map of dotted properties into the file
    Set {
        /// CI info file to update
        #[clap(long, short = 'f', value_name = "FILE")]
        file: Option<String>,
        /// JSON object, e.g. '{"ci-data.current-version": "1.5.0"}'
        #[clap(long, short = 'p')]
        properties: Option<String>,
    },
}

fn required(value: Option<String>, flag: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            missing.push(flag);
            String::new()
        }
    }
}

/// Runs one `ci-metadata` subcommand and returns what should be printed.
pub fn run_metadata(cli: MetadataCli) -> Result<Option<String>> {
    tracing::info!("trace_initialised");
    let mut missing = Vec::new();

    match cli.command {
        MetadataCommand::Path {
            repo_dir,
            ci_metadata_dir,
            config,
        } => {
            let repo_dir = required(repo_dir, REPO_DIR_FLAG, &mut missing);
            let ci_metadata_dir = required(ci_metadata_dir, CI_METADATA_DIR_FLAG, &mut missing);
            if !missing.is_empty() {
                return Err(UsageError { missing }.into());
            }
            let config = resolve_config(config.as_deref())?;
            let app = read_app_info(Path::new(&repo_dir), &config.layout)?;
            let path = ci_info_path(Path::new(&ci_metadata_dir), &app, &config.layout);
            Ok(Some(path.display().to_string()))
        }
        MetadataCommand::Get { file, property } => {
            let file = required(file, "--file", &mut missing);
            let property = required(property, "--property", &mut missing);
            if !missing.is_empty() {
                return Err(UsageError { missing }.into());
            }
            let value = get_property(Path::new(&file), &property)?;
            Ok(Some(value.unwrap_or_else(|| "null".to_string())))
        }
        MetadataCommand::Set { file, properties } => {
            let file = required(file, "--file", &mut missing);
            let properties = required(properties, "--properties", &mut missing);
            if !missing.is_empty() {
                return Err(UsageError { missing }.into());
            }
            set_properties(Path::new(&file), &properties)?;
            tracing::info!(file = %file, "CI info updated");
            Ok(None)
        }
    }
}

/// Entry point of the `ci-metadata` binary.
pub fn metadata_main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = MetadataCli::parse();
    match run_metadata(cli) {
        Ok(output) => {
            if let Some(output) = output {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => finish::<()>(Err(err), MetadataCli::command()),
    }
}
