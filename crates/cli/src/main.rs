//! Coursebridge CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `config.toml`, then apply
//!    `CANVAS_ACCESS_TOKEN` and command-line overrides.
//! 2. **Wire observability**: install `tracing-subscriber` (text or JSON, with
//!    optional OTLP export). Every invocation runs inside a root span carrying
//!    a fresh [`RunId`].
//! 3. **Construct infrastructure**: build the Canvas gateway and the zip
//!    archiver and hand them to the `coursework` workflows.
//! 4. **Report**: print the command's summary. The exit status is non-zero
//!    when a precondition fails or when every attempted item failed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use coursework::{AssignmentId, RunId, Summary};
use tracing::{error, info_span, Instrument};

mod commands;
mod config;
mod observability;
mod wizard;

use config::{Config, Overrides, TOKEN_ENV};
use observability::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "coursebridge")]
#[command(version, about = "Bridge Canvas assignments and version-control repositories")]
struct Cli {
    /// Configuration file (default: <config dir>/coursebridge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Canvas API base URL, e.g. https://canvas.example.edu/api/v1
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[arg(long, global = true)]
    course_id: Option<u64>,

    /// Canvas access token; prefer the CANVAS_ACCESS_TOKEN environment variable
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// Mapping table between Canvas logins and VCS accounts
    #[arg(long, global = true)]
    mapping: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set up a course directory from a course URL
    InitCourse {
        /// e.g. https://canvas.example.edu/courses/1234
        url: String,
        /// Directory to create (default: course-<id>)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Build the Canvas-to-VCS mapping table interactively
    CreateMapping {
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Replace an existing table
        #[arg(long)]
        force: bool,
    },
    /// Check an assignment's settings and post the start message
    PrepareAssignment { assignment: u64 },
    /// Post a message on an assignment's submissions
    SendMessage {
        assignment: u64,
        #[arg(short, long)]
        message: Option<String>,
        /// Only these submissions (repeatable)
        #[arg(long = "submission")]
        submissions: Vec<u64>,
        /// Post even where the message is already present
        #[arg(long)]
        resend: bool,
    },
    /// Write the roster of students and groups taking part in an assignment
    CreateStudentsFile {
        assignment: u64,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep students without a group in a group assignment
        #[arg(long)]
        include_groupless: bool,
    },
    /// Archive cloned repositories and submit them to Canvas
    Collect {
        assignment: u64,
        #[arg(required = true)]
        repositories: Vec<PathBuf>,
        /// Template name to strip from repository directory names
        #[arg(long)]
        template: Option<String>,
        /// Archive file name without extension
        #[arg(long)]
        archive_name: Option<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::InitCourse { .. } => "init-course",
            Commands::CreateMapping { .. } => "create-mapping",
            Commands::PrepareAssignment { .. } => "prepare-assignment",
            Commands::SendMessage { .. } => "send-message",
            Commands::CreateStudentsFile { .. } => "create-students-file",
            Commands::Collect { .. } => "collect",
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _telemetry = observability::init(cli.log_format, cli.verbose)?;

    let run_id = RunId::new_random();
    let span = info_span!("command", run_id = %run_id, command = cli.command.name());
    let outcome = run(cli, run_id).instrument(span).await;

    match outcome {
        Ok(summary) => {
            println!("{summary}");
            Ok(if summary.is_total_failure() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Err(err) => {
            error!(run_id = %run_id, "{err:#}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli, run_id: RunId) -> Result<Summary> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply(
        std::env::var(TOKEN_ENV).ok(),
        &Overrides {
            base_url: cli.base_url,
            course_id: cli.course_id,
            access_token: cli.access_token,
            mapping: cli.mapping,
        },
    );

    match cli.command {
        Commands::InitCourse { url, dir } => commands::cmd_init_course(&config, &url, dir).await,
        Commands::CreateMapping { output, force } => {
            commands::cmd_create_mapping(&config, output, force).await
        }
        Commands::PrepareAssignment { assignment } => {
            commands::cmd_prepare_assignment(&config, AssignmentId::new(assignment)).await
        }
        Commands::SendMessage {
            assignment,
            message,
            submissions,
            resend,
        } => {
            commands::cmd_send_message(
                &config,
                AssignmentId::new(assignment),
                message,
                submissions,
                resend,
            )
            .await
        }
        Commands::CreateStudentsFile {
            assignment,
            output,
            include_groupless,
        } => {
            commands::cmd_create_students_file(
                &config,
                AssignmentId::new(assignment),
                output,
                include_groupless,
            )
            .await
        }
        Commands::Collect {
            assignment,
            repositories,
            template,
            archive_name,
        } => {
            commands::cmd_collect(
                &config,
                run_id,
                AssignmentId::new(assignment),
                &repositories,
                template,
                archive_name,
            )
            .await
        }
    }
}
