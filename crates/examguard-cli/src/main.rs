//! examguard CLI: take, validate and review proctored exams.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examguard", version, about = "Proctored exam session engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take an exam, from a script or interactively
    Take {
        /// Exam join code
        #[arg(long)]
        code: String,

        /// Student id recorded with the result
        #[arg(long)]
        student_id: String,

        /// Student name shown on the certificate
        #[arg(long)]
        student_name: String,

        /// Replay a TOML attempt script instead of reading stdin
        #[arg(long)]
        script: Option<PathBuf>,

        /// Grant camera access when the exam asks for it
        #[arg(long)]
        grant_camera: bool,

        /// Directory certificates are written to
        #[arg(long, default_value = "./examguard-results/certificates")]
        certificates: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate exam TOML files
    Validate {
        /// Path to exam file or directory
        #[arg(long)]
        exams: PathBuf,
    },

    /// List stored results
    Results {
        /// Only results for this exam code
        #[arg(long)]
        exam: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,

        /// Write JSON to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write the certificate for a stored result
    Certificate {
        /// Result id, or a unique prefix of it
        #[arg(long)]
        result_id: String,

        /// Output directory
        #[arg(long, default_value = "./examguard-results/certificates")]
        output: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate a fresh exam join code
    NewCode {
        /// Year embedded in the code (default: current year)
        #[arg(long)]
        year: Option<i32>,
    },

    /// Create starter config and the sample exam
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examguard=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            code,
            student_id,
            student_name,
            script,
            grant_camera,
            certificates,
            config,
        } => {
            commands::take::execute(commands::take::TakeArgs {
                code,
                student_id,
                student_name,
                script,
                grant_camera,
                certificates,
                config,
            })
            .await
        }
        Commands::Validate { exams } => commands::validate::execute(exams),
        Commands::Results {
            exam,
            format,
            output,
            config,
        } => commands::results::execute(exam, format, output, config),
        Commands::Certificate {
            result_id,
            output,
            config,
        } => commands::certificate::execute(result_id, output, config).await,
        Commands::NewCode { year } => commands::new_code::execute(year),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
