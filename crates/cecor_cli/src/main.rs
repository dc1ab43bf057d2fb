//! Operator entry point for the CECOR back-office store.
//!
//! # Responsibility
//! - Migrate a database file to the schema this build expects.
//! - Admit one student into one course from the command line.
//!
//! Output is one `key=value` line per command so scripts can parse it.

use cecor_core::db::migrations::latest_version;
use cecor_core::db::open_db;
use cecor_core::{default_log_level, init_logging, sqlite_enrollment_service, NewEnrollment};
use clap::{Parser, Subcommand};
use log::error;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

/// CECOR back-office operator tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Absolute directory for rotated log files. Logging is off when unset.
    #[arg(long, env = "CECOR_LOG_DIR", global = true)]
    log_dir: Option<String>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "CECOR_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the database schema
    Migrate {
        /// Path to the SQLite database file
        #[arg(long, env = "CECOR_DB")]
        db: PathBuf,
    },

    /// Enroll a student in a course
    Enroll {
        /// Path to the SQLite database file
        #[arg(long, env = "CECOR_DB")]
        db: PathBuf,

        /// Student id
        #[arg(long)]
        student: Uuid,

        /// Course id
        #[arg(long)]
        course: Uuid,

        /// Enrollment number; generated when omitted
        #[arg(long)]
        number: Option<String>,
    },

    /// Print the core library version
    Version,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(log_dir) = args.log_dir.as_deref() {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("status=error error={err}");
            return ExitCode::FAILURE;
        }
    }

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("status=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Migrate { db } => {
            open_db(&db)?;
            println!("status=ok schema_version={}", latest_version());
        }
        Command::Enroll {
            db,
            student,
            course,
            number,
        } => {
            let conn = open_db(&db)?;
            let service = sqlite_enrollment_service(&conn)?;
            let request = NewEnrollment {
                enrollment_number: number,
                ..NewEnrollment::new(student, course)
            };
            let enrollment = service.enroll_student(&request)?;
            println!(
                "status=ok enrollment_id={} enrollment_number={}",
                enrollment.id, enrollment.enrollment_number
            );
        }
        Command::Version => {
            println!("cecor_core version={}", cecor_core::core_version());
        }
    }
    Ok(())
}
