mod audit;
mod config;
mod constraints;
mod cp;
mod data;
mod encoder;
mod error;
#[cfg(test)]
mod fixtures;
mod index;
mod materialize;
mod pipeline;
mod registry;
mod server;
mod store;

use crate::cp::HighsSolver;
use crate::error::PassError;
use crate::pipeline::{Pipeline, Snapshot, StageError};
use log::{error, warn};
use std::path::Path;
use std::process::ExitCode;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const USAGE: &str = "usage: timetable_solver [solve <config> <timetable> <output> \
                     | audit <config> <timetable> | serve [addr]]";

/// Runs every configured pass. `Ok(false)` when some pass found no solution.
/// A failing pass still leaves the work of the passes before it in `output`.
fn run_solve(config: &Path, timetable: &Path, output: &Path) -> Result<bool, PassError> {
    let config = store::load_config(config)?;
    let timetable = store::load_snapshot(output, timetable)?;
    let pipeline = Pipeline::from_config(HighsSolver, &config)?;

    let (snapshot, reports, failure) = match pipeline.run(&config, Snapshot::new(timetable)) {
        Ok((snapshot, reports)) => (snapshot, reports, None),
        Err(StageError {
            stage,
            snapshot,
            reports,
            source,
        }) => {
            warn!("Stage `{stage}` failed; keeping the output of the stages before it");
            (snapshot, reports, Some(source))
        }
    };
    for report in &reports {
        println!("{report}");
    }
    if snapshot.generation > 0 {
        store::save_timetable(output, &snapshot.timetable)?;
    }
    match failure {
        Some(source) => Err(source),
        None => Ok(reports.iter().all(|r| r.outcome == "solved")),
    }
}

fn run_audit(config: &Path, timetable: &Path) -> Result<bool, PassError> {
    let config = store::load_config(config)?;
    let timetable = store::load_timetable(timetable)?;
    let findings = audit::audit(&config, &timetable, &config.sections);
    for finding in &findings {
        println!("{finding}");
    }
    println!("{} findings", findings.len());
    Ok(findings.is_empty())
}

fn exit_code(result: Result<bool, PassError>) -> ExitCode {
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["solve", config, timetable, output] => {
            exit_code(run_solve(Path::new(config), Path::new(timetable), Path::new(output)))
        }
        ["audit", config, timetable] => {
            exit_code(run_audit(Path::new(config), Path::new(timetable)))
        }
        [] | ["serve"] => serve(DEFAULT_ADDR).await,
        ["serve", addr] => serve(addr).await,
        _ => {
            eprintln!("{USAGE}");
            ExitCode::from(64)
        }
    }
}

async fn serve(addr: &str) -> ExitCode {
    match server::run_server(addr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server on {addr} failed: {e}");
            ExitCode::FAILURE
        }
    }
}
