//! Compile, solve and materialize cohorts stage by stage.
//!
//! Each stage owns a set of cohorts and reads the snapshot produced by the
//! stage before it; cohorts solved earlier are plain fixed data to later
//! stages. A stage that ends infeasible or unknown leaves the snapshot as
//! it was and the next stage still runs.

use crate::constraints;
use crate::cp::{CpSolver, SolverConfig, SolverStatus};
use crate::data::{Config, PassReport, Timetable};
use crate::encoder::{self, Encoding};
use crate::error::{ConfigError, PassError};
use crate::index::TimetableIndex;
use crate::materialize::{self, Written};
use crate::registry::Registry;
use log::{info, warn};
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// A model ready for the solver, with the tables needed to decode it.
#[derive(Debug)]
pub struct CompiledPass {
    pub registry: Registry,
    pub encoding: Encoding,
}

/// Validates, presolves and builds the model for `sections`.
pub fn compile_pass(
    config: &Config,
    timetable: &Timetable,
    sections: &[String],
) -> Result<CompiledPass, PassError> {
    config.validate_pass(sections)?;
    let index = TimetableIndex::build(config, timetable)?;
    index.require_rows(sections)?;
    for section in sections {
        let open = index.check_slot_budget(section)?;
        index.check_lab_budget(section)?;
        info!("{section}: {open} open theory cells match the weekly budget");
    }

    let registry = Registry::build(config, timetable, sections);
    let mut encoding = encoder::encode(config, &index, &registry, sections)?;
    constraints::generate(&mut encoding, config, &index, &registry);
    info!(
        "Model `{}`: {} variables, {} constraints {:?}",
        encoding.model.name,
        encoding.model.var_count(),
        encoding.model.constraint_count(),
        encoding.model.summary()
    );
    Ok(CompiledPass { registry, encoding })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Solved(Written),
    Infeasible,
    /// Time budget exhausted or the solver gave up.
    Unknown,
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassOutcome::Solved(_) => write!(f, "solved"),
            PassOutcome::Infeasible => write!(f, "infeasible"),
            PassOutcome::Unknown => write!(f, "unknown"),
        }
    }
}

/// The result of one pass. `timetable` is present only when solved.
#[derive(Debug)]
pub struct PassResult {
    pub outcome: PassOutcome,
    pub timetable: Option<Timetable>,
}

/// Runs one complete compile-solve-materialize cycle.
pub fn solve_pass<S: CpSolver>(
    solver: &S,
    config: &Config,
    timetable: &Timetable,
    sections: &[String],
) -> Result<PassResult, PassError> {
    let compiled = compile_pass(config, timetable, sections)?;
    let model = &compiled.encoding.model;
    let solver_config = SolverConfig::with_time_limit(config.settings.solver_timeout_seconds);
    let solution = solver.solve(model, &solver_config);
    info!("Solver finished with {:?} in {:.2?}", solution.status, solution.elapsed);

    match (solution.status, solution.assignment) {
        (SolverStatus::Optimal | SolverStatus::Feasible, Some(assignment)) => {
            let (out, written) = materialize::materialize(
                &compiled.encoding,
                &assignment,
                config,
                &compiled.registry,
                timetable,
            )?;
            Ok(PassResult {
                outcome: PassOutcome::Solved(written),
                timetable: Some(out),
            })
        }
        (SolverStatus::Infeasible, _) => {
            warn!("No valid timetable exists for {sections:?}; relax the fixed data and retry");
            Ok(PassResult {
                outcome: PassOutcome::Infeasible,
                timetable: None,
            })
        }
        (SolverStatus::ModelInvalid, _) => {
            Err(PassError::Model(model.validate().err().unwrap_or_default()))
        }
        _ => {
            warn!("Solver stopped without a solution for {sections:?}");
            Ok(PassResult {
                outcome: PassOutcome::Unknown,
                timetable: None,
            })
        }
    }
}

/// One step of the pipeline: a name and the cohorts it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub sections: Vec<String>,
}

impl Stage {
    pub fn new(name: impl Into<String>, sections: Vec<String>) -> Self {
        Self {
            name: name.into(),
            sections,
        }
    }
}

/// The timetable threaded from stage to stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timetable: Timetable,
    /// Number of stages that have written into this snapshot.
    pub generation: usize,
    pub produced_by: Option<String>,
}

impl Snapshot {
    pub fn new(timetable: Timetable) -> Self {
        Self {
            timetable,
            generation: 0,
            produced_by: None,
        }
    }
}

/// A stage stopped the run with an error. `snapshot` and `reports` hold
/// what the stages before it produced.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {source}")]
pub struct StageError {
    pub stage: String,
    pub snapshot: Snapshot,
    pub reports: Vec<PassReport>,
    pub source: PassError,
}

pub struct Pipeline<S> {
    solver: S,
    stages: Vec<Stage>,
}

impl<S: CpSolver> Pipeline<S> {
    pub fn new(solver: S, stages: Vec<Stage>) -> Self {
        Self { solver, stages }
    }

    /// The configured passes, or a single stage over every section.
    pub fn from_config(solver: S, config: &Config) -> Result<Self, ConfigError> {
        let mut stages: Vec<Stage> = config
            .passes()?
            .into_iter()
            .map(|p| Stage::new(p.name, p.sections))
            .collect();
        if stages.is_empty() {
            stages.push(Stage::new("all", config.sections.clone()));
        }
        Ok(Self::new(solver, stages))
    }

    #[cfg(test)]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Runs every stage in order. Errors abort the run but hand back the
    /// snapshot reached so far; solver outcomes do not abort.
    pub fn run(
        &self,
        config: &Config,
        mut snapshot: Snapshot,
    ) -> Result<(Snapshot, Vec<PassReport>), StageError> {
        let mut reports = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            info!(
                "Stage `{}` on {:?} (generation {})",
                stage.name, stage.sections, snapshot.generation
            );
            let start_time = Instant::now();
            let attempt = solve_pass(&self.solver, config, &snapshot.timetable, &stage.sections);
            let result = match attempt {
                Ok(result) => result,
                Err(source) => {
                    return Err(StageError {
                        stage: stage.name.clone(),
                        snapshot,
                        reports,
                        source,
                    });
                }
            };

            let written = match &result.outcome {
                PassOutcome::Solved(w) => *w,
                _ => Written::default(),
            };
            let report = PassReport {
                stage: stage.name.clone(),
                sections: stage.sections.clone(),
                outcome: result.outcome.to_string(),
                theory_cells_written: written.theory_cells,
                lab_blocks_written: written.lab_blocks,
                elapsed_ms: start_time.elapsed().as_millis(),
            };
            info!("{report}");
            reports.push(report);

            if let Some(timetable) = result.timetable {
                snapshot = Snapshot {
                    timetable,
                    generation: snapshot.generation + 1,
                    produced_by: Some(stage.name.clone()),
                };
            }
        }
        Ok((snapshot, reports))
    }
}
