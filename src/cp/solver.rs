//! CP solver interface.

use super::model::{Assignment, CpModel};
use std::time::Duration;

/// Status of the solver after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Verified solution found within the budget.
    Optimal,
    /// Verified solution found, but the budget ran out while searching.
    Feasible,
    /// No feasible solution exists.
    Infeasible,
    /// Model is invalid or malformed.
    ModelInvalid,
    /// Time limit hit or the backend gave up; no usable assignment.
    Unknown,
}

/// Solution from a CP solver.
#[derive(Debug, Clone)]
pub struct CpSolution {
    /// Solver status.
    pub status: SolverStatus,
    /// Values of every variable; present only for `Optimal`/`Feasible`.
    pub assignment: Option<Assignment>,
    /// Wall-clock solve time.
    pub elapsed: Duration,
}

impl CpSolution {
    /// Creates an empty solution with the given status.
    pub fn empty(status: SolverStatus) -> Self {
        Self {
            status,
            assignment: None,
            elapsed: Duration::ZERO,
        }
    }
}

/// Solver configuration.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Wall-clock budget; the backend stops on its own when it runs out.
    pub time_limit: Duration,
    /// Seed for backends with randomized tie breaking.
    pub seed: i32,
    /// Forward the backend's own log to the console.
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(60),
            seed: 1234,
            verbose: false,
        }
    }
}

impl SolverConfig {
    pub fn with_time_limit(seconds: f64) -> Self {
        Self {
            time_limit: Duration::from_secs_f64(seconds),
            ..Self::default()
        }
    }
}

/// Trait for CP solver implementations.
///
/// Implementors must only report `Optimal`/`Feasible` together with an
/// assignment that satisfies every constraint of the model.
pub trait CpSolver {
    /// Solves the model and returns a solution.
    fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution;
}
