//! Finite-domain constraint model and the solver contract.
//!
//! The timetable compiler emits a [`CpModel`]: integer variables over
//! explicit value sets plus a small constraint vocabulary (counting,
//! literal equivalence, guarded disequality, element lookup and
//! all-different). Any [`CpSolver`] that honours these semantics can
//! solve it; [`HighsSolver`] lowers the model to a 0-1 ILP for HiGHS.
//!
//! Every assignment a solver returns is re-checked with
//! [`CpModel::check`] before it is handed to the caller.

mod highs;
mod model;
mod solver;

pub use highs::HighsSolver;
pub use model::{Assignment, Constraint, CpModel, Literal, Sense, Term, Value, VarId};
pub use solver::{CpSolution, CpSolver, SolverConfig, SolverStatus};
