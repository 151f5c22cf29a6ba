//! Error types for every stage that can fail before or after the solver runs.
//!
//! Solver outcomes (infeasible, timeout) are not errors; they travel as
//! [`crate::cp::SolverStatus`] values.

use std::path::PathBuf;
use thiserror::Error;

/// The input files are missing or do not have the expected shape.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write `{path}`: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("`{path}` is not valid JSON for this document: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("timetable has no entry for day `{0}`")]
    MissingDay(String),
    #[error("timetable has no row for section `{section}` on `{day}`")]
    MissingCohortRow { section: String, day: String },
    #[error("section `{section}` appears twice on `{day}`")]
    DuplicateCohortRow { section: String, day: String },
}

/// The configuration cannot describe a solvable pass.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown section `{0}`")]
    UnknownSection(String),
    #[error("section `{0}` has no core subject list")]
    MissingCoreSubjects(String),
    #[error("section `{0}` has no theory room")]
    MissingTheoryRoom(String),
    #[error("no teacher configured for core subject `{subject}` of `{section}`")]
    MissingSubjectTeacher { section: String, subject: String },
    #[error("no teacher can be derived for lab `{lab}` of `{section}`")]
    UnmappedLabTeacher { section: String, lab: String },
    #[error("expected exactly two lab groups, got {0}")]
    GroupCount(usize),
    #[error("lab block `{0}` has no slot pair")]
    UnknownLabBlock(String),
    #[error("lab block `{block}` refers to unknown slot `{slot}`")]
    UnknownLabSlot { block: String, slot: String },
    #[error("slot `{slot}` belongs to lab blocks `{first}` and `{second}`")]
    OverlappingLabBlocks {
        slot: String,
        first: String,
        second: String,
    },
    #[error("section `{section}` is owned by passes `{first}` and `{second}`")]
    SectionInTwoPasses {
        section: String,
        first: String,
        second: String,
    },
    #[error("name `{0}` is reserved for placeholder identities")]
    ReservedName(String),
    #[error("solver time budget must be positive, got {0}")]
    TimeBudget(String),
}

/// Cheap consistency checks that must pass before any model is built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresolveError {
    #[error(
        "section `{section}` has {open} 'To Be Assigned' slots \
         but needs {required} to meet the 3-per-week rule"
    )]
    SlotBudgetMismatch {
        section: String,
        open: usize,
        required: usize,
    },
    #[error("section `{section}` already has {count} fixed `{subject}` classes (limit 3)")]
    SubjectOverAssigned {
        section: String,
        subject: String,
        count: usize,
    },
    #[error("section `{section}` already has `{lab}` {count} times for group {group} (limit 1)")]
    LabOverAssigned {
        section: String,
        lab: String,
        group: String,
        count: usize,
    },
}

/// A solved value cannot be resolved back into a name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("variable `{0}` has no value in the assignment")]
    MissingValue(String),
    #[error("value {value} of `{var}` does not name a {kind}")]
    Unresolvable {
        var: String,
        value: i64,
        kind: &'static str,
    },
    #[error("cell ({section}, {day}, {slot}) is missing from the timetable")]
    MissingCell {
        section: String,
        day: String,
        slot: String,
    },
}

/// A joined cell field named more than two parallel identities.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("`{0}` joins more than two parallel identities")]
pub struct TooManyParts(pub String);

/// Any failure of a single pass that is not a solver outcome.
#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Presolve(#[from] PresolveError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error("model is malformed: {0}")]
    Model(String),
}
