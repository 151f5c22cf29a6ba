//! HiGHS backend: the CP model as a 0-1 integer program.
//!
//! Every variable `x` with domain `D` becomes one binary `b[x,v]` per
//! `v in D` with `sum_v b[x,v] = 1`. All constraint kinds are linear over
//! these indicators.

use super::model::{Assignment, Constraint, CpModel, Literal, Sense, Term, Value, VarId};
use super::solver::{CpSolution, CpSolver, SolverConfig, SolverStatus};
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver, variable,
};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::time::Instant;

const EPS: f64 = 1e-9;

/// Solves [`CpModel`]s with the HiGHS MIP solver through `good_lp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        Self
    }
}

/// Indicator binaries, per variable sorted by value.
struct OneHot {
    indicators: Vec<Vec<(Value, Variable)>>,
}

impl OneHot {
    fn get(&self, x: VarId, v: Value) -> Option<Variable> {
        let ind = &self.indicators[x];
        ind.binary_search_by_key(&v, |(val, _)| *val)
            .ok()
            .map(|i| ind[i].1)
    }
}

/// `sum(terms) + constant (sense) rhs`, before the constant moves right.
#[derive(Default)]
struct Row {
    terms: Vec<(f64, Variable)>,
    constant: f64,
}

impl Row {
    fn add(&mut self, coef: f64, var: Option<Variable>) {
        if let Some(v) = var {
            self.terms.push((coef, v));
        }
    }

    fn add_literal(&mut self, coef: f64, lit: Literal, hot: &OneHot) {
        match lit {
            Literal::Eq(x, v) => self.add(coef, hot.get(x, v)),
            Literal::Ne(x, v) => {
                self.constant += coef;
                self.add(-coef, hot.get(x, v));
            }
        }
    }
}

struct LinearRow {
    terms: Vec<(f64, Variable)>,
    sense: Sense,
    rhs: f64,
}

/// Collects rows, evaluating variable-free rows on the spot.
struct Rows {
    rows: Vec<LinearRow>,
    violated: Option<usize>,
}

impl Rows {
    fn push(&mut self, origin: usize, row: Row, sense: Sense, rhs: f64) {
        let rhs = rhs - row.constant;
        if row.terms.is_empty() {
            let ok = match sense {
                Sense::Eq => rhs.abs() < EPS,
                Sense::Le => 0.0 <= rhs + EPS,
            };
            if !ok && self.violated.is_none() {
                self.violated = Some(origin);
            }
            return;
        }
        self.rows.push(LinearRow {
            terms: row.terms,
            sense,
            rhs,
        });
    }
}

fn lower(model: &CpModel, hot: &OneHot) -> Rows {
    let mut rows = Rows {
        rows: Vec::new(),
        violated: None,
    };

    for (i, c) in model.constraints().iter().enumerate() {
        match c {
            Constraint::Count {
                vars,
                values,
                sense,
                rhs,
            } => {
                let mut row = Row::default();
                for &x in vars {
                    for &v in values {
                        row.add(1.0, hot.get(x, v));
                    }
                }
                rows.push(i, row, *sense, *rhs as f64);
            }
            Constraint::Equivalent { lhs, rhs } => {
                let mut row = Row::default();
                row.add_literal(1.0, *lhs, hot);
                row.add_literal(-1.0, *rhs, hot);
                rows.push(i, row, Sense::Eq, 0.0);
            }
            Constraint::NotEqualIf { guard, a, b } => {
                // b[a,v] + b[b,v] + guard <= 2 for every shared value
                for &v in &model.var(*a).domain {
                    let Some(bv) = hot.get(*b, v) else { continue };
                    let mut row = Row::default();
                    row.add(1.0, hot.get(*a, v));
                    row.add(1.0, Some(bv));
                    row.add_literal(1.0, *guard, hot);
                    rows.push(i, row, Sense::Le, 2.0);
                }
            }
            Constraint::Element {
                index,
                table,
                target,
            } => {
                let target_var = model.var(*target);
                for &idx in &model.var(*index).domain {
                    let entry = usize::try_from(idx).ok().and_then(|k| table.get(k));
                    if !entry.is_some_and(|t| target_var.contains(*t)) {
                        let mut row = Row::default();
                        row.add(1.0, hot.get(*index, idx));
                        rows.push(i, row, Sense::Eq, 0.0);
                    }
                }
                for &t in &target_var.domain {
                    let mut row = Row::default();
                    row.add(1.0, hot.get(*target, t));
                    for (k, _) in table.iter().enumerate().filter(|(_, e)| **e == t) {
                        row.add(-1.0, hot.get(*index, k as Value));
                    }
                    rows.push(i, row, Sense::Eq, 0.0);
                }
            }
            Constraint::AllDifferent { terms } => {
                let mut per_value: BTreeMap<Value, Row> = BTreeMap::new();
                for term in terms {
                    match *term {
                        Term::Const(v) => per_value.entry(v).or_default().constant += 1.0,
                        Term::Var(x) => {
                            for &v in &model.var(x).domain {
                                per_value.entry(v).or_default().add(1.0, hot.get(x, v));
                            }
                        }
                    }
                }
                for row in per_value.into_values() {
                    rows.push(i, row, Sense::Le, 1.0);
                }
            }
        }
    }
    rows
}

fn decode<S: Solution>(hot: &OneHot, solution: &S) -> Option<Assignment> {
    hot.indicators
        .iter()
        .map(|ind| {
            let mut chosen = ind.iter().filter(|(_, b)| solution.value(*b) > 0.5);
            match (chosen.next(), chosen.next()) {
                (Some((v, _)), None) => Some(*v),
                _ => None,
            }
        })
        .collect::<Option<Vec<_>>>()
        .map(Assignment::new)
}

impl CpSolver for HighsSolver {
    fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution {
        let start_time = Instant::now();
        if let Err(e) = model.validate() {
            warn!("Model `{}` is invalid: {e}", model.name);
            return CpSolution::empty(SolverStatus::ModelInvalid);
        }

        if model.var_count() == 0 {
            let empty = Assignment::default();
            return match model.check(&empty) {
                Ok(()) => CpSolution {
                    status: SolverStatus::Optimal,
                    assignment: Some(empty),
                    elapsed: start_time.elapsed(),
                },
                Err(v) => {
                    info!("Model `{}` has no variables and {v}", model.name);
                    CpSolution::empty(SolverStatus::Infeasible)
                }
            };
        }

        let mut problem = ProblemVariables::new();
        let hot = OneHot {
            indicators: model
                .vars()
                .iter()
                .map(|v| {
                    v.domain
                        .iter()
                        .map(|&val| (val, problem.add(variable().binary())))
                        .collect()
                })
                .collect(),
        };

        let rows = lower(model, &hot);
        if let Some(i) = rows.violated {
            info!(
                "Model `{}` is infeasible on fixed data alone: {:?}",
                model.name,
                model.constraints()[i]
            );
            return CpSolution::empty(SolverStatus::Infeasible);
        }
        let binaries: usize = hot.indicators.iter().map(Vec::len).sum();
        debug!(
            "Lowered `{}` to {} binaries and {} rows",
            model.name,
            binaries,
            rows.rows.len() + hot.indicators.len()
        );

        let mut lp = problem
            .minimise(Expression::from(0.0))
            .using(default_solver)
            .set_option("threads", 1) // single thread for reproducibility
            .set_option("random_seed", config.seed)
            .set_option("time_limit", config.time_limit.as_secs_f64())
            .set_option("log_to_console", if config.verbose { "true" } else { "false" });

        for ind in &hot.indicators {
            let one_of: Expression = ind.iter().map(|(_, b)| *b).sum();
            lp.add_constraint(constraint!(one_of == 1));
        }
        for row in rows.rows {
            let lhs = row
                .terms
                .iter()
                .fold(Expression::from(0.0), |acc, (c, v)| acc + *c * *v);
            let rhs = row.rhs;
            match row.sense {
                Sense::Eq => lp.add_constraint(constraint!(lhs == rhs)),
                Sense::Le => lp.add_constraint(constraint!(lhs <= rhs)),
            };
        }

        let outcome = lp.solve();
        let elapsed = start_time.elapsed();
        let solution = match outcome {
            Ok(s) => s,
            // the objective is constant, so "unbounded" can only mean infeasible
            Err(ResolutionError::Infeasible | ResolutionError::Unbounded) => {
                return CpSolution {
                    status: SolverStatus::Infeasible,
                    assignment: None,
                    elapsed,
                };
            }
            Err(e) => {
                warn!("HiGHS stopped without a solution after {elapsed:.2?}: {e}");
                return CpSolution {
                    status: SolverStatus::Unknown,
                    assignment: None,
                    elapsed,
                };
            }
        };

        let Some(assignment) = decode(&hot, &solution) else {
            warn!("HiGHS returned no integral assignment after {elapsed:.2?}");
            return CpSolution {
                status: SolverStatus::Unknown,
                assignment: None,
                elapsed,
            };
        };
        if let Err(v) = model.check(&assignment) {
            warn!("Discarding HiGHS assignment for `{}`: {v}", model.name);
            return CpSolution {
                status: SolverStatus::Unknown,
                assignment: None,
                elapsed,
            };
        }

        let status = if elapsed < config.time_limit {
            SolverStatus::Optimal
        } else {
            SolverStatus::Feasible
        };
        CpSolution {
            status,
            assignment: Some(assignment),
            elapsed,
        }
    }
}
