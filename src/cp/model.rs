//! CP model definition.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type VarId = usize;
pub type Value = i64;

/// An integer variable over an explicit, sorted set of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntVar {
    /// Variable name, used in logs and error messages.
    pub name: String,
    /// Allowed values, ascending and without duplicates.
    pub domain: Vec<Value>,
}

impl IntVar {
    pub fn new(name: impl Into<String>, domain: impl IntoIterator<Item = Value>) -> Self {
        let domain: BTreeSet<Value> = domain.into_iter().collect();
        Self {
            name: name.into(),
            domain: domain.into_iter().collect(),
        }
    }

    pub fn contains(&self, value: Value) -> bool {
        self.domain.binary_search(&value).is_ok()
    }
}

/// `x == v` or `x != v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Eq(VarId, Value),
    Ne(VarId, Value),
}

impl Literal {
    pub fn var(self) -> VarId {
        match self {
            Literal::Eq(x, _) | Literal::Ne(x, _) => x,
        }
    }

    pub fn holds(self, assignment: &Assignment) -> bool {
        match self {
            Literal::Eq(x, v) => assignment.value(x) == Some(v),
            Literal::Ne(x, v) => assignment.value(x).is_some_and(|a| a != v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Eq,
    Le,
}

/// A member of an all-different group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Var(VarId),
    Const(Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// The number of `vars` taking a value in `values` compares to `rhs`.
    Count {
        vars: Vec<VarId>,
        values: Vec<Value>,
        sense: Sense,
        rhs: usize,
    },
    /// Both literals are true or both are false.
    Equivalent { lhs: Literal, rhs: Literal },
    /// `a != b` whenever `guard` holds.
    NotEqualIf { guard: Literal, a: VarId, b: VarId },
    /// `target == table[index]`.
    Element {
        index: VarId,
        table: Vec<Value>,
        target: VarId,
    },
    /// All terms take pairwise distinct values.
    AllDifferent { terms: Vec<Term> },
}

impl Constraint {
    fn vars(&self) -> Vec<VarId> {
        match self {
            Constraint::Count { vars, .. } => vars.clone(),
            Constraint::Equivalent { lhs, rhs } => vec![lhs.var(), rhs.var()],
            Constraint::NotEqualIf { guard, a, b } => vec![guard.var(), *a, *b],
            Constraint::Element { index, target, .. } => vec![*index, *target],
            Constraint::AllDifferent { terms } => terms
                .iter()
                .filter_map(|t| match t {
                    Term::Var(x) => Some(*x),
                    Term::Const(_) => None,
                })
                .collect(),
        }
    }
}

/// Values for every variable of a model, indexed by [`VarId`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    values: Vec<Value>,
}

impl Assignment {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn value(&self, var: VarId) -> Option<Value> {
        self.values.get(var).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// The first constraint an assignment breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingValue(String),
    OutOfDomain { var: String, value: Value },
    Constraint { index: usize, constraint: Constraint },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingValue(var) => write!(f, "`{var}` has no value"),
            Violation::OutOfDomain { var, value } => {
                write!(f, "`{var}` = {value} is outside its domain")
            }
            Violation::Constraint { index, constraint } => {
                write!(f, "constraint #{index} is violated: {constraint:?}")
            }
        }
    }
}

/// A finite-domain constraint model.
#[derive(Debug, Clone, Default)]
pub struct CpModel {
    /// Model name.
    pub name: String,
    vars: Vec<IntVar>,
    constraints: Vec<Constraint>,
}

impl CpModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn new_var(
        &mut self,
        name: impl Into<String>,
        domain: impl IntoIterator<Item = Value>,
    ) -> VarId {
        self.vars.push(IntVar::new(name, domain));
        self.vars.len() - 1
    }

    pub fn var(&self, id: VarId) -> &IntVar {
        &self.vars[id]
    }

    pub fn vars(&self) -> &[IntVar] {
        &self.vars
    }

    pub fn add(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Checks references and domains.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(v) = self.vars.iter().find(|v| v.domain.is_empty()) {
            return Err(format!("variable `{}` has an empty domain", v.name));
        }
        for (i, c) in self.constraints.iter().enumerate() {
            if let Some(x) = c.vars().into_iter().find(|x| *x >= self.vars.len()) {
                return Err(format!("constraint #{i} refers to undefined variable {x}"));
            }
        }
        Ok(())
    }

    /// Verifies `assignment` against every domain and constraint.
    pub fn check(&self, assignment: &Assignment) -> Result<(), Violation> {
        for (x, var) in self.vars.iter().enumerate() {
            let value = assignment
                .value(x)
                .ok_or_else(|| Violation::MissingValue(var.name.clone()))?;
            if !var.contains(value) {
                return Err(Violation::OutOfDomain {
                    var: var.name.clone(),
                    value,
                });
            }
        }
        for (index, c) in self.constraints.iter().enumerate() {
            if !satisfied(c, assignment) {
                return Err(Violation::Constraint {
                    index,
                    constraint: c.clone(),
                });
            }
        }
        Ok(())
    }

    /// Constraint counts by kind, for logging.
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for c in &self.constraints {
            let kind = match c {
                Constraint::Count { .. } => "count",
                Constraint::Equivalent { .. } => "equivalent",
                Constraint::NotEqualIf { .. } => "not_equal_if",
                Constraint::Element { .. } => "element",
                Constraint::AllDifferent { .. } => "all_different",
            };
            *out.entry(kind).or_insert(0) += 1;
        }
        out
    }
}

fn satisfied(c: &Constraint, a: &Assignment) -> bool {
    match c {
        Constraint::Count {
            vars,
            values,
            sense,
            rhs,
        } => {
            let n = vars
                .iter()
                .filter(|x| a.value(**x).is_some_and(|v| values.contains(&v)))
                .count();
            match sense {
                Sense::Eq => n == *rhs,
                Sense::Le => n <= *rhs,
            }
        }
        Constraint::Equivalent { lhs, rhs } => lhs.holds(a) == rhs.holds(a),
        Constraint::NotEqualIf { guard, a: x, b: y } => {
            !guard.holds(a) || a.value(*x) != a.value(*y)
        }
        Constraint::Element {
            index,
            table,
            target,
        } => a
            .value(*index)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| table.get(i))
            .is_some_and(|t| a.value(*target) == Some(*t)),
        Constraint::AllDifferent { terms } => {
            let mut seen = BTreeSet::new();
            terms.iter().all(|t| {
                let v = match t {
                    Term::Var(x) => a.value(*x),
                    Term::Const(c) => Some(*c),
                };
                v.is_some_and(|v| seen.insert(v))
            })
        }
    }
}
