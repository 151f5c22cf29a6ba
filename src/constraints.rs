//! Rule families over the variables of an [`Encoding`].
//!
//! 1. subject frequency, 2. daily theory uniqueness, 3. weekly lab
//! frequency, 4. daily lab limit, 5. lab parallelism, 6. subject to teacher
//! lookups, 7. per-slot resource exclusivity against fixed data.

use crate::config::Group;
use crate::cp::{Constraint, CpModel, Literal, Sense, Term, Value, VarId};
use crate::data::{Config, Status};
use crate::encoder::Encoding;
use crate::index::{LAB_SESSIONS_PER_WEEK, SESSIONS_PER_WEEK, TimetableIndex};
use crate::registry::{Registry, ResourceId};
use log::{debug, warn};
use std::collections::BTreeSet;

/// At most this many lab blocks per group and day.
pub const MAX_LAB_BLOCKS_PER_DAY: usize = 2;

fn count(vars: Vec<VarId>, values: Vec<Value>, sense: Sense, rhs: usize) -> Constraint {
    Constraint::Count {
        vars,
        values,
        sense,
        rhs,
    }
}

/// Family 1: every core subject reaches exactly three weekly sessions.
pub fn subject_frequency(enc: &Encoding, index: &TimetableIndex<'_>) -> Vec<Constraint> {
    let mut out = Vec::new();
    for (section, tables) in &enc.cohorts {
        let vars: Vec<VarId> = enc.theory_of(section).map(|c| c.subject).collect();
        let fixed = index.fixed_subject_counts(section);
        for (k, subject) in tables.core_subjects.iter().enumerate() {
            let already = fixed.get(subject.as_str()).copied().unwrap_or(0);
            let owed = SESSIONS_PER_WEEK.saturating_sub(already);
            out.push(count(vars.clone(), vec![k as Value], Sense::Eq, owed));
        }
    }
    out
}

/// Family 2: no core subject twice on one day.
pub fn daily_uniqueness(
    enc: &Encoding,
    config: &Config,
    index: &TimetableIndex<'_>,
) -> Vec<Constraint> {
    let mut out = Vec::new();
    for (section, tables) in &enc.cohorts {
        for day in &config.settings.days {
            let vars: Vec<VarId> = enc
                .theory_of(section)
                .filter(|c| &c.day == day)
                .map(|c| c.subject)
                .collect();
            if vars.is_empty() {
                continue;
            }
            let fixed = index.fixed_subjects_on(section, day);
            for (k, subject) in tables.core_subjects.iter().enumerate() {
                let (sense, rhs) = if fixed.contains(subject.as_str()) {
                    (Sense::Eq, 0)
                } else {
                    (Sense::Le, 1)
                };
                out.push(count(vars.clone(), vec![k as Value], sense, rhs));
            }
        }
    }
    out
}

/// Family 3: each lab once per week for each group, fixed blocks included.
pub fn lab_frequency(enc: &Encoding, index: &TimetableIndex<'_>) -> Vec<Constraint> {
    let mut out = Vec::new();
    for (section, tables) in enc.cohorts.iter().filter(|(_, t)| t.sentinels.is_some()) {
        let fixed = index.fixed_lab_counts(section);
        for group in Group::BOTH {
            let vars: Vec<VarId> = enc
                .labs_of(section)
                .map(|c| c.group(group).subject)
                .collect();
            for (k, lab) in tables.labs.iter().enumerate() {
                let already = fixed.get(&(group, lab.as_str())).copied().unwrap_or(0);
                let owed = LAB_SESSIONS_PER_WEEK.saturating_sub(already);
                out.push(count(vars.clone(), vec![k as Value], Sense::Eq, owed));
            }
        }
    }
    out
}

/// Family 4: bounded lab blocks per group and day, fixed blocks included.
pub fn lab_daily_limit(
    enc: &Encoding,
    config: &Config,
    index: &TimetableIndex<'_>,
) -> Vec<Constraint> {
    let mut out = Vec::new();
    for (section, tables) in enc.cohorts.iter().filter(|(_, t)| t.sentinels.is_some()) {
        let real_labs: Vec<Value> = (0..tables.no_lab()).collect();
        for day in &config.settings.days {
            let fixed = index.fixed_labs_on(section, day);
            for group in Group::BOTH {
                let vars: Vec<VarId> = enc
                    .labs_of(section)
                    .filter(|c| &c.day == day)
                    .map(|c| c.group(group).subject)
                    .collect();
                let already = fixed.iter().filter(|(g, _)| *g == group).count();
                let room = MAX_LAB_BLOCKS_PER_DAY.saturating_sub(already);
                // cannot bind otherwise
                if vars.len() > room {
                    out.push(count(vars, real_labs.clone(), Sense::Le, room));
                }
            }
        }
    }
    out
}

/// Family 5: both groups run a lab together or not at all, on different
/// labs in different rooms; a group has a real room iff it has a lab.
pub fn lab_parallelism(enc: &Encoding) -> Vec<Constraint> {
    let mut out = Vec::new();
    for cell in &enc.labs {
        let Some(tables) = enc.cohorts.get(&cell.section) else { continue };
        let Some(sentinels) = tables.sentinels else { continue };
        let no_lab = tables.no_lab();
        let a = cell.group(Group::A);
        let b = cell.group(Group::B);
        let a_has_lab = Literal::Ne(a.subject, no_lab);

        out.push(Constraint::Equivalent {
            lhs: a_has_lab,
            rhs: Literal::Ne(b.subject, no_lab),
        });
        out.push(Constraint::NotEqualIf {
            guard: a_has_lab,
            a: a.subject,
            b: b.subject,
        });
        out.push(Constraint::NotEqualIf {
            guard: a_has_lab,
            a: a.room,
            b: b.room,
        });
        for group in Group::BOTH {
            let vars = cell.group(group);
            out.push(Constraint::Equivalent {
                lhs: Literal::Ne(vars.subject, no_lab),
                rhs: Literal::Ne(vars.room, sentinels[group.index()].lab_room),
            });
        }
    }
    out
}

/// Family 6: derived teacher variables follow the chosen subject.
pub fn teacher_lookups(enc: &Encoding) -> Vec<Constraint> {
    let mut out = Vec::new();
    for cell in &enc.theory {
        let Some(tables) = enc.cohorts.get(&cell.section) else { continue };
        out.push(Constraint::Element {
            index: cell.subject,
            table: tables.core_teachers.clone(),
            target: cell.teacher,
        });
    }
    for cell in &enc.labs {
        let Some(tables) = enc.cohorts.get(&cell.section) else { continue };
        let Some(sentinels) = tables.sentinels else { continue };
        for group in Group::BOTH {
            let vars = cell.group(group);
            out.push(Constraint::Element {
                index: vars.subject,
                table: tables.lab_teacher_table(sentinels[group.index()]),
                target: vars.teacher,
            });
        }
    }
    out
}

/// Members of the three resource pools of one (day, slot).
#[derive(Debug, Default)]
struct Pools {
    teachers: FixedPool,
    theory_rooms: FixedPool,
    lab_rooms: FixedPool,
}

/// Fixed IDs of one pool. A repeat is a clash already in the input: kept
/// when `strict`, otherwise dropped with a warning.
#[derive(Debug, Default)]
struct FixedPool {
    terms: Vec<Term>,
    seen: BTreeSet<ResourceId>,
}

impl FixedPool {
    fn add(&mut self, id: ResourceId, name: &str, strict: bool, at: (&str, &str)) {
        if self.seen.insert(id) || strict {
            self.terms.push(Term::Const(id));
        } else {
            warn!("Fixed data already double-books `{name}` on {} {}", at.0, at.1);
        }
    }
}

fn all_different(terms: Vec<Term>) -> Option<Constraint> {
    terms
        .iter()
        .any(|t| matches!(t, Term::Var(_)))
        .then_some(Constraint::AllDifferent { terms })
}

/// Family 7: no teacher, theory room or lab room is used twice in any
/// (day, slot), counting every cohort's fixed cells.
pub fn resource_exclusivity(
    enc: &Encoding,
    config: &Config,
    index: &TimetableIndex<'_>,
    registry: &Registry,
) -> Vec<Constraint> {
    let strict = config.settings.strict_fixed_data;
    let mut out = Vec::new();
    for day in &config.settings.days {
        for slot in &config.settings.all_slots {
            let mut pools = Pools::default();
            let at = (day.as_str(), slot.as_str());

            for row in index.rows_on(day) {
                let Some(cell) = row.cell(slot).filter(|c| c.status == Status::Assigned) else {
                    continue;
                };
                for teacher in cell.teachers() {
                    if let Some(id) = registry.teachers.id(teacher) {
                        pools.teachers.add(id, teacher, strict, at);
                    }
                }
                for room in cell.rooms() {
                    if let Some(id) = registry.lab_rooms.id(room) {
                        pools.lab_rooms.add(id, room, strict, at);
                    } else if let Some(id) = registry.theory_rooms.id(room) {
                        pools.theory_rooms.add(id, room, strict, at);
                    }
                }
            }

            for cell in enc.theory.iter().filter(|c| &c.day == day && &c.slot == slot) {
                if let Some(tables) = enc.cohorts.get(&cell.section) {
                    pools.theory_rooms.terms.push(Term::Const(tables.home_room));
                }
                pools.teachers.terms.push(Term::Var(cell.teacher));
            }

            for cell in enc.labs.iter().filter(|c| &c.day == day && c.covers(slot)) {
                for group in Group::BOTH {
                    let vars = cell.group(group);
                    pools.teachers.terms.push(Term::Var(vars.teacher));
                    pools.lab_rooms.terms.push(Term::Var(vars.room));
                }
            }

            out.extend(
                [pools.teachers, pools.theory_rooms, pools.lab_rooms]
                    .into_iter()
                    .filter_map(|pool| all_different(pool.terms)),
            );
        }
    }
    out
}

/// Emits every family into the encoding's model.
pub fn generate(
    enc: &mut Encoding,
    config: &Config,
    index: &TimetableIndex<'_>,
    registry: &Registry,
) {
    let families = [
        ("subject_frequency", subject_frequency(enc, index)),
        ("daily_uniqueness", daily_uniqueness(enc, config, index)),
        ("lab_frequency", lab_frequency(enc, index)),
        ("lab_daily_limit", lab_daily_limit(enc, config, index)),
        ("lab_parallelism", lab_parallelism(enc)),
        ("teacher_lookups", teacher_lookups(enc)),
        ("resource_exclusivity", resource_exclusivity(enc, config, index, registry)),
    ];
    let model: &mut CpModel = &mut enc.model;
    for (family, constraints) in families {
        debug!("{family}: {} constraints", constraints.len());
        for c in constraints {
            model.add(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Timetable;
    use crate::encoder::encode;
    use crate::fixtures;

    fn build(cfg: &Config, tt: &Timetable, sections: &[&str]) -> (Encoding, Registry) {
        let sections: Vec<String> = sections.iter().map(|s| s.to_string()).collect();
        let idx = TimetableIndex::build(cfg, tt).unwrap();
        let reg = Registry::build(cfg, tt, &sections);
        let mut enc = encode(cfg, &idx, &reg, &sections).unwrap();
        generate(&mut enc, cfg, &idx, &reg);
        (enc, reg)
    }

    fn rhs_of(constraints: Vec<Constraint>) -> Vec<usize> {
        constraints
            .into_iter()
            .map(|c| match c {
                Constraint::Count { rhs, .. } => rhs,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    fn pools_with(enc: &Encoding, term: Term) -> Vec<&Vec<Term>> {
        enc.model
            .constraints()
            .iter()
            .filter_map(|c| match c {
                Constraint::AllDifferent { terms } if terms.contains(&term) => Some(terms),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn frequency_subtracts_fixed_sessions() {
        let cfg = fixtures::config();
        let mut tt = fixtures::twelve_open_cells(&cfg);
        fixtures::mark(&mut tt, "CSE-A", "Friday", "11-12", fixtures::fixed("DS", "T_DS", "R1"));
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();
        let sections = vec!["CSE-A".to_string()];
        let reg = Registry::build(&cfg, &tt, &sections);
        let enc = encode(&cfg, &idx, &reg, &sections).unwrap();

        let family = subject_frequency(&enc, &idx);
        let eleven =
            |c: &Constraint| matches!(c, Constraint::Count { vars, .. } if vars.len() == 11);
        assert!(family.iter().all(eleven));
        assert_eq!(rhs_of(family), vec![2, 3, 3, 3]);

        // DS is fixed on Friday: no open Friday cell may take it.
        let friday_ds = daily_uniqueness(&enc, &cfg, &idx).into_iter().any(|c| {
            matches!(c, Constraint::Count { ref values, sense: Sense::Eq, rhs: 0, ref vars }
                if values == &vec![0] && vars.len() == 1)
        });
        assert!(friday_ds);
    }

    #[test]
    fn daily_limit_only_where_it_can_bind() {
        let cfg = fixtures::config();
        let tt = fixtures::twelve_open_cells(&cfg);
        let (enc, _) = build(&cfg, &tt, &["CSE-A"]);
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();
        // 3 blocks per day, so one limit per (day, group)
        assert_eq!(lab_daily_limit(&enc, &cfg, &idx).len(), 10);
        assert_eq!(rhs_of(lab_frequency(&enc, &idx)), vec![1; 4]);
        assert_eq!(lab_parallelism(&enc).len(), 5 * enc.labs.len());
    }

    #[test]
    fn fixed_lab_blocks_lower_the_lab_targets() {
        let cfg = fixtures::config();
        let mut tt = fixtures::twelve_open_cells(&cfg);
        let lab = fixtures::fixed("OS Lab (G-A) / DS Lab (G-B)", "T_OS / T_DS", "L1 / L2");
        for slot in ["9-10", "10-11"] {
            fixtures::mark(&mut tt, "CSE-A", "Wednesday", slot, lab.clone());
        }
        let (enc, _) = build(&cfg, &tt, &["CSE-A"]);
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();

        // (A, DS Lab), (A, OS Lab), (B, DS Lab), (B, OS Lab)
        assert_eq!(rhs_of(lab_frequency(&enc, &idx)), vec![1, 0, 0, 1]);
        // Wednesday keeps 3 lab variables per group but only one more block fits
        let limits = lab_daily_limit(&enc, &cfg, &idx);
        assert_eq!(limits.len(), 10);
        assert_eq!(rhs_of(limits).iter().filter(|r| **r == 1).count(), 2);
    }

    #[test]
    fn pools_include_other_cohorts_fixed_cells() {
        let cfg = fixtures::config();
        let mut tt = fixtures::twelve_open_cells(&cfg);
        fixtures::mark(&mut tt, "CSE-B", "Monday", "2-3", fixtures::fixed("MATH", "T_MATH", "R2"));
        let (enc, reg) = build(&cfg, &tt, &["CSE-A"]);
        let math = reg.teachers.id("T_MATH").unwrap();
        let open = enc
            .theory
            .iter()
            .find(|c| c.day == "Monday" && c.slot == "2-3")
            .unwrap();

        let pools = pools_with(&enc, Term::Var(open.teacher));
        assert_eq!(pools.len(), 1);
        assert!(pools[0].contains(&Term::Const(math)));
    }

    #[test]
    fn fixed_duplicates_are_kept_once() {
        let mut cfg = fixtures::config();
        let mut tt = fixtures::twelve_open_cells(&cfg);
        for section in ["CSE-A", "CSE-B"] {
            let seminar = fixtures::fixed("Seminar", "T_X", "R9");
            fixtures::mark(&mut tt, section, "Monday", "9-10", seminar);
        }
        let (enc, reg) = build(&cfg, &tt, &["CSE-A"]);
        let tx = Term::Const(reg.teachers.id("T_X").unwrap());
        let pools = pools_with(&enc, tx);
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].iter().filter(|t| **t == tx).count(), 1);

        cfg.settings.strict_fixed_data = true;
        let (enc, _) = build(&cfg, &tt, &["CSE-A"]);
        let pools = pools_with(&enc, tx);
        assert_eq!(pools[0].iter().filter(|t| **t == tx).count(), 2);
    }
}
