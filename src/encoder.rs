//! Decision variables of one pass.
//!
//! Theory cells get a subject-index variable plus a derived teacher
//! variable. Every (cohort, day, lab block) of a cohort with labs gets a
//! subject, room and derived teacher variable per group. "No lab" is the
//! subject value `labs.len()` and the group's sentinel room/teacher, so
//! every later constraint ranges over a fixed variable set.

use crate::config::{Group, LabBlock};
use crate::cp::{CpModel, Value, VarId};
use crate::data::Config;
use crate::error::PassError;
use crate::index::TimetableIndex;
use crate::registry::{Registry, ResourceId, Sentinel};
use itertools::Itertools;
use log::{debug, info};
use std::collections::BTreeMap;

/// An open theory cell.
#[derive(Debug, Clone)]
pub struct TheoryCell {
    pub section: String,
    pub day: String,
    pub slot: String,
    /// Index into the cohort's core subjects.
    pub subject: VarId,
    /// Teacher ID of the chosen subject.
    pub teacher: VarId,
}

/// One lab group's share of a lab block.
#[derive(Debug, Clone, Copy)]
pub struct GroupVars {
    /// Index into the cohort's labs, or the "no lab" value.
    pub subject: VarId,
    /// Lab room ID, or the group's sentinel room.
    pub room: VarId,
    /// Teacher ID of the chosen lab, or the group's sentinel teacher.
    pub teacher: VarId,
}

#[derive(Debug, Clone)]
pub struct LabCell {
    pub section: String,
    pub day: String,
    pub block: LabBlock,
    /// Both slots of the block are `Free` for this cohort and day.
    pub available: bool,
    pub groups: [GroupVars; 2],
}

impl LabCell {
    pub fn group(&self, group: Group) -> GroupVars {
        self.groups[group.index()]
    }

    pub fn covers(&self, slot: &str) -> bool {
        self.block.slots.iter().any(|s| s == slot)
    }
}

/// Fixed per-cohort lookup tables the constraints and the decoder share.
#[derive(Debug, Clone)]
pub struct CohortTables {
    pub core_subjects: Vec<String>,
    /// Teacher ID per core subject, same order.
    pub core_teachers: Vec<ResourceId>,
    pub home_room: ResourceId,
    pub labs: Vec<String>,
    /// Teacher ID per lab, same order.
    pub lab_teachers: Vec<ResourceId>,
    /// `[A, B]`; `None` for cohorts without labs.
    pub sentinels: Option<[Sentinel; 2]>,
}

impl CohortTables {
    /// Subject value meaning "no lab in this block".
    pub fn no_lab(&self) -> Value {
        self.labs.len() as Value
    }

    /// Element table of a group: lab teachers, then the group's sentinel
    /// teacher at the "no lab" index.
    pub fn lab_teacher_table(&self, sentinel: Sentinel) -> Vec<Value> {
        self.lab_teachers
            .iter()
            .copied()
            .chain([sentinel.teacher])
            .collect()
    }
}

/// The variables of one pass, plus the model they live in.
#[derive(Debug)]
pub struct Encoding {
    pub model: CpModel,
    pub cohorts: BTreeMap<String, CohortTables>,
    pub theory: Vec<TheoryCell>,
    pub labs: Vec<LabCell>,
}

impl Encoding {
    pub fn theory_of<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a TheoryCell> + 'a {
        self.theory.iter().filter(move |c| c.section == section)
    }

    pub fn labs_of<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a LabCell> + 'a {
        self.labs.iter().filter(move |c| c.section == section)
    }
}

fn cohort_tables(
    config: &Config,
    registry: &Registry,
    section: &str,
) -> Result<CohortTables, PassError> {
    let missing = |what: &str| PassError::Model(format!("{what} of `{section}` is not registered"));

    let core_teachers = registry
        .core_teacher_ids(config, section)
        .ok_or_else(|| missing("a core subject teacher"))?;
    let home_room = config
        .section_theory_rooms
        .get(section)
        .and_then(|r| registry.theory_rooms.id(r))
        .ok_or_else(|| missing("the home room"))?;
    let lab_teachers = registry
        .lab_teacher_ids(config, section)
        .ok_or_else(|| missing("a lab teacher"))?;

    let labs = config.labs_of(section).to_vec();
    let sentinels = if labs.is_empty() {
        None
    } else {
        let a = registry.sentinel(section, Group::A);
        let b = registry.sentinel(section, Group::B);
        Some([
            a.ok_or_else(|| missing("the group A sentinel"))?,
            b.ok_or_else(|| missing("the group B sentinel"))?,
        ])
    };

    Ok(CohortTables {
        core_subjects: config.core_subjects_of(section).to_vec(),
        core_teachers,
        home_room,
        labs,
        lab_teachers,
        sentinels,
    })
}

/// Creates every decision variable for `sections`.
pub fn encode(
    config: &Config,
    index: &TimetableIndex<'_>,
    registry: &Registry,
    sections: &[String],
) -> Result<Encoding, PassError> {
    let mut model = CpModel::new(format!("timetable[{}]", sections.join(",")));
    let mut cohorts = BTreeMap::new();
    let mut theory = Vec::new();
    let mut labs = Vec::new();
    let blocks = config.settings.lab_blocks();

    for section in sections {
        let tables = cohort_tables(config, registry, section)?;

        let subjects = 0..tables.core_subjects.len() as Value;
        let teachers: Vec<Value> = tables.core_teachers.iter().copied().unique().collect();
        for (day, slot) in index.open_theory_slots(section) {
            let name = format!("{section}/{day}/{slot}");
            let subject = model.new_var(format!("theory[{name}]"), subjects.clone());
            let teacher =
                model.new_var(format!("theory_teacher[{name}]"), teachers.iter().copied());
            theory.push(TheoryCell {
                section: section.clone(),
                day,
                slot,
                subject,
                teacher,
            });
        }

        if let Some(sentinels) = tables.sentinels {
            let mut available_blocks = 0;
            for day in &config.settings.days {
                for block in &blocks {
                    let available = index.lab_block_available(section, day, block);
                    available_blocks += usize::from(available);
                    let groups = Group::BOTH.map(|group| {
                        let sentinel = sentinels[group.index()];
                        let name = format!(
                            "{section}/{day}/{}/{}",
                            block.name,
                            config.settings.group_label(group)
                        );
                        let (subject_domain, room_domain) = if available {
                            (
                                (0..=tables.no_lab()).collect::<Vec<_>>(),
                                registry
                                    .real_lab_rooms()
                                    .iter()
                                    .copied()
                                    .chain([sentinel.lab_room])
                                    .collect::<Vec<_>>(),
                            )
                        } else {
                            (vec![tables.no_lab()], vec![sentinel.lab_room])
                        };
                        GroupVars {
                            subject: model.new_var(format!("lab[{name}]"), subject_domain),
                            room: model.new_var(format!("lab_room[{name}]"), room_domain),
                            teacher: model.new_var(
                                format!("lab_teacher[{name}]"),
                                tables.lab_teacher_table(sentinel),
                            ),
                        }
                    });
                    labs.push(LabCell {
                        section: section.clone(),
                        day: day.clone(),
                        block: block.clone(),
                        available,
                        groups,
                    });
                }
            }
            debug!("{section}: {available_blocks} available lab blocks");
        }

        cohorts.insert(section.clone(), tables);
    }

    info!(
        "Encoded {} theory cells and {} lab blocks as {} variables",
        theory.len(),
        labs.len(),
        model.var_count()
    );

    Ok(Encoding {
        model,
        cohorts,
        theory,
        labs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn encoded(sections: &[&str]) -> (Encoding, Registry) {
        let cfg = fixtures::config();
        let tt = fixtures::both_open(&cfg);
        let sections: Vec<String> = sections.iter().map(|s| s.to_string()).collect();
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();
        let reg = Registry::build(&cfg, &tt, &sections);
        let enc = encode(&cfg, &idx, &reg, &sections).unwrap();
        (enc, reg)
    }

    #[test]
    fn one_subject_variable_per_open_cell() {
        let (enc, _) = encoded(&["CSE-A"]);
        assert_eq!(enc.theory.len(), fixtures::CSE_A_OPEN.len());
        let first = &enc.theory[0];
        assert_eq!((first.day.as_str(), first.slot.as_str()), ("Monday", "11-12"));
        assert_eq!(enc.model.var(first.subject).domain, vec![0, 1, 2, 3]);
        assert_eq!(enc.model.var(first.teacher).domain.len(), 4);
    }

    #[test]
    fn lab_domains_collapse_on_unavailable_blocks() {
        let (enc, reg) = encoded(&["CSE-A"]);
        // 5 days x 3 blocks; 11-1 is taken by theory cells on Monday and Tuesday
        assert_eq!(enc.labs.len(), 15);
        let tables = &enc.cohorts["CSE-A"];
        assert_eq!(tables.no_lab(), 2);

        let blocked = enc
            .labs
            .iter()
            .find(|c| c.day == "Monday" && c.block.name == "11-1")
            .unwrap();
        assert!(!blocked.available);
        let a = blocked.group(Group::A);
        let sentinel = reg.sentinel("CSE-A", Group::A).unwrap();
        assert_eq!(enc.model.var(a.subject).domain, vec![2]);
        assert_eq!(enc.model.var(a.room).domain, vec![sentinel.lab_room]);

        let open = enc
            .labs
            .iter()
            .find(|c| c.day == "Monday" && c.block.name == "9-11")
            .unwrap();
        assert!(open.available);
        let b = open.group(Group::B);
        assert_eq!(enc.model.var(b.subject).domain, vec![0, 1, 2]);
        assert_eq!(enc.model.var(b.room).domain.len(), 4);
        let sentinel_b = reg.sentinel("CSE-A", Group::B).unwrap();
        assert!(enc.model.var(b.teacher).domain.contains(&sentinel_b.teacher));
    }

    #[test]
    fn cohorts_without_labs_get_no_lab_variables() {
        let (enc, _) = encoded(&["CSE-B"]);
        assert!(enc.labs.is_empty());
        assert!(enc.cohorts["CSE-B"].sentinels.is_none());
        assert_eq!(enc.model.var_count(), 2 * enc.theory.len());
    }
}
