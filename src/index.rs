use crate::config::{Group, LabBlock};
use crate::data::{CellRecord, CohortRow, Config, Parallel, Status, Timetable};
use crate::error::{InputError, PresolveError};
use std::collections::{BTreeMap, BTreeSet};

/// Weekly occurrences required of every core subject.
pub const SESSIONS_PER_WEEK: usize = 3;
/// Weekly occurrences required of every lab, per group.
pub const LAB_SESSIONS_PER_WEEK: usize = 1;

/// Read-only lookup over one timetable snapshot.
#[derive(Debug)]
pub struct TimetableIndex<'a> {
    config: &'a Config,
    timetable: &'a Timetable,
    // day -> section -> position in that day's row list
    positions: BTreeMap<&'a str, BTreeMap<&'a str, usize>>,
}

impl<'a> TimetableIndex<'a> {
    pub fn build(config: &'a Config, timetable: &'a Timetable) -> Result<Self, InputError> {
        let mut positions = BTreeMap::new();
        for day in &config.settings.days {
            let rows = timetable
                .get(day)
                .ok_or_else(|| InputError::MissingDay(day.clone()))?;
            let mut by_section = BTreeMap::new();
            for (i, row) in rows.iter().enumerate() {
                if by_section.insert(row.section.as_str(), i).is_some() {
                    return Err(InputError::DuplicateCohortRow {
                        section: row.section.clone(),
                        day: day.clone(),
                    });
                }
            }
            positions.insert(day.as_str(), by_section);
        }
        Ok(Self {
            config,
            timetable,
            positions,
        })
    }

    /// Every section to be solved must have a row on every day.
    pub fn require_rows(&self, sections: &[String]) -> Result<(), InputError> {
        for day in &self.config.settings.days {
            for section in sections {
                if self.position(day, section).is_none() {
                    return Err(InputError::MissingCohortRow {
                        section: section.clone(),
                        day: day.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn position(&self, day: &str, section: &str) -> Option<usize> {
        self.positions.get(day)?.get(section).copied()
    }

    pub fn row(&self, section: &str, day: &str) -> Option<&'a CohortRow> {
        let i = self.position(day, section)?;
        self.timetable.get(day)?.get(i)
    }

    /// All rows of a day, solved or not.
    pub fn rows_on(&self, day: &str) -> impl Iterator<Item = &'a CohortRow> + 'a {
        self.timetable.get(day).into_iter().flatten()
    }

    pub fn cell(&self, section: &str, day: &str, slot: &str) -> Option<&'a CellRecord> {
        self.row(section, day)?.cell(slot)
    }

    /// Absent cells count as no class at all.
    pub fn status(&self, section: &str, day: &str, slot: &str) -> Option<Status> {
        self.cell(section, day, slot).map(|c| c.status)
    }

    /// Open theory cells of a section in (day, slot) grid order.
    pub fn open_theory_slots(&self, section: &str) -> Vec<(String, String)> {
        let settings = &self.config.settings;
        settings
            .days
            .iter()
            .flat_map(|day| settings.all_slots.iter().map(move |slot| (day, slot)))
            .filter(|(day, slot)| self.status(section, day, slot) == Some(Status::ToBeAssigned))
            .map(|(day, slot)| (day.clone(), slot.clone()))
            .collect()
    }

    /// A lab block is usable only when both of its slots are `Free`.
    pub fn lab_block_available(&self, section: &str, day: &str, block: &LabBlock) -> bool {
        block
            .slots
            .iter()
            .all(|slot| self.status(section, day, slot) == Some(Status::Free))
    }

    fn assigned_subjects(&self, section: &str, day: &str) -> impl Iterator<Item = &'a str> + 'a {
        let row = self.row(section, day);
        row.into_iter()
            .flat_map(|r| r.slots.values())
            .filter_map(|cells| cells.first())
            .filter(|c| c.status == Status::Assigned)
            .filter_map(CellRecord::single_subject)
    }

    /// Fixed weekly occurrences of each core subject (zero included).
    pub fn fixed_subject_counts(&self, section: &str) -> BTreeMap<&'a str, usize> {
        let core = self.config.core_subjects_of(section);
        let mut counts: BTreeMap<&str, usize> = core.iter().map(|s| (s.as_str(), 0)).collect();
        for day in &self.config.settings.days {
            for subject in self.assigned_subjects(section, day) {
                if let Some(n) = counts.get_mut(subject) {
                    *n += 1;
                }
            }
        }
        counts
    }

    /// Core subjects already fixed on one day.
    pub fn fixed_subjects_on(&self, section: &str, day: &str) -> BTreeSet<&'a str> {
        let core = self.config.core_subjects_of(section);
        self.assigned_subjects(section, day)
            .filter(|s| core.iter().any(|c| c == s))
            .collect()
    }

    /// Fixed lab sessions of a section on one day, one `(group, lab)` per
    /// group and block. A block is read from the first of its two slots.
    pub fn fixed_labs_on(&self, section: &str, day: &str) -> Vec<(Group, &'a str)> {
        let settings = &self.config.settings;
        let mut out = Vec::new();
        for block in settings.lab_blocks() {
            let Some(cell) = self
                .cell(section, day, &block.slots[0])
                .filter(|c| c.status == Status::Assigned)
            else {
                continue;
            };
            let Some(Parallel::Two(a, b)) = &cell.subject else {
                continue;
            };
            out.extend(
                [a, b]
                    .into_iter()
                    .filter_map(|label| settings.split_lab_label(label))
                    .map(|(lab, group)| (group, lab)),
            );
        }
        out
    }

    /// Fixed weekly sessions per `(group, lab)`.
    pub fn fixed_lab_counts(&self, section: &str) -> BTreeMap<(Group, &'a str), usize> {
        let mut counts = BTreeMap::new();
        for day in &self.config.settings.days {
            for key in self.fixed_labs_on(section, day) {
                *counts.entry(key).or_default() += 1;
            }
        }
        counts
    }

    /// No lab may already be fixed more often than the week allows.
    pub fn check_lab_budget(&self, section: &str) -> Result<(), PresolveError> {
        let counts = self.fixed_lab_counts(section);
        match counts.into_iter().find(|(_, n)| *n > LAB_SESSIONS_PER_WEEK) {
            Some(((group, lab), count)) => Err(PresolveError::LabOverAssigned {
                section: section.to_string(),
                lab: lab.to_string(),
                group: self.config.settings.group_label(group).to_string(),
                count,
            }),
            None => Ok(()),
        }
    }

    /// Open cells must exactly cover the sessions still owed this week.
    /// Returns the number of open cells on success.
    pub fn check_slot_budget(&self, section: &str) -> Result<usize, PresolveError> {
        let counts = self.fixed_subject_counts(section);
        if let Some((subject, count)) = counts.iter().find(|(_, n)| **n > SESSIONS_PER_WEEK) {
            return Err(PresolveError::SubjectOverAssigned {
                section: section.to_string(),
                subject: subject.to_string(),
                count: *count,
            });
        }
        let required: usize = counts.values().map(|n| SESSIONS_PER_WEEK - n).sum();
        let open = self.open_theory_slots(section).len();
        if open != required {
            return Err(PresolveError::SlotBudgetMismatch {
                section: section.to_string(),
                open,
                required,
            });
        }
        Ok(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    const LAB_PAIR: (&str, &str, &str) = ("DS Lab (G-A) / OS Lab (G-B)", "T_DS / T_OS", "L1 / L2");

    fn mark_lab(tt: &mut Timetable, day: &str, slots: [&str; 2], pair: (&str, &str, &str)) {
        for slot in slots {
            fixtures::mark(tt, "CSE-A", day, slot, fixtures::fixed(pair.0, pair.1, pair.2));
        }
    }

    #[test]
    fn missing_day_is_an_input_error() {
        let cfg = fixtures::config();
        let mut tt = fixtures::timetable(&cfg);
        tt.remove("Friday");
        assert!(matches!(
            TimetableIndex::build(&cfg, &tt),
            Err(InputError::MissingDay(d)) if d == "Friday"
        ));
    }

    #[test]
    fn positions_follow_row_order() {
        let cfg = fixtures::config();
        let mut tt = fixtures::timetable(&cfg);
        tt.get_mut("Monday").unwrap().reverse();
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();
        assert_eq!(idx.position("Monday", "CSE-A"), Some(1));
        assert_eq!(idx.position("Tuesday", "CSE-A"), Some(0));
        assert_eq!(idx.row("CSE-A", "Monday").unwrap().section, "CSE-A");
    }

    #[test]
    fn lab_block_needs_both_slots_free() {
        let cfg = fixtures::config();
        let mut tt = fixtures::timetable(&cfg);
        let open = CellRecord::with_status(Status::ToBeAssigned);
        fixtures::mark(&mut tt, "CSE-A", "Monday", "10-11", open);
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();
        let blocks = cfg.settings.lab_blocks();
        assert!(!idx.lab_block_available("CSE-A", "Monday", &blocks[0]));
        assert!(idx.lab_block_available("CSE-A", "Monday", &blocks[1]));
        assert!(idx.lab_block_available("CSE-A", "Tuesday", &blocks[0]));
        assert!(!idx.lab_block_available("NOPE", "Tuesday", &blocks[0]));
    }

    #[test]
    fn budget_accounts_for_fixed_occurrences() {
        let cfg = fixtures::config();
        let mut tt = fixtures::twelve_open_cells(&cfg);
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();
        assert_eq!(idx.check_slot_budget("CSE-A"), Ok(12));

        // Fixing one open cell as DS lowers both sides of the budget.
        fixtures::mark(&mut tt, "CSE-A", "Friday", "11-12", fixtures::fixed("DS", "T_DS", "R1"));
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();
        assert_eq!(idx.fixed_subject_counts("CSE-A")["DS"], 1);
        assert_eq!(idx.check_slot_budget("CSE-A"), Ok(11));
        assert!(idx.fixed_subjects_on("CSE-A", "Friday").contains("DS"));
        assert!(idx.fixed_subjects_on("CSE-A", "Monday").is_empty());
    }

    #[test]
    fn ten_open_cells_fail_the_budget() {
        let cfg = fixtures::config();
        let mut tt = fixtures::twelve_open_cells(&cfg);
        fixtures::mark(&mut tt, "CSE-A", "Friday", "2-3", CellRecord::with_status(Status::Free));
        fixtures::mark(&mut tt, "CSE-A", "Thursday", "2-3", CellRecord::with_status(Status::Free));
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();
        assert_eq!(
            idx.check_slot_budget("CSE-A"),
            Err(PresolveError::SlotBudgetMismatch {
                section: "CSE-A".into(),
                open: 10,
                required: 12
            })
        );
    }

    #[test]
    fn over_assigned_subject_is_rejected() {
        let cfg = fixtures::config();
        let mut tt = fixtures::timetable(&cfg);
        for day in ["Monday", "Tuesday", "Wednesday", "Thursday"] {
            fixtures::mark(&mut tt, "CSE-A", day, "2-3", fixtures::fixed("OS", "T_OS", "R1"));
        }
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();
        assert!(matches!(
            idx.check_slot_budget("CSE-A"),
            Err(PresolveError::SubjectOverAssigned { count: 4, .. })
        ));
    }

    #[test]
    fn fixed_lab_blocks_are_counted_once_per_group() {
        let cfg = fixtures::config();
        let mut tt = fixtures::timetable(&cfg);
        mark_lab(&mut tt, "Tuesday", ["3-4", "4-5"], LAB_PAIR);
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();

        assert_eq!(
            idx.fixed_labs_on("CSE-A", "Tuesday"),
            vec![(Group::A, "DS Lab"), (Group::B, "OS Lab")]
        );
        let counts = idx.fixed_lab_counts("CSE-A");
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&(Group::A, "DS Lab")], 1);
        assert_eq!(idx.check_lab_budget("CSE-A"), Ok(()));
        // theory counts ignore paired lab cells
        assert_eq!(idx.fixed_subject_counts("CSE-A")["DS"], 0);
    }

    #[test]
    fn lab_fixed_twice_is_rejected() {
        let cfg = fixtures::config();
        let mut tt = fixtures::timetable(&cfg);
        mark_lab(&mut tt, "Tuesday", ["3-4", "4-5"], LAB_PAIR);
        mark_lab(&mut tt, "Thursday", ["9-10", "10-11"], LAB_PAIR);
        let idx = TimetableIndex::build(&cfg, &tt).unwrap();
        assert_eq!(
            idx.check_lab_budget("CSE-A"),
            Err(PresolveError::LabOverAssigned {
                section: "CSE-A".into(),
                lab: "DS Lab".into(),
                group: "A".into(),
                count: 2,
            })
        );
    }
}
