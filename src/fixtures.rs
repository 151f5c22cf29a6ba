//! Small configurations and timetables shared by the unit tests.

use crate::data::{CellRecord, CohortRow, Config, Parallel, PassSpec, Settings, Status, Timetable};
use std::collections::BTreeMap;

pub const DAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];
pub const SLOTS: [&str; 7] = ["9-10", "10-11", "11-12", "12-1", "2-3", "3-4", "4-5"];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn subject_table(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(s, t)| (s.to_string(), t.to_string()))
        .collect()
}

/// Two cohorts over a 5-day, 7-slot grid. `CSE-A` has two labs, `CSE-B`
/// has none. Both share the MATH teacher `T_MATH`.
pub fn config() -> Config {
    Config {
        sections: strings(&["CSE-A", "CSE-B"]),
        settings: Settings {
            days: strings(&DAYS),
            all_slots: strings(&SLOTS),
            lab_slot: strings(&["9-11", "11-1", "3-5"]),
            lab_slot_map: BTreeMap::from([
                ("9-11".to_string(), ("9-10".to_string(), "10-11".to_string())),
                ("11-1".to_string(), ("11-12".to_string(), "12-1".to_string())),
                ("3-5".to_string(), ("3-4".to_string(), "4-5".to_string())),
            ]),
            groups: strings(&["A", "B"]),
            solver_timeout_seconds: 30.0,
            strict_fixed_data: false,
        },
        core_subjects: BTreeMap::from([
            ("CSE-A".to_string(), strings(&["DS", "OS", "CN", "MATH"])),
            ("CSE-B".to_string(), strings(&["DS", "OS", "CN", "MATH"])),
        ]),
        subjects: BTreeMap::from([
            (
                "CSE-A".to_string(),
                subject_table(&[
                    ("DS", "T_DS"),
                    ("OS", "T_OS"),
                    ("CN", "T_CN"),
                    ("MATH", "T_MATH"),
                ]),
            ),
            (
                "CSE-B".to_string(),
                subject_table(&[
                    ("DS", "U_DS"),
                    ("OS", "U_OS"),
                    ("CN", "U_CN"),
                    ("MATH", "T_MATH"),
                ]),
            ),
        ]),
        labs: BTreeMap::from([
            ("CSE-A".to_string(), strings(&["DS Lab", "OS Lab"])),
            ("CSE-B".to_string(), vec![]),
        ]),
        lab_teachers: BTreeMap::new(),
        section_theory_rooms: BTreeMap::from([
            ("CSE-A".to_string(), "R1".to_string()),
            ("CSE-B".to_string(), "R2".to_string()),
        ]),
        lab_rooms: strings(&["L1", "L2", "L3"]),
        passes: vec![
            PassSpec {
                name: "first".into(),
                sections: strings(&["CSE-A"]),
            },
            PassSpec {
                name: "second".into(),
                sections: strings(&["CSE-B"]),
            },
        ],
    }
}

/// Every configured section, every cell `Free`.
pub fn timetable(config: &Config) -> Timetable {
    config
        .settings
        .days
        .iter()
        .map(|day| {
            let rows = config
                .sections
                .iter()
                .map(|section| CohortRow {
                    section: section.clone(),
                    slots: config
                        .settings
                        .all_slots
                        .iter()
                        .map(|slot| (slot.clone(), vec![CellRecord::with_status(Status::Free)]))
                        .collect(),
                })
                .collect();
            (day.clone(), rows)
        })
        .collect()
}

/// A parsed joined field, `"a / b"` included.
pub fn joined(raw: &str) -> Option<Parallel<String>> {
    Parallel::parse(raw).expect("at most two parts")
}

/// An `Assigned` cell from wire-format strings.
pub fn fixed(subject: &str, teacher: &str, room: &str) -> CellRecord {
    CellRecord {
        subject: joined(subject),
        teacher: joined(teacher),
        room: joined(room),
        ..CellRecord::with_status(Status::Assigned)
    }
}

pub fn mark(tt: &mut Timetable, section: &str, day: &str, slot: &str, cell: CellRecord) {
    let row = tt
        .get_mut(day)
        .and_then(|rows| rows.iter_mut().find(|r| r.section == section))
        .expect("fixture row");
    row.slots.insert(slot.to_string(), vec![cell]);
}

/// Open cells of `CSE-A`: 3 + 3 + 2 + 2 + 2 across the week, on slots that
/// block the 11-1 lab window but leave 9-11 and 3-5 free every day.
pub const CSE_A_OPEN: [(&str, &str); 12] = [
    ("Monday", "11-12"),
    ("Monday", "12-1"),
    ("Monday", "2-3"),
    ("Tuesday", "11-12"),
    ("Tuesday", "12-1"),
    ("Tuesday", "2-3"),
    ("Wednesday", "11-12"),
    ("Wednesday", "2-3"),
    ("Thursday", "11-12"),
    ("Thursday", "2-3"),
    ("Friday", "11-12"),
    ("Friday", "2-3"),
];

pub fn twelve_open_cells(config: &Config) -> Timetable {
    let mut tt = timetable(config);
    for (day, slot) in CSE_A_OPEN {
        mark(&mut tt, "CSE-A", day, slot, CellRecord::with_status(Status::ToBeAssigned));
    }
    tt
}

/// `CSE-B` gets the same open layout as `CSE-A` with the 11-1 cells moved to
/// 9-11, so both cohorts compete for `T_MATH` at 2-3 every day.
pub fn both_open(config: &Config) -> Timetable {
    let mut tt = twelve_open_cells(config);
    for (day, slot) in CSE_A_OPEN {
        let slot = match slot {
            "11-12" => "9-10",
            "12-1" => "10-11",
            other => other,
        };
        mark(&mut tt, "CSE-B", day, slot, CellRecord::with_status(Status::ToBeAssigned));
    }
    tt
}
