//! Read-only checks over a timetable. Never builds a model.

use crate::config::Group;
use crate::data::{CohortRow, Config, Parallel, Settings, Status, Timetable};
use crate::index::{LAB_SESSIONS_PER_WEEK, SESSIONS_PER_WEEK};
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Teacher,
    TheoryRoom,
    LabRoom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Finding {
    /// One resource used by several cells of the same (day, slot).
    #[serde(rename_all = "camelCase")]
    DoubleBooking {
        resource: Resource,
        name: String,
        day: String,
        slot: String,
        sections: Vec<String>,
    },
    /// A core subject scheduled other than three times in the week.
    #[serde(rename_all = "camelCase")]
    WeeklyCount {
        section: String,
        subject: String,
        count: usize,
    },
    /// A lab scheduled other than once in the week for one group.
    #[serde(rename_all = "camelCase")]
    LabWeeklyCount {
        section: String,
        lab: String,
        group: String,
        count: usize,
    },
    #[serde(rename_all = "camelCase")]
    SameDayRepeat {
        section: String,
        day: String,
        subject: String,
    },
    /// Both groups of a split lab cell share a lab or a room.
    #[serde(rename_all = "camelCase")]
    LabPairClash {
        section: String,
        day: String,
        slot: String,
        field: String,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::DoubleBooking {
                resource,
                name,
                day,
                slot,
                sections,
            } => write!(
                f,
                "{resource:?} `{name}` double-booked on {day} {slot}: {}",
                sections.join(", ")
            ),
            Finding::WeeklyCount { section, subject, count } => {
                write!(f, "{section}: `{subject}` occurs {count} times this week")
            }
            Finding::LabWeeklyCount {
                section,
                lab,
                group,
                count,
            } => write!(f, "{section}: `{lab}` occurs {count} times this week for group {group}"),
            Finding::SameDayRepeat { section, day, subject } => {
                write!(f, "{section}: `{subject}` occurs more than once on {day}")
            }
            Finding::LabPairClash { section, day, slot, field } => {
                write!(f, "{section}: both lab groups share a {field} on {day} {slot}")
            }
        }
    }
}

fn double_bookings(config: &Config, timetable: &Timetable) -> Vec<Finding> {
    let lab_rooms: BTreeSet<&str> = config.lab_rooms.iter().map(String::as_str).collect();
    let mut findings = Vec::new();

    for day in &config.settings.days {
        let rows = timetable.get(day).map(Vec::as_slice).unwrap_or(&[]);
        for slot in &config.settings.all_slots {
            let mut users: BTreeMap<(Resource, String), Vec<String>> = BTreeMap::new();
            for row in rows {
                let Some(cell) = row.cell(slot).filter(|c| c.status == Status::Assigned) else {
                    continue;
                };
                for teacher in cell.teachers() {
                    let key = (Resource::Teacher, teacher.to_string());
                    users.entry(key).or_default().push(row.section.clone());
                }
                for room in cell.rooms() {
                    let kind = if lab_rooms.contains(room) {
                        Resource::LabRoom
                    } else {
                        Resource::TheoryRoom
                    };
                    users.entry((kind, room.to_string())).or_default().push(row.section.clone());
                }
            }
            findings.extend(users.into_iter().filter(|(_, s)| s.len() > 1).map(
                |((resource, name), sections)| Finding::DoubleBooking {
                    resource,
                    name,
                    day: day.clone(),
                    slot: slot.clone(),
                    sections,
                },
            ));
        }
    }
    findings
}

/// `"DS Lab (G-A)"` -> `"DS Lab"`.
fn lab_name<'s>(settings: &Settings, label: &'s str) -> &'s str {
    settings.split_lab_label(label).map_or(label, |(lab, _)| lab)
}

fn row_of<'t>(timetable: &'t Timetable, day: &str, section: &str) -> Option<&'t CohortRow> {
    timetable.get(day)?.iter().find(|r| r.section == section)
}

fn subject_rules(config: &Config, timetable: &Timetable, section: &str) -> Vec<Finding> {
    let settings = &config.settings;
    let core = config.core_subjects_of(section);
    let mut weekly: BTreeMap<&str, usize> = core.iter().map(|s| (s.as_str(), 0)).collect();
    let mut findings = Vec::new();

    for day in &settings.days {
        let Some(row) = row_of(timetable, day, section) else {
            continue;
        };
        let today = row
            .slots
            .values()
            .filter_map(|cells| cells.first())
            .filter(|c| c.status == Status::Assigned)
            .filter_map(|c| c.single_subject())
            .filter(|s| weekly.contains_key(s))
            .counts();
        for (subject, n) in today.into_iter().sorted() {
            *weekly.entry(subject).or_default() += n;
            if n > 1 {
                findings.push(Finding::SameDayRepeat {
                    section: section.to_string(),
                    day: day.clone(),
                    subject: subject.to_string(),
                });
            }
        }

        for (slot, cell) in row.slots.iter().filter_map(|(s, c)| c.first().map(|c| (s, c))) {
            let pairs = [("lab", &cell.subject), ("room", &cell.room)];
            for (field, value) in pairs {
                if let Some(Parallel::Two(a, b)) = value {
                    let same = if field == "lab" {
                        lab_name(settings, a) == lab_name(settings, b)
                    } else {
                        a == b
                    };
                    if same {
                        findings.push(Finding::LabPairClash {
                            section: section.to_string(),
                            day: day.clone(),
                            slot: slot.clone(),
                            field: field.to_string(),
                        });
                    }
                }
            }
        }
    }

    findings.extend(
        weekly
            .into_iter()
            .filter(|(_, n)| *n != SESSIONS_PER_WEEK)
            .map(|(subject, count)| Finding::WeeklyCount {
                section: section.to_string(),
                subject: subject.to_string(),
                count,
            }),
    );
    findings.extend(lab_rules(config, timetable, section));
    findings
}

/// Each configured lab once per week and group. A lab block is read from
/// the first of its two slots.
fn lab_rules(config: &Config, timetable: &Timetable, section: &str) -> Vec<Finding> {
    let settings = &config.settings;
    let blocks = settings.lab_blocks();
    let mut weekly: BTreeMap<(Group, &str), usize> = Group::BOTH
        .into_iter()
        .cartesian_product(config.labs_of(section))
        .map(|(group, lab)| ((group, lab.as_str()), 0))
        .collect();

    for day in &settings.days {
        let Some(row) = row_of(timetable, day, section) else {
            continue;
        };
        for block in &blocks {
            let Some(cell) = row.cell(&block.slots[0]).filter(|c| c.status == Status::Assigned)
            else {
                continue;
            };
            let Some(Parallel::Two(a, b)) = &cell.subject else {
                continue;
            };
            for (lab, group) in [a, b].into_iter().filter_map(|l| settings.split_lab_label(l)) {
                if let Some(n) = weekly.get_mut(&(group, lab)) {
                    *n += 1;
                }
            }
        }
    }

    weekly
        .into_iter()
        .filter(|(_, n)| *n != LAB_SESSIONS_PER_WEEK)
        .map(|((group, lab), count)| Finding::LabWeeklyCount {
            section: section.to_string(),
            lab: lab.to_string(),
            group: settings.group_label(group).to_string(),
            count,
        })
        .collect()
}

/// Double bookings across every cohort, plus the subject and lab rules for
/// `sections`.
pub fn audit(config: &Config, timetable: &Timetable, sections: &[String]) -> Vec<Finding> {
    let mut findings = double_bookings(config, timetable);
    for section in sections {
        findings.extend(subject_rules(config, timetable, section));
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn reports_clashes_in_fixed_data() {
        let cfg = fixtures::config();
        let mut tt = fixtures::timetable(&cfg);
        for section in ["CSE-A", "CSE-B"] {
            let math = fixtures::fixed("MATH", "T_MATH", "R1");
            fixtures::mark(&mut tt, section, "Monday", "9-10", math);
        }

        let findings = audit(&cfg, &tt, &[]);
        assert_eq!(findings.len(), 2);
        assert!(findings.contains(&Finding::DoubleBooking {
            resource: Resource::Teacher,
            name: "T_MATH".into(),
            day: "Monday".into(),
            slot: "9-10".into(),
            sections: vec!["CSE-A".into(), "CSE-B".into()],
        }));
    }

    #[test]
    fn split_lab_names_are_checked_separately() {
        let cfg = fixtures::config();
        let mut tt = fixtures::timetable(&cfg);
        let lab = fixtures::fixed("DS Lab (G-A) / OS Lab (G-B)", "T_DS / T_OS", "L1 / L2");
        fixtures::mark(&mut tt, "CSE-A", "Monday", "9-10", lab);
        let other = fixtures::fixed("DS Lab (G-A) / DS Lab (G-B)", "T_CN / TBD", "L3 / L1");
        fixtures::mark(&mut tt, "CSE-B", "Monday", "9-10", other);

        let findings = audit(&cfg, &tt, &["CSE-B".to_string()]);
        assert!(findings.contains(&Finding::DoubleBooking {
            resource: Resource::LabRoom,
            name: "L1".into(),
            day: "Monday".into(),
            slot: "9-10".into(),
            sections: vec!["CSE-A".into(), "CSE-B".into()],
        }));
        let lab_clash =
            |f: &Finding| matches!(f, Finding::LabPairClash { field, .. } if field == "lab");
        assert!(findings.iter().any(lab_clash));
        // nothing about placeholder teachers
        assert!(!findings.iter().any(|f| f.to_string().contains("TBD")));
    }

    #[test]
    fn weekly_and_daily_subject_rules() {
        let cfg = fixtures::config();
        let mut tt = fixtures::timetable(&cfg);
        for slot in ["9-10", "10-11"] {
            fixtures::mark(&mut tt, "CSE-A", "Monday", slot, fixtures::fixed("OS", "T_OS", "R1"));
        }
        let findings = audit(&cfg, &tt, &["CSE-A".to_string()]);
        assert!(findings.contains(&Finding::SameDayRepeat {
            section: "CSE-A".into(),
            day: "Monday".into(),
            subject: "OS".into(),
        }));
        assert!(findings.contains(&Finding::WeeklyCount {
            section: "CSE-A".into(),
            subject: "OS".into(),
            count: 2,
        }));
        assert!(findings.contains(&Finding::WeeklyCount {
            section: "CSE-A".into(),
            subject: "DS".into(),
            count: 0,
        }));
    }

    #[test]
    fn each_lab_once_per_group() {
        let cfg = fixtures::config();
        let mut tt = fixtures::timetable(&cfg);
        let pair = fixtures::fixed("DS Lab (G-A) / OS Lab (G-B)", "T_DS / T_OS", "L1 / L2");
        for (day, slots) in [("Monday", ["3-4", "4-5"]), ("Thursday", ["9-10", "10-11"])] {
            for slot in slots {
                fixtures::mark(&mut tt, "CSE-A", day, slot, pair.clone());
            }
        }

        let labs: Vec<Finding> = audit(&cfg, &tt, &["CSE-A".to_string()])
            .into_iter()
            .filter(|f| matches!(f, Finding::LabWeeklyCount { .. }))
            .collect();
        let expected = |lab: &str, group: &str, count| Finding::LabWeeklyCount {
            section: "CSE-A".into(),
            lab: lab.into(),
            group: group.into(),
            count,
        };
        assert_eq!(
            labs,
            vec![
                expected("DS Lab", "A", 2),
                expected("OS Lab", "A", 0),
                expected("DS Lab", "B", 0),
                expected("OS Lab", "B", 2),
            ]
        );
        assert_eq!(
            labs[0].to_string(),
            "CSE-A: `DS Lab` occurs 2 times this week for group A"
        );
    }

    #[test]
    fn findings_serialize_with_a_kind_tag() {
        let f = Finding::WeeklyCount {
            section: "X".into(),
            subject: "DS".into(),
            count: 1,
        };
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["kind"], "weeklyCount");
        assert_eq!(json["count"], 1);
    }
}
