use crate::data::{Config, PassSpec, Settings};
use crate::error::ConfigError;
use log::warn;
use std::collections::{BTreeMap, HashMap};

/// Placeholder identities are generated with these prefixes; real names may
/// not use them.
pub const SENTINEL_TEACHER_PREFIX: &str = "DUMMY_TEACHER_";
pub const SENTINEL_LAB_ROOM_PREFIX: &str = "DUMMY_LAB_ROOM_";
/// Stands in for a "TBD" teacher of one (cohort, subject or lab).
pub const UNSTAFFED_TEACHER_PREFIX: &str = "DUMMY_UNSTAFFED_";

const RESERVED_PREFIXES: [&str; 3] = [
    SENTINEL_TEACHER_PREFIX,
    SENTINEL_LAB_ROOM_PREFIX,
    UNSTAFFED_TEACHER_PREFIX,
];

/// One of the two parallel lab sub-groups of a cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {
    A,
    B,
}

impl Group {
    pub const BOTH: [Group; 2] = [Group::A, Group::B];

    pub fn index(self) -> usize {
        match self {
            Group::A => 0,
            Group::B => 1,
        }
    }
}

/// A lab block resolved against the slot grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabBlock {
    pub index: usize,
    pub name: String,
    pub slots: [String; 2],
}

impl Settings {
    pub fn group_label(&self, group: Group) -> &str {
        &self.groups[group.index()]
    }

    /// Lab blocks in configured order.
    pub fn lab_blocks(&self) -> Vec<LabBlock> {
        self.lab_slot
            .iter()
            .enumerate()
            .filter_map(|(index, name)| {
                self.lab_slot_map.get(name).map(|(s1, s2)| LabBlock {
                    index,
                    name: name.clone(),
                    slots: [s1.clone(), s2.clone()],
                })
            })
            .collect()
    }

    /// `"DS Lab"` for group A -> `"DS Lab (G-A)"`.
    pub fn lab_label(&self, lab: &str, group: Group) -> String {
        format!("{lab} (G-{})", self.group_label(group))
    }

    /// Inverse of [`Settings::lab_label`]. `None` for anything else.
    pub fn split_lab_label<'s>(&self, label: &'s str) -> Option<(&'s str, Group)> {
        let (lab, tag) = label.trim().rsplit_once(" (G-")?;
        let tag = tag.strip_suffix(')')?;
        Group::BOTH
            .into_iter()
            .find(|g| self.group_label(*g) == tag)
            .map(|g| (lab.trim(), g))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.groups.len() != 2 {
            return Err(ConfigError::GroupCount(self.groups.len()));
        }
        if !(self.solver_timeout_seconds.is_finite() && self.solver_timeout_seconds > 0.0) {
            return Err(ConfigError::TimeBudget(self.solver_timeout_seconds.to_string()));
        }
        let mut owner: HashMap<&str, &str> = HashMap::new();
        for block in &self.lab_slot {
            let (s1, s2) = self
                .lab_slot_map
                .get(block)
                .ok_or_else(|| ConfigError::UnknownLabBlock(block.clone()))?;
            for slot in [s1, s2] {
                if !self.all_slots.contains(slot) {
                    return Err(ConfigError::UnknownLabSlot {
                        block: block.clone(),
                        slot: slot.clone(),
                    });
                }
                if let Some(first) = owner.insert(slot, block) {
                    return Err(ConfigError::OverlappingLabBlocks {
                        slot: slot.clone(),
                        first: first.to_string(),
                        second: block.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Config {
    pub fn teacher_of(&self, section: &str, subject: &str) -> Option<&str> {
        self.subjects
            .get(section)?
            .iter()
            .find(|(s, _)| s == subject)
            .map(|(_, t)| t.as_str())
    }

    pub fn labs_of(&self, section: &str) -> &[String] {
        self.labs.get(section).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn core_subjects_of(&self, section: &str) -> &[String] {
        self.core_subjects
            .get(section)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Derives the teacher of a lab: explicit override, then the lab's own
    /// name in the subject table, then its first word (`"DS Lab"` -> `"DS"`).
    pub fn lab_teacher_of(&self, section: &str, lab: &str) -> Option<&str> {
        if let Some(t) = self.lab_teachers.get(section).and_then(|m| m.get(lab)) {
            return Some(t.as_str());
        }
        self.teacher_of(section, lab).or_else(|| {
            lab.split_whitespace()
                .next()
                .and_then(|head| self.teacher_of(section, head))
        })
    }

    /// Lab -> teacher for one section. Labs without a derivable teacher are
    /// skipped with a warning; [`Config::validate_pass`] rejects them for
    /// sections that are being solved.
    pub fn lab_teacher_map(&self, section: &str) -> BTreeMap<&str, &str> {
        let mut out = BTreeMap::new();
        for lab in self.labs_of(section) {
            match self.lab_teacher_of(section, lab) {
                Some(teacher) => {
                    out.insert(lab.as_str(), teacher);
                }
                None => warn!("No teacher could be mapped for lab '{lab}' in section {section}"),
            }
        }
        out
    }

    /// Checks that every section of a pass carries the data the model needs.
    pub fn validate_pass(&self, sections: &[String]) -> Result<(), ConfigError> {
        self.settings.validate()?;
        for section in sections {
            if !self.sections.contains(section) {
                return Err(ConfigError::UnknownSection(section.clone()));
            }
            let core = self
                .core_subjects
                .get(section)
                .ok_or_else(|| ConfigError::MissingCoreSubjects(section.clone()))?;
            if !self.section_theory_rooms.contains_key(section) {
                return Err(ConfigError::MissingTheoryRoom(section.clone()));
            }
            for subject in core {
                if self.teacher_of(section, subject).is_none() {
                    return Err(ConfigError::MissingSubjectTeacher {
                        section: section.clone(),
                        subject: subject.clone(),
                    });
                }
            }
            for lab in self.labs_of(section) {
                if self.lab_teacher_of(section, lab).is_none() {
                    return Err(ConfigError::UnmappedLabTeacher {
                        section: section.clone(),
                        lab: lab.clone(),
                    });
                }
            }
        }
        let reserved = self
            .subjects
            .values()
            .flatten()
            .map(|(_, t)| t)
            .chain(self.lab_rooms.iter())
            .find(|name| RESERVED_PREFIXES.iter().any(|p| name.starts_with(p)));
        if let Some(name) = reserved {
            return Err(ConfigError::ReservedName(name.clone()));
        }
        Ok(())
    }

    /// The configured pipeline; a section may belong to one pass only.
    pub fn passes(&self) -> Result<Vec<PassSpec>, ConfigError> {
        let mut owner: HashMap<&str, &str> = HashMap::new();
        for pass in &self.passes {
            for section in &pass.sections {
                if let Some(first) = owner.insert(section, &pass.name) {
                    return Err(ConfigError::SectionInTwoPasses {
                        section: section.clone(),
                        first: first.to_string(),
                        second: pass.name.clone(),
                    });
                }
            }
        }
        Ok(self.passes.clone())
    }
}
