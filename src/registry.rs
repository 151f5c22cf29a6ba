use crate::config::{
    Group, SENTINEL_LAB_ROOM_PREFIX, SENTINEL_TEACHER_PREFIX, UNSTAFFED_TEACHER_PREFIX,
};
use crate::data::{Config, Status, Timetable, is_placeholder_teacher};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

pub type ResourceId = i64;

/// A dense, lexicographically ordered numbering of names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interner {
    ids: BTreeMap<String, ResourceId>,
    names: Vec<String>,
}

impl Interner {
    pub fn from_names(names: BTreeSet<String>) -> Self {
        let names: Vec<String> = names.into_iter().collect();
        let ids = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i as ResourceId))
            .collect();
        Self { ids, names }
    }

    pub fn id(&self, name: &str) -> Option<ResourceId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: ResourceId) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Placeholder identities of one (cohort, group): "no lab here".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinel {
    pub teacher: ResourceId,
    pub lab_room: ResourceId,
}

/// Integer numbering of every teacher, theory room and lab room of a pass.
#[derive(Debug, Clone)]
pub struct Registry {
    pub teachers: Interner,
    pub theory_rooms: Interner,
    pub lab_rooms: Interner,
    sentinels: BTreeMap<(String, Group), Sentinel>,
    real_lab_rooms: Vec<ResourceId>,
}

pub fn sentinel_teacher_name(section: &str, label: &str) -> String {
    format!("{SENTINEL_TEACHER_PREFIX}{section}_{label}")
}

pub fn sentinel_lab_room_name(section: &str, label: &str) -> String {
    format!("{SENTINEL_LAB_ROOM_PREFIX}{section}_{label}")
}

/// The pool identity of a configured teacher. A "TBD" teacher becomes a
/// stand-in private to one (cohort, subject or lab): two cells of one
/// cohort never share a slot with the same subject, so stand-ins never
/// collide in a pool.
pub fn pool_teacher_name(section: &str, subject: &str, teacher: &str) -> String {
    if is_placeholder_teacher(teacher) {
        format!("{UNSTAFFED_TEACHER_PREFIX}{section}_{subject}")
    } else {
        teacher.to_string()
    }
}

impl Registry {
    /// Interns every name the pass can refer to. `sections` are the cohorts
    /// being solved; each of them with labs receives one sentinel teacher and
    /// one sentinel lab room per group before numbering.
    pub fn build(config: &Config, timetable: &Timetable, sections: &[String]) -> Self {
        let configured_lab_rooms: BTreeSet<&str> =
            config.lab_rooms.iter().map(String::as_str).collect();

        let mut teachers = BTreeSet::new();
        let mut theory_rooms = BTreeSet::new();
        let mut lab_rooms: BTreeSet<String> = config.lab_rooms.iter().cloned().collect();

        for row in timetable.values().flatten() {
            for cell in row.slots.values().filter_map(|c| c.first()) {
                if cell.status != Status::Assigned {
                    continue;
                }
                teachers.extend(cell.teachers().map(str::to_string));
                theory_rooms.extend(
                    cell.rooms()
                        .filter(|r| !configured_lab_rooms.contains(r))
                        .map(str::to_string),
                );
            }
        }

        for section in &config.sections {
            for subject in config.core_subjects_of(section) {
                if let Some(teacher) = config.teacher_of(section, subject) {
                    teachers.insert(pool_teacher_name(section, subject, teacher));
                }
            }
            for (lab, teacher) in config.lab_teacher_map(section) {
                teachers.insert(pool_teacher_name(section, lab, teacher));
            }
        }
        theory_rooms.extend(config.section_theory_rooms.values().cloned());

        let mut sentinel_names = BTreeMap::new();
        for section in sections.iter().filter(|s| !config.labs_of(s).is_empty()) {
            for group in Group::BOTH {
                let label = config.settings.group_label(group);
                let teacher = sentinel_teacher_name(section, label);
                let room = sentinel_lab_room_name(section, label);
                teachers.insert(teacher.clone());
                lab_rooms.insert(room.clone());
                sentinel_names.insert((section.clone(), group), (teacher, room));
            }
        }

        let teachers = Interner::from_names(teachers);
        let theory_rooms = Interner::from_names(theory_rooms);
        let lab_rooms = Interner::from_names(lab_rooms);

        let sentinels: BTreeMap<(String, Group), Sentinel> = sentinel_names
            .into_iter()
            .filter_map(|(key, (t, r))| {
                Some((
                    key,
                    Sentinel {
                        teacher: teachers.id(&t)?,
                        lab_room: lab_rooms.id(&r)?,
                    },
                ))
            })
            .collect();
        let real_lab_rooms = config
            .lab_rooms
            .iter()
            .filter_map(|r| lab_rooms.id(r))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!(
            "Registry: {} teachers, {} theory rooms, {} lab rooms ({} sentinel pairs)",
            teachers.len(),
            theory_rooms.len(),
            lab_rooms.len(),
            sentinels.len()
        );

        Self {
            teachers,
            theory_rooms,
            lab_rooms,
            sentinels,
            real_lab_rooms,
        }
    }

    pub fn sentinel(&self, section: &str, group: Group) -> Option<Sentinel> {
        self.sentinels.get(&(section.to_string(), group)).copied()
    }

    pub fn is_sentinel_lab_room(&self, id: ResourceId) -> bool {
        self.sentinels.values().any(|s| s.lab_room == id)
    }

    /// Configured lab rooms, ascending by ID.
    pub fn real_lab_rooms(&self) -> &[ResourceId] {
        &self.real_lab_rooms
    }

    /// Teacher ID of each core subject of `section`, in core-subject order.
    pub fn core_teacher_ids(&self, config: &Config, section: &str) -> Option<Vec<ResourceId>> {
        config
            .core_subjects_of(section)
            .iter()
            .map(|s| {
                config
                    .teacher_of(section, s)
                    .and_then(|t| self.teachers.id(&pool_teacher_name(section, s, t)))
            })
            .collect()
    }

    /// Teacher ID of each lab of `section`, in lab order.
    pub fn lab_teacher_ids(&self, config: &Config, section: &str) -> Option<Vec<ResourceId>> {
        config
            .labs_of(section)
            .iter()
            .map(|lab| {
                config
                    .lab_teacher_of(section, lab)
                    .and_then(|t| self.teachers.id(&pool_teacher_name(section, lab, t)))
            })
            .collect()
    }
}
