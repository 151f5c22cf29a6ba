use crate::error::TooManyParts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// Type aliases for clarity
pub type Cohort = String;
pub type Day = String;
pub type Slot = String;

/// Separator used on the wire when one cell carries two parallel lab groups.
pub const PARALLEL_SEPARATOR: char = '/';

/// Marker for teacher names that are placeholders rather than real people.
pub const TBD_MARKER: &str = "TBD";

/// Status of one (cohort, day, slot) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Status {
    Free,
    #[serde(rename = "To Be Assigned")]
    ToBeAssigned,
    Assigned,
}

/// The record stored inside a slot's single-element list.
///
/// `subject`, `teacher` and `room` are joined `"x / y"` strings on the wire
/// and parsed into [`Parallel`] values on the way in.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CellRecord {
    pub status: Status,
    #[serde(default, with = "joined", skip_serializing_if = "Option::is_none")]
    pub subject: Option<Parallel<String>>,
    #[serde(default, with = "joined", skip_serializing_if = "Option::is_none")]
    pub teacher: Option<Parallel<String>>,
    #[serde(default, with = "joined", skip_serializing_if = "Option::is_none")]
    pub room: Option<Parallel<String>>,
    /// Fields this crate does not interpret (`time`, annotations, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Names that stand for a teacher not hired yet.
pub fn is_placeholder_teacher(name: &str) -> bool {
    name.contains(TBD_MARKER)
}

impl CellRecord {
    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            subject: None,
            teacher: None,
            room: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn assigned(
        subject: Parallel<String>,
        teacher: Parallel<String>,
        room: Parallel<String>,
    ) -> Self {
        Self {
            status: Status::Assigned,
            subject: Some(subject),
            teacher: Some(teacher),
            room: Some(room),
            extra: BTreeMap::new(),
        }
    }

    /// The subject of a theory cell; `None` for paired lab cells.
    pub fn single_subject(&self) -> Option<&str> {
        self.subject.as_ref()?.single().map(String::as_str)
    }

    /// Teachers occupied by this cell. Placeholder ("TBD") names are dropped.
    pub fn teachers(&self) -> impl Iterator<Item = &str> {
        self.teacher
            .iter()
            .flat_map(|p| p.iter())
            .map(String::as_str)
            .filter(|t| !is_placeholder_teacher(t))
    }

    /// Rooms occupied by this cell.
    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.room.iter().flat_map(|p| p.iter()).map(String::as_str)
    }
}

/// One cohort's row for a single day: slot name -> `[CellRecord]`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CohortRow {
    pub section: Cohort,
    #[serde(flatten)]
    pub slots: BTreeMap<Slot, Vec<CellRecord>>,
}

impl CohortRow {
    pub fn cell(&self, slot: &str) -> Option<&CellRecord> {
        self.slots.get(slot).and_then(|cells| cells.first())
    }

    pub fn cell_mut(&mut self, slot: &str) -> Option<&mut CellRecord> {
        self.slots.get_mut(slot).and_then(|cells| cells.first_mut())
    }
}

/// The persisted timetable: day -> ordered list of cohort rows.
pub type Timetable = BTreeMap<Day, Vec<CohortRow>>;

/// One or two parallel identities held by a single cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Parallel<T> {
    One(T),
    Two(T, T),
}

impl Parallel<String> {
    /// Splits an `"x / y"` wire string. Blank halves are dropped; a fully
    /// blank string yields `Ok(None)`.
    pub fn parse(raw: &str) -> Result<Option<Self>, TooManyParts> {
        let parts: Vec<&str> = raw
            .split(PARALLEL_SEPARATOR)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        match parts.as_slice() {
            [] => Ok(None),
            [a] => Ok(Some(Parallel::One(a.to_string()))),
            [a, b] => Ok(Some(Parallel::Two(a.to_string(), b.to_string()))),
            _ => Err(TooManyParts(raw.to_string())),
        }
    }
}

impl<T> Parallel<T> {
    pub fn single(&self) -> Option<&T> {
        match self {
            Parallel::One(a) => Some(a),
            Parallel::Two(..) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (a, b) = match self {
            Parallel::One(a) => (a, None),
            Parallel::Two(a, b) => (a, Some(b)),
        };
        std::iter::once(a).chain(b)
    }
}

impl<T: fmt::Display> fmt::Display for Parallel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parallel::One(a) => write!(f, "{a}"),
            Parallel::Two(a, b) => write!(f, "{a} {PARALLEL_SEPARATOR} {b}"),
        }
    }
}

/// Serde adapter between joined wire strings and `Option<Parallel<String>>`.
mod joined {
    use super::Parallel;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Parallel<String>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(p) => serializer.collect_str(p),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Parallel<String>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(raw) => Parallel::parse(&raw).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

/// Global grid settings shared by every cohort.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub days: Vec<Day>,
    pub all_slots: Vec<Slot>,
    /// Ordered lab-block names.
    pub lab_slot: Vec<String>,
    /// Lab block -> its two constituent 1-hour slots.
    pub lab_slot_map: BTreeMap<String, (Slot, Slot)>,
    pub groups: Vec<String>,
    pub solver_timeout_seconds: f64,
    /// Keep clashes already present in fixed data in the resource pools,
    /// which makes any pass over them infeasible. Off: each clashing
    /// resource enters a pool once and a warning is logged.
    #[serde(default)]
    pub strict_fixed_data: bool,
}

/// A named stage of the multi-pass pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PassSpec {
    pub name: String,
    pub sections: Vec<Cohort>,
}

/// The complete configuration input.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub sections: Vec<Cohort>,
    pub settings: Settings,
    pub core_subjects: BTreeMap<Cohort, Vec<String>>,
    pub subjects: BTreeMap<Cohort, Vec<(String, String)>>,
    #[serde(default)]
    pub labs: BTreeMap<Cohort, Vec<String>>,
    #[serde(default)]
    pub lab_teachers: BTreeMap<Cohort, BTreeMap<String, String>>,
    pub section_theory_rooms: BTreeMap<Cohort, String>,
    pub lab_rooms: Vec<String>,
    #[serde(default)]
    pub passes: Vec<PassSpec>,
}

/// The request body of the HTTP solve endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveRequest {
    pub config: Config,
    pub timetable: Timetable,
    /// Cohorts to solve; defaults to the configured passes.
    #[serde(default)]
    pub sections: Option<Vec<Cohort>>,
}

/// The outcome of one stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub stage: String,
    pub sections: Vec<Cohort>,
    pub outcome: String,
    pub theory_cells_written: usize,
    pub lab_blocks_written: usize,
    pub elapsed_ms: u128,
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({} theory cells, {} lab blocks, {} ms)",
            self.stage,
            self.outcome,
            self.theory_cells_written,
            self.lab_blocks_written,
            self.elapsed_ms
        )
    }
}

/// The response of the HTTP solve endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    pub timetable: Timetable,
    pub passes: Vec<PassReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn joined(raw: &str) -> Option<Parallel<String>> {
        Parallel::parse(raw).unwrap()
    }

    #[test]
    fn status_uses_wire_names() {
        let s: Status = serde_json::from_str("\"To Be Assigned\"").unwrap();
        assert_eq!(s, Status::ToBeAssigned);
        assert_eq!(serde_json::to_string(&Status::Free).unwrap(), "\"Free\"");
    }

    #[test]
    fn cohort_row_keeps_unknown_cell_fields() {
        let raw = r#"{"section":"CSE-A","9-10":[{"status":"Assigned","subject":"DS",
            "teacher":null,"room":"B-1","time":"9:00"}]}"#;
        let row: CohortRow = serde_json::from_str(raw).unwrap();
        let cell = row.cell("9-10").unwrap();
        assert_eq!(cell.teacher, None);
        assert_eq!(cell.single_subject(), Some("DS"));
        assert_eq!(cell.extra.get("time"), Some(&serde_json::json!("9:00")));

        let back = serde_json::to_value(&row).unwrap();
        assert_eq!(back["9-10"][0]["time"], "9:00");
        assert_eq!(back["9-10"][0]["room"], "B-1");
        assert_eq!(back["section"], "CSE-A");
    }

    #[test]
    fn joined_fields_are_parsed_on_the_way_in() {
        let raw = r#"{"status":"Assigned","subject":"DS Lab (G-A) / OS Lab (G-B)",
            "teacher":"RS / TBD-1","room":"L1 /L2"}"#;
        let cell: CellRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(cell.single_subject(), None);
        assert_eq!(cell.teachers().collect::<Vec<_>>(), vec!["RS"]);
        assert_eq!(cell.rooms().collect::<Vec<_>>(), vec!["L1", "L2"]);
        assert_eq!(serde_json::to_value(&cell).unwrap()["room"], "L1 / L2");

        let blank: CellRecord =
            serde_json::from_str(r#"{"status":"Free","teacher":"  "}"#).unwrap();
        assert_eq!(blank.teacher, None);
        assert_eq!(blank.teachers().count(), 0);
    }

    #[test]
    fn three_parallel_parts_are_rejected() {
        assert_eq!(Parallel::parse("a / b / c"), Err(TooManyParts("a / b / c".into())));
        let raw = r#"{"status":"Assigned","teacher":"T1 / T2 / T3"}"#;
        let err = serde_json::from_str::<CellRecord>(raw).unwrap_err();
        assert!(err.to_string().contains("T1 / T2 / T3"));
    }

    #[test]
    fn parallel_display_matches_wire_format() {
        let p = Parallel::Two("a", "b");
        assert_eq!(p.to_string(), "a / b");
        assert_eq!(Parallel::One(3).to_string(), "3");
        assert_eq!(joined("x").unwrap().single().map(String::as_str), Some("x"));
    }

    proptest! {
        #[test]
        fn parallel_parse_inverts_display(a in "[A-Za-z0-9-]{1,8}", b in "[A-Za-z0-9-]{1,8}") {
            let joined = Parallel::Two(a.clone(), b.clone()).to_string();
            prop_assert_eq!(Parallel::parse(&joined), Ok(Some(Parallel::Two(a.clone(), b))));
            prop_assert_eq!(Parallel::parse(&a), Ok(Some(Parallel::One(a.clone()))));
        }
    }
}
