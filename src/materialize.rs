use crate::config::Group;
use crate::cp::{Assignment, Value, VarId};
use crate::data::{CellRecord, Config, Parallel, Status, Timetable};
use crate::encoder::{CohortTables, Encoding, LabCell, TheoryCell};
use crate::error::MaterializeError;
use crate::registry::Registry;
use log::{debug, info};

/// Cells written by one materialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Written {
    pub theory_cells: usize,
    pub lab_blocks: usize,
}

struct Decoder<'a> {
    enc: &'a Encoding,
    assignment: &'a Assignment,
    config: &'a Config,
    registry: &'a Registry,
}

impl<'a> Decoder<'a> {
    fn value(&self, var: VarId) -> Result<Value, MaterializeError> {
        self.assignment
            .value(var)
            .ok_or_else(|| MaterializeError::MissingValue(self.enc.model.var(var).name.clone()))
    }

    fn unresolvable(&self, var: VarId, value: Value, kind: &'static str) -> MaterializeError {
        MaterializeError::Unresolvable {
            var: self.enc.model.var(var).name.clone(),
            value,
            kind,
        }
    }

    fn pick<'s>(
        &self,
        list: &'s [String],
        var: VarId,
        kind: &'static str,
    ) -> Result<&'s str, MaterializeError> {
        let value = self.value(var)?;
        usize::try_from(value)
            .ok()
            .and_then(|i| list.get(i))
            .map(String::as_str)
            .ok_or_else(|| self.unresolvable(var, value, kind))
    }

    fn tables(&self, section: &str) -> Result<&'a CohortTables, MaterializeError> {
        self.enc
            .cohorts
            .get(section)
            .ok_or_else(|| MaterializeError::MissingValue(format!("tables of `{section}`")))
    }

    fn theory_record(&self, cell: &TheoryCell) -> Result<CellRecord, MaterializeError> {
        let tables = self.tables(&cell.section)?;
        let value = self.value(cell.subject)?;
        let subject = self.pick(&tables.core_subjects, cell.subject, "core subject")?;
        let teacher = self
            .config
            .teacher_of(&cell.section, subject)
            .ok_or_else(|| self.unresolvable(cell.subject, value, "subject with a teacher"))?;
        let room = self
            .registry
            .theory_rooms
            .name(tables.home_room)
            .ok_or_else(|| self.unresolvable(cell.subject, tables.home_room, "theory room"))?;
        let one = |name: &str| Parallel::One(name.to_string());
        Ok(CellRecord::assigned(one(subject), one(teacher), one(room)))
    }

    /// Lab label, teacher and room of one group.
    fn lab_half(
        &self,
        cell: &LabCell,
        tables: &CohortTables,
        group: Group,
    ) -> Result<(String, String, String), MaterializeError> {
        let vars = cell.group(group);
        let value = self.value(vars.subject)?;
        let lab = self.pick(&tables.labs, vars.subject, "lab")?;
        let teacher = self
            .config
            .lab_teacher_of(&cell.section, lab)
            .ok_or_else(|| self.unresolvable(vars.subject, value, "lab with a teacher"))?;
        let room_id = self.value(vars.room)?;
        let room = self
            .registry
            .lab_rooms
            .name(room_id)
            .filter(|_| !self.registry.is_sentinel_lab_room(room_id))
            .ok_or_else(|| self.unresolvable(vars.room, room_id, "real lab room"))?;
        Ok((
            self.config.settings.lab_label(lab, group),
            teacher.to_string(),
            room.to_string(),
        ))
    }

    /// `None` when the block holds no lab.
    fn lab_record(&self, cell: &LabCell) -> Result<Option<CellRecord>, MaterializeError> {
        let tables = self.tables(&cell.section)?;
        if self.value(cell.group(Group::A).subject)? == tables.no_lab() {
            return Ok(None);
        }
        let (lab_a, teacher_a, room_a) = self.lab_half(cell, tables, Group::A)?;
        let (lab_b, teacher_b, room_b) = self.lab_half(cell, tables, Group::B)?;
        Ok(Some(CellRecord::assigned(
            Parallel::Two(lab_a, lab_b),
            Parallel::Two(teacher_a, teacher_b),
            Parallel::Two(room_a, room_b),
        )))
    }
}

fn write(
    out: &mut Timetable,
    section: &str,
    day: &str,
    slot: &str,
    record: &CellRecord,
) -> Result<(), MaterializeError> {
    let cell = out
        .get_mut(day)
        .and_then(|rows| rows.iter_mut().find(|r| r.section == section))
        .and_then(|row| row.cell_mut(slot))
        .ok_or_else(|| MaterializeError::MissingCell {
            section: section.to_string(),
            day: day.to_string(),
            slot: slot.to_string(),
        })?;
    cell.status = Status::Assigned;
    cell.subject.clone_from(&record.subject);
    cell.teacher.clone_from(&record.teacher);
    cell.room.clone_from(&record.room);
    Ok(())
}

/// Writes a verified assignment into a copy of `timetable`.
///
/// The input is never touched; on error nothing of the copy escapes.
pub fn materialize(
    enc: &Encoding,
    assignment: &Assignment,
    config: &Config,
    registry: &Registry,
    timetable: &Timetable,
) -> Result<(Timetable, Written), MaterializeError> {
    let decoder = Decoder {
        enc,
        assignment,
        config,
        registry,
    };
    let mut out = timetable.clone();
    let mut written = Written::default();

    for cell in &enc.theory {
        let record = decoder.theory_record(cell)?;
        write(&mut out, &cell.section, &cell.day, &cell.slot, &record)?;
        written.theory_cells += 1;
    }

    for cell in &enc.labs {
        let Some(record) = decoder.lab_record(cell)? else { continue };
        for slot in &cell.block.slots {
            write(&mut out, &cell.section, &cell.day, slot, &record)?;
        }
        if let Some(labs) = &record.subject {
            debug!("{} {} {}: {labs}", cell.section, cell.day, cell.block.name);
        }
        written.lab_blocks += 1;
    }

    info!(
        "Materialized {} theory cells and {} lab blocks",
        written.theory_cells, written.lab_blocks
    );
    Ok((out, written))
}
