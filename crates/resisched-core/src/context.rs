//! Scheduling Context (C1): an immutable, arena-indexed snapshot of
//! people, blocks, templates, absences, and pre-assignments.
//!
//! The context owns flat arrays; cross-references are indices, not
//! pointers, so CP-SAT-style variable construction and parallel
//! constraint evaluation are trivial (spec §9 "Arena + indices").

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::{Assignment, AvailabilityMatrix, Block, Person, RotationTemplate};

/// Immutable snapshot consumed by the rest of the pipeline. Safe to share
/// across threads without locks: nothing in it is mutated after
/// construction.
#[derive(Debug, Clone)]
pub struct SchedulingContext {
    residents: Vec<Person>,
    faculty: Vec<Person>,
    blocks: Vec<Block>,
    templates: Vec<RotationTemplate>,
    existing_assignments: Vec<Assignment>,
    availability: AvailabilityMatrix,

    person_index: HashMap<Uuid, usize>,
    block_index: HashMap<Uuid, usize>,
    template_index: HashMap<Uuid, usize>,
}

impl SchedulingContext {
    /// Build a context from its constituent parts. `absences` is consumed
    /// once here to build the availability matrix; the context does not
    /// retain the raw absence list.
    pub fn build(
        mut people: Vec<Person>,
        mut blocks: Vec<Block>,
        templates: Vec<RotationTemplate>,
        existing_assignments: Vec<Assignment>,
        absences: &[crate::domain::Absence],
    ) -> Self {
        crate::domain::sort_blocks(&mut blocks);
        people.sort_by(|a, b| a.id.cmp(&b.id));

        let residents: Vec<Person> = people.iter().filter(|p| p.is_resident()).cloned().collect();
        let faculty: Vec<Person> = people.iter().filter(|p| p.is_faculty()).cloned().collect();

        let person_ids: Vec<Uuid> = people.iter().map(|p| p.id).collect();
        let block_pairs: Vec<(Uuid, chrono::NaiveDate)> =
            blocks.iter().map(|b| (b.id, b.date)).collect();
        let availability = AvailabilityMatrix::build(&person_ids, &block_pairs, absences);

        let mut person_index = HashMap::new();
        for (i, p) in residents.iter().chain(faculty.iter()).enumerate() {
            person_index.insert(p.id, i);
        }
        let block_index = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id, i))
            .collect();
        let template_index = templates
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i))
            .collect();

        Self {
            residents,
            faculty,
            blocks,
            templates,
            existing_assignments,
            availability,
            person_index,
            block_index,
            template_index,
        }
    }

    pub fn residents(&self) -> &[Person] {
        &self.residents
    }

    pub fn faculty(&self) -> &[Person] {
        &self.faculty
    }

    pub fn all_people(&self) -> impl Iterator<Item = &Person> {
        self.residents.iter().chain(self.faculty.iter())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn templates(&self) -> &[RotationTemplate] {
        &self.templates
    }

    pub fn existing_assignments(&self) -> &[Assignment] {
        &self.existing_assignments
    }

    pub fn availability(&self, person_id: Uuid, block_id: Uuid) -> bool {
        self.availability.is_available(person_id, block_id)
    }

    pub fn availability_matrix(&self) -> &AvailabilityMatrix {
        &self.availability
    }

    pub fn person_by_id(&self, id: Uuid) -> Option<&Person> {
        self.person_index
            .get(&id)
            .map(|&i| self.index_into_people(i))
    }

    fn index_into_people(&self, i: usize) -> &Person {
        if i < self.residents.len() {
            &self.residents[i]
        } else {
            &self.faculty[i - self.residents.len()]
        }
    }

    pub fn block_by_id(&self, id: Uuid) -> Option<&Block> {
        self.block_index.get(&id).map(|&i| &self.blocks[i])
    }

    pub fn template_by_id(&self, id: Uuid) -> Option<&RotationTemplate> {
        self.template_index.get(&id).map(|&i| &self.templates[i])
    }

    /// Replace the existing-assignments list, keeping everything else.
    /// Used by the Resilience Harness to inject a perturbed context
    /// without rebuilding the whole availability matrix.
    pub fn with_existing_assignments(mut self, assignments: Vec<Assignment>) -> Self {
        self.existing_assignments = assignments;
        self
    }
}
