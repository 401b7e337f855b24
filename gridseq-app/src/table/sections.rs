use gridseq_bridge::layout::{Section, MAX_SECTIONS, MAX_SEQUENCER_STEPS};

use super::TableError;

/// Ordered sections laid end to end on the step timeline.
///
/// `sections[i].start_step` always equals the sum of the step counts before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionList {
    sections: Vec<Section>,
}

impl SectionList {
    pub fn new(steps: usize) -> Self {
        Self {
            sections: vec![Section::new(0, steps as i32)],
        }
    }

    pub fn from_step_counts(counts: &[usize]) -> Result<Self, TableError> {
        if counts.is_empty() {
            return Err(TableError::LastSection);
        }
        if counts.len() > MAX_SECTIONS {
            return Err(TableError::TooManySections { max: MAX_SECTIONS });
        }
        if let Some(&steps) = counts.iter().find(|steps| **steps == 0) {
            return Err(TableError::InvalidStepCount(steps));
        }
        let total: usize = counts.iter().sum();
        if total > MAX_SEQUENCER_STEPS {
            return Err(TableError::TooManySteps {
                requested: total,
                max: MAX_SEQUENCER_STEPS,
            });
        }
        let mut list = Self {
            sections: counts
                .iter()
                .map(|steps| Section::new(0, *steps as i32))
                .collect(),
        };
        list.recompute();
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Section> {
        self.sections.get(index).copied()
    }

    pub fn as_slice(&self) -> &[Section] {
        &self.sections
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn total_steps(&self) -> usize {
        self.sections
            .last()
            .map(|section| section.end_step() as usize)
            .unwrap_or(0)
    }

    pub fn append(&mut self, steps: usize) -> Result<usize, TableError> {
        if steps == 0 {
            return Err(TableError::InvalidStepCount(steps));
        }
        if self.sections.len() >= MAX_SECTIONS {
            return Err(TableError::TooManySections { max: MAX_SECTIONS });
        }
        self.check_total(self.total_steps() + steps)?;
        let start = self.total_steps() as i32;
        self.sections.push(Section::new(start, steps as i32));
        Ok(self.sections.len() - 1)
    }

    /// Removes a section and shifts every later section down. The last
    /// remaining section cannot be deleted.
    pub fn delete(&mut self, index: usize) -> Result<Section, TableError> {
        self.check_index(index)?;
        if self.sections.len() == 1 {
            return Err(TableError::LastSection);
        }
        let removed = self.sections.remove(index);
        self.recompute();
        Ok(removed)
    }

    pub fn set_step_count(&mut self, index: usize, steps: usize) -> Result<(), TableError> {
        self.check_index(index)?;
        if steps == 0 {
            return Err(TableError::InvalidStepCount(steps));
        }
        let current = self.sections[index].num_steps as usize;
        self.check_total(self.total_steps() - current + steps)?;
        self.sections[index].num_steps = steps as i32;
        self.recompute();
        Ok(())
    }

    /// Adds one step to a section; later sections start one step later.
    pub fn insert_step(&mut self, index: usize) -> Result<(), TableError> {
        self.check_index(index)?;
        let steps = self.sections[index].num_steps as usize + 1;
        self.set_step_count(index, steps)
    }

    /// Removes one step from a section; later sections start one step earlier.
    /// A section keeps at least one step.
    pub fn delete_step(&mut self, index: usize) -> Result<(), TableError> {
        self.check_index(index)?;
        let steps = self.sections[index].num_steps as usize - 1;
        self.set_step_count(index, steps)
    }

    /// Gives every section the same step count.
    pub fn set_all_step_counts(&mut self, steps: usize) -> Result<(), TableError> {
        if steps == 0 {
            return Err(TableError::InvalidStepCount(steps));
        }
        self.check_total(steps * self.sections.len())?;
        for section in self.sections.iter_mut() {
            section.num_steps = steps as i32;
        }
        self.recompute();
        Ok(())
    }

    /// `(section, row)` holding an absolute step.
    pub fn section_at_step(&self, step: usize) -> Option<(usize, usize)> {
        let step = step as i32;
        self.sections
            .iter()
            .position(|section| step >= section.start_step && step < section.end_step())
            .map(|index| (index, (step - self.sections[index].start_step) as usize))
    }

    pub fn is_contiguous(&self) -> bool {
        let mut expected = 0;
        for section in &self.sections {
            if section.start_step != expected {
                return false;
            }
            expected += section.num_steps;
        }
        true
    }

    fn recompute(&mut self) {
        let mut start = 0;
        for section in self.sections.iter_mut() {
            section.start_step = start;
            start += section.num_steps;
        }
    }

    fn check_index(&self, index: usize) -> Result<(), TableError> {
        if index >= self.sections.len() {
            return Err(TableError::SectionOutOfRange {
                index,
                count: self.sections.len(),
            });
        }
        Ok(())
    }

    fn check_total(&self, total: usize) -> Result<(), TableError> {
        if total > MAX_SEQUENCER_STEPS {
            return Err(TableError::TooManySteps {
                requested: total,
                max: MAX_SEQUENCER_STEPS,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: usize) -> usize {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((self.0 >> 33) as usize) % bound
        }
    }

    #[test]
    fn stays_contiguous_under_random_edits() {
        let mut rng = Lcg(7);
        let mut list = SectionList::new(16);
        for _ in 0..2000 {
            let _ = match rng.next(5) {
                0 => list.append(1 + rng.next(32)).map(|_| ()),
                1 => list.delete(rng.next(list.len() + 1)).map(|_| ()),
                2 => list.insert_step(rng.next(list.len() + 1)),
                3 => list.delete_step(rng.next(list.len() + 1)),
                _ => list.set_step_count(rng.next(list.len() + 1), 1 + rng.next(64)),
            };
            assert!(list.is_contiguous(), "{:?}", list.as_slice());
            assert!(!list.is_empty());
            assert!(list.len() <= MAX_SECTIONS);
            assert!(list.total_steps() <= MAX_SEQUENCER_STEPS);
            let sum: i32 = list.iter().map(|section| section.num_steps).sum();
            assert_eq!(sum as usize, list.total_steps());
        }
    }

    #[test]
    fn deleting_a_middle_section_shifts_later_starts() {
        let mut list = SectionList::from_step_counts(&[8, 16, 4]).unwrap();
        assert_eq!(list.get(2), Some(Section::new(24, 4)));
        list.delete(1).unwrap();
        assert_eq!(list.as_slice(), &[Section::new(0, 8), Section::new(8, 4)]);
        assert_eq!(list.total_steps(), 12);
    }

    #[test]
    fn step_insert_and_delete_shift_later_sections() {
        let mut list = SectionList::from_step_counts(&[8, 16, 4]).unwrap();
        list.insert_step(0).unwrap();
        assert_eq!(list.get(1), Some(Section::new(9, 16)));
        assert_eq!(list.get(2), Some(Section::new(25, 4)));
        list.delete_step(1).unwrap();
        list.delete_step(1).unwrap();
        assert_eq!(list.get(2), Some(Section::new(23, 4)));
        assert_eq!(list.total_steps(), 27);

        let mut single = SectionList::new(1);
        assert!(matches!(single.delete_step(0), Err(TableError::InvalidStepCount(0))));
        assert!(matches!(
            single.insert_step(1),
            Err(TableError::SectionOutOfRange { index: 1, count: 1 })
        ));
    }

    #[test]
    fn last_section_cannot_be_deleted() {
        let mut list = SectionList::new(16);
        assert!(matches!(list.delete(0), Err(TableError::LastSection)));
        assert!(matches!(
            list.delete(3),
            Err(TableError::SectionOutOfRange { index: 3, count: 1 })
        ));
    }

    #[test]
    fn capacity_limits_are_enforced() {
        let mut list = SectionList::new(16);
        for _ in 1..MAX_SECTIONS {
            list.append(16).unwrap();
        }
        assert!(matches!(list.append(1), Err(TableError::TooManySections { .. })));
        assert!(matches!(
            list.set_step_count(0, 1100),
            Err(TableError::TooManySteps { .. })
        ));
        assert_eq!(list.total_steps(), 1024);
    }

    #[test]
    fn finds_section_for_step() {
        let list = SectionList::from_step_counts(&[8, 16]).unwrap();
        assert_eq!(list.section_at_step(0), Some((0, 0)));
        assert_eq!(list.section_at_step(7), Some((0, 7)));
        assert_eq!(list.section_at_step(8), Some((1, 0)));
        assert_eq!(list.section_at_step(23), Some((1, 15)));
        assert_eq!(list.section_at_step(24), None);
    }
}
