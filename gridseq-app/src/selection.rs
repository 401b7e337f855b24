#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
}

impl SelectionRange {
    pub fn single(index: usize) -> Self {
        Self {
            start: index,
            end: index + 1,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

/// Rectangle of cells in one section: rows are section-relative, columns absolute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellSelection {
    pub section: usize,
    pub rows: SelectionRange,
    pub columns: SelectionRange,
}

impl CellSelection {
    pub fn single(section: usize, row: usize, column: usize) -> Self {
        Self {
            section,
            rows: SelectionRange::single(row),
            columns: SelectionRange::single(column),
        }
    }

    pub fn contains(&self, section: usize, row: usize, column: usize) -> bool {
        self.section == section && self.rows.contains(row) && self.columns.contains(column)
    }

    /// Trims the selection to `rows x columns`; `None` once nothing is left.
    pub fn clamp(self, rows: usize, columns: usize) -> Option<Self> {
        if self.rows.start >= rows || self.columns.start >= columns {
            return None;
        }
        Some(Self {
            section: self.section,
            rows: SelectionRange {
                start: self.rows.start,
                end: self.rows.end.min(rows),
            },
            columns: SelectionRange {
                start: self.columns.start,
                end: self.columns.end.min(columns),
            },
        })
    }
}
