use itertools::iproduct;

use gridseq_bridge::layout::{
    Cell, Section, MAX_COLS_PER_LAYER, MAX_LAYERS_PER_SECTION, MAX_SEQUENCER_COLS,
};

use super::geometry::GridGeometry;
use super::sections::SectionList;
use super::TableError;

pub const DEFAULT_LAYERS: [i32; MAX_LAYERS_PER_SECTION] =
    [MAX_COLS_PER_LAYER as i32; MAX_LAYERS_PER_SECTION];

#[derive(Clone, Debug, PartialEq)]
struct SectionData {
    layers: [i32; MAX_LAYERS_PER_SECTION],
    /// One buffer per sound grid, `num_steps * columns_per_grid` cells, row-major.
    grids: Vec<Vec<Cell>>,
}

impl SectionData {
    fn empty(rows: usize, geometry: &GridGeometry) -> Self {
        Self {
            layers: DEFAULT_LAYERS,
            grids: vec![vec![Cell::EMPTY; rows * geometry.columns_per_grid]; geometry.sound_grids],
        }
    }

    /// Grows or shrinks every grid at the bottom; returns populated cells dropped.
    fn resize_rows(&mut self, rows: usize, columns_per_grid: usize) -> usize {
        let len = rows * columns_per_grid;
        let mut dropped = 0;
        for grid in self.grids.iter_mut() {
            if grid.len() > len {
                dropped += grid[len..].iter().filter(|cell| !cell.is_empty()).count();
            }
            grid.resize(len, Cell::EMPTY);
        }
        dropped
    }
}

/// Editable, section-based view of the table: sections, their layer widths
/// and one cell buffer per sound grid.
#[derive(Clone, Debug, PartialEq)]
pub struct TableModel {
    geometry: GridGeometry,
    sections: SectionList,
    data: Vec<SectionData>,
}

/// Where an absolute `(step, column)` lives in the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellAddress {
    pub section: usize,
    pub row: usize,
    pub grid: usize,
    pub column: usize,
}

impl TableModel {
    pub fn new(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            sections: SectionList::new(geometry.grid_rows),
            data: vec![SectionData::empty(geometry.grid_rows, &geometry)],
        }
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn sections(&self) -> &SectionList {
        &self.sections
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn total_steps(&self) -> usize {
        self.sections.total_steps()
    }

    pub fn total_columns(&self) -> usize {
        self.geometry.total_columns()
    }

    pub fn layers(&self, section: usize) -> Option<[i32; MAX_LAYERS_PER_SECTION]> {
        self.data.get(section).map(|data| data.layers)
    }

    pub fn locate(&self, step: usize, column: usize) -> Result<CellAddress, TableError> {
        let (section, row) =
            self.sections
                .section_at_step(step)
                .ok_or(TableError::StepOutOfRange {
                    step,
                    total: self.total_steps(),
                })?;
        if column >= self.total_columns() {
            return Err(TableError::ColumnOutOfRange {
                column,
                columns: self.total_columns(),
            });
        }
        let (grid, column) = self.geometry.decompose_column(column);
        Ok(CellAddress {
            section,
            row,
            grid,
            column,
        })
    }

    pub fn cell(&self, step: usize, column: usize) -> Option<Cell> {
        let address = self.locate(step, column).ok()?;
        Some(self.cell_at(address))
    }

    fn cell_at(&self, address: CellAddress) -> Cell {
        let index = address.row * self.geometry.columns_per_grid + address.column;
        self.data[address.section].grids[address.grid][index]
    }

    /// Writes one cell and returns what it replaced.
    pub fn set_cell(&mut self, step: usize, column: usize, cell: Cell) -> Result<Cell, TableError> {
        let address = self.locate(step, column)?;
        let index = address.row * self.geometry.columns_per_grid + address.column;
        let slot = &mut self.data[address.section].grids[address.grid][index];
        Ok(std::mem::replace(slot, cell))
    }

    /// Changes volume and pitch only, keeping the sample slot.
    pub fn set_cell_settings(
        &mut self,
        step: usize,
        column: usize,
        volume: f32,
        pitch: f32,
    ) -> Result<Cell, TableError> {
        let current = self.locate(step, column).map(|address| self.cell_at(address))?;
        self.set_cell(step, column, Cell::new(current.sample_slot, volume, pitch))
    }

    /// Changes the sample slot only, keeping volume and pitch.
    pub fn set_cell_sample_slot(
        &mut self,
        step: usize,
        column: usize,
        sample_slot: i32,
    ) -> Result<Cell, TableError> {
        let current = self.locate(step, column).map(|address| self.cell_at(address))?;
        self.set_cell(step, column, Cell::new(sample_slot, current.volume, current.pitch))
    }

    /// Every cell of one section with its absolute `(step, column)`.
    pub fn section_cells(&self, index: usize) -> impl Iterator<Item = (usize, usize, Cell)> + '_ {
        let (start, rows) = self
            .sections
            .get(index)
            .map(|section| (section.start_step as usize, section.num_steps as usize))
            .unwrap_or((0, 0));
        let columns = self.geometry.columns_per_grid;
        let grids = self.geometry.sound_grids;
        iproduct!(0..rows, 0..grids, 0..columns).map(move |(row, grid, column)| {
            let cell = self.data[index].grids[grid][row * columns + column];
            (start + row, self.geometry.absolute_column(grid, column), cell)
        })
    }

    pub fn populated_count(&self) -> usize {
        self.data
            .iter()
            .flat_map(|data| data.grids.iter().flatten())
            .filter(|cell| !cell.is_empty())
            .count()
    }

    pub fn append_section(&mut self, copy_from: Option<usize>) -> Result<usize, TableError> {
        let (steps, data) = match copy_from {
            Some(source) => {
                let section = self.section(source)?;
                (section.num_steps as usize, self.data[source].clone())
            }
            None => (
                self.geometry.grid_rows,
                SectionData::empty(self.geometry.grid_rows, &self.geometry),
            ),
        };
        let index = self.sections.append(steps)?;
        self.data.push(data);
        Ok(index)
    }

    pub fn delete_section(&mut self, index: usize) -> Result<usize, TableError> {
        self.sections.delete(index)?;
        let removed = self.data.remove(index);
        Ok(removed
            .grids
            .iter()
            .flatten()
            .filter(|cell| !cell.is_empty())
            .count())
    }

    pub fn set_section_step_count(&mut self, index: usize, steps: usize) -> Result<usize, TableError> {
        self.sections.set_step_count(index, steps)?;
        Ok(self.data[index].resize_rows(steps, self.geometry.columns_per_grid))
    }

    /// Inserts an empty row before `row` of a section. Lower rows and every
    /// later section move down one step.
    pub fn insert_step(&mut self, section: usize, row: usize) -> Result<(), TableError> {
        let rows = self.section(section)?.num_steps as usize;
        if row > rows {
            return Err(TableError::StepOutOfRange { step: row, total: rows });
        }
        self.sections.insert_step(section)?;
        let columns = self.geometry.columns_per_grid;
        for grid in self.data[section].grids.iter_mut() {
            let at = row * columns;
            grid.splice(at..at, std::iter::repeat(Cell::EMPTY).take(columns));
        }
        Ok(())
    }

    /// Removes `row` of a section. Lower rows and every later section move up
    /// one step. Returns populated cells dropped with the row.
    pub fn delete_step(&mut self, section: usize, row: usize) -> Result<usize, TableError> {
        let rows = self.section(section)?.num_steps as usize;
        if row >= rows {
            return Err(TableError::StepOutOfRange { step: row, total: rows });
        }
        self.sections.delete_step(section)?;
        let columns = self.geometry.columns_per_grid;
        Ok(self.data[section]
            .grids
            .iter_mut()
            .map(|grid| {
                grid.drain(row * columns..(row + 1) * columns)
                    .filter(|cell| !cell.is_empty())
                    .count()
            })
            .sum())
    }

    /// Gives every section `rows` steps; returns populated cells dropped.
    pub fn resize_rows(&mut self, rows: usize) -> Result<usize, TableError> {
        self.sections.set_all_step_counts(rows)?;
        self.geometry.grid_rows = rows;
        let columns = self.geometry.columns_per_grid;
        Ok(self
            .data
            .iter_mut()
            .map(|data| data.resize_rows(rows, columns))
            .sum())
    }

    pub fn set_sound_grids(&mut self, count: usize) -> Result<usize, TableError> {
        let max = MAX_SEQUENCER_COLS / self.geometry.columns_per_grid;
        if count == 0 || count > max {
            return Err(TableError::SoundGridsOutOfRange {
                requested: count,
                max,
            });
        }
        let columns = self.geometry.columns_per_grid;
        let mut dropped = 0;
        for (data, section) in self.data.iter_mut().zip(self.sections.iter()) {
            if data.grids.len() > count {
                dropped += data.grids[count..]
                    .iter()
                    .flatten()
                    .filter(|cell| !cell.is_empty())
                    .count();
            }
            let len = section.num_steps as usize * columns;
            data.grids.resize_with(count, || vec![Cell::EMPTY; len]);
        }
        self.geometry.sound_grids = count;
        Ok(dropped)
    }

    pub fn set_layer_len(&mut self, section: usize, layer: usize, len: i32) -> Result<(), TableError> {
        self.section(section)?;
        if layer >= MAX_LAYERS_PER_SECTION {
            return Err(TableError::LayerOutOfRange { layer });
        }
        if !(1..=MAX_COLS_PER_LAYER as i32).contains(&len) {
            return Err(TableError::InvalidLayerLen(len));
        }
        self.data[section].layers[layer] = len;
        Ok(())
    }

    /// Replaces the whole structure with empty sections of the given sizes.
    /// Missing layer entries get the default width.
    pub fn load_structure(
        &mut self,
        step_counts: &[usize],
        layers: &[Vec<i32>],
        grid_rows: usize,
    ) -> Result<(), TableError> {
        let sections = SectionList::from_step_counts(step_counts)?;
        if grid_rows == 0 {
            return Err(TableError::InvalidStepCount(grid_rows));
        }
        self.geometry.grid_rows = grid_rows;
        self.data = sections
            .iter()
            .enumerate()
            .map(|(index, section)| {
                let mut data = SectionData::empty(section.num_steps as usize, &self.geometry);
                if let Some(widths) = layers.get(index) {
                    for (layer, width) in data.layers.iter_mut().zip(widths) {
                        *layer = (*width).clamp(1, MAX_COLS_PER_LAYER as i32);
                    }
                }
                data
            })
            .collect();
        self.sections = sections;
        Ok(())
    }

    fn section(&self, index: usize) -> Result<Section, TableError> {
        self.sections.get(index).ok_or(TableError::SectionOutOfRange {
            index,
            count: self.sections.len(),
        })
    }
}
