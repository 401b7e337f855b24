/// Maps section/grid-relative coordinates to the engine's flat grid.
///
/// Every section shares one `grid_rows` value at any one time, so the step
/// stride between sections is `grid_rows`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridGeometry {
    pub grid_rows: usize,
    pub columns_per_grid: usize,
    pub sound_grids: usize,
}

impl GridGeometry {
    pub fn new(grid_rows: usize, columns_per_grid: usize, sound_grids: usize) -> Self {
        Self {
            grid_rows,
            columns_per_grid,
            sound_grids,
        }
    }

    pub fn absolute_step(&self, section: usize, row: usize) -> usize {
        section * self.grid_rows + row
    }

    pub fn absolute_column(&self, grid: usize, column: usize) -> usize {
        grid * self.columns_per_grid + column
    }

    /// `(section, row)` for an absolute step.
    pub fn decompose_step(&self, step: usize) -> (usize, usize) {
        (step / self.grid_rows, step % self.grid_rows)
    }

    /// `(grid, column)` for an absolute column.
    pub fn decompose_column(&self, column: usize) -> (usize, usize) {
        (column / self.columns_per_grid, column % self.columns_per_grid)
    }

    pub fn total_columns(&self) -> usize {
        self.sound_grids * self.columns_per_grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::iproduct;

    #[test]
    fn coordinates_round_trip() {
        for (rows, cols) in iproduct!([1usize, 8, 16, 32], [1usize, 2, 4]) {
            let geometry = GridGeometry::new(rows, cols, 4);
            for (section, row, grid, column) in iproduct!(0..6, 0..rows, 0..4, 0..cols) {
                let step = geometry.absolute_step(section, row);
                let abs_column = geometry.absolute_column(grid, column);
                assert_eq!(geometry.decompose_step(step), (section, row));
                assert_eq!(geometry.decompose_column(abs_column), (grid, column));
            }
        }
    }

    #[test]
    fn flat_grid_addresses() {
        let geometry = GridGeometry::new(16, 4, 4);
        assert_eq!(geometry.absolute_step(2, 3), 35);
        assert_eq!(geometry.absolute_column(3, 1), 13);
        assert_eq!(geometry.total_columns(), 16);
    }
}
