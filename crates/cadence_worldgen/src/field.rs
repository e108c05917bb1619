//! # Grids
//!
//! Row-major 2D maps and the tick-sliced block that fills them.

use std::time::Duration;

use cadence_core::{Block, Monad, Return, Yield};

/// A row-major 2D map. Cell `(x, y)` lives at `y * width + x`.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

/// A grid of samples, typically in `[0, 1]`.
pub type Field = Grid<f64>;

impl<T: Clone + Default> Grid<T> {
    /// Creates a grid filled with `T::default()`.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![T::default(); width * height],
        }
    }
}

impl<T> Grid<T> {
    /// Width in cells.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true for a grid without cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Linear index of `(x, y)`.
    #[inline]
    #[must_use]
    pub const fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Cell at `(x, y)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.width && y < self.height {
            self.cells.get(self.index(x, y))
        } else {
            None
        }
    }

    /// All cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    /// Normalised coordinates of a linear index, each in `[0, 1)`.
    #[must_use]
    pub fn coords(&self, index: usize) -> (f64, f64) {
        let x = index % self.width;
        let y = index / self.width;
        (unit(x, self.width), unit(y, self.height))
    }

    /// Builds a grid of the same size by transforming every cell with its
    /// normalised coordinates.
    pub fn map_cells<U, F>(&self, mut f: F) -> Grid<U>
    where
        F: FnMut(f64, f64, &T) -> U,
    {
        let cells = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let (x, y) = self.coords(i);
                f(x, y, cell)
            })
            .collect();
        Grid {
            width: self.width,
            height: self.height,
            cells,
        }
    }
}

impl Field {
    /// Smallest and largest sample, or `None` for an empty field.
    #[must_use]
    pub fn range(&self) -> Option<(f64, f64)> {
        let mut iter = self.cells.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Mean sample, or `None` for an empty field.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        (!self.cells.is_empty()).then(|| self.cells.iter().sum::<f64>() / self.cells.len() as f64)
    }
}

#[allow(clippy::cast_precision_loss)]
fn unit(position: usize, extent: usize) -> f64 {
    position as f64 / extent as f64
}

/// Fills a grid one cell at a time, yielding after every `per_tick` cells.
///
/// `sample` receives the linear index and the normalised coordinates of the
/// cell. A grid of `n` cells takes `ceil(n / per_tick)` ticks, at least one.
pub fn generate_grid<T, F>(width: usize, height: usize, per_tick: usize, sample: F) -> Monad<Grid<T>>
where
    T: Clone + Default + 'static,
    F: FnMut(usize, f64, f64) -> T + 'static,
{
    Monad::new(move |ret| GridFill {
        grid: Some(Grid::new(width, height)),
        next: 0,
        per_tick: per_tick.max(1),
        sample,
        ret,
    })
}

struct GridFill<T, F> {
    grid: Option<Grid<T>>,
    next: usize,
    per_tick: usize,
    sample: F,
    ret: Return<Grid<T>>,
}

impl<T, F> Block for GridFill<T, F>
where
    F: FnMut(usize, f64, f64) -> T,
{
    fn step(&mut self, _delta: Duration) -> Option<Yield> {
        let grid = self.grid.as_mut()?;
        let end = (self.next + self.per_tick).min(grid.len());
        for index in self.next..end {
            let (x, y) = grid.coords(index);
            grid.cells[index] = (self.sample)(index, x, y);
        }
        self.next = end;

        if self.next < grid.len() {
            return Some(Yield::Suspend);
        }
        if let Some(grid) = self.grid.take() {
            self.ret.accept(grid);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::{block_on, Executor};

    use super::*;

    #[test]
    fn test_indexing_is_row_major() {
        let grid = generate_grid(3, 2, 100, |i, _, _| i);
        let mut executor = Executor::new();
        executor.spawn(grid.run());
        block_on(&mut executor, Duration::from_millis(16));

        let grid = grid.take_result().unwrap();
        assert_eq!(grid.get(2, 1), Some(&5));
        assert_eq!(grid.get(3, 0), None);
        assert_eq!(grid.coords(4), (1.0 / 3.0, 0.5));
    }

    #[test]
    fn test_fill_yields_per_slice() {
        let field = generate_grid(10, 10, 30, |_, x, y| x + y);
        let mut executor = Executor::new();
        executor.spawn(field.run());
        // 100 cells in slices of 30.
        assert_eq!(block_on(&mut executor, Duration::from_millis(16)), 4);

        let field = field.take_result().unwrap();
        let (lo, hi) = field.range().unwrap();
        assert!(lo.abs() < f64::EPSILON);
        assert!((hi - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_map_cells_keeps_shape() {
        let field: Field = Grid::new(4, 3);
        let doubled = field.map_cells(|x, _, v| v + x);
        assert_eq!(doubled.width(), 4);
        assert_eq!(doubled.height(), 3);
        assert!((doubled.mean().unwrap() - 0.375).abs() < 1e-9);
    }
}
