//! Splits the printable bed area into the 4x4 calibration grid.
//!
//! Row 0 of the grid is the bottom of the bed. Extruders are numbered top down, so the row
//! index is inverted when assigning the source extruder of a square.
use nalgebra::geometry::Point2;
use nalgebra::Vector2;

use crate::geometry::Rect;
use crate::{Error, Result};

/// Number of tools, and cells along each side of the grid
pub const GRID_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquareKind {
    /// Full cell showing the transition from one tool to another
    Calibration,
    /// Half-size square of a single color, on the diagonal
    ColorMarker,
}

#[derive(Debug, Clone)]
pub struct Square {
    /// Area the square occupies on the grid. For a color marker this is the nominal half-size
    /// area in the middle of the cell. It is informational only: markers are printed like any
    /// other purge square, from the cell's top-left corner (see [`anchor`]), and must fit the
    /// whole cell.
    pub bounds: Rect,
    pub from_extruder: usize,
    pub to_extruder: usize,
    /// Column and row, row 0 at the bottom
    pub cell: (usize, usize),
    pub kind: SquareKind,
}

#[derive(Debug, Clone)]
pub struct GridLayout {
    printable: Rect,
    cell_size: Vector2<f64>,
    padding: f64,
    squares: Vec<Square>,
}

impl GridLayout {
    pub fn plan(bed: &Rect, margin: f64, padding: f64) -> Result<Self> {
        let printable = bed.inset(margin);
        let n = GRID_SIZE as f64;

        // The area is split in four, leaving padding between the squares, so a square is
        // (area - 3*padding)/4 across
        let cell_size = Vector2::new(
            (printable.width() - (n - 1.0) * padding) / n,
            (printable.height() - (n - 1.0) * padding) / n,
        );
        if cell_size.x <= 0.0 || cell_size.y <= 0.0 {
            return Err(Error::geometry(format!(
                "grid cells would be {:.2} x {:.2}mm on a {:.2} x {:.2}mm printable area",
                cell_size.x,
                cell_size.y,
                printable.width(),
                printable.height()
            )));
        }

        let mut squares = Vec::with_capacity(GRID_SIZE * GRID_SIZE);
        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                let corner = printable.min
                    + Vector2::new(
                        x as f64 * (cell_size.x + padding),
                        y as f64 * (cell_size.y + padding),
                    );
                if x == y {
                    // Identity squares get a half-size square of that color, centered in the cell
                    squares.push(Square {
                        bounds: Rect::from_corner(corner + cell_size / 4.0, cell_size / 2.0),
                        from_extruder: x,
                        to_extruder: x,
                        cell: (x, y),
                        kind: SquareKind::ColorMarker,
                    });
                    continue;
                }
                squares.push(Square {
                    bounds: Rect::from_corner(corner, cell_size),
                    from_extruder: GRID_SIZE - 1 - y,
                    to_extruder: GRID_SIZE - 1 - x,
                    cell: (x, y),
                    kind: SquareKind::Calibration,
                });
            }
        }

        Ok(GridLayout {
            printable,
            cell_size,
            padding,
            squares,
        })
    }

    pub fn printable(&self) -> &Rect {
        &self.printable
    }

    pub fn cell_size(&self) -> Vector2<f64> {
        self.cell_size
    }

    pub fn squares(&self) -> &[Square] {
        &self.squares
    }

    pub fn calibration_squares(&self) -> impl Iterator<Item = &Square> {
        self.squares
            .iter()
            .filter(|s| s.kind == SquareKind::Calibration)
    }

    pub fn color_markers(&self) -> impl Iterator<Item = &Square> {
        self.squares
            .iter()
            .filter(|s| s.kind == SquareKind::ColorMarker)
    }

    /// Full bounds of grid cell (`col`, `row`), whatever is printed inside it
    pub fn cell_bounds(&self, col: usize, row: usize) -> Rect {
        let corner = self.printable.min
            + Vector2::new(
                col as f64 * (self.cell_size.x + self.padding),
                row as f64 * (self.cell_size.y + self.padding),
            );
        Rect::from_corner(corner, self.cell_size)
    }

    /// Square printed for a change from `from` to `to`. `from == to` gives the color marker.
    pub fn square_for(&self, from: usize, to: usize) -> Option<&Square> {
        self.squares
            .iter()
            .find(|s| s.from_extruder == from && s.to_extruder == to)
    }
}

/// Top left corner of a grid cell, where a purge square anchored in it starts
pub fn anchor(layout: &GridLayout, square: &Square) -> Point2<f64> {
    let (col, row) = square.cell;
    layout.cell_bounds(col, row).top_left()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bed(w: f64, h: f64) -> Rect {
        Rect::new(Point2::new(0.0, 0.0), Point2::new(w, h))
    }

    #[test]
    fn test_square_counts() {
        let layout = GridLayout::plan(&bed(300.0, 300.0), 10.0, 5.0).unwrap();
        assert_eq!(layout.squares().len(), 16);
        assert_eq!(layout.calibration_squares().count(), 12);
        assert_eq!(layout.color_markers().count(), 4);
    }

    #[test]
    fn test_cell_size() {
        let layout = GridLayout::plan(&bed(300.0, 300.0), 10.0, 5.0).unwrap();
        // (280 - 15) / 4
        assert_eq!(layout.cell_size(), Vector2::new(66.25, 66.25));
    }

    #[test]
    fn test_squares_disjoint_and_inside_printable_area() {
        let layout = GridLayout::plan(&bed(300.0, 300.0), 10.0, 5.0).unwrap();
        let inset = bed(300.0, 300.0).inset(10.0);
        assert_eq!(layout.printable(), &inset);
        let squares = layout.squares();
        for (i, a) in squares.iter().enumerate() {
            assert!(inset.contains(&a.bounds), "{a:?} outside {inset:?}");
            for b in &squares[i + 1..] {
                assert!(!a.bounds.overlaps(&b.bounds), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_markers_are_half_size_and_centered() {
        let layout = GridLayout::plan(&bed(300.0, 300.0), 10.0, 5.0).unwrap();
        for m in layout.color_markers() {
            assert_eq!(m.from_extruder, m.to_extruder);
            assert_eq!(m.cell.0, m.cell.1);
            let cell = layout.cell_bounds(m.cell.0, m.cell.1);
            assert_eq!(m.bounds.width(), cell.width() / 2.0);
            assert_eq!(m.bounds.height(), cell.height() / 2.0);
            let gap_left = m.bounds.min.x - cell.min.x;
            let gap_right = cell.max.x - m.bounds.max.x;
            assert!((gap_left - gap_right).abs() < 1e-9);
        }
    }

    #[test]
    fn test_extruder_assignment() {
        let layout = GridLayout::plan(&bed(300.0, 300.0), 10.0, 5.0).unwrap();
        // Bottom left cell is the change from the last extruder to the last-but-one
        let s = layout.square_for(3, 2).unwrap();
        assert_eq!(s.cell, (1, 0));
        let s = layout.square_for(0, 3).unwrap();
        assert_eq!(s.cell, (0, 3));
        assert_eq!(layout.square_for(2, 2).unwrap().kind, SquareKind::ColorMarker);
    }

    #[test]
    fn test_every_ordered_pair_has_a_square() {
        let layout = GridLayout::plan(&bed(250.0, 210.0), 10.0, 5.0).unwrap();
        for from in 0..GRID_SIZE {
            for to in 0..GRID_SIZE {
                assert!(layout.square_for(from, to).is_some(), "{from}->{to}");
            }
        }
    }

    #[test]
    fn test_degenerate_bed() {
        let res = GridLayout::plan(&bed(30.0, 300.0), 10.0, 5.0);
        assert!(matches!(res, Err(Error::Geometry(_))));
    }

    #[test]
    fn test_anchor_is_cell_top_left() {
        let layout = GridLayout::plan(&bed(300.0, 300.0), 10.0, 5.0).unwrap();
        let s = layout.square_for(0, 0).unwrap();
        assert_eq!(s.cell, (0, 0));
        assert_eq!(anchor(&layout, s), Point2::new(10.0, 76.25));
    }
}
