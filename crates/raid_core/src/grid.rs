//! Building placement grid.
//!
//! A square occupancy table mapping cells to the building that covers
//! them. The grid is centered on the world origin: cell `(0, 0)` sits at
//! the negative corner and a footprint's world position is its geometric
//! center.
//!
//! All calculations use fixed-point math for deterministic simulation.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// State of a cell in the placement grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlacementCell {
    /// Cell is empty and available for building.
    #[default]
    Empty,
    /// Cell is occupied by a building entity.
    Occupied(EntityId),
}

/// Result of a placement preview under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPreview {
    /// Snapped cell column.
    pub x: i32,
    /// Snapped cell row.
    pub z: i32,
    /// Whether the footprint fits at this cell.
    pub is_valid: bool,
    /// Centered world position of the footprint.
    pub world: Vec2Fixed,
}

/// Grid for tracking building footprints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridIndex {
    /// Grid edge length in cells.
    size: u32,
    /// Cell data stored in row-major order (`z * size + x`).
    cells: Vec<PlacementCell>,
    /// Size of each cell in world units.
    #[serde(with = "fixed_serde")]
    cell_size: Fixed,
}

impl GridIndex {
    /// Create an empty square grid.
    ///
    /// A zero `size` produces a grid on which nothing can be placed.
    #[must_use]
    pub fn new(size: u32, cell_size: Fixed) -> Self {
        let cell_count = (size as usize) * (size as usize);
        Self {
            size,
            cells: vec![PlacementCell::Empty; cell_count],
            cell_size,
        }
    }

    /// Grid edge length in cells.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Cell size in world units.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// Convert in-bounds cell coordinates to an index.
    fn index(&self, x: i32, z: i32) -> Option<usize> {
        let size = i64::from(self.size);
        let (x, z) = (i64::from(x), i64::from(z));
        if x < 0 || z < 0 || x >= size || z >= size {
            return None;
        }
        usize::try_from(z * size + x).ok()
    }

    /// Get cell state at coordinates, `None` if out of bounds.
    #[must_use]
    pub fn cell(&self, x: i32, z: i32) -> Option<PlacementCell> {
        self.index(x, z).map(|i| self.cells[i])
    }

    /// Building occupying a cell, if any.
    #[must_use]
    pub fn occupant(&self, x: i32, z: i32) -> Option<EntityId> {
        match self.cell(x, z) {
            Some(PlacementCell::Occupied(id)) => Some(id),
            _ => None,
        }
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| matches!(cell, PlacementCell::Occupied(_)))
            .count()
    }

    /// Whether a `size`×`size` footprint fits at `(x, z)`.
    ///
    /// False if any covered cell is out of bounds or already occupied.
    #[must_use]
    pub fn can_place(&self, x: i32, z: i32, size: u32) -> bool {
        if size == 0 {
            return false;
        }
        let Ok(size) = i32::try_from(size) else {
            return false;
        };

        for dz in 0..size {
            for dx in 0..size {
                match self.cell(x + dx, z + dz) {
                    Some(PlacementCell::Empty) => {}
                    _ => return false,
                }
            }
        }

        true
    }

    /// Occupy a footprint and return its centered world position.
    ///
    /// Returns `None` and leaves the grid untouched if the footprint does
    /// not fit.
    pub fn place(&mut self, id: EntityId, x: i32, z: i32, size: u32) -> Option<Vec2Fixed> {
        if !self.can_place(x, z, size) {
            return None;
        }

        let edge = i32::try_from(size).ok()?;
        for dz in 0..edge {
            for dx in 0..edge {
                if let Some(index) = self.index(x + dx, z + dz) {
                    self.cells[index] = PlacementCell::Occupied(id);
                }
            }
        }

        Some(self.cell_to_world(x, z, size))
    }

    /// Clear every cell mapped to `id`, returning how many were cleared.
    ///
    /// Scans the whole grid, so stale or partial mappings are cleared too.
    pub fn remove(&mut self, id: EntityId) -> usize {
        let mut cleared = 0;
        for cell in &mut self.cells {
            if *cell == PlacementCell::Occupied(id) {
                *cell = PlacementCell::Empty;
                cleared += 1;
            }
        }
        cleared
    }

    /// Empty every cell.
    pub fn clear(&mut self) {
        self.cells.fill(PlacementCell::Empty);
    }

    /// Half the grid's world extent; the offset that centers it on the origin.
    fn half_extent(&self) -> Fixed {
        Fixed::from_num(self.size).saturating_mul(self.cell_size) / Fixed::from_num(2)
    }

    /// Whether a world point lies on the grid's footprint, edges included.
    #[must_use]
    pub fn contains_point(&self, point: Vec2Fixed) -> bool {
        let half = self.half_extent();
        (-half..=half).contains(&point.x) && (-half..=half).contains(&point.y)
    }

    /// Convert a world point to the cell containing it.
    ///
    /// The result may lie outside the grid; [`can_place`](Self::can_place)
    /// reports that.
    #[must_use]
    pub fn world_to_cell(&self, point: Vec2Fixed) -> (i32, i32) {
        let offset = self.half_extent();
        let x = ((point.x + offset) / self.cell_size).floor();
        let z = ((point.y + offset) / self.cell_size).floor();
        (x.to_num::<i32>(), z.to_num::<i32>())
    }

    /// Centered world position of a `size`×`size` footprint at `(x, z)`.
    #[must_use]
    pub fn cell_to_world(&self, x: i32, z: i32, size: u32) -> Vec2Fixed {
        let offset = self.half_extent();
        let half_footprint = Fixed::from_num(size) * self.cell_size / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(x) * self.cell_size - offset + half_footprint,
            Fixed::from_num(z) * self.cell_size - offset + half_footprint,
        )
    }

    /// Snap a world point to a cell and report whether a footprint fits there.
    #[must_use]
    pub fn preview(&self, point: Vec2Fixed, size: u32) -> PlacementPreview {
        let (x, z) = self.world_to_cell(point);
        PlacementPreview {
            x,
            z,
            is_valid: self.can_place(x, z, size),
            world: self.cell_to_world(x, z, size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridIndex {
        GridIndex::new(20, Fixed::from_num(2))
    }

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    #[test]
    fn test_contains_point_covers_world_extent() {
        let grid = grid();
        assert!(grid.contains_point(vec2(0, 0)));
        assert!(grid.contains_point(vec2(-20, 20)));
        assert!(!grid.contains_point(vec2(21, 0)));
        assert!(!grid.contains_point(vec2(0, -50_000)));
    }

    #[test]
    fn test_grid_starts_empty() {
        let grid = grid();
        assert_eq!(grid.occupied_count(), 0);
        assert!(grid.can_place(0, 0, 1));
        assert!(grid.can_place(18, 18, 2));
    }

    #[test]
    fn test_can_place_rejects_out_of_bounds() {
        let grid = grid();
        assert!(!grid.can_place(-1, 0, 1));
        assert!(!grid.can_place(0, -1, 1));
        assert!(!grid.can_place(19, 19, 2));
        assert!(!grid.can_place(20, 0, 1));
        assert!(!grid.can_place(5, 5, 0));
    }

    #[test]
    fn test_place_occupies_footprint() {
        let mut grid = grid();
        let world = grid.place(7, 9, 9, 2).unwrap();

        for (x, z) in [(9, 9), (10, 9), (9, 10), (10, 10)] {
            assert_eq!(grid.occupant(x, z), Some(7));
        }
        assert_eq!(grid.occupant(11, 9), None);
        assert_eq!(grid.occupied_count(), 4);
        // 9*2 - 20 + 2 = 0: a 2x2 at (9, 9) is centered on the origin
        assert_eq!(world, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_place_rejects_overlap() {
        let mut grid = grid();
        assert!(grid.place(1, 9, 9, 2).is_some());
        assert!(!grid.can_place(10, 10, 1));
        assert!(grid.place(2, 10, 10, 1).is_none());
        assert_eq!(grid.occupant(10, 10), Some(1));
    }

    #[test]
    fn test_remove_clears_only_that_building() {
        let mut grid = grid();
        grid.place(1, 0, 0, 2).unwrap();
        grid.place(2, 5, 5, 1).unwrap();

        assert_eq!(grid.remove(1), 4);
        assert!(grid.can_place(0, 0, 2));
        assert_eq!(grid.occupant(5, 5), Some(2));
        assert_eq!(grid.remove(1), 0);
    }

    #[test]
    fn test_cell_to_world_centers_footprint() {
        let grid = grid();
        // cell (0, 0) size 1: 0 - 20 + 1
        assert_eq!(grid.cell_to_world(0, 0, 1), vec2(-19, -19));
        assert_eq!(grid.cell_to_world(19, 19, 1), vec2(19, 19));
    }

    #[test]
    fn test_world_to_cell() {
        let grid = grid();
        assert_eq!(grid.world_to_cell(vec2(-19, -19)), (0, 0));
        assert_eq!(grid.world_to_cell(Vec2Fixed::ZERO), (10, 10));
        assert_eq!(grid.world_to_cell(vec2(-21, 0)), (-1, 10));
        assert_eq!(grid.world_to_cell(vec2(40, 0)), (30, 10));
    }

    #[test]
    fn test_preview_snaps_and_validates() {
        let mut grid = grid();
        grid.place(1, 10, 10, 1).unwrap();

        let blocked = grid.preview(vec2(1, 1), 1);
        assert_eq!((blocked.x, blocked.z), (10, 10));
        assert!(!blocked.is_valid);
        assert_eq!(blocked.world, vec2(1, 1));

        let open = grid.preview(vec2(-3, 1), 1);
        assert!(open.is_valid);
    }
}
