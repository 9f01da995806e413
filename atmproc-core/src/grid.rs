//! Grids and the grids manager.
//!
//! The framework only needs to know how many columns and levels a grid has;
//! geometry and decomposition belong to the host model.

use crate::errors::{AtmError, AtmResult};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

pub trait Grid: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Number of columns owned by this rank.
    fn get_num_local_dofs(&self) -> usize;

    fn get_num_vertical_levels(&self) -> usize;
}

pub trait GridsManager: Debug + Send + Sync {
    fn get_grid(&self, name: &str) -> AtmResult<Arc<dyn Grid>>;

    fn grid_names(&self) -> Vec<String>;
}

/// A set of independent columns with a shared vertical discretization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointGrid {
    name: String,
    num_columns: usize,
    num_levels: usize,
}

impl PointGrid {
    pub fn new(name: impl Into<String>, num_columns: usize, num_levels: usize) -> AtmResult<Self> {
        let name = name.into();
        if num_columns == 0 || num_levels == 0 {
            return Err(AtmError::InvalidLayout(format!(
                "grid '{name}' needs at least one column and one level, got {num_columns}x{num_levels}"
            )));
        }
        Ok(Self {
            name,
            num_columns,
            num_levels,
        })
    }
}

impl Grid for PointGrid {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_num_local_dofs(&self) -> usize {
        self.num_columns
    }

    fn get_num_vertical_levels(&self) -> usize {
        self.num_levels
    }
}

/// Grids manager over a fixed set of grids.
#[derive(Debug, Default, Clone)]
pub struct LibraryGridsManager {
    grids: BTreeMap<String, Arc<dyn Grid>>,
}

impl LibraryGridsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager holding a single [`PointGrid`].
    pub fn with_point_grid(name: &str, num_columns: usize, num_levels: usize) -> AtmResult<Self> {
        let mut gm = Self::new();
        gm.add_grid(Arc::new(PointGrid::new(name, num_columns, num_levels)?));
        Ok(gm)
    }

    pub fn add_grid(&mut self, grid: Arc<dyn Grid>) -> &mut Self {
        self.grids.insert(grid.name().to_string(), grid);
        self
    }
}

impl GridsManager for LibraryGridsManager {
    fn get_grid(&self, name: &str) -> AtmResult<Arc<dyn Grid>> {
        self.grids
            .get(name)
            .cloned()
            .ok_or_else(|| AtmError::GridNotFound(name.to_string()))
    }

    fn grid_names(&self) -> Vec<String> {
        self.grids.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let gm = LibraryGridsManager::with_point_grid("Physics", 3, 72).unwrap();
        let grid = gm.get_grid("Physics").unwrap();
        assert_eq!(grid.get_num_local_dofs(), 3);
        assert_eq!(grid.get_num_vertical_levels(), 72);
        assert_eq!(gm.grid_names(), ["Physics"]);

        assert!(matches!(
            gm.get_grid("Dynamics"),
            Err(AtmError::GridNotFound(_))
        ));
    }

    #[test]
    fn test_empty_grid_is_rejected() {
        assert!(PointGrid::new("Physics", 0, 10).is_err());
        assert!(PointGrid::new("Physics", 10, 0).is_err());
    }
}
