//! Walkable-surface mask produced by the segmenter role
//!
//! The mask is a run-length encoded, row-major grid of coarse surface
//! classes. Segmentation is a full scene re-interpretation at its own
//! cadence, so the fusion engine replaces the stored mask wholesale.

use crate::types::BoundingBox;
use serde::{Deserialize, Serialize};

/// Coarse semantic class of a surface cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceClass {
    /// Surface the user can walk on (road, sidewalk, floor)
    Walkable,
    /// Obstacle at ground level
    Obstacle,
    /// Everything else (sky, walls, vegetation)
    Other,
}

/// One run of identical cells in row-major order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceRun {
    pub class: SurfaceClass,
    pub len: u32,
}

/// Run-length encoded surface label grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMask {
    cols: u32,
    rows: u32,
    runs: Vec<SurfaceRun>,
}

impl SurfaceMask {
    /// Encode a dense row-major cell grid
    pub fn from_cells(cols: u32, rows: u32, cells: &[SurfaceClass]) -> Result<Self, String> {
        if cols == 0 || rows == 0 {
            return Err("Mask dimensions must be non-zero".to_string());
        }
        let expected = (cols as usize)
            .checked_mul(rows as usize)
            .ok_or_else(|| "Mask dimensions overflow".to_string())?;
        if cells.len() != expected {
            return Err(format!(
                "Expected {} cells for {}x{} mask, got {}",
                expected,
                cols,
                rows,
                cells.len()
            ));
        }

        let mut runs: Vec<SurfaceRun> = Vec::new();
        for &class in cells {
            match runs.last_mut() {
                Some(run) if run.class == class => run.len += 1,
                _ => runs.push(SurfaceRun { class, len: 1 }),
            }
        }
        Ok(Self { cols, rows, runs })
    }

    /// Mask with every cell set to the same class
    pub fn filled(cols: u32, rows: u32, class: SurfaceClass) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        // Saturate on absurd dimensions instead of overflowing
        let len = cols.checked_mul(rows).unwrap_or(u32::MAX);
        Self {
            cols,
            rows,
            runs: vec![SurfaceRun { class, len }],
        }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Class of the cell containing the normalized point, if in range
    pub fn class_at(&self, nx: f32, ny: f32) -> Option<SurfaceClass> {
        if !(0.0..=1.0).contains(&nx) || !(0.0..=1.0).contains(&ny) {
            return None;
        }
        let col = ((nx * self.cols as f32) as u32).min(self.cols - 1);
        let row = ((ny * self.rows as f32) as u32).min(self.rows - 1);
        let target = row as u64 * self.cols as u64 + col as u64;

        let mut index = 0u64;
        for run in &self.runs {
            let end = index + run.len as u64;
            if target < end {
                return Some(run.class);
            }
            index = end;
        }
        None
    }

    /// Fraction of cells within a normalized region that have the given
    /// class. Cell membership is decided by cell center. Returns 0.0 when
    /// the region covers no cells.
    pub fn fraction_of(&self, region: &BoundingBox, class: SurfaceClass) -> f32 {
        let mut total = 0u32;
        let mut matching = 0u32;

        let mut index = 0u32;
        for run in &self.runs {
            for _ in 0..run.len {
                let row = index / self.cols;
                let col = index % self.cols;
                index += 1;

                let cx = (col as f32 + 0.5) / self.cols as f32;
                let cy = (row as f32 + 0.5) / self.rows as f32;
                if cx >= region.x
                    && cx < region.x + region.w
                    && cy >= region.y
                    && cy < region.y + region.h
                {
                    total += 1;
                    if run.class == class {
                        matching += 1;
                    }
                }
            }
        }

        if total == 0 {
            0.0
        } else {
            matching as f32 / total as f32
        }
    }

    /// Fraction of a region that is walkable surface
    pub fn walkable_fraction(&self, region: &BoundingBox) -> f32 {
        self.fraction_of(region, SurfaceClass::Walkable)
    }

    /// Fraction of a region that is obstacle surface
    pub fn obstacle_fraction(&self, region: &BoundingBox) -> f32 {
        self.fraction_of(region, SurfaceClass::Obstacle)
    }
}
