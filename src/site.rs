//! Docking site: a precomputed distance-to-cavity grid plus bounds.
//!
//! The core reads the site; it never computes one. On disk a site is a JSON
//! metadata file (bounds + grid dimensions) next to a `.npy` tensor holding
//! the per-point distances, read the same way normal-mode payloads are.

use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use npyz::WriterBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{DockError, Result};
use crate::geometry::Vec3;
use crate::grid::{GridDims, RealGrid};
use crate::model::Atom;

#[derive(Debug, Clone)]
pub struct DockingSite {
    grid: RealGrid,
    min_coord: Vec3,
    max_coord: Vec3,
}

#[derive(Debug, Serialize, Deserialize)]
struct SiteMeta {
    min_coord: Vec3,
    max_coord: Vec3,
    dims: GridDims,
}

impl DockingSite {
    pub fn new(grid: RealGrid, min_coord: Vec3, max_coord: Vec3) -> DockingSite {
        DockingSite {
            grid,
            min_coord,
            max_coord,
        }
    }

    pub fn grid(&self) -> &RealGrid {
        &self.grid
    }

    pub fn min_coord(&self) -> Vec3 {
        self.min_coord
    }

    pub fn max_coord(&self) -> Vec3 {
        self.max_coord
    }

    /// Cavity volume in cubic Angstroms: grid points at distance zero times
    /// the volume per point.
    pub fn volume(&self) -> f64 {
        let step = self.grid.dims().step;
        self.grid.count_value(0.0) as f64 * step.x * step.y * step.z
    }

    /// Indices of atoms whose distance-to-cavity is within [min_dist,
    /// max_dist]. Atoms off the grid are excluded.
    pub fn atoms_in_range(&self, atoms: &[Atom], min_dist: f64, max_dist: f64) -> Vec<usize> {
        atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| {
                if !self.grid.dims().is_valid_coord(a.coords) {
                    return false;
                }
                let d = self.grid.get_coord(a.coords);
                d >= min_dist && d <= max_dist
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub fn load(meta_path: &Path, npy_path: &Path) -> Result<DockingSite> {
        let meta: SiteMeta = serde_json::from_reader(File::open(meta_path)?)
            .map_err(|e| DockError::Parse(format!("{}: {}", meta_path.display(), e)))?;
        let bytes = fs::read(npy_path)?;
        let reader = npyz::NpyFile::new(&bytes[..])
            .map_err(|e| DockError::Parse(format!("{}: {}", npy_path.display(), e)))?;
        let data: Vec<f32> = reader
            .into_vec::<f32>()
            .map_err(|e| DockError::Parse(format!("{}: {}", npy_path.display(), e)))?;
        let expected = meta.dims.len();
        if data.len() != expected {
            return Err(DockError::Parse(format!(
                "docking site grid size mismatch: expected {} points, read {}",
                expected,
                data.len()
            )));
        }
        let grid = RealGrid::from_data(meta.dims, data)
            .ok_or_else(|| DockError::Assertion("grid construction failed".into()))?;
        Ok(DockingSite::new(grid, meta.min_coord, meta.max_coord))
    }

    pub fn save(&self, meta_path: &Path, npy_path: &Path) -> Result<()> {
        let meta = SiteMeta {
            min_coord: self.min_coord,
            max_coord: self.max_coord,
            dims: self.grid.dims().clone(),
        };
        serde_json::to_writer_pretty(BufWriter::new(File::create(meta_path)?), &meta)
            .map_err(|e| DockError::File(e.to_string()))?;
        let mut out = BufWriter::new(File::create(npy_path)?);
        let mut writer = npyz::WriteOptions::new()
            .default_dtype()
            .shape(&[self.grid.data().len() as u64])
            .writer(&mut out)
            .begin_nd()
            .map_err(|e| DockError::File(e.to_string()))?;
        for &v in self.grid.data() {
            writer.push(&v).map_err(|e| DockError::File(e.to_string()))?;
        }
        writer.finish().map_err(|e| DockError::File(e.to_string()))?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cubic site: distance to a spherical cavity of the given radius.
    pub fn spherical_site(cavity_radius: f64, half_extent: f64, step: f64) -> DockingSite {
        let min = Vec3::new(-half_extent, -half_extent, -half_extent);
        let max = Vec3::new(half_extent, half_extent, half_extent);
        let dims = GridDims::covering(min, max, 0.0, step);
        let mut grid = RealGrid::new(dims);
        for i in 0..grid.dims().len() {
            let c = grid.dims().index_to_coord(i);
            let d = (c.length() - cavity_radius).max(0.0);
            grid.set(i, d);
        }
        DockingSite::new(grid, min, max)
    }

    #[test]
    fn volume_is_positive_for_nonempty_cavity() {
        let site = spherical_site(3.0, 6.0, 0.5);
        assert!(site.volume() > 0.0);
    }

    #[test]
    fn atoms_in_range_filters_by_grid_distance() {
        use crate::model::{Hybridisation, TriposType};
        let site = spherical_site(3.0, 6.0, 0.5);
        let mk = |coords: Vec3| Atom {
            id: 1,
            name: "C".into(),
            atomic_no: 6,
            mass: 12.011,
            coords,
            vdw_radius: 1.7,
            formal_charge: 0,
            partial_charge: 0.0,
            group_charge: 0.0,
            hybridisation: Hybridisation::Sp3,
            tripos_type: TriposType::C3,
            segment: String::new(),
            hbond_donor: false,
            hbond_acceptor: false,
            lipophilic: false,
            metal: false,
            guanidinium_carbon: false,
            anionic: false,
            rna: false,
            enabled: true,
            selected: false,
            user1: 0.0,
            user1_flag: false,
        };
        let atoms = vec![
            mk(Vec3::zero()),                  // inside cavity, d = 0
            mk(Vec3::new(5.0, 0.0, 0.0)),      // d = 2
            mk(Vec3::new(50.0, 0.0, 0.0)),     // off grid
        ];
        let near = site.atoms_in_range(&atoms, 0.0, 1.0);
        assert_eq!(near, vec![0]);
        let all = site.atoms_in_range(&atoms, 0.0, 10.0);
        assert_eq!(all, vec![0, 1]);
    }
}
