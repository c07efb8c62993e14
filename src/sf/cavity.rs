//! Cavity restraint: penalises movable heavy atoms that stray from the
//! docking site, reading the distance-to-cavity grid directly.

use crate::error::Result;
use crate::grid::RealGrid;
use crate::model::{Model, ModelFlex};
use crate::params::Value;
use crate::sf::{SfCore, SfNode, SlotCache};
use crate::site::DockingSite;

/// Movable heavy atoms across all models: ligand heavies, translatable
/// solvent heavies, and flexible receptor heavies.
pub fn movable_heavy_atoms(models: &[Model]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for (mi, model) in models.iter().enumerate() {
        if model.is_empty() {
            continue;
        }
        match &model.flex {
            ModelFlex::Rigid => {}
            ModelFlex::Receptor { .. } => {
                for i in model.heavy_atom_indices() {
                    if !model.movable_signature(i).is_empty() {
                        out.push((mi, i));
                    }
                }
            }
            ModelFlex::Ligand { .. } => {
                for i in model.heavy_atom_indices() {
                    out.push((mi, i));
                }
            }
            ModelFlex::Solvent { trans_mode, .. } => {
                if *trans_mode != crate::model::TetherMode::Fixed {
                    for i in model.heavy_atom_indices() {
                        out.push((mi, i));
                    }
                }
            }
        }
    }
    out
}

#[derive(Debug)]
pub struct CavityGridSf {
    pub core: SfCore,
    slots: SlotCache,
    rmax: f64,
    quadratic: bool,
    grid: Option<RealGrid>,
    max_dist: f64,
    atoms: Vec<(usize, usize)>,
}

impl CavityGridSf {
    pub fn new(name: &str) -> CavityGridSf {
        let mut core = SfCore::new(name);
        core.params.add("rmax", 0.1);
        core.params.add("quadratic", false);
        CavityGridSf {
            core,
            slots: SlotCache::default(),
            rmax: 0.1,
            quadratic: false,
            grid: None,
            max_dist: 0.0,
            atoms: Vec::new(),
        }
    }

    pub fn into_node(self) -> SfNode {
        SfNode::Cavity(self)
    }

    pub fn update(&mut self, models: &mut [Model], site: Option<&DockingSite>) {
        let changes = self.slots.diff_and_update(models);
        if changes.receptor {
            self.grid = site.map(|s| s.grid().clone());
            self.max_dist = self.grid.as_ref().map(|g| g.max_value()).unwrap_or(0.0);
        }
        // The movable-atom list depends on every slot
        if changes.receptor || changes.ligand || changes.solvent {
            self.atoms = movable_heavy_atoms(models);
        }
    }

    pub fn raw_score(&self, models: &[Model]) -> f64 {
        let grid = match &self.grid {
            Some(g) => g,
            None => return 0.0,
        };
        let mut score = 0.0;
        for &(mi, ai) in &self.atoms {
            let atom = &models[mi].atoms[ai];
            if !atom.enabled {
                continue;
            }
            // Trilinear read of node values needs no grid-error correction;
            // off-grid atoms default to the maximum grid distance
            let r = if grid.dims().is_valid_coord(atom.coords) {
                grid.get_smoothed(atom.coords)
            } else {
                self.max_dist
            };
            let dr = r - self.rmax;
            if dr > 0.0 {
                score += if self.quadratic { dr * dr } else { dr };
            }
        }
        score
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        match name {
            "rmax" | "quadratic" => {
                self.core.params.set(name, value.clone())?;
                match name {
                    "rmax" => self.rmax = self.core.params.get_f64(name),
                    "quadratic" => self.quadratic = self.core.params.get_bool(name),
                    _ => {}
                }
                Ok(true)
            }
            _ => self.core.set_parameter(name, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::grid::GridDims;
    use crate::model::tests_support::test_atom;
    use crate::model::TetherMode;

    fn site() -> DockingSite {
        let min = Vec3::new(-6.0, -6.0, -6.0);
        let max = Vec3::new(6.0, 6.0, 6.0);
        let dims = GridDims::covering(min, max, 0.0, 0.5);
        let mut grid = RealGrid::new(dims);
        for i in 0..grid.dims().len() {
            let c = grid.dims().index_to_coord(i);
            grid.set(i, (c.length() - 3.0).max(0.0));
        }
        DockingSite::new(grid, min, max)
    }

    fn ligand_at(coords: Vec3) -> Model {
        let atoms = vec![test_atom("C", 6, coords)];
        Model::new(
            "lig",
            atoms,
            Vec::new(),
            ModelFlex::Ligand {
                trans_mode: TetherMode::Free,
                rot_mode: TetherMode::Free,
                max_trans: 0.0,
                max_rot: 0.0,
                dihedral_step: 30.0,
            },
        )
    }

    #[test]
    fn inside_cavity_scores_zero() {
        let site = site();
        let mut models = vec![Model::empty(), ligand_at(Vec3::zero())];
        let mut sf = CavityGridSf::new("cavity");
        models[1].stamp = 1;
        sf.update(&mut models, Some(&site));
        assert_eq!(sf.raw_score(&models), 0.0);
    }

    #[test]
    fn outside_cavity_penalised() {
        let site = site();
        let mut models = vec![Model::empty(), ligand_at(Vec3::new(5.0, 0.0, 0.0))];
        let mut sf = CavityGridSf::new("cavity");
        models[1].stamp = 1;
        sf.update(&mut models, Some(&site));
        let linear = sf.raw_score(&models);
        assert!((linear - (2.0 - 0.1)).abs() < 0.1);
        sf.set_parameter("quadratic", &Value::Bool(true)).unwrap();
        let quadratic = sf.raw_score(&models);
        assert!(quadratic > linear);
    }

    #[test]
    fn movable_heavy_atom_census() {
        let models = vec![Model::empty(), ligand_at(Vec3::zero())];
        assert_eq!(movable_heavy_atoms(&models), vec![(1, 0)]);
    }
}
