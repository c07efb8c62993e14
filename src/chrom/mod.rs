//! Chromosome: the aggregated vector of all search degrees of freedom.
//!
//! Every search algorithm manipulates a `Chromosome` and synchronises it
//! to/from the workspace models. Elements are a sum type; the aggregate
//! routes every operation and refreshes the pseudo-atoms of each
//! participating model exactly once after `sync_to_model`.

mod dihedral;
mod occupancy;
mod position;

pub use dihedral::DihedralElement;
pub use occupancy::OccupancyElement;
pub use position::PositionElement;

use crate::error::{DockError, Result};
use crate::model::{Model, ModelFlex};
use crate::site::DockingSite;

#[derive(Debug, Clone)]
pub enum ChromElement {
    Position(PositionElement),
    Dihedral(DihedralElement),
    Occupancy(OccupancyElement),
}

impl ChromElement {
    pub fn model_index(&self) -> usize {
        match self {
            ChromElement::Position(e) => e.model_index(),
            ChromElement::Dihedral(e) => e.model_index(),
            ChromElement::Occupancy(e) => e.model_index(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            ChromElement::Position(e) => e.reset(),
            ChromElement::Dihedral(e) => e.reset(),
            ChromElement::Occupancy(e) => e.reset(),
        }
    }

    pub fn randomise(&mut self) {
        match self {
            ChromElement::Position(e) => e.randomise(),
            ChromElement::Dihedral(e) => e.randomise(),
            ChromElement::Occupancy(e) => e.randomise(),
        }
    }

    pub fn mutate(&mut self, rel_step: f64) {
        match self {
            ChromElement::Position(e) => e.mutate(rel_step),
            ChromElement::Dihedral(e) => e.mutate(rel_step),
            ChromElement::Occupancy(e) => e.mutate(rel_step),
        }
    }

    pub fn sync_from_model(&mut self, models: &[Model]) {
        match self {
            ChromElement::Position(e) => e.sync_from_model(models),
            ChromElement::Dihedral(e) => e.sync_from_model(models),
            ChromElement::Occupancy(e) => e.sync_from_model(models),
        }
    }

    pub fn sync_to_model(&self, models: &mut [Model]) {
        match self {
            ChromElement::Position(e) => e.sync_to_model(models),
            ChromElement::Dihedral(e) => e.sync_to_model(models),
            ChromElement::Occupancy(e) => e.sync_to_model(models),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChromElement::Position(e) => e.len(),
            ChromElement::Dihedral(e) => e.len(),
            ChromElement::Occupancy(e) => e.len(),
        }
    }

    pub fn xover_groups(&self) -> &'static [usize] {
        match self {
            ChromElement::Position(e) => e.xover_groups(),
            ChromElement::Dihedral(e) => e.xover_groups(),
            ChromElement::Occupancy(e) => e.xover_groups(),
        }
    }

    pub fn get_vector(&self, v: &mut Vec<f64>) {
        match self {
            ChromElement::Position(e) => e.get_vector(v),
            ChromElement::Dihedral(e) => e.get_vector(v),
            ChromElement::Occupancy(e) => e.get_vector(v),
        }
    }

    pub fn set_vector(&mut self, v: &[f64], i: &mut usize) -> Result<()> {
        match self {
            ChromElement::Position(e) => e.set_vector(v, i),
            ChromElement::Dihedral(e) => e.set_vector(v, i),
            ChromElement::Occupancy(e) => e.set_vector(v, i),
        }
    }

    pub fn get_step_vector(&self, v: &mut Vec<f64>) {
        match self {
            ChromElement::Position(e) => e.get_step_vector(v),
            ChromElement::Dihedral(e) => e.get_step_vector(v),
            ChromElement::Occupancy(e) => e.get_step_vector(v),
        }
    }

    pub fn compare_vector(&self, v: &[f64], i: &mut usize) -> Result<f64> {
        match self {
            ChromElement::Position(e) => e.compare_vector(v, i),
            ChromElement::Dihedral(e) => e.compare_vector(v, i),
            ChromElement::Occupancy(e) => e.compare_vector(v, i),
        }
    }

    pub fn set_cauchy(&mut self, cauchy: bool) {
        if let ChromElement::Dihedral(e) = self {
            e.set_cauchy(cauchy);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chromosome {
    elements: Vec<ChromElement>,
    /// Models whose pseudo-atoms are refreshed after every sync.
    model_indices: Vec<usize>,
}

impl Chromosome {
    pub fn new() -> Chromosome {
        Chromosome::default()
    }

    /// Builds the combined chromosome for every model in the workspace, in
    /// slot order. Per model: receptor OH/NH3 dihedrals, ligand dihedrals
    /// followed by the rigid-body pose, solvent pose plus occupancy.
    pub fn from_models(models: &[Model], site: Option<&DockingSite>) -> Chromosome {
        let bounds = site.map(|s| (s.min_coord(), s.max_coord()));
        let mut chrom = Chromosome::new();
        for (mi, model) in models.iter().enumerate() {
            if model.is_empty() {
                continue;
            }
            let n_before = chrom.elements.len();
            match model.flex.clone() {
                ModelFlex::Rigid => {}
                ModelFlex::Receptor { dihedral_step } => {
                    for rb in model.rotatable_bonds().to_vec() {
                        chrom.add(ChromElement::Dihedral(DihedralElement::new(
                            models,
                            mi,
                            rb,
                            dihedral_step,
                            None,
                        )));
                    }
                }
                ModelFlex::Ligand {
                    trans_mode,
                    rot_mode,
                    max_trans,
                    max_rot,
                    dihedral_step,
                } => {
                    for rb in model.rotatable_bonds().to_vec() {
                        chrom.add(ChromElement::Dihedral(DihedralElement::new(
                            models,
                            mi,
                            rb,
                            dihedral_step,
                            None,
                        )));
                    }
                    chrom.add(ChromElement::Position(PositionElement::new(
                        models,
                        mi,
                        trans_mode,
                        rot_mode,
                        max_trans,
                        max_rot,
                        model.flex.trans_step(),
                        model.flex.rot_step_deg(),
                        bounds,
                    )));
                }
                ModelFlex::Solvent {
                    trans_mode,
                    rot_mode,
                    max_trans,
                    max_rot,
                    variable_occupancy,
                } => {
                    chrom.add(ChromElement::Position(PositionElement::new(
                        models,
                        mi,
                        trans_mode,
                        rot_mode,
                        max_trans,
                        max_rot,
                        model.flex.trans_step(),
                        model.flex.rot_step_deg(),
                        bounds,
                    )));
                    if variable_occupancy {
                        chrom.add(ChromElement::Occupancy(OccupancyElement::new(models, mi)));
                    }
                }
            }
            if chrom.elements.len() > n_before {
                chrom.model_indices.push(mi);
            }
        }
        chrom
    }

    pub fn add(&mut self, element: ChromElement) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[ChromElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn reset(&mut self) {
        for e in &mut self.elements {
            e.reset();
        }
    }

    pub fn randomise(&mut self) {
        for e in &mut self.elements {
            e.randomise();
        }
    }

    pub fn mutate(&mut self, rel_step: f64) {
        for e in &mut self.elements {
            e.mutate(rel_step);
        }
    }

    pub fn set_cauchy(&mut self, cauchy: bool) {
        for e in &mut self.elements {
            e.set_cauchy(cauchy);
        }
    }

    pub fn sync_from_model(&mut self, models: &[Model]) {
        for e in &mut self.elements {
            e.sync_from_model(models);
        }
    }

    /// Writes every element into the models, then refreshes each
    /// participating model's pseudo-atoms exactly once.
    pub fn sync_to_model(&self, models: &mut [Model]) {
        for e in &self.elements {
            e.sync_to_model(models);
        }
        for &mi in &self.model_indices {
            models[mi].update_pseudo_atoms();
        }
    }

    pub fn len(&self) -> usize {
        self.elements.iter().map(ChromElement::len).sum()
    }

    pub fn xover_len(&self) -> usize {
        self.elements.iter().map(|e| e.xover_groups().len()).sum()
    }

    /// Flattened crossover group sizes; coupled DoFs (translation triple,
    /// quaternion) appear as single groups.
    pub fn xover_group_sizes(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.xover_len());
        for e in &self.elements {
            out.extend_from_slice(e.xover_groups());
        }
        out
    }

    pub fn get_vector(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(self.len());
        for e in &self.elements {
            e.get_vector(&mut v);
        }
        v
    }

    pub fn set_vector(&mut self, v: &[f64]) -> Result<()> {
        if v.len() != self.len() {
            return Err(DockError::bad_argument(format!(
                "vector length {} does not match chromosome length {}",
                v.len(),
                self.len()
            )));
        }
        let mut i = 0;
        for e in &mut self.elements {
            e.set_vector(v, &mut i)?;
        }
        Ok(())
    }

    pub fn get_step_vector(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(self.len());
        for e in &self.elements {
            e.get_step_vector(&mut v);
        }
        v
    }

    /// Maximum step-normalised element-wise difference against `v`.
    /// Shape mismatch is a `BadArgument`, never a sentinel value.
    pub fn compare_vector(&self, v: &[f64]) -> Result<f64> {
        if v.len() != self.len() {
            return Err(DockError::bad_argument(
                "vector length does not match chromosome length",
            ));
        }
        let mut i = 0;
        let mut max_diff: f64 = 0.0;
        for e in &self.elements {
            max_diff = max_diff.max(e.compare_vector(v, &mut i)?);
        }
        Ok(max_diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::model::tests_support::{test_atom, test_bond};
    use crate::model::{Model, TetherMode};

    fn ligand() -> Model {
        let mut atoms = vec![
            test_atom("C0", 6, Vec3::new(-1.0, 1.0, 0.0)),
            test_atom("C1", 6, Vec3::new(-1.0, 0.0, 0.0)),
            test_atom("C2", 6, Vec3::new(0.5, 0.0, 0.0)),
            test_atom("O3", 8, Vec3::new(0.5, 1.0, 0.3)),
        ];
        atoms[3].hbond_acceptor = true;
        let bonds = vec![test_bond(0, 1, false), test_bond(1, 2, true), test_bond(2, 3, false)];
        Model::new(
            "lig",
            atoms,
            bonds,
            ModelFlex::Ligand {
                trans_mode: TetherMode::Free,
                rot_mode: TetherMode::Free,
                max_trans: 0.0,
                max_rot: 0.0,
                dihedral_step: 30.0,
            },
        )
    }

    fn build() -> (Vec<Model>, Chromosome) {
        let models = vec![ligand()];
        let chrom = Chromosome::from_models(&models, None);
        (models, chrom)
    }

    #[test]
    fn ligand_chromosome_layout() {
        let (_, chrom) = build();
        // 1 dihedral + rigid body
        assert_eq!(chrom.len(), 8);
        assert_eq!(chrom.xover_len(), 3);
        assert_eq!(chrom.xover_group_sizes(), vec![1, 3, 4]);
    }

    #[test]
    fn set_get_round_trip() {
        let (_, mut chrom) = build();
        let v = vec![45.0, 1.0, 2.0, -0.5, 1.0, 0.0, 0.0, 0.0];
        chrom.set_vector(&v).unwrap();
        let w = chrom.get_vector();
        for k in 0..v.len() {
            assert!((v[k] - w[k]).abs() < 1e-9, "slot {}", k);
        }
    }

    #[test]
    fn set_vector_shape_mismatch_is_error() {
        let (_, mut chrom) = build();
        assert!(chrom.set_vector(&[1.0, 2.0]).is_err());
        assert!(chrom.compare_vector(&[1.0]).is_err());
    }

    #[test]
    fn mutate_sync_round_trip() {
        crate::rng::seed(1234);
        let (mut models, mut chrom) = build();
        chrom.sync_from_model(&models);
        for _ in 0..5 {
            chrom.mutate(1.0);
            let expected = chrom.get_vector();
            chrom.sync_to_model(&mut models);
            chrom.sync_from_model(&models);
            let got = chrom.get_vector();
            for k in 0..expected.len() {
                assert!(
                    (expected[k] - got[k]).abs() < 1e-6,
                    "slot {}: {} vs {}",
                    k,
                    expected[k],
                    got[k]
                );
            }
        }
    }

    #[test]
    fn pseudo_atoms_refreshed_after_sync() {
        crate::rng::seed(88);
        let (mut models, mut chrom) = build();
        let p = models[0].add_pseudo_atom(vec![0, 1]);
        chrom.randomise();
        chrom.sync_to_model(&mut models);
        let expected = models[0].centroid(&[0, 1]);
        assert_eq!(models[0].pseudo_atoms[p].coords, expected);
    }

    #[test]
    fn compare_vector_of_self_is_zero() {
        let (_, chrom) = build();
        let v = chrom.get_vector();
        assert_eq!(chrom.compare_vector(&v).unwrap(), 0.0);
    }
}
