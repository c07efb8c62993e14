//! Single-dihedral element, covering ligand rotatable bonds and receptor
//! OH/NH3 tips alike.

use crate::error::{DockError, Result};
use crate::geometry::standardise_angle;
use crate::model::{Model, RotatableBond};
use crate::rng;

#[derive(Debug, Clone)]
pub struct DihedralElement {
    model: usize,
    rb: RotatableBond,
    /// Degrees, wrapped to [-180, 180).
    value: f64,
    ref_value: f64,
    step: f64,
    /// Maximum excursion from the reference value, if tethered.
    max_delta: Option<f64>,
    cauchy: bool,
}

impl DihedralElement {
    pub fn new(
        models: &[Model],
        model: usize,
        rb: RotatableBond,
        step: f64,
        max_delta: Option<f64>,
    ) -> DihedralElement {
        let ref_value = models[model].current_dihedral(&rb);
        DihedralElement {
            model,
            rb,
            value: ref_value,
            ref_value,
            step,
            max_delta,
            cauchy: false,
        }
    }

    pub fn model_index(&self) -> usize {
        self.model
    }

    pub fn set_cauchy(&mut self, cauchy: bool) {
        self.cauchy = cauchy;
    }

    pub fn reset(&mut self) {
        self.value = self.ref_value;
    }

    pub fn randomise(&mut self) {
        self.value = match self.max_delta {
            Some(d) => standardise_angle(self.ref_value + rng::uniform(-d, d)),
            None => rng::uniform(-180.0, 180.0),
        };
    }

    pub fn mutate(&mut self, rel_step: f64) {
        let width = self.step * rel_step;
        if width <= 0.0 {
            return;
        }
        let delta = if self.cauchy {
            rng::cauchy(0.0, width)
        } else {
            rng::uniform(-width, width)
        };
        self.value = standardise_angle(self.value + delta);
        if let Some(d) = self.max_delta {
            let excursion = standardise_angle(self.value - self.ref_value);
            if excursion.abs() > d {
                self.value = standardise_angle(self.ref_value + d * excursion.signum());
            }
        }
    }

    pub fn sync_from_model(&mut self, models: &[Model]) {
        self.value = models[self.model].current_dihedral(&self.rb);
    }

    pub fn sync_to_model(&self, models: &mut [Model]) {
        models[self.model].set_dihedral(&self.rb, self.value);
    }

    pub fn len(&self) -> usize {
        1
    }

    pub fn xover_groups(&self) -> &'static [usize] {
        &[1]
    }

    pub fn get_vector(&self, v: &mut Vec<f64>) {
        v.push(self.value);
    }

    pub fn set_vector(&mut self, v: &[f64], i: &mut usize) -> Result<()> {
        if *i >= v.len() {
            return Err(DockError::bad_argument("insufficient elements for dihedral"));
        }
        self.value = standardise_angle(v[*i]);
        *i += 1;
        Ok(())
    }

    pub fn get_step_vector(&self, v: &mut Vec<f64>) {
        v.push(self.step);
    }

    pub fn compare_vector(&self, v: &[f64], i: &mut usize) -> Result<f64> {
        if *i >= v.len() {
            return Err(DockError::bad_argument("insufficient elements for dihedral"));
        }
        let diff = standardise_angle(v[*i] - self.value).abs() / self.step.max(1e-12);
        *i += 1;
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::model::tests_support::{test_atom, test_bond};
    use crate::model::{Model, ModelFlex};

    fn chain() -> Model {
        let atoms = vec![
            test_atom("C0", 6, Vec3::new(-1.0, 1.0, 0.0)),
            test_atom("C1", 6, Vec3::new(-1.0, 0.0, 0.0)),
            test_atom("C2", 6, Vec3::new(0.5, 0.0, 0.0)),
            test_atom("O3", 8, Vec3::new(0.5, 1.0, 0.0)),
        ];
        let bonds = vec![test_bond(0, 1, false), test_bond(1, 2, true), test_bond(2, 3, false)];
        Model::new("chain", atoms, bonds, ModelFlex::Rigid)
    }

    #[test]
    fn mutate_sync_round_trip() {
        crate::rng::seed(314);
        let mut models = vec![chain()];
        let rb = models[0].rotatable_bonds()[0].clone();
        let mut el = DihedralElement::new(&models, 0, rb, 30.0, None);
        for _ in 0..10 {
            el.mutate(1.0);
            let expected = el.value;
            el.sync_to_model(&mut models);
            el.sync_from_model(&models);
            assert!((standardise_angle(expected - el.value)).abs() < 1e-6);
        }
    }

    #[test]
    fn tether_limits_excursion() {
        crate::rng::seed(999);
        let models = vec![chain()];
        let rb = models[0].rotatable_bonds()[0].clone();
        let mut el = DihedralElement::new(&models, 0, rb, 60.0, Some(15.0));
        for _ in 0..100 {
            el.mutate(1.0);
            let excursion = standardise_angle(el.value - el.ref_value).abs();
            assert!(excursion <= 15.0 + 1e-9);
        }
    }

    #[test]
    fn compare_uses_angular_wrap() {
        let models = vec![chain()];
        let rb = models[0].rotatable_bonds()[0].clone();
        let mut el = DihedralElement::new(&models, 0, rb, 30.0, None);
        let mut i = 0;
        el.set_vector(&[175.0], &mut i).unwrap();
        let mut j = 0;
        // -175 is 10 degrees away from 175 across the wrap
        let diff = el.compare_vector(&[-175.0], &mut j).unwrap();
        assert!((diff - 10.0 / 30.0).abs() < 1e-9);
    }
}
