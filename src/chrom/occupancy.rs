//! Continuous solvent-occupancy element in [0, 1]; the owning model is
//! enabled when the value clears the threshold.

use crate::error::{DockError, Result};
use crate::model::Model;
use crate::rng;

#[derive(Debug, Clone)]
pub struct OccupancyElement {
    model: usize,
    value: f64,
    ref_value: f64,
    step: f64,
}

impl OccupancyElement {
    pub fn new(models: &[Model], model: usize) -> OccupancyElement {
        let ref_value = models[model].occupancy();
        OccupancyElement {
            model,
            value: ref_value,
            ref_value,
            step: 1.0,
        }
    }

    pub fn model_index(&self) -> usize {
        self.model
    }

    pub fn reset(&mut self) {
        self.value = self.ref_value;
    }

    pub fn randomise(&mut self) {
        self.value = rng::random01();
    }

    pub fn mutate(&mut self, rel_step: f64) {
        let width = 0.5 * self.step * rel_step;
        if width <= 0.0 {
            return;
        }
        self.value = (self.value + rng::uniform(-width, width)).clamp(0.0, 1.0);
    }

    pub fn sync_from_model(&mut self, models: &[Model]) {
        self.value = models[self.model].occupancy();
    }

    pub fn sync_to_model(&self, models: &mut [Model]) {
        models[self.model].set_occupancy(self.value);
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
            return Err(DockError::bad_argument("insufficient elements for occupancy"));
        }
        self.value = v[*i].clamp(0.0, 1.0);
        *i += 1;
        Ok(())
    }

    pub fn get_step_vector(&self, v: &mut Vec<f64>) {
        v.push(self.step);
    }

    pub fn compare_vector(&self, v: &[f64], i: &mut usize) -> Result<f64> {
        if *i >= v.len() {
            return Err(DockError::bad_argument("insufficient elements for occupancy"));
        }
        let diff = (v[*i] - self.value).abs() / self.step.max(1e-12);
        *i += 1;
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests_support::simple_rigid_model;

    #[test]
    fn occupancy_round_trip() {
        crate::rng::seed(21);
        let mut models = vec![simple_rigid_model()];
        let mut el = OccupancyElement::new(&models, 0);
        el.randomise();
        let expected = el.value;
        el.sync_to_model(&mut models);
        el.sync_from_model(&models);
        assert!((expected - el.value).abs() < 1e-12);
    }

    #[test]
    fn mutate_stays_in_unit_interval() {
        crate::rng::seed(77);
        let models = vec![simple_rigid_model()];
        let mut el = OccupancyElement::new(&models, 0);
        for _ in 0..200 {
            el.mutate(2.0);
            assert!((0.0..=1.0).contains(&el.value));
        }
    }
}
