//! Rigid-body pose element: three cartesian translation slots plus a
//! quaternion orientation, with independent tether modes for each.

use crate::error::{DockError, Result};
use crate::geometry::{Mat3, Vec3};
use crate::model::{Model, TetherMode};
use crate::qt::Quaternion;
use crate::rng;

#[derive(Debug, Clone)]
pub struct PositionElement {
    model: usize,
    /// Rigid-core atoms; their centroid and canonical frame are this
    /// element's view of the model pose, and are untouched by dihedral moves.
    anchors: Vec<usize>,
    ref_frame: Mat3,
    ref_com: Vec3,
    com: Vec3,
    orientation: Quaternion,
    trans_mode: TetherMode,
    rot_mode: TetherMode,
    max_trans: f64,
    max_rot_deg: f64,
    trans_step: f64,
    rot_step_deg: f64,
    box_min: Vec3,
    box_max: Vec3,
}

fn canonical(mut q: Quaternion) -> Quaternion {
    if q.w < 0.0 {
        q = -q;
    }
    q
}

impl PositionElement {
    pub fn new(
        models: &[Model],
        model: usize,
        trans_mode: TetherMode,
        rot_mode: TetherMode,
        max_trans: f64,
        max_rot_deg: f64,
        trans_step: f64,
        rot_step_deg: f64,
        site_bounds: Option<(Vec3, Vec3)>,
    ) -> PositionElement {
        let m = &models[model];
        let anchors = m.rigid_core_atoms();
        let ref_frame = m.canonical_frame(&anchors);
        let ref_com = m.centroid(&anchors);
        let (box_min, box_max) = site_bounds.unwrap_or((
            ref_com - Vec3::new(2.0 * trans_step, 2.0 * trans_step, 2.0 * trans_step),
            ref_com + Vec3::new(2.0 * trans_step, 2.0 * trans_step, 2.0 * trans_step),
        ));
        PositionElement {
            model,
            anchors,
            ref_frame,
            ref_com,
            com: ref_com,
            orientation: Quaternion::default(),
            trans_mode,
            rot_mode,
            max_trans,
            max_rot_deg,
            trans_step,
            rot_step_deg,
            box_min,
            box_max,
        }
    }

    pub fn model_index(&self) -> usize {
        self.model
    }

    pub fn reset(&mut self) {
        self.com = self.ref_com;
        self.orientation = Quaternion::default();
    }

    pub fn randomise(&mut self) {
        match self.trans_mode {
            TetherMode::Free => {
                self.com = Vec3::new(
                    rng::uniform(self.box_min.x, self.box_max.x),
                    rng::uniform(self.box_min.y, self.box_max.y),
                    rng::uniform(self.box_min.z, self.box_max.z),
                );
            }
            TetherMode::Tethered => {
                self.com =
                    self.ref_com + rng::random_unit_vector() * rng::uniform(0.0, self.max_trans.max(1e-12));
            }
            TetherMode::Fixed => {
                self.com = self.ref_com;
            }
        }
        match self.rot_mode {
            TetherMode::Free => {
                self.orientation = canonical(rng::random_quaternion());
            }
            TetherMode::Tethered => {
                let angle = rng::uniform(0.0, self.max_rot_deg.max(1e-12).to_radians());
                self.orientation =
                    canonical(Quaternion::from_axis_angle(rng::random_unit_vector(), angle));
            }
            TetherMode::Fixed => {
                self.orientation = Quaternion::default();
            }
        }
    }

    pub fn mutate(&mut self, rel_step: f64) {
        if self.trans_mode != TetherMode::Fixed {
            let dist = rng::gaussian(0.0, self.trans_step * rel_step).abs();
            self.com = self.com + rng::random_unit_vector() * dist;
            if self.trans_mode == TetherMode::Tethered {
                let offset = self.com - self.ref_com;
                let len = offset.length();
                if len > self.max_trans {
                    self.com = self.ref_com + offset * (self.max_trans / len);
                }
            }
        }
        if self.rot_mode != TetherMode::Fixed {
            let max_angle = (self.rot_step_deg * rel_step).to_radians();
            if max_angle > 0.0 {
                let perturb =
                    Quaternion::from_axis_angle(rng::random_unit_vector(), rng::uniform(0.0, max_angle));
                self.orientation = canonical(perturb * self.orientation);
                if self.rot_mode == TetherMode::Tethered {
                    let reference = Quaternion::default();
                    let angle = reference.angle_to(self.orientation);
                    let max_rot = self.max_rot_deg.to_radians();
                    if angle > max_rot {
                        self.orientation =
                            canonical(reference.slerp(&self.orientation, max_rot / angle));
                    }
                }
            }
        }
    }

    pub fn sync_from_model(&mut self, models: &[Model]) {
        let m = &models[self.model];
        self.com = m.centroid(&self.anchors);
        let f_now = m.canonical_frame(&self.anchors);
        let r_now = f_now.transpose().mul_mat(&self.ref_frame);
        self.orientation = Quaternion::from_matrix(&r_now);
    }

    pub fn sync_to_model(&self, models: &mut [Model]) {
        let m = &mut models[self.model];
        let f_now = m.canonical_frame(&self.anchors);
        let c_now = m.centroid(&self.anchors);
        let r_now = f_now.transpose().mul_mat(&self.ref_frame);
        let r_delta = self.orientation.to_matrix().mul_mat(&r_now.transpose());
        let q_delta = Quaternion::from_matrix(&r_delta);
        m.transform(&q_delta, c_now, self.com - c_now);
    }

    pub fn len(&self) -> usize {
        7
    }

    pub fn xover_groups(&self) -> &'static [usize] {
        // Translation and orientation recombine as indivisible blocks
        &[3, 4]
    }

    pub fn get_vector(&self, v: &mut Vec<f64>) {
        v.extend_from_slice(&[
            self.com.x,
            self.com.y,
            self.com.z,
            self.orientation.w,
            self.orientation.x,
            self.orientation.y,
            self.orientation.z,
        ]);
    }

    pub fn set_vector(&mut self, v: &[f64], i: &mut usize) -> Result<()> {
        if *i + 7 > v.len() {
            return Err(DockError::bad_argument("insufficient elements for position"));
        }
        self.com = Vec3::new(v[*i], v[*i + 1], v[*i + 2]);
        let mut q = Quaternion::new(v[*i + 3], v[*i + 4], v[*i + 5], v[*i + 6]);
        if q.norm2() < 1e-12 {
            return Err(DockError::bad_argument("zero-norm orientation"));
        }
        q.normalize();
        self.orientation = q;
        *i += 7;
        Ok(())
    }

    pub fn get_step_vector(&self, v: &mut Vec<f64>) {
        let rot_step = self.rot_step_deg.to_radians();
        v.extend_from_slice(&[
            self.trans_step,
            self.trans_step,
            self.trans_step,
            rot_step,
            rot_step,
            rot_step,
            rot_step,
        ]);
    }

    pub fn compare_vector(&self, v: &[f64], i: &mut usize) -> Result<f64> {
        if *i + 7 > v.len() {
            return Err(DockError::bad_argument("insufficient elements for position"));
        }
        let mut current = Vec::with_capacity(7);
        self.get_vector(&mut current);
        let mut steps = Vec::with_capacity(7);
        self.get_step_vector(&mut steps);
        let mut max_diff: f64 = 0.0;
        for k in 0..7 {
            let diff = (v[*i + k] - current[k]).abs() / steps[k].max(1e-12);
            max_diff = max_diff.max(diff);
        }
        *i += 7;
        Ok(max_diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests_support::simple_rigid_model;

    fn element(models: &[Model]) -> PositionElement {
        PositionElement::new(
            models,
            0,
            TetherMode::Free,
            TetherMode::Free,
            0.0,
            0.0,
            2.0,
            30.0,
            Some((Vec3::new(-5.0, -5.0, -5.0), Vec3::new(5.0, 5.0, 5.0))),
        )
    }

    #[test]
    fn vector_round_trip() {
        let models = vec![simple_rigid_model()];
        let mut el = element(&models);
        let v = vec![1.0, -2.0, 0.5, 1.0, 0.0, 0.0, 0.0];
        let mut i = 0;
        el.set_vector(&v, &mut i).unwrap();
        assert_eq!(i, 7);
        let mut out = Vec::new();
        el.get_vector(&mut out);
        for k in 0..7 {
            assert!((out[k] - v[k]).abs() < 1e-9);
        }
    }

    #[test]
    fn set_vector_rejects_short_input() {
        let models = vec![simple_rigid_model()];
        let mut el = element(&models);
        let mut i = 0;
        assert!(el.set_vector(&[1.0, 2.0], &mut i).is_err());
    }

    #[test]
    fn sync_round_trip_recovers_pose() {
        crate::rng::seed(991);
        let mut models = vec![simple_rigid_model()];
        let mut el = element(&models);
        el.randomise();
        el.mutate(1.0);
        let mut expected = Vec::new();
        el.get_vector(&mut expected);
        el.sync_to_model(&mut models);
        el.sync_from_model(&models);
        let mut got = Vec::new();
        el.get_vector(&mut got);
        for k in 0..7 {
            assert!(
                (expected[k] - got[k]).abs() < 1e-6,
                "slot {}: {} vs {}",
                k,
                expected[k],
                got[k]
            );
        }
    }

    #[test]
    fn tethered_translation_stays_in_range() {
        crate::rng::seed(5);
        let models = vec![simple_rigid_model()];
        let mut el = PositionElement::new(
            &models,
            0,
            TetherMode::Tethered,
            TetherMode::Fixed,
            1.5,
            0.0,
            2.0,
            30.0,
            None,
        );
        for _ in 0..50 {
            el.mutate(1.0);
            assert!(el.com.distance(el.ref_com) <= 1.5 + 1e-9);
        }
    }
}
