//! Polar setup pseudo-term.
//!
//! Runs disabled and scores nothing. Its setup hooks write the per-atom
//! `user1` weighting (local neighbour density x charge factor) and the
//! lipophilic flag that the polar and vdW terms read during scoring. No
//! other term may overwrite `user1` while polar terms are enabled.

use log::debug;

use crate::error::Result;
use crate::model::{Atom, Model};
use crate::params::Value;
use crate::sf::{SfCore, SfNode, SlotCache};

#[derive(Debug)]
pub struct SetupPolarSf {
    pub core: SfCore,
    slots: SlotCache,
    radius: f64,
    norm: f64,
    power: f64,
    chg_factor: f64,
    guan_factor: f64,
}

impl SetupPolarSf {
    pub fn new(name: &str) -> SetupPolarSf {
        let mut core = SfCore::new(name);
        core.params.add("radius", 5.0);
        core.params.add("norm", 25.0);
        core.params.add("power", 0.5);
        core.params.add("chg-factor", 0.5);
        core.params.add("guan-factor", 1.0);
        core.set_enabled(false);
        SetupPolarSf {
            core,
            slots: SlotCache::default(),
            radius: 5.0,
            norm: 25.0,
            power: 0.5,
            chg_factor: 0.5,
            guan_factor: 1.0,
        }
    }

    pub fn into_node(self) -> SfNode {
        SfNode::SetupPolar(self)
    }

    pub fn update(&mut self, models: &mut [Model]) {
        let changes = self.slots.diff_and_update(models);
        if changes.receptor {
            if let Some(receptor) = models.first_mut() {
                if !receptor.is_empty() {
                    // Only the receptor gets the neighbour-density factor
                    let heavy = receptor.heavy_atom_indices();
                    self.setup_atoms(receptor, &heavy);
                }
            }
        }
        if changes.ligand {
            if let Some(ligand) = models.get_mut(1) {
                if !ligand.is_empty() {
                    self.setup_atoms(ligand, &[]);
                }
            }
        }
        if changes.solvent {
            for model in models.iter_mut().skip(2) {
                if !model.is_empty() {
                    self.setup_atoms(model, &[]);
                }
            }
        }
    }

    /// Writes `user1` and the lipophilic flag for every atom of the model.
    /// With an empty neighbour list the density factor is 1.
    fn setup_atoms(&self, model: &mut Model, neighbour_idx: &[usize]) {
        let neighbour_coords: Vec<_> = neighbour_idx
            .iter()
            .map(|&i| model.atoms[i].coords)
            .collect();
        let r2 = self.radius * self.radius;
        for i in 0..model.atoms.len() {
            let f_neighb = if neighbour_coords.is_empty() {
                1.0
            } else {
                // Exclude the atom itself from its own neighbour count
                let n = neighbour_coords
                    .iter()
                    .filter(|c| c.distance2(model.atoms[i].coords) <= r2)
                    .count()
                    .saturating_sub(1);
                (n as f64 / self.norm).powf(self.power)
            };
            let atom = &mut model.atoms[i];
            let f_charge = charge_factor(atom, self.chg_factor, self.guan_factor);
            atom.user1 = f_neighb * f_charge;
            atom.user1_flag = atom.lipophilic;
            debug!(
                "setup-polar: {} f_neighb={:.3} f_charge={:.3} lipo={}",
                atom.name, f_neighb, f_charge, atom.user1_flag
            );
        }
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        match name {
            "radius" | "norm" | "power" | "chg-factor" | "guan-factor" => {
                self.core.params.set(name, value.clone())?;
                match name {
                    "radius" => self.radius = self.core.params.get_f64(name),
                    "norm" => self.norm = self.core.params.get_f64(name),
                    "power" => self.power = self.core.params.get_f64(name),
                    "chg-factor" => self.chg_factor = self.core.params.get_f64(name),
                    "guan-factor" => self.guan_factor = self.core.params.get_f64(name),
                    _ => {}
                }
                Ok(true)
            }
            _ => self.core.set_parameter(name, value),
        }
    }
}

/// Charge factor, always >= 1 in magnitude. The sign reflects the polarity:
/// negative for anions and neutral acceptors, positive otherwise.
fn charge_factor(atom: &Atom, chg_factor: f64, guan_factor: f64) -> f64 {
    let charge = atom.group_charge;
    let sign = if charge < 0.0 || atom.hbond_acceptor {
        -1.0
    } else {
        1.0
    };
    let mut f = sign * (1.0 + charge.abs() * chg_factor);
    if atom.guanidinium_carbon {
        f *= guan_factor;
    }
    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::model::tests_support::test_atom;
    use crate::model::ModelFlex;

    #[test]
    fn charge_factor_signs() {
        let mut a = test_atom("N", 7, Vec3::zero());
        a.group_charge = 1.0;
        assert!((charge_factor(&a, 0.5, 1.0) - 1.5).abs() < 1e-12);
        a.group_charge = -1.0;
        assert!((charge_factor(&a, 0.5, 1.0) + 1.5).abs() < 1e-12);
        a.group_charge = 0.0;
        a.hbond_acceptor = true;
        assert!((charge_factor(&a, 0.5, 1.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn ligand_atoms_get_unit_density() {
        let atoms = vec![test_atom("C", 6, Vec3::zero()), test_atom("O", 8, Vec3::new(1.2, 0.0, 0.0))];
        let mut model = Model::new("lig", atoms, Vec::new(), ModelFlex::Rigid);
        let sf = SetupPolarSf::new("setup");
        sf.setup_atoms(&mut model, &[]);
        // Neutral non-acceptor carbon: factor exactly 1
        assert!((model.atoms[0].user1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn receptor_density_scales_with_neighbours() {
        let mut atoms = vec![test_atom("O", 8, Vec3::zero())];
        for i in 0..10 {
            atoms.push(test_atom("C", 6, Vec3::new(1.0 + 0.2 * i as f64, 0.0, 0.0)));
        }
        atoms[0].hbond_acceptor = true;
        let mut model = Model::new("rec", atoms, Vec::new(), ModelFlex::Rigid);
        let sf = SetupPolarSf::new("setup");
        let heavy = model.heavy_atom_indices();
        sf.setup_atoms(&mut model, &heavy);
        // 10 neighbours within 5 A (plus itself, excluded): (10/25)^0.5
        let expected = -(10.0_f64 / 25.0).sqrt();
        assert!((model.atoms[0].user1 - expected).abs() < 1e-9);
    }

    #[test]
    fn setup_term_is_disabled() {
        let sf = SetupPolarSf::new("setup");
        assert!(!sf.core.enabled);
    }
}
