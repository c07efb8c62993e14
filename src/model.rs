//! Molecular models.
//!
//! A `Model` owns its atoms, bonds and pseudo-atoms; cross-references are
//! integer indices within the owning model. Models arrive already parsed and
//! typed (atomic numbers, Tripos types, donor/acceptor predicates); this
//! module only manages coordinates, flexibility and derived geometry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DIHEDRAL_STEP_DEG, DEFAULT_ROTATION_STEP_DEG, DEFAULT_TRANSLATION_STEP,
    OCCUPANCY_THRESHOLD,
};
use crate::error::{DockError, Result};
use crate::geometry::{dihedral_deg, Mat3, Vec3};
use crate::qt::Quaternion;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hybridisation {
    Undefined,
    Sp,
    Sp2,
    Sp3,
    Aromatic,
    Trigonal,
}

/// Tripos force-field atom types, used for van-der-Waals parameter lookup.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TriposType {
    Undefined,
    H,
    HP,
    C1,
    C2,
    C3,
    Car,
    Ccat,
    N1,
    N2,
    N3,
    N4,
    Nam,
    Nar,
    Npl3,
    O2,
    O3,
    Oco2,
    S2,
    S3,
    P3,
    F,
    Cl,
    Br,
    I,
    Met,
}

pub const NUM_TRIPOS_TYPES: usize = 26;

impl TriposType {
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// 1-based, dense within the owning model.
    pub id: usize,
    pub name: String,
    pub atomic_no: u8,
    pub mass: f64,
    pub coords: Vec3,
    pub vdw_radius: f64,
    pub formal_charge: i32,
    pub partial_charge: f64,
    /// Redistributed protonation charge.
    pub group_charge: f64,
    pub hybridisation: Hybridisation,
    pub tripos_type: TriposType,
    #[serde(default)]
    pub segment: String,
    /// True on donor hydrogens (and protonated donor tips).
    #[serde(default)]
    pub hbond_donor: bool,
    #[serde(default)]
    pub hbond_acceptor: bool,
    #[serde(default)]
    pub lipophilic: bool,
    #[serde(default)]
    pub metal: bool,
    #[serde(default)]
    pub guanidinium_carbon: bool,
    #[serde(default)]
    pub anionic: bool,
    #[serde(default)]
    pub rna: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(skip)]
    pub selected: bool,
    /// Scratch slot written by the polar setup term; holds the per-atom
    /// local-density x charge weighting read back during polar scoring.
    #[serde(skip)]
    pub user1: f64,
    #[serde(skip)]
    pub user1_flag: bool,
}

fn default_true() -> bool {
    true
}

impl Atom {
    pub fn is_hydrogen(&self) -> bool {
        self.atomic_no == 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bond {
    /// 1-based, dense within the owning model.
    pub id: usize,
    /// 0-based atom indices.
    pub atom1: usize,
    pub atom2: usize,
    pub order: u8,
    #[serde(default)]
    pub cyclic: bool,
    #[serde(default)]
    pub rotatable: bool,
}

/// A synthetic atom whose position is the centroid of a real-atom set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PseudoAtom {
    pub coords: Vec3,
    pub atoms: Vec<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TetherMode {
    Free,
    Tethered,
    Fixed,
}

/// Per-model search flexibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelFlex {
    /// No degrees of freedom.
    Rigid,
    /// Rigid-body pose plus rotatable dihedrals.
    Ligand {
        trans_mode: TetherMode,
        rot_mode: TetherMode,
        #[serde(default)]
        max_trans: f64,
        /// Degrees.
        #[serde(default)]
        max_rot: f64,
        #[serde(default = "default_dihedral_step")]
        dihedral_step: f64,
    },
    /// Rotatable OH/NH3 tips only.
    Receptor {
        #[serde(default = "default_dihedral_step")]
        dihedral_step: f64,
    },
    /// Rigid-body pose (usually tethered) plus optional occupancy.
    Solvent {
        trans_mode: TetherMode,
        rot_mode: TetherMode,
        #[serde(default)]
        max_trans: f64,
        #[serde(default)]
        max_rot: f64,
        #[serde(default)]
        variable_occupancy: bool,
    },
}

fn default_dihedral_step() -> f64 {
    DEFAULT_DIHEDRAL_STEP_DEG
}

impl ModelFlex {
    pub fn trans_step(&self) -> f64 {
        DEFAULT_TRANSLATION_STEP
    }

    pub fn rot_step_deg(&self) -> f64 {
        DEFAULT_ROTATION_STEP_DEG
    }
}

/// Precomputed description of one rotatable bond: the pivot atom (root side),
/// the moving atom (far side), the four dihedral-defining atoms, and the set
/// of atoms carried by the rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotatableBond {
    pub bond: usize,
    pub pivot: usize,
    pub moving: usize,
    pub dihedral: [usize; 4],
    pub movable: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    #[serde(default)]
    pub pseudo_atoms: Vec<PseudoAtom>,
    pub flex: ModelFlex,
    #[serde(default)]
    saved_coords: Vec<Vec<Vec3>>,
    #[serde(default)]
    current_coords: usize,
    #[serde(skip)]
    rot_bonds: Vec<RotatableBond>,
    #[serde(default = "default_occupancy")]
    occupancy: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Assigned by the workspace when the model is installed; observers use
    /// it to detect which slot actually changed.
    #[serde(skip)]
    pub stamp: u64,
}

fn default_occupancy() -> f64 {
    1.0
}

impl Model {
    pub fn new(name: &str, mut atoms: Vec<Atom>, mut bonds: Vec<Bond>, flex: ModelFlex) -> Model {
        for (i, atom) in atoms.iter_mut().enumerate() {
            atom.id = i + 1;
        }
        for (i, bond) in bonds.iter_mut().enumerate() {
            bond.id = i + 1;
        }
        let mut model = Model {
            name: name.to_string(),
            atoms,
            bonds,
            pseudo_atoms: Vec::new(),
            flex,
            saved_coords: Vec::new(),
            current_coords: 0,
            rot_bonds: Vec::new(),
            occupancy: 1.0,
            enabled: true,
            stamp: 0,
        };
        model.rebuild_flex_data();
        model
    }

    pub fn empty() -> Model {
        Model::new("", Vec::new(), Vec::new(), ModelFlex::Rigid)
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn heavy_atom_indices(&self) -> Vec<usize> {
        (0..self.atoms.len()).filter(|&i| !self.atoms[i].is_hydrogen()).collect()
    }

    /// Call after deserialisation or any change to bonds/flex.
    pub fn rebuild_flex_data(&mut self) {
        self.rot_bonds = self.compute_rotatable_bonds();
    }

    pub fn rotatable_bonds(&self) -> &[RotatableBond] {
        &self.rot_bonds
    }

    pub fn is_flexible(&self) -> bool {
        !self.rot_bonds.is_empty()
    }

    fn neighbours(&self, atom: usize) -> Vec<usize> {
        let mut out = Vec::new();
        for bond in &self.bonds {
            if bond.atom1 == atom {
                out.push(bond.atom2);
            } else if bond.atom2 == atom {
                out.push(bond.atom1);
            }
        }
        out
    }

    /// Atoms reachable from `start` without crossing bond `excluded`.
    fn side_of(&self, start: usize, excluded: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(a) = stack.pop() {
            if !seen.insert(a) {
                continue;
            }
            for bond in &self.bonds {
                if bond.id == self.bonds[excluded].id {
                    continue;
                }
                let other = if bond.atom1 == a {
                    bond.atom2
                } else if bond.atom2 == a {
                    bond.atom1
                } else {
                    continue;
                };
                if !seen.contains(&other) {
                    stack.push(other);
                }
            }
        }
        seen
    }

    fn compute_rotatable_bonds(&self) -> Vec<RotatableBond> {
        let mut out = Vec::new();
        for (bi, bond) in self.bonds.iter().enumerate() {
            if !bond.rotatable || bond.cyclic {
                continue;
            }
            // The side not containing atom 0 rotates, so the root fragment
            // stays put under any dihedral change.
            let side2 = self.side_of(bond.atom2, bi);
            let (pivot, moving) = if side2.contains(&0) {
                (bond.atom2, bond.atom1)
            } else {
                (bond.atom1, bond.atom2)
            };
            let movable: Vec<usize> = self
                .side_of(moving, bi)
                .into_iter()
                .filter(|&a| a != moving)
                .collect();
            let n_pivot = self.neighbours(pivot).into_iter().filter(|&a| a != moving).min();
            let n_moving = self.neighbours(moving).into_iter().filter(|&a| a != pivot).min();
            let (np, nm) = match (n_pivot, n_moving) {
                (Some(np), Some(nm)) => (np, nm),
                // Terminal bond: no dihedral is defined
                _ => continue,
            };
            out.push(RotatableBond {
                bond: bi,
                pivot,
                moving,
                dihedral: [np, pivot, moving, nm],
                movable,
            });
        }
        out
    }

    /// Atoms not carried by any rotatable bond (the root rigid fragment).
    /// Both bond atoms lie on the rotation axis and stay put.
    pub fn rigid_core_atoms(&self) -> Vec<usize> {
        let mut movable = BTreeSet::new();
        for rb in &self.rot_bonds {
            for &a in &rb.movable {
                movable.insert(a);
            }
        }
        let core: Vec<usize> = (0..self.atoms.len()).filter(|a| !movable.contains(a)).collect();
        if core.is_empty() {
            (0..self.atoms.len()).collect()
        } else {
            core
        }
    }

    pub fn centroid(&self, indices: &[usize]) -> Vec3 {
        let mut c = Vec3::zero();
        if indices.is_empty() {
            return c;
        }
        for &i in indices {
            c = c + self.atoms[i].coords;
        }
        c / indices.len() as f64
    }

    pub fn centre_of_mass(&self) -> Vec3 {
        let mut c = Vec3::zero();
        let mut total = 0.0;
        for atom in &self.atoms {
            c = c + atom.coords * atom.mass;
            total += atom.mass;
        }
        if total > 0.0 {
            c / total
        } else {
            c
        }
    }

    /// Orthonormal right-handed frame anchored on the rigid core, used by the
    /// rigid-body chromosome element to read the model orientation back from
    /// coordinates. Rotation-covariant and unaffected by dihedral moves.
    pub fn canonical_frame(&self, core: &[usize]) -> Mat3 {
        let com = self.centroid(core);
        let mut u = None;
        for &i in core {
            let v = self.atoms[i].coords - com;
            if v.length2() > 1e-8 {
                u = Some(v.unit());
                break;
            }
        }
        let u = match u {
            Some(u) => u,
            None => return Mat3::identity(),
        };
        let mut w = None;
        for &i in core {
            let v = self.atoms[i].coords - com;
            let c = u.cross(v);
            if c.length2() > 1e-8 {
                w = Some(c.unit());
                break;
            }
        }
        let w = match w {
            Some(w) => w,
            // Collinear core: any perpendicular completes the frame
            None => {
                let probe = if u.x.abs() < 0.9 {
                    Vec3::new(1.0, 0.0, 0.0)
                } else {
                    Vec3::new(0.0, 1.0, 0.0)
                };
                u.cross(probe).unit()
            }
        };
        let v = w.cross(u);
        Mat3::from_rows(u, v, w)
    }

    /// Applies a rigid rotation about `centre` followed by a translation.
    pub fn transform(&mut self, rotation: &Quaternion, centre: Vec3, translation: Vec3) {
        for atom in &mut self.atoms {
            atom.coords = rotation.rotate(atom.coords - centre) + centre + translation;
        }
    }

    pub fn translate(&mut self, delta: Vec3) {
        for atom in &mut self.atoms {
            atom.coords = atom.coords + delta;
        }
    }

    pub fn current_dihedral(&self, rb: &RotatableBond) -> f64 {
        let [a, b, c, d] = rb.dihedral;
        dihedral_deg(
            self.atoms[a].coords,
            self.atoms[b].coords,
            self.atoms[c].coords,
            self.atoms[d].coords,
        )
    }

    /// Rotates the movable side of a rotatable bond by `delta_deg` about the
    /// pivot-to-moving axis.
    pub fn rotate_about_bond(&mut self, rb: &RotatableBond, delta_deg: f64) {
        let centre = self.atoms[rb.pivot].coords;
        let axis = self.atoms[rb.moving].coords - centre;
        if axis.length2() < 1e-12 {
            return;
        }
        let q = Quaternion::from_axis_angle(axis, delta_deg.to_radians());
        for &a in &rb.movable {
            self.atoms[a].coords = q.rotate(self.atoms[a].coords - centre) + centre;
        }
    }

    pub fn set_dihedral(&mut self, rb: &RotatableBond, target_deg: f64) {
        let delta = target_deg - self.current_dihedral(rb);
        self.rotate_about_bond(rb, delta);
    }

    /// Saves the current coordinates into the ensemble, returning the index.
    pub fn save_coords(&mut self) -> usize {
        let snapshot: Vec<Vec3> = self.atoms.iter().map(|a| a.coords).collect();
        self.saved_coords.push(snapshot);
        self.current_coords = self.saved_coords.len() - 1;
        self.current_coords
    }

    pub fn num_saved_coords(&self) -> usize {
        self.saved_coords.len()
    }

    pub fn current_coords_index(&self) -> usize {
        self.current_coords
    }

    pub fn revert_coords(&mut self, index: usize) -> Result<()> {
        let snapshot = self
            .saved_coords
            .get(index)
            .ok_or_else(|| DockError::bad_argument("coordinate set index out of range"))?;
        if snapshot.len() != self.atoms.len() {
            return Err(DockError::Assertion("saved coordinate set size mismatch".into()));
        }
        for (atom, &c) in self.atoms.iter_mut().zip(snapshot.iter()) {
            atom.coords = c;
        }
        self.current_coords = index;
        Ok(())
    }

    /// Registers a pseudo-atom over the given constituent atoms, reusing an
    /// existing one with the same constituents.
    pub fn add_pseudo_atom(&mut self, mut atoms: Vec<usize>) -> usize {
        atoms.sort_unstable();
        atoms.dedup();
        for (i, p) in self.pseudo_atoms.iter().enumerate() {
            if p.atoms == atoms {
                return i;
            }
        }
        let coords = self.centroid(&atoms);
        self.pseudo_atoms.push(PseudoAtom { coords, atoms });
        self.pseudo_atoms.len() - 1
    }

    /// Recomputes every pseudo-atom position from its constituents.
    pub fn update_pseudo_atoms(&mut self) {
        let centroids: Vec<Vec3> = self
            .pseudo_atoms
            .iter()
            .map(|p| {
                let mut c = Vec3::zero();
                for &i in &p.atoms {
                    c = c + self.atoms[i].coords;
                }
                c / p.atoms.len().max(1) as f64
            })
            .collect();
        for (p, c) in self.pseudo_atoms.iter_mut().zip(centroids) {
            p.coords = c;
        }
    }

    pub fn occupancy(&self) -> f64 {
        self.occupancy
    }

    /// Sets the continuous occupancy state; the model (and its atoms) are
    /// enabled iff the occupancy clears the threshold.
    pub fn set_occupancy(&mut self, value: f64) {
        self.occupancy = value.clamp(0.0, 1.0);
        let on = self.occupancy >= OCCUPANCY_THRESHOLD;
        self.enabled = on;
        for atom in &mut self.atoms {
            atom.enabled = on;
        }
    }

    pub fn set_atom_selection_flags(&mut self, selected: bool) {
        for atom in &mut self.atoms {
            atom.selected = selected;
        }
    }

    /// Selects every atom whose position can change through this model's own
    /// degrees of freedom.
    pub fn select_flex_atoms(&mut self) {
        for rb in &self.rot_bonds {
            for &a in &rb.movable {
                self.atoms[a].selected = true;
            }
        }
    }

    /// Sorted list of rotatable bonds that move the given atom; two atoms of
    /// the same model are at variable distance iff their lists differ.
    pub fn movable_signature(&self, atom: usize) -> Vec<usize> {
        let mut sig = Vec::new();
        for rb in &self.rot_bonds {
            if rb.movable.contains(&atom) {
                sig.push(rb.bond);
            }
        }
        sig
    }

    /// Removes an atom, its bonds, and any pseudo-atoms referencing it.
    /// Atom and bond ids stay 1-based and dense.
    pub fn remove_atom(&mut self, index: usize) -> Result<()> {
        if index >= self.atoms.len() {
            return Err(DockError::bad_argument("atom index out of range"));
        }
        self.atoms.remove(index);
        self.bonds.retain(|b| b.atom1 != index && b.atom2 != index);
        let shift = |a: usize| if a > index { a - 1 } else { a };
        for bond in &mut self.bonds {
            bond.atom1 = shift(bond.atom1);
            bond.atom2 = shift(bond.atom2);
        }
        self.pseudo_atoms.retain(|p| !p.atoms.contains(&index));
        for pseudo in &mut self.pseudo_atoms {
            for a in &mut pseudo.atoms {
                *a = shift(*a);
            }
        }
        for (i, atom) in self.atoms.iter_mut().enumerate() {
            atom.id = i + 1;
        }
        for (i, bond) in self.bonds.iter_mut().enumerate() {
            bond.id = i + 1;
        }
        // Saved coordinate sets are invalidated by the renumbering
        self.saved_coords.clear();
        self.current_coords = 0;
        self.rebuild_flex_data();
        Ok(())
    }

    /// Atom indices within `depth` bonds of `atom` (excluding itself), used
    /// for non-bonded exclusions.
    pub fn bonded_within(&self, atom: usize, depth: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut frontier = vec![atom];
        for _ in 0..depth {
            let mut next = Vec::new();
            for &a in &frontier {
                for n in self.neighbours(a) {
                    if n != atom && seen.insert(n) {
                        next.push(n);
                    }
                }
            }
            frontier = next;
        }
        seen
    }
}

#[cfg(test)]
pub mod tests_support {
    use super::*;

    pub fn test_atom(name: &str, atomic_no: u8, coords: Vec3) -> Atom {
        Atom {
            id: 0,
            name: name.to_string(),
            atomic_no,
            mass: if atomic_no == 1 { 1.008 } else { 12.011 },
            coords,
            vdw_radius: if atomic_no == 1 { 1.2 } else { 1.7 },
            formal_charge: 0,
            partial_charge: 0.0,
            group_charge: 0.0,
            hybridisation: Hybridisation::Sp3,
            tripos_type: if atomic_no == 1 { TriposType::H } else { TriposType::C3 },
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
        }
    }

    pub fn test_bond(atom1: usize, atom2: usize, rotatable: bool) -> Bond {
        Bond {
            id: 0,
            atom1,
            atom2,
            order: 1,
            cyclic: false,
            rotatable,
        }
    }

    /// Four non-collinear carbons, no rotatable bonds.
    pub fn simple_rigid_model() -> Model {
        let atoms = vec![
            test_atom("C0", 6, Vec3::new(0.0, 0.0, 0.0)),
            test_atom("C1", 6, Vec3::new(1.5, 0.0, 0.0)),
            test_atom("C2", 6, Vec3::new(0.0, 1.5, 0.0)),
            test_atom("C3", 6, Vec3::new(0.0, 0.0, 1.5)),
        ];
        let bonds = vec![
            test_bond(0, 1, false),
            test_bond(0, 2, false),
            test_bond(0, 3, false),
        ];
        Model::new("rigid", atoms, bonds, ModelFlex::Rigid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(name: &str, atomic_no: u8, coords: Vec3) -> Atom {
        Atom {
            id: 0,
            name: name.to_string(),
            atomic_no,
            mass: if atomic_no == 1 { 1.008 } else { 12.011 },
            coords,
            vdw_radius: if atomic_no == 1 { 1.2 } else { 1.7 },
            formal_charge: 0,
            partial_charge: 0.0,
            group_charge: 0.0,
            hybridisation: Hybridisation::Sp3,
            tripos_type: if atomic_no == 1 { TriposType::H } else { TriposType::C3 },
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
        }
    }

    fn bond(atom1: usize, atom2: usize, rotatable: bool) -> Bond {
        Bond {
            id: 0,
            atom1,
            atom2,
            order: 1,
            cyclic: false,
            rotatable,
        }
    }

    /// Butane-like chain C0-C1-C2-C3 with a rotatable central bond.
    fn butane() -> Model {
        let atoms = vec![
            atom("C0", 6, Vec3::new(-1.0, 1.0, 0.0)),
            atom("C1", 6, Vec3::new(-1.0, 0.0, 0.0)),
            atom("C2", 6, Vec3::new(0.5, 0.0, 0.0)),
            atom("C3", 6, Vec3::new(0.5, 1.0, 0.0)),
        ];
        let bonds = vec![bond(0, 1, false), bond(1, 2, true), bond(2, 3, false)];
        Model::new("butane", atoms, bonds, ModelFlex::Rigid)
    }

    #[test]
    fn ids_are_one_based_and_dense() {
        let m = butane();
        assert_eq!(m.atoms[0].id, 1);
        assert_eq!(m.atoms[3].id, 4);
        assert_eq!(m.bonds[2].id, 3);
    }

    #[test]
    fn rotatable_bond_moves_far_side_only() {
        let m = butane();
        let rbs = m.rotatable_bonds().to_vec();
        assert_eq!(rbs.len(), 1);
        let rb = &rbs[0];
        assert_eq!(rb.pivot, 1);
        assert_eq!(rb.moving, 2);
        assert_eq!(rb.movable, vec![3]);
    }

    #[test]
    fn set_dihedral_round_trips() {
        let mut m = butane();
        let rb = m.rotatable_bonds()[0].clone();
        m.set_dihedral(&rb, 72.5);
        assert!((m.current_dihedral(&rb) - 72.5).abs() < 1e-9);
        m.set_dihedral(&rb, -110.0);
        assert!((m.current_dihedral(&rb) + 110.0).abs() < 1e-9);
    }

    #[test]
    fn rotation_preserves_bond_lengths() {
        let mut m = butane();
        let rb = m.rotatable_bonds()[0].clone();
        let before = m.atoms[2].coords.distance(m.atoms[3].coords);
        m.rotate_about_bond(&rb, 67.0);
        let after = m.atoms[2].coords.distance(m.atoms[3].coords);
        assert!((before - after).abs() < 1e-12);
        // Root fragment untouched
        assert_eq!(m.atoms[0].coords, Vec3::new(-1.0, 1.0, 0.0));
    }

    #[test]
    fn pseudo_atom_tracks_centroid() {
        let mut m = butane();
        let p = m.add_pseudo_atom(vec![0, 1]);
        assert_eq!(m.pseudo_atoms[p].coords, Vec3::new(-1.0, 0.5, 0.0));
        m.translate(Vec3::new(1.0, 0.0, 0.0));
        m.update_pseudo_atoms();
        assert_eq!(m.pseudo_atoms[p].coords, Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn pseudo_atom_dedupes_by_constituents() {
        let mut m = butane();
        let p1 = m.add_pseudo_atom(vec![1, 0]);
        let p2 = m.add_pseudo_atom(vec![0, 1]);
        assert_eq!(p1, p2);
        assert_eq!(m.pseudo_atoms.len(), 1);
    }

    #[test]
    fn occupancy_threshold_toggles_atoms() {
        let mut m = butane();
        m.set_occupancy(0.4);
        assert!(!m.enabled);
        assert!(m.atoms.iter().all(|a| !a.enabled));
        m.set_occupancy(0.9);
        assert!(m.enabled);
        assert!(m.atoms.iter().all(|a| a.enabled));
    }

    #[test]
    fn saved_coords_revert() {
        let mut m = butane();
        let snap = m.save_coords();
        m.translate(Vec3::new(5.0, 0.0, 0.0));
        m.revert_coords(snap).unwrap();
        assert_eq!(m.atoms[0].coords, Vec3::new(-1.0, 1.0, 0.0));
        assert!(m.revert_coords(99).is_err());
    }

    #[test]
    fn rigid_core_excludes_movable() {
        let m = butane();
        assert_eq!(m.rigid_core_atoms(), vec![0, 1, 2]);
    }

    #[test]
    fn canonical_frame_rotates_with_model() {
        let mut m = butane();
        let core = m.rigid_core_atoms();
        let f0 = m.canonical_frame(&core);
        let q = Quaternion::from_axis_angle(Vec3::new(0.3, 1.0, -0.2), 1.1);
        let com = m.centroid(&core);
        m.transform(&q, com, Vec3::zero());
        let f1 = m.canonical_frame(&core);
        let recovered = Quaternion::from_matrix(&f1.transpose().mul_mat(&f0));
        assert!(q.distance(recovered) < 1e-9);
    }

    #[test]
    fn remove_atom_keeps_ids_dense() {
        let mut m = butane();
        m.remove_atom(1).unwrap();
        assert_eq!(m.atoms.len(), 3);
        assert_eq!(m.atoms[2].id, 3);
        // Bonds touching the removed atom are gone; survivors reindexed
        assert_eq!(m.bonds.len(), 1);
        assert_eq!((m.bonds[0].atom1, m.bonds[0].atom2), (1, 2));
        assert_eq!(m.bonds[0].id, 1);
        assert!(m.remove_atom(10).is_err());
    }

    #[test]
    fn bonded_within_depth() {
        let m = butane();
        let d1 = m.bonded_within(0, 1);
        assert!(d1.contains(&1) && d1.len() == 1);
        let d2 = m.bonded_within(0, 2);
        assert!(d2.contains(&2) && d2.len() == 2);
    }
}
