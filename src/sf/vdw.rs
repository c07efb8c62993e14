//! Grid-indexed van-der-Waals scoring.
//!
//! Receptor atoms near the docking site are stamped onto a non-bonded grid;
//! each ligand (or solvent) atom then sees only the receptor atoms indexed in
//! its own cell. Intra-receptor flexible interactions and solvent-solvent
//! interactions are evaluated through explicit interaction maps that support
//! distance partitioning.

use std::cell::{Cell, RefCell};

use lazy_static::lazy_static;
use log::debug;

use crate::constants::FLEX_RECEPTOR_PAD;
use crate::error::Result;
use crate::grid::{GridDims, ListGrid};
use crate::model::{Model, TriposType, NUM_TRIPOS_TYPES};
use crate::params::{ScoreMap, Value};
use crate::request::SfRequest;
use crate::sf::{default_score_map, system_score_map, SfCore, SfNode, SlotCache};
use crate::site::DockingSite;

#[derive(Debug, Copy, Clone)]
pub struct VdwPairParams {
    pub rmin: f64,
    pub eps: f64,
}

// (rmin/2, well depth) per Tripos type, indexed by TriposType discriminant
const TYPE_PARAMS: [(f64, f64); NUM_TRIPOS_TYPES] = [
    (1.70, 0.100), // Undefined
    (1.20, 0.020), // H
    (1.20, 0.020), // HP
    (1.78, 0.100), // C1
    (1.72, 0.100), // C2
    (1.80, 0.107), // C3
    (1.81, 0.100), // Car
    (1.81, 0.100), // Ccat
    (1.69, 0.100), // N1
    (1.66, 0.100), // N2
    (1.65, 0.120), // N3
    (1.65, 0.160), // N4
    (1.66, 0.120), // Nam
    (1.66, 0.120), // Nar
    (1.66, 0.120), // Npl3
    (1.52, 0.160), // O2
    (1.55, 0.155), // O3
    (1.49, 0.200), // Oco2
    (1.95, 0.200), // S2
    (2.00, 0.200), // S3
    (1.85, 0.200), // P3
    (1.47, 0.080), // F
    (1.75, 0.240), // Cl
    (1.85, 0.300), // Br
    (2.00, 0.350), // I
    (1.20, 0.100), // Met
];

lazy_static! {
    /// Combined parameters for every Tripos type pair:
    /// rmin = r1 + r2, eps = sqrt(e1 * e2).
    static ref PAIR_TABLE: Vec<VdwPairParams> = {
        let mut table = Vec::with_capacity(NUM_TRIPOS_TYPES * NUM_TRIPOS_TYPES);
        for i in 0..NUM_TRIPOS_TYPES {
            for j in 0..NUM_TRIPOS_TYPES {
                table.push(VdwPairParams {
                    rmin: TYPE_PARAMS[i].0 + TYPE_PARAMS[j].0,
                    eps: (TYPE_PARAMS[i].1 * TYPE_PARAMS[j].1).sqrt(),
                });
            }
        }
        table
    };
}

pub fn pair_params(t1: TriposType, t2: TriposType) -> VdwPairParams {
    PAIR_TABLE[t1.index() * NUM_TRIPOS_TYPES + t2.index()]
}

/// 6-12 (or 4-8) pair potential with the repulsive core clamped at `ecut`.
pub fn pair_potential(r2: f64, p: VdwPairParams, ecut: f64, use_4_8: bool) -> f64 {
    if r2 <= 0.0 {
        return ecut;
    }
    let s2 = (p.rmin * p.rmin) / r2;
    let u = if use_4_8 {
        let s4 = s2 * s2;
        p.eps * (s4 * s4 - 2.0 * s4)
    } else {
        let s6 = s2 * s2 * s2;
        p.eps * (s6 * s6 - 2.0 * s6)
    };
    u.min(ecut)
}

/// Grid-indexed intermolecular vdW term, with optional flexible-receptor and
/// explicit-solvent contributions.
#[derive(Debug)]
pub struct VdwIdxSf {
    pub core: SfCore,
    slots: SlotCache,
    grid_step: f64,
    border: f64,
    ecut: f64,
    use_4_8: bool,
    attr_threshold: f64,
    rep_threshold: f64,
    lipo_annot: f64,
    annotate: bool,
    // Receptor index
    grid: Option<ListGrid<u32>>,
    rec_rigid: Vec<usize>,
    rec_flex: Vec<usize>,
    flex_rec: bool,
    /// Master and partitioned flexible interaction maps, keyed by atom id - 1.
    flex_intns: Vec<Vec<usize>>,
    flex_prt_intns: Vec<Vec<usize>>,
    // Ligand
    lig_atoms: Vec<usize>,
    // Solvent: (model index, atom index) pairs
    solvent_atoms: Vec<(usize, usize)>,
    /// Master and partitioned solvent-solvent maps, keyed by position in
    /// `solvent_atoms`.
    solvent_intns: Vec<Vec<usize>>,
    solvent_prt_intns: Vec<Vec<usize>>,
    n_attr: Cell<usize>,
    n_rep: Cell<usize>,
    annotations: RefCell<Vec<String>>,
}

impl VdwIdxSf {
    pub fn new(name: &str) -> VdwIdxSf {
        let mut core = SfCore::new(name);
        core.params.add("grid-step", 0.5);
        core.params.add("border", 1.0);
        core.params.add("ecut", 120.0);
        core.params.add("use-4-8", false);
        core.params.add("threshold-attr", -0.5);
        core.params.add("threshold-rep", 0.5);
        core.params.add("annotation-lipo", -0.1);
        core.params.add("annotate", false);
        VdwIdxSf {
            core,
            slots: SlotCache::default(),
            grid_step: 0.5,
            border: 1.0,
            ecut: 120.0,
            use_4_8: false,
            attr_threshold: -0.5,
            rep_threshold: 0.5,
            lipo_annot: -0.1,
            annotate: false,
            grid: None,
            rec_rigid: Vec::new(),
            rec_flex: Vec::new(),
            flex_rec: false,
            flex_intns: Vec::new(),
            flex_prt_intns: Vec::new(),
            lig_atoms: Vec::new(),
            solvent_atoms: Vec::new(),
            solvent_intns: Vec::new(),
            solvent_prt_intns: Vec::new(),
            n_attr: Cell::new(0),
            n_rep: Cell::new(0),
            annotations: RefCell::new(Vec::new()),
        }
    }

    pub fn into_node(self) -> SfNode {
        SfNode::Vdw(self)
    }

    /// Half the grid diagonal: the indexing tolerance between an atom and the
    /// nearest grid point.
    fn max_error(&self) -> f64 {
        0.5 * 3.0_f64.sqrt() * self.grid_step
    }

    fn corrected_range(&self) -> f64 {
        self.core.range + self.max_error() + self.border
    }

    pub fn update(&mut self, models: &mut [Model], site: Option<&DockingSite>) {
        let changes = self.slots.diff_and_update(models);
        if changes.receptor {
            self.setup_receptor(models, site);
        }
        if changes.ligand {
            self.setup_ligand(models);
        }
        if changes.solvent {
            self.setup_solvent(models);
        }
    }

    fn setup_receptor(&mut self, models: &[Model], site: Option<&DockingSite>) {
        self.grid = None;
        self.rec_rigid.clear();
        self.rec_flex.clear();
        self.flex_rec = false;
        self.flex_intns.clear();
        self.flex_prt_intns.clear();
        let receptor = match models.first() {
            Some(m) if !m.is_empty() => m,
            _ => return,
        };
        let site = match site {
            Some(s) => s,
            None => return,
        };
        if receptor.num_saved_coords() > 1 {
            log::warn!(
                "{}: multi-conformation receptors are not supported; indexing current coords only",
                self.core.name()
            );
        }
        // Only receptor atoms within interaction reach of the cavity matter
        let in_range = site.atoms_in_range(&receptor.atoms, 0.0, self.corrected_range());
        let heavy: Vec<usize> = in_range
            .into_iter()
            .filter(|&i| !receptor.atoms[i].is_hydrogen())
            .collect();

        let dims = GridDims::covering(site.min_coord(), site.max_coord(), self.border, self.grid_step);
        let mut grid: ListGrid<u32> = ListGrid::new(dims);

        self.flex_rec = receptor.is_flexible();
        if self.flex_rec {
            for &i in &heavy {
                if receptor.movable_signature(i).is_empty() {
                    self.rec_rigid.push(i);
                } else {
                    self.rec_flex.push(i);
                }
            }
            // Movable hydrogens (OH/NH3 protons) also score against the rest
            // of the receptor even though they are not indexed on the grid
            for (i, atom) in receptor.atoms.iter().enumerate() {
                if atom.is_hydrogen() && !receptor.movable_signature(i).is_empty() {
                    self.rec_flex.push(i);
                }
            }
            self.build_flex_intra_map(receptor);
            self.partition_flex(models, 0.0);
        } else {
            self.rec_rigid = heavy;
        }

        let idx_range = self.core.range + self.max_error();
        for &i in &self.rec_rigid {
            let atom = &receptor.atoms[i];
            grid.insert_sphere(atom.coords, atom.vdw_radius + idx_range, i as u32);
        }
        for &i in &self.rec_flex {
            let atom = &receptor.atoms[i];
            // Flexible protons stay off the grid; they only contribute
            // through the intra map
            if atom.is_hydrogen() {
                continue;
            }
            grid.insert_sphere(
                atom.coords,
                atom.vdw_radius + idx_range + FLEX_RECEPTOR_PAD,
                i as u32,
            );
        }
        grid.unique_lists();
        debug!(
            "{}: indexed {} rigid + {} flexible receptor atoms",
            self.core.name(),
            self.rec_rigid.len(),
            self.rec_flex.len()
        );
        self.grid = Some(grid);
    }

    /// Flexible-receptor interactions: flexible-flexible pairs at variable
    /// distance plus flexible-rigid pairs, keyed by the first atom's id.
    /// 1-2 and 1-3 bonded pairs are excluded.
    fn build_flex_intra_map(&mut self, receptor: &Model) {
        let n = receptor.num_atoms();
        self.flex_intns = vec![Vec::new(); n];
        self.flex_prt_intns = vec![Vec::new(); n];
        for (fi, &i) in self.rec_flex.iter().enumerate() {
            let excluded = receptor.bonded_within(i, 2);
            let sig_i = receptor.movable_signature(i);
            let key = receptor.atoms[i].id - 1;
            // flexible-flexible, stored once under the lower list position
            for &j in self.rec_flex.iter().skip(fi + 1) {
                if excluded.contains(&j) {
                    continue;
                }
                if receptor.movable_signature(j) == sig_i {
                    // Same movable set: distance cannot vary
                    continue;
                }
                self.flex_intns[key].push(j);
            }
            // flexible-rigid
            for &j in &self.rec_rigid {
                if !excluded.contains(&j) {
                    self.flex_intns[key].push(j);
                }
            }
        }
    }

    fn setup_ligand(&mut self, models: &[Model]) {
        self.lig_atoms.clear();
        if let Some(lig) = models.get(1) {
            self.lig_atoms = (0..lig.num_atoms()).collect();
        }
    }

    fn setup_solvent(&mut self, models: &[Model]) {
        self.solvent_atoms.clear();
        self.solvent_intns.clear();
        self.solvent_prt_intns.clear();
        for (mi, model) in models.iter().enumerate().skip(2) {
            for ai in 0..model.num_atoms() {
                self.solvent_atoms.push((mi, ai));
            }
        }
        let n = self.solvent_atoms.len();
        self.solvent_intns = vec![Vec::new(); n];
        self.solvent_prt_intns = vec![Vec::new(); n];
        for k in 0..n {
            let (mk, _) = self.solvent_atoms[k];
            for j in (k + 1)..n {
                // Atoms of one rigid solvent model stay at fixed distance
                if self.solvent_atoms[j].0 != mk {
                    self.solvent_intns[k].push(j);
                }
            }
        }
        self.solvent_prt_intns = self.solvent_intns.clone();
    }

    pub fn handle_partition(&mut self, req: &SfRequest, models: &[Model], full: &str) {
        if let SfRequest::Partition { name, dist } = req {
            let applies = match name {
                Some(n) => n == full,
                None => true,
            };
            if applies {
                self.partition_flex(models, *dist);
                self.partition_solvent(models, *dist);
            }
        }
    }

    fn partition_flex(&mut self, models: &[Model], dist: f64) {
        let receptor = match models.first() {
            Some(m) if !m.is_empty() => m,
            _ => return,
        };
        let d2 = dist * dist;
        for &i in &self.rec_flex {
            let key = receptor.atoms[i].id - 1;
            if key >= self.flex_intns.len() {
                continue;
            }
            if dist > 0.0 {
                let ci = receptor.atoms[i].coords;
                self.flex_prt_intns[key] = self.flex_intns[key]
                    .iter()
                    .copied()
                    .filter(|&j| receptor.atoms[j].coords.distance2(ci) < d2)
                    .collect();
            } else {
                self.flex_prt_intns[key] = self.flex_intns[key].clone();
            }
        }
    }

    fn partition_solvent(&mut self, models: &[Model], dist: f64) {
        let d2 = dist * dist;
        for k in 0..self.solvent_atoms.len() {
            if dist > 0.0 {
                let (mk, ak) = self.solvent_atoms[k];
                let ck = models[mk].atoms[ak].coords;
                self.solvent_prt_intns[k] = self.solvent_intns[k]
                    .iter()
                    .copied()
                    .filter(|&j| {
                        let (mj, aj) = self.solvent_atoms[j];
                        models[mj].atoms[aj].coords.distance2(ck) < d2
                    })
                    .collect();
            } else {
                self.solvent_prt_intns[k] = self.solvent_intns[k].clone();
            }
        }
    }

    /// Ligand vs indexed receptor, with per-atom attractive/repulsive
    /// bookkeeping and optional lipophilic pair annotation.
    fn inter_score(&self, models: &[Model]) -> f64 {
        let mut score = 0.0;
        self.n_attr.set(0);
        self.n_rep.set(0);
        if self.annotate {
            self.annotations.borrow_mut().clear();
        }
        let (grid, receptor, ligand) = match (&self.grid, models.first(), models.get(1)) {
            (Some(g), Some(r), Some(l)) if !l.is_empty() => (g, r, l),
            _ => return score,
        };
        let range2 = self.core.range * self.core.range;
        for &li in &self.lig_atoms {
            let lig_atom = &ligand.atoms[li];
            if !lig_atom.enabled {
                continue;
            }
            let mut s = 0.0;
            for &ri in grid.cell_at(lig_atom.coords) {
                let rec_atom = &receptor.atoms[ri as usize];
                if !rec_atom.enabled {
                    continue;
                }
                let r2 = lig_atom.coords.distance2(rec_atom.coords);
                if r2 > range2 {
                    continue;
                }
                let p = pair_params(lig_atom.tripos_type, rec_atom.tripos_type);
                let u = pair_potential(r2, p, self.ecut, self.use_4_8);
                if self.annotate
                    && lig_atom.user1_flag
                    && rec_atom.user1_flag
                    && u < self.lipo_annot
                {
                    self.annotations.borrow_mut().push(format!(
                        "{},{},{:.2},{:.3}",
                        lig_atom.id,
                        rec_atom.id,
                        r2.sqrt(),
                        u
                    ));
                }
                s += u;
            }
            if s < self.attr_threshold {
                self.n_attr.set(self.n_attr.get() + 1);
            } else if s > self.rep_threshold {
                self.n_rep.set(self.n_rep.get() + 1);
            }
            score += s;
        }
        score + self.ligand_solvent_score(models)
    }

    fn ligand_solvent_score(&self, models: &[Model]) -> f64 {
        let ligand = match models.get(1) {
            Some(l) if !l.is_empty() => l,
            _ => return 0.0,
        };
        let range2 = self.core.range * self.core.range;
        let mut score = 0.0;
        for &(mi, ai) in &self.solvent_atoms {
            let sol_atom = &models[mi].atoms[ai];
            if !sol_atom.enabled || !models[mi].enabled {
                continue;
            }
            for &li in &self.lig_atoms {
                let lig_atom = &ligand.atoms[li];
                if !lig_atom.enabled {
                    continue;
                }
                let r2 = lig_atom.coords.distance2(sol_atom.coords);
                if r2 > range2 {
                    continue;
                }
                let p = pair_params(lig_atom.tripos_type, sol_atom.tripos_type);
                score += pair_potential(r2, p, self.ecut, self.use_4_8);
            }
        }
        score
    }

    /// Intra-receptor flexible interactions through the partitioned map.
    fn receptor_score(&self, models: &[Model]) -> f64 {
        if !self.flex_rec {
            return 0.0;
        }
        let receptor = match models.first() {
            Some(m) if !m.is_empty() => m,
            _ => return 0.0,
        };
        let range2 = self.core.range * self.core.range;
        let mut score = 0.0;
        for &i in &self.rec_flex {
            let key = receptor.atoms[i].id - 1;
            let ci = receptor.atoms[i].coords;
            let ti = receptor.atoms[i].tripos_type;
            for &j in &self.flex_prt_intns[key] {
                let r2 = ci.distance2(receptor.atoms[j].coords);
                if r2 > range2 {
                    continue;
                }
                let p = pair_params(ti, receptor.atoms[j].tripos_type);
                score += pair_potential(r2, p, self.ecut, self.use_4_8);
            }
        }
        score
    }

    /// Solvent-solvent interactions, honouring each model's enabled flag.
    fn solvent_score(&self, models: &[Model]) -> f64 {
        let range2 = self.core.range * self.core.range;
        let mut score = 0.0;
        for (k, &(mk, ak)) in self.solvent_atoms.iter().enumerate() {
            if !models[mk].enabled {
                continue;
            }
            let atom_k = &models[mk].atoms[ak];
            if !atom_k.enabled {
                continue;
            }
            for &j in &self.solvent_prt_intns[k] {
                let (mj, aj) = self.solvent_atoms[j];
                if !models[mj].enabled {
                    continue;
                }
                let atom_j = &models[mj].atoms[aj];
                if !atom_j.enabled {
                    continue;
                }
                let r2 = atom_k.coords.distance2(atom_j.coords);
                if r2 > range2 {
                    continue;
                }
                let p = pair_params(atom_k.tripos_type, atom_j.tripos_type);
                score += pair_potential(r2, p, self.ecut, self.use_4_8);
            }
        }
        score
    }

    /// Solvent vs indexed receptor.
    fn receptor_solvent_score(&self, models: &[Model]) -> f64 {
        let (grid, receptor) = match (&self.grid, models.first()) {
            (Some(g), Some(r)) if !r.is_empty() => (g, r),
            _ => return 0.0,
        };
        let range2 = self.core.range * self.core.range;
        let mut score = 0.0;
        for &(mi, ai) in &self.solvent_atoms {
            if !models[mi].enabled {
                continue;
            }
            let sol_atom = &models[mi].atoms[ai];
            if !sol_atom.enabled {
                continue;
            }
            for &ri in grid.cell_at(sol_atom.coords) {
                let rec_atom = &receptor.atoms[ri as usize];
                let r2 = sol_atom.coords.distance2(rec_atom.coords);
                if r2 > range2 {
                    continue;
                }
                let p = pair_params(sol_atom.tripos_type, rec_atom.tripos_type);
                score += pair_potential(r2, p, self.ecut, self.use_4_8);
            }
        }
        score
    }

    pub fn raw_score(&self, models: &[Model]) -> f64 {
        self.inter_score(models)
            + self.receptor_score(models)
            + self.solvent_score(models)
            + self.receptor_solvent_score(models)
    }

    /// Inter contributions go under the natural full name; intra-receptor,
    /// solvent-solvent and receptor-solvent totals are system energies and
    /// are diverted to the `score.system` branch.
    pub fn score_map(&self, prefix: &str, models: &[Model], map: &mut ScoreMap) {
        let inter = self.inter_score(models);
        default_score_map(&self.core, prefix, inter, map);
        let full = self.core.full_name(prefix);
        map.insert(format!("{}.nattr", full), Value::Int(self.n_attr.get() as i64));
        map.insert(format!("{}.nrep", full), Value::Int(self.n_rep.get() as i64));
        if self.annotate {
            map.insert(
                format!("{}.annotations", full),
                Value::StrList(self.annotations.borrow().clone()),
            );
        }
        let system = self.receptor_score(models)
            + self.solvent_score(models)
            + self.receptor_solvent_score(models);
        system_score_map(&self.core, system, map);
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        match name {
            "grid-step" | "border" | "ecut" | "use-4-8" | "threshold-attr" | "threshold-rep"
            | "annotation-lipo" | "annotate" => {
                self.core.params.set(name, value.clone())?;
                match name {
                    "grid-step" => self.grid_step = self.core.params.get_f64(name),
                    "border" => self.border = self.core.params.get_f64(name),
                    "ecut" => self.ecut = self.core.params.get_f64(name),
                    "use-4-8" => self.use_4_8 = self.core.params.get_bool(name),
                    "threshold-attr" => self.attr_threshold = self.core.params.get_f64(name),
                    "threshold-rep" => self.rep_threshold = self.core.params.get_f64(name),
                    "annotation-lipo" => self.lipo_annot = self.core.params.get_f64(name),
                    "annotate" => self.annotate = self.core.params.get_bool(name),
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

    #[test]
    fn potential_minimum_at_rmin() {
        let p = pair_params(TriposType::C3, TriposType::C3);
        let at_min = pair_potential(p.rmin * p.rmin, p, 120.0, false);
        assert!((at_min + p.eps).abs() < 1e-12);
        // Slightly off the minimum is higher
        let off = pair_potential((p.rmin * 1.1).powi(2), p, 120.0, false);
        assert!(off > at_min);
    }

    #[test]
    fn repulsive_core_is_clamped() {
        let p = pair_params(TriposType::C3, TriposType::C3);
        let u = pair_potential(0.25, p, 1.0, false);
        assert_eq!(u, 1.0);
    }

    #[test]
    fn pair_params_are_symmetric() {
        let a = pair_params(TriposType::C3, TriposType::O3);
        let b = pair_params(TriposType::O3, TriposType::C3);
        assert_eq!(a.rmin, b.rmin);
        assert_eq!(a.eps, b.eps);
    }

    #[test]
    fn four_eight_is_softer_at_short_range() {
        let p = pair_params(TriposType::C3, TriposType::C3);
        let r2 = (0.8 * p.rmin).powi(2);
        let u612 = pair_potential(r2, p, 1e9, false);
        let u48 = pair_potential(r2, p, 1e9, true);
        assert!(u48 < u612);
    }
}
