//! Polar (H-bond / ionic) scoring with explicit directional geometry.
//!
//! Donors and acceptors are represented as interaction centres of one to
//! three atoms, optionally tagged with lone-pair geometry. The pair score is
//! a product of trapezoidal envelopes over the donor-acceptor distance, the
//! donor angle, and the acceptor angle / plane / lone-pair decomposition,
//! weighted by each atom's cached local-density x charge factor.

use std::cell::Cell;

use log::debug;

use crate::constants::FLEX_RECEPTOR_PAD;
use crate::error::Result;
use crate::geometry::{angle_deg, distance_from_point_to_plane, Plane, Vec3};
use crate::grid::{GridDims, ListGrid};
use crate::model::Model;
use crate::params::{accumulate, ScoreMap, Value};
use crate::request::SfRequest;
use crate::sf::{default_score_map, SfCore, SfNode, SlotCache, SYSTEM_SF};
use crate::site::DockingSite;

/// Trapezoidal envelope: 1 up to `dmin`, linear falloff to 0 at `dmax`.
/// `r0` is the centre of the envelope, subtracted by the caller.
#[derive(Debug, Copy, Clone)]
pub struct F1Params {
    pub r0: f64,
    pub dmin: f64,
    pub dmax: f64,
}

impl F1Params {
    pub fn new(r0: f64, dmin: f64, dmax: f64) -> F1Params {
        F1Params { r0, dmin, dmax }
    }
}

pub fn f1(delta: f64, p: &F1Params) -> f64 {
    if delta >= p.dmax {
        0.0
    } else if delta > p.dmin {
        1.0 - (delta - p.dmin) / (p.dmax - p.dmin)
    } else {
        1.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LonePairType {
    None,
    Plane,
    LonePair,
}

/// Reference to a real or pseudo atom within one model.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AtomAddr {
    Real(usize),
    Pseudo(usize),
}

fn addr_coords(model: &Model, addr: AtomAddr) -> Vec3 {
    match addr {
        AtomAddr::Real(i) => model.atoms[i].coords,
        AtomAddr::Pseudo(i) => model.pseudo_atoms[i].coords,
    }
}

/// One to three atoms representing a directional site. `atom1` is the
/// indexing point and is always a real atom; `atom2`/`atom3` define the
/// direction or plane and may be pseudo-atoms.
#[derive(Debug, Clone)]
pub struct InteractionCentre {
    pub model: usize,
    pub atom1: usize,
    pub atom2: Option<AtomAddr>,
    pub atom3: Option<AtomAddr>,
    pub lp: LonePairType,
}

impl InteractionCentre {
    pub fn single(model: usize, atom1: usize) -> InteractionCentre {
        InteractionCentre {
            model,
            atom1,
            atom2: None,
            atom3: None,
            lp: LonePairType::None,
        }
    }

    pub fn pair(model: usize, atom1: usize, atom2: AtomAddr) -> InteractionCentre {
        InteractionCentre {
            model,
            atom1,
            atom2: Some(atom2),
            atom3: None,
            lp: LonePairType::None,
        }
    }

    pub fn triple(
        model: usize,
        atom1: usize,
        atom2: AtomAddr,
        atom3: AtomAddr,
        lp: LonePairType,
    ) -> InteractionCentre {
        InteractionCentre {
            model,
            atom1,
            atom2: Some(atom2),
            atom3: Some(atom3),
            lp,
        }
    }

    fn push_constituents(&self, model: &Model, addr: AtomAddr, out: &mut Vec<usize>) {
        match addr {
            AtomAddr::Real(i) => out.push(i),
            AtomAddr::Pseudo(i) => out.extend_from_slice(&model.pseudo_atoms[i].atoms),
        }
    }

    /// Constituent real atoms; pseudo-atoms are deconvoluted into their
    /// constituent lists.
    pub fn atom_list(&self, models: &[Model]) -> Vec<usize> {
        let model = &models[self.model];
        let mut out = vec![self.atom1];
        if let Some(a2) = self.atom2 {
            self.push_constituents(model, a2, &mut out);
        }
        if let Some(a3) = self.atom3 {
            self.push_constituents(model, a3, &mut out);
        }
        out
    }

    /// A centre is selected iff any constituent atom is selected.
    pub fn is_selected(&self, models: &[Model]) -> bool {
        let model = &models[self.model];
        self.atom_list(models).iter().any(|&i| model.atoms[i].selected)
    }
}

/// Polar envelope parameters shared by the indexed term.
#[derive(Debug, Clone)]
pub struct PolarPrms {
    pub r12_factor: f64,
    pub r12_incr: f64,
    pub dr12_min: f64,
    pub dr12_max: f64,
    pub a1: f64,
    pub da1_min: f64,
    pub da1_max: f64,
    pub a2: f64,
    pub da2_min: f64,
    pub da2_max: f64,
    pub abs_dr12: bool,
    pub inc_metal: bool,
    pub inc_hbd: bool,
    pub inc_hba: bool,
    pub inc_guan: bool,
    pub guan_plane: bool,
    pub lp_osp2: bool,
    pub lp_phi: f64,
    pub lp_dphi_min: f64,
    pub lp_dphi_max: f64,
    pub lp_dtheta_min: f64,
    pub lp_dtheta_max: f64,
}

impl Default for PolarPrms {
    fn default() -> PolarPrms {
        PolarPrms {
            r12_factor: 1.0,
            r12_incr: 0.6,
            dr12_min: 0.25,
            dr12_max: 0.6,
            a1: 180.0,
            da1_min: 30.0,
            da1_max: 80.0,
            a2: 150.0,
            da2_min: 30.0,
            da2_max: 70.0,
            abs_dr12: true,
            inc_metal: true,
            inc_hbd: true,
            inc_hba: true,
            inc_guan: true,
            guan_plane: true,
            lp_osp2: false,
            lp_phi: 45.0,
            lp_dphi_min: 15.0,
            lp_dphi_max: 30.0,
            lp_dtheta_min: 20.0,
            lp_dtheta_max: 60.0,
        }
    }
}

impl PolarPrms {
    pub fn rprms(&self) -> F1Params {
        F1Params::new(0.0, self.dr12_min, self.dr12_max)
    }

    pub fn a1prms(&self) -> F1Params {
        F1Params::new(self.a1, self.da1_min, self.da1_max)
    }

    pub fn a2prms(&self) -> F1Params {
        F1Params::new(self.a2, self.da2_min, self.da2_max)
    }

    fn phi_lp_prms(&self) -> F1Params {
        F1Params::new(self.lp_phi, self.lp_dphi_min, self.lp_dphi_max)
    }

    fn phi_plane_prms(&self) -> F1Params {
        F1Params::new(0.0, self.lp_phi + self.lp_dphi_min, self.lp_phi + self.lp_dphi_max)
    }

    fn theta_prms(&self) -> F1Params {
        F1Params::new(0.0, self.lp_dtheta_min, self.lp_dtheta_max)
    }
}

fn first_neighbour(model: &Model, atom: usize) -> Option<usize> {
    let mut best: Option<usize> = None;
    for bond in &model.bonds {
        let other = if bond.atom1 == atom {
            bond.atom2
        } else if bond.atom2 == atom {
            bond.atom1
        } else {
            continue;
        };
        best = Some(match best {
            Some(b) if b <= other => b,
            _ => other,
        });
    }
    best
}

fn neighbours(model: &Model, atom: usize) -> Vec<usize> {
    let mut out = Vec::new();
    for bond in &model.bonds {
        if bond.atom1 == atom {
            out.push(bond.atom2);
        } else if bond.atom2 == atom {
            out.push(bond.atom1);
        }
    }
    out.sort_unstable();
    out
}

/// Positive interaction centres: donor hydrogens with their heavy parent,
/// metals, and guanidinium carbons (with a plane when scoring attractive
/// interactions).
pub fn create_donor_centres(model_idx: usize, model: &Model, prms: &PolarPrms) -> Vec<InteractionCentre> {
    let mut out = Vec::new();
    if prms.inc_hbd {
        for (i, atom) in model.atoms.iter().enumerate() {
            if !atom.hbond_donor {
                continue;
            }
            match first_neighbour(model, i) {
                Some(parent) => {
                    out.push(InteractionCentre::pair(model_idx, i, AtomAddr::Real(parent)))
                }
                None => out.push(InteractionCentre::single(model_idx, i)),
            }
        }
    }
    if prms.inc_metal {
        for (i, atom) in model.atoms.iter().enumerate() {
            if atom.metal {
                out.push(InteractionCentre::single(model_idx, i));
            }
        }
    }
    if prms.inc_guan {
        for (i, atom) in model.atoms.iter().enumerate() {
            if !atom.guanidinium_carbon {
                continue;
            }
            let parents = neighbours(model, i);
            // Attractive interactions depend on the angle to the guanidinium
            // plane normal; repulsive ones only on distance
            if prms.guan_plane && parents.len() >= 2 {
                out.push(InteractionCentre::triple(
                    model_idx,
                    i,
                    AtomAddr::Real(parents[0]),
                    AtomAddr::Real(parents[1]),
                    LonePairType::None,
                ));
            } else {
                out.push(InteractionCentre::single(model_idx, i));
            }
        }
    }
    out
}

/// Negative interaction centres: acceptors with their parent direction.
/// Terminal sp2 oxygens gain a grandparent atom and a PLANE or LONEPAIR tag;
/// multiply-connected acceptors get a pseudo-atom centroid as the parent.
pub fn create_acceptor_centres(
    model_idx: usize,
    model: &mut Model,
    prms: &PolarPrms,
) -> Vec<InteractionCentre> {
    let mut out = Vec::new();
    if !prms.inc_hba {
        return out;
    }
    for i in 0..model.atoms.len() {
        if !model.atoms[i].hbond_acceptor {
            continue;
        }
        let parents = neighbours(model, i);
        match parents.len() {
            // Unconnected acceptor (isolated ion): distance-only centre
            0 => out.push(InteractionCentre::single(model_idx, i)),
            1 => {
                let parent = parents[0];
                let atom = &model.atoms[i];
                let parent_is_c = model.atoms[parent].atomic_no == 6;
                let parent_is_n = model.atoms[parent].atomic_no == 7;
                if prms.lp_osp2 && atom.atomic_no == 8 && (parent_is_c || parent_is_n) {
                    let grandparents: Vec<usize> =
                        neighbours(model, parent).into_iter().filter(|&g| g != i).collect();
                    if let Some(&gp) = grandparents.first() {
                        // Anionic O (carboxylate), RNA O, and O=N get the
                        // narrow lone-pair geometry; other sp2 O the broader
                        // in-plane envelope
                        let lp = if model.atoms[i].anionic || model.atoms[i].rna || parent_is_n {
                            LonePairType::LonePair
                        } else {
                            LonePairType::Plane
                        };
                        out.push(InteractionCentre::triple(
                            model_idx,
                            i,
                            AtomAddr::Real(parent),
                            AtomAddr::Real(gp),
                            lp,
                        ));
                    } else {
                        out.push(InteractionCentre::pair(model_idx, i, AtomAddr::Real(parent)));
                    }
                } else {
                    out.push(InteractionCentre::pair(model_idx, i, AtomAddr::Real(parent)));
                }
            }
            _ => {
                let pseudo = model.add_pseudo_atom(parents);
                out.push(InteractionCentre::pair(model_idx, i, AtomAddr::Pseudo(pseudo)));
            }
        }
    }
    out
}

/// True if the distance between any pair of constituent atoms can vary.
fn variable_distance(models: &[Model], ic1: &InteractionCentre, ic2: &InteractionCentre) -> bool {
    if ic1.model != ic2.model {
        return true;
    }
    let model = &models[ic1.model];
    let atoms1 = ic1.atom_list(models);
    let atoms2 = ic2.atom_list(models);
    for &a in &atoms1 {
        let sig_a = model.movable_signature(a);
        for &b in &atoms2 {
            if model.movable_signature(b) != sig_a {
                return true;
            }
        }
    }
    false
}

/// Scores one centre against a list of partner centres. The caller supplies
/// the distance envelope and the angular envelopes for each side; the result
/// is the sum of `user1(partner) * f` over partners, to be scaled by
/// `user1(centre)` by the caller.
#[allow(clippy::too_many_lines)]
pub fn polar_score<'a>(
    models: &[Model],
    ic1: &InteractionCentre,
    partners: impl Iterator<Item = &'a InteractionCentre>,
    rprms: &F1Params,
    a1prms: &F1Params,
    a2prms: &F1Params,
    prms: &PolarPrms,
) -> f64 {
    let mut s = 0.0;
    let model1 = &models[ic1.model];
    let atom1_1 = &model1.atoms[ic1.atom1];
    if !atom1_1.enabled || !model1.enabled {
        return s;
    }
    let c1_1 = atom1_1.coords;
    let b_angle1 = ic1.atom2.is_some() && ic1.atom3.is_none();
    let b_plane1 = ic1.atom2.is_some() && ic1.atom3.is_some() && ic1.lp == LonePairType::None;
    let b_lp1 = ic1.atom2.is_some() && ic1.atom3.is_some() && ic1.lp != LonePairType::None;
    let phi1prms = if ic1.lp == LonePairType::LonePair {
        prms.phi_lp_prms()
    } else {
        prms.phi_plane_prms()
    };
    let theta_prms = prms.theta_prms();
    let c1_2 = ic1.atom2.map(|a| addr_coords(model1, a)).unwrap_or_default();
    let c1_3 = ic1.atom3.map(|a| addr_coords(model1, a)).unwrap_or_default();
    let pl1 = if b_plane1 || b_lp1 {
        Some(Plane::from_points(c1_1, c1_2, c1_3))
    } else {
        None
    };
    let radius1 = atom1_1.vdw_radius;

    for ic2 in partners {
        let model2 = &models[ic2.model];
        let atom2_1 = &model2.atoms[ic2.atom1];
        if !atom2_1.enabled || !model2.enabled {
            continue;
        }
        let c2_1 = atom2_1.coords;
        let b_angle2 = ic2.atom2.is_some() && ic2.atom3.is_none();
        let b_plane2 = ic2.atom2.is_some() && ic2.atom3.is_some() && ic2.lp == LonePairType::None;
        let b_lp2 = ic2.atom2.is_some() && ic2.atom3.is_some() && ic2.lp != LonePairType::None;
        let radius2 = atom2_1.vdw_radius;
        let r12 = prms.r12_factor * (radius1 + radius2) + prms.r12_incr;
        let v12 = c1_1 - c2_1;
        let r = v12.length();
        let dr = r - r12;
        let mut f = if prms.abs_dr12 {
            f1(dr.abs(), rprms)
        } else {
            f1(dr, rprms)
        };
        if f <= 0.0 {
            continue;
        }
        // Side 1 angular dependence. A guanidinium plane on side 2 facing a
        // lone-pair oxygen on side 1 keeps the plain angular form.
        if b_angle1 || (b_plane2 && b_lp1) {
            let da1 = angle_deg(c1_2, c1_1, c2_1) - a1prms.r0;
            f *= f1(da1.abs(), a1prms);
        } else if b_plane1 {
            let pl = pl1.as_ref().unwrap();
            let a = (-(v12.unit().dot(pl.normal())).abs()).acos().to_degrees();
            let da1 = a - a1prms.r0;
            f *= f1(da1.abs(), a1prms);
        } else if b_lp1 {
            let pl = pl1.as_ref().unwrap();
            // Decompose the acceptor->donor vector into the out-of-plane
            // angle theta and the in-plane angle phi to the lone pair
            let d_perp = distance_from_point_to_plane(c2_1, pl);
            let c_perp = c2_1 - pl.normal() * d_perp;
            let theta = (d_perp / r).clamp(-1.0, 1.0).asin().to_degrees();
            f *= f1(theta.abs(), &theta_prms);
            if f > 0.0 {
                let phi = 180.0 - angle_deg(c_perp, c1_1, c1_2);
                let dphi = phi - phi1prms.r0;
                f *= f1(dphi.abs(), &phi1prms);
            }
        }
        if f <= 0.0 {
            continue;
        }
        // Side 2 angular dependence
        if b_angle2 || (b_plane1 && b_lp2) {
            let c2_2 = addr_coords(model2, ic2.atom2.unwrap());
            let da2 = angle_deg(c1_1, c2_1, c2_2) - a2prms.r0;
            f *= f1(da2.abs(), a2prms);
        } else if b_plane2 {
            let c2_2 = addr_coords(model2, ic2.atom2.unwrap());
            let c2_3 = addr_coords(model2, ic2.atom3.unwrap());
            let pl2 = Plane::from_points(c2_1, c2_2, c2_3);
            let a = (-(v12.unit().dot(pl2.normal())).abs()).acos().to_degrees();
            let da2 = a - a2prms.r0;
            f *= f1(da2.abs(), a2prms);
        } else if b_lp2 {
            let c2_2 = addr_coords(model2, ic2.atom2.unwrap());
            let c2_3 = addr_coords(model2, ic2.atom3.unwrap());
            let phi2prms = if ic2.lp == LonePairType::LonePair {
                prms.phi_lp_prms()
            } else {
                prms.phi_plane_prms()
            };
            let pl2 = Plane::from_points(c2_1, c2_2, c2_3);
            let d_perp = distance_from_point_to_plane(c1_1, &pl2);
            let c_perp = c1_1 - pl2.normal() * d_perp;
            let theta = (d_perp / r).clamp(-1.0, 1.0).asin().to_degrees();
            f *= f1(theta.abs(), &theta_prms);
            if f > 0.0 {
                let phi = 180.0 - angle_deg(c_perp, c2_1, c2_2);
                let dphi = phi - phi2prms.r0;
                f *= f1(dphi.abs(), &phi2prms);
            }
        }
        if f > 0.0 {
            s += atom2_1.user1 * f;
        }
    }
    s
}

/// Grid-indexed polar term. Receptor donor/acceptor centres are stamped onto
/// separate positive and negative grids; ligand and solvent centres look up
/// their cell lists. Four sub-totals are accumulated: intra-receptor,
/// intra-solvent, receptor-solvent (system energies) and the ligand inter
/// energy.
#[derive(Debug)]
pub struct PolarIdxSf {
    pub core: SfCore,
    slots: SlotCache,
    prms: PolarPrms,
    grid_step: f64,
    border: f64,
    /// Attractive (donor-acceptor) or repulsive (donor-donor,
    /// acceptor-acceptor) mode.
    attr: bool,
    idx_incr: f64,
    pos_threshold: f64,
    neg_threshold: f64,
    pos_grid: Option<ListGrid<u32>>,
    neg_grid: Option<ListGrid<u32>>,
    rec_centres: Vec<InteractionCentre>,
    rec_pos: Vec<usize>,
    rec_neg: Vec<usize>,
    flex_pos: Vec<usize>,
    flex_neg: Vec<usize>,
    flex_rec: bool,
    /// Keyed by atom1 id - 1; values are indices into `rec_centres`.
    flex_intns: Vec<Vec<usize>>,
    flex_prt_intns: Vec<Vec<usize>>,
    lig_centres: Vec<InteractionCentre>,
    lig_pos: Vec<usize>,
    lig_neg: Vec<usize>,
    sol_centres: Vec<InteractionCentre>,
    sol_pos: Vec<usize>,
    sol_neg: Vec<usize>,
    /// Keyed by centre position in `sol_centres` (solvent atom ids collide
    /// across models).
    sol_intns: Vec<Vec<usize>>,
    n_pos: Cell<usize>,
    n_neg: Cell<usize>,
}

impl PolarIdxSf {
    pub fn new(name: &str) -> PolarIdxSf {
        let mut core = SfCore::new(name);
        core.params.add("grid-step", 0.5);
        core.params.add("border", 1.0);
        core.params.add("incr", 2.4);
        core.params.add("attr", true);
        core.params.add("threshold-pos", 0.25);
        core.params.add("threshold-neg", 0.25);
        core.params.add("r12-factor", 1.0);
        core.params.add("r12-incr", 0.6);
        core.params.add("dr12-min", 0.25);
        core.params.add("dr12-max", 0.6);
        core.params.add("a1", 180.0);
        core.params.add("da1-min", 30.0);
        core.params.add("da1-max", 80.0);
        core.params.add("a2", 150.0);
        core.params.add("da2-min", 30.0);
        core.params.add("da2-max", 70.0);
        core.params.add("abs-dr12", true);
        core.params.add("inc-metal", true);
        core.params.add("inc-hbd", true);
        core.params.add("inc-hba", true);
        core.params.add("inc-guan", true);
        core.params.add("guan-plane", true);
        core.params.add("lp-osp2", false);
        core.params.add("lp-phi", 45.0);
        core.params.add("lp-dphi-min", 15.0);
        core.params.add("lp-dphi-max", 30.0);
        core.params.add("lp-dtheta-min", 20.0);
        core.params.add("lp-dtheta-max", 60.0);
        PolarIdxSf {
            core,
            slots: SlotCache::default(),
            prms: PolarPrms::default(),
            grid_step: 0.5,
            border: 1.0,
            attr: true,
            idx_incr: 2.4,
            pos_threshold: 0.25,
            neg_threshold: 0.25,
            pos_grid: None,
            neg_grid: None,
            rec_centres: Vec::new(),
            rec_pos: Vec::new(),
            rec_neg: Vec::new(),
            flex_pos: Vec::new(),
            flex_neg: Vec::new(),
            flex_rec: false,
            flex_intns: Vec::new(),
            flex_prt_intns: Vec::new(),
            lig_centres: Vec::new(),
            lig_pos: Vec::new(),
            lig_neg: Vec::new(),
            sol_centres: Vec::new(),
            sol_pos: Vec::new(),
            sol_neg: Vec::new(),
            sol_intns: Vec::new(),
            n_pos: Cell::new(0),
            n_neg: Cell::new(0),
        }
    }

    pub fn into_node(self) -> SfNode {
        SfNode::Polar(self)
    }

    /// Repulsive variant: donor-donor and acceptor-acceptor clashes.
    pub fn repulsive(name: &str) -> PolarIdxSf {
        let mut sf = PolarIdxSf::new(name);
        sf.attr = false;
        let _ = sf.core.params.set("attr", false);
        sf
    }

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

    fn setup_receptor(&mut self, models: &mut [Model], site: Option<&DockingSite>) {
        self.pos_grid = None;
        self.neg_grid = None;
        self.rec_centres.clear();
        self.rec_pos.clear();
        self.rec_neg.clear();
        self.flex_pos.clear();
        self.flex_neg.clear();
        self.flex_rec = false;
        self.flex_intns.clear();
        self.flex_prt_intns.clear();
        if models.first().map(|m| m.is_empty()).unwrap_or(true) {
            return;
        }
        let site = match site {
            Some(s) => s,
            None => return,
        };
        let idx_incr = self.idx_incr + self.max_error();
        let dims = GridDims::covering(site.min_coord(), site.max_coord(), self.border, self.grid_step);
        let mut pos_grid: ListGrid<u32> = ListGrid::new(dims.clone());
        let mut neg_grid: ListGrid<u32> = ListGrid::new(dims);

        let n_coords = models[0].num_saved_coords();
        if n_coords > 1 {
            // Ensemble receptor: index every saved conformation, then dedup
            let current = models[0].current_coords_index();
            let (pos, neg) = self.build_receptor_centres(models, site);
            for i in 0..n_coords {
                debug!("{}: indexing receptor coords #{}", self.core.name(), i);
                if models[0].revert_coords(i).is_err() {
                    continue;
                }
                models[0].update_pseudo_atoms();
                for &ci in &pos {
                    let ic = &self.rec_centres[ci];
                    let atom = &models[0].atoms[ic.atom1];
                    pos_grid.insert_sphere(atom.coords, atom.vdw_radius + idx_incr, ci as u32);
                }
                for &ci in &neg {
                    let ic = &self.rec_centres[ci];
                    let atom = &models[0].atoms[ic.atom1];
                    neg_grid.insert_sphere(atom.coords, atom.vdw_radius + idx_incr, ci as u32);
                }
            }
            pos_grid.unique_lists();
            neg_grid.unique_lists();
            let _ = models[0].revert_coords(current);
            models[0].update_pseudo_atoms();
            self.rec_pos = pos;
            self.rec_neg = neg;
        } else {
            let (mut pos, mut neg) = self.build_receptor_centres(models, site);
            self.flex_rec = models[0].is_flexible();
            if self.flex_rec {
                // Split the centres into rigid and flexible via a selection
                // pass over the movable atoms
                models[0].set_atom_selection_flags(false);
                models[0].select_flex_atoms();
                let (rigid_pos, flex_pos): (Vec<usize>, Vec<usize>) =
                    pos.drain(..).partition(|&ci| !self.rec_centres[ci].is_selected(models));
                let (rigid_neg, flex_neg): (Vec<usize>, Vec<usize>) =
                    neg.drain(..).partition(|&ci| !self.rec_centres[ci].is_selected(models));
                models[0].set_atom_selection_flags(false);
                pos = rigid_pos;
                neg = rigid_neg;
                self.flex_pos = flex_pos;
                self.flex_neg = flex_neg;
                self.build_flex_intra_map(models, &pos, &neg);
                // Partition once at setup; OH/NH3 protons cannot move further
                // than the pad before the lists go stale
                self.partition_flex(models, self.core.range + FLEX_RECEPTOR_PAD);
                for &ci in self.flex_pos.iter() {
                    let ic = &self.rec_centres[ci];
                    let atom = &models[0].atoms[ic.atom1];
                    pos_grid.insert_sphere(
                        atom.coords,
                        atom.vdw_radius + idx_incr + FLEX_RECEPTOR_PAD,
                        ci as u32,
                    );
                }
                for &ci in self.flex_neg.iter() {
                    let ic = &self.rec_centres[ci];
                    let atom = &models[0].atoms[ic.atom1];
                    neg_grid.insert_sphere(
                        atom.coords,
                        atom.vdw_radius + idx_incr + FLEX_RECEPTOR_PAD,
                        ci as u32,
                    );
                }
            }
            for &ci in &pos {
                let ic = &self.rec_centres[ci];
                let atom = &models[0].atoms[ic.atom1];
                pos_grid.insert_sphere(atom.coords, atom.vdw_radius + idx_incr, ci as u32);
            }
            for &ci in &neg {
                let ic = &self.rec_centres[ci];
                let atom = &models[0].atoms[ic.atom1];
                neg_grid.insert_sphere(atom.coords, atom.vdw_radius + idx_incr, ci as u32);
            }
            self.rec_pos = pos;
            self.rec_neg = neg;
        }
        debug!(
            "{}: receptor centres: {} pos ({} flex), {} neg ({} flex)",
            self.core.name(),
            self.rec_pos.len() + self.flex_pos.len(),
            self.flex_pos.len(),
            self.rec_neg.len() + self.flex_neg.len(),
            self.flex_neg.len()
        );
        self.pos_grid = Some(pos_grid);
        self.neg_grid = Some(neg_grid);
    }

    /// Builds all receptor centres near the docking site and returns the
    /// (pos, neg) index lists into `rec_centres`.
    fn build_receptor_centres(
        &mut self,
        models: &mut [Model],
        site: &DockingSite,
    ) -> (Vec<usize>, Vec<usize>) {
        let in_range: std::collections::BTreeSet<usize> = site
            .atoms_in_range(&models[0].atoms, 0.0, self.corrected_range())
            .into_iter()
            .collect();
        let donors = create_donor_centres(0, &models[0], &self.prms);
        let acceptors = create_acceptor_centres(0, &mut models[0], &self.prms);
        let mut pos = Vec::new();
        let mut neg = Vec::new();
        for ic in donors {
            if in_range.contains(&ic.atom1) {
                pos.push(self.rec_centres.len());
                self.rec_centres.push(ic);
            }
        }
        for ic in acceptors {
            if in_range.contains(&ic.atom1) {
                neg.push(self.rec_centres.len());
                self.rec_centres.push(ic);
            }
        }
        (pos, neg)
    }

    /// Intra-receptor interaction map over the flexible centres, keyed by
    /// the first atom's id.
    fn build_flex_intra_map(&mut self, models: &[Model], rigid_pos: &[usize], rigid_neg: &[usize]) {
        let n = models[0].num_atoms();
        self.flex_intns = vec![Vec::new(); n];
        self.flex_prt_intns = vec![Vec::new(); n];
        let pairs: Vec<(Vec<usize>, Vec<usize>)> = if self.attr {
            vec![
                (self.flex_pos.clone(), self.flex_neg.clone()),
                (self.flex_pos.clone(), rigid_neg.to_vec()),
                (self.flex_neg.clone(), rigid_pos.to_vec()),
            ]
        } else {
            vec![
                (self.flex_pos.clone(), self.flex_pos.clone()),
                (self.flex_pos.clone(), rigid_pos.to_vec()),
                (self.flex_neg.clone(), self.flex_neg.clone()),
                (self.flex_neg.clone(), rigid_neg.to_vec()),
            ]
        };
        for (list1, list2) in pairs {
            let single = list1 == list2;
            for (pos1, &ci) in list1.iter().enumerate() {
                let key = models[0].atoms[self.rec_centres[ci].atom1].id - 1;
                let start = if single { pos1 + 1 } else { 0 };
                for &cj in list2.iter().skip(start) {
                    if cj == ci {
                        continue;
                    }
                    if variable_distance(models, &self.rec_centres[ci], &self.rec_centres[cj]) {
                        self.flex_intns[key].push(cj);
                    }
                }
            }
        }
    }

    fn setup_ligand(&mut self, models: &mut [Model]) {
        self.lig_centres.clear();
        self.lig_pos.clear();
        self.lig_neg.clear();
        let lig_idx = 1;
        if models.get(lig_idx).map(|m| m.is_empty()).unwrap_or(true) {
            return;
        }
        let donors = create_donor_centres(lig_idx, &models[lig_idx], &self.prms);
        let acceptors = create_acceptor_centres(lig_idx, &mut models[lig_idx], &self.prms);
        for ic in donors {
            self.lig_pos.push(self.lig_centres.len());
            self.lig_centres.push(ic);
        }
        for ic in acceptors {
            self.lig_neg.push(self.lig_centres.len());
            self.lig_centres.push(ic);
        }
    }

    fn setup_solvent(&mut self, models: &mut [Model]) {
        self.sol_centres.clear();
        self.sol_pos.clear();
        self.sol_neg.clear();
        self.sol_intns.clear();
        for mi in 2..models.len() {
            if models[mi].is_empty() {
                continue;
            }
            let donors = create_donor_centres(mi, &models[mi], &self.prms);
            let acceptors = create_acceptor_centres(mi, &mut models[mi], &self.prms);
            for ic in donors {
                self.sol_pos.push(self.sol_centres.len());
                self.sol_centres.push(ic);
            }
            for ic in acceptors {
                self.sol_neg.push(self.sol_centres.len());
                self.sol_centres.push(ic);
            }
        }
        let n = self.sol_centres.len();
        let pairs: Vec<(&[usize], &[usize], bool)> = if self.attr {
            vec![(&self.sol_pos[..], &self.sol_neg[..], false)]
        } else {
            vec![
                (&self.sol_pos[..], &self.sol_pos[..], true),
                (&self.sol_neg[..], &self.sol_neg[..], true),
            ]
        };
        let mut intns = vec![Vec::new(); n];
        for (list1, list2, single) in pairs {
            for (pos1, &ci) in list1.iter().enumerate() {
                let start = if single { pos1 + 1 } else { 0 };
                for &cj in list2.iter().skip(start) {
                    if cj != ci && variable_distance(models, &self.sol_centres[ci], &self.sol_centres[cj])
                    {
                        intns[ci].push(cj);
                    }
                }
            }
        }
        self.sol_intns = intns;
    }

    pub fn handle_partition(&mut self, req: &SfRequest, models: &[Model], full: &str) {
        if let SfRequest::Partition { name, dist } = req {
            let applies = match name {
                Some(n) => n == full,
                None => true,
            };
            if applies && self.flex_rec {
                self.partition_flex(models, *dist);
            }
        }
    }

    fn partition_flex(&mut self, models: &[Model], dist: f64) {
        let d2 = dist * dist;
        for key in 0..self.flex_intns.len() {
            self.flex_prt_intns[key].clear();
        }
        for &ci in self.flex_pos.iter().chain(self.flex_neg.iter()) {
            let ic = &self.rec_centres[ci];
            let key = models[0].atoms[ic.atom1].id - 1;
            if dist > 0.0 {
                let c = models[0].atoms[ic.atom1].coords;
                self.flex_prt_intns[key] = self.flex_intns[key]
                    .iter()
                    .copied()
                    .filter(|&cj| {
                        let cj_coords = models[0].atoms[self.rec_centres[cj].atom1].coords;
                        cj_coords.distance2(c) < d2
                    })
                    .collect();
            } else {
                self.flex_prt_intns[key] = self.flex_intns[key].clone();
            }
        }
    }

    fn centres<'a>(&'a self, arena: &'a [InteractionCentre], idx: &'a [usize]) -> impl Iterator<Item = &'a InteractionCentre> {
        idx.iter().map(move |&i| &arena[i])
    }

    /// Ligand-receptor (bCount = true) or solvent-receptor (bCount = false)
    /// interactions via the receptor grids.
    fn grid_inter_score(
        &self,
        models: &[Model],
        pos_list: &[usize],
        neg_list: &[usize],
        arena: &[InteractionCentre],
        count: bool,
    ) -> f64 {
        let mut score = 0.0;
        if count {
            self.n_pos.set(0);
            self.n_neg.set(0);
        }
        let (pos_grid, neg_grid) = match (&self.pos_grid, &self.neg_grid) {
            (Some(p), Some(n)) => (p, n),
            _ => return score,
        };
        let rprms = self.prms.rprms();
        let a1prms = self.prms.a1prms();
        let a2prms = self.prms.a2prms();
        // Acceptors see the positive grid when attractive, the negative grid
        // when repulsive
        for &ci in neg_list {
            let ic = &arena[ci];
            let atom1 = &models[ic.model].atoms[ic.atom1];
            let cell = if self.attr {
                pos_grid.cell_at(atom1.coords)
            } else {
                neg_grid.cell_at(atom1.coords)
            };
            let partners = cell.iter().map(|&ri| &self.rec_centres[ri as usize]);
            let s = if self.attr {
                polar_score(models, ic, partners, &rprms, &a2prms, &a1prms, &self.prms)
            } else {
                polar_score(models, ic, partners, &rprms, &a2prms, &a2prms, &self.prms)
            } * atom1.user1;
            if count && s.abs() > self.neg_threshold {
                self.n_neg.set(self.n_neg.get() + 1);
            }
            score += s;
        }
        for &ci in pos_list {
            let ic = &arena[ci];
            let atom1 = &models[ic.model].atoms[ic.atom1];
            let cell = if self.attr {
                neg_grid.cell_at(atom1.coords)
            } else {
                pos_grid.cell_at(atom1.coords)
            };
            let partners = cell.iter().map(|&ri| &self.rec_centres[ri as usize]);
            let s = if self.attr {
                polar_score(models, ic, partners, &rprms, &a1prms, &a2prms, &self.prms)
            } else {
                polar_score(models, ic, partners, &rprms, &a1prms, &a1prms, &self.prms)
            } * atom1.user1;
            if count && s.abs() > self.pos_threshold {
                self.n_pos.set(self.n_pos.get() + 1);
            }
            score += s;
        }
        score
    }

    /// Ligand-receptor score.
    fn inter_score(&self, models: &[Model]) -> f64 {
        self.grid_inter_score(models, &self.lig_pos, &self.lig_neg, &self.lig_centres, true)
    }

    /// Receptor-solvent score.
    fn receptor_solvent_score(&self, models: &[Model]) -> f64 {
        if self.sol_centres.is_empty() {
            return 0.0;
        }
        self.grid_inter_score(models, &self.sol_pos, &self.sol_neg, &self.sol_centres, false)
    }

    /// Intra-receptor score over the partitioned flexible map.
    fn receptor_score(&self, models: &[Model]) -> f64 {
        if !self.flex_rec {
            return 0.0;
        }
        let rprms = self.prms.rprms();
        let a1prms = self.prms.a1prms();
        let a2prms = self.prms.a2prms();
        let mut score = 0.0;
        for &ci in &self.flex_pos {
            let ic = &self.rec_centres[ci];
            let atom1 = &models[0].atoms[ic.atom1];
            let key = atom1.id - 1;
            let partners = self.centres(&self.rec_centres, &self.flex_prt_intns[key]);
            let s = if self.attr {
                polar_score(models, ic, partners, &rprms, &a1prms, &a2prms, &self.prms)
            } else {
                polar_score(models, ic, partners, &rprms, &a1prms, &a1prms, &self.prms)
            };
            score += atom1.user1 * s;
        }
        for &ci in &self.flex_neg {
            let ic = &self.rec_centres[ci];
            let atom1 = &models[0].atoms[ic.atom1];
            let key = atom1.id - 1;
            let partners = self.centres(&self.rec_centres, &self.flex_prt_intns[key]);
            let s = if self.attr {
                polar_score(models, ic, partners, &rprms, &a2prms, &a1prms, &self.prms)
            } else {
                polar_score(models, ic, partners, &rprms, &a2prms, &a2prms, &self.prms)
            };
            score += atom1.user1 * s;
        }
        score
    }

    /// Intra-solvent score over the indexed solvent map.
    fn solvent_score(&self, models: &[Model]) -> f64 {
        if self.sol_centres.is_empty() {
            return 0.0;
        }
        let rprms = self.prms.rprms();
        let a1prms = self.prms.a1prms();
        let a2prms = self.prms.a2prms();
        let mut score = 0.0;
        for &ci in self.sol_pos.iter().chain(self.sol_neg.iter()) {
            let ic = &self.sol_centres[ci];
            let atom1 = &models[ic.model].atoms[ic.atom1];
            let is_pos = self.sol_pos.contains(&ci);
            let partners = self.centres(&self.sol_centres, &self.sol_intns[ci]);
            let s = match (self.attr, is_pos) {
                (true, true) => polar_score(models, ic, partners, &rprms, &a1prms, &a2prms, &self.prms),
                (true, false) => polar_score(models, ic, partners, &rprms, &a2prms, &a1prms, &self.prms),
                (false, true) => polar_score(models, ic, partners, &rprms, &a1prms, &a1prms, &self.prms),
                (false, false) => polar_score(models, ic, partners, &rprms, &a2prms, &a2prms, &self.prms),
            };
            score += atom1.user1 * s;
        }
        score
    }

    /// Ligand-solvent score; plain pairwise over the centre lists.
    fn ligand_solvent_score(&self, models: &[Model]) -> f64 {
        if self.sol_centres.is_empty() || self.lig_centres.is_empty() {
            return 0.0;
        }
        let rprms = self.prms.rprms();
        let a1prms = self.prms.a1prms();
        let a2prms = self.prms.a2prms();
        let mut score = 0.0;
        for &ci in &self.sol_pos {
            let ic = &self.sol_centres[ci];
            let atom1 = &models[ic.model].atoms[ic.atom1];
            let (list, ap1, ap2) = if self.attr {
                (&self.lig_neg, &a1prms, &a2prms)
            } else {
                (&self.lig_pos, &a1prms, &a1prms)
            };
            let partners = self.centres(&self.lig_centres, list);
            score += atom1.user1 * polar_score(models, ic, partners, &rprms, ap1, ap2, &self.prms);
        }
        for &ci in &self.sol_neg {
            let ic = &self.sol_centres[ci];
            let atom1 = &models[ic.model].atoms[ic.atom1];
            let (list, ap1, ap2) = if self.attr {
                (&self.lig_pos, &a2prms, &a1prms)
            } else {
                (&self.lig_neg, &a2prms, &a2prms)
            };
            let partners = self.centres(&self.lig_centres, list);
            score += atom1.user1 * polar_score(models, ic, partners, &rprms, ap1, ap2, &self.prms);
        }
        score
    }

    /// Sum of ligand-receptor, ligand-solvent, intra-receptor, intra-solvent
    /// and receptor-solvent contributions.
    pub fn raw_score(&self, models: &[Model]) -> f64 {
        self.inter_score(models)
            + self.ligand_solvent_score(models)
            + self.receptor_score(models)
            + self.solvent_score(models)
            + self.receptor_solvent_score(models)
    }

    /// The inter energy goes under the natural full name; the three system
    /// energies are reported individually and accumulated into
    /// `score.system`.
    pub fn score_map(&self, prefix: &str, models: &[Model], map: &mut ScoreMap) {
        let inter = self.inter_score(models) + self.ligand_solvent_score(models);
        default_score_map(&self.core, prefix, inter, map);
        let rec = self.receptor_score(models);
        let sol = self.solvent_score(models);
        let rec_sol = self.receptor_solvent_score(models);
        let system = rec + sol + rec_sol;
        if system != 0.0 {
            let base = format!("{}.{}", SYSTEM_SF, self.core.name());
            map.insert(base.clone(), Value::Real(system));
            map.insert(format!("{}.receptor", base), Value::Real(rec));
            map.insert(format!("{}.solvent", base), Value::Real(sol));
            map.insert(format!("{}.receptor-solvent", base), Value::Real(rec_sol));
            accumulate(map, SYSTEM_SF, self.core.weight * system);
        }
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        let own = matches!(
            name,
            "grid-step"
                | "border"
                | "incr"
                | "attr"
                | "threshold-pos"
                | "threshold-neg"
                | "r12-factor"
                | "r12-incr"
                | "dr12-min"
                | "dr12-max"
                | "a1"
                | "da1-min"
                | "da1-max"
                | "a2"
                | "da2-min"
                | "da2-max"
                | "abs-dr12"
                | "inc-metal"
                | "inc-hbd"
                | "inc-hba"
                | "inc-guan"
                | "guan-plane"
                | "lp-osp2"
                | "lp-phi"
                | "lp-dphi-min"
                | "lp-dphi-max"
                | "lp-dtheta-min"
                | "lp-dtheta-max"
        );
        if !own {
            return self.core.set_parameter(name, value);
        }
        self.core.params.set(name, value.clone())?;
        let p = &self.core.params;
        match name {
            "grid-step" => self.grid_step = p.get_f64(name),
            "border" => self.border = p.get_f64(name),
            "incr" => self.idx_incr = p.get_f64(name),
            "attr" => self.attr = p.get_bool(name),
            "threshold-pos" => self.pos_threshold = p.get_f64(name),
            "threshold-neg" => self.neg_threshold = p.get_f64(name),
            "r12-factor" => self.prms.r12_factor = p.get_f64(name),
            "r12-incr" => self.prms.r12_incr = p.get_f64(name),
            "dr12-min" => self.prms.dr12_min = p.get_f64(name),
            "dr12-max" => self.prms.dr12_max = p.get_f64(name),
            "a1" => self.prms.a1 = p.get_f64(name),
            "da1-min" => self.prms.da1_min = p.get_f64(name),
            "da1-max" => self.prms.da1_max = p.get_f64(name),
            "a2" => self.prms.a2 = p.get_f64(name),
            "da2-min" => self.prms.da2_min = p.get_f64(name),
            "da2-max" => self.prms.da2_max = p.get_f64(name),
            "abs-dr12" => self.prms.abs_dr12 = p.get_bool(name),
            "inc-metal" => self.prms.inc_metal = p.get_bool(name),
            "inc-hbd" => self.prms.inc_hbd = p.get_bool(name),
            "inc-hba" => self.prms.inc_hba = p.get_bool(name),
            "inc-guan" => self.prms.inc_guan = p.get_bool(name),
            "guan-plane" => self.prms.guan_plane = p.get_bool(name),
            "lp-osp2" => self.prms.lp_osp2 = p.get_bool(name),
            "lp-phi" => self.prms.lp_phi = p.get_f64(name),
            "lp-dphi-min" => self.prms.lp_dphi_min = p.get_f64(name),
            "lp-dphi-max" => self.prms.lp_dphi_max = p.get_f64(name),
            "lp-dtheta-min" => self.prms.lp_dtheta_min = p.get_f64(name),
            "lp-dtheta-max" => self.prms.lp_dtheta_max = p.get_f64(name),
            _ => {}
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests_support::{test_atom, test_bond};
    use crate::model::{Model, ModelFlex};

    #[test]
    fn f1_envelope_shape() {
        let p = F1Params::new(0.0, 0.25, 0.6);
        assert_eq!(f1(0.0, &p), 1.0);
        assert_eq!(f1(0.25, &p), 1.0);
        assert!((f1(0.425, &p) - 0.5).abs() < 1e-12);
        assert_eq!(f1(0.6, &p), 0.0);
        assert_eq!(f1(5.0, &p), 0.0);
    }

    fn hydroxyl_model() -> Model {
        // C-O-H donor plus a carbonyl C=O acceptor four Angstroms away,
        // arranged for a near-linear hydrogen bond
        let mut atoms = vec![
            test_atom("C1", 6, Vec3::new(-1.4, 0.0, 0.0)),
            test_atom("O1", 8, Vec3::new(0.0, 0.0, 0.0)),
            test_atom("H1", 1, Vec3::new(0.95, 0.0, 0.0)),
            test_atom("O2", 8, Vec3::new(3.8, 0.0, 0.0)),
            test_atom("C2", 6, Vec3::new(4.9, 0.8, 0.0)),
        ];
        atoms[1].hbond_acceptor = true;
        atoms[2].hbond_donor = true;
        atoms[2].vdw_radius = 1.0;
        atoms[3].hbond_acceptor = true;
        for a in &mut atoms {
            a.user1 = 1.0;
        }
        let bonds = vec![test_bond(0, 1, false), test_bond(1, 2, false), test_bond(3, 4, false)];
        Model::new("hydroxyl", atoms, bonds, ModelFlex::Rigid)
    }

    #[test]
    fn donor_centres_pair_h_with_parent() {
        let m = hydroxyl_model();
        let centres = create_donor_centres(0, &m, &PolarPrms::default());
        assert_eq!(centres.len(), 1);
        assert_eq!(centres[0].atom1, 2);
        assert_eq!(centres[0].atom2, Some(AtomAddr::Real(1)));
    }

    #[test]
    fn acceptor_centres_use_parent_direction() {
        let mut m = hydroxyl_model();
        let centres = create_acceptor_centres(0, &mut m, &PolarPrms::default());
        assert_eq!(centres.len(), 2);
        // O1 has two bonded neighbours, so its parent is a pseudo-atom
        let o1 = centres.iter().find(|c| c.atom1 == 1).unwrap();
        assert!(matches!(o1.atom2, Some(AtomAddr::Pseudo(_))));
        let o2 = centres.iter().find(|c| c.atom1 == 3).unwrap();
        assert_eq!(o2.atom2, Some(AtomAddr::Real(4)));
    }

    #[test]
    fn atom_list_deconvolutes_pseudo_atoms() {
        let mut m = hydroxyl_model();
        let centres = create_acceptor_centres(0, &mut m, &PolarPrms::default());
        let models = vec![m];
        let o1 = centres.iter().find(|c| c.atom1 == 1).unwrap();
        let atoms = o1.atom_list(&models);
        // Pseudo parent resolves to the two real neighbours
        assert_eq!(atoms, vec![1, 0, 2]);
    }

    #[test]
    fn near_linear_hbond_scores_positive() {
        let mut m = hydroxyl_model();
        let donors = create_donor_centres(0, &m, &PolarPrms::default());
        let acceptors = create_acceptor_centres(0, &mut m, &PolarPrms::default());
        let models = vec![m];
        let prms = PolarPrms::default();
        let donor = &donors[0];
        let acceptor = acceptors.iter().find(|c| c.atom1 == 3).unwrap();
        let s = polar_score(
            &models,
            donor,
            std::iter::once(acceptor),
            &prms.rprms(),
            &prms.a1prms(),
            &prms.a2prms(),
            &prms,
        );
        assert!(s > 0.0, "expected a favourable geometry, got {}", s);
    }

    #[test]
    fn distant_pair_scores_zero() {
        let mut m = hydroxyl_model();
        m.atoms[3].coords = Vec3::new(50.0, 0.0, 0.0);
        m.atoms[4].coords = Vec3::new(51.0, 0.8, 0.0);
        let donors = create_donor_centres(0, &m, &PolarPrms::default());
        let acceptors = create_acceptor_centres(0, &mut m, &PolarPrms::default());
        let models = vec![m];
        let prms = PolarPrms::default();
        let acceptor = acceptors.iter().find(|c| c.atom1 == 3).unwrap();
        let s = polar_score(
            &models,
            &donors[0],
            std::iter::once(acceptor),
            &prms.rprms(),
            &prms.a1prms(),
            &prms.a2prms(),
            &prms,
        );
        assert_eq!(s, 0.0);
    }

    #[test]
    fn disabled_atom_scores_zero() {
        let mut m = hydroxyl_model();
        let donors = create_donor_centres(0, &m, &PolarPrms::default());
        let acceptors = create_acceptor_centres(0, &mut m, &PolarPrms::default());
        m.atoms[3].enabled = false;
        let models = vec![m];
        let prms = PolarPrms::default();
        let acceptor = acceptors.iter().find(|c| c.atom1 == 3).unwrap();
        let s = polar_score(
            &models,
            &donors[0],
            std::iter::once(acceptor),
            &prms.rprms(),
            &prms.a1prms(),
            &prms.a2prms(),
            &prms,
        );
        assert_eq!(s, 0.0);
    }

    #[test]
    fn lone_pair_tagging_for_anionic_terminal_oxygen() {
        let mut atoms = vec![
            test_atom("C", 6, Vec3::new(0.0, 0.0, 0.0)),
            test_atom("O", 8, Vec3::new(1.25, 0.0, 0.0)),
            test_atom("C2", 6, Vec3::new(-0.8, 1.2, 0.0)),
        ];
        atoms[1].hbond_acceptor = true;
        atoms[1].anionic = true;
        let bonds = vec![test_bond(0, 1, false), test_bond(0, 2, false)];
        let mut m = Model::new("carboxylate", atoms, bonds, ModelFlex::Rigid);
        let mut prms = PolarPrms::default();
        prms.lp_osp2 = true;
        let centres = create_acceptor_centres(0, &mut m, &prms);
        assert_eq!(centres.len(), 1);
        assert_eq!(centres[0].lp, LonePairType::LonePair);
        assert_eq!(centres[0].atom3, Some(AtomAddr::Real(2)));
    }
}
