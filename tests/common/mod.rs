//! Shared synthetic docking system for the search tests: a rigid pocket
//! with one rotatable hydroxyl tip, a flexible four-heavy-atom ligand, four
//! tethered waters and a spherical docking site.

use griddock::geometry::Vec3;
use griddock::grid::{GridDims, RealGrid};
use griddock::model::{Atom, Bond, Hybridisation, Model, ModelFlex, TetherMode, TriposType};
use griddock::sf::{CavityGridSf, PolarIdxSf, SetupPolarSf, SfAgg, SfNode, VdwIdxSf};
use griddock::site::DockingSite;
use griddock::Workspace;

pub fn atom(name: &str, atomic_no: u8, coords: Vec3) -> Atom {
    let (mass, vdw_radius, tripos_type) = match atomic_no {
        1 => (1.008, 1.2, TriposType::H),
        6 => (12.011, 1.7, TriposType::C3),
        7 => (14.007, 1.65, TriposType::N3),
        8 => (15.999, 1.55, TriposType::O3),
        _ => (12.0, 1.7, TriposType::Undefined),
    };
    Atom {
        id: 0,
        name: name.to_string(),
        atomic_no,
        mass,
        coords,
        vdw_radius,
        formal_charge: 0,
        partial_charge: 0.0,
        group_charge: 0.0,
        hybridisation: Hybridisation::Sp3,
        tripos_type,
        segment: String::new(),
        hbond_donor: false,
        hbond_acceptor: false,
        lipophilic: atomic_no == 6,
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

pub fn bond(atom1: usize, atom2: usize, rotatable: bool) -> Bond {
    Bond {
        id: 0,
        atom1,
        atom2,
        order: 1,
        cyclic: false,
        rotatable,
    }
}

/// Pocket: eight shell carbons, a serine-like hydroxyl tip (rotatable C-O
/// bond) and a carbonyl acceptor, all facing the cavity at the origin.
pub fn receptor() -> Model {
    let shell = [
        Vec3::new(5.5, 0.0, 0.0),
        Vec3::new(-5.5, 0.0, 0.0),
        Vec3::new(0.0, 5.5, 0.0),
        Vec3::new(0.0, -5.5, 0.0),
        Vec3::new(0.0, 0.0, 5.5),
        Vec3::new(0.0, 0.0, -5.5),
        Vec3::new(3.9, 3.9, 0.0),
        Vec3::new(-3.9, -3.9, 0.0),
    ];
    let mut atoms: Vec<Atom> = shell
        .iter()
        .enumerate()
        .map(|(i, &c)| atom(&format!("C{}", i + 1), 6, c))
        .collect();
    // Serine-like tip: C8 is bonded to Cs-Os-Hs; the Cs-Os bond rotates
    let cs = atoms.len();
    atoms.push(atom("CS", 6, Vec3::new(-3.9, 3.9, 0.0)));
    let os = atoms.len();
    let mut o_tip = atom("OS", 8, Vec3::new(-2.9, 2.9, 0.0));
    o_tip.hbond_acceptor = true;
    atoms.push(o_tip);
    let hs = atoms.len();
    let mut h_tip = atom("HS", 1, Vec3::new(-2.3, 3.3, 0.7));
    h_tip.hbond_donor = true;
    atoms.push(h_tip);
    // Carbonyl acceptor under the shell carbon at +y
    let cc = atoms.len();
    atoms.push(atom("CC", 6, Vec3::new(0.9, 4.9, 0.9)));
    let oc = atoms.len();
    let mut o_carb = atom("OC", 8, Vec3::new(0.6, 3.6, 0.6));
    o_carb.hbond_acceptor = true;
    atoms.push(o_carb);

    let bonds = vec![
        bond(0, 6, false),
        bond(2, 6, false),
        bond(1, 7, false),
        bond(3, 7, false),
        bond(2, cs, false),
        bond(cs, os, true),
        bond(os, hs, false),
        bond(2, cc, false),
        bond(cc, oc, false),
    ];
    Model::new("receptor", atoms, bonds, ModelFlex::Receptor { dihedral_step: 30.0 })
}

/// Butanol-like ligand: C-C-C-O-H with two rotatable bonds, four heavy
/// atoms, one donor and one acceptor.
pub fn ligand() -> Model {
    let mut atoms = vec![
        atom("C1", 6, Vec3::new(-1.5, 0.0, 0.0)),
        atom("C2", 6, Vec3::new(0.0, 0.2, 0.0)),
        atom("C3", 6, Vec3::new(0.9, -0.5, 1.0)),
        atom("O1", 8, Vec3::new(2.2, 0.1, 1.1)),
        atom("H1", 1, Vec3::new(2.9, -0.4, 0.6)),
    ];
    atoms[3].hbond_acceptor = true;
    atoms[4].hbond_donor = true;
    let bonds = vec![
        bond(0, 1, false),
        bond(1, 2, true),
        bond(2, 3, true),
        bond(3, 4, false),
    ];
    Model::new(
        "ligand",
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

pub fn water(index: usize, centre: Vec3) -> Model {
    let mut o = atom("OW", 8, centre);
    o.hbond_acceptor = true;
    let mut h1 = atom("HW1", 1, centre + Vec3::new(0.76, 0.59, 0.0));
    h1.hbond_donor = true;
    let mut h2 = atom("HW2", 1, centre + Vec3::new(-0.76, 0.59, 0.0));
    h2.hbond_donor = true;
    let bonds = vec![bond(0, 1, false), bond(0, 2, false)];
    Model::new(
        &format!("water{}", index),
        vec![o, h1, h2],
        bonds,
        ModelFlex::Solvent {
            trans_mode: TetherMode::Tethered,
            rot_mode: TetherMode::Tethered,
            max_trans: 1.0,
            max_rot: 30.0,
            variable_occupancy: true,
        },
    )
}

pub fn waters() -> Vec<Model> {
    vec![
        water(1, Vec3::new(0.0, 0.0, 3.0)),
        water(2, Vec3::new(2.5, 0.0, -2.0)),
        water(3, Vec3::new(-2.5, 1.5, 0.5)),
        water(4, Vec3::new(0.0, -2.8, 1.0)),
    ]
}

/// Spherical cavity of radius 4 in a 16 A cube, sampled at 0.5 A.
pub fn docking_site() -> DockingSite {
    let min = Vec3::new(-8.0, -8.0, -8.0);
    let max = Vec3::new(8.0, 8.0, 8.0);
    let dims = GridDims::covering(min, max, 0.0, 0.5);
    let mut grid = RealGrid::new(dims);
    for i in 0..grid.dims().len() {
        let c = grid.dims().index_to_coord(i);
        grid.set(i, (c.length() - 4.0).max(0.0));
    }
    DockingSite::new(grid, min, max)
}

/// Minimal scoring tree for docking: polar setup, vdW with a tight energy
/// cutoff, directional polar, and the cavity restraint.
pub fn scoring_tree() -> SfNode {
    let mut root = SfAgg::new("score").into_node();
    root.add(SetupPolarSf::new("setup").into_node()).unwrap();
    let mut vdw = VdwIdxSf::new("vdw").into_node();
    vdw.set_parameter("ecut", &griddock::params::Value::Real(1.0)).unwrap();
    root.add(vdw).unwrap();
    root.add(PolarIdxSf::new("polar").into_node()).unwrap();
    let mut cavity = CavityGridSf::new("cavity").into_node();
    cavity.set_parameter("weight", &griddock::params::Value::Real(5.0)).unwrap();
    root.add(cavity).unwrap();
    root
}

/// Fully assembled workspace: docking site, receptor, ligand, four waters,
/// scoring tree.
pub fn workspace() -> Workspace {
    let mut ws = Workspace::new("1yet");
    ws.set_docking_site(docking_site());
    ws.set_receptor(receptor());
    ws.set_ligand(ligand());
    ws.set_solvent(waters());
    ws.set_sf(scoring_tree());
    ws
}
