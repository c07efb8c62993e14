use std::collections::BTreeMap;
use std::env;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::thread;

use serde::{Deserialize, Serialize};

use griddock::chrom::Chromosome;
use griddock::constants::DEFAULT_SEED;
use griddock::error::{DockError, Result};
use griddock::geometry::Vec3;
use griddock::model::Model;
use griddock::params::Value;
use griddock::request::SfRequest;
use griddock::rng;
use griddock::sf::{CavityGridSf, ConstSf, PolarIdxSf, SetupPolarSf, SfAgg, SfNode, VdwIdxSf};
use griddock::site::DockingSite;
use griddock::transform::{
    GaTransform, NullTransform, RandLigTransform, RandPopTransform, SimAnnTransform,
    SimplexTransform, TransformAgg, TransformNode,
};
use griddock::Workspace;

// Use 8MB as binary stack
const STACK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Serialize, Deserialize, Debug)]
struct Section {
    kind: String,
    name: String,
    #[serde(default)]
    params: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Debug)]
struct SetupFile {
    seed: Option<u64>,
    receptor_file: String,
    ligand_file: String,
    #[serde(default)]
    solvent_files: Vec<String>,
    site_meta: String,
    site_grid: String,
    scoring: Vec<Section>,
    transforms: Vec<Section>,
    /// Optional pose file to restore before scoring (restart mode).
    restart_pose: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
struct ModelPose {
    name: String,
    coords: Vec<Vec3>,
}

#[derive(Serialize, Deserialize, Debug)]
struct PoseFile {
    chromosome: Vec<f64>,
    models: Vec<ModelPose>,
}

fn read_setup(path: &Path) -> Result<SetupFile> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|e| DockError::Parse(format!("{}: {}", path.display(), e)))
}

fn read_model(path: &Path) -> Result<Model> {
    let reader = BufReader::new(File::open(path)?);
    let mut model: Model =
        serde_json::from_reader(reader).map_err(|e| DockError::Parse(format!("{}: {}", path.display(), e)))?;
    model.rebuild_flex_data();
    // A molecule drawn flat in the z = 0 plane was almost certainly never
    // embedded in 3-D; refuse it rather than dock garbage
    if model.num_atoms() > 3 && model.atoms.iter().all(|a| a.coords.z.abs() < 1e-6) {
        return Err(DockError::Model(format!(
            "{}: all atoms lie in the z=0 plane; input looks 2-D",
            path.display()
        )));
    }
    Ok(model)
}

fn build_sf(sections: &[Section]) -> Result<SfNode> {
    let mut root = SfAgg::new("score").into_node();
    for section in sections {
        let mut node = match section.kind.as_str() {
            "vdw" => VdwIdxSf::new(&section.name).into_node(),
            "polar" => PolarIdxSf::new(&section.name).into_node(),
            "polar-repulsive" => PolarIdxSf::repulsive(&section.name).into_node(),
            "setup-polar" => SetupPolarSf::new(&section.name).into_node(),
            "cavity" => CavityGridSf::new(&section.name).into_node(),
            "const" => ConstSf::new(&section.name).into_node(),
            other => {
                return Err(DockError::Parse(format!("unknown scoring section kind: {}", other)))
            }
        };
        for (key, value) in &section.params {
            node.set_parameter(key, value)?;
        }
        root.add(node)?;
    }
    Ok(root)
}

fn build_transform(sections: &[Section]) -> Result<TransformNode> {
    let mut root = TransformAgg::new("dock").into_node();
    for section in sections {
        let mut node = match section.kind.as_str() {
            "null" => NullTransform::new(&section.name).into_node(),
            "rand-lig" => RandLigTransform::new(&section.name).into_node(),
            "rand-pop" => RandPopTransform::new(&section.name).into_node(),
            "simann" => SimAnnTransform::new(&section.name).into_node(),
            "simplex" => SimplexTransform::new(&section.name).into_node(),
            "ga" => GaTransform::new(&section.name).into_node(),
            other => {
                return Err(DockError::Parse(format!("unknown transform kind: {}", other)))
            }
        };
        for (key, value) in &section.params {
            // section@param queues a scoring-function request fired before
            // each execute; plain keys set the transform's own parameter
            match key.split_once('@') {
                Some((sf_section, param)) => {
                    node.queue_sf_request(SfRequest::set_param(
                        format!("score.{}", sf_section),
                        param,
                        value.clone(),
                    ));
                }
                None => {
                    node.set_parameter(key, value)?;
                }
            }
        }
        root.add(node)?;
    }
    Ok(root)
}

fn write_outputs(ws: &Workspace, prefix: &str) -> Result<()> {
    let scores = ws.score_map();
    let score_path = PathBuf::from(format!("{}_scores.json", prefix));
    serde_json::to_writer_pretty(BufWriter::new(File::create(&score_path)?), &scores)
        .map_err(|e| DockError::File(e.to_string()))?;
    println!("Wrote score map to {}", score_path.display());

    let mut chrom = Chromosome::from_models(ws.models(), ws.docking_site());
    chrom.sync_from_model(ws.models());
    let pose = PoseFile {
        chromosome: chrom.get_vector(),
        models: ws
            .models()
            .iter()
            .map(|m| ModelPose {
                name: m.name.clone(),
                coords: m.atoms.iter().map(|a| a.coords).collect(),
            })
            .collect(),
    };
    let pose_path = PathBuf::from(format!("{}_pose.json", prefix));
    serde_json::to_writer_pretty(BufWriter::new(File::create(&pose_path)?), &pose)
        .map_err(|e| DockError::File(e.to_string()))?;
    println!("Wrote pose to {}", pose_path.display());
    Ok(())
}

fn apply_restart_pose(ws: &mut Workspace, path: &Path) -> Result<()> {
    let reader = BufReader::new(File::open(path)?);
    let pose: PoseFile =
        serde_json::from_reader(reader).map_err(|e| DockError::Parse(format!("{}: {}", path.display(), e)))?;
    let models = ws.models_mut();
    if pose.models.len() != models.len() {
        return Err(DockError::bad_argument("restart pose model count mismatch"));
    }
    for (model, saved) in models.iter_mut().zip(&pose.models) {
        if saved.coords.len() != model.num_atoms() {
            return Err(DockError::bad_argument(format!(
                "restart pose atom count mismatch for model {}",
                model.name
            )));
        }
        for (atom, &c) in model.atoms.iter_mut().zip(&saved.coords) {
            atom.coords = c;
        }
        model.update_pseudo_atoms();
    }
    Ok(())
}

fn dock(setup_path: &Path, prefix: &str) -> Result<()> {
    let setup = read_setup(setup_path)?;
    let base = setup_path.parent().unwrap_or_else(|| Path::new(""));

    rng::seed(setup.seed.unwrap_or(DEFAULT_SEED));

    println!("Reading receptor: {}", setup.receptor_file);
    let receptor = read_model(&base.join(&setup.receptor_file))?;
    println!("Reading ligand: {}", setup.ligand_file);
    let ligand = read_model(&base.join(&setup.ligand_file))?;
    let mut solvent = Vec::new();
    for file in &setup.solvent_files {
        println!("Reading solvent: {}", file);
        solvent.push(read_model(&base.join(file))?);
    }

    println!("Reading docking site: {} + {}", setup.site_meta, setup.site_grid);
    let site = DockingSite::load(&base.join(&setup.site_meta), &base.join(&setup.site_grid))?;

    let mut ws = Workspace::new(prefix);
    ws.set_docking_site(site);
    ws.set_receptor(receptor);
    ws.set_ligand(ligand);
    ws.set_solvent(solvent);
    ws.set_sf(build_sf(&setup.scoring)?);
    ws.set_transform(build_transform(&setup.transforms)?);

    if let Some(restart) = &setup.restart_pose {
        println!("Restoring pose from {}", restart);
        apply_restart_pose(&mut ws, &base.join(restart))?;
        println!("Restart score = {:.4}", ws.score());
    } else {
        println!("Initial score = {:.4}", ws.score());
        ws.run()?;
        println!("Final score = {:.4}", ws.score());
    }

    write_outputs(&ws, prefix)
}

fn run() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    match args.len() {
        3 => {
            let setup_path = PathBuf::from(&args[1]);
            let prefix = args[2].clone();
            if let Err(e) = dock(&setup_path, &prefix) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        _ => {
            println!("Wrong command line. Usage: {} setup_file output_prefix", args[0]);
        }
    }
}

fn main() {
    // Spawn thread with explicit stack size
    let child = thread::Builder::new()
        .stack_size(STACK_SIZE)
        .spawn(run)
        .unwrap();

    // Wait for thread to join
    child.join().unwrap();
}
