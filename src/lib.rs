//! griddock: a grid-indexed molecular docking search engine.
//!
//! The workspace binds a mutable set of molecular models (receptor at slot
//! 0, ligand at slot 1, solvent at slots 2+) to a scoring-function tree and
//! a search transform, and propagates change notifications so that scoring
//! terms re-run their per-model setup only for the slots that changed.

pub mod chrom;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod model;
pub mod params;
pub mod population;
pub mod qt;
pub mod request;
pub mod rng;
pub mod sf;
pub mod site;
pub mod transform;

use crate::error::{DockError, Result};
use crate::model::Model;
use crate::params::ScoreMap;
use crate::population::Population;
use crate::request::SfRequest;
use crate::sf::SfNode;
use crate::site::DockingSite;
use crate::transform::TransformNode;

pub struct Workspace {
    name: String,
    models: Vec<Model>,
    site: Option<DockingSite>,
    sf: Option<SfNode>,
    transform: Option<TransformNode>,
    population: Option<Population>,
    next_stamp: u64,
}

impl Workspace {
    pub fn new(name: &str) -> Workspace {
        Workspace {
            name: name.to_string(),
            models: Vec::new(),
            site: None,
            sf: None,
            transform: None,
            population: None,
            next_stamp: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_models(&self) -> usize {
        self.models.len()
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut [Model] {
        &mut self.models
    }

    /// Disjoint borrows of the model slots and the scoring tree, for callers
    /// that need to score while mutating coordinates.
    pub fn models_and_sf(&mut self) -> (&mut [Model], Option<&SfNode>) {
        (&mut self.models, self.sf.as_ref())
    }

    pub fn get_model(&self, i: usize) -> Result<&Model> {
        self.models
            .get(i)
            .ok_or_else(|| DockError::bad_argument(format!("model index {} out of range", i)))
    }

    fn stamp(&mut self, model: &mut Model) {
        model.stamp = self.next_stamp;
        self.next_stamp += 1;
    }

    /// Replaces an existing model slot and notifies all observers.
    pub fn set_model(&mut self, i: usize, mut model: Model) -> Result<()> {
        if i >= self.models.len() {
            return Err(DockError::bad_argument(format!("model index {} out of range", i)));
        }
        self.stamp(&mut model);
        self.models[i] = model;
        self.notify();
        Ok(())
    }

    /// Appends models, growing the slot count.
    pub fn add_models(&mut self, models: Vec<Model>) {
        for mut model in models {
            self.stamp(&mut model);
            self.models.push(model);
        }
        self.notify();
    }

    /// Removes all models from index `i` to the end.
    pub fn remove_models(&mut self, i: usize) -> Result<()> {
        if i >= self.models.len() {
            return Err(DockError::bad_argument(format!("model index {} out of range", i)));
        }
        self.models.truncate(i);
        self.notify();
        Ok(())
    }

    fn ensure_slots(&mut self, n: usize) {
        while self.models.len() < n {
            self.models.push(Model::empty());
        }
    }

    pub fn set_receptor(&mut self, mut model: Model) {
        self.ensure_slots(1);
        self.stamp(&mut model);
        self.models[0] = model;
        self.notify();
    }

    pub fn set_ligand(&mut self, mut model: Model) {
        self.ensure_slots(2);
        self.stamp(&mut model);
        self.models[1] = model;
        self.notify();
    }

    /// Installs the explicit solvent models at slots 2+.
    pub fn set_solvent(&mut self, models: Vec<Model>) {
        self.models.truncate(2);
        self.ensure_slots(2);
        for mut model in models {
            self.stamp(&mut model);
            self.models.push(model);
        }
        self.notify();
    }

    pub fn docking_site(&self) -> Option<&DockingSite> {
        self.site.as_ref()
    }

    pub fn set_docking_site(&mut self, site: DockingSite) {
        self.site = Some(site);
    }

    pub fn sf(&self) -> Option<&SfNode> {
        self.sf.as_ref()
    }

    /// Installs the scoring tree; any prior tree is dropped (which detaches
    /// it) and the new one receives an immediate update so it can cache its
    /// per-model state.
    pub fn set_sf(&mut self, sf: SfNode) {
        self.sf = Some(sf);
        self.notify();
    }

    pub fn take_sf(&mut self) -> Option<SfNode> {
        self.sf.take()
    }

    pub fn transform(&self) -> Option<&TransformNode> {
        self.transform.as_ref()
    }

    pub fn set_transform(&mut self, transform: TransformNode) {
        self.transform = Some(transform);
        self.notify();
    }

    /// Runs the installed transform, if any.
    pub fn run(&mut self) -> Result<()> {
        match self.transform.take() {
            Some(mut transform) => {
                let result = transform.go(self);
                self.transform = Some(transform);
                result
            }
            None => Ok(()),
        }
    }

    /// Notifies observers of a structural change; terms compare per-slot
    /// stamps to find which model actually changed.
    fn notify(&mut self) {
        let Workspace {
            ref mut models,
            ref site,
            ref mut sf,
            ..
        } = *self;
        if let Some(sf) = sf {
            sf.update(models, site.as_ref());
        }
    }

    /// Current weighted score of the installed tree; zero without one.
    pub fn score(&self) -> f64 {
        match &self.sf {
            Some(sf) => sf.score(&self.models),
            None => 0.0,
        }
    }

    /// Full component breakdown keyed by dotted term names.
    pub fn score_map(&self) -> ScoreMap {
        let mut map = ScoreMap::new();
        if let Some(sf) = &self.sf {
            sf.score_map("", &self.models, &mut map);
        }
        map
    }

    pub fn handle_sf_request(&mut self, req: &SfRequest) {
        let Workspace {
            ref models,
            ref mut sf,
            ..
        } = *self;
        if let Some(sf) = sf {
            sf.handle_request(req, models, "");
        }
    }

    pub fn population(&self) -> Option<&Population> {
        self.population.as_ref()
    }

    pub fn set_population(&mut self, population: Population) {
        self.population = Some(population);
    }

    pub fn take_population(&mut self) -> Option<Population> {
        self.population.take()
    }

    pub fn clear_population(&mut self) {
        self.population = None;
    }

    /// Output hook; the base workspace takes no action. Drivers persist the
    /// models and score map through their own sinks.
    pub fn save(&self) {}

    /// History hook; the base workspace takes no action.
    pub fn save_history(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests_support::simple_rigid_model;
    use crate::sf::{ConstSf, SfAgg};

    #[test]
    fn model_slots_and_bounds() {
        let mut ws = Workspace::new("test");
        ws.set_receptor(simple_rigid_model());
        ws.set_ligand(simple_rigid_model());
        ws.set_solvent(vec![simple_rigid_model(), simple_rigid_model()]);
        assert_eq!(ws.num_models(), 4);
        assert!(ws.get_model(3).is_ok());
        assert!(ws.get_model(4).is_err());
        assert!(ws.set_model(9, simple_rigid_model()).is_err());
        ws.remove_models(2).unwrap();
        assert_eq!(ws.num_models(), 2);
    }

    #[test]
    fn stamps_are_unique_per_install() {
        let mut ws = Workspace::new("test");
        ws.set_receptor(simple_rigid_model());
        ws.set_ligand(simple_rigid_model());
        let s0 = ws.get_model(0).unwrap().stamp;
        let s1 = ws.get_model(1).unwrap().stamp;
        assert_ne!(s0, s1);
        ws.set_model(0, simple_rigid_model()).unwrap();
        assert_ne!(ws.get_model(0).unwrap().stamp, s0);
    }

    #[test]
    fn run_without_transform_is_ok() {
        let mut ws = Workspace::new("test");
        assert!(ws.run().is_ok());
    }

    #[test]
    fn score_without_sf_is_zero() {
        let ws = Workspace::new("test");
        assert_eq!(ws.score(), 0.0);
        assert!(ws.score_map().is_empty());
    }

    #[test]
    fn set_sf_scores_installed_models() {
        let mut ws = Workspace::new("test");
        ws.set_receptor(simple_rigid_model());
        ws.set_ligand(simple_rigid_model());
        let mut sf = SfAgg::new("score").into_node();
        sf.add(ConstSf::new("const").into_node()).unwrap();
        ws.set_sf(sf);
        assert!((ws.score() - 1.0).abs() < 1e-12);
    }
}
