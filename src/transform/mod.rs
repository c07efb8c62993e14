//! Search transforms.
//!
//! Transforms manipulate the workspace models through the chromosome and
//! repeatedly ask the scoring tree for scores. They compose under
//! `TransformAgg`, which fires its queued scoring-function requests before
//! running each child in insertion order.

mod ga;
mod rand_pop;
mod sim_ann;
mod simplex;

pub use ga::GaTransform;
pub use rand_pop::RandPopTransform;
pub use sim_ann::{McStats, SimAnnTransform};
pub use simplex::SimplexTransform;

use log::debug;

use crate::error::{DockError, Result};
use crate::params::{ParamMap, Value};
use crate::request::SfRequest;
use crate::rng;
use crate::Workspace;

/// State shared by every transform: name, enabled flag, declared parameters
/// and the queue of scoring-function requests fired before each execute.
#[derive(Debug, Clone)]
pub struct TransformCore {
    name: String,
    pub enabled: bool,
    pub params: ParamMap,
    requests: Vec<SfRequest>,
}

impl TransformCore {
    pub fn new(name: &str) -> TransformCore {
        let mut params = ParamMap::new();
        params.add("enabled", true);
        TransformCore {
            name: name.to_string(),
            enabled: true,
            params,
            requests: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        if !self.params.is_present(name) {
            return Ok(false);
        }
        self.params.set(name, value.clone())?;
        if name == "enabled" {
            self.enabled = self.params.get_bool("enabled");
        }
        Ok(true)
    }
}

#[derive(Debug)]
pub enum TransformNode {
    Null(NullTransform),
    Agg(TransformAgg),
    RandLig(RandLigTransform),
    RandPop(RandPopTransform),
    SimAnn(SimAnnTransform),
    Simplex(SimplexTransform),
    Ga(GaTransform),
}

impl TransformNode {
    pub fn core(&self) -> &TransformCore {
        match self {
            TransformNode::Null(t) => &t.core,
            TransformNode::Agg(t) => &t.core,
            TransformNode::RandLig(t) => &t.core,
            TransformNode::RandPop(t) => &t.core,
            TransformNode::SimAnn(t) => &t.core,
            TransformNode::Simplex(t) => &t.core,
            TransformNode::Ga(t) => &t.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut TransformCore {
        match self {
            TransformNode::Null(t) => &mut t.core,
            TransformNode::Agg(t) => &mut t.core,
            TransformNode::RandLig(t) => &mut t.core,
            TransformNode::RandPop(t) => &mut t.core,
            TransformNode::SimAnn(t) => &mut t.core,
            TransformNode::Simplex(t) => &mut t.core,
            TransformNode::Ga(t) => &mut t.core,
        }
    }

    pub fn name(&self) -> &str {
        self.core().name()
    }

    pub fn is_agg(&self) -> bool {
        matches!(self, TransformNode::Agg(_))
    }

    /// Adding to a non-aggregate is an invalid request.
    pub fn add(&mut self, child: TransformNode) -> Result<()> {
        match self {
            TransformNode::Agg(agg) => {
                agg.children.push(child);
                Ok(())
            }
            _ => Err(DockError::invalid_request(
                "add is invalid for non-aggregate transforms",
            )),
        }
    }

    /// Queues a request to fire at the workspace scoring function before
    /// every execute.
    pub fn queue_sf_request(&mut self, req: SfRequest) {
        self.core_mut().requests.push(req);
    }

    pub fn clear_sf_requests(&mut self) {
        self.core_mut().requests.clear();
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        match self {
            TransformNode::Null(t) => t.core.set_parameter(name, value),
            TransformNode::Agg(t) => t.core.set_parameter(name, value),
            TransformNode::RandLig(t) => t.core.set_parameter(name, value),
            TransformNode::RandPop(t) => t.set_parameter(name, value),
            TransformNode::SimAnn(t) => t.set_parameter(name, value),
            TransformNode::Simplex(t) => t.set_parameter(name, value),
            TransformNode::Ga(t) => t.set_parameter(name, value),
        }
    }

    /// Main entry: checks the enabled flag, fires queued scoring-function
    /// requests, then applies the transform.
    pub fn go(&mut self, ws: &mut Workspace) -> Result<()> {
        if !self.core().enabled {
            return Ok(());
        }
        let requests = self.core().requests.clone();
        for req in &requests {
            ws.handle_sf_request(req);
        }
        self.execute(ws)
    }

    fn execute(&mut self, ws: &mut Workspace) -> Result<()> {
        match self {
            TransformNode::Null(t) => t.execute(ws),
            TransformNode::Agg(t) => t.execute(ws),
            TransformNode::RandLig(t) => t.execute(ws),
            TransformNode::RandPop(t) => t.execute(ws),
            TransformNode::SimAnn(t) => t.execute(ws),
            TransformNode::Simplex(t) => t.execute(ws),
            TransformNode::Ga(t) => t.execute(ws),
        }
    }
}

/// Does nothing; useful as a placeholder in transform chains.
#[derive(Debug)]
pub struct NullTransform {
    pub core: TransformCore,
}

impl NullTransform {
    pub fn new(name: &str) -> NullTransform {
        NullTransform {
            core: TransformCore::new(name),
        }
    }

    pub fn into_node(self) -> TransformNode {
        TransformNode::Null(self)
    }

    fn execute(&mut self, ws: &mut Workspace) -> Result<()> {
        debug!("{}: score = {}", self.core.name(), ws.score());
        Ok(())
    }
}

/// Ordered list of child transforms plus the request queue semantics of the
/// base transform. `execute` runs every child's `go` in sequence.
#[derive(Debug)]
pub struct TransformAgg {
    pub core: TransformCore,
    pub children: Vec<TransformNode>,
}

impl TransformAgg {
    pub fn new(name: &str) -> TransformAgg {
        TransformAgg {
            core: TransformCore::new(name),
            children: Vec::new(),
        }
    }

    pub fn into_node(self) -> TransformNode {
        TransformNode::Agg(self)
    }

    fn execute(&mut self, ws: &mut Workspace) -> Result<()> {
        for child in &mut self.children {
            child.go(ws)?;
        }
        Ok(())
    }
}

/// Randomises every rotatable dihedral of the ligand once.
#[derive(Debug)]
pub struct RandLigTransform {
    pub core: TransformCore,
}

impl RandLigTransform {
    pub fn new(name: &str) -> RandLigTransform {
        RandLigTransform {
            core: TransformCore::new(name),
        }
    }

    pub fn into_node(self) -> TransformNode {
        TransformNode::RandLig(self)
    }

    fn execute(&mut self, ws: &mut Workspace) -> Result<()> {
        let models = ws.models_mut();
        if let Some(ligand) = models.get_mut(1) {
            for rb in ligand.rotatable_bonds().to_vec() {
                ligand.set_dihedral(&rb, rng::uniform(-180.0, 180.0));
            }
            ligand.update_pseudo_atoms();
        }
        Ok(())
    }
}
