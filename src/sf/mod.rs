//! Scoring-function tree.
//!
//! Terms are a sum type composed under `SfAgg`. Full names are the
//! dot-joined ancestor chain ("score.inter.vdw"), computed by passing the
//! prefix down during traversal; a term belongs to exactly one parent by
//! ownership. A term's `score` is `weight * raw_score` when enabled, else 0.

pub mod cavity;
pub mod polar;
pub mod setup_polar;
pub mod vdw;

pub use cavity::CavityGridSf;
pub use polar::PolarIdxSf;
pub use setup_polar::SetupPolarSf;
pub use vdw::VdwIdxSf;

use log::warn;

use crate::error::{DockError, Result};
use crate::model::Model;
use crate::params::{accumulate, ParamMap, ScoreMap, Value};
use crate::request::SfRequest;
use crate::site::DockingSite;

/// Score-map branch for terms independent of the ligand identity.
pub const SYSTEM_SF: &str = "score.system";
/// Score-map branch for ligand intramolecular terms.
pub const INTRA_SF: &str = "score.intra";

/// State shared by every scoring term: name, weight, operating range and
/// enabled flag, mirrored from the parameter map.
#[derive(Debug, Clone)]
pub struct SfCore {
    name: String,
    pub weight: f64,
    pub range: f64,
    pub enabled: bool,
    pub params: ParamMap,
}

impl SfCore {
    pub fn new(name: &str) -> SfCore {
        let mut params = ParamMap::new();
        params.add("weight", 1.0);
        params.add("range", 10.0);
        params.add("enabled", true);
        SfCore {
            name: name.to_string(),
            weight: 1.0,
            range: 10.0,
            enabled: true,
            params,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self, prefix: &str) -> String {
        if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", prefix, self.name)
        }
    }

    /// Mirrors the common parameters; returns false for names this core does
    /// not own so the caller can try its own parameters.
    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        if !self.params.is_present(name) {
            return Ok(false);
        }
        self.params.set(name, value.clone())?;
        match name {
            "weight" => self.weight = self.params.get_f64("weight"),
            "range" => self.range = self.params.get_f64("range"),
            "enabled" => self.enabled = self.params.get_bool("enabled"),
            _ => {}
        }
        Ok(true)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        let _ = self.params.set("enabled", enabled);
    }
}

/// Per-slot revision stamps cached by intermolecular terms; the setup hooks
/// run only for slots whose installed model actually changed.
#[derive(Debug, Clone, Default)]
pub struct SlotCache {
    receptor: u64,
    ligand: u64,
    solvent: Vec<u64>,
}

pub struct SlotChanges {
    pub receptor: bool,
    pub ligand: bool,
    pub solvent: bool,
}

impl SlotCache {
    pub fn diff_and_update(&mut self, models: &[Model]) -> SlotChanges {
        let rec = models.first().map(|m| m.stamp).unwrap_or(0);
        let lig = models.get(1).map(|m| m.stamp).unwrap_or(0);
        let solv: Vec<u64> = models.iter().skip(2).map(|m| m.stamp).collect();
        let changes = SlotChanges {
            receptor: rec != self.receptor,
            ligand: lig != self.ligand,
            solvent: solv != self.solvent,
        };
        self.receptor = rec;
        self.ligand = lig;
        self.solvent = solv;
        changes
    }
}

#[derive(Debug)]
pub enum SfNode {
    Agg(SfAgg),
    Vdw(VdwIdxSf),
    Polar(PolarIdxSf),
    SetupPolar(SetupPolarSf),
    Cavity(CavityGridSf),
    Const(ConstSf),
}

impl SfNode {
    pub fn core(&self) -> &SfCore {
        match self {
            SfNode::Agg(n) => &n.core,
            SfNode::Vdw(n) => &n.core,
            SfNode::Polar(n) => &n.core,
            SfNode::SetupPolar(n) => &n.core,
            SfNode::Cavity(n) => &n.core,
            SfNode::Const(n) => &n.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut SfCore {
        match self {
            SfNode::Agg(n) => &mut n.core,
            SfNode::Vdw(n) => &mut n.core,
            SfNode::Polar(n) => &mut n.core,
            SfNode::SetupPolar(n) => &mut n.core,
            SfNode::Cavity(n) => &mut n.core,
            SfNode::Const(n) => &mut n.core,
        }
    }

    pub fn name(&self) -> &str {
        self.core().name()
    }

    pub fn is_agg(&self) -> bool {
        matches!(self, SfNode::Agg(_))
    }

    /// Adding to a non-aggregate is an invalid request.
    pub fn add(&mut self, child: SfNode) -> Result<()> {
        match self {
            SfNode::Agg(agg) => {
                agg.children.push(child);
                Ok(())
            }
            _ => Err(DockError::invalid_request(
                "add is invalid for non-aggregate scoring functions",
            )),
        }
    }

    pub fn num_children(&self) -> usize {
        match self {
            SfNode::Agg(agg) => agg.children.len(),
            _ => 0,
        }
    }

    pub fn raw_score(&self, models: &[Model]) -> f64 {
        match self {
            SfNode::Agg(n) => n.raw_score(models),
            SfNode::Vdw(n) => n.raw_score(models),
            SfNode::Polar(n) => n.raw_score(models),
            SfNode::SetupPolar(_) => 0.0,
            SfNode::Cavity(n) => n.raw_score(models),
            SfNode::Const(n) => n.raw_score(models),
        }
    }

    /// Weighted score; zero when disabled.
    pub fn score(&self, models: &[Model]) -> f64 {
        let core = self.core();
        if core.enabled {
            core.weight * self.raw_score(models)
        } else {
            0.0
        }
    }

    /// Records the unweighted raw score under this term's full name and adds
    /// the weighted score to the parent aggregate entry. Terms with system
    /// contributions override to divert those into `score.system`.
    pub fn score_map(&self, prefix: &str, models: &[Model], map: &mut ScoreMap) {
        if !self.core().enabled {
            return;
        }
        match self {
            SfNode::Agg(n) => n.score_map(prefix, models, map),
            SfNode::Vdw(n) => n.score_map(prefix, models, map),
            SfNode::Polar(n) => n.score_map(prefix, models, map),
            SfNode::SetupPolar(_) => {}
            SfNode::Cavity(n) => {
                default_score_map(&n.core, prefix, n.raw_score(models), map);
            }
            SfNode::Const(n) => n.score_map(prefix, models, map),
        }
    }

    /// Observer update: compares cached model stamps and re-runs the setup
    /// hooks for slots that changed. Aggregates recurse over children in
    /// insertion order but carry no model state themselves.
    pub fn update(&mut self, models: &mut [Model], site: Option<&DockingSite>) {
        match self {
            SfNode::Agg(n) => {
                for child in &mut n.children {
                    child.update(models, site);
                }
            }
            SfNode::Vdw(n) => n.update(models, site),
            SfNode::Polar(n) => n.update(models, site),
            SfNode::SetupPolar(n) => n.update(models),
            SfNode::Cavity(n) => n.update(models, site),
            SfNode::Const(_) => {}
        }
    }

    /// Request cascade: aggregates handle the request themselves first, then
    /// visit children in insertion order.
    pub fn handle_request(&mut self, req: &SfRequest, models: &[Model], prefix: &str) {
        let full = self.core().full_name(prefix);
        self.base_handle(req, &full);
        match self {
            SfNode::Agg(n) => {
                for child in &mut n.children {
                    child.handle_request(req, models, &full);
                }
            }
            SfNode::Vdw(n) => n.handle_partition(req, models, &full),
            SfNode::Polar(n) => n.handle_partition(req, models, &full),
            _ => {}
        }
    }

    fn base_handle(&mut self, req: &SfRequest, full: &str) {
        match req {
            SfRequest::Enable(name) => {
                if name == full {
                    self.core_mut().set_enabled(true);
                }
            }
            SfRequest::Disable(name) => {
                if name == full {
                    self.core_mut().set_enabled(false);
                }
            }
            SfRequest::SetParam { name, param, value } => {
                let applies = match name {
                    Some(n) => n == full,
                    None => true,
                };
                if applies {
                    match self.set_parameter(param, value) {
                        Ok(true) => {}
                        Ok(false) => {
                            // Global form skips terms that do not recognise
                            // the parameter
                            if name.is_some() {
                                warn!("{}: unrecognised parameter {}", full, param);
                            }
                        }
                        Err(e) => warn!("{}: {}", full, e),
                    }
                }
            }
            SfRequest::Partition { .. } => {}
        }
    }

    /// Sets a parameter, trying the term's own names first, then the shared
    /// core (weight / range / enabled). Returns false if unrecognised.
    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        match self {
            SfNode::Agg(n) => n.core.set_parameter(name, value),
            SfNode::Vdw(n) => n.set_parameter(name, value),
            SfNode::Polar(n) => n.set_parameter(name, value),
            SfNode::SetupPolar(n) => n.set_parameter(name, value),
            SfNode::Cavity(n) => n.set_parameter(name, value),
            SfNode::Const(n) => n.set_parameter(name, value),
        }
    }
}

/// Aggregate scoring function: owns its children and sums their weighted
/// scores. Aggregates have no model dependency of their own.
#[derive(Debug, Default)]
pub struct SfAgg {
    pub core: SfCore,
    pub children: Vec<SfNode>,
}

impl Default for SfCore {
    fn default() -> SfCore {
        SfCore::new("score")
    }
}

impl SfAgg {
    pub fn new(name: &str) -> SfAgg {
        SfAgg {
            core: SfCore::new(name),
            children: Vec::new(),
        }
    }

    pub fn into_node(self) -> SfNode {
        SfNode::Agg(self)
    }

    /// Note: children are themselves weighted.
    pub fn raw_score(&self, models: &[Model]) -> f64 {
        self.children.iter().map(|c| c.score(models)).sum()
    }

    fn score_map(&self, prefix: &str, models: &[Model], map: &mut ScoreMap) {
        let full = self.core.full_name(prefix);
        map.entry(full.clone()).or_insert(Value::Real(0.0));
        for child in &self.children {
            child.score_map(&full, models, map);
        }
        if !prefix.is_empty() {
            let total = map.get(&full).and_then(Value::as_f64).unwrap_or(0.0);
            accumulate(map, prefix, self.core.weight * total);
        }
    }
}

pub(crate) fn default_score_map(core: &SfCore, prefix: &str, raw: f64, map: &mut ScoreMap) {
    let full = core.full_name(prefix);
    map.insert(full, Value::Real(raw));
    if !prefix.is_empty() {
        accumulate(map, prefix, core.weight * raw);
    }
}

/// Writes a system (ligand-independent) contribution under
/// `score.system.<name>` and adds the weighted value to the `score.system`
/// total.
pub(crate) fn system_score_map(core: &SfCore, system_raw: f64, map: &mut ScoreMap) {
    if system_raw != 0.0 {
        let key = format!("{}.{}", SYSTEM_SF, core.name());
        map.insert(key, Value::Real(system_raw));
        accumulate(map, SYSTEM_SF, core.weight * system_raw);
    }
}

/// Constant score term: +1 per enabled ligand (translational entropy loss)
/// plus a penalty per enabled explicit solvent model.
#[derive(Debug)]
pub struct ConstSf {
    pub core: SfCore,
    solvent_penalty: f64,
}

impl ConstSf {
    pub fn new(name: &str) -> ConstSf {
        let mut core = SfCore::new(name);
        core.params.add("solvent-penalty", 0.5);
        ConstSf {
            core,
            solvent_penalty: 0.5,
        }
    }

    pub fn into_node(self) -> SfNode {
        SfNode::Const(self)
    }

    fn inter_score(&self, models: &[Model]) -> f64 {
        match models.get(1) {
            Some(lig) if !lig.is_empty() && lig.enabled => 1.0,
            _ => 0.0,
        }
    }

    fn system_score(&self, models: &[Model]) -> f64 {
        models
            .iter()
            .skip(2)
            .filter(|m| !m.is_empty() && m.enabled)
            .count() as f64
            * self.solvent_penalty
    }

    pub fn raw_score(&self, models: &[Model]) -> f64 {
        self.inter_score(models) + self.system_score(models)
    }

    fn score_map(&self, prefix: &str, models: &[Model], map: &mut ScoreMap) {
        default_score_map(&self.core, prefix, self.inter_score(models), map);
        system_score_map(&self.core, self.system_score(models), map);
    }

    fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        if name == "solvent-penalty" {
            self.core.params.set(name, value.clone())?;
            self.solvent_penalty = self.core.params.get_f64(name);
            Ok(true)
        } else {
            self.core.set_parameter(name, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests_support::simple_rigid_model;

    fn tree() -> SfNode {
        let mut root = SfAgg::new("score").into_node();
        let mut inter = SfAgg::new("inter").into_node();
        let mut c1 = ConstSf::new("const");
        c1.core.weight = 5.4;
        inter.add(c1.into_node()).unwrap();
        root.add(inter).unwrap();
        root
    }

    fn models() -> Vec<Model> {
        vec![simple_rigid_model(), simple_rigid_model()]
    }

    #[test]
    fn weighted_score_and_enable() {
        let models = models();
        let mut sf = tree();
        assert!((sf.raw_score(&models) - 5.4).abs() < 1e-12);
        sf.handle_request(&SfRequest::Disable("score.inter.const".into()), &models, "");
        assert_eq!(sf.raw_score(&models), 0.0);
        sf.handle_request(&SfRequest::Enable("score.inter.const".into()), &models, "");
        assert!((sf.raw_score(&models) - 5.4).abs() < 1e-12);
    }

    #[test]
    fn enable_disable_order_is_immaterial() {
        let models = models();
        let mut sf1 = tree();
        sf1.handle_request(&SfRequest::Disable("score.inter.const".into()), &models, "");
        sf1.handle_request(&SfRequest::Enable("score.inter.const".into()), &models, "");
        let mut sf2 = tree();
        sf2.handle_request(&SfRequest::Enable("score.inter.const".into()), &models, "");
        sf2.handle_request(&SfRequest::Disable("score.inter.const".into()), &models, "");
        sf2.handle_request(&SfRequest::Enable("score.inter.const".into()), &models, "");
        assert_eq!(sf1.raw_score(&models), sf2.raw_score(&models));
    }

    #[test]
    fn add_to_leaf_is_invalid_request() {
        let mut leaf = ConstSf::new("const").into_node();
        let err = leaf.add(ConstSf::new("other").into_node()).unwrap_err();
        assert!(matches!(err, DockError::InvalidRequest(_)));
    }

    #[test]
    fn score_map_accumulation_is_linear() {
        let models = models();
        let sf = tree();
        let mut map = ScoreMap::new();
        sf.score_map("", &models, &mut map);
        // score.inter = w_const * raw_const
        let inter = map["score.inter"].as_f64().unwrap();
        assert!((inter - 5.4).abs() < 1e-6);
        // score = w_inter * score.inter
        let total = map["score"].as_f64().unwrap();
        assert!((total - inter).abs() < 1e-6);
        // leaf entry is the unweighted raw score
        assert!((map["score.inter.const"].as_f64().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn set_param_request_by_full_name() {
        let models = models();
        let mut sf = tree();
        sf.handle_request(
            &SfRequest::set_param("score.inter.const", "weight", 2.0),
            &models,
            "",
        );
        assert!((sf.raw_score(&models) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn global_set_param_applies_to_recognising_terms() {
        let models = models();
        let mut sf = tree();
        sf.handle_request(&SfRequest::set_param_global("solvent-penalty", 1.25), &models, "");
        // No solvent installed, so score unchanged; but parameter mirrored
        assert!((sf.raw_score(&models) - 5.4).abs() < 1e-12);
    }
}
