//! Builds a randomised GA population and installs it in the workspace.

use log::debug;

use crate::chrom::Chromosome;
use crate::error::Result;
use crate::params::Value;
use crate::population::Population;
use crate::transform::{TransformCore, TransformNode};
use crate::Workspace;

#[derive(Debug)]
pub struct RandPopTransform {
    pub core: TransformCore,
    pop_size: usize,
    scale_chrom_length: bool,
}

impl RandPopTransform {
    pub fn new(name: &str) -> RandPopTransform {
        let mut core = TransformCore::new(name);
        core.params.add("pop-size", 50i64);
        core.params.add("scale-chrom-length", true);
        RandPopTransform {
            core,
            pop_size: 50,
            scale_chrom_length: true,
        }
    }

    pub fn into_node(self) -> TransformNode {
        TransformNode::RandPop(self)
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        if !self.core.params.is_present(name) {
            return Ok(false);
        }
        self.core.params.set(name, value.clone())?;
        let p = &self.core.params;
        match name {
            "pop-size" => self.pop_size = p.get_i64(name).max(0) as usize,
            "scale-chrom-length" => self.scale_chrom_length = p.get_bool(name),
            "enabled" => self.core.enabled = p.get_bool(name),
            _ => {}
        }
        Ok(true)
    }

    pub(crate) fn execute(&mut self, ws: &mut Workspace) -> Result<()> {
        if ws.sf().is_none() {
            return Ok(());
        }
        let chrom = Chromosome::from_models(ws.models(), ws.docking_site());
        if chrom.is_empty() {
            return Ok(());
        }
        let pop_size = if self.scale_chrom_length {
            self.pop_size * chrom.len()
        } else {
            self.pop_size
        };
        debug!("{}: creating population of {}", self.core.name(), pop_size);
        let pop = {
            let (models, sf) = ws.models_and_sf();
            let sf = sf.expect("scoring function checked above");
            Population::new(&chrom, pop_size, sf, models)?
        };
        ws.set_population(pop);
        Ok(())
    }
}
