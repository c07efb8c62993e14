//! Simulated-annealing Monte-Carlo minimiser with a geometric cooling
//! schedule and adaptive step size.

use log::{debug, warn};

use crate::chrom::Chromosome;
use crate::constants::{GAS_CONSTANT, KCAL_TO_J};
use crate::error::Result;
use crate::params::Value;
use crate::request::SfRequest;
use crate::rng;
use crate::transform::{TransformCore, TransformNode};
use crate::Workspace;

/// Monte-Carlo sampling statistics, per run and per block.
#[derive(Debug, Clone, Default)]
pub struct McStats {
    pub min: f64,
    pub max: f64,
    pub initial: f64,
    pub final_: f64,
    pub block_initial: f64,
    pub block_final: f64,
    pub block_min: f64,
    pub block_max: f64,
    total: f64,
    total2: f64,
    steps: usize,
    pub accepted: usize,
}

impl McStats {
    pub fn new() -> McStats {
        McStats::default()
    }

    pub fn init(&mut self, score: f64) {
        self.min = score;
        self.max = score;
        self.initial = score;
        self.final_ = score;
        self.init_block(score);
    }

    pub fn init_block(&mut self, score: f64) {
        self.block_min = score;
        self.block_max = score;
        self.block_initial = score;
        self.block_final = score;
        self.total = 0.0;
        self.total2 = 0.0;
        self.steps = 0;
        self.accepted = 0;
    }

    pub fn accumulate(&mut self, score: f64, accepted: bool) {
        self.steps += 1;
        if accepted {
            self.accepted += 1;
        }
        self.total += score;
        self.total2 += score * score;
        self.block_min = self.block_min.min(score);
        self.block_max = self.block_max.max(score);
        self.block_final = score;
        self.final_ = score;
        self.min = self.min.min(score);
        self.max = self.max.max(score);
    }

    pub fn mean(&self) -> f64 {
        self.total / self.steps as f64
    }

    pub fn variance(&self) -> f64 {
        self.total2 / self.steps as f64 - self.mean().powi(2)
    }

    pub fn acc_rate(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.accepted as f64 / self.steps as f64
        }
    }
}

#[derive(Debug)]
pub struct SimAnnTransform {
    pub core: TransformCore,
    start_t: f64,
    final_t: f64,
    block_length: usize,
    scale_chrom_length: bool,
    num_blocks: usize,
    step_size: f64,
    min_acc_rate: f64,
    partition_dist: f64,
    partition_freq: usize,
    history_freq: usize,
    pub stats: McStats,
    min_vector: Vec<f64>,
    last_good: Vec<f64>,
}

impl SimAnnTransform {
    pub fn new(name: &str) -> SimAnnTransform {
        let mut core = TransformCore::new(name);
        core.params.add("start-t", 1000.0);
        core.params.add("final-t", 300.0);
        core.params.add("block-length", 50i64);
        core.params.add("scale-chrom-length", true);
        core.params.add("num-blocks", 25i64);
        core.params.add("step-size", 1.0);
        core.params.add("min-acc-rate", 0.25);
        core.params.add("partition-dist", 0.0);
        core.params.add("partition-freq", 0i64);
        core.params.add("history-freq", 0i64);
        SimAnnTransform {
            core,
            start_t: 1000.0,
            final_t: 300.0,
            block_length: 50,
            scale_chrom_length: true,
            num_blocks: 25,
            step_size: 1.0,
            min_acc_rate: 0.25,
            partition_dist: 0.0,
            partition_freq: 0,
            history_freq: 0,
            stats: McStats::new(),
            min_vector: Vec::new(),
            last_good: Vec::new(),
        }
    }

    pub fn into_node(self) -> TransformNode {
        TransformNode::SimAnn(self)
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        if !self.core.params.is_present(name) {
            return Ok(false);
        }
        self.core.params.set(name, value.clone())?;
        let p = &self.core.params;
        match name {
            "start-t" => self.start_t = p.get_f64(name),
            "final-t" => self.final_t = p.get_f64(name),
            "block-length" => self.block_length = p.get_i64(name).max(0) as usize,
            "scale-chrom-length" => self.scale_chrom_length = p.get_bool(name),
            "num-blocks" => self.num_blocks = p.get_i64(name).max(0) as usize,
            "step-size" => self.step_size = p.get_f64(name),
            "min-acc-rate" => self.min_acc_rate = p.get_f64(name),
            "partition-dist" => self.partition_dist = p.get_f64(name),
            "partition-freq" => self.partition_freq = p.get_i64(name).max(0) as usize,
            "history-freq" => self.history_freq = p.get_i64(name).max(0) as usize,
            "enabled" => self.core.enabled = p.get_bool(name),
            _ => {}
        }
        Ok(true)
    }

    pub(crate) fn execute(&mut self, ws: &mut Workspace) -> Result<()> {
        if ws.sf().is_none() {
            return Ok(());
        }
        ws.clear_population();
        let mut chrom = Chromosome::from_models(ws.models(), ws.docking_site());
        if chrom.is_empty() {
            return Ok(());
        }
        chrom.sync_from_model(ws.models());

        let mut t = self.start_t;
        let mut step_size = self.step_size;
        let block_len = if self.scale_chrom_length {
            self.block_length * chrom.len()
        } else {
            self.block_length
        };
        // Cooling factor (guard nblocks = 1)
        let t_fac = if self.num_blocks > 1 {
            (self.final_t / t).powf(1.0 / (self.num_blocks - 1) as f64)
        } else {
            1.0
        };
        // Constant-temperature runs keep accumulating stats across blocks
        let init_block = (t - self.final_t).abs() > f64::EPSILON;

        // Partitioning request based on the current partition distance;
        // zero distance removes any partitioning
        ws.handle_sf_request(&SfRequest::partition(self.partition_dist));

        self.min_vector = chrom.get_vector();
        let score = ws.score();
        self.stats.init(score);
        debug!("{}: initial score = {:.3}, block length = {}", self.core.name(), score, block_len);

        for block in 1..=self.num_blocks {
            if init_block {
                self.stats.init_block(ws.score());
            }
            self.mc(ws, &mut chrom, t, block_len, step_size)?;
            debug!(
                "{}: block {} T={:.1} acc={:.3} step={:.3} final={:.3} min={:.3}",
                self.core.name(),
                block,
                t,
                self.stats.acc_rate(),
                step_size,
                self.stats.block_final,
                self.stats.block_min
            );
            // Halve the step size when the acceptance rate drops too low
            if self.stats.acc_rate() < self.min_acc_rate {
                step_size *= 0.5;
                if !init_block {
                    let s = ws.score();
                    self.stats.init_block(s);
                }
            }
            t *= t_fac;
        }
        // Restore the best chromosome and clear any partitioning
        chrom.set_vector(&self.min_vector)?;
        chrom.sync_to_model(ws.models_mut());
        ws.handle_sf_request(&SfRequest::partition(0.0));
        debug!("{}: final score = {:.3}", self.core.name(), ws.score());
        Ok(())
    }

    /// One block of Metropolis steps at fixed temperature.
    fn mc(
        &mut self,
        ws: &mut Workspace,
        chrom: &mut Chromosome,
        t: f64,
        block_len: usize,
        step_size: f64,
    ) -> Result<()> {
        let mut score = ws.score();
        self.last_good = chrom.get_vector();
        for step in 1..=block_len {
            chrom.mutate(step_size);
            chrom.sync_to_model(ws.models_mut());
            let new_score = ws.score();
            let delta = new_score - score;
            let metrop = delta < 0.0
                || (-KCAL_TO_J * delta / (GAS_CONSTANT * t)).exp() > rng::random01();
            if metrop {
                score = new_score;
                self.last_good = chrom.get_vector();
                if score < self.stats.min {
                    self.min_vector = chrom.get_vector();
                }
            } else {
                // Revert; the model resyncs on the next mutation
                chrom.set_vector(&self.last_good)?;
            }
            self.stats.accumulate(score, metrop);
            if self.history_freq > 0 && step % self.history_freq == 0 {
                ws.save_history();
            }
            // Refresh the partitioned interaction lists every nth accepted
            // trial (rejected trials leave the coordinates unchanged)
            if self.partition_freq > 0 && self.stats.accepted % self.partition_freq == 0 {
                ws.handle_sf_request(&SfRequest::partition(self.partition_dist));
                let old_score = score;
                score = ws.score();
                if (score - old_score).abs() > 0.001 {
                    warn!(
                        "{}: interaction lists updated, score changed by {:.4}",
                        self.core.name(),
                        score - old_score
                    );
                }
            }
        }
        // The model may hold a rejected pose if the last test failed
        chrom.sync_to_model(ws.models_mut());
        Ok(())
    }
}
