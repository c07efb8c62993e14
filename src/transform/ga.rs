//! Generational genetic algorithm over the workspace population.

use log::debug;

use crate::error::Result;
use crate::params::Value;
use crate::request::SfRequest;
use crate::transform::{TransformCore, TransformNode};
use crate::Workspace;

#[derive(Debug)]
pub struct GaTransform {
    pub core: TransformCore,
    new_fraction: f64,
    p_crossover: f64,
    xover_mutate: bool,
    cauchy_mutate: bool,
    step_size: f64,
    equality_threshold: f64,
    n_cycles: usize,
    n_convergence: usize,
    history_freq: usize,
}

impl GaTransform {
    pub fn new(name: &str) -> GaTransform {
        let mut core = TransformCore::new(name);
        core.params.add("new-fraction", 0.5);
        core.params.add("pcrossover", 0.4);
        core.params.add("xovermut", true);
        core.params.add("cmutate", false);
        core.params.add("step-size", 1.0);
        core.params.add("equality-threshold", 0.1);
        core.params.add("ncycles", 100i64);
        core.params.add("nconvergence", 6i64);
        core.params.add("history-freq", 0i64);
        GaTransform {
            core,
            new_fraction: 0.5,
            p_crossover: 0.4,
            xover_mutate: true,
            cauchy_mutate: false,
            step_size: 1.0,
            equality_threshold: 0.1,
            n_cycles: 100,
            n_convergence: 6,
            history_freq: 0,
        }
    }

    pub fn into_node(self) -> TransformNode {
        TransformNode::Ga(self)
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        if !self.core.params.is_present(name) {
            return Ok(false);
        }
        self.core.params.set(name, value.clone())?;
        let p = &self.core.params;
        match name {
            "new-fraction" => self.new_fraction = p.get_f64(name),
            "pcrossover" => self.p_crossover = p.get_f64(name),
            "xovermut" => self.xover_mutate = p.get_bool(name),
            "cmutate" => self.cauchy_mutate = p.get_bool(name),
            "step-size" => self.step_size = p.get_f64(name),
            "equality-threshold" => self.equality_threshold = p.get_f64(name),
            "ncycles" => self.n_cycles = p.get_i64(name).max(0) as usize,
            "nconvergence" => self.n_convergence = p.get_i64(name).max(0) as usize,
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
        let mut pop = match ws.take_population() {
            Some(pop) if pop.max_size() >= 1 => pop,
            _ => return Ok(()),
        };
        // The GA cannot tolerate partitioning: chromosomes move arbitrarily
        // far between steps
        ws.handle_sf_request(&SfRequest::partition(0.0));
        // Force a rescore in case the scoring function has changed between
        // stages
        {
            let (models, sf) = ws.models_and_sf();
            pop.rescore(sf.expect("scoring function checked above"), models);
        }

        let n_repl = (self.new_fraction * pop.max_size() as f64) as usize;
        let mut best_score = pop.best().score();
        let mut convergence = 0;
        debug!(
            "{}: init best={:.3} mean={:.3} var={:.3}",
            self.core.name(),
            best_score,
            pop.score_mean(),
            pop.score_variance()
        );

        for cycle in 0..self.n_cycles {
            if convergence >= self.n_convergence {
                break;
            }
            if self.history_freq > 0 && cycle % self.history_freq == 0 {
                pop.best().chrom().sync_to_model(ws.models_mut());
                ws.save_history();
            }
            {
                let (models, sf) = ws.models_and_sf();
                pop.ga_step(
                    n_repl,
                    self.step_size,
                    self.equality_threshold,
                    self.p_crossover,
                    self.xover_mutate,
                    self.cauchy_mutate,
                    sf.expect("scoring function checked above"),
                    models,
                )?;
            }
            let score = pop.best().score();
            if score > best_score {
                best_score = score;
                convergence = 0;
            } else {
                convergence += 1;
            }
            debug!(
                "{}: cycle {} conv {} best={:.3} mean={:.3} var={:.3}",
                self.core.name(),
                cycle,
                convergence,
                score,
                pop.score_mean(),
                pop.score_variance()
            );
        }
        pop.best().chrom().sync_to_model(ws.models_mut());
        ws.set_population(pop);
        Ok(())
    }
}
