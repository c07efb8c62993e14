//! Nelder-Mead simplex minimisation over the chromosome vector, with
//! per-DoF step sizes and a function-call budget.

use log::debug;

use crate::chrom::Chromosome;
use crate::error::Result;
use crate::model::Model;
use crate::params::Value;
use crate::request::SfRequest;
use crate::sf::SfNode;
use crate::transform::{TransformCore, TransformNode};
use crate::Workspace;

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;
const PENALTY_SCORE: f64 = 1.0e10;

/// Variable-step-length Nelder-Mead search over the scoring function.
struct NmSearch<'a> {
    sf: &'a SfNode,
    models: &'a mut [Model],
    chrom: &'a mut Chromosome,
    max_calls: usize,
    stopping_len: f64,
    calls: usize,
}

impl<'a> NmSearch<'a> {
    fn eval(&mut self, v: &[f64]) -> f64 {
        self.calls += 1;
        if self.chrom.set_vector(v).is_err() {
            return PENALTY_SCORE;
        }
        self.chrom.sync_to_model(self.models);
        self.sf.score(self.models)
    }

    /// Builds a right simplex around `start` using the per-DoF steps, then
    /// iterates until the call budget or the minimum edge length is reached.
    /// Returns the best vertex and its score.
    fn minimize(&mut self, start: &[f64], steps: &[f64]) -> (Vec<f64>, f64) {
        let n = start.len();
        let mut vertices: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        vertices.push(start.to_vec());
        for i in 0..n {
            let mut v = start.to_vec();
            v[i] += steps[i];
            vertices.push(v);
        }
        let mut values: Vec<f64> = Vec::with_capacity(n + 1);
        for v in &vertices {
            let value = self.eval(v);
            values.push(value);
        }

        loop {
            // Order: best first, worst last
            let mut order: Vec<usize> = (0..vertices.len()).collect();
            order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));
            let best = order[0];
            let worst = order[n];
            let second_worst = order[n - 1];

            if self.calls >= self.max_calls || self.edge_length(&vertices, best) < self.stopping_len {
                return (vertices[best].clone(), values[best]);
            }

            // Centroid of all vertices but the worst
            let mut centroid = vec![0.0; n];
            for &vi in order.iter().take(n) {
                for k in 0..n {
                    centroid[k] += vertices[vi][k];
                }
            }
            for c in &mut centroid {
                *c /= n as f64;
            }

            let reflected: Vec<f64> = (0..n)
                .map(|k| centroid[k] + REFLECT * (centroid[k] - vertices[worst][k]))
                .collect();
            let f_reflected = self.eval(&reflected);

            if f_reflected < values[best] {
                let expanded: Vec<f64> = (0..n)
                    .map(|k| centroid[k] + EXPAND * (centroid[k] - vertices[worst][k]))
                    .collect();
                let f_expanded = self.eval(&expanded);
                if f_expanded < f_reflected {
                    vertices[worst] = expanded;
                    values[worst] = f_expanded;
                } else {
                    vertices[worst] = reflected;
                    values[worst] = f_reflected;
                }
            } else if f_reflected < values[second_worst] {
                vertices[worst] = reflected;
                values[worst] = f_reflected;
            } else {
                let contracted: Vec<f64> = (0..n)
                    .map(|k| centroid[k] + CONTRACT * (vertices[worst][k] - centroid[k]))
                    .collect();
                let f_contracted = self.eval(&contracted);
                if f_contracted < values[worst] {
                    vertices[worst] = contracted;
                    values[worst] = f_contracted;
                } else {
                    // Shrink everything toward the best vertex
                    let best_vertex = vertices[best].clone();
                    for vi in 0..vertices.len() {
                        if vi == best {
                            continue;
                        }
                        for k in 0..n {
                            vertices[vi][k] =
                                best_vertex[k] + SHRINK * (vertices[vi][k] - best_vertex[k]);
                        }
                        values[vi] = self.eval(&vertices[vi].clone());
                    }
                }
            }
        }
    }

    /// Longest distance from the best vertex to any other.
    fn edge_length(&self, vertices: &[Vec<f64>], best: usize) -> f64 {
        let mut max_len2: f64 = 0.0;
        for (vi, v) in vertices.iter().enumerate() {
            if vi == best {
                continue;
            }
            let len2: f64 = v
                .iter()
                .zip(&vertices[best])
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            max_len2 = max_len2.max(len2);
        }
        max_len2.sqrt()
    }
}

#[derive(Debug)]
pub struct SimplexTransform {
    pub core: TransformCore,
    max_calls: usize,
    n_cycles: usize,
    stopping_step_length: f64,
    partition_dist: f64,
    step_size: f64,
    convergence: f64,
}

impl SimplexTransform {
    pub fn new(name: &str) -> SimplexTransform {
        let mut core = TransformCore::new(name);
        core.params.add("max-calls", 200i64);
        core.params.add("ncycles", 5i64);
        core.params.add("stopping-step-length", 1.0e-3);
        core.params.add("partition-dist", 0.0);
        core.params.add("step-size", 0.1);
        core.params.add("convergence", 0.001);
        SimplexTransform {
            core,
            max_calls: 200,
            n_cycles: 5,
            stopping_step_length: 1.0e-3,
            partition_dist: 0.0,
            step_size: 0.1,
            convergence: 0.001,
        }
    }

    pub fn into_node(self) -> TransformNode {
        TransformNode::Simplex(self)
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<bool> {
        if !self.core.params.is_present(name) {
            return Ok(false);
        }
        self.core.params.set(name, value.clone())?;
        let p = &self.core.params;
        match name {
            "max-calls" => self.max_calls = p.get_i64(name).max(0) as usize,
            "ncycles" => self.n_cycles = p.get_i64(name).max(0) as usize,
            "stopping-step-length" => self.stopping_step_length = p.get_f64(name),
            "partition-dist" => self.partition_dist = p.get_f64(name),
            "step-size" => self.step_size = p.get_f64(name),
            "convergence" => self.convergence = p.get_f64(name),
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
        ws.handle_sf_request(&SfRequest::partition(self.partition_dist));
        chrom.sync_from_model(ws.models());

        let steps: Vec<f64> = chrom
            .get_step_vector()
            .into_iter()
            .map(|s| s * self.step_size)
            .collect();

        let init_score = ws.score();
        let mut min = init_score;
        let mut total_calls = 0;
        // Initialise so the loop does not terminate immediately
        let mut delta = -self.convergence - 1.0;

        for cycle in 0..self.n_cycles {
            if delta >= -self.convergence {
                break;
            }
            if self.partition_dist > 0.0 {
                ws.handle_sf_request(&SfRequest::partition(self.partition_dist));
            }
            let start = chrom.get_vector();
            let (min_point, new_min) = {
                let (models, sf) = ws.models_and_sf();
                let sf = sf.expect("scoring function checked above");
                let mut search = NmSearch {
                    sf,
                    models,
                    chrom: &mut chrom,
                    max_calls: self.max_calls,
                    stopping_len: self.stopping_step_length,
                    calls: 0,
                };
                let result = search.minimize(&start, &steps);
                total_calls += search.calls;
                result
            };
            delta = new_min - min;
            min = new_min;
            chrom.set_vector(&min_point)?;
            debug!(
                "{}: cycle {} calls={} score={:.3} delta={:.4}",
                self.core.name(),
                cycle,
                total_calls,
                new_min,
                delta
            );
        }
        chrom.sync_to_model(ws.models_mut());
        ws.handle_sf_request(&SfRequest::partition(0.0));
        debug!(
            "{}: final score = {:.3} (initial {:.3}, {} calls)",
            self.core.name(),
            ws.score(),
            init_score,
            total_calls
        );
        Ok(())
    }
}
