//! GA population management.
//!
//! A genome is a cloned chromosome with its cached raw score and scaled
//! fitness. Raw scores are negated energies, so the population is kept
//! sorted descending by raw score with the best (lowest-energy) genome at
//! element zero. Selection runs on sigma-truncated roulette fitness.

use log::debug;

use crate::chrom::Chromosome;
use crate::constants::{MAX_TOURNAMENT_ATTEMPTS, SIGMA_TRUNCATION, TOURNAMENT_WIN_P};
use crate::error::{DockError, Result};
use crate::model::Model;
use crate::rng;
use crate::sf::SfNode;

#[derive(Debug, Clone)]
pub struct Genome {
    chrom: Chromosome,
    score: f64,
    fitness: f64,
}

impl Genome {
    pub fn new(chrom: Chromosome) -> Genome {
        Genome {
            chrom,
            score: 0.0,
            fitness: 0.0,
        }
    }

    /// Raw score: the negated scoring-function energy.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Energy corresponding to the raw score.
    pub fn energy(&self) -> f64 {
        -self.score
    }

    pub fn chrom(&self) -> &Chromosome {
        &self.chrom
    }

    pub fn chrom_mut(&mut self) -> &mut Chromosome {
        &mut self.chrom
    }

    /// Syncs the chromosome into the models and caches the negated score.
    pub fn evaluate(&mut self, sf: &SfNode, models: &mut [Model]) {
        self.chrom.sync_to_model(models);
        self.score = -sf.score(models);
    }

    pub fn equals(&self, other: &Genome, threshold: f64) -> bool {
        match self.chrom.compare_vector(&other.chrom.get_vector()) {
            Ok(diff) => diff <= threshold,
            Err(_) => false,
        }
    }
}

#[derive(Debug)]
pub struct Population {
    pop: Vec<Genome>,
    max_size: usize,
    /// Sigma truncation multiplier.
    c: f64,
    score_mean: f64,
    score_variance: f64,
    /// Roulette-wheel cumulative over scaled fitnesses.
    rw_cum: Vec<f64>,
}

impl Population {
    /// Clones the seed chromosome `size` times, randomises and scores each
    /// genome, and leaves the models synced to the fittest.
    pub fn new(
        seed: &Chromosome,
        size: usize,
        sf: &SfNode,
        models: &mut [Model],
    ) -> Result<Population> {
        if size == 0 {
            return Err(DockError::bad_argument("population size must be positive"));
        }
        if seed.is_empty() {
            return Err(DockError::bad_argument("seed chromosome is empty"));
        }
        let mut pop = Vec::with_capacity(size);
        for _ in 0..size {
            let mut chrom = seed.clone();
            chrom.randomise();
            let mut genome = Genome::new(chrom);
            genome.evaluate(sf, models);
            pop.push(genome);
        }
        let mut population = Population {
            pop,
            max_size: size,
            c: SIGMA_TRUNCATION,
            score_mean: 0.0,
            score_variance: 0.0,
            rw_cum: Vec::new(),
        };
        population.sort_and_refit();
        population.sync_best(models);
        Ok(population)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.pop.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pop.is_empty()
    }

    pub fn best(&self) -> &Genome {
        &self.pop[0]
    }

    pub fn genomes(&self) -> &[Genome] {
        &self.pop
    }

    pub fn score_mean(&self) -> f64 {
        self.score_mean
    }

    pub fn score_variance(&self) -> f64 {
        self.score_variance
    }

    /// Rescores every genome; call whenever the scoring function has changed
    /// between search stages.
    pub fn rescore(&mut self, sf: &SfNode, models: &mut [Model]) {
        for genome in &mut self.pop {
            genome.evaluate(sf, models);
        }
        self.sort_and_refit();
        self.sync_best(models);
    }

    fn sync_best(&self, models: &mut [Model]) {
        self.pop[0].chrom.sync_to_model(models);
    }

    fn sort_and_refit(&mut self) {
        self.pop.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let n = self.pop.len() as f64;
        let total: f64 = self.pop.iter().map(|g| g.score).sum();
        self.score_mean = total / n;
        let var: f64 = self
            .pop
            .iter()
            .map(|g| (g.score - self.score_mean).powi(2))
            .sum::<f64>()
            / n;
        self.score_variance = var;
        // Sigma truncation keeps the fitness scale positive
        let offset = self.score_mean - self.c * var.sqrt();
        let mut cum = 0.0;
        self.rw_cum.clear();
        for genome in &mut self.pop {
            genome.fitness = (genome.score - offset).max(0.0);
            cum += genome.fitness;
            self.rw_cum.push(cum);
        }
        if cum <= 0.0 {
            // Degenerate population: uniform wheel
            for (i, slot) in self.rw_cum.iter_mut().enumerate() {
                *slot = (i + 1) as f64;
            }
        }
    }

    /// Binary search on the cumulative fitness array.
    pub fn roulette_wheel_select(&self) -> usize {
        let total = *self.rw_cum.last().unwrap_or(&0.0);
        let r = rng::random01() * total;
        self.rw_cum.partition_point(|&cum| cum < r).min(self.pop.len() - 1)
    }

    /// Tournament of two: the fitter candidate wins with fixed probability.
    fn tournament_select(&self) -> usize {
        let a = rng::random_index(self.pop.len());
        let b = rng::random_index(self.pop.len());
        let (better, worse) = if self.pop[a].score >= self.pop[b].score {
            (a, b)
        } else {
            (b, a)
        };
        if rng::random01() < TOURNAMENT_WIN_P {
            better
        } else {
            worse
        }
    }

    /// Selects two parents whose chromosomes actually differ. A uniform
    /// population makes this impossible and is a fatal condition for the
    /// current run.
    fn select_distinct_parents(&self, threshold: f64) -> Result<(usize, usize)> {
        for _ in 0..MAX_TOURNAMENT_ATTEMPTS {
            let p1 = self.tournament_select();
            let p2 = self.tournament_select();
            if p1 != p2 && !self.pop[p1].equals(&self.pop[p2], threshold) {
                return Ok((p1, p2));
            }
        }
        Err(DockError::bad_argument(
            "unable to select distinct parents: population has converged to a single genome",
        ))
    }

    /// One GA iteration: breed `n_replicates - 1` offspring by tournament
    /// selection with crossover/mutation, carry over the current best, merge
    /// with the old population, deduplicate and truncate to the maximum size.
    pub fn ga_step(
        &mut self,
        n_replicates: usize,
        rel_step: f64,
        equality_threshold: f64,
        p_cross: f64,
        xover_mutate: bool,
        cauchy_mutate: bool,
        sf: &SfNode,
        models: &mut [Model],
    ) -> Result<()> {
        if self.pop.is_empty() {
            return Err(DockError::bad_argument("ga_step on empty population"));
        }
        let mut new_pop = Vec::with_capacity(n_replicates);
        for _ in 0..n_replicates.saturating_sub(1) {
            let mut child = if rng::random01() < p_cross {
                let (p1, p2) = self.select_distinct_parents(equality_threshold)?;
                let mut child = crossover(&self.pop[p1].chrom, &self.pop[p2].chrom)?;
                if xover_mutate {
                    child.set_cauchy(cauchy_mutate);
                    child.mutate(rel_step);
                }
                child
            } else {
                let p = self.tournament_select();
                let mut child = self.pop[p].chrom.clone();
                child.set_cauchy(cauchy_mutate);
                child.mutate(rel_step);
                child
            };
            child.set_cauchy(false);
            let mut genome = Genome::new(child);
            genome.evaluate(sf, models);
            new_pop.push(genome);
        }
        // Elitism: the current best always survives
        new_pop.push(self.pop[0].clone());
        self.merge(new_pop, equality_threshold);
        self.sort_and_refit();
        self.sync_best(models);
        debug!(
            "ga_step: best={:.3} mean={:.3} var={:.3} size={}",
            self.pop[0].score, self.score_mean, self.score_variance, self.pop.len()
        );
        Ok(())
    }

    /// Merges offspring into the population, dropping genomes that duplicate
    /// a better one (chromosome equality, not score equality), and truncates
    /// to the maximum size.
    fn merge(&mut self, new_pop: Vec<Genome>, threshold: f64) {
        let mut combined = std::mem::take(&mut self.pop);
        combined.extend(new_pop);
        combined.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut unique: Vec<Genome> = Vec::with_capacity(self.max_size);
        for genome in combined {
            if unique.len() >= self.max_size {
                break;
            }
            if !unique.iter().any(|kept| kept.equals(&genome, threshold)) {
                unique.push(genome);
            }
        }
        self.pop = unique;
    }
}

/// Single-point crossover over the crossover-group boundaries, so coupled
/// DoFs (translation triples, quaternions) recombine as blocks.
pub fn crossover(a: &Chromosome, b: &Chromosome) -> Result<Chromosome> {
    let groups = a.xover_group_sizes();
    if groups != b.xover_group_sizes() {
        return Err(DockError::bad_argument("crossover of incompatible chromosomes"));
    }
    let va = a.get_vector();
    let vb = b.get_vector();
    if groups.len() < 2 {
        return Ok(a.clone());
    }
    let cut_group = rng::random_index(groups.len() - 1) + 1;
    let cut: usize = groups[..cut_group].iter().sum();
    let mut child_vec = Vec::with_capacity(va.len());
    child_vec.extend_from_slice(&va[..cut]);
    child_vec.extend_from_slice(&vb[cut..]);
    let mut child = a.clone();
    child.set_vector(&child_vec)?;
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::model::tests_support::{test_atom, test_bond};
    use crate::model::{ModelFlex, TetherMode};
    use crate::sf::{ConstSf, SfAgg};

    fn ligand() -> Model {
        let atoms = vec![
            test_atom("C0", 6, Vec3::new(0.0, 0.0, 0.0)),
            test_atom("C1", 6, Vec3::new(1.5, 0.0, 0.0)),
            test_atom("C2", 6, Vec3::new(2.2, 1.3, 0.0)),
            test_atom("C3", 6, Vec3::new(3.7, 1.3, 0.4)),
        ];
        let bonds = vec![test_bond(0, 1, false), test_bond(1, 2, true), test_bond(2, 3, false)];
        Model::new(
            "lig",
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

    fn setup() -> (Vec<Model>, Chromosome, SfNode) {
        let models = vec![Model::empty(), ligand()];
        let chrom = Chromosome::from_models(&models, None);
        let mut sf = SfAgg::new("score").into_node();
        sf.add(ConstSf::new("const").into_node()).unwrap();
        (models, chrom, sf)
    }

    #[test]
    fn population_is_sorted_and_sized() {
        crate::rng::seed(42);
        let (mut models, chrom, sf) = setup();
        let pop = Population::new(&chrom, 20, &sf, &mut models).unwrap();
        assert_eq!(pop.len(), 20);
        assert_eq!(pop.max_size(), 20);
        for pair in pop.genomes().windows(2) {
            assert!(pair[0].score() >= pair[1].score());
        }
    }

    #[test]
    fn zero_size_population_is_bad_argument() {
        crate::rng::seed(42);
        let (mut models, chrom, sf) = setup();
        assert!(Population::new(&chrom, 0, &sf, &mut models).is_err());
    }

    #[test]
    fn ga_step_keeps_size_and_order() {
        crate::rng::seed(314);
        let (mut models, chrom, sf) = setup();
        let mut pop = Population::new(&chrom, 16, &sf, &mut models).unwrap();
        for _ in 0..5 {
            pop.ga_step(8, 1.0, 0.1, 0.4, true, false, &sf, &mut models)
                .unwrap();
            assert_eq!(pop.len(), 16);
            for pair in pop.genomes().windows(2) {
                assert!(pair[0].score() >= pair[1].score());
            }
        }
    }

    #[test]
    fn elitism_never_loses_the_best() {
        crate::rng::seed(2718);
        let (mut models, chrom, sf) = setup();
        let mut pop = Population::new(&chrom, 12, &sf, &mut models).unwrap();
        let mut best = pop.best().score();
        for _ in 0..10 {
            pop.ga_step(6, 1.0, 0.1, 0.5, false, false, &sf, &mut models)
                .unwrap();
            assert!(pop.best().score() >= best - 1e-12);
            best = pop.best().score();
        }
    }

    #[test]
    fn crossover_preserves_group_boundaries() {
        crate::rng::seed(99);
        let (mut models, mut chrom, _sf) = setup();
        chrom.sync_from_model(&models);
        let mut a = chrom.clone();
        let mut b = chrom.clone();
        a.randomise();
        b.randomise();
        let child = crossover(&a, &b).unwrap();
        let va = a.get_vector();
        let vb = b.get_vector();
        let vc = child.get_vector();
        // Every quaternion block comes intact from one parent
        let close = |x: &[f64], y: &[f64]| x.iter().zip(y).all(|(a, b)| (a - b).abs() < 1e-9);
        let q_a = &va[4..8];
        let q_b = &vb[4..8];
        let q_c = &vc[4..8];
        assert!(close(q_c, q_a) || close(q_c, q_b));
        let _ = &mut models;
    }

    #[test]
    fn roulette_selection_is_in_bounds() {
        crate::rng::seed(7);
        let (mut models, chrom, sf) = setup();
        let pop = Population::new(&chrom, 10, &sf, &mut models).unwrap();
        for _ in 0..100 {
            assert!(pop.roulette_wheel_select() < pop.len());
        }
    }
}
