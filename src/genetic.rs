use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// A candidate layout: the induct checkpoints (indices into the full map's
/// list) that stay open, plus the score of the last evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chromosome {
    checkpoints: Vec<usize>,
    induct_count: usize,
    score: Option<f64>,
}

impl Chromosome {
    /// Keeps a random `ratio` share of `induct_count` checkpoints, at least one.
    pub fn random<R: Rng + ?Sized>(induct_count: usize, ratio: f64, rng: &mut R) -> Self {
        let keep = ((induct_count as f64 * ratio) as usize).clamp(1, induct_count.max(1));
        let mut checkpoints: Vec<usize> = (0..induct_count).collect();
        checkpoints.shuffle(rng);
        checkpoints.truncate(keep);
        Chromosome {
            checkpoints,
            induct_count,
            score: None,
        }
    }

    pub fn checkpoints(&self) -> &[usize] {
        &self.checkpoints
    }

    /// `None` until evaluated, or if the layout could not finish its runs.
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn set_score(&mut self, score: Option<f64>) {
        self.score = score;
    }

    /// Pulls in checkpoints that `other` keeps and `self` doesn't, each slot
    /// being replaced with probability `entropy`.
    pub fn crossover<R: Rng + ?Sized>(&mut self, other: &Chromosome, entropy: f64, rng: &mut R) {
        let own: BTreeSet<usize> = self.checkpoints.iter().copied().collect();
        let mut difference: Vec<usize> = other
            .checkpoints
            .iter()
            .copied()
            .filter(|checkpoint| !own.contains(checkpoint))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        for checkpoint in &mut self.checkpoints {
            if difference.is_empty() {
                break;
            }
            if rng.gen::<f64>() < entropy {
                *checkpoint = difference.remove(rng.gen_range(0..difference.len()));
            }
        }
    }

    pub fn mutate<R: Rng + ?Sized>(&mut self, entropy: f64, rng: &mut R) {
        self.mutation_swap(entropy, rng);
        self.mutation_shift(entropy, rng);
    }

    /// Trades kept checkpoints for unused ones.
    fn mutation_swap<R: Rng + ?Sized>(&mut self, entropy: f64, rng: &mut R) {
        let mut unused: BTreeSet<usize> = (0..self.induct_count).collect();
        for checkpoint in &self.checkpoints {
            unused.remove(checkpoint);
        }

        for checkpoint in &mut self.checkpoints {
            if unused.is_empty() {
                break;
            }
            if rng.gen::<f64>() < entropy {
                let Some(&replacement) = unused.iter().nth(rng.gen_range(0..unused.len())) else {
                    break;
                };
                unused.remove(&replacement);
                unused.insert(*checkpoint);
                *checkpoint = replacement;
            }
        }
    }

    /// Rotates every kept checkpoint index by the same random offset.
    fn mutation_shift<R: Rng + ?Sized>(&mut self, entropy: f64, rng: &mut R) {
        if self.induct_count == 0 || rng.gen::<f64>() >= entropy {
            return;
        }
        let shift = rng.gen_range(0..self.induct_count);
        for checkpoint in &mut self.checkpoints {
            *checkpoint = (*checkpoint + shift) % self.induct_count;
        }
    }
}

fn by_score(lhs: &Chromosome, rhs: &Chromosome) -> Ordering {
    lhs.score.partial_cmp(&rhs.score).unwrap_or(Ordering::Equal)
}

/// Population of candidate layouts, scored by the caller between generations.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    chromosomes: Vec<Chromosome>,
    entropy: f64,
}

impl Generation {
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        induct_count: usize,
        ratio: f64,
        entropy: f64,
        rng: &mut R,
    ) -> Self {
        Generation {
            chromosomes: (0..size)
                .map(|_| Chromosome::random(induct_count, ratio, rng))
                .collect(),
            entropy,
        }
    }

    pub fn chromosomes(&self) -> &[Chromosome] {
        &self.chromosomes
    }

    pub fn set_score(&mut self, index: usize, score: Option<f64>) {
        if let Some(chromosome) = self.chromosomes.get_mut(index) {
            chromosome.set_score(score);
        }
    }

    /// Highest scored chromosome; the first one on ties.
    pub fn best(&self) -> Option<&Chromosome> {
        self.chromosomes.iter().rev().max_by(|lhs, rhs| by_score(lhs, rhs))
    }

    /// Next generation: roulette selection by score, mutation, pairwise
    /// crossover, and the best chromosome of this generation carried over
    /// unchanged. Scores are cleared.
    pub fn evolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Generation {
        let Some(best) = self.best() else {
            return self.clone();
        };
        let size = self.chromosomes.len();
        let weights: Vec<f64> = self
            .chromosomes
            .iter()
            .map(|chromosome| chromosome.score.unwrap_or(0.0).max(0.0))
            .collect();
        let roulette = WeightedIndex::new(&weights).ok();
        if roulette.is_none() {
            debug!("no chromosome scored, select uniformly");
        }

        let mut chromosomes: Vec<Chromosome> = (1..size)
            .map(|_| {
                let index = match &roulette {
                    Some(roulette) => roulette.sample(rng),
                    None => rng.gen_range(0..size),
                };
                self.chromosomes[index].clone()
            })
            .collect();

        for chromosome in &mut chromosomes {
            chromosome.mutate(self.entropy, rng);
        }
        for index in 0..chromosomes.len() {
            for other in 0..chromosomes.len() {
                if index != other {
                    let donor = chromosomes[other].clone();
                    chromosomes[index].crossover(&donor, self.entropy, rng);
                }
            }
        }

        chromosomes.push(best.clone());
        for chromosome in &mut chromosomes {
            chromosome.score = None;
        }
        trace!("evolved generation: {chromosomes:?}");
        Generation {
            chromosomes,
            entropy: self.entropy,
        }
    }
}
