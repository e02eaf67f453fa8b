use rand::Rng;
use serde::{Deserialize, Serialize};

/// Single virus particle.
///
/// Both probabilities are fixed at creation and inherited unchanged by
/// offspring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Virion {
    prob_birth: f64,
    prob_clear: f64,
}

impl Virion {
    pub fn new(prob_birth: f64, prob_clear: f64) -> Self {
        Self {
            prob_birth,
            prob_clear,
        }
    }

    /// Decide whether the virion survives the current step.
    ///
    /// Consumes exactly one uniform draw from `rng`; the virion is cleared
    /// with probability `prob_clear`.
    pub fn survives<R: Rng>(&self, rng: &mut R) -> bool {
        let p: f64 = rng.random();
        p > self.prob_clear
    }

    /// Attempt to produce an offspring at the given population density.
    ///
    /// The density-damped birth rate is compared against the virion's own
    /// `prob_birth`, so the threshold can only be exceeded while the density
    /// is negative; with a non-negative density no offspring is ever
    /// produced and the population can only shrink or hold steady.
    pub fn replicate(&self, pop_density: f64) -> Option<Virion> {
        let birth_rate = self.prob_birth * (1.0 - pop_density);
        if birth_rate > self.prob_birth {
            Some(Virion::new(self.prob_birth, self.prob_clear))
        } else {
            None
        }
    }
}

/// Host carrying the live virion population.
///
/// `max_pop` only enters the density computation; it is never enforced as a
/// hard cap on the population.
#[derive(Serialize, Deserialize)]
pub struct Host {
    vir_vec: Vec<Virion>,

    max_pop: usize,

    pop_density: f64,
}

impl Host {
    pub fn new(vir_vec: Vec<Virion>, max_pop: usize) -> Self {
        let pop_density = vir_vec.len() as f64 / max_pop as f64;
        Self {
            vir_vec,
            max_pop,
            pop_density,
        }
    }

    pub fn population(&self) -> usize {
        self.vir_vec.len()
    }

    pub fn pop_density(&self) -> f64 {
        self.pop_density
    }

    /// Advance the population by one time step and return the new total.
    pub fn update<R: Rng>(&mut self, rng: &mut R) -> usize {
        // Clearance pass: one independent survival draw per virion.
        self.vir_vec.retain(|vir| vir.survives(rng));

        // The density uses the post-clearance population and is held fixed
        // for the whole replication pass.
        self.pop_density = self.population() as f64 / self.max_pop as f64;

        // Replication pass: offspring are buffered and merged only after the
        // pass, so they neither replicate in their birth step nor shift the
        // density mid-pass.
        let offspring: Vec<Virion> = self
            .vir_vec
            .iter()
            .filter_map(|vir| vir.replicate(self.pop_density))
            .collect();
        self.vir_vec.extend(offspring);

        self.population()
    }
}

/// Record of the population at a single step, one frame per step in the
/// trajectory files.
#[derive(Debug, Serialize, Deserialize)]
pub struct Record {
    pub step: usize,

    pub n_vir: usize,

    pub pop_density: f64,
}
