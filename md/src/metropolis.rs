// file: `md/src/metropolis.rs`
use crate::backend::ComputeBackend;
use crate::error::{Result, SimError};
use crate::reduction::InteractionEngine;
use crate::report::McReport;
use crate::system::ParticleSet;
use nalgebra::Vector3;
use rand::prelude::*;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How a trial move displaces each particle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perturbation {
    /// One draw per axis.
    #[default]
    Independent,
    /// One draw per particle, reused for all three axes.
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetropolisParams {
    /// Temperature in reduced units (k_B = 1)
    pub temperature: f64,
    /// Offsets are drawn from `[-max_deviation/2, max_deviation/2]`
    pub max_deviation: f64,
    /// Stop after this many accepted moves
    pub max_accepted: u64,
    /// Stop after this many trials
    pub total_it: u64,
    #[serde(default)]
    pub perturbation: Perturbation,
}

impl MetropolisParams {
    pub fn validate(&self) -> Result<()> {
        if self.temperature.is_nan() || self.temperature < 0.0 {
            return Err(SimError::InvalidConfig(
                "temperature must be non-negative".to_string(),
            ));
        }
        if !(self.max_deviation >= 0.0 && self.max_deviation.is_finite()) {
            return Err(SimError::InvalidConfig(
                "max_deviation must be non-negative".to_string(),
            ));
        }
        if self.max_accepted == 0 {
            return Err(SimError::InvalidConfig(
                "max_accepted must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Counters of one sampling run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplerStatistics {
    pub trials: u64,
    pub accepted: u64,
    /// Energy after every accepted move, in order
    pub energy_history: Vec<f64>,
}

impl SamplerStatistics {
    pub fn acceptance_ratio(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.accepted as f64 / self.trials as f64
        }
    }

    pub fn last_accepted_energy(&self) -> Result<f64> {
        self.energy_history
            .last()
            .copied()
            .ok_or(SimError::NoAcceptedSamples {
                trials: self.trials,
            })
    }
}

/// Metropolis criterion for a move from energy `u1` to `u2`.
///
/// `draw` is uniform in `(0, 1]`. Downhill moves are always taken; uphill
/// and level moves are taken when `draw <= exp((u1 - u2) / T)`, which never
/// holds at `T == 0`.
#[inline]
pub fn metropolis_accepts(u1: f64, u2: f64, temperature: f64, draw: f64) -> bool {
    if u2 < u1 {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    draw <= ((u1 - u2) / temperature).exp()
}

/// Whole-configuration Metropolis sampler: every trial perturbs all particles,
/// re-evaluates the total energy and keeps or restores the snapshot.
#[derive(Debug)]
pub struct MetropolisSampler<B: ComputeBackend, R: Rng = StdRng> {
    pub particles: ParticleSet,
    engine: InteractionEngine<B>,
    rng: R,
    snapshot: Vec<Vector3<f64>>,
    pub stats: SamplerStatistics,
}

impl<B: ComputeBackend> MetropolisSampler<B, StdRng> {
    /// Sampler with a seeded generator, or an entropy-seeded one when `seed` is `None`.
    pub fn seeded(particles: ParticleSet, engine: InteractionEngine<B>, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(particles, engine, rng)
    }
}

impl<B: ComputeBackend, R: Rng> MetropolisSampler<B, R> {
    pub fn new(particles: ParticleSet, engine: InteractionEngine<B>, rng: R) -> Result<Self> {
        if engine.n_particles() != particles.len() {
            return Err(SimError::SizeMismatch {
                expected: engine.n_particles(),
                found: particles.len(),
            });
        }
        let snapshot = particles.positions.clone();
        Ok(Self {
            particles,
            engine,
            rng,
            snapshot,
            stats: SamplerStatistics::default(),
        })
    }

    pub fn engine(&self) -> &InteractionEngine<B> {
        &self.engine
    }

    fn energy(&mut self) -> Result<f64> {
        self.engine
            .evaluate(&self.particles.positions, self.particles.charges())
    }

    fn perturb(&mut self, offsets: &Uniform<f64>, perturbation: Perturbation) {
        self.snapshot.copy_from_slice(&self.particles.positions);
        for r in self.particles.positions.iter_mut() {
            let shift = match perturbation {
                Perturbation::Independent => Vector3::new(
                    offsets.sample(&mut self.rng),
                    offsets.sample(&mut self.rng),
                    offsets.sample(&mut self.rng),
                ),
                Perturbation::Shared => Vector3::repeat(offsets.sample(&mut self.rng)),
            };
            *r += shift;
        }
    }

    /// Sample until `max_accepted` moves were accepted or `total_it` trials ran.
    pub fn run(&mut self, params: &MetropolisParams) -> Result<McReport> {
        params.validate()?;
        self.stats = SamplerStatistics::default();
        let half = 0.5 * params.max_deviation;
        let offsets = Uniform::new_inclusive(-half, half);
        let n = self.particles.len() as f64;

        info!(
            "MC: {} particles, T = {}, max deviation = {}, up to {} trials on backend '{}'",
            self.particles.len(),
            params.temperature,
            params.max_deviation,
            params.total_it,
            self.engine.backend().name()
        );

        let mut u1 = self.energy()?;
        while self.stats.accepted < params.max_accepted && self.stats.trials < params.total_it {
            self.perturb(&offsets, params.perturbation);
            let u2 = self.energy()?;
            self.stats.trials += 1;

            // (0, 1] so that a zero Boltzmann factor never passes
            let draw = 1.0 - self.rng.gen::<f64>();
            if metropolis_accepts(u1, u2, params.temperature, draw) {
                u1 = u2;
                self.stats.accepted += 1;
                self.stats.energy_history.push(u2);
                debug!("trial {}: accepted, E = {:.10e}", self.stats.trials, u2);
            } else {
                self.particles.positions.copy_from_slice(&self.snapshot);
            }
        }

        let energy = self.stats.last_accepted_energy()?;
        info!(
            "MC finished: {} / {} moves accepted ({:.2}%)",
            self.stats.accepted,
            self.stats.trials,
            100.0 * self.stats.acceptance_ratio()
        );
        Ok(McReport {
            energy_per_particle: energy / n,
            acceptance_ratio: self.stats.acceptance_ratio(),
            accepted: self.stats.accepted,
            trials: self.stats.trials,
            stats: self.engine.stats(),
        })
    }
}
