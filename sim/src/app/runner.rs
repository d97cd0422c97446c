use color_eyre::eyre::Result;
use pbc_md::config::{BackendConfig, MethodConfig};
use pbc_md::{
    InteractionEngine, MetropolisSampler, PairPotential, RunOutcome, RunSummary,
    SimulationConfig, SymplecticEuler,
};
use std::time::Instant;
use tracing::info;

/// Largest accepted relative energy difference between the two backends.
pub const BACKEND_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendComparison {
    pub cpu_energy: f64,
    pub device_energy: f64,
    pub relative_difference: f64,
}

impl BackendComparison {
    pub fn within_tolerance(&self) -> bool {
        self.relative_difference <= BACKEND_TOLERANCE
    }
}

/// Build the lattice, run the configured method and time it.
pub fn run_simulation(config: &SimulationConfig) -> Result<RunSummary> {
    let pbox = config.periodic_box()?;
    let particles = config.build_particles()?;
    let backend = config.build_backend()?;
    let backend_name = backend.name().to_string();
    let engine = InteractionEngine::new(pbox, backend, particles.len());
    info!(
        "Placed {} particles in a box of edge {} (density {:.4})",
        particles.len(),
        pbox.size(),
        particles.len() as f64 / pbox.volume()
    );

    let start = Instant::now();
    let outcome = match &config.method {
        MethodConfig::Md(params) => {
            let mut md = SymplecticEuler::new(particles, engine)?;
            RunOutcome::Md(md.run(params)?)
        }
        MethodConfig::Mc(mc) => {
            let mut sampler = MetropolisSampler::seeded(particles, engine, mc.seed)?;
            RunOutcome::Mc(sampler.run(&mc.params())?)
        }
    };

    Ok(RunSummary {
        potential: config.build_potential().name(),
        backend: backend_name,
        n_particles: config.system.n_particles,
        elapsed: start.elapsed(),
        outcome,
    })
}

/// Energy of the initial configuration on the CPU and on the device backend.
pub fn compare_backends(config: &SimulationConfig) -> Result<BackendComparison> {
    let pbox = config.periodic_box()?;
    let particles = config.build_particles()?;
    let n = particles.len();
    let (threads, work_group_size) = match config.backend {
        BackendConfig::Cpu { threads } => (threads, None),
        BackendConfig::Device { work_group_size } => (None, work_group_size),
    };

    let mut cpu = InteractionEngine::new(pbox, config.build_cpu_backend(threads)?, n);
    let mut device = InteractionEngine::new(pbox, config.build_device_backend(work_group_size)?, n);
    let cpu_energy = cpu.evaluate(&particles.positions, particles.charges())?;
    let device_energy = device.evaluate(&particles.positions, particles.charges())?;

    Ok(BackendComparison {
        cpu_energy,
        device_energy,
        relative_difference: (device_energy - cpu_energy).abs() / cpu_energy.abs().max(f64::EPSILON),
    })
}
