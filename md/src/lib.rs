pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod integrator;
pub mod lattice;
pub mod metropolis;
pub mod periodic;
pub mod potential;
pub mod reduction;
pub mod report;
pub mod system;

pub use backend::{BackendStats, ComputeBackend, CpuBackend, DeviceBackend};
pub use config::SimulationConfig;
pub use device::{ComputeDevice, HostDevice};
pub use error::{Result, SimError};
pub use integrator::{Integrator, MdParams, SymplecticEuler};
pub use metropolis::{MetropolisParams, MetropolisSampler, Perturbation};
pub use periodic::PeriodicBox;
pub use potential::{LennardJones, PairPotential, Potential, ScreenedCoulomb};
pub use reduction::InteractionEngine;
pub use report::{McReport, MdReport, ReportSink, RunOutcome, RunSummary};
pub use system::ParticleSet;
