use crate::backend::{ComputeBackend, CpuBackend, DeviceBackend};
use crate::device::HostDevice;
use crate::error::{Result, SimError};
use crate::integrator::MdParams;
use crate::lattice::{alternating_charges, cubic_lattice};
use crate::metropolis::{MetropolisParams, Perturbation};
use crate::periodic::PeriodicBox;
use crate::potential::{LennardJones, PairPotential, Potential, ScreenedCoulomb};
use crate::system::ParticleSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Configuration of one simulation run
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Particle count, box and initial lattice
    pub system: SystemConfig,
    /// Pair interaction model
    pub potential: PotentialConfig,
    /// Where the force/energy reduction runs
    #[serde(default)]
    pub backend: BackendConfig,
    /// Driving algorithm and its parameters
    pub method: MethodConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    pub n_particles: usize,
    /// Edge length of the cubic box
    pub box_size: f64,
    /// Distance between neighbouring lattice sites
    pub lattice_spacing: f64,
    /// Gap kept free along the box faces when placing the lattice
    #[serde(default)]
    pub edge_margin: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(tag = "type")]
pub enum PotentialConfig {
    /// Lennard-Jones in reduced units
    #[serde(rename = "lennard_jones")]
    LennardJones {
        #[serde(default = "default_lj_cutoff")]
        cutoff: f64,
        /// Subtract U(rc) so the energy is continuous at the cutoff
        #[serde(default)]
        shift: bool,
    },
    /// Coulomb with erf screening of the negative species
    #[serde(rename = "screened_coulomb")]
    ScreenedCoulomb {
        #[serde(default = "default_sigma")]
        sigma: f64,
    },
}

impl PotentialConfig {
    /// Unshifted Lennard-Jones with the default cutoff.
    pub fn lennard_jones() -> Self {
        PotentialConfig::LennardJones {
            cutoff: default_lj_cutoff(),
            shift: false,
        }
    }

    /// Screened Coulomb with the default screening length.
    pub fn screened_coulomb() -> Self {
        PotentialConfig::ScreenedCoulomb {
            sigma: default_sigma(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(tag = "type")]
pub enum BackendConfig {
    /// Parallel loop on the host
    #[serde(rename = "cpu")]
    Cpu {
        /// Size of a dedicated thread pool; the global pool when absent
        #[serde(default)]
        threads: Option<usize>,
    },
    /// Kernel dispatch to a compute device
    #[serde(rename = "device")]
    Device {
        /// Work-group size; one group covering every particle when absent
        #[serde(default)]
        work_group_size: Option<usize>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Cpu { threads: None }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(tag = "type")]
pub enum MethodConfig {
    /// Molecular dynamics
    #[serde(rename = "md")]
    Md(MdParams),
    /// Metropolis Monte Carlo
    #[serde(rename = "mc")]
    Mc(McConfig),
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct McConfig {
    pub temperature: f64,
    #[serde(default = "default_max_deviation")]
    pub max_deviation: f64,
    pub max_accepted: u64,
    pub total_it: u64,
    #[serde(default)]
    pub perturbation: Perturbation,
    /// Random seed; drawn from the OS when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl McConfig {
    pub fn params(&self) -> MetropolisParams {
        MetropolisParams {
            temperature: self.temperature,
            max_deviation: self.max_deviation,
            max_accepted: self.max_accepted,
            total_it: self.total_it,
            perturbation: self.perturbation,
        }
    }
}

// Default value functions
fn default_lj_cutoff() -> f64 {
    2.5
}
fn default_sigma() -> f64 {
    1.0
}
fn default_max_deviation() -> f64 {
    0.005
}

fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(SimError::InvalidConfig(msg.into()))
}

impl SimulationConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: SimulationConfig = serde_yml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        let system = &self.system;
        if system.n_particles == 0 {
            return invalid("n_particles must be positive");
        }
        if !(system.box_size > 0.0 && system.box_size.is_finite()) {
            return invalid("box_size must be positive");
        }
        if !(system.lattice_spacing > 0.0 && system.lattice_spacing.is_finite()) {
            return invalid("lattice_spacing must be positive");
        }
        if !(system.edge_margin >= 0.0 && system.edge_margin < system.box_size) {
            return invalid("edge_margin must lie in [0, box_size)");
        }

        match self.potential {
            PotentialConfig::LennardJones { cutoff, .. } => {
                if !(cutoff > 0.0 && cutoff.is_finite()) {
                    return invalid("LJ cutoff must be positive");
                }
                // beyond L/2 the single-correction minimum image misses closer images
                if system.box_size < 2.0 * cutoff {
                    warn!(
                        "box_size {} is smaller than twice the cutoff {}; pairs beyond L/2 see only one image",
                        system.box_size, cutoff
                    );
                }
            }
            PotentialConfig::ScreenedCoulomb { sigma } => {
                if !(sigma > 0.0 && sigma.is_finite()) {
                    return invalid("screening length sigma must be positive");
                }
            }
        }

        match self.backend {
            BackendConfig::Cpu { threads: Some(0) } => return invalid("threads must be positive"),
            BackendConfig::Device {
                work_group_size: Some(0),
            } => return invalid("work_group_size must be positive"),
            _ => {}
        }

        match &self.method {
            MethodConfig::Md(params) => params.validate(),
            MethodConfig::Mc(mc) => {
                if mc.total_it == 0 {
                    return invalid("total_it must be positive");
                }
                mc.params().validate()
            }
        }
    }

    pub fn periodic_box(&self) -> Result<PeriodicBox> {
        PeriodicBox::new(self.system.box_size)
    }

    pub fn build_potential(&self) -> Potential {
        match self.potential {
            PotentialConfig::LennardJones {
                cutoff,
                shift: false,
            } => LennardJones::new(cutoff).into(),
            PotentialConfig::LennardJones { cutoff, shift: true } => {
                LennardJones::shifted(cutoff).into()
            }
            PotentialConfig::ScreenedCoulomb { sigma } => ScreenedCoulomb::new(sigma).into(),
        }
    }

    /// Lattice positions at rest, with alternating charges when the potential needs them.
    pub fn build_particles(&self) -> Result<ParticleSet> {
        let system = &self.system;
        let positions = cubic_lattice(
            system.n_particles,
            system.box_size,
            system.lattice_spacing,
            system.edge_margin,
        )?;
        let particles = ParticleSet::at_rest(positions);
        if self.build_potential().requires_charges() {
            particles.with_charges(alternating_charges(system.n_particles))
        } else {
            Ok(particles)
        }
    }

    pub fn build_cpu_backend(&self, threads: Option<usize>) -> Result<CpuBackend<Potential>> {
        let pbox = self.periodic_box()?;
        match threads {
            Some(threads) => CpuBackend::with_threads(pbox, self.build_potential(), threads),
            None => Ok(CpuBackend::new(pbox, self.build_potential())),
        }
    }

    pub fn build_device_backend(&self, work_group_size: Option<usize>) -> Result<DeviceBackend<HostDevice>> {
        let n = self.system.n_particles;
        DeviceBackend::new(
            HostDevice::new(),
            &self.build_potential(),
            &self.periodic_box()?,
            n,
            work_group_size.unwrap_or(n),
        )
    }

    /// Backend selected by the `backend` section.
    pub fn build_backend(&self) -> Result<Box<dyn ComputeBackend>> {
        Ok(match self.backend {
            BackendConfig::Cpu { threads } => Box::new(self.build_cpu_backend(threads)?),
            BackendConfig::Device { work_group_size } => {
                Box::new(self.build_device_backend(work_group_size)?)
            }
        })
    }
}
