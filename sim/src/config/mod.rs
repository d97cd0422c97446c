//! Configuration loading and command-line overrides

mod args;

pub use args::{Args, BackendChoice, PotentialChoice};

use color_eyre::eyre::{Result, WrapErr};
use pbc_md::config::{BackendConfig, MethodConfig, PotentialConfig};
use pbc_md::SimulationConfig;
use tracing::warn;

pub fn load_config(args: &Args) -> Result<SimulationConfig> {
    let config = SimulationConfig::from_file(&args.config_file)
        .wrap_err_with(|| format!("Unable to load configuration file: {}", args.config_file))?;
    let config = apply_overrides(config, args);
    config
        .validate()
        .wrap_err("Invalid configuration after command-line overrides")?;
    Ok(config)
}

/// Command-line values take precedence over the file.
pub fn apply_overrides(mut config: SimulationConfig, args: &Args) -> SimulationConfig {
    match (args.potential, config.potential) {
        (Some(PotentialChoice::Lj), PotentialConfig::ScreenedCoulomb { .. }) => {
            config.potential = PotentialConfig::lennard_jones();
        }
        (Some(PotentialChoice::Coulomb), PotentialConfig::LennardJones { .. }) => {
            config.potential = PotentialConfig::screened_coulomb();
        }
        _ => {}
    }

    match (args.backend, config.backend) {
        (Some(BackendChoice::Cpu), BackendConfig::Device { .. }) => {
            config.backend = BackendConfig::Cpu { threads: None };
        }
        (Some(BackendChoice::Device), BackendConfig::Cpu { .. }) => {
            config.backend = BackendConfig::Device {
                work_group_size: None,
            };
        }
        _ => {}
    }

    if let Some(n) = args.threads {
        match &mut config.backend {
            BackendConfig::Cpu { threads } => *threads = Some(n),
            BackendConfig::Device { .. } => warn!("--threads is ignored by the device backend"),
        }
    }

    match &mut config.method {
        MethodConfig::Md(md) => {
            if let Some(total_it) = args.total_it {
                md.total_it = total_it;
            }
            if args.seed.is_some() {
                warn!("--seed is ignored by molecular dynamics");
            }
        }
        MethodConfig::Mc(mc) => {
            if let Some(total_it) = args.total_it {
                mc.total_it = total_it;
            }
            if args.seed.is_some() {
                mc.seed = args.seed;
            }
        }
    }

    config
}
