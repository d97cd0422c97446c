//! Command-line argument parsing for periodic-box simulations

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PotentialChoice {
    /// Lennard-Jones
    Lj,
    /// Screened Coulomb with alternating charges
    Coulomb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    Cpu,
    Device,
}

/// Molecular dynamics and Metropolis Monte Carlo in a periodic box
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Append a one-line summary of the run to this file
    #[arg(long)]
    pub results: Option<String>,

    /// Override the pair potential
    #[arg(long, value_enum)]
    pub potential: Option<PotentialChoice>,

    /// Override the compute backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendChoice>,

    /// Worker threads of the CPU backend
    #[arg(long)]
    pub threads: Option<usize>,

    /// Random seed for Monte Carlo
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the iteration cap
    #[arg(long)]
    pub total_it: Option<u64>,

    /// Evaluate the initial configuration on both backends before running
    #[arg(long)]
    pub check_backends: bool,
}
