use crate::device::{ComputeDevice, DeviceBuffers, Float4, Kernel, WorkSize};
use crate::error::{ensure_len, Result, SimError};
use crate::periodic::PeriodicBox;
use crate::potential::{PairPotential, Potential};
use crate::reduction::{reduce_pairs, InteractionBuffers};
use nalgebra::Vector3;
use std::time::{Duration, Instant};
use tracing::debug;

/// Call counter and accumulated compute time of a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BackendStats {
    pub calls: u64,
    pub kernel_time: Duration,
}

impl BackendStats {
    pub fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.kernel_time += elapsed;
    }

    /// Mean kernel time per evaluation.
    pub fn per_call(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.kernel_time.div_f64(self.calls as f64)
        }
    }
}

/// Evaluates forces and per-particle energies for folded positions.
///
/// Implementations overwrite every slot of `buffers` and block until the
/// results are available.
pub trait ComputeBackend: std::fmt::Debug {
    fn name(&self) -> &str;

    fn compute(
        &mut self,
        folded: &[Vector3<f64>],
        charges: Option<&[i32]>,
        buffers: &mut InteractionBuffers,
    ) -> Result<()>;

    fn stats(&self) -> BackendStats;
}

impl<B: ComputeBackend + ?Sized> ComputeBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn compute(
        &mut self,
        folded: &[Vector3<f64>],
        charges: Option<&[i32]>,
        buffers: &mut InteractionBuffers,
    ) -> Result<()> {
        (**self).compute(folded, charges, buffers)
    }

    fn stats(&self) -> BackendStats {
        (**self).stats()
    }
}

fn check_charges(requires: bool, n: usize, charges: Option<&[i32]>) -> Result<()> {
    match charges {
        Some(q) => ensure_len(n, q.len()),
        None if requires => Err(SimError::MissingCharges),
        None => Ok(()),
    }
}

/// In-process parallel reduction over the outer particle index.
#[derive(Debug)]
pub struct CpuBackend<P: PairPotential> {
    pbox: PeriodicBox,
    potential: P,
    pool: Option<rayon::ThreadPool>,
    stats: BackendStats,
}

impl<P: PairPotential> CpuBackend<P> {
    /// Backend running on the global rayon pool.
    pub fn new(pbox: PeriodicBox, potential: P) -> Self {
        Self {
            pbox,
            potential,
            pool: None,
            stats: BackendStats::default(),
        }
    }

    /// Backend running on a dedicated pool of `threads` workers.
    pub fn with_threads(pbox: PeriodicBox, potential: P, threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| SimError::InvalidConfig(format!("cannot build thread pool: {e}")))?;
        Ok(Self {
            pool: Some(pool),
            ..Self::new(pbox, potential)
        })
    }

    pub fn potential(&self) -> &P {
        &self.potential
    }
}

impl<P: PairPotential> ComputeBackend for CpuBackend<P> {
    fn name(&self) -> &str {
        "cpu"
    }

    fn compute(
        &mut self,
        folded: &[Vector3<f64>],
        charges: Option<&[i32]>,
        buffers: &mut InteractionBuffers,
    ) -> Result<()> {
        ensure_len(folded.len(), buffers.len())?;
        check_charges(self.potential.requires_charges(), folded.len(), charges)?;

        let start = Instant::now();
        let (pbox, potential) = (&self.pbox, &self.potential);
        match &self.pool {
            Some(pool) => pool.install(|| reduce_pairs(pbox, potential, folded, charges, buffers)),
            None => reduce_pairs(pbox, potential, folded, charges, buffers),
        }
        self.stats.record(start.elapsed());
        Ok(())
    }

    fn stats(&self) -> BackendStats {
        self.stats
    }
}

/// Offloads the reduction to a [`ComputeDevice`]: one synchronous
/// upload / dispatch / read-back round trip per call, in single precision.
pub struct DeviceBackend<D: ComputeDevice> {
    device: D,
    kernel: Kernel,
    work: WorkSize,
    buffers: DeviceBuffers,
    host_positions: Vec<Float4>,
    host_forces: Vec<Float4>,
    host_energies: Vec<f32>,
    stats: BackendStats,
}

impl<D: ComputeDevice> DeviceBackend<D> {
    pub fn new(
        mut device: D,
        potential: &Potential,
        pbox: &PeriodicBox,
        n_particles: usize,
        work_group_size: usize,
    ) -> Result<Self> {
        let kernel = Kernel::compile(potential, pbox);
        let work = WorkSize::covering(n_particles, work_group_size)?;
        let buffers = DeviceBuffers::allocate(&mut device, n_particles, kernel.requires_charges())?;
        debug!(
            "device '{}' ready: kernel={}, global={}, local={}",
            device.name(),
            kernel.name(),
            work.global,
            work.local
        );
        Ok(Self {
            device,
            kernel,
            work,
            buffers,
            host_positions: vec![Float4::default(); n_particles],
            host_forces: vec![Float4::default(); n_particles],
            host_energies: vec![0.0; n_particles],
            stats: BackendStats::default(),
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }
}

impl<D: ComputeDevice> ComputeBackend for DeviceBackend<D> {
    fn name(&self) -> &str {
        self.device.name()
    }

    fn compute(
        &mut self,
        folded: &[Vector3<f64>],
        charges: Option<&[i32]>,
        buffers: &mut InteractionBuffers,
    ) -> Result<()> {
        let n = self.host_positions.len();
        ensure_len(n, folded.len())?;
        ensure_len(n, buffers.len())?;
        check_charges(self.kernel.requires_charges(), n, charges)?;

        for (dst, src) in self.host_positions.iter_mut().zip(folded) {
            *dst = Float4::from_vector(src);
        }
        self.device
            .write_buffer(self.buffers.positions, bytemuck::cast_slice(&self.host_positions))?;
        if let (Some(handle), Some(q)) = (self.buffers.charges, charges) {
            self.device.write_buffer(handle, bytemuck::cast_slice(q))?;
        }

        let elapsed = self
            .device
            .dispatch(&self.kernel, &self.buffers, self.work)?;

        self.device.read_buffer(
            self.buffers.forces,
            bytemuck::cast_slice_mut(&mut self.host_forces),
        )?;
        self.device.read_buffer(
            self.buffers.energies,
            bytemuck::cast_slice_mut(&mut self.host_energies),
        )?;

        for (dst, src) in buffers.forces.iter_mut().zip(&self.host_forces) {
            *dst = src.to_vector();
        }
        for (dst, &src) in buffers.energies.iter_mut().zip(&self.host_energies) {
            *dst = f64::from(src);
        }
        self.stats.record(elapsed);
        Ok(())
    }

    fn stats(&self) -> BackendStats {
        self.stats
    }
}

impl<D: ComputeDevice> std::fmt::Debug for DeviceBackend<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBackend")
            .field("device", &self.device.name())
            .field("kernel", &self.kernel)
            .field("work", &self.work)
            .field("stats", &self.stats)
            .finish()
    }
}
