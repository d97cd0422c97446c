//! Accelerator dispatch seam.
//!
//! A [`ComputeDevice`] owns device memory and runs compiled [`Kernel`]s over a
//! one-dimensional range of work items, one item per particle. Buffers cross
//! the boundary as raw bytes in the device layout: positions and forces as
//! 16-byte `float4` records, energies as `f32`, charges as `i32`.
//!
//! [`HostDevice`] executes kernels in-process with the same single-precision
//! arithmetic an accelerator would use. Platform discovery and kernel source
//! compilation for real hardware live outside this crate.

use crate::error::{ensure_len, Result, SimError};
use crate::periodic::PeriodicBox;
use crate::potential::{Potential, DERIVATIVE_ERF, SCREENED_CHARGE};
use bytemuck::{Pod, Zeroable};
use nalgebra::Vector3;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Device-side 3-vector padded to 16 bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Float4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Float4 {
    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Float4 {
            x: v.x as f32,
            y: v.y as f32,
            z: v.z as f32,
            w: 0.0,
        }
    }

    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle(usize);

/// Global and local (work-group) sizes of a one-dimensional dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSize {
    pub global: usize,
    pub local: usize,
}

impl WorkSize {
    /// Smallest global size that is a multiple of `local` and covers `n` items.
    pub fn covering(n: usize, local: usize) -> Result<Self> {
        if local == 0 {
            return Err(SimError::InvalidConfig(
                "work group size must be positive".to_string(),
            ));
        }
        Ok(WorkSize {
            global: n.div_ceil(local) * local,
            local,
        })
    }
}

/// Kernel arguments: the device buffers of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceBuffers {
    pub positions: BufferHandle,
    pub charges: Option<BufferHandle>,
    pub forces: BufferHandle,
    pub energies: BufferHandle,
}

impl DeviceBuffers {
    pub fn allocate<D: ComputeDevice + ?Sized>(
        device: &mut D,
        n_particles: usize,
        with_charges: bool,
    ) -> Result<Self> {
        let vec_bytes = n_particles * std::mem::size_of::<Float4>();
        let positions = device.create_buffer(vec_bytes)?;
        let charges = if with_charges {
            Some(device.create_buffer(n_particles * std::mem::size_of::<i32>())?)
        } else {
            None
        };
        let forces = device.create_buffer(vec_bytes)?;
        let energies = device.create_buffer(n_particles * std::mem::size_of::<f32>())?;
        Ok(DeviceBuffers {
            positions,
            charges,
            forces,
            energies,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelProgram {
    LennardJones { cutoff_sq: f32, energy_shift: f32 },
    ScreenedCoulomb { sigma: f32 },
}

/// A force/energy kernel with the box and potential parameters baked in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel {
    pub box_size: f32,
    pub half_box: f32,
    pub program: KernelProgram,
}

impl Kernel {
    pub fn compile(potential: &Potential, pbox: &PeriodicBox) -> Self {
        let program = match potential {
            Potential::LennardJones(lj) => KernelProgram::LennardJones {
                cutoff_sq: lj.cutoff_sq() as f32,
                energy_shift: lj.energy_shift() as f32,
            },
            Potential::ScreenedCoulomb(c) => KernelProgram::ScreenedCoulomb {
                sigma: c.sigma as f32,
            },
        };
        Kernel {
            box_size: pbox.size() as f32,
            half_box: pbox.half() as f32,
            program,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.program {
            KernelProgram::LennardJones { .. } => "lennard_jones",
            KernelProgram::ScreenedCoulomb { .. } => "screened_coulomb",
        }
    }

    pub fn requires_charges(&self) -> bool {
        matches!(self.program, KernelProgram::ScreenedCoulomb { .. })
    }

    #[inline]
    fn wrap(&self, d: f32) -> f32 {
        if d > self.half_box {
            d - self.box_size
        } else if d < -self.half_box {
            d + self.box_size
        } else {
            d
        }
    }

    /// Body of one work item: force and ordered-pair energy sum of particle `gid`.
    pub fn work_item(&self, gid: usize, positions: &[Float4], charges: Option<&[i32]>) -> (Float4, f32) {
        let p_i = positions[gid];
        let q_i = charges.map_or(0, |q| q[gid]);
        let (mut fx, mut fy, mut fz, mut energy) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);

        for (j, p_j) in positions.iter().enumerate() {
            if j == gid {
                continue;
            }
            let x = self.wrap(p_j.x - p_i.x);
            let y = self.wrap(p_j.y - p_i.y);
            let z = self.wrap(p_j.z - p_i.z);
            let r2 = x * x + y * y + z * z;

            let (u, m) = match self.program {
                KernelProgram::LennardJones {
                    cutoff_sq,
                    energy_shift,
                } => {
                    if r2 >= cutoff_sq {
                        continue;
                    }
                    let r6 = r2 * r2 * r2;
                    let r8 = r6 * r2;
                    let r12 = r6 * r6;
                    let r14 = r12 * r2;
                    (
                        4.0 * (1.0 / r12 - 1.0 / r6) - energy_shift,
                        24.0 * (2.0 / r14 - 1.0 / r8),
                    )
                }
                KernelProgram::ScreenedCoulomb { sigma } => {
                    let q_j = charges.map_or(0, |q| q[j]);
                    let qq = (q_i * q_j) as f32;
                    let dist = r2.sqrt();
                    if q_i == SCREENED_CHARGE || q_j == SCREENED_CHARGE {
                        let erf_arg = dist / sigma;
                        let mult = libm::erff(erf_arg);
                        let gauss =
                            DERIVATIVE_ERF as f32 * (-erf_arg * erf_arg).exp() / (sigma * r2);
                        (qq * mult / dist, qq * (mult / (dist * r2) - gauss))
                    } else {
                        (qq / dist, qq / (dist * r2))
                    }
                }
            };
            fx -= x * m;
            fy -= y * m;
            fz -= z * m;
            energy += u;
        }

        (
            Float4 {
                x: fx,
                y: fy,
                z: fz,
                w: 0.0,
            },
            energy,
        )
    }
}

/// Synchronous compute device.
pub trait ComputeDevice: Send {
    fn name(&self) -> &str;

    fn create_buffer(&mut self, bytes: usize) -> Result<BufferHandle>;

    /// Blocking host-to-device copy of the whole buffer.
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()>;

    /// Blocking device-to-host copy of the whole buffer.
    fn read_buffer(&mut self, buffer: BufferHandle, data: &mut [u8]) -> Result<()>;

    /// Run `kernel` to completion and return its execution time.
    fn dispatch(&mut self, kernel: &Kernel, args: &DeviceBuffers, work: WorkSize) -> Result<Duration>;
}

/// Device emulated on the host; work groups run on the rayon pool.
#[derive(Debug, Default)]
pub struct HostDevice {
    // word-sized backing store keeps f32/i32/float4 views aligned
    memory: Vec<Vec<u32>>,
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&[u32]> {
        self.memory
            .get(handle.0)
            .map(Vec::as_slice)
            .ok_or_else(|| SimError::Device(format!("unknown buffer {}", handle.0)))
    }

    fn buffer_mut(&mut self, handle: BufferHandle) -> Result<&mut Vec<u32>> {
        self.memory
            .get_mut(handle.0)
            .ok_or_else(|| SimError::Device(format!("unknown buffer {}", handle.0)))
    }

    fn run(
        &self,
        kernel: &Kernel,
        args: &DeviceBuffers,
        work: WorkSize,
        force_words: &mut [u32],
        energy_words: &mut [u32],
    ) -> Result<()> {
        let positions: &[Float4] = cast(self.buffer(args.positions)?)?;
        let charges: Option<&[i32]> = match args.charges {
            Some(handle) => Some(cast(self.buffer(handle)?)?),
            None => None,
        };
        let forces: &mut [Float4] = cast_mut(force_words)?;
        let energies: &mut [f32] = cast_mut(energy_words)?;

        let n = positions.len();
        ensure_len(n, forces.len())?;
        ensure_len(n, energies.len())?;
        if let Some(q) = charges {
            ensure_len(n, q.len())?;
        } else if kernel.requires_charges() {
            return Err(SimError::MissingCharges);
        }
        if work.local == 0 || work.global % work.local != 0 || work.global < n {
            return Err(SimError::Device(format!(
                "invalid work size {}x{} for {} items",
                work.global, work.local, n
            )));
        }

        forces
            .par_chunks_mut(work.local)
            .zip(energies.par_chunks_mut(work.local))
            .enumerate()
            .for_each(|(group, (f_group, e_group))| {
                for (lid, (f, e)) in f_group.iter_mut().zip(e_group.iter_mut()).enumerate() {
                    let (force, energy) = kernel.work_item(group * work.local + lid, positions, charges);
                    *f = force;
                    *e = energy;
                }
            });
        Ok(())
    }
}

fn cast<T: Pod>(words: &[u32]) -> Result<&[T]> {
    bytemuck::try_cast_slice(words).map_err(|e| SimError::Device(format!("bad buffer layout: {e}")))
}

fn cast_mut<T: Pod>(words: &mut [u32]) -> Result<&mut [T]> {
    bytemuck::try_cast_slice_mut(words)
        .map_err(|e| SimError::Device(format!("bad buffer layout: {e}")))
}

impl ComputeDevice for HostDevice {
    fn name(&self) -> &str {
        "host-device"
    }

    fn create_buffer(&mut self, bytes: usize) -> Result<BufferHandle> {
        if bytes % 4 != 0 {
            return Err(SimError::Device(format!(
                "buffer size {bytes} is not a multiple of 4 bytes"
            )));
        }
        self.memory.push(vec![0; bytes / 4]);
        Ok(BufferHandle(self.memory.len() - 1))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()> {
        let words = self.buffer_mut(buffer)?;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(words.as_mut_slice());
        ensure_len(bytes.len(), data.len())?;
        bytes.copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferHandle, data: &mut [u8]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(self.buffer(buffer)?);
        ensure_len(bytes.len(), data.len())?;
        data.copy_from_slice(bytes);
        Ok(())
    }

    fn dispatch(&mut self, kernel: &Kernel, args: &DeviceBuffers, work: WorkSize) -> Result<Duration> {
        if args.forces == args.energies {
            return Err(SimError::Device("output buffers must be distinct".to_string()));
        }
        let start = Instant::now();
        let mut forces = std::mem::take(self.buffer_mut(args.forces)?);
        let mut energies = std::mem::take(self.buffer_mut(args.energies)?);
        let result = self.run(kernel, args, work, &mut forces, &mut energies);
        *self.buffer_mut(args.forces)? = forces;
        *self.buffer_mut(args.energies)? = energies;
        result.map(|()| start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potential::{LennardJones, ScreenedCoulomb};
    use approx::assert_relative_eq;

    fn lj_kernel() -> Kernel {
        let pbox = PeriodicBox::new(4.0).unwrap();
        Kernel::compile(&LennardJones::new(2.5).into(), &pbox)
    }

    #[test]
    fn test_work_size_covering() {
        assert_eq!(WorkSize::covering(8, 8).unwrap(), WorkSize { global: 8, local: 8 });
        assert_eq!(WorkSize::covering(10, 4).unwrap(), WorkSize { global: 12, local: 4 });
        assert!(WorkSize::covering(10, 0).is_err());
    }

    #[test]
    fn test_compile_bakes_parameters() {
        let kernel = lj_kernel();
        assert_eq!(kernel.box_size, 4.0);
        assert_eq!(kernel.half_box, 2.0);
        assert_eq!(
            kernel.program,
            KernelProgram::LennardJones {
                cutoff_sq: 6.25,
                energy_shift: 0.0
            }
        );
        assert!(!kernel.requires_charges());

        let pbox = PeriodicBox::new(4.0).unwrap();
        let coulomb = Kernel::compile(&ScreenedCoulomb::new(0.5).into(), &pbox);
        assert!(coulomb.requires_charges());
        assert_eq!(coulomb.name(), "screened_coulomb");
    }

    #[test]
    fn test_buffer_round_trip() {
        let mut device = HostDevice::new();
        let handle = device.create_buffer(16).unwrap();
        let data = [Float4 {
            x: 1.0,
            y: -2.0,
            z: 3.5,
            w: 0.0,
        }];
        device.write_buffer(handle, bytemuck::cast_slice(&data)).unwrap();
        let mut back = [Float4::default()];
        device.read_buffer(handle, bytemuck::cast_slice_mut(&mut back)).unwrap();
        assert_eq!(back, data);

        assert!(device.write_buffer(handle, &[0u8; 8]).is_err());
        assert!(device.create_buffer(6).is_err());
    }

    #[test]
    fn test_work_item_pair() {
        let kernel = lj_kernel();
        let positions = [
            Float4::default(),
            Float4 {
                x: 1.5,
                ..Float4::default()
            },
        ];
        let (force, energy) = kernel.work_item(0, &positions, None);
        let r2: f32 = 2.25;
        let r6 = r2 * r2 * r2;
        assert_relative_eq!(energy, 4.0 * (1.0 / (r6 * r6) - 1.0 / r6), max_relative = 1e-6);
        // attractive at 1.5: particle 0 is pulled toward +x
        assert!(force.x > 0.0);
        assert_eq!(force.y, 0.0);
    }

    #[test]
    fn test_dispatch_rejects_bad_work_size() {
        let mut device = HostDevice::new();
        let args = DeviceBuffers::allocate(&mut device, 6, false).unwrap();
        let kernel = lj_kernel();
        let bad = WorkSize { global: 4, local: 4 };
        assert!(device.dispatch(&kernel, &args, bad).is_err());
        let good = WorkSize::covering(6, 4).unwrap();
        assert!(device.dispatch(&kernel, &args, good).is_ok());
    }
}
