// file: `md/src/potential.rs`

/// Charge value that marks the screened species in the Coulomb model.
pub const SCREENED_CHARGE: i32 = -1;

/// `2/√π`, the prefactor of the derivative of `erf`.
pub const DERIVATIVE_ERF: f64 = 1.128_379_167_095_512_6;

/// Energy and force contribution of one ordered pair `(i, j)`.
///
/// `force` is the coefficient of the vector `r_i - r_j` in the force acting
/// on particle `i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairTerm {
    pub energy: f64,
    pub force: f64,
}

/// A pairwise interaction model, selected once at startup and shared by both
/// drivers and every backend.
pub trait PairPotential: Send + Sync + std::fmt::Debug {
    /// Contribution of a pair at squared minimum-image distance `r2`, or
    /// `None` when the pair does not interact.
    fn pair(&self, r2: f64, qi: i32, qj: i32) -> Option<PairTerm>;

    fn requires_charges(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

/// Lennard-Jones in reduced units (ε = σ = 1) with a hard real-space cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    pub cutoff: f64,
    cutoff_sq: f64,
    energy_shift: f64,
}

impl LennardJones {
    pub fn new(cutoff: f64) -> Self {
        LennardJones {
            cutoff,
            cutoff_sq: cutoff * cutoff,
            energy_shift: 0.0,
        }
    }

    /// Subtract `U(rc)` from every in-cutoff pair so the energy is continuous at the cutoff.
    pub fn shifted(cutoff: f64) -> Self {
        LennardJones {
            energy_shift: Self::energy_at(cutoff * cutoff),
            ..Self::new(cutoff)
        }
    }

    pub fn cutoff_sq(&self) -> f64 {
        self.cutoff_sq
    }

    pub fn energy_shift(&self) -> f64 {
        self.energy_shift
    }

    #[inline]
    fn energy_at(r2: f64) -> f64 {
        let r6 = r2 * r2 * r2;
        let r12 = r6 * r6;
        4.0 * (1.0 / r12 - 1.0 / r6)
    }
}

impl PairPotential for LennardJones {
    #[inline]
    fn pair(&self, r2: f64, _qi: i32, _qj: i32) -> Option<PairTerm> {
        if r2 >= self.cutoff_sq {
            return None;
        }
        let r6 = r2 * r2 * r2;
        let r8 = r6 * r2;
        let r12 = r6 * r6;
        let r14 = r12 * r2;
        Some(PairTerm {
            energy: 4.0 * (1.0 / r12 - 1.0 / r6) - self.energy_shift,
            force: 24.0 * (2.0 / r14 - 1.0 / r8),
        })
    }

    fn name(&self) -> &'static str {
        "lennard-jones"
    }
}

/// Coulomb interaction without cutoff. Pairs involving the screened species
/// are damped by `erf(r/σ)`, a short-range stand-in for long-range electrostatics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenedCoulomb {
    pub sigma: f64,
}

impl ScreenedCoulomb {
    pub fn new(sigma: f64) -> Self {
        ScreenedCoulomb { sigma }
    }

    #[inline]
    pub fn is_screened(qi: i32, qj: i32) -> bool {
        qi == SCREENED_CHARGE || qj == SCREENED_CHARGE
    }
}

impl PairPotential for ScreenedCoulomb {
    #[inline]
    fn pair(&self, r2: f64, qi: i32, qj: i32) -> Option<PairTerm> {
        let dist = r2.sqrt();
        let qq = f64::from(qi * qj);
        if Self::is_screened(qi, qj) {
            let erf_arg = dist / self.sigma;
            let mult = libm::erf(erf_arg);
            let gauss = DERIVATIVE_ERF * (-erf_arg * erf_arg).exp() / (self.sigma * r2);
            Some(PairTerm {
                energy: qq * mult / dist,
                force: qq * (mult / (dist * r2) - gauss),
            })
        } else {
            Some(PairTerm {
                energy: qq / dist,
                force: qq / (dist * r2),
            })
        }
    }

    fn requires_charges(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "screened-coulomb"
    }
}

/// The potential chosen for a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Potential {
    LennardJones(LennardJones),
    ScreenedCoulomb(ScreenedCoulomb),
}

impl PairPotential for Potential {
    #[inline]
    fn pair(&self, r2: f64, qi: i32, qj: i32) -> Option<PairTerm> {
        match self {
            Potential::LennardJones(lj) => lj.pair(r2, qi, qj),
            Potential::ScreenedCoulomb(c) => c.pair(r2, qi, qj),
        }
    }

    fn requires_charges(&self) -> bool {
        match self {
            Potential::LennardJones(lj) => lj.requires_charges(),
            Potential::ScreenedCoulomb(c) => c.requires_charges(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Potential::LennardJones(lj) => lj.name(),
            Potential::ScreenedCoulomb(c) => c.name(),
        }
    }
}

impl From<LennardJones> for Potential {
    fn from(lj: LennardJones) -> Self {
        Potential::LennardJones(lj)
    }
}

impl From<ScreenedCoulomb> for Potential {
    fn from(c: ScreenedCoulomb) -> Self {
        Potential::ScreenedCoulomb(c)
    }
}
