//! Module containing the vapor-compression cycle state points and COP solvers.

use crate::air::KELVIN_OFFSET;
use crate::imports::*;

/// COP used whenever a solver fails or returns an unusable value
pub const DEFAULT_FALLBACK_COP: f64 = 2.5;

/// Steady-state refrigeration cycle state points
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RefrigerationCycle {
    /// compressor suction temperature [°C]
    pub suction_te_deg_c: f64,
    /// condensing saturation temperature [°C]
    pub cond_sat_te_deg_c: f64,
    /// liquid line temperature entering the expansion valve [°C]
    pub liquid_line_te_deg_c: f64,
    /// evaporating saturation temperature [°C], also used for chiller UA
    pub evap_sat_te_deg_c: f64,
    /// compressor discharge temperature [°C]
    pub discharge_te_deg_c: f64,
    /// refrigerant name, e.g. `R1234yf`
    pub refrigerant: String,
}

impl Default for RefrigerationCycle {
    fn default() -> Self {
        Self {
            suction_te_deg_c: 15.0,
            cond_sat_te_deg_c: 45.0,
            liquid_line_te_deg_c: 42.0,
            evap_sat_te_deg_c: 5.0,
            discharge_te_deg_c: 70.0,
            refrigerant: "R1234yf".into(),
        }
    }
}

impl RefrigerationCycle {
    /// suction superheat [°C]
    pub fn superheat_deg_c(&self) -> f64 {
        self.suction_te_deg_c - self.evap_sat_te_deg_c
    }

    /// liquid line subcooling [°C]
    pub fn subcooling_deg_c(&self) -> f64 {
        self.cond_sat_te_deg_c - self.liquid_line_te_deg_c
    }

    /// Logs warnings for state points that are unusual but not fatal
    pub fn check(&self) {
        if self.discharge_te_deg_c <= self.cond_sat_te_deg_c {
            #[cfg(feature = "logging")]
            log::warn!(
                "discharge temperature {} °C is not above condensing saturation {} °C",
                self.discharge_te_deg_c,
                self.cond_sat_te_deg_c
            );
        }
        if self.liquid_line_te_deg_c >= self.cond_sat_te_deg_c {
            #[cfg(feature = "logging")]
            log::warn!(
                "liquid line temperature {} °C is not below condensing saturation {} °C; \
                subcooling is {} °C",
                self.liquid_line_te_deg_c,
                self.cond_sat_te_deg_c,
                self.subcooling_deg_c()
            );
        }
    }
}

/// Anything that can turn a cycle definition into a coefficient of performance
pub trait CopSolver {
    fn solve(&self, cycle: &RefrigerationCycle) -> anyhow::Result<f64>;
}

/// Constant COP, independent of the cycle
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FixedCop(pub f64);

impl CopSolver for FixedCop {
    fn solve(&self, _cycle: &RefrigerationCycle) -> anyhow::Result<f64> {
        Ok(self.0)
    }
}

/// Reverse Carnot COP between evaporating and condensing saturation
/// temperatures, scaled by a second-law efficiency
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CarnotCop {
    pub second_law_eff: f64,
}

impl Default for CarnotCop {
    fn default() -> Self {
        Self {
            second_law_eff: 0.5,
        }
    }
}

impl CopSolver for CarnotCop {
    fn solve(&self, cycle: &RefrigerationCycle) -> anyhow::Result<f64> {
        ensure!(
            self.second_law_eff > 0.0 && self.second_law_eff <= 1.0,
            "{}\nsecond law efficiency must be in (0, 1], got {}",
            format_dbg!(),
            self.second_law_eff
        );
        let te_evap_kelvin = cycle.evap_sat_te_deg_c + KELVIN_OFFSET;
        let te_cond_kelvin = cycle.cond_sat_te_deg_c + KELVIN_OFFSET;
        ensure!(
            te_evap_kelvin > 0.0,
            "{}\nevaporating temperature below absolute zero: {} °C",
            format_dbg!(),
            cycle.evap_sat_te_deg_c
        );
        ensure!(
            te_cond_kelvin > te_evap_kelvin,
            "{}\ncondensing saturation ({} °C) must exceed evaporating saturation ({} °C)",
            format_dbg!(),
            cycle.cond_sat_te_deg_c,
            cycle.evap_sat_te_deg_c
        );
        Ok(self.second_law_eff * te_evap_kelvin / (te_cond_kelvin - te_evap_kelvin))
    }
}

/// Where the COP used for a run came from
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CopSource {
    #[default]
    Solver,
    Fallback,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CopResolution {
    pub cop: f64,
    pub source: CopSource,
}

impl Default for CopResolution {
    fn default() -> Self {
        Self {
            cop: DEFAULT_FALLBACK_COP,
            source: CopSource::Fallback,
        }
    }
}

/// Runs `solver` against `cycle`, substituting [DEFAULT_FALLBACK_COP] on
/// error or on a non-positive or non-finite result.  Never fails.
pub fn resolve_cop<S: CopSolver + ?Sized>(solver: &S, cycle: &RefrigerationCycle) -> CopResolution {
    cycle.check();
    match solver.solve(cycle) {
        Ok(cop) if cop.is_finite() && cop > 0.0 => CopResolution {
            cop,
            source: CopSource::Solver,
        },
        Ok(cop) => {
            #[cfg(feature = "logging")]
            log::warn!(
                "COP solver returned unusable value {}; using fallback COP {}",
                cop,
                DEFAULT_FALLBACK_COP
            );
            CopResolution::default()
        }
        Err(err) => {
            #[cfg(feature = "logging")]
            log::warn!(
                "COP solver failed: {:#}; using fallback COP {}",
                err,
                DEFAULT_FALLBACK_COP
            );
            CopResolution::default()
        }
    }
}
