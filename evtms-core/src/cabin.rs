//! Module containing the cabin envelope heat load model and the stepped cabin
//! cooling demand.

use crate::air::get_rho;
use crate::imports::*;
use crate::params::{CabinCoolingTable, CabinParams, EvThermalParams};
use crate::vehicle_motion::KMH_PER_MPS;
use evtms_proc_macros::ApproxEq;

/// natural convection coefficient on the cabin interior [W/(m**2*K)]
const H_IN_NATURAL: f64 = 2.5;
/// forced convection gain on the cabin interior per unit air speed
const H_IN_FORCED_FACTOR: f64 = 5.5;
/// exterior convection coefficient at standstill [W/(m**2*K)]
const H_OUT_STILL: f64 = 5.7;
/// exterior convection gain per unit vehicle speed
const H_OUT_SPEED_FACTOR: f64 = 3.8;

/// Breakdown of heat flowing into cabin air, all in [W], positive into cabin
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default, ApproxEq)]
pub struct CabinHeatLoad {
    /// occupants, electronics, and powertrain intrusion
    pub internal_w: f64,
    /// conduction through the opaque body
    pub body_w: f64,
    /// conduction through glazing
    pub glass_cond_w: f64,
    /// solar gain through sunlit glazing
    pub solar_w: f64,
    pub vent_sensible_w: f64,
    pub vent_latent_w: f64,
}

impl CabinHeatLoad {
    pub fn total_w(&self) -> f64 {
        self.internal_w
            + self.body_w
            + self.glass_cond_w
            + self.solar_w
            + self.vent_sensible_w
            + self.vent_latent_w
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CabinModel {
    pub cabin: CabinParams,
    pub cooling: CabinCoolingTable,
}

impl CabinModel {
    pub fn new(params: &EvThermalParams) -> Self {
        Self {
            cabin: params.cabin.clone(),
            cooling: params.cabin_cooling.clone(),
        }
    }

    /// Exterior convection coefficient [W/(m**2*K)] at `speed_kmh`
    pub fn h_out_w_per_m2_k(&self, speed_kmh: f64) -> f64 {
        H_OUT_STILL + H_OUT_SPEED_FACTOR * (speed_kmh / KMH_PER_MPS).max(0.0)
    }

    /// Interior convection coefficient [W/(m**2*K)]
    pub fn h_in_w_per_m2_k(&self) -> f64 {
        H_IN_NATURAL.max(H_IN_NATURAL + H_IN_FORCED_FACTOR * self.cabin.air_speed_internal_mps)
    }

    /// Overall transmittance [W/(m**2*K)] of a wall with material resistance
    /// `resist_m2_k_per_w` between interior and exterior films
    pub fn u_w_per_m2_k(&self, resist_m2_k_per_w: f64, speed_kmh: f64) -> f64 {
        let resist_tot =
            1.0 / self.h_in_w_per_m2_k() + resist_m2_k_per_w + 1.0 / self.h_out_w_per_m2_k(speed_kmh);
        div_or_zero(1.0, resist_tot)
    }

    pub fn internal_heat_w(&self) -> f64 {
        self.cabin.n_passengers as f64 * self.cabin.pwr_per_person_w
            + self.cabin.electronics_pwr_w
            + self.cabin.powertrain_intrusion_w
    }

    /// Fresh ventilation air mass flow [kg/s]
    pub fn vent_mass_flow_kg_per_s(&self, te_out_deg_c: f64) -> f64 {
        get_rho(te_out_deg_c)
            * self.cabin.vent_flow_per_person_m3_per_s
            * self.cabin.n_passengers as f64
            * self.cabin.fresh_air_frac
    }

    /// Heat load on cabin air
    /// Arguments:
    /// ----------
    /// te_out_deg_c: ambient temperature [°C]
    /// te_in_deg_c: cabin air temperature [°C]
    /// speed_kmh: vehicle speed [km/h]
    /// irradiance_w_per_m2: solar irradiance [W/m**2]
    pub fn total_heat_load(
        &self,
        te_out_deg_c: f64,
        te_in_deg_c: f64,
        speed_kmh: f64,
        irradiance_w_per_m2: f64,
    ) -> CabinHeatLoad {
        let cab = &self.cabin;
        let te_delta = te_out_deg_c - te_in_deg_c;
        let mdot = self.vent_mass_flow_kg_per_s(te_out_deg_c);
        CabinHeatLoad {
            internal_w: self.internal_heat_w(),
            body_w: self.u_w_per_m2_k(cab.body_resist_m2_k_per_w, speed_kmh)
                * cab.body_area_m2
                * te_delta,
            glass_cond_w: self.u_w_per_m2_k(cab.glass_resist_m2_k_per_w, speed_kmh)
                * cab.glass_area_m2
                * te_delta,
            solar_w: cab.shgc * cab.glass_sun_area_m2() * irradiance_w_per_m2,
            vent_sensible_w: mdot * cab.c_air_j_per_kg_k * te_delta,
            vent_latent_w: mdot
                * cab.h_fg_j_per_kg
                * (cab.humidity_out - cab.humidity_in_target).max(0.0),
        }
    }

    /// Cooling level selected for cabin temperature `te_cab_deg_c`: the first
    /// threshold not exceeded, or the last level if all are exceeded
    pub fn cooling_level(&self, te_cab_deg_c: f64) -> usize {
        first_not_exceeded(&self.cooling.te_thresholds_deg_c, te_cab_deg_c)
            .unwrap_or_else(|| self.cooling.pwr_levels_w.len().saturating_sub(1))
    }

    /// Evaporator heat [W] removed from the cabin at `te_cab_deg_c`
    pub fn cooling_pwr_w(&self, te_cab_deg_c: f64) -> f64 {
        self.cooling
            .pwr_levels_w
            .get(self.cooling_level(te_cab_deg_c))
            .copied()
            .unwrap_or_default()
            .max(0.0)
    }
}
