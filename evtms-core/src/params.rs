//! Module containing simulation parameters, their defaults, and validation.

use crate::air;
use crate::imports::*;
use crate::refrigeration::RefrigerationCycle;
use crate::tms::{ChillerThresholds, EvaporatorCapacityPolicy};
use crate::vehicle_motion::InverterHeatModel;

/// Largest number of integration steps a run may have
pub const MAX_STEPS: usize = 10_000_000;

/// Root parameter bundle for a coupled thermal simulation run
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default, Validate)]
#[serde(default)]
pub struct EvThermalParams {
    #[validate]
    pub sim: SimParams,
    #[validate]
    pub drive: DriveProfile,
    #[validate]
    pub vehicle: VehicleParams,
    #[validate]
    pub battery: BatteryParams,
    #[validate]
    pub masses: ThermalMassParams,
    pub init_temps: InitTemps,
    #[validate]
    pub cabin: CabinParams,
    pub cabin_cooling: CabinCoolingTable,
    #[validate]
    pub chiller: ChillerParams,
    #[validate]
    pub ltr: LtrParams,
    pub refrigeration: RefrigerationCycle,
    #[validate]
    pub compressor: CompressorParams,
}

impl SerdeAPI for EvThermalParams {
    fn init(&mut self) -> anyhow::Result<()> {
        self.validate()
            .map_err(|err| anyhow!("{}\n{}", format_dbg!(), err))?;
        ensure!(
            self.sim.dt_s > 0.0,
            "{}\n`sim.dt_s` must be positive, got {}",
            format_dbg!(),
            self.sim.dt_s
        );
        ensure!(
            self.sim.duration_s.is_finite() && self.sim.dt_s.is_finite(),
            "{}\n`sim.duration_s` ({}) and `sim.dt_s` ({}) must be finite",
            format_dbg!(),
            self.sim.duration_s,
            self.sim.dt_s
        );
        let steps = self.sim.duration_s / self.sim.dt_s;
        ensure!(
            steps.is_finite() && steps <= MAX_STEPS as f64,
            "{}\n`sim.duration_s / sim.dt_s` = {} exceeds the {} step limit",
            format_dbg!(),
            steps,
            MAX_STEPS
        );
        self.cabin_cooling
            .check()
            .with_context(|| format_dbg!())?;
        self.ltr.check().with_context(|| format_dbg!())?;
        self.chiller
            .check()
            .with_context(|| format_dbg!())?;
        self.check_euler_stability();
        Ok(())
    }
}

impl EvThermalParams {
    /// Number of integration steps, `floor(duration / dt)`
    pub fn n_steps(&self) -> usize {
        if self.sim.dt_s > 0.0 {
            (self.sim.duration_s / self.sim.dt_s).floor() as usize
        } else {
            0
        }
    }

    /// Absolute initial node temperatures [°C]
    pub fn init_node_temps(&self) -> NodeTemps {
        self.init_temps.temps(self.sim.amb_te_deg_c)
    }

    /// Saturation temperature [°C] of the refrigerant on the chiller side
    pub fn chiller_evap_sat_te_deg_c(&self) -> f64 {
        self.refrigeration.evap_sat_te_deg_c
    }

    /// Smallest `mc / UA` time constant [s] across nodes coupled to coolant
    pub fn min_time_constant_s(&self) -> f64 {
        let m = &self.masses;
        let coolant_ua = m.motor.ua_to_coolant_w_per_k
            + m.inverter.ua_to_coolant_w_per_k
            + m.battery.ua_to_coolant_w_per_k
            + self.ltr.ua_max_w_per_k
            + self.chiller.ua_w_per_k;
        [
            (m.motor.mc_j_per_k(), m.motor.ua_to_coolant_w_per_k),
            (m.inverter.mc_j_per_k(), m.inverter.ua_to_coolant_w_per_k),
            (m.battery.mc_j_per_k(), m.battery.ua_to_coolant_w_per_k),
            (m.coolant.mc_j_per_k(), coolant_ua),
        ]
        .iter()
        .filter(|(_, ua)| *ua > 0.0)
        .map(|(mc, ua)| mc / ua)
        .fold(f64::INFINITY, f64::min)
    }

    /// True when `dt` does not exceed the smallest node time constant
    pub fn dt_within_stability_limit(&self) -> bool {
        self.sim.dt_s <= self.min_time_constant_s()
    }

    /// Explicit Euler is only stable for `dt` small relative to the node time
    /// constants.  This only warns; the run proceeds.
    fn check_euler_stability(&self) {
        if !self.dt_within_stability_limit() {
            #[cfg(feature = "logging")]
            log::warn!(
                "time step {:.3} s exceeds smallest thermal time constant {:.3} s; \
                explicit Euler integration may be unstable",
                self.sim.dt_s,
                self.min_time_constant_s()
            );
        }
    }
}

/// Simulation time grid and ambient conditions
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
#[serde(default)]
pub struct SimParams {
    /// total simulated duration [s]
    #[validate(range(min = 0.0))]
    pub duration_s: f64,
    /// integration time step [s]
    pub dt_s: f64,
    /// ambient air temperature [°C]
    pub amb_te_deg_c: f64,
    /// solar irradiance on glazing [W/m**2]
    #[validate(range(min = 0.0))]
    pub solar_irradiance_w_per_m2: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            duration_s: 2100.0,
            dt_s: 1.0,
            amb_te_deg_c: 35.0,
            solar_irradiance_w_per_m2: 800.0,
        }
    }
}

/// Linear speed ramp followed by constant speed
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
#[serde(default)]
pub struct DriveProfile {
    /// speed at t = 0 [km/h]
    #[validate(range(min = 0.0))]
    pub speed_start_kmh: f64,
    /// speed at end of ramp [km/h]
    #[validate(range(min = 0.0))]
    pub speed_end_kmh: f64,
    /// duration of linear ramp [s]
    #[validate(range(min = 0.0))]
    pub ramp_up_time_s: f64,
}

impl Default for DriveProfile {
    fn default() -> Self {
        Self {
            speed_start_kmh: 60.0,
            speed_end_kmh: 120.0,
            ramp_up_time_s: 300.0,
        }
    }
}

/// Road load and drivetrain efficiency parameters
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
#[serde(default)]
pub struct VehicleParams {
    /// total vehicle mass [kg]
    #[validate(range(min = 0.0))]
    pub mass_kg: f64,
    /// aerodynamic drag coefficient
    #[validate(range(min = 0.0))]
    pub drag_coef: f64,
    /// frontal area [m**2]
    #[validate(range(min = 0.0))]
    pub frontal_area_m2: f64,
    /// rolling resistance coefficient
    #[validate(range(min = 0.0))]
    pub rolling_resist_coef: f64,
    /// gravitational acceleration [m/s**2]
    pub accel_grav_mps2: f64,
    /// motor efficiency
    #[validate(range(max = 1.0))]
    pub motor_eff: f64,
    /// inverter efficiency
    #[validate(range(max = 1.0))]
    pub inv_eff: f64,
    /// how inverter heat is derived from motor input power
    pub inverter_heat_model: InverterHeatModel,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            mass_kg: 2503.0,
            drag_coef: 0.22,
            frontal_area_m2: 3.0,
            rolling_resist_coef: 0.008,
            accel_grav_mps2: 9.8,
            motor_eff: 0.95,
            inv_eff: 0.985,
            inverter_heat_model: InverterHeatModel::default(),
        }
    }
}

/// Traction battery electrical parameters
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
#[serde(default)]
pub struct BatteryParams {
    /// terminal voltage [V]
    pub voltage_v: f64,
    /// equivalent internal resistance [Ω]
    #[validate(range(min = 0.0))]
    pub internal_resist_ohm: f64,
}

impl Default for BatteryParams {
    fn default() -> Self {
        Self {
            voltage_v: 340.0,
            internal_resist_ohm: 0.05,
        }
    }
}

/// Lumped component with a conductance to the coolant loop
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
pub struct ComponentThermalParams {
    /// mass [kg]
    #[validate(range(min = 0.0))]
    pub mass_kg: f64,
    /// specific heat [J/(kg*K)]
    #[validate(range(min = 0.0))]
    pub c_j_per_kg_k: f64,
    /// conductance to coolant [W/K]
    #[validate(range(min = 0.0))]
    pub ua_to_coolant_w_per_k: f64,
}

impl ComponentThermalParams {
    /// thermal capacitance [J/K]
    pub fn mc_j_per_k(&self) -> f64 {
        self.mass_kg * self.c_j_per_kg_k
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
pub struct CoolantParams {
    /// loop volume [L]
    #[validate(range(min = 0.0))]
    pub volume_l: f64,
    /// density [kg/m**3]
    #[validate(range(min = 0.0))]
    pub density_kg_per_m3: f64,
    /// specific heat [J/(kg*K)]
    #[validate(range(min = 0.0))]
    pub c_j_per_kg_k: f64,
}

impl CoolantParams {
    pub fn mass_kg(&self) -> f64 {
        self.volume_l * self.density_kg_per_m3 / 1000.0
    }

    /// thermal capacitance [J/K]
    pub fn mc_j_per_k(&self) -> f64 {
        self.mass_kg() * self.c_j_per_kg_k
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
pub struct CabinAirParams {
    /// cabin air volume [m**3]
    #[validate(range(min = 0.0))]
    pub volume_m3: f64,
    /// specific heat of air [J/(kg*K)]
    #[validate(range(min = 0.0))]
    pub c_j_per_kg_k: f64,
}

impl CabinAirParams {
    /// thermal capacitance [J/K], with air density evaluated at
    /// [CABIN_AIR_REF_TE_DEG_C](air::CABIN_AIR_REF_TE_DEG_C)
    pub fn mc_j_per_k(&self) -> f64 {
        self.volume_m3 * air::get_rho(air::CABIN_AIR_REF_TE_DEG_C) * self.c_j_per_kg_k
    }
}

/// Thermal capacitances and conductances of the five lumped nodes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
#[serde(default)]
pub struct ThermalMassParams {
    #[validate]
    pub motor: ComponentThermalParams,
    #[validate]
    pub inverter: ComponentThermalParams,
    #[validate]
    pub battery: ComponentThermalParams,
    #[validate]
    pub coolant: CoolantParams,
    #[validate]
    pub cabin_air: CabinAirParams,
}

impl Default for ThermalMassParams {
    fn default() -> Self {
        Self {
            motor: ComponentThermalParams {
                mass_kg: 60.0,
                c_j_per_kg_k: 500.0,
                ua_to_coolant_w_per_k: 500.0,
            },
            inverter: ComponentThermalParams {
                mass_kg: 15.0,
                c_j_per_kg_k: 800.0,
                ua_to_coolant_w_per_k: 300.0,
            },
            battery: ComponentThermalParams {
                mass_kg: 500.0,
                c_j_per_kg_k: 1000.0,
                ua_to_coolant_w_per_k: 1000.0,
            },
            coolant: CoolantParams {
                volume_l: 10.0,
                density_kg_per_m3: 1050.0,
                c_j_per_kg_k: 3400.0,
            },
            cabin_air: CabinAirParams {
                volume_m3: 3.5,
                c_j_per_kg_k: 1005.0,
            },
        }
    }
}

/// Temperatures [°C] of the five lumped nodes
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct NodeTemps {
    pub motor_te_deg_c: f64,
    pub inv_te_deg_c: f64,
    pub batt_te_deg_c: f64,
    pub cab_te_deg_c: f64,
    pub coolant_te_deg_c: f64,
}

/// Initial temperatures expressed as offsets from ambient
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InitTemps {
    pub motor_offset_deg_c: f64,
    pub inv_offset_deg_c: f64,
    pub batt_offset_deg_c: f64,
    pub cab_offset_deg_c: f64,
    /// absolute initial cabin temperature [°C], overrides `cab_offset_deg_c`
    pub cab_te_deg_c: Option<f64>,
    pub coolant_offset_deg_c: f64,
}

impl Default for InitTemps {
    fn default() -> Self {
        Self {
            motor_offset_deg_c: 5.0,
            inv_offset_deg_c: 5.0,
            batt_offset_deg_c: 2.0,
            cab_offset_deg_c: 0.0,
            cab_te_deg_c: None,
            coolant_offset_deg_c: 2.0,
        }
    }
}

impl InitTemps {
    pub fn temps(&self, amb_te_deg_c: f64) -> NodeTemps {
        NodeTemps {
            motor_te_deg_c: amb_te_deg_c + self.motor_offset_deg_c,
            inv_te_deg_c: amb_te_deg_c + self.inv_offset_deg_c,
            batt_te_deg_c: amb_te_deg_c + self.batt_offset_deg_c,
            cab_te_deg_c: self
                .cab_te_deg_c
                .unwrap_or(amb_te_deg_c + self.cab_offset_deg_c),
            coolant_te_deg_c: amb_te_deg_c + self.coolant_offset_deg_c,
        }
    }
}

/// Cabin envelope, occupancy, and ventilation parameters
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
#[serde(default)]
pub struct CabinParams {
    /// number of occupants
    pub n_passengers: u32,
    /// sensible heat per occupant [W]
    #[validate(range(min = 0.0))]
    pub pwr_per_person_w: f64,
    /// heat from cabin electronics [W]
    pub electronics_pwr_w: f64,
    /// heat intrusion from the powertrain [W]
    pub powertrain_intrusion_w: f64,
    /// equivalent internal air speed [m/s]
    #[validate(range(min = 0.0))]
    pub air_speed_internal_mps: f64,
    /// opaque body area [m**2]
    #[validate(range(min = 0.0))]
    pub body_area_m2: f64,
    /// opaque body material resistance [m**2*K/W]
    #[validate(range(min = 0.0))]
    pub body_resist_m2_k_per_w: f64,
    /// glazing area [m**2]
    #[validate(range(min = 0.0))]
    pub glass_area_m2: f64,
    /// glazing material resistance [m**2*K/W]
    #[validate(range(min = 0.0))]
    pub glass_resist_m2_k_per_w: f64,
    /// fraction of glazing area exposed to sun
    #[validate(range(min = 0.0, max = 1.0))]
    pub glass_sun_frac: f64,
    /// solar heat gain coefficient of glazing
    #[validate(range(min = 0.0, max = 1.0))]
    pub shgc: f64,
    /// outside humidity ratio [kg water/kg air]
    #[validate(range(min = 0.0))]
    pub humidity_out: f64,
    /// target cabin humidity ratio [kg water/kg air]
    #[validate(range(min = 0.0))]
    pub humidity_in_target: f64,
    /// fresh (vs. recirculated) fraction of ventilation air
    #[validate(range(min = 0.0, max = 1.0))]
    pub fresh_air_frac: f64,
    /// ventilation air demand per occupant [m**3/s]
    #[validate(range(min = 0.0))]
    pub vent_flow_per_person_m3_per_s: f64,
    /// specific heat of air [J/(kg*K)]
    #[validate(range(min = 0.0))]
    pub c_air_j_per_kg_k: f64,
    /// latent heat of vaporization of water [J/kg]
    #[validate(range(min = 0.0))]
    pub h_fg_j_per_kg: f64,
    /// comfort target temperature [°C], used for reporting
    pub te_target_deg_c: f64,
}

impl Default for CabinParams {
    fn default() -> Self {
        Self {
            n_passengers: 2,
            pwr_per_person_w: 100.0,
            electronics_pwr_w: 100.0,
            powertrain_intrusion_w: 50.0,
            air_speed_internal_mps: 0.5,
            body_area_m2: 12.0,
            body_resist_m2_k_per_w: 0.60,
            glass_area_m2: 4.0,
            glass_resist_m2_k_per_w: 0.009,
            glass_sun_frac: 0.4,
            shgc: 0.5,
            humidity_out: 0.0133,
            humidity_in_target: 0.0100,
            fresh_air_frac: 0.10,
            vent_flow_per_person_m3_per_s: 0.007,
            c_air_j_per_kg_k: 1005.0,
            h_fg_j_per_kg: 2.45e6,
            te_target_deg_c: 26.0,
        }
    }
}

impl CabinParams {
    /// glazing area exposed to sun [m**2]
    pub fn glass_sun_area_m2(&self) -> f64 {
        self.glass_area_m2 * self.glass_sun_frac
    }
}

/// Ordered (threshold, power) pairs for cabin evaporator cooling
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CabinCoolingTable {
    /// strictly increasing cabin temperature thresholds [°C]
    pub te_thresholds_deg_c: Vec<f64>,
    /// cooling power [W] at each level
    pub pwr_levels_w: Vec<f64>,
}

impl Default for CabinCoolingTable {
    fn default() -> Self {
        Self {
            te_thresholds_deg_c: vec![25.0, 100.0],
            pwr_levels_w: vec![0.0, 4000.0],
        }
    }
}

impl CabinCoolingTable {
    pub fn check(&self) -> anyhow::Result<()> {
        ensure!(
            !self.pwr_levels_w.is_empty(),
            "`pwr_levels_w` must not be empty"
        );
        ensure!(
            self.te_thresholds_deg_c.len() == self.pwr_levels_w.len(),
            "`te_thresholds_deg_c` (len {}) and `pwr_levels_w` (len {}) must have equal length",
            self.te_thresholds_deg_c.len(),
            self.pwr_levels_w.len()
        );
        ensure!(
            is_strictly_sorted(&self.te_thresholds_deg_c),
            "`te_thresholds_deg_c` must be strictly increasing: {:?}",
            self.te_thresholds_deg_c
        );
        Ok(())
    }
}

/// Powertrain chiller capacity and hysteresis targets
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
#[serde(default)]
pub struct ChillerParams {
    /// chiller conductance between coolant and refrigerant [W/K]
    #[validate(range(min = 0.0))]
    pub ua_w_per_k: f64,
    /// maximum heat the chiller can pull from coolant [W]
    #[validate(range(min = 0.0))]
    pub max_cool_pwr_w: f64,
    /// motor temperature above which the chiller starts [°C]
    pub motor_te_target_deg_c: f64,
    /// inverter temperature above which the chiller starts [°C]
    pub inv_te_target_deg_c: f64,
    /// battery temperature below which the chiller may stop [°C]
    pub batt_te_target_low_deg_c: f64,
    /// battery temperature above which the chiller starts [°C]
    pub batt_te_target_high_deg_c: f64,
    /// motor and inverter stop thresholds are `target - hysteresis_band` [°C]
    #[validate(range(min = 0.0))]
    pub hysteresis_band_deg_c: f64,
}

impl Default for ChillerParams {
    fn default() -> Self {
        Self {
            ua_w_per_k: 1500.0,
            max_cool_pwr_w: 4000.0,
            motor_te_target_deg_c: 45.0,
            inv_te_target_deg_c: 45.0,
            batt_te_target_low_deg_c: 30.0,
            batt_te_target_high_deg_c: 35.0,
            hysteresis_band_deg_c: 2.5,
        }
    }
}

impl ChillerParams {
    pub fn thresholds(&self) -> ChillerThresholds {
        ChillerThresholds {
            motor_start_deg_c: self.motor_te_target_deg_c,
            inv_start_deg_c: self.inv_te_target_deg_c,
            batt_start_deg_c: self.batt_te_target_high_deg_c,
            motor_stop_deg_c: self.motor_te_target_deg_c - self.hysteresis_band_deg_c,
            inv_stop_deg_c: self.inv_te_target_deg_c - self.hysteresis_band_deg_c,
            batt_stop_deg_c: self.batt_te_target_low_deg_c,
        }
    }

    pub fn check(&self) -> anyhow::Result<()> {
        ensure!(
            self.batt_te_target_low_deg_c <= self.batt_te_target_high_deg_c,
            "`batt_te_target_low_deg_c` ({}) must not exceed `batt_te_target_high_deg_c` ({})",
            self.batt_te_target_low_deg_c,
            self.batt_te_target_high_deg_c
        );
        Ok(())
    }
}

/// Low temperature radiator: multi-level fan with per-level UA and power
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
#[serde(default)]
pub struct LtrParams {
    /// UA [W/K] corresponding to full effectiveness
    #[validate(range(min = 0.0))]
    pub ua_max_w_per_k: f64,
    /// UA [W/K] at each fan level
    pub ua_at_levels_w_per_k: Vec<f64>,
    /// fan electrical power [W] at each fan level
    pub fan_pwr_at_levels_w: Vec<f64>,
    /// non-decreasing coolant temperatures [°C] that trigger levels 1..N-1
    pub coolant_te_thresholds_deg_c: Vec<f64>,
    /// coolant must fall this far below the triggering threshold to downshift [°C]
    #[validate(range(min = 0.0))]
    pub hysteresis_offset_deg_c: f64,
}

impl Default for LtrParams {
    fn default() -> Self {
        Self {
            ua_max_w_per_k: 2000.0,
            ua_at_levels_w_per_k: vec![200.0, 800.0, 1500.0, 2000.0],
            fan_pwr_at_levels_w: vec![0.0, 50.0, 100.0, 200.0],
            coolant_te_thresholds_deg_c: vec![40.0, 50.0, 60.0],
            hysteresis_offset_deg_c: 1.0,
        }
    }
}

impl LtrParams {
    /// number of fan levels
    pub fn n_levels(&self) -> usize {
        self.ua_at_levels_w_per_k.len()
    }

    pub fn check(&self) -> anyhow::Result<()> {
        ensure!(
            !self.ua_at_levels_w_per_k.is_empty(),
            "`ua_at_levels_w_per_k` must not be empty"
        );
        ensure!(
            self.fan_pwr_at_levels_w.len() == self.n_levels(),
            "`fan_pwr_at_levels_w` (len {}) must match `ua_at_levels_w_per_k` (len {})",
            self.fan_pwr_at_levels_w.len(),
            self.n_levels()
        );
        ensure!(
            self.coolant_te_thresholds_deg_c.len() + 1 == self.n_levels(),
            "`coolant_te_thresholds_deg_c` (len {}) must have one fewer entry than the {} levels",
            self.coolant_te_thresholds_deg_c.len(),
            self.n_levels()
        );
        ensure!(
            is_sorted(&self.coolant_te_thresholds_deg_c),
            "`coolant_te_thresholds_deg_c` must be non-decreasing: {:?}",
            self.coolant_te_thresholds_deg_c
        );
        if !is_sorted(&self.ua_at_levels_w_per_k) || !is_sorted(&self.fan_pwr_at_levels_w) {
            #[cfg(feature = "logging")]
            log::warn!(
                "LTR UA {:?} or fan power {:?} is not non-decreasing with level",
                self.ua_at_levels_w_per_k,
                self.fan_pwr_at_levels_w
            );
        }
        Ok(())
    }
}

/// Refrigeration compressor drive and evaporator capacity handling
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Validate)]
#[serde(default)]
pub struct CompressorParams {
    /// electrical-to-mechanical drive efficiency
    #[validate(range(max = 1.0))]
    pub drive_eff: f64,
    /// electrical power [W] drawn when COP or drive efficiency is unusable
    #[validate(range(min = 0.0))]
    pub fallback_pwr_elec_w: f64,
    /// how cabin cooling and the chiller share the evaporator
    pub evap_capacity_policy: EvaporatorCapacityPolicy,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            drive_eff: 0.85,
            fallback_pwr_elec_w: 3000.0,
            evap_capacity_policy: EvaporatorCapacityPolicy::default(),
        }
    }
}
