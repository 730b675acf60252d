//! Module containing the thermal management system: chiller and radiator fan
//! controllers, the refrigeration compressor, and the node heat balances.

use crate::imports::*;
use crate::params::{
    BatteryParams, ChillerParams, EvThermalParams, LtrParams, NodeTemps, ThermalMassParams,
};
use crate::refrigeration::CopResolution;
use crate::vehicle_motion::PowertrainHeat;
use evtms_proc_macros::ApproxEq;

/// Start and stop temperatures [°C] for the powertrain chiller
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, ApproxEq)]
pub struct ChillerThresholds {
    pub motor_start_deg_c: f64,
    pub inv_start_deg_c: f64,
    pub batt_start_deg_c: f64,
    pub motor_stop_deg_c: f64,
    pub inv_stop_deg_c: f64,
    pub batt_stop_deg_c: f64,
}

/// Powertrain chiller on/off state
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChillerState {
    #[default]
    Off,
    On,
}

impl ChillerState {
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Schmitt trigger transition.  Any component above its start threshold
    /// turns the chiller on; all components below their stop thresholds turn
    /// it off; otherwise the state holds.  Start wins if both apply.
    pub fn next(self, temps: &NodeTemps, thrs: &ChillerThresholds) -> Self {
        let start = temps.motor_te_deg_c > thrs.motor_start_deg_c
            || temps.inv_te_deg_c > thrs.inv_start_deg_c
            || temps.batt_te_deg_c > thrs.batt_start_deg_c;
        let stop = temps.motor_te_deg_c < thrs.motor_stop_deg_c
            && temps.inv_te_deg_c < thrs.inv_stop_deg_c
            && temps.batt_te_deg_c < thrs.batt_stop_deg_c;
        if start {
            Self::On
        } else if stop {
            Self::Off
        } else {
            self
        }
    }
}

impl From<ChillerState> for bool {
    fn from(state: ChillerState) -> Self {
        state.is_on()
    }
}

/// Multi-level radiator fan controller with hysteresis on the way down
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LtrController {
    pub params: LtrParams,
}

impl LtrController {
    pub fn new(params: LtrParams) -> Self {
        Self { params }
    }

    pub fn max_level(&self) -> usize {
        self.params.n_levels().saturating_sub(1)
    }

    /// Level implied by `te_coolant_deg_c` alone
    pub fn ideal_level(&self, te_coolant_deg_c: f64) -> usize {
        count_leading_exceeded(&self.params.coolant_te_thresholds_deg_c, te_coolant_deg_c)
            .min(self.max_level())
    }

    /// Upshifts go straight to the ideal level.  Downshifts happen only once
    /// coolant falls below the threshold that triggered `prev_level` by more
    /// than the hysteresis offset, and then drop straight to the ideal level.
    pub fn next_level(&self, prev_level: usize, te_coolant_deg_c: f64) -> usize {
        let ideal = self.ideal_level(te_coolant_deg_c);
        if ideal > prev_level {
            return ideal;
        }
        if ideal == prev_level || prev_level == 0 {
            return prev_level.min(self.max_level());
        }
        match self
            .params
            .coolant_te_thresholds_deg_c
            .get(prev_level - 1)
        {
            Some(thr) if te_coolant_deg_c < thr - self.params.hysteresis_offset_deg_c => ideal,
            _ => prev_level.min(self.max_level()),
        }
    }

    /// radiator UA [W/K] at `level`
    pub fn ua_w_per_k(&self, level: usize) -> f64 {
        self.params
            .ua_at_levels_w_per_k
            .get(level)
            .copied()
            .unwrap_or_default()
    }

    /// fan electrical power [W] at `level`
    pub fn fan_pwr_w(&self, level: usize) -> f64 {
        self.params
            .fan_pwr_at_levels_w
            .get(level)
            .copied()
            .unwrap_or_default()
    }

    /// `UA(level) / UA_max`, or `1.0` when `UA_max` is not positive
    pub fn effectiveness(&self, level: usize) -> f64 {
        if self.params.ua_max_w_per_k > 0.0 {
            self.ua_w_per_k(level) / self.params.ua_max_w_per_k
        } else {
            1.0
        }
    }
}

/// How a shared evaporator divides its capacity between cabin and chiller
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub enum EvaporatorCapacityPolicy {
    /// Cabin cooling and chiller heat are both met in full
    #[default]
    Unlimited,
    /// Total evaporator load is capped; cabin cooling is served first and
    /// the chiller gets what remains
    SharedCap { max_w: f64 },
}

impl EvaporatorCapacityPolicy {
    /// Returns granted `(cabin_cooling_w, chiller_qdot_w)`
    pub fn allocate(&self, cabin_cooling_w: f64, chiller_qdot_w: f64) -> (f64, f64) {
        match self {
            Self::Unlimited => (cabin_cooling_w, chiller_qdot_w),
            Self::SharedCap { max_w } => {
                let max_w = max_w.max(0.0);
                let cabin = cabin_cooling_w.min(max_w);
                (cabin, chiller_qdot_w.min(max_w - cabin))
            }
        }
    }
}

/// Compressor shaft and electrical power
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default, ApproxEq)]
pub struct CompressorPwr {
    pub mech_w: f64,
    pub elec_w: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Compressor {
    /// coefficient of performance, fixed for the run
    pub cop: f64,
    pub drive_eff: f64,
    pub fallback_pwr_elec_w: f64,
}

impl Compressor {
    /// Power needed to move `evap_load_w` [W] of heat.  Falls back to a
    /// fixed electrical draw when the COP or drive efficiency is unusable.
    pub fn pwr(&self, evap_load_w: f64) -> CompressorPwr {
        if evap_load_w <= 0.0 {
            return CompressorPwr::default();
        }
        if self.cop.is_finite() && self.cop > 0.0 && self.drive_eff > 0.0 {
            let mech_w = evap_load_w / self.cop;
            CompressorPwr {
                mech_w,
                elec_w: mech_w / self.drive_eff,
            }
        } else {
            CompressorPwr {
                mech_w: self.fallback_pwr_elec_w * self.drive_eff.max(0.0),
                elec_w: self.fallback_pwr_elec_w,
            }
        }
    }
}

/// Everything the coolant loop does in one step
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct CoolingLoopOutput {
    pub chiller_state: ChillerState,
    pub ltr_level: usize,
    /// heat pulled from coolant by the chiller [W]
    pub chiller_qdot_w: f64,
    /// heat pulled from cabin air by the evaporator [W]
    pub cabin_cooling_w: f64,
    /// total evaporator load [W]
    pub evap_load_w: f64,
    pub comp_pwr_mech_w: f64,
    pub comp_pwr_elec_w: f64,
    /// heat rejected into coolant by the liquid-cooled condenser [W]
    pub lcc_qdot_w: f64,
    /// heat rejected from coolant to ambient by the radiator [W]
    pub ltr_qdot_w: f64,
    pub ltr_fan_pwr_w: f64,
    pub ltr_effectiveness: f64,
}

/// Battery load and heat exchange of the three powertrain nodes
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default, ApproxEq)]
pub struct PowertrainThermal {
    /// total battery draw: inverter, compressor, and fan [W]
    pub batt_pwr_draw_w: f64,
    /// battery Joule heat [W]
    pub batt_qdot_w: f64,
    pub motor_to_coolant_w: f64,
    pub inv_to_coolant_w: f64,
    pub batt_to_coolant_w: f64,
    pub motor_dte_deg_c_per_s: f64,
    pub inv_dte_deg_c_per_s: f64,
    pub batt_dte_deg_c_per_s: f64,
}

impl PowertrainThermal {
    pub fn to_coolant_w(&self) -> f64 {
        self.motor_to_coolant_w + self.inv_to_coolant_w + self.batt_to_coolant_w
    }
}

/// Battery Joule heat [W] for draw `pwr_w` at `voltage_v` across `resist_ohm`
pub fn batt_joule_heat_w(pwr_w: f64, voltage_v: f64, resist_ohm: f64) -> f64 {
    if pwr_w <= 0.0 || voltage_v <= 0.0 {
        return 0.0;
    }
    (pwr_w / voltage_v).powi(2) * resist_ohm
}

/// Rate of change [°C/s] of a lumped node, zero for non-positive capacitance
pub fn node_derivative(qdot_net_w: f64, mc_j_per_k: f64) -> f64 {
    div_or_zero(qdot_net_w, mc_j_per_k)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThermalManagementSystem {
    pub chiller: ChillerParams,
    pub chiller_thresholds: ChillerThresholds,
    /// refrigerant saturation temperature on the chiller side [°C]
    pub chiller_evap_sat_te_deg_c: f64,
    pub ltr: LtrController,
    pub compressor: Compressor,
    pub evap_capacity_policy: EvaporatorCapacityPolicy,
    pub masses: ThermalMassParams,
    pub battery: BatteryParams,
    pub amb_te_deg_c: f64,
}

impl ThermalManagementSystem {
    pub fn new(params: &EvThermalParams, cop: &CopResolution) -> Self {
        Self {
            chiller: params.chiller.clone(),
            chiller_thresholds: params.chiller.thresholds(),
            chiller_evap_sat_te_deg_c: params.chiller_evap_sat_te_deg_c(),
            ltr: LtrController::new(params.ltr.clone()),
            compressor: Compressor {
                cop: cop.cop,
                drive_eff: params.compressor.drive_eff,
                fallback_pwr_elec_w: params.compressor.fallback_pwr_elec_w,
            },
            evap_capacity_policy: params.compressor.evap_capacity_policy,
            masses: params.masses.clone(),
            battery: params.battery.clone(),
            amb_te_deg_c: params.sim.amb_te_deg_c,
        }
    }

    /// Heat [W] the chiller can pull from coolant at `te_coolant_deg_c`
    pub fn chiller_qdot_w(&self, state: ChillerState, te_coolant_deg_c: f64) -> f64 {
        if !state.is_on() {
            return 0.0;
        }
        (self.chiller.ua_w_per_k * (te_coolant_deg_c - self.chiller_evap_sat_te_deg_c))
            .max(0.0)
            .min(self.chiller.max_cool_pwr_w)
    }

    /// Advances both controllers from their previous states and evaluates the
    /// refrigerant and coolant loop heat flows at start-of-step temperatures.
    pub fn cooling_loop(
        &self,
        temps: &NodeTemps,
        chiller_prev: ChillerState,
        ltr_level_prev: usize,
        cabin_cooling_w: f64,
    ) -> CoolingLoopOutput {
        let chiller_state = chiller_prev.next(temps, &self.chiller_thresholds);
        let chiller_qdot_w = self.chiller_qdot_w(chiller_state, temps.coolant_te_deg_c);
        let (cabin_cooling_w, chiller_qdot_w) = self
            .evap_capacity_policy
            .allocate(cabin_cooling_w, chiller_qdot_w);
        let evap_load_w = cabin_cooling_w + chiller_qdot_w;
        let comp = self.compressor.pwr(evap_load_w);

        let ltr_level = self.ltr.next_level(ltr_level_prev, temps.coolant_te_deg_c);
        let ltr_qdot_w = (self.ltr.ua_w_per_k(ltr_level)
            * (temps.coolant_te_deg_c - self.amb_te_deg_c))
            .max(0.0);

        CoolingLoopOutput {
            chiller_state,
            ltr_level,
            chiller_qdot_w,
            cabin_cooling_w,
            evap_load_w,
            comp_pwr_mech_w: comp.mech_w,
            comp_pwr_elec_w: comp.elec_w,
            lcc_qdot_w: evap_load_w + comp.mech_w,
            ltr_qdot_w,
            ltr_fan_pwr_w: self.ltr.fan_pwr_w(ltr_level),
            ltr_effectiveness: self.ltr.effectiveness(ltr_level),
        }
    }

    /// Battery load, component-to-coolant heat flows, and component
    /// temperature derivatives
    pub fn powertrain_thermal(
        &self,
        temps: &NodeTemps,
        heat: &PowertrainHeat,
        cooling: &CoolingLoopOutput,
    ) -> PowertrainThermal {
        let m = &self.masses;
        let batt_pwr_draw_w = heat.inv_pwr_in_w + cooling.comp_pwr_elec_w + cooling.ltr_fan_pwr_w;
        let batt_qdot_w = batt_joule_heat_w(
            batt_pwr_draw_w,
            self.battery.voltage_v,
            self.battery.internal_resist_ohm,
        );
        let te_c = temps.coolant_te_deg_c;
        let motor_to_coolant_w = m.motor.ua_to_coolant_w_per_k * (temps.motor_te_deg_c - te_c);
        let inv_to_coolant_w = m.inverter.ua_to_coolant_w_per_k * (temps.inv_te_deg_c - te_c);
        let batt_to_coolant_w = m.battery.ua_to_coolant_w_per_k * (temps.batt_te_deg_c - te_c);
        PowertrainThermal {
            batt_pwr_draw_w,
            batt_qdot_w,
            motor_to_coolant_w,
            inv_to_coolant_w,
            batt_to_coolant_w,
            motor_dte_deg_c_per_s: node_derivative(
                heat.motor_qdot_w - motor_to_coolant_w,
                m.motor.mc_j_per_k(),
            ),
            inv_dte_deg_c_per_s: node_derivative(
                heat.inv_qdot_w - inv_to_coolant_w,
                m.inverter.mc_j_per_k(),
            ),
            batt_dte_deg_c_per_s: node_derivative(
                batt_qdot_w - batt_to_coolant_w,
                m.battery.mc_j_per_k(),
            ),
        }
    }

    /// Net heat [W] into coolant
    pub fn coolant_net_qdot_w(&self, cooling: &CoolingLoopOutput, pt: &PowertrainThermal) -> f64 {
        cooling.lcc_qdot_w + pt.to_coolant_w() - cooling.ltr_qdot_w - cooling.chiller_qdot_w
    }

    /// Coolant temperature derivative [°C/s]
    pub fn coolant_derivative(&self, cooling: &CoolingLoopOutput, pt: &PowertrainThermal) -> f64 {
        node_derivative(
            self.coolant_net_qdot_w(cooling, pt),
            self.masses.coolant.mc_j_per_k(),
        )
    }

    /// Cabin air temperature derivative [°C/s]
    pub fn cabin_derivative(&self, cabin_load_w: f64, cabin_cooling_w: f64) -> f64 {
        node_derivative(
            cabin_load_w - cabin_cooling_w,
            self.masses.cabin_air.mc_j_per_k(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refrigeration::CopSource;

    fn mock_tms(cop: f64) -> ThermalManagementSystem {
        ThermalManagementSystem::new(
            &EvThermalParams::default(),
            &CopResolution {
                cop,
                source: CopSource::Solver,
            },
        )
    }

    fn temps(motor: f64, inv: f64, batt: f64, coolant: f64) -> NodeTemps {
        NodeTemps {
            motor_te_deg_c: motor,
            inv_te_deg_c: inv,
            batt_te_deg_c: batt,
            cab_te_deg_c: 26.0,
            coolant_te_deg_c: coolant,
        }
    }

    #[test]
    fn test_chiller_hysteresis() {
        let thrs = ChillerParams::default().thresholds();
        let mut state = ChillerState::Off;
        // inside the band: stays off
        state = state.next(&temps(44.0, 40.0, 32.0, 30.0), &thrs);
        assert_eq!(state, ChillerState::Off);
        // motor crosses its target
        state = state.next(&temps(45.1, 40.0, 32.0, 30.0), &thrs);
        assert_eq!(state, ChillerState::On);
        // back inside the band: holds on
        state = state.next(&temps(43.0, 40.0, 32.0, 30.0), &thrs);
        assert_eq!(state, ChillerState::On);
        // motor and inverter low but battery still above its stop threshold
        state = state.next(&temps(42.0, 40.0, 31.0, 30.0), &thrs);
        assert_eq!(state, ChillerState::On);
        // everything below stop thresholds
        state = state.next(&temps(42.0, 40.0, 29.0, 30.0), &thrs);
        assert_eq!(state, ChillerState::Off);
        // battery alone can start it
        state = state.next(&temps(30.0, 30.0, 35.5, 30.0), &thrs);
        assert_eq!(state, ChillerState::On);
        assert!(bool::from(state));
    }

    #[test]
    fn test_chiller_thresholds_are_strict() {
        let thrs = ChillerParams::default().thresholds();
        assert_eq!(
            ChillerState::Off.next(&temps(45.0, 45.0, 35.0, 30.0), &thrs),
            ChillerState::Off
        );
        assert_eq!(
            ChillerState::On.next(&temps(42.5, 40.0, 29.0, 30.0), &thrs),
            ChillerState::On
        );
    }

    #[test]
    fn test_ltr_ideal_level() {
        let ltr = LtrController::new(LtrParams::default());
        assert_eq!(ltr.ideal_level(35.0), 0);
        assert_eq!(ltr.ideal_level(40.0), 0);
        assert_eq!(ltr.ideal_level(45.0), 1);
        assert_eq!(ltr.ideal_level(55.0), 2);
        assert_eq!(ltr.ideal_level(70.0), 3);
    }

    #[test]
    fn test_ltr_hysteresis() {
        let ltr = LtrController::new(LtrParams::default());
        // multi-level jump up
        assert_eq!(ltr.next_level(0, 55.0), 2);
        assert_eq!(ltr.next_level(0, 61.0), 3);
        // inside hysteresis band of the level-2 trigger: hold
        assert_eq!(ltr.next_level(2, 49.5), 2);
        assert_eq!(ltr.next_level(2, 49.0), 2);
        // below band: drop to the ideal level
        assert_eq!(ltr.next_level(2, 48.9), 1);
        // multi-level jump down
        assert_eq!(ltr.next_level(3, 38.0), 0);
        // equal: hold
        assert_eq!(ltr.next_level(1, 45.0), 1);
        assert_eq!(ltr.next_level(0, 10.0), 0);
    }

    #[test]
    fn test_ltr_with_single_level() {
        let ltr = LtrController::new(LtrParams {
            ua_max_w_per_k: 0.0,
            ua_at_levels_w_per_k: vec![500.0],
            fan_pwr_at_levels_w: vec![0.0],
            coolant_te_thresholds_deg_c: vec![],
            hysteresis_offset_deg_c: 1.0,
        });
        assert_eq!(ltr.ideal_level(90.0), 0);
        assert_eq!(ltr.next_level(0, 90.0), 0);
        assert_eq!(ltr.effectiveness(0), 1.0);
    }

    #[test]
    fn test_ltr_effectiveness() {
        let ltr = LtrController::new(LtrParams::default());
        assert_eq!(ltr.effectiveness(0), 0.1);
        assert_eq!(ltr.effectiveness(3), 1.0);
        assert_eq!(ltr.fan_pwr_w(2), 100.0);
    }

    #[test]
    fn test_compressor_power() {
        let comp = Compressor {
            cop: 3.0,
            drive_eff: 0.85,
            fallback_pwr_elec_w: 3000.0,
        };
        let pwr = comp.pwr(5000.0);
        assert!(almost_eq(pwr.mech_w, 1666.667, Some(1e-6)));
        assert!(almost_eq(pwr.elec_w, 1960.784, Some(1e-6)));
        assert_eq!(comp.pwr(0.0), CompressorPwr::default());

        let mut prev = 0.0;
        for load in (0..=20).map(|x| x as f64 * 500.0) {
            let elec = comp.pwr(load).elec_w;
            assert!(elec >= prev);
            prev = elec;
        }
    }

    #[test]
    fn test_compressor_fallback() {
        let comp = Compressor {
            cop: 3.0,
            drive_eff: 0.0,
            fallback_pwr_elec_w: 3000.0,
        };
        assert_eq!(
            comp.pwr(5000.0),
            CompressorPwr {
                mech_w: 0.0,
                elec_w: 3000.0
            }
        );
        let comp = Compressor {
            cop: f64::INFINITY,
            drive_eff: 0.85,
            fallback_pwr_elec_w: 3000.0,
        };
        assert!(comp.pwr(5000.0).approx_eq(
            &CompressorPwr {
                mech_w: 2550.0,
                elec_w: 3000.0
            },
            1e-9
        ));
    }

    #[test]
    fn test_lcc_heat() {
        let mut tms = mock_tms(3.0);
        tms.chiller.max_cool_pwr_w = 5000.0;
        tms.chiller.ua_w_per_k = 1000.0;
        // coolant 10 °C above evaporating saturation, no cabin demand
        let out = tms.cooling_loop(&temps(46.0, 40.0, 32.0, 15.0), ChillerState::Off, 0, 0.0);
        assert_eq!(out.chiller_state, ChillerState::On);
        assert!(almost_eq(out.chiller_qdot_w, 10_000.0_f64.min(5000.0), None));
        assert!(almost_eq(out.comp_pwr_elec_w, 1960.784, Some(1e-6)));
        assert!(almost_eq(out.lcc_qdot_w, 6666.667, Some(1e-6)));
    }

    #[test]
    fn test_chiller_heat_is_capped_and_floored() {
        let tms = mock_tms(3.0);
        assert_eq!(tms.chiller_qdot_w(ChillerState::On, 50.0), 4000.0);
        assert_eq!(tms.chiller_qdot_w(ChillerState::On, 6.0), 1500.0);
        assert_eq!(tms.chiller_qdot_w(ChillerState::On, 2.0), 0.0);
        assert_eq!(tms.chiller_qdot_w(ChillerState::Off, 50.0), 0.0);
    }

    #[test]
    fn test_shared_evaporator_capacity() {
        let policy = EvaporatorCapacityPolicy::SharedCap { max_w: 5000.0 };
        assert_eq!(policy.allocate(4000.0, 4000.0), (4000.0, 1000.0));
        assert_eq!(policy.allocate(6000.0, 4000.0), (5000.0, 0.0));
        assert_eq!(policy.allocate(1000.0, 2000.0), (1000.0, 2000.0));
        assert_eq!(
            EvaporatorCapacityPolicy::Unlimited.allocate(6000.0, 4000.0),
            (6000.0, 4000.0)
        );
    }

    #[test]
    fn test_ltr_does_not_heat_coolant() {
        let tms = mock_tms(3.0);
        let out = tms.cooling_loop(&temps(30.0, 30.0, 30.0, 30.0), ChillerState::Off, 3, 0.0);
        assert_eq!(out.ltr_qdot_w, 0.0);
        assert_eq!(out.evap_load_w, 0.0);
        assert_eq!(out.lcc_qdot_w, 0.0);
    }

    #[test]
    fn test_powertrain_thermal() {
        let tms = mock_tms(3.0);
        let heat = PowertrainHeat {
            inv_pwr_in_w: 30_000.0,
            motor_qdot_w: 1000.0,
            inv_qdot_w: 400.0,
            ..Default::default()
        };
        let cooling = CoolingLoopOutput {
            comp_pwr_elec_w: 3000.0,
            ltr_fan_pwr_w: 4000.0,
            ..Default::default()
        };
        let pt = tms.powertrain_thermal(&temps(42.0, 41.0, 36.0, 40.0), &heat, &cooling);
        assert_eq!(pt.batt_pwr_draw_w, 37_000.0);
        // (37000 / 340)**2 * 0.05
        assert!(almost_eq(pt.batt_qdot_w, 592.128, Some(1e-6)));
        assert_eq!(pt.motor_to_coolant_w, 1000.0);
        assert_eq!(pt.inv_to_coolant_w, 300.0);
        assert_eq!(pt.batt_to_coolant_w, -4000.0);
        assert_eq!(pt.motor_dte_deg_c_per_s, 0.0);
        assert!(almost_eq(pt.inv_dte_deg_c_per_s, 100.0 / 12_000.0, None));
    }

    #[test]
    fn test_degenerate_capacitance_and_voltage() {
        assert_eq!(node_derivative(1000.0, 0.0), 0.0);
        assert_eq!(batt_joule_heat_w(10_000.0, 0.0, 0.05), 0.0);
        assert_eq!(batt_joule_heat_w(-10_000.0, 340.0, 0.05), 0.0);
    }
}
