//! Module containing the explicit Euler time-stepping engine.

use crate::cabin::CabinModel;
use crate::data_manager::{DataManager, SimulationState, StepRecord};
use crate::imports::*;
use crate::params::{EvThermalParams, NodeTemps};
use crate::refrigeration::{resolve_cop, CopResolution, CopSolver};
use crate::results::SimulationResults;
use crate::tms::{CoolingLoopOutput, ThermalManagementSystem};
use crate::vehicle_motion::VehicleMotionModel;

/// Temperature rates of change [°C/s] of the five nodes
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct NodeRates {
    pub motor_deg_c_per_s: f64,
    pub inv_deg_c_per_s: f64,
    pub batt_deg_c_per_s: f64,
    pub cab_deg_c_per_s: f64,
    pub coolant_deg_c_per_s: f64,
}

impl NodeRates {
    /// Forward Euler update of `temps` over `dt_s`
    pub fn integrate(&self, temps: &NodeTemps, dt_s: f64) -> NodeTemps {
        NodeTemps {
            motor_te_deg_c: temps.motor_te_deg_c + self.motor_deg_c_per_s * dt_s,
            inv_te_deg_c: temps.inv_te_deg_c + self.inv_deg_c_per_s * dt_s,
            batt_te_deg_c: temps.batt_te_deg_c + self.batt_deg_c_per_s * dt_s,
            cab_te_deg_c: temps.cab_te_deg_c + self.cab_deg_c_per_s * dt_s,
            coolant_te_deg_c: temps.coolant_te_deg_c + self.coolant_deg_c_per_s * dt_s,
        }
    }
}

/// Everything derived from one state, before integration
#[derive(Clone, Debug, PartialEq)]
pub struct StepEvaluation {
    pub cooling: CoolingLoopOutput,
    pub cab_cooling_level: usize,
    pub rates: NodeRates,
    pub record: StepRecord,
}

/// Couples the vehicle, cabin, and thermal management models and advances
/// them through time
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationEngine {
    pub params: EvThermalParams,
    /// COP fixed for the whole run
    pub cop: CopResolution,
    pub vehicle: VehicleMotionModel,
    pub cabin: CabinModel,
    pub tms: ThermalManagementSystem,
    pub data: DataManager,
}

impl SimulationEngine {
    /// Validates `params` and builds the component models
    pub fn new(mut params: EvThermalParams, cop: CopResolution) -> anyhow::Result<Self> {
        params.init().with_context(|| format_dbg!())?;
        Ok(Self {
            vehicle: VehicleMotionModel::new(&params),
            cabin: CabinModel::new(&params),
            tms: ThermalManagementSystem::new(&params, &cop),
            data: DataManager::new(&params)?,
            params,
            cop,
        })
    }

    /// Resolves the COP with `solver`, falling back on failure, then builds
    pub fn with_solver<S: CopSolver + ?Sized>(
        params: EvThermalParams,
        solver: &S,
    ) -> anyhow::Result<Self> {
        let cop = resolve_cop(solver, &params.refrigeration);
        Self::new(params, cop)
    }

    /// Evaluates every model at `state` without changing anything
    pub fn evaluate(&self, state: &SimulationState) -> StepEvaluation {
        let temps = &state.temps;
        let sim = &self.params.sim;
        let heat = self.vehicle.powertrain_heat(state.speed_kmh);
        let cab_load = self.cabin.total_heat_load(
            sim.amb_te_deg_c,
            temps.cab_te_deg_c,
            state.speed_kmh,
            sim.solar_irradiance_w_per_m2,
        );
        let cab_cooling_level = self.cabin.cooling_level(temps.cab_te_deg_c);
        let cooling = self.tms.cooling_loop(
            temps,
            state.chiller_state,
            state.ltr_level,
            self.cabin.cooling_pwr_w(temps.cab_te_deg_c),
        );
        let pt = self.tms.powertrain_thermal(temps, &heat, &cooling);
        let rates = NodeRates {
            motor_deg_c_per_s: pt.motor_dte_deg_c_per_s,
            inv_deg_c_per_s: pt.inv_dte_deg_c_per_s,
            batt_deg_c_per_s: pt.batt_dte_deg_c_per_s,
            cab_deg_c_per_s: self
                .tms
                .cabin_derivative(cab_load.total_w(), cooling.cabin_cooling_w),
            coolant_deg_c_per_s: self.tms.coolant_derivative(&cooling, &pt),
        };
        let record = StepRecord {
            time_s: state.time_s,
            motor_te_deg_c: temps.motor_te_deg_c,
            inv_te_deg_c: temps.inv_te_deg_c,
            batt_te_deg_c: temps.batt_te_deg_c,
            cab_te_deg_c: temps.cab_te_deg_c,
            coolant_te_deg_c: temps.coolant_te_deg_c,
            speed_kmh: state.speed_kmh,
            chiller_on: cooling.chiller_state.is_on(),
            ltr_level: cooling.ltr_level,
            cab_cooling_level,
            ltr_fan_pwr_w: cooling.ltr_fan_pwr_w,
            ltr_effectiveness: cooling.ltr_effectiveness,
            ltr_qdot_w: cooling.ltr_qdot_w,
            lcc_qdot_w: cooling.lcc_qdot_w,
            chiller_qdot_w: cooling.chiller_qdot_w,
            evap_load_w: cooling.evap_load_w,
            cab_heat_load_w: cab_load.total_w(),
            cab_cooling_w: cooling.cabin_cooling_w,
            motor_qdot_w: heat.motor_qdot_w,
            inv_qdot_w: heat.inv_qdot_w,
            batt_qdot_w: pt.batt_qdot_w,
            motor_to_coolant_w: pt.motor_to_coolant_w,
            inv_to_coolant_w: pt.inv_to_coolant_w,
            batt_to_coolant_w: pt.batt_to_coolant_w,
            inv_pwr_in_w: heat.inv_pwr_in_w,
            comp_pwr_mech_w: cooling.comp_pwr_mech_w,
            comp_pwr_elec_w: cooling.comp_pwr_elec_w,
            batt_pwr_draw_w: pt.batt_pwr_draw_w,
        };
        StepEvaluation {
            cooling,
            cab_cooling_level,
            rates,
            record,
        }
    }

    /// Solves time step `i`: evaluates state `i`, records it, and integrates
    /// to state `i + 1`
    pub fn solve_step(&mut self, i: usize) -> anyhow::Result<()> {
        let state = *self.data.current_state()?;
        ensure!(
            state.i == i,
            "{}\ncurrent state is at index {}, not {}",
            format_dbg!(),
            state.i,
            i
        );
        ensure!(
            i < self.data.n_steps,
            "{}\nstep {} is past the last step {}",
            format_dbg!(),
            i,
            self.data.n_steps
        );
        let eval = self.evaluate(&state);
        if eval.cooling.chiller_state != state.chiller_state {
            #[cfg(feature = "logging")]
            log::debug!(
                "{}",
                format_dbg!((state.time_s, eval.cooling.chiller_state))
            );
        }
        if eval.cooling.ltr_level != state.ltr_level {
            #[cfg(feature = "logging")]
            log::debug!("{}", format_dbg!((state.time_s, eval.cooling.ltr_level)));
        }
        self.data.record_step(eval.record)?;

        let time_s = self.data.time_s(i + 1);
        self.data.push_state(SimulationState {
            i: i + 1,
            time_s,
            temps: eval.rates.integrate(&state.temps, self.data.dt_s),
            speed_kmh: self.vehicle.speed_kmh(time_s),
            chiller_state: eval.cooling.chiller_state,
            ltr_level: eval.cooling.ltr_level,
            cab_cooling_level: eval.cab_cooling_level,
        })
    }

    /// Seeds the initial state, solves every step, then evaluates and records
    /// the final time point without integrating past it
    pub fn walk(&mut self) -> anyhow::Result<()> {
        self.data
            .seed_initial_state(&self.params, &self.tms.ltr, &self.cabin);
        #[cfg(feature = "logging")]
        log::info!(
            "simulating {} steps of {} s with COP {:.3} ({:?})",
            self.data.n_steps,
            self.data.dt_s,
            self.cop.cop,
            self.cop.source
        );
        for i in 0..self.data.n_steps {
            self.solve_step(i)?;
        }
        let last = *self.data.current_state()?;
        let eval = self.evaluate(&last);
        self.data.record_step(eval.record)?;
        #[cfg(feature = "logging")]
        log::info!(
            "finished at t = {} s: {}",
            last.time_s,
            format_dbg!(last.temps)
        );
        Ok(())
    }

    pub fn results(&self) -> anyhow::Result<SimulationResults> {
        self.data.package_results(self.cop)
    }
}

/// Resolves COP, builds an engine, walks it, and packages the results
pub fn run<S: CopSolver + ?Sized>(
    params: EvThermalParams,
    solver: &S,
) -> anyhow::Result<SimulationResults> {
    let mut engine = SimulationEngine::with_solver(params, solver)?;
    engine.walk()?;
    engine.results()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refrigeration::{CopSource, FixedCop};
    use crate::tms::ChillerState;

    fn mock_engine(duration_s: f64) -> SimulationEngine {
        let mut params = EvThermalParams::default();
        params.sim.duration_s = duration_s;
        SimulationEngine::with_solver(params, &FixedCop(3.0)).unwrap()
    }

    #[test]
    fn test_euler_update() {
        let rates = NodeRates {
            motor_deg_c_per_s: 0.5,
            coolant_deg_c_per_s: -0.25,
            ..Default::default()
        };
        let next = rates.integrate(
            &NodeTemps {
                motor_te_deg_c: 40.0,
                coolant_te_deg_c: 30.0,
                ..Default::default()
            },
            2.0,
        );
        assert_eq!(next.motor_te_deg_c, 41.0);
        assert_eq!(next.coolant_te_deg_c, 29.5);
        assert_eq!(next.batt_te_deg_c, 0.0);
    }

    #[test]
    fn test_walk_records_every_point() {
        let mut engine = mock_engine(20.0);
        engine.walk().unwrap();
        let res = engine.results().unwrap();
        assert_eq!(res.len(), 21);
        assert_eq!(res.cop, 3.0);
        assert_eq!(res.cop_source, CopSource::Solver);
        assert_eq!(res.series.time_s[20], 20.0);
    }

    #[test]
    fn test_first_step_follows_euler() {
        let mut engine = mock_engine(5.0);
        engine.walk().unwrap();
        let s0 = *engine.data.state_at(0).unwrap();
        let s1 = *engine.data.state_at(1).unwrap();
        let eval = engine.evaluate(&s0);
        assert_eq!(s1.temps, eval.rates.integrate(&s0.temps, 1.0));
        // default battery starts at 37 °C, above its 35 °C start threshold
        assert_eq!(eval.cooling.chiller_state, ChillerState::On);
        assert_eq!(s1.chiller_state, ChillerState::On);
    }

    #[test]
    fn test_zero_steps_records_seeded_point() {
        let mut engine = mock_engine(0.5);
        engine.walk().unwrap();
        let res = engine.results().unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res.series.time_s[0], 0.0);
        assert_eq!(res.series.motor_te_deg_c[0], 40.0);
    }

    #[test]
    fn test_that_out_of_order_steps_are_rejected() {
        let mut engine = mock_engine(5.0);
        engine
            .data
            .seed_initial_state(&engine.params, &engine.tms.ltr, &engine.cabin);
        assert!(engine.solve_step(1).is_err());
        engine.solve_step(0).unwrap();
        assert!(engine.solve_step(0).is_err());
    }

    #[test]
    fn test_walk_can_be_repeated() {
        let mut engine = mock_engine(10.0);
        engine.walk().unwrap();
        let first = engine.results().unwrap();
        engine.walk().unwrap();
        assert_eq!(engine.results().unwrap(), first);
    }

    #[test]
    fn test_that_extreme_time_grids_are_rejected() {
        let mut params = EvThermalParams::default();
        params.sim.dt_s = 1e-300;
        assert!(SimulationEngine::with_solver(params, &FixedCop(3.0)).is_err());

        let mut params = EvThermalParams::default();
        params.sim.duration_s = f64::INFINITY;
        assert!(SimulationEngine::with_solver(params, &FixedCop(3.0)).is_err());
    }

    #[test]
    fn test_invalid_params_are_rejected_before_stepping() {
        let mut params = EvThermalParams::default();
        params.ltr.fan_pwr_at_levels_w = vec![0.0];
        assert!(SimulationEngine::new(params, CopResolution::default()).is_err());
    }
}
