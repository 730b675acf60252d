//! Module containing the simulation state, the per-step record, and the
//! pre-allocated history that stores them.

use crate::cabin::CabinModel;
use crate::imports::*;
use crate::params::{EvThermalParams, NodeTemps, MAX_STEPS};
use crate::refrigeration::CopResolution;
use crate::results::SimulationResults;
use crate::tms::{ChillerState, LtrController};
use evtms_proc_macros::HistoryVec;

/// State carried from one step into the next.  Actuator fields hold the
/// controller outputs of the previous step, which the controllers at this
/// step transition from.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct SimulationState {
    /// time step index
    pub i: usize,
    /// elapsed time [s]
    pub time_s: f64,
    pub temps: NodeTemps,
    pub speed_kmh: f64,
    pub chiller_state: ChillerState,
    pub ltr_level: usize,
    /// Carried for inspection only.  Cabin cooling has no hysteresis, so each
    /// step recomputes its level from the cabin temperature.
    pub cab_cooling_level: usize,
}

/// Everything known about one time point: start-of-step state plus every
/// quantity derived from it during that step
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default, HistoryVec)]
pub struct StepRecord {
    pub time_s: f64,
    pub motor_te_deg_c: f64,
    pub inv_te_deg_c: f64,
    pub batt_te_deg_c: f64,
    pub cab_te_deg_c: f64,
    pub coolant_te_deg_c: f64,
    pub speed_kmh: f64,
    pub chiller_on: bool,
    pub ltr_level: usize,
    pub cab_cooling_level: usize,
    pub ltr_fan_pwr_w: f64,
    pub ltr_effectiveness: f64,
    pub ltr_qdot_w: f64,
    pub lcc_qdot_w: f64,
    pub chiller_qdot_w: f64,
    pub evap_load_w: f64,
    pub cab_heat_load_w: f64,
    pub cab_cooling_w: f64,
    pub motor_qdot_w: f64,
    pub inv_qdot_w: f64,
    pub batt_qdot_w: f64,
    pub motor_to_coolant_w: f64,
    pub inv_to_coolant_w: f64,
    pub batt_to_coolant_w: f64,
    pub inv_pwr_in_w: f64,
    pub comp_pwr_mech_w: f64,
    pub comp_pwr_elec_w: f64,
    pub batt_pwr_draw_w: f64,
}

/// Owns the time grid, the evolving state, and the run history
#[derive(Clone, Debug, PartialEq)]
pub struct DataManager {
    pub dt_s: f64,
    pub n_steps: usize,
    /// cabin comfort target [°C], carried into results
    pub cab_te_target_deg_c: f64,
    states: Vec<SimulationState>,
    pub history: StepRecordHistoryVec,
}

impl DataManager {
    /// Allocates state and history buffers for `n_steps + 1` time points
    pub fn new(params: &EvThermalParams) -> anyhow::Result<Self> {
        let n_steps = params.n_steps();
        ensure!(
            n_steps <= MAX_STEPS,
            "{}\n{} steps exceeds the {} step limit",
            format_dbg!(),
            n_steps,
            MAX_STEPS
        );
        Ok(Self {
            dt_s: params.sim.dt_s,
            n_steps,
            cab_te_target_deg_c: params.cabin.te_target_deg_c,
            states: Vec::with_capacity(n_steps + 1),
            history: StepRecordHistoryVec::with_capacity(n_steps + 1),
        })
    }

    /// Number of time points, `n_steps + 1`
    pub fn n_points(&self) -> usize {
        self.n_steps.saturating_add(1)
    }

    /// Time [s] at index `i`
    pub fn time_s(&self, i: usize) -> f64 {
        i as f64 * self.dt_s
    }

    /// Clears any previous run and seeds the state at t = 0.  The chiller
    /// starts off; the fan starts at the level implied by the initial coolant
    /// temperature with no hysteresis applied.
    pub fn seed_initial_state(
        &mut self,
        params: &EvThermalParams,
        ltr: &LtrController,
        cabin: &CabinModel,
    ) -> &SimulationState {
        self.states.clear();
        self.history.clear();
        let temps = params.init_node_temps();
        self.states.push(SimulationState {
            i: 0,
            time_s: 0.0,
            temps,
            speed_kmh: params.drive.speed_start_kmh,
            chiller_state: ChillerState::Off,
            ltr_level: ltr.ideal_level(temps.coolant_te_deg_c),
            cab_cooling_level: cabin.cooling_level(temps.cab_te_deg_c),
        });
        &self.states[0]
    }

    pub fn state_at(&self, i: usize) -> Option<&SimulationState> {
        self.states.get(i)
    }

    pub fn current_state(&self) -> anyhow::Result<&SimulationState> {
        self.states
            .last()
            .with_context(|| format!("{}\nstate has not been seeded", format_dbg!()))
    }

    /// Appends the state for the next time index
    pub fn push_state(&mut self, state: SimulationState) -> anyhow::Result<()> {
        let cur_i = self.current_state()?.i;
        ensure!(
            state.i == cur_i + 1,
            "{}\nexpected state index {}, got {}",
            format_dbg!(),
            cur_i + 1,
            state.i
        );
        ensure!(
            state.i <= self.n_steps,
            "{}\nstate index {} is past the last time point {}",
            format_dbg!(),
            state.i,
            self.n_steps
        );
        self.states.push(state);
        Ok(())
    }

    /// Appends the record for the next time index
    pub fn record_step(&mut self, record: StepRecord) -> anyhow::Result<()> {
        ensure!(
            self.history.len() < self.n_points(),
            "{}\nhistory already holds all {} time points",
            format_dbg!(),
            self.n_points()
        );
        self.history.push(record);
        Ok(())
    }

    /// True once every time point has been recorded
    pub fn is_complete(&self) -> bool {
        self.history.len() == self.n_points()
    }

    pub fn package_results(&self, cop: CopResolution) -> anyhow::Result<SimulationResults> {
        ensure!(
            self.is_complete(),
            "{}\nonly {} of {} time points recorded",
            format_dbg!(),
            self.history.len(),
            self.n_points()
        );
        Ok(SimulationResults::from_history(
            &self.history,
            cop,
            self.cab_te_target_deg_c,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_params() -> EvThermalParams {
        let mut params = EvThermalParams::default();
        params.sim.duration_s = 10.0;
        params.sim.dt_s = 2.0;
        params
    }

    fn seeded() -> DataManager {
        let params = mock_params();
        let mut dm = DataManager::new(&params).unwrap();
        dm.seed_initial_state(
            &params,
            &LtrController::new(params.ltr.clone()),
            &CabinModel::new(&params),
        );
        dm
    }

    #[test]
    fn test_time_grid() {
        let dm = seeded();
        assert_eq!(dm.n_steps, 5);
        assert_eq!(dm.n_points(), 6);
        assert_eq!(dm.time_s(3), 6.0);
        assert!(dm.history.capacity() >= 6);
    }

    #[test]
    fn test_seeded_state() {
        let mut params = mock_params();
        params.init_temps.coolant_offset_deg_c = 20.0;
        let mut dm = DataManager::new(&params).unwrap();
        let state = *dm.seed_initial_state(
            &params,
            &LtrController::new(params.ltr.clone()),
            &CabinModel::new(&params),
        );
        assert_eq!(state.i, 0);
        assert_eq!(state.speed_kmh, 60.0);
        assert_eq!(state.chiller_state, ChillerState::Off);
        // 55 °C coolant is past the 40 and 50 °C thresholds
        assert_eq!(state.ltr_level, 2);
        assert_eq!(state.cab_cooling_level, 1);
        assert_eq!(dm.current_state().unwrap(), &state);
    }

    #[test]
    fn test_that_states_must_be_contiguous() {
        let mut dm = seeded();
        let mut next = *dm.current_state().unwrap();
        next.i = 2;
        assert!(dm.push_state(next).is_err());
        next.i = 1;
        dm.push_state(next).unwrap();
        assert_eq!(dm.state_at(1).unwrap().i, 1);
        assert!(dm.state_at(2).is_none());
    }

    #[test]
    fn test_that_history_does_not_grow_past_the_grid() {
        let mut dm = seeded();
        let cap = dm.history.capacity();
        for i in 0..dm.n_points() {
            dm.record_step(StepRecord {
                time_s: dm.time_s(i),
                ..Default::default()
            })
            .unwrap();
        }
        assert!(dm.is_complete());
        assert_eq!(dm.history.capacity(), cap);
        assert!(dm.record_step(StepRecord::default()).is_err());
        assert_eq!(dm.history.get(5).unwrap().time_s, 10.0);
    }

    #[test]
    fn test_that_oversized_grid_is_not_allocated() {
        let mut params = mock_params();
        params.sim.dt_s = 1e-300;
        assert!(DataManager::new(&params).is_err());
        params.sim.duration_s = f64::INFINITY;
        params.sim.dt_s = 1.0;
        assert!(DataManager::new(&params).is_err());
    }

    #[test]
    fn test_that_incomplete_history_is_not_packaged() {
        let mut dm = seeded();
        dm.record_step(StepRecord::default()).unwrap();
        assert!(dm.package_results(CopResolution::default()).is_err());
    }
}
