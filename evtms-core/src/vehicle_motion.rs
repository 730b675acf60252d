//! Module containing the drive profile and the powertrain heat generation model.

use crate::air::get_rho;
use crate::imports::*;
use crate::params::{DriveProfile, EvThermalParams, VehicleParams};
use evtms_proc_macros::ApproxEq;

/// Conversion from km/h to m/s
pub const KMH_PER_MPS: f64 = 3.6;

/// How the inverter loss is computed from motor electrical input power
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InverterHeatModel {
    /// Motor input is the inverter's output, so the loss is
    /// `P * (1 - eff) / eff`
    #[default]
    MotorInputIsInverterOutput,
    /// Motor input is treated as the inverter's input: `P * (1 - eff)`
    MotorInputIsInverterInput,
}

impl InverterHeatModel {
    /// Inverter heat generation [W] for a given motor electrical input [W]
    pub fn inv_qdot_w(&self, motor_pwr_in_w: f64, inv_eff: f64) -> f64 {
        if motor_pwr_in_w <= 0.0 || inv_eff <= 0.0 {
            return 0.0;
        }
        match self {
            Self::MotorInputIsInverterOutput => motor_pwr_in_w * (1.0 - inv_eff) / inv_eff,
            Self::MotorInputIsInverterInput => motor_pwr_in_w * (1.0 - inv_eff),
        }
    }
}

/// Instantaneous powertrain power flow and heat generation
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default, ApproxEq)]
pub struct PowertrainHeat {
    /// tractive power at the wheel [W]
    pub wheel_pwr_w: f64,
    /// motor electrical input [W]
    pub motor_pwr_in_w: f64,
    /// inverter DC input, drawn from the battery [W]
    pub inv_pwr_in_w: f64,
    /// motor heat generation [W]
    pub motor_qdot_w: f64,
    /// inverter heat generation [W]
    pub inv_qdot_w: f64,
}

impl PowertrainHeat {
    pub fn from_wheel_pwr(
        wheel_pwr_w: f64,
        motor_eff: f64,
        inv_eff: f64,
        inverter_heat_model: InverterHeatModel,
    ) -> Self {
        let motor_pwr_in_w = if wheel_pwr_w > 0.0 && motor_eff > 0.0 {
            wheel_pwr_w / motor_eff
        } else {
            0.0
        };
        let motor_qdot_w = if motor_pwr_in_w > 0.0 {
            motor_pwr_in_w * (1.0 - motor_eff)
        } else {
            0.0
        };
        Self {
            wheel_pwr_w,
            motor_pwr_in_w,
            inv_pwr_in_w: div_or_zero(motor_pwr_in_w, inv_eff),
            motor_qdot_w,
            inv_qdot_w: inverter_heat_model.inv_qdot_w(motor_pwr_in_w, inv_eff),
        }
    }
}

/// Constant-ambient road load model driven by a ramp-then-cruise speed profile
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleMotionModel {
    pub drive: DriveProfile,
    pub veh: VehicleParams,
    pub amb_te_deg_c: f64,
}

impl VehicleMotionModel {
    pub fn new(params: &EvThermalParams) -> Self {
        Self {
            drive: params.drive.clone(),
            veh: params.vehicle.clone(),
            amb_te_deg_c: params.sim.amb_te_deg_c,
        }
    }

    /// Vehicle speed [km/h] at `time_s`
    pub fn speed_kmh(&self, time_s: f64) -> f64 {
        let DriveProfile {
            speed_start_kmh: start,
            speed_end_kmh: end,
            ramp_up_time_s: ramp,
        } = self.drive;
        let speed_kmh = if time_s <= 0.0 {
            start
        } else if time_s >= ramp {
            end
        } else {
            start + (end - start) * time_s / ramp
        };
        speed_kmh.clamp(start.min(end), start.max(end))
    }

    /// Rolling resistance force [N]
    pub fn rolling_force_n(&self) -> f64 {
        self.veh.rolling_resist_coef * self.veh.mass_kg * self.veh.accel_grav_mps2
    }

    /// Aerodynamic drag force [N] at `speed_mps`
    pub fn aero_force_n(&self, speed_mps: f64) -> f64 {
        0.5 * get_rho(self.amb_te_deg_c)
            * self.veh.drag_coef
            * self.veh.frontal_area_m2
            * speed_mps.powi(2)
    }

    /// Tractive power [W] required to hold `speed_kmh` on flat ground
    pub fn wheel_pwr_w(&self, speed_kmh: f64) -> f64 {
        let speed_mps = (speed_kmh / KMH_PER_MPS).max(0.0);
        (self.rolling_force_n() + self.aero_force_n(speed_mps)) * speed_mps
    }

    pub fn powertrain_heat(&self, speed_kmh: f64) -> PowertrainHeat {
        PowertrainHeat::from_wheel_pwr(
            self.wheel_pwr_w(speed_kmh),
            self.veh.motor_eff,
            self.veh.inv_eff,
            self.veh.inverter_heat_model,
        )
    }
}
