pub use crate::cabin::{CabinHeatLoad, CabinModel};
pub use crate::data_manager::{DataManager, SimulationState, StepRecord, StepRecordHistoryVec};
pub use crate::engine::{run, NodeRates, SimulationEngine};
pub use crate::params::*;
pub use crate::refrigeration::{
    resolve_cop, CarnotCop, CopResolution, CopSolver, CopSource, FixedCop, RefrigerationCycle,
    DEFAULT_FALLBACK_COP,
};
pub use crate::results::{ChillerTransition, ResultsSummary, SimulationResults};
pub use crate::tms::{
    ChillerState, ChillerThresholds, Compressor, CoolingLoopOutput, EvaporatorCapacityPolicy,
    LtrController, ThermalManagementSystem,
};
pub use crate::traits::{ApproxEq, SerdeAPI, SerdeFormat};
pub use crate::vehicle_motion::{InverterHeatModel, PowertrainHeat, VehicleMotionModel};
