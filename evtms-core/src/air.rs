//! Module containing models for air properties.

/// specific gas constant of dry air [J/(kg*K)]
pub const R_AIR: f64 = 287.05;
/// standard atmospheric pressure [Pa]
pub const P_ATM: f64 = 101_325.0;
/// offset between °C and K
pub const KELVIN_OFFSET: f64 = 273.15;
/// temperature [°C] at which cabin air capacitance is evaluated
pub const CABIN_AIR_REF_TE_DEG_C: f64 = 28.0;

/// Returns density [kg/m**3] of dry air at standard pressure from the ideal gas law
/// Arguments:
/// ----------
/// te_air_deg_c: Float
///     temperature [°C] of air
pub fn get_rho(te_air_deg_c: f64) -> f64 {
    P_ATM / (R_AIR * (te_air_deg_c + KELVIN_OFFSET))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::almost_eq;

    #[test]
    fn test_rho_at_known_temperatures() {
        assert!(almost_eq(get_rho(0.0), 1.2923, Some(1e-4)));
        assert!(almost_eq(get_rho(35.0), 1.1455, Some(1e-4)));
    }

    #[test]
    fn test_rho_decreases_with_temperature() {
        assert!(get_rho(20.0) > get_rho(40.0));
    }
}
