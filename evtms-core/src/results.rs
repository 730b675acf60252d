//! Module containing packaged simulation output and its post-processing.

use crate::data_manager::{StepRecord, StepRecordHistoryVec};
use crate::imports::*;
use crate::params::NodeTemps;
use crate::refrigeration::{CopResolution, CopSource};
use crate::tms::ChillerState;
use crate::utils::trapz;
use itertools::Itertools;

/// Equal-length time series of a completed run
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SimulationResults {
    /// coefficient of performance used for the whole run
    pub cop: f64,
    pub cop_source: CopSource,
    /// cabin comfort target [°C]
    pub cab_te_target_deg_c: f64,
    pub series: StepRecordHistoryVec,
}

impl SerdeAPI for SimulationResults {
    const ACCEPTED_BYTE_FORMATS: &'static [&'static str] = &["yaml", "json", "csv"];
    const ACCEPTED_STR_FORMATS: &'static [&'static str] = &["yaml", "json", "csv"];

    fn to_writer<W: std::io::Write>(&self, wtr: W, format: &str) -> anyhow::Result<()> {
        match SerdeFormat::parse(format, Self::ACCEPTED_BYTE_FORMATS)? {
            SerdeFormat::Yaml => serde_yaml::to_writer(wtr, self)?,
            SerdeFormat::Json => serde_json::to_writer(wtr, self)?,
            SerdeFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(wtr);
                for row in (0..self.len()).filter_map(|i| self.series.get(i)) {
                    wtr.serialize(row)?;
                }
                wtr.flush()?
            }
        }
        Ok(())
    }

    fn to_str(&self, format: &str) -> anyhow::Result<String> {
        match SerdeFormat::parse(format, Self::ACCEPTED_STR_FORMATS)? {
            SerdeFormat::Yaml => self.to_yaml(),
            SerdeFormat::Json => self.to_json(),
            SerdeFormat::Csv => self.to_csv(),
        }
    }
}

impl SimulationResults {
    pub fn from_history(
        history: &StepRecordHistoryVec,
        cop: CopResolution,
        cab_te_target_deg_c: f64,
    ) -> Self {
        Self {
            cop: cop.cop,
            cop_source: cop.source,
            cab_te_target_deg_c,
            series: history.clone(),
        }
    }

    /// Number of time points
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Record at time index `i`
    pub fn row(&self, i: usize) -> Option<StepRecord> {
        self.series.get(i)
    }

    pub fn to_csv(&self) -> anyhow::Result<String> {
        let mut buf = Vec::with_capacity(self.len());
        self.to_writer(&mut buf, "csv")?;
        Ok(String::from_utf8(buf)?)
    }

    pub fn time_s(&self) -> ArrayView1<f64> {
        ArrayView1::from(&self.series.time_s)
    }

    pub fn comp_pwr_elec_w(&self) -> ArrayView1<f64> {
        ArrayView1::from(&self.series.comp_pwr_elec_w)
    }

    pub fn batt_pwr_draw_w(&self) -> ArrayView1<f64> {
        ArrayView1::from(&self.series.batt_pwr_draw_w)
    }

    /// Node temperatures at time index `i`
    pub fn temps_at(&self, i: usize) -> Option<NodeTemps> {
        let s = &self.series;
        Some(NodeTemps {
            motor_te_deg_c: *s.motor_te_deg_c.get(i)?,
            inv_te_deg_c: *s.inv_te_deg_c.get(i)?,
            batt_te_deg_c: *s.batt_te_deg_c.get(i)?,
            cab_te_deg_c: *s.cab_te_deg_c.get(i)?,
            coolant_te_deg_c: *s.coolant_te_deg_c.get(i)?,
        })
    }

    /// Elementwise maximum node temperatures over the run
    pub fn max_temps(&self) -> NodeTemps {
        let max = |xs: &[f64]| xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let s = &self.series;
        NodeTemps {
            motor_te_deg_c: max(&s.motor_te_deg_c),
            inv_te_deg_c: max(&s.inv_te_deg_c),
            batt_te_deg_c: max(&s.batt_te_deg_c),
            cab_te_deg_c: max(&s.cab_te_deg_c),
            coolant_te_deg_c: max(&s.coolant_te_deg_c),
        }
    }

    /// Every change of chiller state between consecutive time points
    pub fn chiller_transitions(&self) -> Vec<ChillerTransition> {
        self.series
            .time_s
            .iter()
            .zip(self.series.chiller_on.iter())
            .tuple_windows()
            .filter(|((_, prev), (_, cur))| prev != cur)
            .map(|(_, (&time_s, &on))| ChillerTransition {
                time_s,
                to: if on { ChillerState::On } else { ChillerState::Off },
            })
            .collect()
    }

    /// Time-weighted fraction of the run for which `flags` holds, where each
    /// flag applies from its time point to the next.  A single-point run
    /// reports the value of its only flag.
    fn frac_of_time(&self, flags: &[bool]) -> f64 {
        let time = &self.series.time_s;
        let duration = match (time.first(), time.last()) {
            (Some(first), Some(last)) if last > first => last - first,
            _ => return flags.first().map_or(0.0, |&f| f as u8 as f64),
        };
        time.iter()
            .tuple_windows()
            .zip(flags.iter())
            .filter(|(_, flag)| **flag)
            .map(|((t0, t1), _)| t1 - t0)
            .sum::<f64>()
            / duration
    }

    pub fn summary(&self) -> ResultsSummary {
        let time = self.time_s();
        let duration_s = match (self.series.time_s.first(), self.series.time_s.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };
        let comp_energy_j = trapz(time, self.comp_pwr_elec_w());
        let transitions = self.chiller_transitions();
        let chiller_activations = transitions
            .iter()
            .filter(|tr| tr.to == ChillerState::On)
            .count()
            + self.series.chiller_on.first().map_or(0, |&on| on as usize);
        let above_target = self
            .series
            .cab_te_deg_c
            .iter()
            .map(|&te| te > self.cab_te_target_deg_c)
            .collect::<Vec<_>>();

        ResultsSummary {
            n_points: self.len(),
            duration_s,
            cop: self.cop,
            cop_source: self.cop_source,
            final_temps: self
                .temps_at(self.len().saturating_sub(1))
                .unwrap_or_default(),
            max_temps: self.max_temps(),
            chiller_on_frac: self.frac_of_time(&self.series.chiller_on),
            chiller_activations,
            chiller_transitions: transitions,
            comp_pwr_elec_mean_w: if duration_s > 0.0 {
                comp_energy_j / duration_s
            } else {
                self.series
                    .comp_pwr_elec_w
                    .first()
                    .copied()
                    .unwrap_or_default()
            },
            comp_energy_wh: comp_energy_j / 3600.0,
            batt_energy_wh: trapz(time, self.batt_pwr_draw_w()) / 3600.0,
            ltr_level_max: self.series.ltr_level.iter().copied().max().unwrap_or(0),
            cab_above_target_frac: self.frac_of_time(&above_target),
        }
    }
}

/// Chiller switching event
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ChillerTransition {
    /// time [s] of the first point in the new state
    pub time_s: f64,
    pub to: ChillerState,
}

/// Scalar metrics of a completed run
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResultsSummary {
    pub n_points: usize,
    pub duration_s: f64,
    pub cop: f64,
    pub cop_source: CopSource,
    pub final_temps: NodeTemps,
    pub max_temps: NodeTemps,
    /// time-weighted fraction of the run with the chiller on
    pub chiller_on_frac: f64,
    /// number of separate on periods
    pub chiller_activations: usize,
    pub chiller_transitions: Vec<ChillerTransition>,
    /// time-weighted mean compressor electrical power [W]
    pub comp_pwr_elec_mean_w: f64,
    /// compressor electrical energy [W*h]
    pub comp_energy_wh: f64,
    /// total battery energy drawn [W*h]
    pub batt_energy_wh: f64,
    pub ltr_level_max: usize,
    /// time-weighted fraction of the run with the cabin above its target
    pub cab_above_target_frac: f64,
}

impl SerdeAPI for ResultsSummary {}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_results() -> SimulationResults {
        let mut history = StepRecordHistoryVec::with_capacity(5);
        for (i, (on, comp)) in [
            (false, 0.0),
            (true, 1000.0),
            (true, 1000.0),
            (false, 0.0),
            (true, 2000.0),
        ]
        .into_iter()
        .enumerate()
        {
            history.push(StepRecord {
                time_s: i as f64 * 10.0,
                motor_te_deg_c: 40.0 + i as f64,
                cab_te_deg_c: if i < 2 { 30.0 } else { 24.0 },
                chiller_on: on,
                comp_pwr_elec_w: comp,
                batt_pwr_draw_w: 36_000.0,
                ltr_level: i % 3,
                ..Default::default()
            });
        }
        SimulationResults::from_history(
            &history,
            CopResolution {
                cop: 3.0,
                source: CopSource::Solver,
            },
            26.0,
        )
    }

    #[test]
    fn test_chiller_transitions() {
        let res = mock_results();
        let trs = res.chiller_transitions();
        assert_eq!(trs.len(), 3);
        assert_eq!(
            trs[0],
            ChillerTransition {
                time_s: 10.0,
                to: ChillerState::On
            }
        );
        assert_eq!(trs[1].time_s, 30.0);
        assert_eq!(trs[1].to, ChillerState::Off);
    }

    #[test]
    fn test_summary() {
        let res = mock_results();
        let summary = res.summary();
        assert_eq!(summary.n_points, 5);
        assert_eq!(summary.duration_s, 40.0);
        assert_eq!(summary.final_temps.motor_te_deg_c, 44.0);
        assert_eq!(summary.max_temps.motor_te_deg_c, 44.0);
        // on from 10 to 30 s out of 40 s; the last point has no interval
        assert_eq!(summary.chiller_on_frac, 0.5);
        assert_eq!(summary.chiller_activations, 2);
        // trapezoids: 5000 + 10000 + 5000 + 10000 J
        assert_eq!(summary.comp_pwr_elec_mean_w, 750.0);
        assert!(almost_eq(summary.comp_energy_wh, 30_000.0 / 3600.0, None));
        assert!(almost_eq(summary.batt_energy_wh, 400.0, None));
        assert_eq!(summary.ltr_level_max, 2);
        assert_eq!(summary.cab_above_target_frac, 0.5);
    }

    #[test]
    fn test_single_point_summary() {
        let mut history = StepRecordHistoryVec::new();
        history.push(StepRecord {
            chiller_on: true,
            comp_pwr_elec_w: 1500.0,
            ..Default::default()
        });
        let res = SimulationResults::from_history(&history, CopResolution::default(), 26.0);
        let summary = res.summary();
        assert_eq!(summary.duration_s, 0.0);
        assert_eq!(summary.chiller_on_frac, 1.0);
        assert_eq!(summary.chiller_activations, 1);
        assert_eq!(summary.comp_pwr_elec_mean_w, 1500.0);
        assert_eq!(summary.comp_energy_wh, 0.0);
    }

    #[test]
    fn test_csv_has_header_and_one_row_per_point() {
        let res = mock_results();
        let csv = res.to_csv().unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("time_s,motor_te_deg_c"));
        assert!(header.contains("chiller_on"));
        assert_eq!(lines.count(), 5);
    }

    #[test]
    fn test_results_to_file() {
        let res = mock_results();
        let dir = tempfile::tempdir().unwrap();
        for ext in ["csv", "json", "yaml"] {
            let path = dir.path().join(format!("results.{ext}"));
            res.to_file(&path).unwrap();
            assert!(path.metadata().unwrap().len() > 0);
        }
        let json = std::fs::read_to_string(dir.path().join("results.json")).unwrap();
        assert_eq!(SimulationResults::from_json(json).unwrap(), res);
        assert!(res.to_file(dir.path().join("results.bin")).is_err());
    }
}
