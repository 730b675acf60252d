use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

extern crate evtms_core;
use evtms_core::prelude::*;

/// Coupled thermal simulation of an electric vehicle during a highway drive.
/// After running `cargo build --release`, run with
/// ```bash
/// ./target/release/evtms-cli --params-file params.yaml --out-file results.csv
/// ```
/// Write the default parameters as a starting point with
/// ```bash
/// ./target/release/evtms-cli --write-default-params params.yaml
/// ```
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct EvTmsApi {
    /// Parameters as json string, mutually exclusive with `--params-file`
    #[clap(long, value_parser)]
    params: Option<String>,
    /// Path to parameter file (yaml or json)
    #[clap(long, value_parser)]
    params_file: Option<String>,
    /// Fixed coefficient of performance, bypasses the Carnot-based solver
    #[clap(long, value_parser)]
    cop: Option<f64>,
    /// Second law efficiency applied to the Carnot COP
    #[clap(long, value_parser)]
    second_law_eff: Option<f64>,
    /// Path to results file (csv, yaml, or json)
    #[clap(long, value_parser)]
    out_file: Option<String>,
    /// Print the run summary as json, implied when `--out-file` is absent
    #[clap(long, action)]
    summary: bool,
    /// Write default parameters to this path and exit
    #[clap(long, value_parser)]
    write_default_params: Option<String>,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_params(api: &EvTmsApi) -> anyhow::Result<EvThermalParams> {
    match (&api.params, &api.params_file) {
        (Some(_), Some(_)) => bail!("`--params` and `--params-file` cannot be used together"),
        (Some(params_json), None) => EvThermalParams::from_json(params_json),
        (None, Some(params_file)) => EvThermalParams::from_file(params_file)
            .with_context(|| format!("failed to load parameters from `{params_file}`")),
        (None, None) => Ok(EvThermalParams::default()),
    }
}

pub fn main() -> anyhow::Result<()> {
    let api = EvTmsApi::parse();
    init_logging();

    if let Some(path) = &api.write_default_params {
        EvThermalParams::default().to_file(path)?;
        log::info!("wrote default parameters to `{path}`");
        return Ok(());
    }

    let params = load_params(&api)?;
    let results = match api.cop {
        Some(cop) => run(params, &FixedCop(cop))?,
        None => {
            let mut solver = CarnotCop::default();
            if let Some(eff) = api.second_law_eff {
                solver.second_law_eff = eff;
            }
            run(params, &solver)?
        }
    };

    if let Some(out_file) = &api.out_file {
        results.to_file(out_file)?;
        log::info!("wrote {} time points to `{out_file}`", results.len());
    }
    if api.summary || api.out_file.is_none() {
        println!("{}", results.summary().to_json()?);
    }
    Ok(())
}
