use super::CliError;
use super::helpers::{assemble_parameters, write_output};
use anyhow::Context;
use aviv_core::denaturant::{EndpointCheck, denaturant_concentration};
use aviv_core::domain::ExperimentType;
use aviv_core::pipeline::{ProcessOptions, preview, process_file};
use aviv_core::render::{DEFAULT_COLUMN_WIDTH, with_unix_newlines};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, clap::Args)]
pub(super) struct IdentifyArgs {
    /// Instrument output file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, clap::Args)]
pub(super) struct ProcessArgs {
    /// Instrument output file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// JSON object of processing parameters
    #[arg(long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Set a single parameter; repeatable and applied after --params
    #[arg(long = "set", value_name = "KEY=VALUE")]
    sets: Vec<String>,

    /// Write the result here instead of stdout
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Character width of each table column
    #[arg(long, default_value_t = DEFAULT_COLUMN_WIDTH)]
    column_width: usize,

    /// Extra header line; repeatable
    #[arg(long = "annotate", value_name = "TEXT")]
    annotations: Vec<String>,

    /// Titrant denaturant for the refractive-index endpoint check
    #[arg(long, value_name = "NAME", requires_all = ["buffer_n", "final_n"])]
    denaturant: Option<String>,

    /// Refractive index of the buffer
    #[arg(long, value_name = "N", requires = "denaturant")]
    buffer_n: Option<f64>,

    /// Refractive index of the final titration point
    #[arg(long, value_name = "N", requires = "denaturant")]
    final_n: Option<f64>,
}

#[derive(Debug, clap::Args)]
pub(super) struct DenaturantArgs {
    /// gdn, gdnhcl, gdm, gdmhcl, g, urea or u
    #[arg(value_name = "NAME")]
    name: String,

    /// Refractive index of the buffer
    #[arg(value_name = "BACKGROUND_N")]
    background_n: f64,

    /// Refractive index of the sample
    #[arg(value_name = "SAMPLE_N")]
    sample_n: f64,
}

pub(super) fn run_identify_command(args: IdentifyArgs) -> Result<i32, CliError> {
    let previewed = preview(&args.input).map_err(CliError::Process)?;

    if args.json {
        let mut config = Map::new();
        for field in previewed.config.fields() {
            let value = serde_json::to_value(field.value())
                .with_context(|| format!("failed to encode config field '{}'", field.name))?;
            config.insert(field.name.to_string(), value);
        }
        let channels: Vec<Value> = previewed
            .channels
            .iter()
            .map(|channel| json!({ "name": channel.name(), "points": channel.len() }))
            .collect();
        let report = json!({
            "file": args.input.display().to_string(),
            "instrument": previewed.descriptor.instrument,
            "experiment": previewed.descriptor.experiment,
            "config": config,
            "channels": channels,
        });
        let rendered = serde_json::to_string_pretty(&report).context("failed to render identify report")?;
        println!("{rendered}");
        return Ok(0);
    }

    println!("Instrument: {}", previewed.descriptor.instrument);
    println!("Experiment: {}", previewed.descriptor.experiment);
    for field in previewed.config.fields() {
        println!("{field}");
    }
    for channel in &previewed.channels {
        println!("Channel: {} ({} points)", channel.name(), channel.len());
    }
    Ok(0)
}

pub(super) fn run_process_command(args: ProcessArgs) -> Result<i32, CliError> {
    let params = assemble_parameters(args.params.as_deref(), &args.sets)?;
    let options = ProcessOptions {
        column_width: args.column_width,
        annotations: args.annotations,
    };

    let mut processed = process_file(&args.input, &params, &options).map_err(CliError::Process)?;

    if let (Some(name), Some(buffer_n), Some(final_n)) = (args.denaturant.as_deref(), args.buffer_n, args.final_n) {
        if processed.descriptor().experiment_type() != Some(ExperimentType::Titration) {
            return Err(CliError::Usage(
                "--denaturant only applies to titration experiments".to_string(),
            ));
        }
        let check = EndpointCheck::new(name, buffer_n, final_n, processed.channels()).map_err(CliError::Process)?;
        if !check.within_tolerance() {
            warn!(
                calculated = check.calculated,
                observed = check.observed,
                "refractive-index endpoint disagrees with the titration"
            );
        }
        for line in check.annotation_lines() {
            processed.annotate(line);
        }
    }

    let rendered = processed.output();
    match &args.output {
        Some(path) => {
            write_output(path, &rendered)?;
            info!(output = %path.display(), "wrote processed experiment");
        }
        None => print!("{}", with_unix_newlines(&rendered)),
    }
    Ok(0)
}

pub(super) fn run_denaturant_command(args: DenaturantArgs) -> Result<i32, CliError> {
    let concentration = denaturant_concentration(&args.name, args.background_n, args.sample_n)
        .map_err(CliError::Process)?;
    println!("{:.4} M {}", concentration, args.name);
    Ok(0)
}
