use super::CliError;
use anyhow::Context;
use aviv_core::domain::{AvivError, ParamValue, ParameterBundle, ParameterBundleError};
use aviv_core::render::write_rendered;
use std::io;
use std::path::Path;
use tracing_subscriber::EnvFilter;

pub(super) const DEFAULT_LOG_FILTER: &str = "aviv=info";
pub(super) const VERBOSE_LOG_FILTER: &str = "aviv=debug";

/// `RUST_LOG` wins over `--verbose`. Output goes to stderr so stdout stays
/// clean for the processed table.
pub(super) fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Loads `--params` (if any) and layers each `--set KEY=VALUE` over it in
/// order.
pub(super) fn assemble_parameters(file: Option<&Path>, sets: &[String]) -> Result<ParameterBundle, CliError> {
    let mut bundle = match file {
        Some(path) => ParameterBundle::from_json_file(path).map_err(bundle_error)?,
        None => ParameterBundle::new(),
    };
    for assignment in sets {
        let (name, value) = parse_assignment(assignment)?;
        bundle.insert(name, value);
    }
    Ok(bundle)
}

pub(super) fn parse_assignment(assignment: &str) -> Result<(String, ParamValue), CliError> {
    let (name, literal) = assignment
        .split_once('=')
        .ok_or_else(|| CliError::Usage(format!("expected KEY=VALUE, got '{}'", assignment)))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::Usage(format!("missing parameter name in '{}'", assignment)));
    }
    Ok((name.to_string(), ParamValue::from_literal(literal)))
}

pub(super) fn write_output(path: &Path, content: &str) -> Result<(), CliError> {
    write_rendered(path, content)
        .with_context(|| format!("failed to write output '{}'", path.display()))?;
    Ok(())
}

fn bundle_error(error: ParameterBundleError) -> CliError {
    let aviv_error = match &error {
        ParameterBundleError::Read { .. } => AvivError::io_system("IO.PARAMS_READ", error.to_string()),
        ParameterBundleError::Parse { .. } => AvivError::configuration("CONFIG.PARAMS_PARSE", error.to_string()),
    };
    CliError::Process(aviv_error)
}
