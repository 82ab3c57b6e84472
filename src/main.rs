use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use pentrace::{
    config::{ConfigStore, FileConfigStore},
    logging::init_logging,
    stroke::parse_records,
    Analyzer, InputError, StrokeSource,
};
use serde_json::{json, Value};

/// handwriting stroke analysis with kinematic features and model screening
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Extracts kinematic and pressure features from a pen stroke table, then scores them with the first loadable model artifact found in the search roots."
)]
pub struct Cli {
    /// stroke table to analyze (CSV unless --records is given)
    input: PathBuf,

    /// read the input as a JSON list of stroke records
    #[clap(long)]
    records: bool,

    /// output format of the result document
    #[clap(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// include the debug payload in the ml result
    #[clap(short = 'd', long)]
    debug: bool,

    /// config file to use instead of the platform default
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// artifact search directory, may be repeated (default: working directory and its ancestors)
    #[clap(short = 'r', long = "root")]
    roots: Vec<PathBuf>,

    /// print the diagnostics as JSON on stderr
    #[clap(long)]
    diagnostics: bool,

    /// raise log verbosity (-v info, -vv debug)
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Copy, Clone, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Pretty,
}

impl OutputFormat {
    fn render(&self, value: &Value) -> String {
        let rendered = match self {
            OutputFormat::Json => serde_json::to_string(value),
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
        };
        rendered.unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string())
    }
}

impl Cli {
    fn source(&self) -> Result<StrokeSource, InputError> {
        if !self.records {
            return Ok(StrokeSource::Csv(self.input.clone()));
        }
        let text = fs::read_to_string(&self.input).map_err(|source| InputError::Io {
            path: self.input.clone(),
            source,
        })?;
        Ok(StrokeSource::Records(parse_records(&text)?))
    }

    fn analyzer(&self) -> Analyzer {
        let store = match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        };
        let mut config = store.load();
        if !self.roots.is_empty() {
            config.search_roots = self.roots.clone();
        }
        Analyzer::from_config(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!(input = %cli.input.display(), format = %cli.format, "starting analysis");

    let analysis = cli
        .source()
        .and_then(|source| cli.analyzer().analyze(source, cli.debug));
    match analysis {
        Ok(analysis) => {
            if cli.diagnostics {
                let diagnostics = serde_json::to_value(&analysis.diagnostics)
                    .unwrap_or_else(|e| json!({ "error": e.to_string() }));
                eprintln!("{}", OutputFormat::Json.render(&diagnostics));
            }
            let result = serde_json::to_value(&analysis.result)
                .unwrap_or_else(|e| json!({ "error": e.to_string() }));
            println!("{}", cli.format.render(&result));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("analysis failed: {e}");
            println!("{}", cli.format.render(&json!({ "error": e.to_string() })));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn roots_are_repeatable() {
        let cli = Cli::parse_from(["pentrace", "-r", "/a", "--root", "/b", "-vv", "in.csv"]);
        assert_eq!(cli.roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn format_names_are_lowercase() {
        assert_eq!(OutputFormat::Pretty.to_string(), "pretty");
        let cli = Cli::parse_from(["pentrace", "--format", "pretty", "in.csv"]);
        assert!(matches!(cli.format, OutputFormat::Pretty));
    }
}
