//! Command-line arguments

use std::path::PathBuf;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde_json::Value;

/// A `--set` or `--file` input, kept in command-line position
#[derive(Debug, Clone, PartialEq)]
pub enum CliInput {
    Scalar { key_path: String, value: Value },
    File { key_path: String, path: PathBuf },
}

/// Bind inputs into a ComfyUI workflow template, run it and save the results.
///
/// The engine address comes from COMFYUI_API_URL (default 127.0.0.1:8188);
/// COMFYUI_SECURE=true selects https and COMFY_OUTPUT_DIR lets local outputs
/// be read from disk.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Opts {
    /// A view_comfy.json document or an API-format workflow graph
    #[arg(long, short)]
    pub template: PathBuf,

    /// Scalar input as KEY_PATH=VALUE; VALUE is parsed as JSON, else taken as a string
    #[arg(long = "set", value_name = "KEY_PATH=VALUE", value_parser = parse_scalar)]
    pub scalars: Vec<(String, Value)>,

    /// File input as KEY_PATH=FILE, uploaded to the engine
    #[arg(long = "file", value_name = "KEY_PATH=FILE", value_parser = parse_file)]
    pub files: Vec<(String, PathBuf)>,

    /// Write the framed artifact stream to this file ("-" for stdout)
    #[arg(long, short, conflicts_with = "out_dir")]
    pub out: Option<PathBuf>,

    /// Unpack every artifact into this directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// `--set` and `--file` inputs interleaved as given; later ones win
    #[arg(skip)]
    pub inputs: Vec<CliInput>,
}

impl Opts {
    /// Parse the process arguments, exiting with usage on error
    pub fn parse_ordered() -> Self {
        Self::from_matches(&Self::command().get_matches()).unwrap_or_else(|e| e.exit())
    }

    pub fn try_parse_ordered_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::from_matches(&Self::command().try_get_matches_from(args)?)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let mut opts = Self::from_arg_matches(matches)?;
        let positions = |id: &str| -> Vec<usize> {
            matches
                .indices_of(id)
                .map(|indices| indices.collect())
                .unwrap_or_default()
        };

        let scalars = positions("scalars")
            .into_iter()
            .zip(opts.scalars.iter().cloned())
            .map(|(at, (key_path, value))| (at, CliInput::Scalar { key_path, value }));
        let files = positions("files")
            .into_iter()
            .zip(opts.files.iter().cloned())
            .map(|(at, (key_path, path))| (at, CliInput::File { key_path, path }));

        let mut inputs: Vec<(usize, CliInput)> = scalars.chain(files).collect();
        inputs.sort_by_key(|(at, _)| *at);
        opts.inputs = inputs.into_iter().map(|(_, input)| input).collect();
        Ok(opts)
    }
}

fn split_assignment(raw: &str) -> Result<(&str, &str), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(format!("expected KEY_PATH=VALUE, got '{}'", raw)),
    }
}

fn parse_scalar(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = split_assignment(raw)?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn parse_file(raw: &str) -> Result<(String, PathBuf), String> {
    let (key, path) = split_assignment(raw)?;
    if path.is_empty() {
        return Err(format!("missing file path in '{}'", raw));
    }
    Ok((key.to_string(), PathBuf::from(path)))
}
