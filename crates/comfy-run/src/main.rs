//! comfy-run: bind, execute and save a ComfyUI workflow

mod args;
mod output;

use std::path::Path;
use std::sync::Arc;

use engine_client::{primary_output, ComfyClient, EngineConfig, SharedEngineClient};
use execution_gateway::{ExecutionGateway, GatewayError, LocalOutputDir};
use graph_binder::{BindError, FilePayload, GraphBinder, InputDescriptor};
use workflow_graph::{load_view_comfy_template, TemplateError};

use crate::args::{CliInput, Opts};
use crate::output::{unpack_frames, write_framed, OutputError};

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("Failed to load template: {0}")]
    Template(#[from] TemplateError),

    #[error("Failed to read input file '{path}': {source}")]
    InputFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let opts = Opts::parse_ordered();
    if let Err(e) = run(opts).await {
        log::error!("{}", e);
        if let RunError::Gateway(gateway_error) = &e {
            for detail in gateway_error
                .workflow_error()
                .map(|error| error.errors.as_slice())
                .unwrap_or_default()
            {
                log::error!("  {}", detail);
            }
        }
        std::process::exit(1);
    }
}

async fn run(opts: Opts) -> Result<(), RunError> {
    let config = EngineConfig::from_env();
    log::info!("Using engine at {}", config.base_url());

    let template = load_view_comfy_template(&opts.template).await?;
    let inputs = collect_inputs(&opts).await?;

    let client: SharedEngineClient = Arc::new(ComfyClient::new(&config));
    let binder = GraphBinder::new(client.clone());
    let bound = match binder.bind(&template, &inputs).await {
        Ok(bound) => bound,
        Err(e) => {
            client.close().await;
            return Err(e.into());
        }
    };
    for upload in &bound.uploads {
        log::info!(
            "Input {}: {} -> {}",
            upload.key_path,
            upload.original_name,
            upload.engine_assigned_name
        );
    }

    let gateway = ExecutionGateway::new(client)
        .with_local_outputs(config.output_dir.clone().map(LocalOutputDir::new));
    let execution = gateway.execute(&bound.graph).await?;

    for artifact in &execution.artifacts {
        log::info!("Artifact {} ({})", artifact.view_path(), artifact.kind.as_str());
    }
    if let Some(primary) = primary_output(&execution.artifacts) {
        log::info!("Primary output: {}", primary.filename);
    }

    match (&opts.out, &opts.out_dir) {
        (Some(path), _) => {
            let written = write_framed(execution.stream, path).await?;
            log::info!("Wrote {} bytes to {}", written, path.display());
        }
        (None, Some(dir)) => {
            let saved = unpack_frames(execution.stream, dir).await?;
            log::info!("Saved {} artifact(s) to {}", saved.len(), dir.display());
        }
        (None, None) => {
            write_framed(execution.stream, Path::new("-")).await?;
        }
    }
    Ok(())
}

/// Inputs in command-line order, with file contents read from disk
async fn collect_inputs(opts: &Opts) -> Result<Vec<InputDescriptor>, RunError> {
    let mut inputs = Vec::with_capacity(opts.inputs.len());
    for input in &opts.inputs {
        match input {
            CliInput::Scalar { key_path, value } => {
                inputs.push(InputDescriptor::scalar(key_path.clone(), value.clone()));
            }
            CliInput::File { key_path, path } => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| RunError::InputFile {
                        path: path.display().to_string(),
                        source,
                    })?;
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| key_path.clone());
                inputs.push(InputDescriptor::file(
                    key_path.clone(),
                    FilePayload::new(name, bytes),
                ));
            }
        }
    }
    Ok(inputs)
}
