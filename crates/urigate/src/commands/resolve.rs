//! `urigate resolve`: walk the resolver chain and print each step.

use serde::Serialize;
use tabled::Tabled;
use urigate_core::{ResolutionStep, ResolveUriError, ResolveUriOptions, Uri, UriResolution};

use crate::cli::{GlobalOpts, OutputFormat, ResolveArgs};
use crate::error::CliError;
use crate::output;

use super::{build_client, parse_uri};

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Resolver")]
    resolver: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Api")]
    api: &'static str,
}

/// A step paired with its position, so JSON and table agree on numbering.
#[derive(Serialize)]
struct Numbered<'a> {
    index: usize,
    #[serde(flatten)]
    step: &'a ResolutionStep,
}

#[derive(Serialize)]
struct ResolveReport<'a> {
    uri: &'a Uri,
    resolved: bool,
    error: Option<ResolveUriError>,
    history: Vec<Numbered<'a>>,
}

fn step_row(step: &Numbered<'_>) -> StepRow {
    let moved = step.step.source_uri != step.step.result.uri;
    StepRow {
        index: step.index,
        source: step.step.source_uri.to_string(),
        resolver: step.step.resolver.clone(),
        result: if moved {
            step.step.result.uri.to_string()
        } else {
            "-".into()
        },
        api: if step.step.result.api.is_some() { "yes" } else { "" },
    }
}

pub async fn handle(args: &ResolveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let uri = parse_uri(&args.uri)?;
    let client = build_client(global)?;

    let options = ResolveUriOptions {
        no_cache_read: args.no_cache_read,
        no_cache_write: args.no_cache_write,
        ..ResolveUriOptions::default()
    };
    let resolution = client.resolve_uri(&uri, options).await?;

    let steps: Vec<Numbered<'_>> = resolution
        .history
        .steps()
        .iter()
        .enumerate()
        .map(|(i, step)| Numbered { index: i + 1, step })
        .collect();

    let rendered = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let report = ResolveReport {
                uri: &resolution.uri,
                resolved: resolution.is_resolved(),
                error: resolution.error,
                history: steps,
            };
            output::render_single(&global.output, &report, |_| String::new())?
        }
        OutputFormat::Table | OutputFormat::Plain => {
            output::render_list(&global.output, &steps, step_row, |s| {
                format!("{} {} {}", s.step.source_uri, s.step.resolver, s.step.result.uri)
            })?
        }
    };
    output::print_output(&rendered, global.quiet);

    outcome(&uri, &resolution)
}

fn outcome(requested: &Uri, resolution: &UriResolution) -> Result<(), CliError> {
    match resolution.error {
        None => Ok(()),
        Some(ResolveUriError::NotFound) => Err(CliError::NotFound {
            uri: requested.to_string(),
            history: resolution.history.to_string(),
        }),
        Some(ResolveUriError::InfiniteLoop) => Err(CliError::InfiniteLoop {
            uri: resolution.uri.to_string(),
            history: resolution.history.to_string(),
        }),
    }
}
