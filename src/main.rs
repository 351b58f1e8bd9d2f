mod dataflow;
mod descriptor;
mod engine;
mod formatstring;
mod input;
mod ir;
mod nullness;
mod rules;
mod telemetry;
#[cfg(test)]
mod test_harness;
mod types;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use opentelemetry::KeyValue;
use serde_json::json;
use serde_sarif::sarif::{
    Artifact, Invocation, PropertyBag, ReportingDescriptor, Result as SarifResult, Run, SCHEMA_URL,
    Sarif, Tool, ToolComponent,
};
use tracing::info;

use crate::engine::{Engine, build_context};
use crate::input::load_inputs;
use crate::telemetry::{Telemetry, current_trace_id, init_logging, with_span};

/// CLI arguments for dataflint execution.
#[derive(Parser, Debug)]
#[command(
    name = "dataflint",
    about = "Nullness and format-string checks over JVM analysis units, reported as SARIF.",
    version
)]
struct Cli {
    /// Analysis unit file, or a directory searched for `*.json` units.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Write SARIF here instead of stdout (`-` is stdout).
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
    /// OTLP/HTTP collector endpoint for trace export.
    #[arg(long, value_name = "URL")]
    otel: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);
    let telemetry = match cli.otel.clone() {
        Some(endpoint) => Some(Arc::new(Telemetry::new(endpoint)?)),
        None => None,
    };
    let outcome = with_span(
        telemetry.as_deref(),
        "dataflint",
        &[KeyValue::new("dataflint.input", cli.input.display().to_string())],
        || {
            if let Some(trace_id) = current_trace_id() {
                info!(trace_id = %trace_id, "exporting traces");
            }
            run(&cli, telemetry.clone())
        },
    );
    if let Some(telemetry) = telemetry {
        telemetry.shutdown()?;
    }
    outcome
}

fn run(cli: &Cli, telemetry: Option<Arc<Telemetry>>) -> Result<()> {
    if !cli.input.exists() {
        anyhow::bail!("input not found: {}", cli.input.display());
    }

    let started_at = Instant::now();
    let scan_started_at = Instant::now();
    let inputs = with_span(
        telemetry.as_deref(),
        "scan",
        &[KeyValue::new("dataflint.phase", "scan")],
        || load_inputs(&cli.input),
    )?;
    let scan_duration_ms = scan_started_at.elapsed().as_millis();
    let unit_count = inputs.units.len();
    let artifact_count = inputs.artifacts.len();

    let analysis_started_at = Instant::now();
    let context = build_context(inputs.units, telemetry.clone());
    let output = with_span(
        telemetry.as_deref(),
        "analysis",
        &[KeyValue::new("dataflint.phase", "analysis")],
        || Engine::new().analyze(&context),
    )?;
    let analysis_duration_ms = analysis_started_at.elapsed().as_millis();

    let invocation = build_invocation(&InvocationStats {
        scan_duration_ms,
        analysis_duration_ms,
        unit_count,
        artifact_count,
        result_count: output.results.len(),
    });
    let result_count = output.results.len();
    let sarif = build_sarif(inputs.artifacts, invocation, output.rules, output.results);

    let mut writer = output_writer(cli.output.as_deref())?;
    serde_json::to_writer_pretty(&mut writer, &sarif)
        .context("failed to serialize SARIF output")?;
    writer
        .write_all(b"\n")
        .context("failed to write SARIF output")?;
    writer.flush().context("failed to flush SARIF output")?;

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} scan_ms={} analysis_ms={} units={} results={}",
            started_at.elapsed().as_millis(),
            scan_duration_ms,
            analysis_duration_ms,
            unit_count,
            result_count
        );
    }

    Ok(())
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

/// Metadata captured for SARIF invocation properties.
struct InvocationStats {
    scan_duration_ms: u128,
    analysis_duration_ms: u128,
    unit_count: usize,
    artifact_count: usize,
    result_count: usize,
}

fn build_invocation(stats: &InvocationStats) -> Invocation {
    let arguments: Vec<String> = std::env::args().collect();
    let command_line = arguments.join(" ");
    let mut properties = BTreeMap::new();
    properties.insert("dataflint.scan_ms".to_string(), json!(stats.scan_duration_ms));
    properties.insert(
        "dataflint.analysis_ms".to_string(),
        json!(stats.analysis_duration_ms),
    );
    properties.insert("dataflint.unit_count".to_string(), json!(stats.unit_count));
    properties.insert(
        "dataflint.artifact_count".to_string(),
        json!(stats.artifact_count),
    );
    properties.insert(
        "dataflint.result_count".to_string(),
        json!(stats.result_count),
    );

    Invocation::builder()
        .execution_successful(true)
        .arguments(arguments)
        .command_line(command_line)
        .properties(PropertyBag::builder().additional_properties(properties).build())
        .build()
}

fn build_sarif(
    artifacts: Vec<Artifact>,
    invocation: Invocation,
    rules: Vec<ReportingDescriptor>,
    results: Vec<SarifResult>,
) -> Sarif {
    let driver = if rules.is_empty() {
        ToolComponent::builder()
            .name("dataflint")
            .version(env!("CARGO_PKG_VERSION"))
            .build()
    } else {
        ToolComponent::builder()
            .name("dataflint")
            .version(env!("CARGO_PKG_VERSION"))
            .rules(rules)
            .build()
    };
    let tool = Tool {
        driver,
        extensions: None,
        properties: None,
    };
    let run = if artifacts.is_empty() {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .build()
    } else {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .artifacts(artifacts)
            .build()
    };

    Sarif::builder()
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .version(json!("2.1.0"))
        .build()
}
