//! # cimeta-cli
//!
//! Command-line interface for the cimeta metadata resolver.
//!
//! Takes a newline-separated list of YAML config files, an optional YAML
//! block of initial parameter overrides, and an optional JSON GitHub
//! context; merges and evaluates the configuration graph and emits the
//! resolved outputs.

mod inputs;

use anyhow::{Context, Result};
use cimeta_eval::Graph;
use clap::Parser;
use colored::*;
use serde_yaml::{Mapping, Value as Yaml};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cimeta")]
#[command(about = "Resolve merged CI metadata documents into concrete outputs", long_about = None)]
#[command(version)]
struct Cli {
    /// Newline-separated list of YAML config files, merged in order (last wins)
    #[arg(value_name = "CONFIG_FILES")]
    config_files: Option<String>,

    /// YAML mapping of initial parameter overrides (dotted node paths as keys)
    #[arg(value_name = "INITIAL_PARAMS")]
    initial_params: Option<String>,

    /// JSON context object exposed to templates as the `github` root
    #[arg(long)]
    github: Option<String>,

    /// Append `key=value` lines to this file instead of honoring $GITHUB_OUTPUT
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut builder = Graph::builder();

    // Each of the three inputs is independently best-effort: a bad input is
    // reported and skipped, the run continues with what did load.
    if let Some(list) = &cli.config_files {
        let loaded = inputs::load_documents(list);
        for (path, err) in &loaded.failures {
            eprintln!("{} Skipping config {}: {:#}", "⚠".yellow().bold(), path, err);
        }
        for document in loaded.documents {
            builder = builder.with_document(document);
        }
    }

    if let Some(block) = &cli.initial_params {
        match inputs::parse_initial_params(block) {
            Ok(params) => builder = builder.with_initial_params(params),
            Err(err) => eprintln!(
                "{} Skipping initial parameters: {:#}",
                "⚠".yellow().bold(),
                err
            ),
        }
    }

    if let Some(block) = &cli.github {
        match inputs::parse_github_context(block) {
            Ok(context) => builder = builder.with_github_context(context),
            Err(err) => eprintln!(
                "{} Skipping GitHub context: {:#}",
                "⚠".yellow().bold(),
                err
            ),
        }
    }

    let graph = match builder.build() {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    for path in graph.unmatched_initial_params() {
        eprintln!(
            "{} No node matches initial parameter '{}'",
            "⚠".yellow().bold(),
            path
        );
    }

    let outputs = match graph.outputs() {
        Ok(outputs) => outputs,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    let count = emit_outputs(&outputs, cli.output.as_deref())?;
    eprintln!(
        "{} {}",
        "✓".green().bold(),
        format!("Resolved {count} outputs").bold()
    );

    Ok(())
}

/// Writes the resolved outputs to their sink and returns how many lines or
/// top-level keys were emitted.
///
/// With `--output` (or `$GITHUB_OUTPUT` set) the mapping is flattened to
/// dotted `key=value` lines and appended to that file; otherwise it is
/// printed as YAML on stdout.
fn emit_outputs(outputs: &Mapping, explicit: Option<&Path>) -> Result<usize> {
    let sink = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("GITHUB_OUTPUT").map(PathBuf::from));

    match sink {
        Some(path) => {
            let mut lines = String::new();
            let count = flatten_outputs("", outputs, &mut lines);
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open output file {}", path.display()))?;
            file.write_all(lines.as_bytes())
                .with_context(|| format!("failed to write output file {}", path.display()))?;
            Ok(count)
        }
        None => {
            let rendered = serde_yaml::to_string(&Yaml::Mapping(outputs.clone()))
                .context("failed to render outputs as YAML")?;
            print!("{rendered}");
            Ok(outputs.len())
        }
    }
}

/// Flattens nested mappings to dotted `key=value` lines, returning the line count.
fn flatten_outputs(prefix: &str, outputs: &Mapping, lines: &mut String) -> usize {
    let mut count = 0;
    for (key, value) in outputs {
        let Yaml::String(name) = key else { continue };
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match value {
            Yaml::Mapping(nested) => count += flatten_outputs(&path, nested, lines),
            scalar => {
                lines.push_str(&path);
                lines.push('=');
                lines.push_str(&scalar_display(scalar));
                lines.push('\n');
                count += 1;
            }
        }
    }
    count
}

fn scalar_display(value: &Yaml) -> String {
    match value {
        Yaml::String(s) => s.clone(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        // An unresolved output carries no value; emit an empty assignment.
        Yaml::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(source: &str) -> Mapping {
        match serde_yaml::from_str(source).unwrap() {
            Yaml::Mapping(mapping) => mapping,
            other => panic!("expected a mapping, got {other:?}"),
        }
    }

    #[test]
    fn flatten_produces_dotted_lines() {
        let outputs = mapping("meta:\n  image: 'app:v1'\ncount: 3\nempty: null");
        let mut lines = String::new();
        let count = flatten_outputs("", &outputs, &mut lines);
        assert_eq!(count, 3);
        assert_eq!(lines, "meta.image=app:v1\ncount=3\nempty=\n");
    }

    #[test]
    fn sequences_render_as_json() {
        let outputs = mapping("labels: [a, b]");
        let mut lines = String::new();
        flatten_outputs("", &outputs, &mut lines);
        assert_eq!(lines, "labels=[\"a\",\"b\"]\n");
    }

    #[test]
    fn emit_appends_to_explicit_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("outputs.txt");
        std::fs::write(&path, "existing=1\n")?;

        let outputs = mapping("fresh: 2");
        let count = emit_outputs(&outputs, Some(path.as_path()))?;

        assert_eq!(count, 1);
        let written = std::fs::read_to_string(&path)?;
        assert_eq!(written, "existing=1\nfresh=2\n");
        Ok(())
    }
}
