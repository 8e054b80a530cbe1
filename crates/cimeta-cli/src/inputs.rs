//! Best-effort parsing of the three CLI inputs.
//!
//! Each input stage returns a plain `Result` (or collects per-file
//! failures); the caller decides how to report a failure and always keeps
//! going with whatever did load. A bad input degrades the run, it never
//! aborts it.

use anyhow::{Context, Result, bail};
use serde_yaml::Mapping;
use std::fs;

/// Result of the config-file input stage.
pub struct LoadedDocuments {
    /// Successfully parsed documents, in list order.
    pub documents: Vec<Mapping>,
    /// Per-file failures, in list order.
    pub failures: Vec<(String, anyhow::Error)>,
}

/// Reads and parses every path in a newline-separated list.
///
/// Unreadable or malformed files are collected as failures instead of
/// aborting; blank lines are ignored.
pub fn load_documents(list: &str) -> LoadedDocuments {
    let mut documents = Vec::new();
    let mut failures = Vec::new();
    for path in list.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match load_document(path) {
            Ok(document) => documents.push(document),
            Err(err) => failures.push((path.to_string(), err)),
        }
    }
    LoadedDocuments {
        documents,
        failures,
    }
}

fn load_document(path: &str) -> Result<Mapping> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read '{path}'"))?;
    parse_mapping(&source).with_context(|| format!("failed to parse '{path}'"))
}

/// Parses the initial-parameter block: a YAML mapping of dotted node paths
/// (or nested mappings) to override values.
pub fn parse_initial_params(block: &str) -> Result<Mapping> {
    parse_mapping(block).context("initial parameters must be a YAML mapping")
}

/// Parses the GitHub context block: an arbitrary JSON object.
pub fn parse_github_context(block: &str) -> Result<serde_json::Value> {
    serde_json::from_str(block).context("GitHub context must be valid JSON")
}

fn parse_mapping(source: &str) -> Result<Mapping> {
    let value: serde_yaml::Value = serde_yaml::from_str(source)?;
    match value {
        serde_yaml::Value::Mapping(mapping) => Ok(mapping),
        serde_yaml::Value::Null => Ok(Mapping::new()),
        other => bail!("expected a YAML mapping at the top level, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_documents_skips_bad_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let good = dir.path().join("good.yaml");
        fs::write(&good, "a: 1\n")?;
        let bad = dir.path().join("bad.yaml");
        fs::write(&bad, "- just\n- a\n- list\n")?;

        let list = format!(
            "{}\n{}\n{}\n",
            good.display(),
            bad.display(),
            dir.path().join("missing.yaml").display()
        );
        let loaded = load_documents(&list);

        assert_eq!(loaded.documents.len(), 1);
        assert_eq!(loaded.failures.len(), 2);
        Ok(())
    }

    #[test]
    fn load_documents_ignores_blank_lines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("only.yaml");
        let mut file = fs::File::create(&path)?;
        writeln!(file, "key: value")?;

        let list = format!("\n  \n{}\n\n", path.display());
        let loaded = load_documents(&list);

        assert_eq!(loaded.documents.len(), 1);
        assert!(loaded.failures.is_empty());
        Ok(())
    }

    #[test]
    fn initial_params_accept_mapping() -> Result<()> {
        let params = parse_initial_params("meta.image: busybox\n")?;
        assert_eq!(params.len(), 1);
        Ok(())
    }

    #[test]
    fn initial_params_accept_empty_block() -> Result<()> {
        let params = parse_initial_params("")?;
        assert!(params.is_empty());
        Ok(())
    }

    #[test]
    fn initial_params_reject_non_mapping() {
        assert!(parse_initial_params("- a\n- b\n").is_err());
    }

    #[test]
    fn github_context_accepts_json() -> Result<()> {
        let context = parse_github_context(r#"{"ref": "refs/heads/main"}"#)?;
        assert_eq!(context["ref"], "refs/heads/main");
        Ok(())
    }

    #[test]
    fn github_context_rejects_malformed_json() {
        assert!(parse_github_context("{'single': 'quotes'}").is_err());
    }
}
