//! `replan batch` - reconcile a directory of requests in parallel

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{ReconcileReport, check_consistency, diff_trees, reconcile_batch};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::Context;
use crate::cli::BatchArgs;
use crate::commands::plan::render;
use crate::config::Settings;
use crate::engine::{self, differ};
use crate::ui;

pub fn run(ctx: &Context, settings: &Settings, args: BatchArgs) -> Result<()> {
    let schema = settings.schema_path(args.source.schema.as_deref())?;
    let shape = engine::load_shape(&schema, args.source.root.as_deref())?;

    let files = request_files(&args.dir)?;
    if files.is_empty() {
        ui::warn(&format!("No request files (*.json) in {}", args.dir.display()));
        return Ok(());
    }

    let jobs = args.jobs.unwrap_or(settings.jobs).max(1);
    if !ctx.quiet {
        ui::header("Batch Plan");
        ui::kv("Requests", &files.len().to_string());
        ui::kv("Jobs", &jobs.to_string());
        println!();
    }

    // Requests that fail to load or check never reach the engine
    let mut failures: Vec<(String, String)> = Vec::new();
    let mut requests = Vec::with_capacity(files.len());
    for path in &files {
        let label = label_for(&args.dir, path);
        match engine::load_request(path, &shape) {
            Ok(mut request) => {
                let violations = check_consistency(&request.config);
                if let Some(first) = violations.first() {
                    failures.push((
                        label,
                        format!(
                            "{} (first: {first})",
                            ui::plural(violations.len(), "consistency violation")
                        ),
                    ));
                } else {
                    request.label = label;
                    requests.push(request);
                }
            }
            Err(e) => failures.push((label, format!("{e:#}"))),
        }
    }

    let results = reconcile_batch(&requests, jobs);

    let mut total = ReconcileReport::default();
    let mut planned = 0;
    for (request, result) in requests.iter().zip(results) {
        let reconciled = match result {
            Ok(reconciled) => reconciled,
            Err(e) => {
                failures.push((request.label.clone(), e.to_string()));
                continue;
            }
        };
        planned += 1;
        total.merge(&reconciled.report);

        if let Some(out_dir) = &args.output {
            let target = out_dir.join(&request.label);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Could not create {}", parent.display()))?;
            }
            fs::write(&target, render(&reconciled.tree)?)
                .with_context(|| format!("Could not write {}", target.display()))?;
        }

        if !ctx.quiet {
            let changes = diff_trees(request.prior.as_ref(), &reconciled.tree);
            println!(
                "  {} {:<40} {}",
                "✓".green(),
                request.label,
                ui::plural(changes.len(), "change").dimmed()
            );
        }
    }

    for (label, error) in &failures {
        ui::error(&format!("{label}: {error}"));
    }

    if !ctx.quiet {
        ui::section("Summary");
        ui::kv("Planned", &planned.to_string());
        ui::kv("Failed", &failures.len().to_string());
        differ::display_report(&total, ctx.verbose > 0, settings.warn_on_fallback);
        if let Some(out_dir) = &args.output {
            ui::kv("Output", &out_dir.display().to_string());
        }
    }

    if !failures.is_empty() {
        bail!("{} of {} requests failed", failures.len(), files.len());
    }
    Ok(())
}

/// Every `*.json` file under `dir`, sorted by path
pub fn request_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    log::debug!("Found {} request files in {}", files.len(), dir.display());
    Ok(files)
}

fn label_for(dir: &Path, path: &Path) -> String {
    path.strip_prefix(dir)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SchemaSource;
    use crate::engine::loader::tests::{MONITOR, REQUEST};
    use tempfile::TempDir;

    fn quiet() -> Context {
        Context {
            verbose: 0,
            quiet: true,
        }
    }

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let schema = dir.path().join("monitor.toml");
        fs::write(&schema, MONITOR).unwrap();

        let requests = dir.path().join("requests");
        fs::create_dir_all(requests.join("team")).unwrap();
        fs::write(requests.join("web.json"), REQUEST).unwrap();
        fs::write(requests.join("team").join("db.json"), REQUEST).unwrap();
        fs::write(requests.join("notes.txt"), "not a request").unwrap();
        (dir, schema, requests)
    }

    fn args(schema: PathBuf, dir: PathBuf, output: Option<PathBuf>) -> BatchArgs {
        BatchArgs {
            dir,
            source: SchemaSource {
                schema: Some(schema),
                root: None,
            },
            jobs: Some(2),
            output,
        }
    }

    #[test]
    fn test_request_files_sorted_and_filtered() {
        let (_dir, _, requests) = setup();
        let files = request_files(&requests).unwrap();
        let labels: Vec<String> = files.iter().map(|f| label_for(&requests, f)).collect();
        let expected = vec![
            Path::new("team").join("db.json").to_string_lossy().into_owned(),
            "web.json".to_string(),
        ];
        assert_eq!(labels, expected);
    }

    #[test]
    fn test_batch_writes_every_result() {
        let (dir, schema, requests) = setup();
        let out = dir.path().join("out");

        run(&quiet(), &Settings::default(), args(schema, requests, Some(out.clone()))).unwrap();

        assert!(out.join("web.json").exists());
        let db: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("team").join("db.json")).unwrap())
                .unwrap();
        assert_eq!(db["hosts"][1]["id"], serde_json::json!("h-2"));
    }

    #[test]
    fn test_broken_request_fails_batch() {
        let (_dir, schema, requests) = setup();
        fs::write(requests.join("broken.json"), "{").unwrap();

        let err = run(&quiet(), &Settings::default(), args(schema, requests, None)).unwrap_err();
        assert_eq!(err.to_string(), "1 of 3 requests failed");
    }

    #[test]
    fn test_missing_dir() {
        assert!(request_files(Path::new("/nonexistent/replan-requests")).is_err());
    }
}
