//! `replan plan` - reconcile one request

use anyhow::{Context as AnyhowContext, Result};
use declarative::{Node, Reconciled, Request, diff_trees, snapshot};
use std::fs;

use crate::Context;
use crate::cli::PlanArgs;
use crate::config::Settings;
use crate::engine::{self, differ};
use crate::ui;

pub fn run(ctx: &Context, settings: &Settings, args: PlanArgs) -> Result<()> {
    let schema = settings.schema_path(args.source.schema.as_deref())?;
    let shape = engine::load_shape(&schema, args.source.root.as_deref())?;
    let request = engine::load_request(&args.request, &shape)?;

    let reconciled = plan_request(&request)?;
    let rendered = render(&reconciled.tree)?;

    if !ctx.quiet {
        ui::header(&format!("Plan {}", request.label));
        differ::display_report(&reconciled.report, ctx.verbose > 0, settings.warn_on_fallback);
        if !reconciled.report.touched_proposal() {
            ui::info("Proposal accepted unchanged");
        }
        let changes = diff_trees(request.prior.as_ref(), &reconciled.tree);
        differ::display_changes(&request.label, &changes);

        if args.show_diff {
            ui::section("Proposal → reconciled");
            differ::show_text_diff(&render(&request.proposed)?, &rendered);
        }
    }

    match &args.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Could not write {}", path.display()))?;
            if !ctx.quiet {
                ui::success(&format!("Wrote reconciled tree to {}", path.display()));
            }
        }
        None => {
            if !ctx.quiet {
                println!();
            }
            print!("{rendered}");
        }
    }

    Ok(())
}

/// Consistency checks followed by reconciliation
pub fn plan_request(request: &Request) -> Result<Reconciled> {
    log::info!("Planning {}", request.label);
    declarative::plan(&request.config, request.prior.as_ref(), &request.proposed)
        .with_context(|| format!("Could not plan {}", request.label))
}

/// Pretty snapshot JSON with a trailing newline
pub fn render(tree: &Node) -> Result<String> {
    let mut text = serde_json::to_string_pretty(&snapshot::encode(tree))
        .context("Could not serialize reconciled tree")?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SchemaSource;
    use crate::engine::loader::tests::fixture;
    use serde_json::json;

    fn quiet() -> Context {
        Context {
            verbose: 0,
            quiet: true,
        }
    }

    #[test]
    fn test_plan_writes_reconciled_tree() {
        let (dir, schema, request) = fixture();
        let output = dir.path().join("out.json");
        let args = PlanArgs {
            request,
            source: SchemaSource {
                schema: Some(schema),
                root: None,
            },
            output: Some(output.clone()),
            show_diff: false,
        };

        run(&quiet(), &Settings::default(), args).unwrap();

        let tree: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(tree["id"], json!("m-1"));
        assert_eq!(tree["hosts"][0]["name"], json!("a"));
        assert_eq!(tree["hosts"][0]["id"], json!("h-1"));
        assert_eq!(tree["hosts"][1]["id"], json!("h-2"));
    }

    #[test]
    fn test_plan_request_reports_preserved_fields() {
        let (_dir, schema, request) = fixture();
        let shape = engine::load_shape(&schema, None).unwrap();
        let request = engine::load_request(&request, &shape).unwrap();

        let reconciled = plan_request(&request).unwrap();
        assert_eq!(reconciled.report.matched, 2);
        // monitor id plus both host ids
        assert_eq!(reconciled.report.preserved.len(), 3);
    }

    #[test]
    fn test_render_marks_unknowns() {
        let (_dir, schema, request) = fixture();
        let shape = engine::load_shape(&schema, None).unwrap();
        let request = engine::load_request(&request, &shape).unwrap();

        let text = render(&request.proposed).unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains("\"$unknown\": true"));
    }
}
