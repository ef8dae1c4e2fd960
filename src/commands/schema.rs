//! `replan schema` - show the compiled schema

use anyhow::{Context as AnyhowContext, Result};

use crate::Context;
use crate::cli::SchemaArgs;
use crate::config::Settings;
use crate::engine::{differ, loader};
use crate::ui;

pub fn run(ctx: &Context, settings: &Settings, args: SchemaArgs) -> Result<()> {
    let path = settings.schema_path(args.source.schema.as_deref())?;
    let definition = loader::load_definition(&path)?;
    let root = args.source.root.as_deref().unwrap_or(&definition.root);
    let schema = definition
        .compile_object(root)
        .with_context(|| format!("Could not compile schema from {}", path.display()))?;

    if !ctx.quiet {
        ui::header("Schema");
        ui::kv("File", &path.display().to_string());
        ui::kv("Object types", &definition.objects.len().to_string());
        println!();
    }
    for line in differ::render_schema(&schema) {
        println!("  {line}");
    }
    Ok(())
}
