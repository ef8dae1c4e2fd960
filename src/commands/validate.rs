//! `replan validate` - cross-field checks on a request's config

use anyhow::{Result, bail};
use declarative::check_consistency;

use crate::Context;
use crate::cli::ValidateArgs;
use crate::config::Settings;
use crate::engine::{self, differ};

pub fn run(ctx: &Context, settings: &Settings, args: ValidateArgs) -> Result<()> {
    let schema = settings.schema_path(args.source.schema.as_deref())?;
    let shape = engine::load_shape(&schema, args.source.root.as_deref())?;
    let request = engine::load_request(&args.request, &shape)?;

    let violations = check_consistency(&request.config);
    if !ctx.quiet || !violations.is_empty() {
        differ::display_violations(&request.label, &violations);
    }

    if !violations.is_empty() {
        bail!(
            "{} failed {} consistency check(s)",
            request.label,
            violations.len()
        );
    }
    Ok(())
}
