//! Change and report display - replan-specific UI

use colored::{ColoredString, Colorize};
use declarative::{
    ChangeKind, DiffSummary, FieldChange, FieldPath, FieldRule, ObjectSchema, ReconcileReport, Shape,
    Violation, group_by_kind,
};
use std::collections::HashSet;

use crate::ui;

fn symbol(kind: ChangeKind) -> ColoredString {
    let text = kind.to_string();
    match kind {
        ChangeKind::Added => text.green(),
        ChangeKind::Removed => text.red(),
        ChangeKind::Modified => text.yellow(),
        ChangeKind::KnownAfterApply => text.dimmed(),
    }
}

fn group_title(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Added => "Added",
        ChangeKind::Removed => "Removed",
        ChangeKind::Modified => "Modified",
        ChangeKind::KnownAfterApply => "Known after apply",
    }
}

/// One-line description of a change, without the symbol
pub fn describe(change: &FieldChange) -> String {
    match (&change.before, &change.after) {
        (Some(before), Some(after)) => format!("{before} → {after}"),
        (None, Some(after)) => after.clone(),
        (Some(before), None) => format!("(was {before})"),
        (None, None) => String::new(),
    }
}

/// Display the changes a reconciled tree would make relative to prior state
pub fn display_changes(label: &str, changes: &[FieldChange]) {
    if changes.is_empty() {
        println!();
        println!("  {} No changes for {}", "✓".green(), label);
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        format!("Plan: {label}").bold()
    );
    println!("│");

    for (kind, group) in group_by_kind(changes) {
        println!("│ {}", group_title(kind).bold());
        for change in group {
            println!(
                "│   {} {:<30} {}",
                symbol(kind),
                change.path,
                describe(change).dimmed()
            );
        }
        println!("│");
    }

    let summary = DiffSummary::from_changes(changes);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} ({} added, {} removed, {} modified, {} pending)",
        ui::plural(summary.total(), "change").bold(),
        summary.additions.to_string().green(),
        summary.removals.to_string().red(),
        summary.modifications.to_string().yellow(),
        summary.pending.to_string().dimmed()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Display what reconciliation did to the proposal
///
/// `detailed` lists every affected path under its count.
pub fn display_report(report: &ReconcileReport, detailed: bool, warn_on_fallback: bool) {
    if report.matched + report.unmatched > 0 {
        ui::kv(
            "Correlated",
            &format!("{} of {} set elements", report.matched, report.matched + report.unmatched),
        );
    }
    if !report.preserved.is_empty() {
        ui::kv("Preserved", &ui::plural(report.preserved.len(), "server-owned field"));
        if detailed {
            list_paths(&report.preserved);
        }
    }
    if !report.defaults.is_empty() {
        ui::kv("Defaults", &ui::plural(report.defaults.len(), "first-creation default"));
        if detailed {
            list_paths(&report.defaults);
        }
    }
    if !report.forced.is_empty() {
        ui::kv("Forced", &ui::plural(report.forced.len(), "window boundary change"));
        if detailed {
            list_paths(&report.forced);
        }
    }
    if warn_on_fallback {
        for (path, guard) in report.cardinality_fallbacks() {
            ui::warn(&format!("{path}: {guard}"));
        }
    }
}

fn list_paths(paths: &[FieldPath]) {
    for path in paths {
        ui::dim(&format!("  {path}"));
    }
}

/// Display consistency violations
pub fn display_violations(label: &str, violations: &[Violation]) {
    if violations.is_empty() {
        ui::success(&format!("{label}: configuration is consistent"));
        return;
    }

    ui::error(&format!(
        "{label}: {}",
        ui::plural(violations.len(), "consistency violation")
    ));
    for violation in violations {
        eprintln!("    {} {}", violation.path.to_string().bold(), violation.message);
    }
}

/// Show a line diff between two renderings of a tree using the `similar` crate
pub fn show_text_diff(before: &str, after: &str) {
    let diff = similar::TextDiff::from_lines(before, after);
    let mut has_changes = false;

    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                has_changes = true;
                print!("    {}", format!("- {change}").red());
            }
            similar::ChangeTag::Insert => {
                has_changes = true;
                print!("    {}", format!("+ {change}").green());
            }
            similar::ChangeTag::Equal => {}
        }
    }

    if !has_changes {
        println!("    {}", "(proposal unchanged)".dimmed());
    }
}

// ============================================================================
// Schema Tree
// ============================================================================

/// Render a compiled schema as an indented tree
pub fn render_schema(schema: &ObjectSchema) -> Vec<String> {
    let mut lines = vec![schema.name.clone()];
    let mut seen = HashSet::new();
    seen.insert(schema.name.clone());
    render_fields(schema, 1, &mut seen, &mut lines);
    lines
}

fn render_fields(
    schema: &ObjectSchema,
    depth: usize,
    seen: &mut HashSet<String>,
    lines: &mut Vec<String>,
) {
    let indent = "  ".repeat(depth);
    for field in schema.fields() {
        let mut line = format!("{indent}{}: {} [{}]", field.name, field.shape, field.ownership);
        if let Shape::Collection(collection) = &field.shape
            && !collection.key_policy.is_empty()
        {
            let keys: Vec<String> = collection
                .key_policy
                .candidates()
                .iter()
                .map(ToString::to_string)
                .collect();
            line.push_str(&format!(" key {}", keys.join(" | ")));
        }
        match &field.rule {
            Some(FieldRule::DefaultOnCreate(_)) => line.push_str(" (default on create)"),
            Some(FieldRule::DefaultEmpty) => line.push_str(" (default empty)"),
            Some(FieldRule::Window(_)) => line.push_str(" (window)"),
            None => {}
        }
        lines.push(line);

        let nested = match &field.shape {
            Shape::Object(object) => Some(object),
            Shape::Collection(collection) => match &collection.element {
                Shape::Object(object) => Some(object),
                _ => None,
            },
            Shape::Scalar(_) => None,
        };
        // Shared object types are expanded once
        if let Some(object) = nested
            && seen.insert(object.name.clone())
        {
            render_fields(object, depth + 1, seen, lines);
        }
    }
    for check in schema.checks() {
        lines.push(format!("{indent}check: {}", check.describe(schema)));
    }
}
