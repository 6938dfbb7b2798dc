//! Validate command - Check a manifest before publishing it
//!
//! # Usage
//!
//! ```bash
//! tally validate manifest.json
//! tally validate manifest.json --json
//! ```
//!
//! Exits non-zero when the document cannot load at all. Dropped rules and
//! actions are reported but do not fail the command: the pipeline would
//! still run the rest of the manifest.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Value, json};

use tally_manifest::{FileManifestSource, Manifest, ManifestSource};

/// Validate command arguments
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Manifest file (JSON)
    pub manifest: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Fail when any rule or action was dropped
    #[arg(long)]
    pub strict: bool,
}

/// Run the validate command
pub fn run(args: ValidateArgs) -> Result<()> {
    let source = FileManifestSource::new(&args.manifest);
    let manifest = source
        .load()
        .with_context(|| format!("manifest {} did not load", args.manifest.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&manifest))?);
    } else {
        print_report(&manifest);
    }

    if args.strict && !manifest.report().is_clean() {
        anyhow::bail!(
            "{} rule(s) and {} action(s) were dropped",
            manifest.report().invalid_rules,
            manifest.report().invalid_actions
        );
    }
    Ok(())
}

fn report_json(manifest: &Manifest) -> Value {
    let report = manifest.report();
    let throttle = manifest.throttle_settings();
    json!({
        "version": manifest.version(),
        "rules": manifest.rules().iter().map(|r| r.name()).collect::<Vec<_>>(),
        "throttlingThreshold": throttle.threshold,
        "throttlingTimerReset": throttle.reset_window.as_secs(),
        "invalidRules": report.invalid_rules,
        "invalidActions": report.invalid_actions,
        "invalidRuleNames": report.invalid_rule_names,
        "invalidActionNames": report.invalid_action_names,
    })
}

fn print_report(manifest: &Manifest) {
    let report = manifest.report();
    let throttle = manifest.throttle_settings();

    println!("Manifest version {}", manifest.version());
    println!(
        "  throttle: {} events per {}s",
        throttle.threshold,
        throttle.reset_window.as_secs()
    );
    println!("  rules:    {}", manifest.rule_count());
    for rule in manifest.rules() {
        let actions = rule
            .actions()
            .iter()
            .map(|a| a.name())
            .collect::<Vec<_>>()
            .join(", ");
        println!("    {} -> {}", rule.name(), actions);
    }

    if report.is_clean() {
        println!("  no rules or actions dropped");
        return;
    }
    println!("  dropped rules:   {}", report.invalid_rules);
    for name in &report.invalid_rule_names {
        println!("    {name}");
    }
    println!("  dropped actions: {}", report.invalid_actions);
    for name in &report.invalid_action_names {
        println!("    {name}");
    }
}
