//! `smartzone apply`: reconcile one desired-state document.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use smartzone_core::{Action, ApplyReport, Controller, DesiredDocument, Resource};

use crate::cli::{ApplyArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// What `apply` prints.
#[derive(Debug, Serialize)]
struct ApplySummary {
    changed: bool,
    action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    diff: Option<StateDiff>,
}

#[derive(Debug, Serialize)]
struct StateDiff {
    before: Option<Resource>,
    after: Option<Resource>,
}

impl ApplySummary {
    fn new(report: ApplyReport, with_diff: bool) -> Self {
        let diff = (with_diff && report.changed).then(|| StateDiff {
            before: report.before,
            after: report.after,
        });
        Self {
            changed: report.changed,
            action: report.action,
            diff,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    document: &DesiredDocument,
    args: &ApplyArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let report = controller.apply(document, args.check).await?;
    info!(
        kind = %report.kind,
        name = report.name.as_deref().unwrap_or("-"),
        action = %report.action,
        changed = report.changed,
        check_mode = report.check_mode,
        "apply finished"
    );

    let summary = ApplySummary::new(report, args.diff);
    let out = output::render_single(global.format(), &summary)?;
    output::print_output(&out);
    Ok(())
}

// ── Document loading ────────────────────────────────────────────────

/// Read a desired-state document. `.json` files parse as JSON, anything
/// else as YAML.
pub fn load_document(path: &Path) -> Result<DesiredDocument, CliError> {
    let invalid = |reason: String| CliError::Document {
        path: path.to_path_buf(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let document: DesiredDocument = if is_json {
        serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?
    } else {
        serde_yaml::from_str(&text).map_err(|e| invalid(e.to_string()))?
    };
    document
        .validate()
        .map_err(|e| invalid(e.to_string()))?;
    Ok(document)
}
