//! Structural comparison between declared intent and observed state
//!
//! Comparison is intentionally total: every declared field participates,
//! including the logging flags, so operator intent changes stay visible in
//! diffs even when they require no remote action. Callers filtering
//! "actionable" diffs do so above this layer.

use crate::template::{PersistedConfiguration, ResourceTemplate};
use serde::Serialize;

/// One field-level difference between desired and observed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub field: String,
    pub desired: String,
    pub observed: String,
    /// Encrypted fields compare on real values but render masked
    pub masked: bool,
}

impl FieldDiff {
    /// Human-readable rendering; masked fields never reveal their values
    pub fn render(&self) -> String {
        if self.masked {
            format!("{}: (masked)", self.field)
        } else {
            format!(
                "{}: desired '{}', observed '{}'",
                self.field, self.desired, self.observed
            )
        }
    }
}

/// Total field-by-field comparison result
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffReport {
    pub fields: Vec<FieldDiff>,
    /// Sub-targets whose observed state did not match the declared intent
    pub unsatisfied: Vec<String>,
}

impl DiffReport {
    pub fn has_changes(&self) -> bool {
        !self.fields.is_empty() || !self.unsatisfied.is_empty()
    }
}

/// Compare a template's declared intent against an observed snapshot
pub fn compare(template: &ResourceTemplate, observed: &PersistedConfiguration) -> DiffReport {
    let mut report = DiffReport::default();

    // `configured` on a snapshot records whether observed state matched the
    // template's declared intent, so the desired side is always true.
    push_if_differs(
        &mut report,
        "configured",
        "true",
        &observed.configured.to_string(),
        false,
    );
    push_opt(
        &mut report,
        "script_path",
        template.script_path.as_deref(),
        observed.script_path.as_deref(),
    );
    push_opt(
        &mut report,
        "script_asset",
        template.script_asset.as_deref(),
        observed.script_asset.as_deref(),
    );
    push_opt(
        &mut report,
        "config_data_path",
        template.config_data_path.as_deref(),
        observed.config_data_path.as_deref(),
    );
    push_opt(
        &mut report,
        "config_data_asset",
        template.config_data_asset.as_deref(),
        observed.config_data_asset.as_deref(),
    );
    push_if_differs(
        &mut report,
        "debug_logging",
        &template.debug_logging.to_string(),
        &observed.debug_logging.to_string(),
        false,
    );
    push_if_differs(
        &mut report,
        "verbose_logging",
        &template.verbose_logging.to_string(),
        &observed.verbose_logging.to_string(),
        false,
    );

    // Secrets always participate in equality but never render their values
    let secret_names = template.secrets.keys().chain(observed.secrets.keys());
    for name in secret_names {
        let desired = template.secrets.get(name);
        let observed_value = observed.secrets.get(name);
        if desired != observed_value && !report.fields.iter().any(|d| &d.field == name) {
            report.fields.push(FieldDiff {
                field: name.clone(),
                desired: String::new(),
                observed: String::new(),
                masked: true,
            });
        }
    }

    report.unsatisfied = observed.unsatisfied.clone();
    report
}

fn push_opt(report: &mut DiffReport, field: &str, desired: Option<&str>, observed: Option<&str>) {
    if desired != observed {
        report.fields.push(FieldDiff {
            field: field.to_string(),
            desired: desired.unwrap_or_default().to_string(),
            observed: observed.unwrap_or_default().to_string(),
            masked: false,
        });
    }
}

fn push_if_differs(
    report: &mut DiffReport,
    field: &str,
    desired: &str,
    observed: &str,
    masked: bool,
) {
    if desired != observed {
        report.fields.push(FieldDiff {
            field: field.to_string(),
            desired: desired.to_string(),
            observed: observed.to_string(),
            masked,
        });
    }
}
