//! Plan, apply and show over a manifest
//!
//! Templates reconcile strictly one after another; the process exit code is
//! the worst outcome across the manifest. An interrupt cancels the shared
//! token and the engine stops at the next sub-target boundary.

use crate::cli::{ReconcileArgs, ShowArgs};
use crate::schema::{Dialect, Manifest};
use crate::ui;
use anyhow::Result;
use reconcile::{Engine, Outcome, ReconcileReport, ResourceTemplate, ScriptResource};
use remoting::{ContentCache, DirContentProvider, LocalShellChannel, LogObserver};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn plan(args: &ReconcileArgs) -> Result<u8> {
    reconcile_manifest(args, true).await
}

pub async fn apply(args: &ReconcileArgs) -> Result<u8> {
    reconcile_manifest(args, false).await
}

async fn reconcile_manifest(args: &ReconcileArgs, simulation: bool) -> Result<u8> {
    let manifest = Manifest::load(&args.manifest)?;
    let templates = manifest.select(args.key.as_deref())?;
    if templates.is_empty() {
        ui::warn("manifest declares no templates");
        return Ok(0);
    }

    let engine = build_engine(&manifest);
    let handler = match manifest.settings.dialect {
        Dialect::Sh => ScriptResource::sh(),
        Dialect::Dsc => ScriptResource::dsc(),
    };

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received; stopping at the next safe point");
            signal.cancel();
        }
    });

    let mut worst = 0u8;
    for template in templates {
        ui::section(&format!(
            "{} {}",
            if simulation { "plan" } else { "apply" },
            template.configuration_key
        ));
        let report = engine
            .reconcile(&handler, template, simulation, cancel.clone())
            .await;
        render_report(template, &report);
        worst = worst.max(report.outcome.exit_code());
        if report.outcome == Outcome::Cancelled {
            break;
        }
    }
    Ok(worst)
}

fn build_engine(manifest: &Manifest) -> Engine {
    let channel = match manifest.settings.dialect {
        Dialect::Sh => LocalShellChannel::new(),
        Dialect::Dsc => LocalShellChannel::with_interpreter("pwsh", ["-NoProfile", "-Command"]),
    };
    let assets = manifest
        .settings
        .assets
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let cache = match &manifest.settings.cache {
        Some(root) => ContentCache::new(root),
        None => ContentCache::in_temp_dir(),
    };
    Engine::new(
        Arc::new(channel),
        Arc::new(DirContentProvider::new(assets)),
        Arc::new(cache),
    )
    .with_observer(Arc::new(LogObserver::new("job")))
}

fn render_report(template: &ResourceTemplate, report: &ReconcileReport) {
    ui::outcome(&template.configuration_key, report.outcome);
    if let Some(diff) = &report.diff {
        for field in &diff.fields {
            ui::dim(&field.render());
        }
        for target in &diff.unsatisfied {
            ui::dim(&format!("sub-target '{target}' needs configuration"));
        }
    }
    if let Some(err) = &report.error {
        ui::error(&err.to_string());
    }
}

pub fn show(args: &ShowArgs) -> Result<u8> {
    let manifest = Manifest::load(&args.manifest)?;
    let templates = manifest.select(args.key.as_deref())?;
    if templates.is_empty() {
        ui::warn("manifest declares no templates");
        return Ok(0);
    }

    for template in templates {
        ui::section(&template.configuration_key);
        for (name, value) in template.properties_for_display(!args.reveal_secrets) {
            ui::kv(&name, &value);
        }
    }
    Ok(0)
}
