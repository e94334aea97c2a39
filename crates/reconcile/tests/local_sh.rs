//! End-to-end reconciliation through the local shell channel
//!
//! A real sh script declares two sub-targets whose enacted state is a file
//! per sub-target under a scratch directory, exercising staging, the marker
//! protocol and the full converge lifecycle without any mocking.

use reconcile::{Engine, Outcome, ResourceTemplate, ScriptResource};
use remoting::{ContentCache, DirContentProvider, LocalShellChannel};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const WEB_FARM_SCRIPT: &str = r#"
targets="alpha beta"

test_alpha() { [ -f "$STATE_DIR/alpha" ]; }
apply_alpha() { touch "$STATE_DIR/alpha"; }
remove_alpha() { rm -f "$STATE_DIR/alpha"; }

test_beta() { [ -f "$STATE_DIR/beta" ]; }
apply_beta() { touch "$STATE_DIR/beta"; }
remove_beta() { rm -f "$STATE_DIR/beta"; }
"#;

struct Fixture {
    engine: Engine,
    template: ResourceTemplate,
    state: tempfile::TempDir,
    _assets: tempfile::TempDir,
    _cache: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let assets = tempfile::tempdir().unwrap();
    std::fs::write(assets.path().join("webfarm.sh"), WEB_FARM_SCRIPT).unwrap();
    let cache = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();

    let engine = Engine::new(
        Arc::new(LocalShellChannel::new()),
        Arc::new(DirContentProvider::new(assets.path())),
        Arc::new(ContentCache::new(cache.path())),
    );
    let template = ResourceTemplate::new("web-farm")
        .with_script_asset("scripts::webfarm.sh")
        .with_variable("STATE_DIR", state.path().display().to_string());

    Fixture {
        engine,
        template,
        state,
        _assets: assets,
        _cache: cache,
    }
}

impl Fixture {
    fn enacted(&self, target: &str) -> bool {
        self.state.path().join(target).is_file()
    }
}

#[tokio::test]
async fn converges_and_then_holds_the_desired_state() {
    let fx = fixture();
    let handler = ScriptResource::sh();

    let report = fx
        .engine
        .reconcile(&handler, &fx.template, false, CancellationToken::new())
        .await;
    assert_eq!(report.outcome, Outcome::Configured);
    assert!(fx.enacted("alpha"));
    assert!(fx.enacted("beta"));
    let snapshot = report.snapshot.unwrap();
    assert_eq!(snapshot.config_names, vec!["alpha", "beta"]);
    assert!(snapshot.configured);

    let again = fx
        .engine
        .reconcile(&handler, &fx.template, false, CancellationToken::new())
        .await;
    assert_eq!(again.outcome, Outcome::InDesiredState);
}

#[tokio::test]
async fn declared_absent_removes_enacted_sub_targets() {
    let fx = fixture();
    let handler = ScriptResource::sh();

    let converge = fx
        .engine
        .reconcile(&handler, &fx.template, false, CancellationToken::new())
        .await;
    assert_eq!(converge.outcome, Outcome::Configured);

    let absent = fx.template.clone().with_exists(false);
    let removal = fx
        .engine
        .reconcile(&handler, &absent, false, CancellationToken::new())
        .await;
    assert_eq!(removal.outcome, Outcome::Configured);
    assert!(!fx.enacted("alpha"));
    assert!(!fx.enacted("beta"));
}

#[tokio::test]
async fn simulation_leaves_the_target_untouched() {
    let fx = fixture();
    let handler = ScriptResource::sh();

    let report = fx
        .engine
        .reconcile(&handler, &fx.template, true, CancellationToken::new())
        .await;
    assert_eq!(report.outcome, Outcome::WouldConfigure);
    assert!(!fx.enacted("alpha"));
    assert!(!fx.enacted("beta"));
    assert_eq!(report.diff.unwrap().unsatisfied, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn partial_drift_reconfigures_every_sub_target() {
    let fx = fixture();
    let handler = ScriptResource::sh();

    // Enact one sub-target by hand so only the other drifts
    std::fs::write(fx.state.path().join("alpha"), "").unwrap();

    let report = fx
        .engine
        .reconcile(&handler, &fx.template, false, CancellationToken::new())
        .await;
    assert_eq!(report.outcome, Outcome::Configured);
    assert!(fx.enacted("alpha"));
    assert!(fx.enacted("beta"));
}
