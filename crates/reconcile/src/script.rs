//! Configuration-script resource handler
//!
//! A configuration script declares one or more named sub-targets
//! ("configurations"). Inspection is batched: one discovery job lists the
//! sub-target names the script declares, an optional compile job prepares
//! them, and one test job reports a satisfied boolean per sub-target.
//! Configuration then enacts sub-targets one at a time.

use crate::error::ReconcileError;
use crate::handler::{ReconcileContext, ResourceHandler};
use crate::template::{PersistedConfiguration, ResourceTemplate};
use async_trait::async_trait;
use remoting::{Capture, Job, RemotingError, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Job payloads for one script dialect.
///
/// Every dialect speaks the channel's `::out` marker protocol: `discover`
/// must produce a `results` list of sub-target names plus a `discovered`
/// count, and `test` must produce a `results` map of sub-target name to
/// satisfied boolean. `configure` and `remove` receive `scriptPath`,
/// `configName` and `configDir` variables for one sub-target.
#[derive(Debug, Clone)]
pub struct ScriptPrograms {
    /// Prepares the execution target; runs once per inspection pass
    pub bootstrap: Option<&'static str>,
    pub discover: &'static str,
    /// Compiles each sub-target ahead of testing; skipped when absent
    pub compile: Option<&'static str>,
    pub test: &'static str,
    pub configure: &'static str,
    /// Dialects without a removal payload reject desired-absent drift
    pub remove: Option<&'static str>,
}

const DSC_BOOTSTRAP: &str = r"
$svc = Get-Service -Name WinRM -ErrorAction SilentlyContinue
if ($svc -and $svc.Status -ne 'Running') {
    Enable-PSRemoting -SkipNetworkProfileCheck -Force | out-null
}
";

const DSC_DISCOVER: &str = r#"
$tokens = $errors = $null
$ast = [System.Management.Automation.Language.Parser]::ParseFile(
    $env:scriptPath,
    [ref]$tokens,
    [ref]$errors)

$configDefs = $ast.FindAll({
    param([System.Management.Automation.Language.Ast] $Ast)
    $Ast -is [System.Management.Automation.Language.ConfigurationDefinitionAst]
}, $true)

$results = @($configDefs | ForEach-Object { $_.InstanceName.Extent.Text })
$results | ForEach-Object { Write-Output "::out results[]=$_" }
Write-Output "::out discovered=$($results.Count)"
"#;

const DSC_COMPILE: &str = r#"
$configArg = ''
if ($env:ConfigurationData) {
    $configArg = "-ConfigurationData '$env:ConfigurationData'"
}

cd ([IO.Path]::GetDirectoryName($env:scriptPath)) | out-null
. $env:scriptPath | out-null

Import-Module PSDesiredStateConfiguration | out-null

$env:configNames -split ' ' | foreach {
    del $_ -Force -Recurse -ErrorAction SilentlyContinue | out-null
    Invoke-Expression -Command "$($_) $configArg" | out-null
}
"#;

const DSC_TEST: &str = r#"
cd ([IO.Path]::GetDirectoryName($env:scriptPath)) | out-null

$env:configNames -split ' ' | foreach {
    $state = (Test-DscConfiguration -Path $_).InDesiredState
    Write-Output "::out results.$_=$state"
}
"#;

const DSC_CONFIGURE: &str = r"
Start-DscConfiguration -Path $env:configDir -Wait -Verbose
";

const SH_DISCOVER: &str = r#"
. "$scriptPath"
n=0
for t in $targets; do
  printf '::out results[]=%s\n' "$t"
  n=$((n+1))
done
printf '::out discovered=%s\n' "$n"
"#;

const SH_TEST: &str = r#"
. "$scriptPath"
for t in $configNames; do
  if "test_$t"; then v=true; else v=false; fi
  printf '::out results.%s=%s\n' "$t" "$v"
done
"#;

const SH_CONFIGURE: &str = r#"
. "$scriptPath"
"apply_$configName"
"#;

const SH_REMOVE: &str = r#"
. "$scriptPath"
"remove_$configName"
"#;

impl ScriptPrograms {
    /// PowerShell DSC payloads: a WinRM bootstrap, then discovery parsing
    /// the script's AST remotely, testing via `Test-DscConfiguration` and
    /// enactment via `Start-DscConfiguration`. Inputs arrive as environment
    /// variables and results are printed as `::out` markers, so these pair
    /// with an interpreter channel such as `pwsh -NoProfile -Command`.
    pub fn dsc() -> Self {
        Self {
            bootstrap: Some(DSC_BOOTSTRAP),
            discover: DSC_DISCOVER,
            compile: Some(DSC_COMPILE),
            test: DSC_TEST,
            configure: DSC_CONFIGURE,
            remove: None,
        }
    }

    /// POSIX sh payloads speaking the local channel's `::out` marker
    /// protocol. The staged script is sourced and must define a `targets`
    /// word list plus `test_<name>`, `apply_<name>` and `remove_<name>`
    /// functions per sub-target.
    pub fn sh() -> Self {
        Self {
            bootstrap: None,
            discover: SH_DISCOVER,
            compile: None,
            test: SH_TEST,
            configure: SH_CONFIGURE,
            remove: Some(SH_REMOVE),
        }
    }
}

/// [`ResourceHandler`] for configuration scripts
pub struct ScriptResource {
    programs: ScriptPrograms,
}

impl ScriptResource {
    pub fn new(programs: ScriptPrograms) -> Self {
        Self { programs }
    }

    pub fn dsc() -> Self {
        Self::new(ScriptPrograms::dsc())
    }

    pub fn sh() -> Self {
        Self::new(ScriptPrograms::sh())
    }

    /// Direct path, or the cache-staged location of the script asset.
    /// Staging is synchronous and idempotent; a cancellation during it is
    /// honored at the next suspension point.
    fn script_path(
        &self,
        template: &ResourceTemplate,
        ctx: &ReconcileContext,
    ) -> Result<String, ReconcileError> {
        if let Some(asset) = &template.script_asset {
            let path = ctx.cache.materialize(asset, ctx.provider.as_ref())?;
            return Ok(path.display().to_string());
        }
        template.script_path.clone().ok_or_else(|| {
            ReconcileError::validation(
                &template.configuration_key,
                "specify a value for either script_path or script_asset",
            )
        })
    }

    fn config_data_path(
        &self,
        template: &ResourceTemplate,
        ctx: &ReconcileContext,
    ) -> Result<Option<String>, ReconcileError> {
        if let Some(asset) = &template.config_data_asset {
            let path = ctx.cache.materialize(asset, ctx.provider.as_ref())?;
            return Ok(Some(path.display().to_string()));
        }
        Ok(template.config_data_path.clone())
    }

    fn job(&self, template: &ResourceTemplate, script: &'static str) -> Job {
        let mut job = Job::new(script);
        job.debug_logging = template.debug_logging;
        job.verbose_logging = template.verbose_logging;
        for (name, value) in &template.variables {
            job.variables.insert(name.clone(), value.clone());
        }
        for (name, value) in &template.secrets {
            job.variables.insert(name.clone(), Value::text(value));
        }
        if template.debug_logging {
            log::debug!("{script}");
        }
        job
    }

    async fn submit(&self, job: Job, ctx: &ReconcileContext) -> Result<remoting::JobResult, ReconcileError> {
        let result = ctx
            .channel
            .submit(job, ctx.observer.clone(), ctx.cancel.clone())
            .await?;
        Ok(result)
    }

    /// One batched discovery job: the sub-target names the script declares
    async fn discover(
        &self,
        template: &ResourceTemplate,
        script_path: &str,
        ctx: &ReconcileContext,
    ) -> Result<Vec<String>, ReconcileError> {
        let job = self
            .job(template, self.programs.discover)
            .with_variable("scriptPath", script_path)
            .collecting(["results", "discovered"]);
        let result = self.submit(job, ctx).await?;
        let capture = Capture::new(&result);
        // The count is proof the discovery payload actually ran. A script
        // declaring no sub-targets emits no results markers, so an absent
        // list only reads as empty when the count says zero; a host that
        // exits cleanly without producing either is a capture failure, not
        // an empty discovery.
        let declared = capture.text("discovered")?.trim().to_string();
        match capture.required("results") {
            Ok(_) => Ok(capture.string_list("results")?),
            Err(RemotingError::MissingOutput { .. }) if declared == "0" => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn compile(
        &self,
        template: &ResourceTemplate,
        script_path: &str,
        config_names: &[String],
        config_data_path: Option<&str>,
        ctx: &ReconcileContext,
    ) -> Result<(), ReconcileError> {
        let Some(program) = self.programs.compile else {
            return Ok(());
        };
        let mut job = self
            .job(template, program)
            .with_variable("scriptPath", script_path)
            .with_variable("configNames", Value::string_list(config_names.to_vec()));
        if let Some(data_path) = config_data_path {
            job = job.with_variable("ConfigurationData", data_path);
        }
        self.submit(job, ctx).await?;
        Ok(())
    }

    /// One batched test job: satisfied boolean per sub-target
    async fn test(
        &self,
        template: &ResourceTemplate,
        script_path: &str,
        config_names: &[String],
        ctx: &ReconcileContext,
    ) -> Result<BTreeMap<String, bool>, ReconcileError> {
        let job = self
            .job(template, self.programs.test)
            .with_variable("scriptPath", script_path)
            .with_variable("configNames", Value::string_list(config_names.to_vec()))
            .collecting(["results"]);
        let result = self.submit(job, ctx).await?;
        Ok(Capture::new(&result).bool_map("results")?)
    }
}

#[async_trait]
impl ResourceHandler for ScriptResource {
    fn validate(&self, template: &ResourceTemplate) -> Result<(), ReconcileError> {
        if template.configuration_key.trim().is_empty() {
            return Err(ReconcileError::validation(
                "<unset>",
                "configuration_key must not be empty",
            ));
        }
        if template.script_asset.is_none() && template.script_path.is_none() {
            return Err(ReconcileError::validation(
                &template.configuration_key,
                "configuration script missing: specify a value for either script_path or script_asset",
            ));
        }
        Ok(())
    }

    async fn collect(
        &self,
        template: &ResourceTemplate,
        ctx: &ReconcileContext,
    ) -> Result<PersistedConfiguration, ReconcileError> {
        let script_path = self.script_path(template, ctx)?;
        let config_data_path = self.config_data_path(template, ctx)?;

        if let Some(program) = self.programs.bootstrap {
            log::debug!("bootstrapping the execution target");
            self.submit(self.job(template, program), ctx).await?;
        }

        log::info!("testing configuration script '{script_path}'");
        if let Some(data_path) = &config_data_path {
            log::info!("using configuration data from '{data_path}'");
        }

        let config_names = self.discover(template, &script_path, ctx).await?;
        log::debug!(
            "script declares {} sub-target(s): {}",
            config_names.len(),
            config_names.join(", ")
        );

        let enacted = if config_names.is_empty() {
            BTreeMap::new()
        } else {
            self.compile(
                template,
                &script_path,
                &config_names,
                config_data_path.as_deref(),
                ctx,
            )
            .await?;
            self.test(template, &script_path, &config_names, ctx).await?
        };

        let mut snapshot = PersistedConfiguration::from_template(template);
        snapshot.config_names.clone_from(&config_names);
        for name in &config_names {
            let satisfied = enacted.get(name).copied().unwrap_or(false);
            if satisfied != template.exists {
                log::info!("sub-target '{name}' is not in the desired state");
                snapshot.unsatisfied.push(name.clone());
            }
        }
        snapshot.configured = snapshot.unsatisfied.is_empty();
        Ok(snapshot)
    }

    async fn configure_target(
        &self,
        template: &ResourceTemplate,
        target: &str,
        ctx: &ReconcileContext,
    ) -> Result<(), ReconcileError> {
        // The script is already staged from Collect; materialization is
        // idempotent so this resolves to the same path without a rewrite.
        let script_path = self.script_path(template, ctx)?;
        let program = if template.exists {
            self.programs.configure
        } else {
            self.programs.remove.ok_or_else(|| {
                ReconcileError::Remoting(RemotingError::ExecutionFailed {
                    detail: format!(
                        "sub-target '{target}' is enacted but this script dialect has no removal payload"
                    ),
                    log_tail: Vec::new(),
                })
            })?
        };

        // Each sub-target compiles into its own directory next to the script
        let config_dir = Path::new(&script_path)
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(target);

        let job = self
            .job(template, program)
            .with_variable("scriptPath", script_path.as_str())
            .with_variable("configName", target)
            .with_variable("configDir", config_dir.display().to_string());
        self.submit(job, ctx).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_requires_a_script_source() {
        let handler = ScriptResource::sh();
        let bare = ResourceTemplate::new("site-A");
        let err = handler.validate(&bare).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation { .. }));

        let with_path = ResourceTemplate::new("site-A").with_script_path("/opt/web.sh");
        assert!(handler.validate(&with_path).is_ok());

        let with_asset = ResourceTemplate::new("site-A").with_script_asset("scripts::web.sh");
        assert!(handler.validate(&with_asset).is_ok());
    }

    #[test]
    fn validation_rejects_empty_configuration_key() {
        let handler = ScriptResource::sh();
        let template = ResourceTemplate::new("  ").with_script_path("/opt/web.sh");
        let err = handler.validate(&template).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation { .. }));
    }

    #[test]
    fn dsc_dialect_has_no_removal_payload() {
        assert!(ScriptPrograms::dsc().remove.is_none());
        assert!(ScriptPrograms::sh().remove.is_some());
    }

    #[test]
    fn only_the_dsc_dialect_bootstraps_the_target() {
        assert!(ScriptPrograms::dsc().bootstrap.is_some());
        assert!(ScriptPrograms::sh().bootstrap.is_none());
    }

    #[test]
    fn every_dialect_emits_discovery_markers() {
        for programs in [ScriptPrograms::dsc(), ScriptPrograms::sh()] {
            assert!(programs.discover.contains("::out results[]="));
            assert!(programs.discover.contains("::out discovered="));
            assert!(programs.test.contains("::out results."));
        }
    }
}
