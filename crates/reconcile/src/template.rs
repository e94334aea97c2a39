//! Desired-state templates and observed-state snapshots

use remoting::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MASK: &str = "********";

/// Desired-state descriptor for one resource instance.
///
/// Immutable once handed to the engine for a run; comparisons and
/// configuration produce new [`PersistedConfiguration`] snapshots rather
/// than mutating the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    /// Stable identity of the resource instance across runs
    pub configuration_key: String,

    /// Direct path to the configuration script on the execution target
    #[serde(default)]
    pub script_path: Option<String>,

    /// Asset reference resolved and staged through the content cache
    #[serde(default)]
    pub script_asset: Option<String>,

    /// Direct path to a configuration-data sidecar
    #[serde(default)]
    pub config_data_path: Option<String>,

    /// Asset reference for the configuration-data sidecar
    #[serde(default)]
    pub config_data_asset: Option<String>,

    /// Whether the resource should be configured (true) or absent (false)
    #[serde(default = "default_true")]
    pub exists: bool,

    /// Forward the script's debug stream to the debug log
    #[serde(default)]
    pub debug_logging: bool,

    /// Forward the script's verbose stream to the debug log
    #[serde(default)]
    pub verbose_logging: bool,

    /// Extra input variables passed to every job
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,

    /// Encrypted inputs: always compared for equality, masked in any
    /// display rendering unless explicitly unmasked
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
}

impl ResourceTemplate {
    pub fn new(configuration_key: impl Into<String>) -> Self {
        Self {
            configuration_key: configuration_key.into(),
            script_path: None,
            script_asset: None,
            config_data_path: None,
            config_data_asset: None,
            exists: true,
            debug_logging: false,
            verbose_logging: false,
            variables: BTreeMap::new(),
            secrets: BTreeMap::new(),
        }
    }

    pub fn with_script_path(mut self, path: impl Into<String>) -> Self {
        self.script_path = Some(path.into());
        self
    }

    pub fn with_script_asset(mut self, reference: impl Into<String>) -> Self {
        self.script_asset = Some(reference.into());
        self
    }

    pub fn with_exists(mut self, exists: bool) -> Self {
        self.exists = exists;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Flat field map for display/export; secret values are masked unless
    /// `hide_encrypted` is false
    pub fn properties_for_display(&self, hide_encrypted: bool) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("configuration_key".into(), self.configuration_key.clone());
        props.insert("exists".into(), self.exists.to_string());
        insert_opt(&mut props, "script_path", self.script_path.as_deref());
        insert_opt(&mut props, "script_asset", self.script_asset.as_deref());
        insert_opt(
            &mut props,
            "config_data_path",
            self.config_data_path.as_deref(),
        );
        insert_opt(
            &mut props,
            "config_data_asset",
            self.config_data_asset.as_deref(),
        );
        props.insert("debug_logging".into(), self.debug_logging.to_string());
        props.insert("verbose_logging".into(), self.verbose_logging.to_string());
        for (name, value) in &self.variables {
            props.insert(name.clone(), value.to_string());
        }
        for (name, value) in &self.secrets {
            let rendered = if hide_encrypted {
                MASK.to_string()
            } else {
                value.clone()
            };
            props.insert(name.clone(), rendered);
        }
        props
    }

    pub fn has_encrypted_properties(&self) -> bool {
        !self.secrets.is_empty()
    }
}

fn default_true() -> bool {
    true
}

fn insert_opt(props: &mut BTreeMap<String, String>, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        props.insert(name.to_string(), value.to_string());
    }
}

/// Observed-or-resulting state snapshot, produced at the end of Collect and
/// again as the post-configure verification.
///
/// Reflects the state as observed at that instant; whether it is persisted
/// beyond the run is the caller's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedConfiguration {
    pub configuration_key: String,

    /// Whether the observed state matched the template's declared intent
    pub configured: bool,

    pub script_path: Option<String>,
    pub script_asset: Option<String>,
    pub config_data_path: Option<String>,
    pub config_data_asset: Option<String>,
    pub debug_logging: bool,
    pub verbose_logging: bool,

    /// Discovered sub-target names, in discovery order
    pub config_names: Vec<String>,

    /// Sub-targets whose observed state did not match the declared intent
    pub unsatisfied: Vec<String>,

    /// Encrypted fields carried over from the template
    pub secrets: BTreeMap<String, String>,
}

impl PersistedConfiguration {
    /// A snapshot carrying the template's declared fields, not yet observed
    pub fn from_template(template: &ResourceTemplate) -> Self {
        Self {
            configuration_key: template.configuration_key.clone(),
            configured: false,
            script_path: template.script_path.clone(),
            script_asset: template.script_asset.clone(),
            config_data_path: template.config_data_path.clone(),
            config_data_asset: template.config_data_asset.clone(),
            debug_logging: template.debug_logging,
            verbose_logging: template.verbose_logging,
            config_names: Vec::new(),
            unsatisfied: Vec::new(),
            secrets: template.secrets.clone(),
        }
    }

    /// Flat field map for display/export; secret values are masked unless
    /// `hide_encrypted` is false
    pub fn properties_for_display(&self, hide_encrypted: bool) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("configuration_key".into(), self.configuration_key.clone());
        props.insert("configured".into(), self.configured.to_string());
        insert_opt(&mut props, "script_path", self.script_path.as_deref());
        insert_opt(&mut props, "script_asset", self.script_asset.as_deref());
        insert_opt(
            &mut props,
            "config_data_path",
            self.config_data_path.as_deref(),
        );
        insert_opt(
            &mut props,
            "config_data_asset",
            self.config_data_asset.as_deref(),
        );
        props.insert("debug_logging".into(), self.debug_logging.to_string());
        props.insert("verbose_logging".into(), self.verbose_logging.to_string());
        if !self.config_names.is_empty() {
            props.insert("config_names".into(), self.config_names.join(" "));
        }
        for (name, value) in &self.secrets {
            let rendered = if hide_encrypted {
                MASK.to_string()
            } else {
                value.clone()
            };
            props.insert(name.clone(), rendered);
        }
        props
    }

    pub fn has_encrypted_properties(&self) -> bool {
        !self.secrets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_deserializes_with_defaults() {
        let template: ResourceTemplate = toml::from_str(
            r#"
            configuration_key = "site-A"
            script_asset = "scripts::web.sh"
            "#,
        )
        .unwrap();

        assert_eq!(template.configuration_key, "site-A");
        assert!(template.exists);
        assert!(!template.debug_logging);
        assert!(template.script_path.is_none());
    }

    #[test]
    fn display_properties_mask_secrets_by_default() {
        let mut template = ResourceTemplate::new("site-A").with_script_path("/opt/web.sh");
        template
            .secrets
            .insert("api_token".into(), "hunter2".into());

        let masked = template.properties_for_display(true);
        assert_eq!(masked["api_token"], MASK);

        let unmasked = template.properties_for_display(false);
        assert_eq!(unmasked["api_token"], "hunter2");
    }

    #[test]
    fn snapshot_copies_declared_fields() {
        let template = ResourceTemplate::new("site-A")
            .with_script_asset("scripts::web.sh")
            .with_exists(true);
        let snapshot = PersistedConfiguration::from_template(&template);

        assert_eq!(snapshot.configuration_key, "site-A");
        assert_eq!(snapshot.script_asset.as_deref(), Some("scripts::web.sh"));
        assert!(!snapshot.configured);
        assert!(snapshot.config_names.is_empty());
    }
}
