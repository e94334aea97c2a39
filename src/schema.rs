//! Manifest schema
//!
//! A manifest is a TOML file with an optional `[settings]` table and one
//! `[[template]]` block per resource instance. Relative asset and cache
//! paths resolve against the manifest's own directory so a manifest can be
//! checked out anywhere.

use anyhow::{bail, Context, Result};
use reconcile::ResourceTemplate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Which script dialect the manifest's templates are written in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// POSIX sh scripts speaking the `::out` marker protocol
    #[default]
    Sh,
    /// PowerShell DSC configuration scripts
    Dsc,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Directory asset references resolve against
    #[serde(default)]
    pub assets: Option<PathBuf>,

    /// Staging cache root; a temp-directory default when unset
    #[serde(default)]
    pub cache: Option<PathBuf>,

    #[serde(default)]
    pub dialect: Dialect,
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default, rename = "template")]
    pub templates: Vec<ResourceTemplate>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let mut manifest: Manifest = toml::from_str(&text)
            .with_context(|| format!("parsing manifest {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.settings.assets = manifest
            .settings
            .assets
            .take()
            .map(|assets| resolve_against(base, assets));
        manifest.settings.cache = manifest
            .settings
            .cache
            .take()
            .map(|cache| resolve_against(base, cache));
        Ok(manifest)
    }

    /// Templates to operate on; a key narrows to that single template
    pub fn select(&self, key: Option<&str>) -> Result<Vec<&ResourceTemplate>> {
        let Some(key) = key else {
            return Ok(self.templates.iter().collect());
        };
        match self
            .templates
            .iter()
            .find(|t| t.configuration_key == key)
        {
            Some(template) => Ok(vec![template]),
            None => bail!("manifest has no template with configuration_key '{key}'"),
        }
    }
}

fn resolve_against(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
        [settings]
        assets = "assets"
        dialect = "sh"

        [[template]]
        configuration_key = "site-A"
        script_asset = "scripts::web.sh"

        [[template]]
        configuration_key = "site-B"
        script_path = "/opt/web.sh"
        exists = false
    "#;

    #[test]
    fn parses_settings_and_templates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("converge.toml");
        std::fs::write(&path, MANIFEST).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.settings.dialect, Dialect::Sh);
        // Relative asset directories resolve against the manifest
        assert_eq!(
            manifest.settings.assets.as_deref(),
            Some(dir.path().join("assets").as_path())
        );
        assert_eq!(manifest.templates.len(), 2);
        assert!(manifest.templates[0].exists);
        assert!(!manifest.templates[1].exists);
    }

    #[test]
    fn select_narrows_to_one_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("converge.toml");
        std::fs::write(&path, MANIFEST).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        let all = manifest.select(None).unwrap();
        assert_eq!(all.len(), 2);

        let one = manifest.select(Some("site-B")).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].configuration_key, "site-B");

        assert!(manifest.select(Some("site-C")).is_err());
    }

    #[test]
    fn dialect_defaults_to_sh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("converge.toml");
        std::fs::write(
            &path,
            "[[template]]\nconfiguration_key = \"site-A\"\nscript_path = \"/opt/web.sh\"\n",
        )
        .unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.settings.dialect, Dialect::Sh);
        assert!(manifest.settings.assets.is_none());
    }
}
