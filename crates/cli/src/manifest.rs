//! Run manifest: which files feed which layer, plus the cost configuration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use skiroute_cost::{CostSurfaceConfig, MaskLayer, RawLayer};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunManifest {
    /// Raw layer inputs; relative paths resolve against the manifest directory
    pub rasters: BTreeMap<RawLayer, PathBuf>,
    #[serde(default)]
    pub masks: BTreeMap<MaskLayer, PathBuf>,
    /// Omitted: the default configuration
    #[serde(default)]
    pub cost_surface: Option<CostSurfaceConfig>,
}

impl RunManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read manifest {}", path.display()))?;
        let mut manifest: RunManifest = serde_json::from_str(&text)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for file in manifest.rasters.values_mut().chain(manifest.masks.values_mut()) {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
        Ok(manifest)
    }

    /// The configuration to run with, validated
    pub fn config(&self) -> Result<CostSurfaceConfig> {
        let config = self.cost_surface.clone().unwrap_or_default();
        config.validate().context("Invalid cost_surface configuration")?;
        Ok(config)
    }
}
