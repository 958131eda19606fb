//! Run configuration for the capture demo, read from a JSON file.

use crate::params::{ParamId, ScopeParams};
use crate::util::audio::DEFAULT_SAMPLE_RATE;
use crate::util::signal::Signal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub fn config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("openscope")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub sample_rate: f64,
    /// Frames per processing call.
    pub block_size: usize,
    pub blocks: usize,
    pub channels: usize,
    pub signal: Signal,
    pub dc_offset: f32,
    /// Initial parameter values. Unlisted parameters take their defaults.
    pub params: BTreeMap<ParamId, f32>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: 512,
            blocks: 64,
            channels: 2,
            signal: Signal::default(),
            dc_offset: 0.0,
            params: BTreeMap::new(),
        }
    }
}

impl ScopeConfig {
    /// Reads `path`, or `config.json` in [`config_dir`] when no path is given.
    /// Missing or malformed files fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = path.map_or_else(|| config_dir().join("config.json"), Path::to_path_buf);
        let config: ScopeConfig = match fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s)
                .map_err(|e| warn!("[config] parse error {path:?}: {e}"))
                .unwrap_or_default(),
            Err(e) => {
                debug!("[config] {path:?} not read ({e}), using defaults");
                ScopeConfig::default()
            }
        };
        config.normalized()
    }

    /// Clamps the run shape. Parameter values pass through untouched.
    pub fn normalized(mut self) -> Self {
        if self.sample_rate.is_nan() {
            self.sample_rate = DEFAULT_SAMPLE_RATE;
        }
        self.sample_rate = self.sample_rate.max(1.0);
        self.block_size = self.block_size.max(1);
        self.channels = self.channels.max(1);
        self
    }

    /// Resets `params` to defaults, then sets every listed parameter.
    pub fn apply(&self, params: &ScopeParams) {
        params.restore_defaults();
        for (&id, &value) in &self.params {
            params.set(id, value);
        }
    }
}
