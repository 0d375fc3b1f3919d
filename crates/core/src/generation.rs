//! SteadyDancer generation parameters.
//!
//! [`GenerationConfig`] is the full set of knobs forwarded to the worker.
//! Experiments store one as their default config; job creation merges
//! request-level [`GenerationOverrides`] on top and freezes the result as
//! the job's `params` snapshot. The snapshot is never mutated afterwards,
//! so a job stays reproducible even if its experiment's config is edited
//! later.

use serde::{Deserialize, Serialize};

/// Default output resolution, e.g. `1024*576`.
pub const DEFAULT_SIZE: &str = "1024*576";

/// Default frame count. Upstream requires 4n+1.
pub const DEFAULT_FRAME_NUM: i32 = 81;

/// Default CFG scale for sampling.
pub const DEFAULT_SAMPLE_GUIDE_SCALE: f64 = 5.0;

/// Default CFG scale for the condition.
pub const DEFAULT_CONDITION_GUIDE_SCALE: f64 = 1.0;

/// Default end config for negative condition guidance.
pub const DEFAULT_END_COND_CFG: f64 = 0.4;

/// Default base seed; -1 means "random seed" upstream.
pub const DEFAULT_BASE_SEED: i64 = -1;

fn default_size() -> String {
    DEFAULT_SIZE.to_string()
}

fn default_frame_num() -> i32 {
    DEFAULT_FRAME_NUM
}

fn default_sample_guide_scale() -> f64 {
    DEFAULT_SAMPLE_GUIDE_SCALE
}

fn default_condition_guide_scale() -> f64 {
    DEFAULT_CONDITION_GUIDE_SCALE
}

fn default_end_cond_cfg() -> f64 {
    DEFAULT_END_COND_CFG
}

fn default_base_seed() -> i64 {
    DEFAULT_BASE_SEED
}

/// Resolved generation parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Optional prompt override; the worker falls back to the pair_dir's
    /// `prompt.txt` when unset.
    #[serde(default)]
    pub prompt_override: Option<String>,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_frame_num")]
    pub frame_num: i32,
    #[serde(default = "default_sample_guide_scale")]
    pub sample_guide_scale: f64,
    #[serde(default = "default_condition_guide_scale")]
    pub condition_guide_scale: f64,
    #[serde(default = "default_end_cond_cfg")]
    pub end_cond_cfg: f64,
    #[serde(default = "default_base_seed")]
    pub base_seed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_steps: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_shift: Option<f64>,
    /// Sampling solver, e.g. `unipc` or `dpm++`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_solver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offload_model: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuda_visible_devices: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            prompt_override: None,
            size: default_size(),
            frame_num: DEFAULT_FRAME_NUM,
            sample_guide_scale: DEFAULT_SAMPLE_GUIDE_SCALE,
            condition_guide_scale: DEFAULT_CONDITION_GUIDE_SCALE,
            end_cond_cfg: DEFAULT_END_COND_CFG,
            base_seed: DEFAULT_BASE_SEED,
            sample_steps: None,
            sample_shift: None,
            sample_solver: None,
            offload_model: None,
            cuda_visible_devices: None,
        }
    }
}

/// Request-level parameter overrides. Every field is optional; unset
/// fields keep the base config's value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationOverrides {
    pub prompt_override: Option<String>,
    pub size: Option<String>,
    pub frame_num: Option<i32>,
    pub sample_guide_scale: Option<f64>,
    pub condition_guide_scale: Option<f64>,
    pub end_cond_cfg: Option<f64>,
    pub base_seed: Option<i64>,
    pub sample_steps: Option<i32>,
    pub sample_shift: Option<f64>,
    pub sample_solver: Option<String>,
    pub offload_model: Option<bool>,
    pub cuda_visible_devices: Option<String>,
}

impl GenerationConfig {
    /// Produce a new config with `overrides` applied on top of `self`.
    /// `self` is left untouched.
    pub fn apply(&self, overrides: &GenerationOverrides) -> GenerationConfig {
        let mut merged = self.clone();
        if let Some(v) = &overrides.prompt_override {
            merged.prompt_override = Some(v.clone());
        }
        if let Some(v) = &overrides.size {
            merged.size = v.clone();
        }
        if let Some(v) = overrides.frame_num {
            merged.frame_num = v;
        }
        if let Some(v) = overrides.sample_guide_scale {
            merged.sample_guide_scale = v;
        }
        if let Some(v) = overrides.condition_guide_scale {
            merged.condition_guide_scale = v;
        }
        if let Some(v) = overrides.end_cond_cfg {
            merged.end_cond_cfg = v;
        }
        if let Some(v) = overrides.base_seed {
            merged.base_seed = v;
        }
        if let Some(v) = overrides.sample_steps {
            merged.sample_steps = Some(v);
        }
        if let Some(v) = overrides.sample_shift {
            merged.sample_shift = Some(v);
        }
        if let Some(v) = &overrides.sample_solver {
            merged.sample_solver = Some(v.clone());
        }
        if let Some(v) = overrides.offload_model {
            merged.offload_model = Some(v);
        }
        if let Some(v) = &overrides.cuda_visible_devices {
            merged.cuda_visible_devices = Some(v.clone());
        }
        merged
    }
}
