//! Search presets loadable from YAML.
//!
//! A preset names one search family and its parameters; `validate` runs at
//! parse time so a bad file fails before any search is built.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::num::{Prob, Scalar};
use crate::search::sampled_alpha_beta::SampledAlphaBetaConfig;
use crate::search::tree_bandit::{Backprop, TreeBanditConfig};

/// A named search configuration with one section per algorithm family.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPreset {
    pub name: String,
    #[serde(default)]
    pub tree_bandit: Option<TreeBanditPreset>,
    #[serde(default)]
    pub sampled_alpha_beta: Option<SampledAlphaBetaPreset>,
    #[serde(default)]
    pub full_traversal: Option<FullTraversalPreset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeBanditPreset {
    /// Exp3 exploration rate.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    pub iterations: u64,
    #[serde(default = "default_true")]
    pub return_after_expand: bool,
    #[serde(default)]
    pub average_backprop: bool,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampledAlphaBetaPreset {
    pub max_depth: usize,
    #[serde(default)]
    pub min_tries: u32,
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    /// Residual-mass threshold as an exact fraction.
    #[serde(default)]
    pub max_unexplored_num: i64,
    #[serde(default = "default_one")]
    pub max_unexplored_den: i64,
    #[serde(default = "default_true")]
    pub retain_principal: bool,
    #[serde(default = "default_true")]
    pub clamp_unexplored: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FullTraversalPreset {
    pub max_depth: usize,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_gamma() -> f64 {
    0.01
}

fn default_true() -> bool {
    true
}

fn default_threads() -> usize {
    1
}

fn default_max_tries() -> u32 {
    1 << 6
}

fn default_one() -> i64 {
    1
}

impl SearchPreset {
    /// Load a preset from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_yaml(&content)
    }

    /// Parse a preset from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or fails validation.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let preset: Self = serde_yaml::from_str(yaml).map_err(ConfigError::Parse)?;
        preset.validate()?;
        Ok(preset)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tree_bandit.is_none()
            && self.sampled_alpha_beta.is_none()
            && self.full_traversal.is_none()
        {
            return Err(ConfigError::NoAlgorithm(self.name.clone()));
        }
        if let Some(bandit) = &self.tree_bandit {
            if !(bandit.gamma > 0.0 && bandit.gamma <= 1.0) {
                return Err(ConfigError::InvalidGamma(bandit.gamma));
            }
            if bandit.threads == 0 {
                return Err(ConfigError::ZeroThreads);
            }
        }
        if let Some(sampled) = &self.sampled_alpha_beta {
            if sampled.max_tries < sampled.min_tries {
                return Err(ConfigError::TriesOrder {
                    min: sampled.min_tries,
                    max: sampled.max_tries,
                });
            }
            if sampled.max_unexplored_den == 0 {
                return Err(ConfigError::ZeroDenominator);
            }
        }
        if let Some(traversal) = &self.full_traversal {
            if traversal.threads == 0 {
                return Err(ConfigError::ZeroThreads);
            }
        }
        Ok(())
    }
}

impl TreeBanditPreset {
    #[must_use]
    pub fn to_config(&self) -> TreeBanditConfig {
        TreeBanditConfig {
            return_after_expand: self.return_after_expand,
            backprop: if self.average_backprop {
                Backprop::NodeAverage
            } else {
                Backprop::Leaf
            },
        }
    }
}

impl SampledAlphaBetaPreset {
    #[must_use]
    pub fn to_config<R: Scalar>(&self) -> SampledAlphaBetaConfig<R> {
        SampledAlphaBetaConfig {
            min_tries: self.min_tries,
            max_tries: self.max_tries,
            max_unexplored: Prob::new(R::from_fraction(
                self.max_unexplored_num,
                self.max_unexplored_den,
            )),
            retain_principal: self.retain_principal,
            clamp_unexplored: self.clamp_unexplored,
            ..SampledAlphaBetaConfig::default()
        }
    }
}

/// Errors from loading or validating a search preset.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse preset: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error("preset '{0}' configures no algorithm")]
    NoAlgorithm(String),

    #[error("gamma must be in (0, 1], got {0}")]
    InvalidGamma(f64),

    #[error("max_tries {max} below min_tries {min}")]
    TriesOrder { min: u32, max: u32 },

    #[error("max_unexplored denominator must be non-zero")]
    ZeroDenominator,

    #[error("thread count must be positive")]
    ZeroThreads,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Rational;
    use test_macros::timed_test;

    #[timed_test]
    fn tree_bandit_preset_parses() {
        let preset = SearchPreset::from_yaml(
            "name: quick\ntree_bandit:\n  gamma: 0.05\n  iterations: 10000\n",
        )
        .unwrap();
        let bandit = preset.tree_bandit.unwrap();
        assert!((bandit.gamma - 0.05).abs() < 1e-12);
        assert!(bandit.return_after_expand);
        assert_eq!(bandit.threads, 1);
        assert_eq!(bandit.to_config().backprop, Backprop::Leaf);
    }

    #[timed_test]
    fn sampled_preset_builds_exact_threshold() {
        let preset = SearchPreset::from_yaml(
            "name: deep\nsampled_alpha_beta:\n  max_depth: 4\n  min_tries: 4\n  max_tries: 64\n  max_unexplored_num: 1\n  max_unexplored_den: 64\n",
        )
        .unwrap();
        let config: SampledAlphaBetaConfig<Rational> =
            preset.sampled_alpha_beta.unwrap().to_config();
        assert_eq!(config.max_unexplored.get(), Rational::new(1, 64));
        assert!(config.retain_principal);
    }

    #[timed_test]
    fn empty_preset_is_rejected() {
        assert!(matches!(
            SearchPreset::from_yaml("name: hollow\n"),
            Err(ConfigError::NoAlgorithm(_))
        ));
    }

    #[timed_test]
    fn bad_gamma_is_rejected() {
        let result = SearchPreset::from_yaml(
            "name: broken\ntree_bandit:\n  gamma: 1.5\n  iterations: 100\n",
        );
        assert!(matches!(result, Err(ConfigError::InvalidGamma(_))));
    }

    #[timed_test]
    fn inverted_tries_are_rejected() {
        let result = SearchPreset::from_yaml(
            "name: broken\nsampled_alpha_beta:\n  max_depth: 2\n  min_tries: 64\n  max_tries: 4\n",
        );
        assert!(matches!(result, Err(ConfigError::TriesOrder { .. })));
    }
}
