use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error reading parameter file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error deserializing parameters")]
    Deserialize(#[from] toml::de::Error),

    #[error("Invalid parameter '{path}': {reason}")]
    Invalid { path: String, reason: String },
}

/// Form of the covariance correction after an absolute fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CovarianceUpdate {
    /// `P ← (I − KH)·P`
    Standard,
    /// `P ← (I − KH)·P·(I − KH)ᵀ + K·R·Kᵀ`
    #[default]
    Joseph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AhrsParams {
    pub beta: f64,
    pub sample_freq_hz: f64,
}

impl Default for AhrsParams {
    fn default() -> Self {
        Self {
            beta: 0.1,
            sample_freq_hz: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EkfParams {
    /// Diagonal of the initial covariance
    pub initial_variance: f64,
    /// Diagonal of Q, ordered x, y, theta_bias, scale
    pub process_noise: [f64; 4],
    /// Fixes whose innovation covariance determinant is below this are ignored
    pub singular_threshold: f64,
    pub covariance_update: CovarianceUpdate,
}

impl Default for EkfParams {
    fn default() -> Self {
        Self {
            initial_variance: 0.5,
            process_noise: [0.01; 4],
            singular_threshold: 1e-9,
            covariance_update: CovarianceUpdate::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimParams {
    pub seed: u64,
    pub num_steps: usize,
    pub step_length_m: f64,
    pub step_period_s: f64,
    pub fix_every_n_steps: usize,
    pub fix_accuracy_m: f64,
    /// Constant error added to every measured heading
    pub heading_bias_rad: f64,
    pub heading_noise_rad: f64,
    /// Ratio between the true and the nominal step length
    pub scale: f64,
    pub turn_every_n_steps: usize,
    pub turn_rad: f64,
    pub origin_lat_deg: f64,
    pub origin_lon_deg: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            seed: 0,
            num_steps: 600,
            step_length_m: 0.7,
            step_period_s: 0.5,
            fix_every_n_steps: 10,
            fix_accuracy_m: 5.0,
            heading_bias_rad: 0.1,
            heading_noise_rad: 0.05,
            scale: 1.1,
            turn_every_n_steps: 100,
            turn_rad: std::f64::consts::FRAC_PI_2,
            origin_lat_deg: 35.0,
            origin_lon_deg: 140.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    pub ahrs: AhrsParams,
    pub ekf: EkfParams,
    pub sim: SimParams,
}

impl Parameters {
    pub fn from_toml(toml: &str) -> Result<Self, Error> {
        let params: Parameters = toml::from_str(toml)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let toml = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml(&toml)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |path: &str, reason: &str| {
            Err(Error::Invalid {
                path: path.to_string(),
                reason: reason.to_string(),
            })
        };

        if !(self.ahrs.beta >= 0.0) {
            return invalid("ahrs.beta", "must be non negative");
        }
        if !(self.ahrs.sample_freq_hz > 0.0) {
            return invalid("ahrs.sample_freq_hz", "must be positive");
        }
        if !(self.ekf.initial_variance > 0.0) {
            return invalid("ekf.initial_variance", "must be positive");
        }
        if self.ekf.process_noise.iter().any(|q| !(*q >= 0.0)) {
            return invalid("ekf.process_noise", "must be non negative");
        }
        if !(self.ekf.singular_threshold >= 0.0) {
            return invalid("ekf.singular_threshold", "must be non negative");
        }

        self.sim.validate()
    }
}

impl SimParams {
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |path: &str, reason: &str| {
            Err(Error::Invalid {
                path: format!("sim.{path}"),
                reason: reason.to_string(),
            })
        };

        if self.fix_every_n_steps == 0 {
            return invalid("fix_every_n_steps", "must be at least 1");
        }
        if !(self.fix_accuracy_m > 0.0) {
            return invalid("fix_accuracy_m", "must be positive");
        }
        if !(self.heading_noise_rad >= 0.0) {
            return invalid("heading_noise_rad", "must be non negative");
        }
        if !(self.step_length_m >= 0.0) {
            return invalid("step_length_m", "must be non negative");
        }
        if !(self.step_period_s > 0.0) {
            return invalid("step_period_s", "must be positive");
        }

        Ok(())
    }
}
