use std::fmt;

use nalgebra::{Vector3, Vector4};
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeodeticPoint {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }
}

/// A detected step, produced by an upstream step detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub length_m: f64,
    /// Measured heading, not yet corrected for the estimated bias.
    pub heading_rad: f64,
}

/// An absolute position fix, e.g. from a GPS receiver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub pos: GeodeticPoint,
    /// Isotropic 1-sigma horizontal accuracy.
    pub accuracy_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImuSample {
    pub angvel_deg_s: Vector3<f64>,
    pub accel_m_s2: Vector3<f64>,
    /// Accepted for interface completeness, never used by the estimator.
    pub mag_field: Option<Vector3<f64>>,
}

/// Full estimator state: planar position, heading bias and step scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdrState {
    pub x_m: f64,
    pub y_m: f64,
    pub theta_bias_rad: f64,
    pub scale: f64,
}

impl From<&Vector4<f64>> for PdrState {
    fn from(v: &Vector4<f64>) -> Self {
        Self {
            x_m: v[0],
            y_m: v[1],
            theta_bias_rad: v[2],
            scale: v[3],
        }
    }
}

impl From<PdrState> for Vector4<f64> {
    fn from(s: PdrState) -> Self {
        Vector4::new(s.x_m, s.y_m, s.theta_bias_rad, s.scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    /// In `[0, 360)`
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

/// Why an update left the estimator untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    OriginNotSet,
    InvalidStep,
    InvalidFix,
    SingularInnovation,
    ZeroAccel,
    ZeroGradient,
}

/// Outcome of an estimator update that is allowed to be a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStatus {
    Applied,
    Skipped(SkipReason),
}

impl UpdateStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateStatus::Applied)
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStatus::Applied => f.write_str("applied"),
            UpdateStatus::Skipped(reason) => write!(f, "skipped:{reason}"),
        }
    }
}
