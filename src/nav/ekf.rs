//! Step-based dead reckoning EKF.
//!
//! State vector: `[x, y, theta_bias, scale]`, with `x`/`y` in meters in the
//! local east/north frame of the owned [`LocalProjection`]. Steps propagate
//! the position along the bias-corrected heading, absolute fixes observe the
//! position directly.

use log::debug;
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Matrix4x2, Vector2, Vector4, matrix};

use super::{
    datatypes::{GeodeticPoint, GpsFix, PdrState, SkipReason, StepEvent, UpdateStatus},
    projection::{self, LocalProjection},
};
use crate::{
    math::linalg::{det_2x2, inverse_2x2, symmetrize},
    parameters::{CovarianceUpdate, EkfParams},
};

const IX: usize = 0;
const IY: usize = 1;
const ITHETA: usize = 2;
const ISCALE: usize = 3;

/// Position observation model
const H: Matrix2x4<f64> = matrix![
    1.0, 0.0, 0.0, 0.0;
    0.0, 1.0, 0.0, 0.0
];

#[derive(Debug, Clone)]
pub struct PdrEkf {
    state: Vector4<f64>,
    cov: Matrix4<f64>,
    process_noise: Matrix4<f64>,
    singular_threshold: f64,
    covariance_update: CovarianceUpdate,
    projection: LocalProjection,
}

impl Default for PdrEkf {
    fn default() -> Self {
        Self::new(&EkfParams::default())
    }
}

impl PdrEkf {
    pub fn new(params: &EkfParams) -> Self {
        Self {
            state: Vector4::new(0.0, 0.0, 0.0, 1.0),
            cov: Matrix4::identity() * params.initial_variance,
            process_noise: Matrix4::from_diagonal(&Vector4::from(params.process_noise)),
            singular_threshold: params.singular_threshold,
            covariance_update: params.covariance_update,
            projection: LocalProjection::new(),
        }
    }

    /// Anchors the local frame. Fixes are ignored until this succeeds.
    pub fn set_origin(&mut self, origin: GeodeticPoint) -> Result<(), projection::Error> {
        self.projection.set_origin(origin)
    }

    pub fn is_ready(&self) -> bool {
        self.projection.is_anchored()
    }

    pub fn projection(&self) -> &LocalProjection {
        &self.projection
    }

    /// Propagates the state by one step. A zero length step still inflates
    /// the covariance by the process noise. Steps with a non finite length or
    /// heading are skipped, leaving state and covariance untouched.
    pub fn predict_step(&mut self, step: &StepEvent) -> UpdateStatus {
        if !step.length_m.is_finite() || !step.heading_rad.is_finite() {
            debug!("Step ignored: not finite {step:?}");
            return UpdateStatus::Skipped(SkipReason::InvalidStep);
        }

        let len = step.length_m;
        let scale = self.state[ISCALE];
        let (sin, cos) = (step.heading_rad + self.state[ITHETA]).sin_cos();

        self.state[IX] += len * scale * cos;
        self.state[IY] += len * scale * sin;

        let mut f = Matrix4::<f64>::identity();
        f[(IX, ITHETA)] = -len * scale * sin;
        f[(IX, ISCALE)] = len * cos;
        f[(IY, ITHETA)] = len * scale * cos;
        f[(IY, ISCALE)] = len * sin;

        self.cov = f * self.cov * f.transpose() + self.process_noise;

        UpdateStatus::Applied
    }

    /// Corrects the state with an absolute position fix.
    ///
    /// Skipped, leaving state and covariance untouched, when the origin is not
    /// set, when the fix is not finite, or when the innovation covariance is
    /// (numerically) singular.
    pub fn update_gps(&mut self, fix: &GpsFix) -> UpdateStatus {
        let pos_m = match self.projection.geodetic_to_local(&fix.pos) {
            Ok(pos_m) => pos_m,
            Err(_) => {
                debug!("Fix ignored: origin not set");
                return UpdateStatus::Skipped(SkipReason::OriginNotSet);
            }
        };

        let variance = fix.accuracy_m.powi(2);
        if !pos_m.iter().all(|v| v.is_finite()) || !variance.is_finite() {
            debug!("Fix ignored: not finite {fix:?}");
            return UpdateStatus::Skipped(SkipReason::InvalidFix);
        }

        let innovation: Vector2<f64> = pos_m - H * self.state;
        let meas_cov = Matrix2::from_diagonal_element(variance);

        let s = H * self.cov * H.transpose() + meas_cov;
        let det = det_2x2(&s);
        if !(det.abs() >= self.singular_threshold) {
            debug!("Fix ignored: singular innovation covariance (det = {det:e})");
            return UpdateStatus::Skipped(SkipReason::SingularInnovation);
        }

        let gain: Matrix4x2<f64> = self.cov * H.transpose() * inverse_2x2(&s, det);

        self.state += gain * innovation;

        let ikh = Matrix4::identity() - gain * H;
        self.cov = match self.covariance_update {
            CovarianceUpdate::Standard => ikh * self.cov,
            CovarianceUpdate::Joseph => symmetrize(
                &(ikh * self.cov * ikh.transpose() + gain * meas_cov * gain.transpose()),
            ),
        };

        UpdateStatus::Applied
    }

    pub fn state(&self) -> PdrState {
        PdrState::from(&self.state)
    }

    pub fn state_vector(&self) -> &Vector4<f64> {
        &self.state
    }

    pub fn covariance(&self) -> &Matrix4<f64> {
        &self.cov
    }

    /// Local east/north position
    pub fn position_m(&self) -> Vector2<f64> {
        Vector2::new(self.state[IX], self.state[IY])
    }

    pub fn lat_lon(&self) -> Result<GeodeticPoint, projection::Error> {
        self.projection.local_to_geodetic(&self.position_m())
    }
}
