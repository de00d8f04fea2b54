//! Gradient-descent (Madgwick) attitude estimator.
//!
//! Fuses gyroscope rates with the gravity direction measured by the
//! accelerometer. The filter runs at a fixed, configured sample frequency: the
//! integration step is always `1 / sample_freq_hz`, regardless of the actual
//! time elapsed between calls.

use log::debug;
use nalgebra::{Matrix3x4, Quaternion, UnitQuaternion, Vector3, Vector4};

use super::datatypes::{EulerAngles, ImuSample, SkipReason, UpdateStatus};
use crate::{math::linalg::wrap_360, parameters::AhrsParams};

#[derive(Debug, Clone)]
pub struct MadgwickAhrs {
    beta: f64,
    sample_freq_hz: f64,
    quat: Quaternion<f64>,
}

impl MadgwickAhrs {
    pub fn new(beta: f64, sample_freq_hz: f64) -> Self {
        Self {
            beta,
            sample_freq_hz,
            quat: Quaternion::identity(),
        }
    }

    pub fn from_params(params: &AhrsParams) -> Self {
        Self::new(params.beta, params.sample_freq_hz)
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn sample_freq_hz(&self) -> f64 {
        self.sample_freq_hz
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::new_unchecked(self.quat)
    }

    /// Back to the identity orientation.
    pub fn reset(&mut self) {
        self.quat = Quaternion::identity();
    }

    pub fn update_sample(&mut self, sample: &ImuSample) -> UpdateStatus {
        self.update(
            &sample.angvel_deg_s,
            &sample.accel_m_s2,
            sample.mag_field.as_ref(),
        )
    }

    /// Runs one filter iteration.
    ///
    /// The magnetometer reading is accepted but does not contribute to the
    /// estimate. When the accelerometer or the resulting gradient has zero
    /// norm the orientation is left untouched, gyroscope integration
    /// included, and the returned status says so.
    pub fn update(
        &mut self,
        angvel_deg_s: &Vector3<f64>,
        accel_m_s2: &Vector3<f64>,
        _mag_field: Option<&Vector3<f64>>,
    ) -> UpdateStatus {
        let angvel_rad_s = angvel_deg_s.map(f64::to_radians);

        let acc_norm = accel_m_s2.norm();
        // NaN readings fail this test as well
        if !(acc_norm > 0.0) {
            debug!("AHRS update skipped: accelerometer norm {acc_norm}");
            return UpdateStatus::Skipped(SkipReason::ZeroAccel);
        }
        let acc_dir = accel_m_s2 / acc_norm;

        let grad = gravity_gradient(&self.quat, &acc_dir);
        let grad_norm = grad.norm();
        if !(grad_norm > 0.0) {
            debug!("AHRS update skipped: zero gradient");
            return UpdateStatus::Skipped(SkipReason::ZeroGradient);
        }
        let step = grad / grad_norm;

        let mut q = self.quat - Quaternion::new(step[0], step[1], step[2], step[3]) * self.beta;

        let omega = Quaternion::from_imag(angvel_rad_s);
        let q_dot = (q * omega) * 0.5;
        q += q_dot * (1.0 / self.sample_freq_hz);

        self.quat = q.normalize();

        UpdateStatus::Applied
    }

    pub fn euler(&self) -> EulerAngles {
        euler_from_quaternion(&self.quat)
    }
}

/// Gradient of `½‖f(q, a)‖²`, where `f` is the difference between the gravity
/// direction predicted by `q` and the measured one. Components are ordered
/// `(w, x, y, z)`.
fn gravity_gradient(q: &Quaternion<f64>, acc_dir: &Vector3<f64>) -> Vector4<f64> {
    let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);

    let f = Vector3::new(
        2.0 * (q1 * q3 - q0 * q2) - acc_dir[0],
        2.0 * (q0 * q1 + q2 * q3) - acc_dir[1],
        2.0 * (0.5 - q1 * q1 - q2 * q2) - acc_dir[2],
    );

    #[rustfmt::skip]
    let jac = Matrix3x4::new(
        -2.0 * q2, 2.0 * q3,  -2.0 * q0, 2.0 * q1,
         2.0 * q1, 2.0 * q0,   2.0 * q3, 2.0 * q2,
         0.0,      -4.0 * q1, -4.0 * q2, 0.0,
    );

    jac.transpose() * f
}

/// ZYX Euler angles, in degrees. Yaw is wrapped into `[0, 360)`.
pub fn euler_from_quaternion(q: &Quaternion<f64>) -> EulerAngles {
    let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);

    let roll = f64::atan2(2.0 * (q0 * q1 + q2 * q3), 1.0 - 2.0 * (q1 * q1 + q2 * q2));
    // Drift can push the argument slightly out of the asin domain
    let pitch = f64::asin((2.0 * (q0 * q2 - q3 * q1)).clamp(-1.0, 1.0));
    let yaw = f64::atan2(2.0 * (q0 * q3 + q1 * q2), 1.0 - 2.0 * (q2 * q2 + q3 * q3));

    EulerAngles {
        yaw_deg: wrap_360(yaw.to_degrees()),
        pitch_deg: pitch.to_degrees(),
        roll_deg: roll.to_degrees(),
    }
}
