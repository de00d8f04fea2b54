use log::{debug, warn};
use serde::Serialize;

use super::{
    ahrs::MadgwickAhrs,
    datatypes::{EulerAngles, GeodeticPoint, GpsFix, ImuSample, PdrState, StepEvent, UpdateStatus},
    ekf::PdrEkf,
    projection,
};
use crate::{common::Timestamped, parameters::Parameters};

#[derive(Debug, Clone, PartialEq)]
pub enum NavEvent {
    Origin(GeodeticPoint),
    Imu(ImuSample),
    /// A detected step. Without an explicit heading, the current yaw of the
    /// attitude estimator is used.
    Step {
        length_m: f64,
        heading_rad: Option<f64>,
    },
    Fix(GpsFix),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavOutcome {
    OriginSet,
    Orientation(UpdateStatus),
    Predicted(StepEvent, UpdateStatus),
    Corrected(UpdateStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NavStats {
    pub imu_applied: usize,
    pub imu_skipped: usize,
    pub steps: usize,
    pub steps_skipped: usize,
    pub fixes_applied: usize,
    pub fixes_skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NavSnapshot {
    pub t: f64,
    pub state: PdrState,
    pub lat_lon: Option<GeodeticPoint>,
    pub euler: EulerAngles,
}

/// Drives an attitude estimator and a position estimator from a single,
/// serialized stream of sensor events.
///
/// The two estimators do not know about each other: the navigator samples the
/// attitude yaw when a step arrives and hands it to the EKF as the measured
/// heading.
#[derive(Debug, Clone)]
pub struct Navigator {
    ahrs: MadgwickAhrs,
    ekf: PdrEkf,
    stats: NavStats,
    last_t: Option<f64>,
}

impl Navigator {
    pub fn new(params: &Parameters) -> Self {
        Self::from_parts(
            MadgwickAhrs::from_params(&params.ahrs),
            PdrEkf::new(&params.ekf),
        )
    }

    pub fn from_parts(ahrs: MadgwickAhrs, ekf: PdrEkf) -> Self {
        Self {
            ahrs,
            ekf,
            stats: NavStats::default(),
            last_t: None,
        }
    }

    pub fn ahrs(&self) -> &MadgwickAhrs {
        &self.ahrs
    }

    pub fn ekf(&self) -> &PdrEkf {
        &self.ekf
    }

    pub fn stats(&self) -> NavStats {
        self.stats
    }

    /// Heading handed to the EKF when a step has no explicit one
    pub fn ahrs_heading_rad(&self) -> f64 {
        self.ahrs.euler().yaw_deg.to_radians()
    }

    pub fn handle(&mut self, event: Timestamped<NavEvent>) -> Result<NavOutcome, projection::Error> {
        let Timestamped { t, v: event } = event;

        if let Some(last_t) = self.last_t {
            if t < last_t {
                warn!("Event at t={t:.3} s is older than the previous one (t={last_t:.3} s)");
            }
        }
        self.last_t = Some(t);

        let outcome = match event {
            NavEvent::Origin(origin) => {
                self.ekf.set_origin(origin)?;
                NavOutcome::OriginSet
            }
            NavEvent::Imu(sample) => {
                let status = self.ahrs.update_sample(&sample);
                if status.is_applied() {
                    self.stats.imu_applied += 1;
                } else {
                    self.stats.imu_skipped += 1;
                }
                NavOutcome::Orientation(status)
            }
            NavEvent::Step {
                length_m,
                heading_rad,
            } => {
                let step = StepEvent {
                    length_m,
                    heading_rad: heading_rad.unwrap_or_else(|| self.ahrs_heading_rad()),
                };
                let status = self.ekf.predict_step(&step);
                if status.is_applied() {
                    self.stats.steps += 1;
                } else {
                    debug!("Step at t={t:.3} s {status}");
                    self.stats.steps_skipped += 1;
                }
                NavOutcome::Predicted(step, status)
            }
            NavEvent::Fix(fix) => {
                let status = self.ekf.update_gps(&fix);
                if status.is_applied() {
                    self.stats.fixes_applied += 1;
                } else {
                    debug!("Fix at t={t:.3} s {status}");
                    self.stats.fixes_skipped += 1;
                }
                NavOutcome::Corrected(status)
            }
        };

        Ok(outcome)
    }

    pub fn snapshot(&self) -> NavSnapshot {
        NavSnapshot {
            t: self.last_t.unwrap_or(0.0),
            state: self.ekf.state(),
            lat_lon: self.ekf.lat_lon().ok(),
            euler: self.ahrs.euler(),
        }
    }
}
