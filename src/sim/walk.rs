//! Synthetic pedestrian walk, used to exercise the estimators end to end.
//!
//! The walker follows a piecewise straight path. Every step is reported with
//! the nominal step length and a heading offset by a constant bias plus white
//! noise, while the true displacement is scaled by `SimParams::scale`.
//! Absolute fixes are the true position plus Gaussian noise, converted to
//! geodetic coordinates on the WGS84 ellipsoid.

use log::{debug, info};
use map_3d::{Ellipsoid, ned2geodetic};
use nalgebra::Vector2;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, NormalError};
use rand_xoshiro::Xoshiro256StarStar;
use serde::Serialize;
use thiserror::Error;

use crate::{
    common::Timestamped,
    nav::{
        NavEvent, Navigator,
        datatypes::{GeodeticPoint, GpsFix},
        projection,
    },
    parameters::{self, Parameters, SimParams},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid walk parameters")]
    Invalid(#[from] parameters::Error),

    #[error("Invalid noise distribution")]
    Distribution(#[from] NormalError),

    #[error("Navigator rejected a simulated event")]
    Projection(#[from] projection::Error),
}

#[derive(Debug, Clone)]
pub struct WalkTrace {
    pub origin: GeodeticPoint,
    pub events: Vec<Timestamped<NavEvent>>,
    /// True local position after every step
    pub truth: Vec<Timestamped<Vector2<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimReport {
    pub steps: usize,
    pub fixes_applied: usize,
    pub final_error_m: f64,
    pub rms_error_m: f64,
    pub max_error_m: f64,
    pub estimated_bias_rad: f64,
    pub estimated_scale: f64,
}

pub fn generate(params: &SimParams) -> Result<WalkTrace, Error> {
    params.validate()?;

    let mut rng = Xoshiro256StarStar::seed_from_u64(params.seed);
    let heading_noise = Normal::new(0.0, params.heading_noise_rad)?;
    let fix_noise = Normal::new(0.0, params.fix_accuracy_m)?;

    let origin = GeodeticPoint::new(params.origin_lat_deg, params.origin_lon_deg);

    let mut events = vec![Timestamped::new(0.0, NavEvent::Origin(origin))];
    let mut truth = vec![];

    let mut pos = Vector2::<f64>::zeros();
    let mut heading = 0.0f64;

    for i in 0..params.num_steps {
        let t = (i + 1) as f64 * params.step_period_s;

        if params.turn_every_n_steps > 0 && i > 0 && i % params.turn_every_n_steps == 0 {
            heading += params.turn_rad;
        }

        let (sin, cos) = heading.sin_cos();
        pos += Vector2::new(cos, sin) * params.step_length_m * params.scale;
        truth.push(Timestamped::new(t, pos));

        events.push(Timestamped::new(
            t,
            NavEvent::Step {
                length_m: params.step_length_m,
                heading_rad: Some(
                    heading - params.heading_bias_rad + heading_noise.sample(&mut rng),
                ),
            },
        ));

        if (i + 1) % params.fix_every_n_steps == 0 {
            let east = pos[0] + fix_noise.sample(&mut rng);
            let north = pos[1] + fix_noise.sample(&mut rng);

            let (lat, lon, _) = ned2geodetic(
                north,
                east,
                0.0,
                origin.lat_deg.to_radians(),
                origin.lon_deg.to_radians(),
                0.0,
                Ellipsoid::WGS84,
            );

            events.push(Timestamped::new(
                t,
                NavEvent::Fix(GpsFix {
                    pos: GeodeticPoint::new(lat.to_degrees(), lon.to_degrees()),
                    accuracy_m: params.fix_accuracy_m,
                }),
            ));
        }
    }

    debug!(
        "Generated walk with {} events, final position {:?}",
        events.len(),
        pos
    );

    Ok(WalkTrace {
        origin,
        events,
        truth,
    })
}

/// Generates a walk from `params.sim` and runs it through a fresh navigator.
///
/// Errors are sampled once all the events sharing a timestamp (a step and
/// possibly a fix) have been handled.
pub fn run(params: &Parameters) -> Result<SimReport, Error> {
    let trace = generate(&params.sim)?;
    let mut nav = Navigator::new(params);

    let mut errors_m = vec![];
    let mut events = trace.events.into_iter().peekable();

    while let Some(event) = events.next() {
        let t = event.t;
        nav.handle(event)?;

        let last_at_t = events.peek().is_none_or(|next| next.t > t);
        let steps = nav.stats().steps;
        if last_at_t && steps > 0 {
            let truth = trace.truth[steps - 1].v;
            errors_m.push((nav.ekf().position_m() - truth).norm());
        }
    }

    let state = nav.ekf().state();
    let stats = nav.stats();
    let report = SimReport {
        steps: stats.steps,
        fixes_applied: stats.fixes_applied,
        final_error_m: errors_m.last().copied().unwrap_or(0.0),
        rms_error_m: if errors_m.is_empty() {
            0.0
        } else {
            (errors_m.iter().map(|e| e * e).sum::<f64>() / errors_m.len() as f64).sqrt()
        },
        max_error_m: errors_m.iter().copied().fold(0.0, f64::max),
        estimated_bias_rad: state.theta_bias_rad,
        estimated_scale: state.scale,
    };

    info!(
        "Simulated {} steps: final error {:.2} m, rms {:.2} m, bias {:.3} rad, scale {:.3}",
        report.steps,
        report.final_error_m,
        report.rms_error_m,
        report.estimated_bias_rad,
        report.estimated_scale
    );

    Ok(report)
}
