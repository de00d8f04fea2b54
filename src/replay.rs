//! Replays a CSV sensor log through a [`Navigator`].
//!
//! Input columns (header required, unused cells left empty):
//! `time_s,kind,gx,gy,gz,ax,ay,az,length_m,heading_rad,lat,lon,accuracy_m`,
//! with optional `mx,my,mz`. `kind` is one of `origin`, `imu`, `step`, `fix`.
//! Gyroscope rates are in deg/s, accelerations in m/s².
//!
//! One output row is written for every step and every fix.

use std::io;

use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::{
    common::Timestamped,
    nav::{
        NavEvent, NavOutcome, Navigator,
        datatypes::{GeodeticPoint, GpsFix, ImuSample},
        navigator::NavStats,
        projection,
    },
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error reading or writing csv")]
    Csv(#[from] csv::Error),

    #[error("Line {line}: missing field '{field}' in '{kind}' record")]
    MissingField {
        line: u64,
        kind: RecordKind,
        field: &'static str,
    },

    #[error("Line {line}: cannot process event")]
    Projection {
        line: u64,
        #[source]
        source: projection::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecordKind {
    Origin,
    Imu,
    Step,
    Fix,
}

#[derive(Debug, Clone, Deserialize)]
struct LogRecord {
    time_s: f64,
    kind: RecordKind,
    #[serde(default)]
    gx: Option<f64>,
    #[serde(default)]
    gy: Option<f64>,
    #[serde(default)]
    gz: Option<f64>,
    #[serde(default)]
    ax: Option<f64>,
    #[serde(default)]
    ay: Option<f64>,
    #[serde(default)]
    az: Option<f64>,
    #[serde(default)]
    mx: Option<f64>,
    #[serde(default)]
    my: Option<f64>,
    #[serde(default)]
    mz: Option<f64>,
    #[serde(default)]
    length_m: Option<f64>,
    #[serde(default)]
    heading_rad: Option<f64>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    accuracy_m: Option<f64>,
}

impl LogRecord {
    fn into_event(self, line: u64) -> Result<Timestamped<NavEvent>, Error> {
        let kind = self.kind;
        let require = |value: Option<f64>, field: &'static str| {
            value.ok_or(Error::MissingField { line, kind, field })
        };

        let event = match kind {
            RecordKind::Origin => NavEvent::Origin(GeodeticPoint::new(
                require(self.lat, "lat")?,
                require(self.lon, "lon")?,
            )),
            RecordKind::Imu => {
                let mag_field = match (self.mx, self.my, self.mz) {
                    (Some(x), Some(y), Some(z)) => Some(Vector3::new(x, y, z)),
                    _ => None,
                };

                NavEvent::Imu(ImuSample {
                    angvel_deg_s: Vector3::new(
                        require(self.gx, "gx")?,
                        require(self.gy, "gy")?,
                        require(self.gz, "gz")?,
                    ),
                    accel_m_s2: Vector3::new(
                        require(self.ax, "ax")?,
                        require(self.ay, "ay")?,
                        require(self.az, "az")?,
                    ),
                    mag_field,
                })
            }
            RecordKind::Step => NavEvent::Step {
                length_m: require(self.length_m, "length_m")?,
                heading_rad: self.heading_rad,
            },
            RecordKind::Fix => NavEvent::Fix(GpsFix {
                pos: GeodeticPoint::new(require(self.lat, "lat")?, require(self.lon, "lon")?),
                accuracy_m: require(self.accuracy_m, "accuracy_m")?,
            }),
        };

        Ok(Timestamped::new(self.time_s, event))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayRow {
    pub time_s: f64,
    pub kind: RecordKind,
    pub status: String,
    pub x_m: f64,
    pub y_m: f64,
    pub theta_bias_rad: f64,
    pub scale: f64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub yaw_deg: f64,
}

fn csv_reader<R: io::Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input)
}

/// Parses a whole log, with the line each event comes from.
pub fn parse_events<R: io::Read>(input: R) -> Result<Vec<(u64, Timestamped<NavEvent>)>, Error> {
    let mut reader = csv_reader(input);
    let headers = reader.headers()?.clone();

    let mut events = vec![];
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let log_record: LogRecord = record.deserialize(Some(&headers))?;

        events.push((line, log_record.into_event(line)?));
    }

    Ok(events)
}

/// Feeds every event of the log to `nav`, writing one row per step and fix.
pub fn replay<R: io::Read, W: io::Write>(
    nav: &mut Navigator,
    input: R,
    output: W,
) -> Result<NavStats, Error> {
    let events = parse_events(input)?;
    let mut writer = csv::Writer::from_writer(output);

    info!("Replaying {} events", events.len());

    for (line, event) in events {
        let outcome = nav
            .handle(event)
            .map_err(|source| Error::Projection { line, source })?;

        let (kind, status) = match outcome {
            NavOutcome::Predicted(_, status) => (RecordKind::Step, status.to_string()),
            NavOutcome::Corrected(status) => (RecordKind::Fix, status.to_string()),
            NavOutcome::OriginSet | NavOutcome::Orientation(_) => continue,
        };

        let snapshot = nav.snapshot();
        writer.serialize(ReplayRow {
            time_s: snapshot.t,
            kind,
            status,
            x_m: snapshot.state.x_m,
            y_m: snapshot.state.y_m,
            theta_bias_rad: snapshot.state.theta_bias_rad,
            scale: snapshot.state.scale,
            lat: snapshot.lat_lon.map(|p| p.lat_deg),
            lon: snapshot.lat_lon.map(|p| p.lon_deg),
            yaw_deg: snapshot.euler.yaw_deg,
        })?;
    }

    writer.flush().map_err(csv::Error::from)?;

    let stats = nav.stats();
    info!(
        "Replay done: {} steps, {} fixes applied, {} fixes skipped",
        stats.steps, stats.fixes_applied, stats.fixes_skipped
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Parameters;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "time_s,kind,gx,gy,gz,ax,ay,az,length_m,heading_rad,lat,lon,accuracy_m\n";

    #[test]
    fn test_parse_events() {
        let log = format!(
            "{HEADER}\
             0.0,origin,,,,,,,,,35.0,140.0,\n\
             0.01,imu,0.0,0.0,10.0,0.1,0.0,9.8,,,,,\n\
             0.5,step,,,,,,,0.7,,,,\n\
             0.6,step,,,,,,,0.7,1.5,,,\n\
             1.0,fix,,,,,,,,,35.00001,140.00001,4.0\n"
        );

        let events = parse_events(log.as_bytes()).unwrap();
        let events: Vec<_> = events.into_iter().map(|(_, e)| e).collect();

        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            Timestamped::new(0.0, NavEvent::Origin(GeodeticPoint::new(35.0, 140.0)))
        );
        assert_eq!(
            events[1].v,
            NavEvent::Imu(ImuSample {
                angvel_deg_s: Vector3::new(0.0, 0.0, 10.0),
                accel_m_s2: Vector3::new(0.1, 0.0, 9.8),
                mag_field: None,
            })
        );
        assert_eq!(
            events[2].v,
            NavEvent::Step {
                length_m: 0.7,
                heading_rad: None
            }
        );
        assert_eq!(
            events[3].v,
            NavEvent::Step {
                length_m: 0.7,
                heading_rad: Some(1.5)
            }
        );
        assert_eq!(
            events[4].v,
            NavEvent::Fix(GpsFix {
                pos: GeodeticPoint::new(35.00001, 140.00001),
                accuracy_m: 4.0
            })
        );
    }

    #[test]
    fn test_magnetometer_columns() {
        let log = "time_s,kind,gx,gy,gz,ax,ay,az,mx,my,mz\n\
                   0.0,imu,1.0,2.0,3.0,0.0,0.0,9.8,0.2,0.0,-0.4\n";

        let events = parse_events(log.as_bytes()).unwrap();
        let NavEvent::Imu(sample) = &events[0].1.v else {
            panic!("Expected imu event");
        };

        assert_eq!(sample.mag_field, Some(Vector3::new(0.2, 0.0, -0.4)));
    }

    #[test]
    fn test_missing_field() {
        let log = format!("{HEADER}0.0,origin,,,,,,,,,35.0,,\n0.5,step,,,,,,,,,,,\n");

        match parse_events(log.as_bytes()) {
            Err(Error::MissingField { line, kind, field }) => {
                assert_eq!(line, 2);
                assert_eq!(kind, RecordKind::Origin);
                assert_eq!(field, "lon");
            }
            other => panic!("Unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_bad_kind() {
        let log = format!("{HEADER}0.0,jump,,,,,,,,,,,\n");
        assert!(matches!(parse_events(log.as_bytes()), Err(Error::Csv(_))));
    }

    #[test]
    fn test_replay() {
        let log = format!(
            "{HEADER}\
             0.0,fix,,,,,,,,,35.0,140.0,3.0\n\
             0.1,origin,,,,,,,,,35.0,140.0,\n\
             0.5,step,,,,,,,1.0,0.0,,,\n\
             1.0,step,,,,,,,1.0,0.0,,,\n\
             1.5,fix,,,,,,,,,35.0,140.0,1.0\n"
        );

        let mut nav = Navigator::new(&Parameters::default());
        let mut out = vec![];

        let stats = replay(&mut nav, log.as_bytes(), &mut out).unwrap();
        assert_eq!(stats.steps, 2);
        assert_eq!(stats.fixes_applied, 1);
        assert_eq!(stats.fixes_skipped, 1);

        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "time_s,kind,status,x_m,y_m,theta_bias_rad,scale,lat,lon,yaw_deg"
        );
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("0.0,fix,skipped:origin_not_set,"));
        assert!(lines[2].starts_with("0.5,step,applied,1.0,"));
        assert!(lines[4].starts_with("1.5,fix,applied,"));

        // Pulled back towards the origin by the last fix
        let x = nav.ekf().state().x_m;
        assert!(x > 0.0 && x < 2.0);
        assert_relative_eq!(nav.snapshot().t, 1.5);
    }

    #[test]
    fn test_demo_log() {
        let mut nav = Navigator::new(&Parameters::default());
        let log = include_str!("../demos/walk.csv");

        let stats = replay(&mut nav, log.as_bytes(), io::sink()).unwrap();

        assert_eq!(stats.imu_applied, 40);
        assert_eq!(stats.steps, 20);
        assert_eq!(stats.fixes_applied, 4);

        // Steps are 0.7 m long, fixes say 0.75 m
        let state = nav.ekf().state();
        assert!(state.x_m > 14.0 && state.x_m < 15.5);
        assert!(state.scale > 1.0);
    }

    #[test]
    fn test_conflicting_origin() {
        let log = format!(
            "{HEADER}\
             0.0,origin,,,,,,,,,35.0,140.0,\n\
             1.0,origin,,,,,,,,,36.0,140.0,\n"
        );

        let mut nav = Navigator::new(&Parameters::default());
        let res = replay(&mut nav, log.as_bytes(), io::sink());

        assert!(matches!(res, Err(Error::Projection { line: 3, .. })));
    }
}
