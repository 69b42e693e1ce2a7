//! Touch and sensor event types consumed by the capture state machine.
//!
//! Events arrive already normalised by the input layer: coordinates in
//! screen pixels, sensor readings relative to the previous key press.

use super::session::CaptureError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Motion sensors sampled alongside each key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    GyroscopeUncalibrated,
    Gravity,
    Accelerometer,
    Gyroscope,
    RotationVector,
    LinearAcceleration,
}

impl SensorType {
    /// Fixed sensor ordering used by the feature layout.
    pub const ALL: [SensorType; 6] = [
        SensorType::GyroscopeUncalibrated,
        SensorType::Gravity,
        SensorType::Accelerometer,
        SensorType::Gyroscope,
        SensorType::RotationVector,
        SensorType::LinearAcceleration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SensorType::GyroscopeUncalibrated => "gyroscope_uncalibrated",
            SensorType::Gravity => "gravity",
            SensorType::Accelerometer => "accelerometer",
            SensorType::Gyroscope => "gyroscope",
            SensorType::RotationVector => "rotation_vector",
            SensorType::LinearAcceleration => "linear_acceleration",
        }
    }
}

/// Finger down or up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchEventKind {
    Down,
    Up,
}

/// One finger down/up occurrence as delivered by the input layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTouchEvent {
    pub pointer_id: u32,
    pub kind: TouchEventKind,
    pub timestamp: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub orientation: f64,
    pub pressure: f64,
    pub screen_orientation: i32,
    /// Latest reading of each sensor at the time of the event
    #[serde(default)]
    pub sensor_snapshot: BTreeMap<SensorType, Vec<f64>>,
}

impl RawTouchEvent {
    /// Create an event with zeroed touch geometry and no sensor data.
    pub fn new(pointer_id: u32, kind: TouchEventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            pointer_id,
            kind,
            timestamp,
            x: 0.0,
            y: 0.0,
            size: 0.0,
            orientation: 0.0,
            pressure: 0.0,
            screen_orientation: 0,
            sensor_snapshot: BTreeMap::new(),
        }
    }

    pub fn is_down(&self) -> bool {
        self.kind == TouchEventKind::Down
    }

    /// Milliseconds elapsed since `earlier`.
    pub fn millis_since(&self, earlier: &RawTouchEvent) -> f64 {
        (self.timestamp - earlier.timestamp).num_milliseconds() as f64
    }
}

/// One logical key press of a recorded acquisition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keystroke {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub orientation: f64,
    pub pressure: f64,
    /// Gap to the previous key press in milliseconds (0 for the first)
    pub down_down_interval: f64,
    /// Hold time in milliseconds
    pub up_down_interval: f64,
    /// One reading per tracked sensor; the first key press carries zeros
    #[serde(default)]
    pub sensors: BTreeMap<SensorType, Vec<f64>>,
}

/// An ordered sequence of key presses from one completed input session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    /// Identity of the app/field the text was typed into
    pub context_id: u64,
    pub screen_orientation: i32,
    pub timestamp: DateTime<Utc>,
    pub keystrokes: Vec<Keystroke>,
}

impl Acquisition {
    pub fn new(context_id: u64, screen_orientation: i32, timestamp: DateTime<Utc>) -> Self {
        Self {
            context_id,
            screen_orientation,
            timestamp,
            keystrokes: Vec::new(),
        }
    }

    /// Expand the key presses into the Down/Up event stream the input layer
    /// would have produced. Pointer ids are the key press indices.
    ///
    /// Fails on a non-finite interval or one that moves a timestamp out of
    /// the representable range.
    pub fn replay_events(&self) -> Result<Vec<RawTouchEvent>, CaptureError> {
        let mut events = Vec::with_capacity(self.keystrokes.len() * 2);
        let mut down_at = self.timestamp;

        for (i, keystroke) in self.keystrokes.iter().enumerate() {
            down_at = offset(down_at, keystroke.down_down_interval, i)?;
            let up_at = offset(down_at, keystroke.up_down_interval, i)?;

            for (kind, timestamp) in [(TouchEventKind::Down, down_at), (TouchEventKind::Up, up_at)] {
                events.push(RawTouchEvent {
                    pointer_id: i as u32,
                    kind,
                    timestamp,
                    x: keystroke.x,
                    y: keystroke.y,
                    size: keystroke.size,
                    orientation: keystroke.orientation,
                    pressure: keystroke.pressure,
                    screen_orientation: self.screen_orientation,
                    sensor_snapshot: keystroke.sensors.clone(),
                });
            }
        }

        Ok(events)
    }
}

fn offset(at: DateTime<Utc>, interval: f64, keystroke: usize) -> Result<DateTime<Utc>, CaptureError> {
    let invalid = || CaptureError::InvalidTiming { keystroke, interval };
    let millis = interval.round();
    // i64::MAX as f64 rounds up, so compare strictly below it
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return Err(invalid());
    }
    let delta = Duration::try_milliseconds(millis as i64).ok_or_else(invalid)?;
    at.checked_add_signed(delta).ok_or_else(invalid)
}
