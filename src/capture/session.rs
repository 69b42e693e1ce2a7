//! Session capture state machine.
//!
//! A [`SessionCapture`] assembles the touch events of one input session into
//! a [`FeatureSet`], scores it against the enrollment set of its key, stores
//! it and runs template selection once the set reaches capacity.
//!
//! ```text
//! Idle ──start──▶ Capturing ──finish(done)──▶ Scored
//!                    │  ▲
//!      restart with  │  │ key event once the
//!      pending text  ▼  │ edited text is empty
//!                  Invalid ──finish(done)──▶ Idle
//! ```

use super::active::ActiveEntries;
use super::input::InputSource;
use super::types::{RawTouchEvent, SensorType, TouchEventKind};
use crate::audit::SharedAuditLog;
use crate::config::{ClassifierConfig, ConfigError};
use crate::core::features::{Feature, FeatureSet, TouchProperty};
use crate::core::scorer::{AuthenticationScorer, Score};
use crate::core::selection::TemplateSelector;
use crate::core::variability::variability;
use crate::store::{EnrollmentKey, EnrollmentStore, RecordId, StoreError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Where the current session stands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureState {
    /// No session has been started
    Idle,
    Capturing,
    /// Input was abandoned mid-edit; the session will not be scored
    Invalid,
    /// Scored once; further finishes return the same score
    Scored(Score),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Enrollment store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Keystroke {keystroke} has an unusable interval of {interval} ms")]
    InvalidTiming { keystroke: usize, interval: f64 },
}

/// Captures and scores input sessions for one enrollment store.
pub struct SessionCapture<S: EnrollmentStore> {
    config: ClassifierConfig,
    store: S,
    audit: Option<SharedAuditLog>,
    state: CaptureState,
    key: EnrollmentKey,
    enrollment: Vec<FeatureSet>,
    enrollment_ids: Vec<RecordId>,
    locked: bool,
    variability: Vec<f64>,
    active: ActiveEntries,
    current: FeatureSet,
    /// The user submitted the input to the app; later key events are ignored
    submitted: bool,
}

impl<S: EnrollmentStore> SessionCapture<S> {
    /// Fails if `config` is not a usable classifier configuration.
    pub fn new(config: ClassifierConfig, store: S) -> Result<Self, CaptureError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            audit: None,
            state: CaptureState::Idle,
            key: EnrollmentKey::new(0, 0),
            enrollment: Vec::new(),
            enrollment_ids: Vec::new(),
            locked: false,
            variability: Vec::new(),
            active: ActiveEntries::new(),
            current: FeatureSet::empty(),
            submitted: false,
        })
    }

    pub fn with_audit(mut self, audit: SharedAuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Score of the last finished session, if it was scored.
    pub fn score(&self) -> Option<Score> {
        match self.state {
            CaptureState::Scored(score) => Some(score),
            _ => None,
        }
    }

    /// Variability vector computed when the session started.
    pub fn variability(&self) -> &[f64] {
        &self.variability
    }

    /// Records loaded for the current key.
    pub fn enrollment_len(&self) -> usize {
        self.enrollment.len()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Features captured so far in the running session.
    pub fn current_features(&self) -> &FeatureSet {
        &self.current
    }

    /// Begin (or restart) an input session for `key`.
    ///
    /// A restart, or a start while the session is invalid, never reloads the
    /// enrollment set: it invalidates the session if the edited text is not
    /// empty and otherwise clears the captured data.
    pub fn start(
        &mut self,
        key: EnrollmentKey,
        restarting: bool,
        pending_text: bool,
    ) -> Result<(), CaptureError> {
        if restarting || self.state == CaptureState::Invalid {
            if self.submitted {
                return Ok(());
            }
            if pending_text {
                self.invalidate("restarted with pending text");
            } else {
                self.reset_data();
            }
            return Ok(());
        }

        let set = self.store.load(key)?;
        self.key = key;
        self.locked = self.config.enable_template_selection && set.locked;
        self.enrollment_ids = set.ids();
        self.enrollment = set.feature_sets();
        self.variability = variability(
            &self.enrollment,
            self.config.classification_function,
            self.config.distance_function,
        );

        self.active.clear();
        self.current.clear();
        self.submitted = false;
        self.state = CaptureState::Capturing;

        if let Some(audit) = &self.audit {
            audit.record_session_started();
        }
        debug!(
            key = %key,
            enrolled = self.enrollment.len(),
            locked = self.locked,
            "Session started"
        );
        Ok(())
    }

    /// Mark the input as submitted to the app.
    pub fn submit(&mut self) {
        self.submitted = true;
    }

    /// Feed one touch event into the running session.
    pub fn key_event(&mut self, event: &RawTouchEvent, pending_text: bool) {
        if self.submitted {
            return;
        }
        if self.state == CaptureState::Invalid {
            if pending_text {
                return;
            }
            self.reset_data();
        }
        if self.state != CaptureState::Capturing {
            return;
        }

        match event.kind {
            TouchEventKind::Up => self.on_up(event),
            TouchEventKind::Down => self.on_down(event),
        }
    }

    fn on_up(&mut self, event: &RawTouchEvent) {
        match self.active.release(event.pointer_id) {
            Some(down) => {
                if self.config.uses_touch_property(TouchProperty::DownUp) {
                    self.current.push(
                        Feature::Touch(TouchProperty::DownUp),
                        vec![event.millis_since(&down)],
                    );
                }
            }
            None => error!(
                pointer_id = event.pointer_id,
                "Got Up event, but no matching Down event found"
            ),
        }

        if self.config.uses_touch_property(TouchProperty::Position) {
            self.current
                .push(Feature::Touch(TouchProperty::Position), vec![event.x, event.y]);
        }
    }

    fn on_down(&mut self, event: &RawTouchEvent) {
        let interval = self
            .active
            .previous_down(event)
            .map(|previous| event.millis_since(previous));

        if let Some(interval) = interval {
            if self.config.uses_touch_property(TouchProperty::DownDown) {
                self.current
                    .push(Feature::Touch(TouchProperty::DownDown), vec![interval]);
            }
            // Sensor readings arrive relative to the previous key press
            for sensor in SensorType::ALL {
                if !self.config.uses_sensor(sensor) {
                    continue;
                }
                if let Some(values) = event.sensor_snapshot.get(&sensor) {
                    self.current.push(Feature::Sensor(sensor), values.clone());
                }
            }
        }

        for (property, value) in [
            (TouchProperty::Size, event.size),
            (TouchProperty::Orientation, event.orientation),
            (TouchProperty::Pressure, event.pressure),
        ] {
            if self.config.uses_touch_property(property) {
                self.current.push(Feature::Touch(property), vec![value]);
            }
        }

        self.active.push(event.clone());
        if let Some(audit) = &self.audit {
            audit.record_keystroke();
        }
    }

    /// End the input session.
    ///
    /// If not `done`, the session is invalidated when the edited text is not
    /// empty. If `done`, the session is scored once and, unless `discard` is
    /// set, stored in the enrollment set. Returns the score when there is one.
    pub fn finish(
        &mut self,
        done: bool,
        discard: bool,
        pending_text: bool,
    ) -> Result<Option<Score>, CaptureError> {
        if !done {
            if pending_text && self.state == CaptureState::Capturing {
                self.invalidate("finished with pending text");
            }
            return Ok(None);
        }

        match self.state {
            CaptureState::Capturing => {}
            CaptureState::Scored(score) => return Ok(Some(score)),
            CaptureState::Invalid => {
                info!(key = %self.key, "Discarding invalid session");
                self.reset_data();
                self.state = CaptureState::Idle;
                return Ok(None);
            }
            CaptureState::Idle => return Ok(None),
        }

        let score = self.calc_score();
        if let Some(audit) = &self.audit {
            audit.record_score(score);
        }

        if !discard && score != Score::CapturingError {
            if let Err(e) = self.save(score) {
                warn!(key = %self.key, "Could not store acquisition: {e}");
                self.reset_data();
                self.state = CaptureState::Invalid;
                return Err(e.into());
            }
        }

        self.reset_data();
        self.state = CaptureState::Scored(score);
        Ok(Some(score))
    }

    /// Run one complete session from `input`.
    pub fn run<I: InputSource>(
        &mut self,
        key: EnrollmentKey,
        input: &mut I,
        discard: bool,
    ) -> Result<Option<Score>, CaptureError> {
        self.start(key, false, input.has_pending_text())?;
        while let Some(event) = input.next_event() {
            self.key_event(&event, input.has_pending_text());
        }
        self.finish(true, discard, input.has_pending_text())
    }

    fn calc_score(&self) -> Score {
        if let Some(enrolled) = self.enrollment.first() {
            if enrolled.shape() != self.current.shape() {
                error!(
                    key = %self.key,
                    live = ?self.current.shape(),
                    enrolled = ?enrolled.shape(),
                    "Authentication data does not match the enrolled shape"
                );
                return Score::CapturingError;
            }
        }

        AuthenticationScorer::new(&self.config).score(
            &self.current,
            &self.enrollment,
            &self.variability,
            self.locked,
        )
    }

    fn save(&mut self, score: Score) -> Result<(), StoreError> {
        if self.config.enable_template_selection && self.locked {
            return Ok(());
        }

        let id = self.store.append(self.key, self.current.clone(), score)?;

        if !self.config.enable_template_selection
            || self.enrollment.len() + 1 < self.config.acquisition_set_size
        {
            return Ok(());
        }

        let mut records = self.enrollment.clone();
        records.push(self.current.clone());
        let mut ids = self.enrollment_ids.clone();
        ids.push(id);

        let selector = TemplateSelector::from_config(&self.config);
        let keep: Vec<RecordId> = selector
            .select(&records)
            .into_iter()
            .filter_map(|i| ids.get(i).copied())
            .collect();

        self.store.replace_template_set(self.key, &keep)?;
        self.locked = true;

        info!(
            key = %self.key,
            strategy = %selector.strategy,
            n = records.len(),
            k = keep.len(),
            kept = ?keep,
            "Template set locked"
        );
        if let Some(audit) = &self.audit {
            audit.record_templates_locked();
        }
        Ok(())
    }

    fn invalidate(&mut self, reason: &str) {
        if self.state != CaptureState::Invalid {
            debug!(key = %self.key, reason, "Session invalidated");
            if let Some(audit) = &self.audit {
                audit.record_invalidated();
            }
        }
        self.state = CaptureState::Invalid;
    }

    fn reset_data(&mut self) {
        if self.state == CaptureState::Invalid {
            self.state = CaptureState::Capturing;
        }
        self.submitted = false;
        self.current.clear();
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn press(pointer_id: u32, at_ms: i64, hold_ms: i64) -> [RawTouchEvent; 2] {
        let base = Utc::now();
        let mut down = RawTouchEvent::new(
            pointer_id,
            TouchEventKind::Down,
            base + Duration::milliseconds(at_ms),
        );
        down.size = 0.5;
        let mut up = down.clone();
        up.kind = TouchEventKind::Up;
        up.timestamp = down.timestamp + Duration::milliseconds(hold_ms);
        [down, up]
    }

    fn capture() -> SessionCapture<Arc<MemoryStore>> {
        SessionCapture::new(ClassifierConfig::default(), Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_feature_extraction() {
        let mut session = capture();
        let key = EnrollmentKey::new(1, 0);
        session.start(key, false, false).unwrap();

        for (i, at) in [0, 150, 420].into_iter().enumerate() {
            for event in press(i as u32, at, 80) {
                session.key_event(&event, true);
            }
        }

        let features = session.current_features();
        let down_down = features.feature(Feature::Touch(TouchProperty::DownDown)).unwrap();
        assert_eq!(down_down, &vec![vec![150.0], vec![270.0]]);
        let down_up = features.feature(Feature::Touch(TouchProperty::DownUp)).unwrap();
        assert_eq!(down_up.len(), 3);
        assert!(down_up.iter().all(|s| s[0] == 80.0));
        assert_eq!(features.feature(Feature::Touch(TouchProperty::Size)).unwrap().len(), 3);
        assert_eq!(features.feature(Feature::Touch(TouchProperty::Position)).unwrap().len(), 3);
    }

    #[test]
    fn test_up_without_down_still_records_position() {
        let mut session = capture();
        session.start(EnrollmentKey::new(1, 0), false, false).unwrap();

        let [_, up] = press(9, 0, 50);
        session.key_event(&up, true);

        let features = session.current_features();
        assert!(features.feature(Feature::Touch(TouchProperty::DownUp)).unwrap().is_empty());
        assert_eq!(features.feature(Feature::Touch(TouchProperty::Position)).unwrap().len(), 1);
    }

    #[test]
    fn test_restart_with_pending_text_invalidates() {
        let mut session = capture();
        let key = EnrollmentKey::new(3, 0);
        session.start(key, false, false).unwrap();
        for event in press(0, 0, 50) {
            session.key_event(&event, true);
        }

        session.start(key, true, true).unwrap();
        assert_eq!(session.state(), CaptureState::Invalid);

        // Ignored while text is still there
        for event in press(1, 100, 50) {
            session.key_event(&event, true);
        }
        assert_eq!(session.state(), CaptureState::Invalid);

        // Invalid sessions are never scored or stored
        assert_eq!(session.finish(true, false, true).unwrap(), None);
        assert!(session.store().load(key).unwrap().is_empty());
    }

    #[test]
    fn test_cleared_text_resumes_capture() {
        let mut session = capture();
        session.start(EnrollmentKey::new(3, 0), false, false).unwrap();
        session.start(EnrollmentKey::new(3, 0), true, true).unwrap();
        assert_eq!(session.state(), CaptureState::Invalid);

        let [down, _] = press(0, 0, 50);
        session.key_event(&down, false);
        assert_eq!(session.state(), CaptureState::Capturing);
        assert_eq!(
            session
                .current_features()
                .feature(Feature::Touch(TouchProperty::Size))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_abandoned_input_invalidates() {
        let mut session = capture();
        session.start(EnrollmentKey::new(4, 0), false, false).unwrap();
        assert_eq!(session.finish(false, false, false).unwrap(), None);
        assert_eq!(session.state(), CaptureState::Capturing);

        assert_eq!(session.finish(false, false, true).unwrap(), None);
        assert_eq!(session.state(), CaptureState::Invalid);
    }

    #[test]
    fn test_unusable_config_rejected() {
        for (acquisition_set_size, template_set_size) in [(10, 0), (4, 7), (0, 0)] {
            let config = ClassifierConfig {
                acquisition_set_size,
                template_set_size,
                ..ClassifierConfig::default()
            };
            let result = SessionCapture::new(config, MemoryStore::new());
            assert!(
                matches!(result, Err(CaptureError::Config(ConfigError::Invalid(_)))),
                "{acquisition_set_size}/{template_set_size}"
            );
        }
    }
}
