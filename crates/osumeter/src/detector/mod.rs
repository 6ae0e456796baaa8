//! Play-completion detection.
//!
//! Turns the snapshot stream into at most one [`CompletedPlay`] per attempt.
//!
//! ## Phases
//!
//! ```text
//! Idle ──Playing──▶ Playing ──results──▶ WaitingForResults ──stable score──▶ ResultsCaptured
//!  ▲                 │  ▲ rewind (retry)        │                                  │
//!  │                 │  └───────┘               │                                  │
//!  └──── leave ──────┴──────────────────────────┴───────── leave (record pass) ───┘
//! ```
//!
//! Fails are recorded from `Playing` as soon as health hits zero. Every record
//! goes through [`validate`] first and flips the attempt's `recorded` flag
//! before it is handed out.

mod play;
mod timeline;
mod validation;

use chrono::{DateTime, Utc};
use strum::IntoStaticStr;
use tracing::{debug, info};

pub use play::{CompletedPlay, MapIdentity, PlayOutcome, ReplayLink};
pub use timeline::{ComboSample, PerformanceSample, TimelineEvent, TimelineRecorder};
pub use validation::{Capture, Rejection, validate};

use crate::config::DetectorConfig;
use crate::game::{GameState, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoStaticStr)]
pub enum Phase {
    #[default]
    Idle,
    Playing,
    /// On the results screen, waiting for the score to settle.
    WaitingForResults,
    /// A validated pass is held until the results screen is left.
    ResultsCaptured,
}

/// Why a would-be record was dropped on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum SkipReason {
    Replay,
    Automation,
}

/// What one snapshot did to the detector.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorEvent {
    AttemptStarted { replay: bool },
    AttemptRetried,
    ResultsEntered,
    ResultsCaptured { score: i64 },
    Rejected(Rejection),
    Skipped(SkipReason),
    Abandoned,
    Recorded(Box<CompletedPlay>),
}

/// Input class of a snapshot relative to the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Start,
    Rewind,
    Progress,
    EnterResults,
    ResultsPoll,
    Leave,
    Hold,
}

#[derive(Debug, Default)]
struct Attempt {
    started_at: Option<DateTime<Utc>>,
    recorded: bool,
    replay: bool,
    /// Last snapshot showing a failed-health condition while unrecorded.
    failed: Option<Snapshot>,
    last_time_ms: f64,
    /// Latest playing snapshot; fills fields the results screen lacks.
    last_playing: Option<Snapshot>,
    timeline: TimelineRecorder,
    stable_score: i64,
    stable_polls: u32,
    pending: Option<Snapshot>,
}

impl Attempt {
    fn begin(replay: bool) -> Self {
        Self {
            started_at: Some(Utc::now()),
            replay,
            timeline: TimelineRecorder::new(),
            ..Default::default()
        }
    }
}

pub struct PlayDetector {
    config: DetectorConfig,
    phase: Phase,
    attempt: Attempt,
}

impl PlayDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            attempt: Attempt::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the current attempt already produced (or was denied) a record.
    pub fn is_recorded(&self) -> bool {
        self.attempt.recorded
    }

    pub fn is_replay_session(&self) -> bool {
        self.attempt.replay
    }

    /// Timelines of the attempt in progress.
    pub fn timeline(&self) -> &TimelineRecorder {
        &self.attempt.timeline
    }

    /// Drop all attempt state, e.g. after the client disconnected.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.attempt = Attempt::default();
    }

    /// Feed one snapshot.
    pub fn observe(&mut self, snapshot: &Snapshot) -> Vec<DetectorEvent> {
        let trigger = self.trigger(snapshot);
        let mut events = Vec::new();

        match (self.phase, trigger) {
            (_, Trigger::Hold) => {}
            (Phase::WaitingForResults | Phase::ResultsCaptured, Trigger::Start) => {
                self.leave(&mut events);
                self.start(snapshot, &mut events);
            }
            (_, Trigger::Start) => self.start(snapshot, &mut events),
            (Phase::Playing, Trigger::Rewind) => self.retry(snapshot, &mut events),
            (Phase::Playing, Trigger::Progress) => self.progress(snapshot, &mut events),
            (Phase::Playing, Trigger::EnterResults) => self.enter_results(snapshot, &mut events),
            (Phase::WaitingForResults, Trigger::ResultsPoll) => {
                self.poll_results(snapshot, &mut events)
            }
            (_, Trigger::Leave) => self.leave(&mut events),
            (phase, trigger) => debug!("Ignoring {:?} in {:?}", trigger, phase),
        }
        events
    }

    fn trigger(&self, snapshot: &Snapshot) -> Trigger {
        let state = snapshot.state;
        match (self.phase, state) {
            // A disconnect or unreadable screen says nothing about the attempt.
            (_, GameState::Unknown) => Trigger::Hold,
            (Phase::Playing, GameState::Playing) => {
                if self.is_rewind(snapshot) {
                    Trigger::Rewind
                } else {
                    Trigger::Progress
                }
            }
            (_, GameState::Playing) => Trigger::Start,
            (Phase::Playing, GameState::ResultsScreen) => Trigger::EnterResults,
            (Phase::WaitingForResults, GameState::ResultsScreen) => Trigger::ResultsPoll,
            (Phase::ResultsCaptured, GameState::ResultsScreen) => Trigger::Hold,
            (Phase::Idle, _) => Trigger::Hold,
            _ => Trigger::Leave,
        }
    }

    fn is_rewind(&self, snapshot: &Snapshot) -> bool {
        let Some(time) = snapshot.time_ms else {
            return false;
        };
        let previous = self.attempt.last_time_ms;
        previous > self.config.retry_min_progress_ms && previous - time > self.config.retry_rewind_ms
    }

    fn start(&mut self, snapshot: &Snapshot, events: &mut Vec<DetectorEvent>) {
        self.phase = Phase::Playing;
        self.attempt = Attempt::begin(snapshot.is_replay);
        info!(
            "Attempt started on {}{}",
            snapshot.title.as_deref().unwrap_or("unknown map"),
            if snapshot.is_replay { " (replay)" } else { "" }
        );
        events.push(DetectorEvent::AttemptStarted {
            replay: snapshot.is_replay,
        });
        self.progress(snapshot, events);
    }

    fn retry(&mut self, snapshot: &Snapshot, events: &mut Vec<DetectorEvent>) {
        info!(
            "Retry detected ({:.0}ms -> {:.0}ms)",
            self.attempt.last_time_ms,
            snapshot.time_ms.unwrap_or(0.0)
        );
        if !self.attempt.recorded
            && let Some(failed) = self.attempt.failed.take()
        {
            self.try_record(&failed, PlayOutcome::Fail, Capture::Fail, events);
        }
        self.attempt = Attempt::begin(snapshot.is_replay);
        events.push(DetectorEvent::AttemptRetried);
        self.progress(snapshot, events);
    }

    fn progress(&mut self, snapshot: &Snapshot, events: &mut Vec<DetectorEvent>) {
        let attempt = &mut self.attempt;
        if snapshot.is_replay && !attempt.replay {
            debug!("Attempt turned out to be a replay");
            attempt.replay = true;
        }
        if let Some(time) = snapshot.time_ms {
            attempt.last_time_ms = time;
        }
        if !attempt.replay {
            attempt.timeline.observe(snapshot);
        }
        attempt.last_playing = Some(snapshot.clone());

        if self.attempt.recorded || !is_failed(snapshot) {
            return;
        }
        self.attempt.failed = Some(snapshot.clone());
        if self.try_record(snapshot, PlayOutcome::Fail, Capture::Fail, events) {
            self.attempt.failed = None;
        }
    }

    fn enter_results(&mut self, snapshot: &Snapshot, events: &mut Vec<DetectorEvent>) {
        if self.attempt.recorded {
            self.phase = Phase::Idle;
            return;
        }
        debug!("Results screen entered");
        self.phase = Phase::WaitingForResults;
        self.attempt.stable_score = 0;
        self.attempt.stable_polls = 0;
        events.push(DetectorEvent::ResultsEntered);
        self.poll_results(snapshot, events);
    }

    fn poll_results(&mut self, snapshot: &Snapshot, events: &mut Vec<DetectorEvent>) {
        let attempt = &mut self.attempt;
        let score = snapshot.score.unwrap_or(0);
        if score == 0 {
            attempt.stable_score = 0;
            attempt.stable_polls = 0;
            return;
        }
        if score == attempt.stable_score {
            attempt.stable_polls += 1;
        } else {
            attempt.stable_score = score;
            attempt.stable_polls = 1;
        }
        if attempt.stable_polls < self.config.stabilization_polls {
            return;
        }

        let candidate = self.merged(snapshot);
        match validate(&candidate, Capture::Results, &self.config) {
            Ok(()) => {
                debug!("Results stable at {} after {} polls", score, self.attempt.stable_polls);
                self.attempt.pending = Some(candidate);
                self.phase = Phase::ResultsCaptured;
                events.push(DetectorEvent::ResultsCaptured { score });
            }
            Err(rejection) => {
                debug!("Results rejected: {}", rejection);
                events.push(DetectorEvent::Rejected(rejection));
            }
        }
    }

    fn leave(&mut self, events: &mut Vec<DetectorEvent>) {
        if let Some(pending) = self.attempt.pending.take() {
            self.try_record(&pending, PlayOutcome::Pass, Capture::Results, events);
        } else if !self.attempt.recorded
            && matches!(self.phase, Phase::Playing | Phase::WaitingForResults)
        {
            if !self.attempt.replay {
                info!("Attempt abandoned");
            }
            events.push(DetectorEvent::Abandoned);
        }
        self.phase = Phase::Idle;
        self.attempt = Attempt::default();
    }

    /// Fill map and mod fields a results snapshot may lack from the last
    /// playing snapshot.
    fn merged(&self, snapshot: &Snapshot) -> Snapshot {
        let mut merged = snapshot.clone();
        let Some(playing) = &self.attempt.last_playing else {
            return merged;
        };
        macro_rules! fill {
            ($($field:ident),*) => {
                $(if merged.$field.is_none() {
                    merged.$field = playing.$field.clone();
                })*
            };
        }
        fill!(
            client, ruleset, map_hash, title, artist, difficulty_name, map_file, cs, ar, od, hp,
            object_count, map_max_combo, map_length_ms, bpm, star_rating, mods, pp
        );
        merged
    }

    /// Record `candidate` unless the attempt is already recorded, excluded or
    /// invalid. Returns whether the attempt is now settled.
    fn try_record(
        &mut self,
        candidate: &Snapshot,
        outcome: PlayOutcome,
        capture: Capture,
        events: &mut Vec<DetectorEvent>,
    ) -> bool {
        if self.attempt.recorded {
            return true;
        }
        let candidate = self.merged(candidate);

        if self.attempt.replay {
            self.attempt.recorded = true;
            debug!("Replay session, not recording");
            events.push(DetectorEvent::Skipped(SkipReason::Replay));
            return true;
        }
        if candidate.mods.as_ref().is_some_and(|m| m.is_automation()) {
            self.attempt.recorded = true;
            info!("Automation mod active, not recording");
            events.push(DetectorEvent::Skipped(SkipReason::Automation));
            return true;
        }
        if let Err(rejection) = validate(&candidate, capture, &self.config) {
            debug!("{} rejected: {}", outcome, rejection);
            events.push(DetectorEvent::Rejected(rejection));
            return false;
        }

        self.attempt.recorded = true;
        let play = self.build_play(&candidate, outcome);
        info!(
            "Recorded {} on {} ({} {})",
            outcome,
            play.map.display_name(),
            play.score,
            play.mods
        );
        events.push(DetectorEvent::Recorded(Box::new(play)));
        true
    }

    fn build_play(&self, snapshot: &Snapshot, outcome: PlayOutcome) -> CompletedPlay {
        let ruleset = snapshot.ruleset_or_default();
        let hits = snapshot.hits.unwrap_or_default();
        let timeline = &self.attempt.timeline;
        let max_combo = snapshot
            .max_combo
            .unwrap_or(0)
            .max(timeline.performance().last().map_or(0, |s| s.max_combo));
        let duration_ms = match outcome {
            PlayOutcome::Fail => snapshot.time_ms.unwrap_or(self.attempt.last_time_ms),
            PlayOutcome::Pass => self.attempt.last_time_ms,
        };

        CompletedPlay {
            timestamp: Utc::now(),
            started_at: self.attempt.started_at.unwrap_or_else(Utc::now),
            client: snapshot.client.clone(),
            ruleset,
            map: MapIdentity::from_snapshot(snapshot),
            mods: snapshot.mods.clone().unwrap_or_default(),
            outcome,
            duration_ms: duration_ms.max(0.0),
            hits,
            score: snapshot.score.unwrap_or(0),
            accuracy: snapshot.accuracy.unwrap_or_else(|| hits.accuracy(ruleset)),
            max_combo,
            pp: snapshot.pp,
            combo_timeline: timeline.combo().to_vec(),
            performance_timeline: timeline.performance().to_vec(),
            replay: None,
        }
    }
}

/// Health depleted without no-fail after at least one judgement.
fn is_failed(snapshot: &Snapshot) -> bool {
    snapshot.health.is_some_and(|h| h <= 0.0)
        && !snapshot.mods.as_ref().is_some_and(|m| m.has_no_fail())
        && snapshot.judged() > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{HitCounts, ModList};

    fn playing(time: f64, great: u32, health: f64) -> Snapshot {
        Snapshot {
            map_hash: Some("abc".to_string()),
            title: Some("Song".to_string()),
            object_count: Some(10),
            map_max_combo: Some(20),
            time_ms: Some(time),
            score: Some(i64::from(great) * 300),
            combo: Some(great),
            max_combo: Some(great),
            health: Some(health),
            hits: Some(HitCounts {
                great,
                ..Default::default()
            }),
            mods: Some(ModList::default()),
            ..Snapshot::with_state(GameState::Playing)
        }
    }

    fn results(score: i64) -> Snapshot {
        Snapshot {
            score: Some(score),
            max_combo: Some(10),
            hits: Some(HitCounts {
                great: 10,
                ..Default::default()
            }),
            results_ready: true,
            ..Snapshot::with_state(GameState::ResultsScreen)
        }
    }

    fn recorded(events: &[DetectorEvent]) -> Vec<&CompletedPlay> {
        events
            .iter()
            .filter_map(|e| match e {
                DetectorEvent::Recorded(play) => Some(play.as_ref()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_start_seeds_timeline() {
        let mut detector = PlayDetector::new(DetectorConfig::default());
        let events = detector.observe(&playing(0.0, 0, 1.0));

        assert_eq!(events, vec![DetectorEvent::AttemptStarted { replay: false }]);
        assert_eq!(detector.phase(), Phase::Playing);
        assert_eq!(detector.timeline().performance().len(), 1);
    }

    #[test]
    fn test_pass_recorded_on_leave() {
        let mut detector = PlayDetector::new(DetectorConfig::default());
        detector.observe(&Snapshot::with_state(GameState::SongSelect));
        for i in 0..=10 {
            detector.observe(&playing(f64::from(i) * 500.0, i, 1.0));
        }
        for _ in 0..5 {
            assert!(recorded(&detector.observe(&results(3000))).is_empty());
        }
        assert_eq!(detector.phase(), Phase::ResultsCaptured);

        let events = detector.observe(&Snapshot::with_state(GameState::SongSelect));
        let plays = recorded(&events);
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].outcome, PlayOutcome::Pass);
        assert_eq!(plays[0].score, 3000);
        assert_eq!(plays[0].map.hash, "abc");
        assert_eq!(plays[0].duration_ms, 5000.0);
        assert_eq!(plays[0].performance_timeline.len(), 11);
        assert_eq!(detector.phase(), Phase::Idle);
    }

    #[test]
    fn test_fail_recorded_once() {
        let mut detector = PlayDetector::new(DetectorConfig::default());
        detector.observe(&playing(0.0, 0, 1.0));
        detector.observe(&playing(500.0, 2, 0.5));

        let plays = recorded(&detector.observe(&playing(1000.0, 3, 0.0))).len();
        assert_eq!(plays, 1);
        assert!(detector.is_recorded());
        for t in 1..10 {
            let events = detector.observe(&playing(1000.0 + f64::from(t), 3, 0.0));
            assert!(recorded(&events).is_empty());
        }
    }

    #[test]
    fn test_no_fail_mod_blocks_fail() {
        let mut detector = PlayDetector::new(DetectorConfig::default());
        let mut snapshot = playing(1000.0, 3, 0.0);
        snapshot.mods = Some(ModList::new(["NF"]));
        detector.observe(&playing(0.0, 0, 1.0));
        assert!(recorded(&detector.observe(&snapshot)).is_empty());
        assert!(!detector.is_recorded());
    }

    #[test]
    fn test_zero_health_before_any_judgement_is_not_a_fail() {
        let mut detector = PlayDetector::new(DetectorConfig::default());
        assert!(recorded(&detector.observe(&playing(0.0, 0, 0.0))).is_empty());
    }

    #[test]
    fn test_automation_never_recorded() {
        let mut detector = PlayDetector::new(DetectorConfig::default());
        let mut start = playing(0.0, 0, 1.0);
        start.mods = Some(ModList::new(["AT"]));
        detector.observe(&start);
        for _ in 0..5 {
            detector.observe(&results(3000));
        }
        let events = detector.observe(&Snapshot::with_state(GameState::Menu));
        assert!(recorded(&events).is_empty());
        assert!(events.contains(&DetectorEvent::Skipped(SkipReason::Automation)));
    }

    #[test]
    fn test_replay_session_not_recorded() {
        let mut detector = PlayDetector::new(DetectorConfig::default());
        detector.observe(&playing(0.0, 0, 1.0));
        let mut replay = playing(500.0, 3, 0.0);
        replay.is_replay = true;

        let events = detector.observe(&replay);
        assert!(recorded(&events).is_empty());
        assert!(detector.is_replay_session());
        assert_eq!(detector.timeline().performance().len(), 1);
    }

    #[test]
    fn test_unknown_state_holds_attempt() {
        let mut detector = PlayDetector::new(DetectorConfig::default());
        detector.observe(&playing(0.0, 0, 1.0));
        assert!(detector.observe(&Snapshot::no_data()).is_empty());
        assert_eq!(detector.phase(), Phase::Playing);
    }

    #[test]
    fn test_abandon_emits_no_record() {
        let mut detector = PlayDetector::new(DetectorConfig::default());
        detector.observe(&playing(0.0, 0, 1.0));
        detector.observe(&playing(800.0, 2, 1.0));
        let events = detector.observe(&Snapshot::with_state(GameState::SongSelect));
        assert_eq!(events, vec![DetectorEvent::Abandoned]);
    }

    #[test]
    fn test_retry_from_results_records_pending_pass() {
        let mut detector = PlayDetector::new(DetectorConfig::default());
        detector.observe(&playing(5000.0, 10, 1.0));
        for _ in 0..5 {
            detector.observe(&results(3000));
        }

        let events = detector.observe(&playing(0.0, 0, 1.0));
        assert_eq!(recorded(&events).len(), 1);
        assert_eq!(events.last(), Some(&DetectorEvent::AttemptStarted { replay: false }));
        assert_eq!(detector.phase(), Phase::Playing);
        assert!(!detector.is_recorded());
    }
}
