//! Session state machine.
//!
//! Single-writer pattern: every transition goes through [`reduce`], which
//! returns the next state and a list of effects to execute. The reducer
//! owns the active segment (accumulated text plus the per-segment detection
//! record) and all timer scheduling; timers are effects carrying fresh IDs,
//! and timeout events with a stale ID are ignored, so tests can drive
//! virtual time by feeding timeout events directly.
//!
//! Key rules:
//! - Never mutate state in place; build the next state and return it
//! - Ignore events whose session or timer ID is stale
//! - Stopping is idempotent and flushes pending text exactly once

use std::collections::BTreeSet;
use std::time::Duration;

use uuid::Uuid;

use crate::detection::scan;
use crate::settings::GameSettings;
use crate::speech::SpeechError;
use crate::transcript::SegmentAccumulator;

/// Per-event snapshot of the configuration the reducer needs.
#[derive(Debug, Clone)]
pub struct ReduceContext {
    pub forbidden: Vec<String>,
    pub quiet_period: Duration,
    pub segment_ceiling: Duration,
    pub restart_delay: Duration,
}

impl ReduceContext {
    pub fn new(settings: &GameSettings, forbidden: &[String]) -> Self {
        Self {
            forbidden: forbidden.to_vec(),
            quiet_period: Duration::from_millis(settings.quiet_period_ms),
            segment_ceiling: Duration::from_millis(settings.segment_ceiling_ms),
            restart_delay: Duration::from_millis(settings.restart_delay_ms),
        }
    }
}

/// The active utterance segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentState {
    pub acc: SegmentAccumulator,
    /// Words already alerted on in this segment.
    pub alerted: BTreeSet<String>,
    pub had_hit: bool,
    pub quiet_timer: Option<Uuid>,
    pub ceiling_timer: Option<Uuid>,
}

/// Session control state. `Starting` exists because the source starts
/// asynchronously and may fail; a session is live only once `Listening`.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Starting {
        session_id: Uuid,
    },
    Listening {
        session_id: Uuid,
        segment: SegmentState,
    },
}

impl SessionState {
    pub fn is_listening(&self) -> bool {
        matches!(self, SessionState::Listening { .. })
    }

    fn session_id(&self) -> Option<Uuid> {
        match self {
            SessionState::Idle => None,
            SessionState::Starting { session_id } => Some(*session_id),
            SessionState::Listening { session_id, .. } => Some(*session_id),
        }
    }
}

/// Events feeding the reducer: user commands, source callbacks, timers.
#[derive(Debug, Clone)]
pub enum Event {
    /// User asked to start the game session.
    StartRequested,
    /// User asked to stop. Idempotent.
    StopRequested,
    /// Tear down the state loop.
    Shutdown,

    // Source events, stamped with the session that started the source
    SourceStarted { id: Uuid },
    SourceEnded { id: Uuid },
    SourceFailed { id: Uuid, error: SpeechError },
    Interim { id: Uuid, text: String },
    Final { id: Uuid, text: String },

    // Timer events (id = session, timer = the scheduled instance)
    QuietTimeout { id: Uuid, timer: Uuid },
    CeilingTimeout { id: Uuid, timer: Uuid },
}

/// Effects produced by transitions, executed outside the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartSource { id: Uuid },
    StopSource,
    /// Start the source again after a debounce delay.
    RestartSource { id: Uuid, delay: Duration },
    StartQuietTimer { id: Uuid, timer: Uuid, duration: Duration },
    StartCeilingTimer { id: Uuid, timer: Uuid, duration: Duration },

    // Pipeline output, handled in the state loop
    TranscriptLine { text: String, provisional: bool },
    Alert { word: String },
    SegmentClosed { text: String, had_hit: bool },
    SessionStarted,
    SessionEnded,
    SessionError { error: SpeechError },
    EmitStats,
}

/// Reducer: `(state, event) -> (next_state, effects)`.
pub fn reduce(state: &SessionState, event: Event, ctx: &ReduceContext) -> (SessionState, Vec<Effect>) {
    use Effect::*;
    use Event::*;
    use SessionState::*;

    let current_id = state.session_id();
    let is_stale = |eid: Uuid| current_id != Some(eid);

    match (state, event) {
        // -----------------
        // Idle
        // -----------------
        (Idle, StartRequested) => {
            let id = Uuid::new_v4();
            (Starting { session_id: id }, vec![StartSource { id }])
        }
        // Stopping when already idle is a no-op
        (Idle, StopRequested) => (Idle, vec![]),

        // -----------------
        // Starting
        // -----------------
        (Starting { session_id }, SourceStarted { id }) if *session_id == id => (
            Listening {
                session_id: id,
                segment: SegmentState::default(),
            },
            vec![SessionStarted, EmitStats],
        ),
        (Starting { session_id }, SourceFailed { id, error }) if *session_id == id => {
            (Idle, vec![SessionError { error }])
        }
        (Starting { session_id }, SourceEnded { id }) if *session_id == id => (
            state.clone(),
            vec![RestartSource {
                id,
                delay: ctx.restart_delay,
            }],
        ),
        // Cancel before the source confirmed; stop it in case it comes up late
        (Starting { .. }, StopRequested) => (Idle, vec![StopSource]),

        // -----------------
        // Listening: transcript flow
        // -----------------
        (Listening { session_id, segment }, Interim { id, text }) if *session_id == id => {
            let mut segment = segment.clone();
            let view = segment.acc.apply_interim(&text);
            let mut effects = Vec::new();

            // The first interim opens the segment and starts its ceiling clock
            if segment.ceiling_timer.is_none() {
                let timer = Uuid::new_v4();
                segment.ceiling_timer = Some(timer);
                effects.push(StartCeilingTimer {
                    id,
                    timer,
                    duration: ctx.segment_ceiling,
                });
            }

            // Every interim supersedes the quiet-period timer
            let timer = Uuid::new_v4();
            segment.quiet_timer = Some(timer);
            effects.push(StartQuietTimer {
                id,
                timer,
                duration: ctx.quiet_period,
            });

            let fresh = scan(&view, &ctx.forbidden, &mut segment.alerted);
            if !fresh.is_empty() {
                segment.had_hit = true;
            }
            for word in fresh.iter().cloned() {
                effects.push(Alert { word });
            }
            effects.push(TranscriptLine {
                text: view,
                provisional: true,
            });
            if !fresh.is_empty() {
                effects.push(EmitStats);
            }

            (Listening { session_id: id, segment }, effects)
        }

        (Listening { session_id, segment }, Final { id, text }) if *session_id == id => {
            let mut segment = segment.clone();
            let full = segment.acc.take_final(&text);
            let mut effects = close_segment(&mut segment, full, ctx);
            if !effects.is_empty() {
                effects.push(EmitStats);
            }
            (
                Listening {
                    session_id: id,
                    segment: SegmentState::default(),
                },
                effects,
            )
        }

        // -----------------
        // Listening: timers
        // -----------------
        (Listening { session_id, segment }, QuietTimeout { id, timer })
            if *session_id == id && segment.quiet_timer == Some(timer) =>
        {
            let mut segment = segment.clone();
            let full = segment.acc.flush();
            if full.is_empty() {
                segment.quiet_timer = None;
                return (Listening { session_id: id, segment }, vec![]);
            }
            log::debug!("session: quiet period elapsed, finalizing segment");
            let mut effects = close_segment(&mut segment, full, ctx);
            effects.push(EmitStats);
            (
                Listening {
                    session_id: id,
                    segment: SegmentState::default(),
                },
                effects,
            )
        }

        (Listening { session_id, segment }, CeilingTimeout { id, timer })
            if *session_id == id && segment.ceiling_timer == Some(timer) =>
        {
            // The recognizer session ran too long; restart it, keeping the
            // segment's text. The source's Ended event triggers the restart.
            log::info!("session: segment ceiling reached, recycling the source");
            let mut segment = segment.clone();
            segment.acc.carry_over();
            let timer = Uuid::new_v4();
            segment.ceiling_timer = Some(timer);
            (
                Listening { session_id: id, segment },
                vec![
                    StopSource,
                    StartCeilingTimer {
                        id,
                        timer,
                        duration: ctx.segment_ceiling,
                    },
                ],
            )
        }

        // -----------------
        // Listening: source lifecycle
        // -----------------
        // The recognizer gave up mid-session (silence, fatigue): restart it
        (Listening { session_id, .. }, SourceEnded { id }) if *session_id == id => (
            state.clone(),
            vec![RestartSource {
                id,
                delay: ctx.restart_delay,
            }],
        ),
        // Restart completed
        (Listening { session_id, .. }, SourceStarted { id }) if *session_id == id => {
            (state.clone(), vec![])
        }

        (Listening { segment, .. }, StopRequested) => {
            let mut segment = segment.clone();
            let full = segment.acc.flush();
            let mut effects = close_segment(&mut segment, full, ctx);
            effects.extend([StopSource, SessionEnded, EmitStats]);
            (Idle, effects)
        }

        (Listening { session_id, segment }, SourceFailed { id, error }) if *session_id == id => {
            let mut segment = segment.clone();
            let full = segment.acc.flush();
            let mut effects = close_segment(&mut segment, full, ctx);
            effects.extend([StopSource, SessionEnded, SessionError { error }, EmitStats]);
            (Idle, effects)
        }

        // A session is already running
        (Starting { .. }, StartRequested) | (Listening { .. }, StartRequested) => {
            (state.clone(), vec![])
        }

        // -----------------
        // Stale events (drop silently)
        // -----------------
        (_, SourceStarted { id }) if is_stale(id) => (state.clone(), vec![]),
        (_, SourceEnded { id }) if is_stale(id) => (state.clone(), vec![]),
        (_, SourceFailed { id, .. }) if is_stale(id) => (state.clone(), vec![]),
        (_, Interim { id, .. }) if is_stale(id) => (state.clone(), vec![]),
        (_, Final { id, .. }) if is_stale(id) => (state.clone(), vec![]),

        // -----------------
        // Unhandled: no transition (includes lapsed timer instances)
        // -----------------
        _ => (state.clone(), vec![]),
    }
}

/// Finalize a segment: last detection pass, final transcript line, close
/// notification. Empty segments close silently.
fn close_segment(segment: &mut SegmentState, full: String, ctx: &ReduceContext) -> Vec<Effect> {
    if full.is_empty() {
        return Vec::new();
    }

    let mut effects = Vec::new();
    let fresh = scan(&full, &ctx.forbidden, &mut segment.alerted);
    if !fresh.is_empty() {
        segment.had_hit = true;
    }
    for word in fresh {
        effects.push(Effect::Alert { word });
    }
    effects.push(Effect::TranscriptLine {
        text: full.clone(),
        provisional: false,
    });
    effects.push(Effect::SegmentClosed {
        text: full,
        had_hit: segment.had_hit,
    });
    effects
}
