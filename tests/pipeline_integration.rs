//! End-to-end pipeline tests: a scripted speech source drives the full
//! runtime — accumulator, matcher, session aggregator — and a recording
//! sink captures everything the presentation layer would render.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use karot::speech::{ScriptStep, ScriptedSource, SourceEvent, SpeechError, SpeechSource};
use karot::{
    GameRuntime, GameWorld, HighlightedLine, PresentationSink, StatsSnapshot, Store, WordList,
};

#[derive(Debug, Clone)]
enum SinkRecord {
    Line {
        text: String,
        emphasized: Vec<String>,
        provisional: bool,
    },
    Alert(String),
    Status(bool),
    Achievement(String),
    Error(String),
}

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<SinkRecord>>,
}

impl RecordingSink {
    fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().unwrap().clone()
    }

    fn alerts(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                SinkRecord::Alert(word) => Some(word),
                _ => None,
            })
            .collect()
    }

    fn final_lines(&self) -> Vec<(String, Vec<String>)> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                SinkRecord::Line {
                    text,
                    emphasized,
                    provisional: false,
                } => Some((text, emphasized)),
                _ => None,
            })
            .collect()
    }

    fn achievements(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                SinkRecord::Achievement(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn errors(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                SinkRecord::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, record: SinkRecord) {
        self.records.lock().unwrap().push(record);
    }
}

impl PresentationSink for RecordingSink {
    fn on_transcript_line(&self, line: &HighlightedLine, provisional: bool) {
        self.push(SinkRecord::Line {
            text: line.plain(),
            emphasized: line
                .spans
                .iter()
                .filter(|s| s.emphasized)
                .map(|s| s.text.clone())
                .collect(),
            provisional,
        });
    }

    fn on_alert(&self, word: &str) {
        self.push(SinkRecord::Alert(word.to_string()));
    }

    fn on_status_changed(&self, listening: bool) {
        self.push(SinkRecord::Status(listening));
    }

    fn on_achievement_unlocked(&self, id: &str) {
        self.push(SinkRecord::Achievement(id.to_string()));
    }

    fn on_session_error(&self, message: &str) {
        self.push(SinkRecord::Error(message.to_string()));
    }

    fn on_stats_changed(&self, _stats: &StatsSnapshot) {}
}

fn game_world(store: &Store, words: &[&str]) -> GameWorld {
    let mut world = GameWorld::load(store.clone());
    world.words = WordList::from_raw(words);
    world
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn scripted_game_detects_scores_and_highlights() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::at(dir.path().join("karot"));

    let source = ScriptedSource::new(vec![
        // Segment 1: "elma" alerts once despite three rechecks
        ScriptStep::interim("bir elma"),
        ScriptStep::interim("bir elma yedim"),
        ScriptStep::fin("bir elma yedim"),
        ScriptStep::Wait(10),
        // Segment 2: a fresh segment alerts for "elma" again
        ScriptStep::interim("elma"),
        ScriptStep::fin("elma armut"),
        ScriptStep::Wait(10),
        // Segment 3: clean, extends the streak
        ScriptStep::fin("armut güzel"),
    ]);
    let sink = Arc::new(RecordingSink::default());

    let runtime = GameRuntime::new(
        game_world(&store, &["elma", "şey"]),
        Arc::new(source),
        sink.clone(),
    );
    runtime.start().await;
    settle().await;
    runtime.stop().await;
    settle().await;

    // One alert per word per segment
    assert_eq!(sink.alerts(), ["elma", "elma"]);

    // Finalized transcript lines carry the highlight
    let finals = sink.final_lines();
    assert_eq!(finals.len(), 3);
    assert_eq!(finals[0].0, "bir elma yedim");
    assert_eq!(finals[0].1, ["elma"]);
    assert_eq!(finals[2].0, "armut güzel");
    assert!(finals[2].1.is_empty());

    // Session aggregation: 3 attempts, 2 hits, one clean success
    let stats = runtime.stats().await;
    assert_eq!(stats.total_words_detected, 3);
    assert_eq!(stats.total_forbidden_hits, 2);
    assert_eq!(stats.current_streak, 1);
    assert_eq!(stats.best_streak, 1);
    assert_eq!(stats.experience, 10);
    assert!((stats.accuracy - 100.0 / 3.0).abs() < 0.01);

    // The first hit unlocked the first-step achievement, exactly once
    let achievements = sink.achievements();
    assert_eq!(
        achievements.iter().filter(|id| *id == "first_word").count(),
        1
    );

    // The session went active and back to idle
    let statuses: Vec<bool> = sink
        .records()
        .into_iter()
        .filter_map(|r| match r {
            SinkRecord::Status(listening) => Some(listening),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, [true, false]);

    runtime.shutdown().await;

    // Everything reached the store
    let reloaded = GameWorld::load(store);
    assert_eq!(reloaded.stats.record().total_forbidden_hits, 2);
}

#[tokio::test]
async fn quiet_period_finalizes_a_stalled_segment() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::at(dir.path().join("karot"));

    let mut world = game_world(&store, &["elma"]);
    world.settings.quiet_period_ms = 30;

    let source = ScriptedSource::new(vec![ScriptStep::interim("yarım kalan elma")]);
    let sink = Arc::new(RecordingSink::default());

    let runtime = GameRuntime::new(world, Arc::new(source), sink.clone());
    runtime.start().await;
    settle().await;

    // No Final ever arrived, yet the line was committed by the quiet timer
    let finals = sink.final_lines();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].0, "yarım kalan elma");
    assert_eq!(sink.alerts(), ["elma"]);

    let stats = runtime.stats().await;
    assert_eq!(stats.total_words_detected, 1);

    runtime.stop().await;
    runtime.shutdown().await;
}

#[tokio::test]
async fn stopping_flushes_pending_text_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::at(dir.path().join("karot"));

    let source = ScriptedSource::new(vec![ScriptStep::interim("sözüm yarıda")]);
    let sink = Arc::new(RecordingSink::default());

    let runtime = GameRuntime::new(game_world(&store, &[]), Arc::new(source), sink.clone());
    runtime.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    runtime.stop().await;
    runtime.stop().await; // idempotent
    settle().await;

    let finals = sink.final_lines();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].0, "sözüm yarıda");

    runtime.shutdown().await;
}

struct PermissionRefused;

impl SpeechSource for PermissionRefused {
    fn start(
        &self,
        _events: tokio::sync::mpsc::Sender<SourceEvent>,
    ) -> Result<(), SpeechError> {
        Err(SpeechError::PermissionDenied)
    }
    fn stop(&self) {}
}

#[tokio::test]
async fn denied_microphone_surfaces_and_never_goes_active() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::at(dir.path().join("karot"));
    let sink = Arc::new(RecordingSink::default());

    let runtime = GameRuntime::new(
        game_world(&store, &[]),
        Arc::new(PermissionRefused),
        sink.clone(),
    );
    runtime.start().await;
    settle().await;

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Microphone"));

    // The session never reported active
    assert!(sink
        .records()
        .into_iter()
        .all(|r| !matches!(r, SinkRecord::Status(true))));

    runtime.shutdown().await;
}
