//! Karot: a forbidden-word party game pipeline.
//!
//! Players speak; a speech source streams interim and final text fragments;
//! the pipeline merges them into utterance segments, flags forbidden words,
//! and drives score, streak and achievement state. Rendering is not our
//! business: a [`PresentationSink`] receives transcript lines, alerts and
//! stats and draws them however it likes.
//!
//! Everything is explicitly constructed — build a [`GameWorld`] from a
//! [`Store`], pick a [`speech::SpeechSource`], implement a sink, and wire
//! them into a [`GameRuntime`]. No process-wide singletons; as many
//! runtimes as you want.

mod detection;
mod effects;
mod game;
mod settings;
pub mod speech;
mod state_machine;
mod store;
mod transcript;

pub use detection::{highlight, scan, HighlightedLine, Span, WordList};
pub use effects::{EffectRunner, SourceEffectRunner};
pub use game::{
    Achievement, AchievementBook, GameStats, Leaderboard, LeaderboardEntry, Player, Roster,
    StatsRecord, StatsSnapshot, SuccessReport,
};
pub use settings::GameSettings;
pub use state_machine::{reduce, Effect, Event, ReduceContext, SegmentState, SessionState};
pub use store::{Store, StoreError};
pub use transcript::{merge, SegmentAccumulator};

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use speech::SpeechSource;
use store::{ACHIEVEMENTS_KEY, LEADERBOARD_KEY, PLAYERS_KEY, STATS_KEY, WORDS_KEY};

/// Receives pipeline output. All methods default to no-ops so a sink only
/// implements what it renders.
pub trait PresentationSink: Send + Sync + 'static {
    fn on_transcript_line(&self, _line: &HighlightedLine, _provisional: bool) {}
    fn on_alert(&self, _word: &str) {}
    fn on_stats_changed(&self, _stats: &StatsSnapshot) {}
    fn on_level_up(&self, _level: u32) {}
    fn on_achievement_unlocked(&self, _id: &str) {}
    fn on_status_changed(&self, _listening: bool) {}
    fn on_session_error(&self, _message: &str) {}
}

/// All mutable game state plus its backing store.
pub struct GameWorld {
    pub settings: GameSettings,
    pub store: Store,
    pub words: WordList,
    pub stats: GameStats,
    pub achievements: AchievementBook,
    pub players: Roster,
    pub leaderboard: Leaderboard,
}

impl GameWorld {
    /// Load everything the store has, falling back to defaults on missing
    /// or corrupt records.
    pub fn load(store: Store) -> Self {
        let settings = GameSettings::load(&store);
        Self::with_settings(store, settings)
    }

    pub fn with_settings(store: Store, settings: GameSettings) -> Self {
        Self {
            settings,
            words: store.load_or_default(WORDS_KEY),
            stats: GameStats::from_record(store.load_or_default(STATS_KEY)),
            achievements: AchievementBook::from_saved(store.load_or(ACHIEVEMENTS_KEY, Vec::new)),
            players: store.load_or_default(PLAYERS_KEY),
            leaderboard: store.load_or_default(LEADERBOARD_KEY),
            store,
        }
    }

    pub fn save_words(&self) {
        self.persist(WORDS_KEY, &self.words);
    }

    pub fn save_stats(&self) {
        self.persist(STATS_KEY, self.stats.record());
    }

    pub fn save_achievements(&self) {
        self.persist(ACHIEVEMENTS_KEY, &self.achievements.all().to_vec());
    }

    pub fn save_players(&self) {
        self.persist(PLAYERS_KEY, &self.players);
    }

    pub fn save_leaderboard(&self) {
        self.persist(LEADERBOARD_KEY, &self.leaderboard);
    }

    fn persist<T: serde::Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.store.save(key, value) {
            log::warn!("world: failed to persist {:?}: {}", key, e);
        }
    }
}

/// A running game: the state loop plus handles to drive it.
pub struct GameRuntime {
    tx: mpsc::Sender<Event>,
    world: Arc<Mutex<GameWorld>>,
}

impl GameRuntime {
    /// Wire the pipeline and spawn its state loop. Must be called within a
    /// tokio runtime.
    pub fn new(
        world: GameWorld,
        source: Arc<dyn SpeechSource>,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Event>(32);
        let world = Arc::new(Mutex::new(world));
        let runner = SourceEffectRunner::new(source);

        tokio::spawn(run_state_loop(
            world.clone(),
            sink,
            runner,
            rx,
            tx.clone(),
        ));

        Self { tx, world }
    }

    /// Begin listening. The session becomes active once the source reports.
    pub async fn start(&self) {
        let _ = self.tx.send(Event::StartRequested).await;
    }

    /// Stop listening, flushing any pending segment. Idempotent.
    pub async fn stop(&self) {
        let _ = self.tx.send(Event::StopRequested).await;
    }

    /// Tear down the state loop.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Event::Shutdown).await;
    }

    pub fn world(&self) -> Arc<Mutex<GameWorld>> {
        self.world.clone()
    }

    pub async fn stats(&self) -> StatsSnapshot {
        let world = self.world.lock().await;
        let is_playing = world.stats.is_in_session();
        world.stats.snapshot(is_playing)
    }

    pub async fn add_word(&self, raw: &str) -> bool {
        let mut world = self.world.lock().await;
        let added = world.words.add(raw);
        if added {
            world.save_words();
        }
        added
    }

    pub async fn remove_word(&self, raw: &str) -> bool {
        let mut world = self.world.lock().await;
        let removed = world.words.remove(raw);
        if removed {
            world.save_words();
        }
        removed
    }

    pub async fn add_player(&self, name: &str) -> bool {
        let mut world = self.world.lock().await;
        let added = world.players.add(name);
        if added {
            world.save_players();
        }
        added
    }

    pub async fn add_penalty(&self, index: usize) -> Option<u32> {
        let mut world = self.world.lock().await;
        let score = world.players.add_penalty(index);
        if score.is_some() {
            world.save_players();
        }
        score
    }

    pub async fn reset_scores(&self) {
        let mut world = self.world.lock().await;
        world.players.reset_scores();
        world.save_players();
    }

    /// Record a player's final result on the leaderboard.
    pub async fn record_result(&self, player_name: &str, score: u32) -> LeaderboardEntry {
        let mut world = self.world.lock().await;
        let is_playing = world.stats.is_in_session();
        let snapshot = world.stats.snapshot(is_playing);
        let entry = world.leaderboard.add_entry(player_name, score, &snapshot);
        world.save_leaderboard();
        entry
    }
}

/// The main state loop: receive an event, reduce, execute effects.
///
/// Pipeline-output effects run inline here (they need the world and the
/// sink); source and timer effects go through the runner.
async fn run_state_loop(
    world: Arc<Mutex<GameWorld>>,
    sink: Arc<dyn PresentationSink>,
    runner: Arc<dyn EffectRunner>,
    mut rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
) {
    let mut state = SessionState::default();
    log::info!("state loop started");

    while let Some(event) = rx.recv().await {
        if matches!(event, Event::Shutdown) {
            log::info!("shutdown requested, leaving state loop");
            break;
        }

        let ctx = {
            let world = world.lock().await;
            ReduceContext::new(&world.settings, world.words.words())
        };

        let old_discriminant = std::mem::discriminant(&state);
        let (next, effects) = reduce(&state, event, &ctx);
        if old_discriminant != std::mem::discriminant(&next) {
            log::info!("session transition: {:?} -> {:?}", state, next);
        }
        state = next;

        for effect in effects {
            match effect {
                Effect::TranscriptLine { text, provisional } => {
                    let world = world.lock().await;
                    let line = highlight(&text, world.words.words());
                    sink.on_transcript_line(&line, provisional);
                }

                Effect::Alert { word } => {
                    let mut world = world.lock().await;
                    world.stats.record_forbidden_hit();
                    world.save_stats();
                    sync_achievements(&mut world, &sink, state.is_listening());
                    sink.on_alert(&word);
                }

                Effect::SegmentClosed { had_hit, .. } => {
                    let mut world = world.lock().await;
                    world.stats.record_word_detected();
                    if !had_hit {
                        let award = world.settings.experience_per_success;
                        let report = world.stats.record_success(award);
                        for level in report.level_ups {
                            sink.on_level_up(level);
                        }
                    }
                    world.save_stats();
                    sync_achievements(&mut world, &sink, state.is_listening());
                }

                Effect::SessionStarted => {
                    let mut world = world.lock().await;
                    world.stats.start_session();
                    world.save_stats();
                    sink.on_status_changed(true);
                }

                Effect::SessionEnded => {
                    let mut world = world.lock().await;
                    let seconds = world.stats.stop_session();
                    for id in world.achievements.record_play_time(seconds) {
                        sink.on_achievement_unlocked(&id);
                    }
                    if world.stats.session_clean() {
                        for id in world.achievements.record_clean_session() {
                            sink.on_achievement_unlocked(&id);
                        }
                    }
                    world.save_stats();
                    world.save_achievements();
                    sink.on_status_changed(false);
                }

                Effect::SessionError { error } => {
                    log::error!("session error: {}", error);
                    sink.on_session_error(&error.to_string());
                }

                Effect::EmitStats => {
                    let world = world.lock().await;
                    sink.on_stats_changed(&world.stats.snapshot(state.is_listening()));
                }

                other => runner.spawn(other, tx.clone()),
            }
        }
    }

    log::info!("state loop ended");
}

/// Feed the current stats into the achievement book and notify unlocks.
fn sync_achievements(world: &mut GameWorld, sink: &Arc<dyn PresentationSink>, is_playing: bool) {
    let snapshot = world.stats.snapshot(is_playing);
    for id in world.achievements.observe_stats(&snapshot) {
        sink.on_achievement_unlocked(&id);
    }
    world.save_achievements();
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;
    impl PresentationSink for NullSink {}

    fn temp_world() -> (tempfile::TempDir, GameWorld) {
        let dir = tempfile::tempdir().unwrap();
        let world = GameWorld::load(Store::at(dir.path().join("karot")));
        (dir, world)
    }

    #[test]
    fn world_loads_defaults_from_an_empty_store() {
        let (_guard, world) = temp_world();
        assert_eq!(world.words.words(), ["elma", "bu", "yani", "şey"]);
        assert!(world.players.is_empty());
        assert_eq!(world.stats.record().level, 1);
        assert_eq!(world.achievements.unlocked_count(), 0);
    }

    #[tokio::test]
    async fn word_changes_persist_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path().join("karot"));

        let runtime = GameRuntime::new(
            GameWorld::load(store.clone()),
            Arc::new(speech::ScriptedSource::new(vec![])),
            Arc::new(NullSink),
        );
        assert!(runtime.add_word("karpuz").await);
        assert!(!runtime.add_word("karpuz").await);
        assert!(runtime.remove_word("elma").await);
        runtime.shutdown().await;

        let reloaded = GameWorld::load(store);
        assert!(reloaded.words.words().contains(&"karpuz".to_string()));
        assert!(!reloaded.words.words().contains(&"elma".to_string()));
    }

    #[tokio::test]
    async fn penalties_and_results_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path().join("karot"));

        let runtime = GameRuntime::new(
            GameWorld::load(store.clone()),
            Arc::new(speech::ScriptedSource::new(vec![])),
            Arc::new(NullSink),
        );
        assert!(runtime.add_player("Ayşe").await);
        assert_eq!(runtime.add_penalty(0).await, Some(1));
        let entry = runtime.record_result("Ayşe", 1).await;
        assert_eq!(entry.player_name, "Ayşe");
        runtime.shutdown().await;

        let reloaded = GameWorld::load(store);
        assert_eq!(reloaded.players.players()[0].score, 1);
        assert_eq!(reloaded.leaderboard.entries().len(), 1);
    }
}
