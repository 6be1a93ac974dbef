//! Karot demo: play the game from a terminal.
//!
//! Each line typed on stdin is treated as an utterance (word-by-word
//! interims, then a final), so the whole pipeline — merging, detection,
//! scoring — runs exactly as it would against a live recognizer. With
//! `cloud_enabled` set in the settings and an API key in the environment,
//! the cloud streaming source is tried first and stdin is the fallback.

use std::sync::Arc;

use karot::speech::{self, CloudConfig, CloudSource, FallbackSource, SpeechSource, StdinSource};
use karot::{GameRuntime, GameSettings, GameWorld, HighlightedLine, PresentationSink, StatsSnapshot, Store};

const RED: &str = "\x1b[1;31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

struct ConsoleSink;

impl PresentationSink for ConsoleSink {
    fn on_transcript_line(&self, line: &HighlightedLine, provisional: bool) {
        let rendered = line.render(RED, RESET);
        if provisional {
            println!("{}…{} {}", DIM, RESET, rendered);
        } else {
            println!("▶ {}", rendered);
        }
    }

    fn on_alert(&self, word: &str) {
        println!("{}!! yasak kelime: {}{}", RED, word, RESET);
    }

    fn on_stats_changed(&self, stats: &StatsSnapshot) {
        println!(
            "{}   seri {} · seviye {} ({} / {} xp) · isabet %{:.1}{}",
            DIM,
            stats.current_streak,
            stats.level,
            stats.experience,
            stats.experience_to_next_level,
            stats.accuracy,
            RESET
        );
    }

    fn on_level_up(&self, level: u32) {
        println!("★ seviye atladın: {}", level);
    }

    fn on_achievement_unlocked(&self, id: &str) {
        println!("🏆 başarım açıldı: {}", id);
    }

    fn on_status_changed(&self, listening: bool) {
        if listening {
            println!("— dinleniyor, konuşun —");
        } else {
            println!("— mikrofon kapalı —");
        }
    }

    fn on_session_error(&self, message: &str) {
        eprintln!("hata: {}", message);
    }
}

fn open_store() -> Store {
    match Store::open_default() {
        Ok(store) => store,
        Err(e) => {
            log::warn!("falling back to a temp store: {}", e);
            Store::at(std::env::temp_dir().join("karot"))
        }
    }
}

fn build_source(settings: &GameSettings, store: &Store) -> Arc<dyn SpeechSource> {
    if settings.cloud_enabled {
        let cloud = CloudSource::new(CloudConfig::from_settings(settings))
            .with_usage_meter(speech::usage_meter(store.clone()));
        Arc::new(FallbackSource::new(vec![
            Arc::new(cloud),
            Arc::new(StdinSource::new()),
        ]))
    } else {
        Arc::new(StdinSource::new())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let store = open_store();
    let world = GameWorld::load(store.clone());
    let settings = world.settings.clone();

    println!("Karot — yasaklı kelimeler: {}", world.words.words().join(", "));
    println!("(bir satır yazıp Enter'a basın; çıkmak için Ctrl-C)");

    let runtime = GameRuntime::new(world, build_source(&settings, &store), Arc::new(ConsoleSink));
    runtime.start().await;

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("signal handling failed: {}", e);
    }

    runtime.stop().await;
    // Let the stop flush drain before we print the summary
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let stats = runtime.stats().await;
    println!(
        "\noturum bitti: {} deneme, {} ceza, en iyi seri {}, seviye {}",
        stats.total_words_detected, stats.total_forbidden_hits, stats.best_streak, stats.level
    );
    runtime.shutdown().await;
}
