//! Application-level configuration loading, including game tuning and word banks.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::models::{Difficulty, GameKind};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "WORDPLAY_BACK_CONFIG_PATH";

/// Which storage backend the server should install at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// MongoDB-backed persistence (requires the `mongo-store` feature).
    MongoDb,
    /// In-process map, lost on restart. Useful for local runs and tests.
    Memory,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Minimum number of reachable players required to start any game.
    pub min_players: usize,
    /// Storage backend selection and write tuning.
    pub storage: StorageConfig,
    /// Catch-the-word variant tuning.
    pub catch_word: CatchWordConfig,
    /// Word-chain variant tuning.
    pub word_chain: WordChainConfig,
    /// External word-definition service settings.
    pub dictionary: DictionaryConfig,
}

#[derive(Debug, Clone)]
/// Persistence settings.
pub struct StorageConfig {
    /// Backend installed by the storage supervisor.
    pub backend: StorageBackend,
    /// Bounded retry count for versioned full-document writes.
    pub max_write_attempts: u32,
    /// How long finished-game round records are retained, in seconds.
    pub round_retention_seconds: u64,
}

#[derive(Debug, Clone)]
/// Tuning for the drawing-and-guessing game.
pub struct CatchWordConfig {
    /// Number of rounds a full game runs.
    pub total_rounds: u32,
    /// Guessing time per round, in seconds.
    pub round_seconds: u64,
    /// Flat points awarded for any correct answer.
    pub base_points: u32,
    /// Extra points per consecutive-correct-round streak step.
    pub streak_bonus: u32,
    /// Flat points the drawer earns per correct guesser.
    pub drawer_bonus: u32,
    /// Whole-game budget before the expiry timer force-ends the session.
    pub game_duration_seconds: u64,
    /// Secret-word pools per difficulty tier.
    pub word_banks: WordBanks,
}

#[derive(Debug, Clone)]
/// Tuning for the word-chain game.
pub struct WordChainConfig {
    /// Flat points awarded for any accepted word.
    pub base_points: u32,
    /// Extra points per character of the accepted word.
    pub length_bonus: u32,
    /// Turn budget for the first round, in seconds.
    pub initial_turn_seconds: u64,
    /// Seconds removed from the budget each round.
    pub turn_shrink_step: u64,
    /// Budget floor the shrink schedule never goes below.
    pub min_turn_seconds: u64,
    /// Whole-game budget before the expiry timer force-ends the session.
    pub game_duration_seconds: u64,
    /// Pool of starter words a new session draws from.
    pub starter_words: Vec<String>,
}

#[derive(Debug, Clone)]
/// External word-definition service settings.
pub struct DictionaryConfig {
    /// Base URL of the definition endpoint; the word is appended as a path segment.
    pub endpoint: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
/// Secret-word pools for the catch-the-word game.
pub struct WordBanks {
    /// Short everyday words.
    pub easy: Vec<String>,
    /// The default pool.
    pub medium: Vec<String>,
    /// Longer or less common words.
    pub hard: Vec<String>,
}

impl WordBanks {
    /// Pool matching the requested difficulty.
    pub fn pool(&self, difficulty: Difficulty) -> &[String] {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    /// Draw a random secret word at the requested difficulty.
    ///
    /// Word banks are never empty: the built-in defaults back any pool the
    /// config file left out, and an explicitly emptied pool falls back to the
    /// medium tier.
    pub fn draw(&self, difficulty: Difficulty) -> String {
        let mut rng = rand::rng();
        let pool = self.pool(difficulty);
        pool.choose(&mut rng)
            .or_else(|| self.medium.choose(&mut rng))
            .cloned()
            .unwrap_or_else(|| "pencil".to_owned())
    }
}

impl WordChainConfig {
    /// Draw a random starter word for a fresh session.
    pub fn draw_starter(&self) -> String {
        let mut rng = rand::rng();
        self.starter_words
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| "start".to_owned())
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Whole-game duration for the given variant, used to arm the expiry timer.
    pub fn game_duration_seconds(&self, kind: GameKind) -> u64 {
        match kind {
            GameKind::CatchWord => self.catch_word.game_duration_seconds,
            GameKind::WordChain => self.word_chain.game_duration_seconds,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every section and field is optional; missing values take the built-in defaults.
struct RawConfig {
    min_players: Option<usize>,
    storage: Option<RawStorage>,
    catch_word: Option<RawCatchWord>,
    word_chain: Option<RawWordChain>,
    dictionary: Option<RawDictionary>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStorage {
    backend: Option<StorageBackend>,
    max_write_attempts: Option<u32>,
    round_retention_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCatchWord {
    total_rounds: Option<u32>,
    round_seconds: Option<u64>,
    base_points: Option<u32>,
    streak_bonus: Option<u32>,
    drawer_bonus: Option<u32>,
    game_duration_seconds: Option<u64>,
    word_banks: Option<RawWordBanks>,
}

#[derive(Debug, Default, Deserialize)]
struct RawWordBanks {
    easy: Option<Vec<String>>,
    medium: Option<Vec<String>>,
    hard: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawWordChain {
    base_points: Option<u32>,
    length_bonus: Option<u32>,
    initial_turn_seconds: Option<u64>,
    turn_shrink_step: Option<u64>,
    min_turn_seconds: Option<u64>,
    game_duration_seconds: Option<u64>,
    starter_words: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDictionary {
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let storage = value.storage.unwrap_or_default();
        let catch_word = value.catch_word.unwrap_or_default();
        let word_banks = catch_word.word_banks.unwrap_or_default();
        let word_chain = value.word_chain.unwrap_or_default();
        let dictionary = value.dictionary.unwrap_or_default();

        Self {
            min_players: value.min_players.unwrap_or(2),
            storage: StorageConfig {
                backend: storage.backend.unwrap_or(StorageBackend::MongoDb),
                max_write_attempts: storage.max_write_attempts.unwrap_or(3),
                round_retention_seconds: storage.round_retention_seconds.unwrap_or(86_400),
            },
            catch_word: CatchWordConfig {
                total_rounds: catch_word.total_rounds.unwrap_or(5),
                round_seconds: catch_word.round_seconds.unwrap_or(60),
                base_points: catch_word.base_points.unwrap_or(10),
                streak_bonus: catch_word.streak_bonus.unwrap_or(2),
                drawer_bonus: catch_word.drawer_bonus.unwrap_or(5),
                game_duration_seconds: catch_word.game_duration_seconds.unwrap_or(600),
                word_banks: WordBanks {
                    easy: word_banks.easy.unwrap_or_else(default_easy_words),
                    medium: word_banks.medium.unwrap_or_else(default_medium_words),
                    hard: word_banks.hard.unwrap_or_else(default_hard_words),
                },
            },
            word_chain: WordChainConfig {
                base_points: word_chain.base_points.unwrap_or(5),
                length_bonus: word_chain.length_bonus.unwrap_or(2),
                initial_turn_seconds: word_chain.initial_turn_seconds.unwrap_or(30),
                turn_shrink_step: word_chain.turn_shrink_step.unwrap_or(2),
                min_turn_seconds: word_chain.min_turn_seconds.unwrap_or(10),
                game_duration_seconds: word_chain.game_duration_seconds.unwrap_or(600),
                starter_words: word_chain
                    .starter_words
                    .unwrap_or_else(default_starter_words),
            },
            dictionary: DictionaryConfig {
                endpoint: dictionary
                    .endpoint
                    .unwrap_or_else(|| "https://api.dictionaryapi.dev/api/v2/entries/en".into()),
                timeout_ms: dictionary.timeout_ms.unwrap_or(2_000),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|word| (*word).to_owned()).collect()
}

/// Built-in easy word bank shipped with the binary.
fn default_easy_words() -> Vec<String> {
    words(&[
        "cat", "sun", "book", "fish", "tree", "door", "milk", "shoe", "ball", "star", "rain",
        "cake", "bird", "hand", "moon", "sock", "bear", "ring", "leaf", "frog",
    ])
}

/// Built-in medium word bank shipped with the binary.
fn default_medium_words() -> Vec<String> {
    words(&[
        "pencil", "window", "garden", "rocket", "bridge", "ladder", "castle", "mirror", "violin",
        "anchor", "helmet", "candle", "dragon", "island", "lantern", "panda", "pirate", "tunnel",
        "wagon", "zipper",
    ])
}

/// Built-in hard word bank shipped with the binary.
fn default_hard_words() -> Vec<String> {
    words(&[
        "lighthouse", "avalanche", "telescope", "submarine", "orchestra", "parachute", "labyrinth",
        "chandelier", "hourglass", "volcano", "waterfall", "scarecrow", "typewriter", "catapult",
        "juggler", "periscope", "stalagmite", "metronome", "gargoyle", "kaleidoscope",
    ])
}

/// Built-in starter pool for the word-chain game.
fn default_starter_words() -> Vec<String> {
    words(&[
        "apple", "stone", "river", "cloud", "tiger", "music", "light", "dream", "grape", "plant",
        "earth", "smile", "ocean", "night", "bread",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.min_players, 2);
        assert_eq!(cfg.catch_word.base_points, 10);
        assert_eq!(cfg.catch_word.streak_bonus, 2);
        assert_eq!(cfg.catch_word.drawer_bonus, 5);
        assert_eq!(cfg.word_chain.base_points, 5);
        assert_eq!(cfg.word_chain.initial_turn_seconds, 30);
        assert_eq!(cfg.word_chain.min_turn_seconds, 10);
        assert_eq!(cfg.storage.max_write_attempts, 3);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"catch_word": {"round_seconds": 45}}"#).unwrap();
        let cfg: AppConfig = raw.into();
        assert_eq!(cfg.catch_word.round_seconds, 45);
        assert_eq!(cfg.catch_word.total_rounds, 5);
        assert!(!cfg.catch_word.word_banks.medium.is_empty());
    }

    #[test]
    fn draw_falls_back_to_medium_pool_when_tier_is_empty() {
        let mut cfg = AppConfig::default();
        cfg.catch_word.word_banks.hard.clear();
        let word = cfg.catch_word.word_banks.draw(Difficulty::Hard);
        assert!(cfg.catch_word.word_banks.medium.contains(&word));
    }
}
