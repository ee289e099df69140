//! Pure scoring formulas and the word-chain turn budget schedule.

use crate::config::{CatchWordConfig, WordChainConfig};

/// Points for a correct catch-the-word answer.
///
/// `base + floor((limit - elapsed) / 2) + streak * streak_bonus`, with the
/// time bonus clamped at zero for answers slower than the limit. `streak` is
/// the count of consecutive correct rounds *before* this answer.
pub fn catch_word_points(
    cfg: &CatchWordConfig,
    limit_seconds: u64,
    elapsed_seconds: u64,
    streak: u32,
) -> u32 {
    let time_bonus = limit_seconds.saturating_sub(elapsed_seconds) / 2;
    cfg.base_points + time_bonus as u32 + streak * cfg.streak_bonus
}

/// Points for an accepted word-chain word.
///
/// Monotonically increasing in both remaining time and word length:
/// `base + chars * length_bonus + floor(remaining / 2)`.
pub fn word_chain_points(cfg: &WordChainConfig, remaining_seconds: u64, word_chars: usize) -> u32 {
    let time_bonus = remaining_seconds / 2;
    cfg.base_points + word_chars as u32 * cfg.length_bonus + time_bonus as u32
}

/// Turn budget for a word-chain round: shrinks by `turn_shrink_step` each
/// round, floored at `min_turn_seconds`.
pub fn word_chain_turn_seconds(cfg: &WordChainConfig, round: u32) -> u64 {
    cfg.initial_turn_seconds
        .saturating_sub(u64::from(round.max(1) - 1) * cfg.turn_shrink_step)
        .max(cfg.min_turn_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn catch_word_scenario_from_the_rules() {
        // 60s limit, answer at 10s, no streak: 10 + floor(50 * 0.5) + 0 = 35.
        let cfg = AppConfig::default().catch_word;
        assert_eq!(catch_word_points(&cfg, 60, 10, 0), 35);
    }

    #[test]
    fn catch_word_streak_adds_two_per_step() {
        let cfg = AppConfig::default().catch_word;
        assert_eq!(catch_word_points(&cfg, 60, 10, 3), 41);
    }

    #[test]
    fn faster_answers_never_score_less() {
        let cfg = AppConfig::default().catch_word;
        for limit in [30u64, 60, 90] {
            let mut previous = u32::MAX;
            for elapsed in 0..=limit + 10 {
                let points = catch_word_points(&cfg, limit, elapsed, 2);
                assert!(points <= previous, "elapsed {elapsed} within limit {limit}");
                previous = points;
            }
        }
    }

    #[test]
    fn overtime_answers_still_earn_the_base() {
        let cfg = AppConfig::default().catch_word;
        assert_eq!(catch_word_points(&cfg, 60, 75, 0), cfg.base_points);
    }

    #[test]
    fn word_chain_points_grow_with_length_and_speed() {
        let cfg = AppConfig::default().word_chain;
        assert!(word_chain_points(&cfg, 20, 5) > word_chain_points(&cfg, 10, 5));
        assert!(word_chain_points(&cfg, 20, 8) > word_chain_points(&cfg, 20, 5));
    }

    #[test]
    fn turn_budget_shrinks_to_the_floor() {
        let cfg = AppConfig::default().word_chain;
        assert_eq!(word_chain_turn_seconds(&cfg, 1), 30);
        assert_eq!(word_chain_turn_seconds(&cfg, 2), 28);
        assert_eq!(word_chain_turn_seconds(&cfg, 11), 10);
        // Deep rounds never dip below the floor.
        assert_eq!(word_chain_turn_seconds(&cfg, 500), 10);
    }
}
