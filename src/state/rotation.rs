//! Turn rotation over the immutable seating order.

use std::collections::HashSet;

/// Select the active player for `round`.
///
/// The starting seat is `(round - 1) mod seating.len()`; the scan walks the
/// seating circularly and picks the first reachable player. Rotation is always
/// computed from the original seating order, never from the shrinking
/// reachable set, so relative order survives disconnects and reconnects. When
/// no seat is reachable (a player joined mid-game, say) the smallest reachable
/// player is a deterministic fallback. Returns `None` only when `reachable` is
/// empty.
pub fn next_active_player(
    seating: &[String],
    reachable: &HashSet<String>,
    round: u32,
) -> Option<String> {
    if reachable.is_empty() {
        return None;
    }

    if !seating.is_empty() {
        let start = ((round.max(1) - 1) as usize) % seating.len();
        for offset in 0..seating.len() {
            let seat = &seating[(start + offset) % seating.len()];
            if reachable.contains(seat) {
                return Some(seat.clone());
            }
        }
    }

    reachable.iter().min().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seating(players: &[&str]) -> Vec<String> {
        players.iter().map(|player| (*player).to_owned()).collect()
    }

    fn reachable(players: &[&str]) -> HashSet<String> {
        players.iter().map(|player| (*player).to_owned()).collect()
    }

    #[test]
    fn rotates_through_seats_round_by_round() {
        let seats = seating(&["a", "b", "c"]);
        let all = reachable(&["a", "b", "c"]);

        assert_eq!(next_active_player(&seats, &all, 1), Some("a".into()));
        assert_eq!(next_active_player(&seats, &all, 2), Some("b".into()));
        assert_eq!(next_active_player(&seats, &all, 3), Some("c".into()));
        assert_eq!(next_active_player(&seats, &all, 4), Some("a".into()));
    }

    #[test]
    fn skips_unreachable_seats_without_losing_order() {
        let seats = seating(&["a", "b", "c", "d"]);
        let without_b = reachable(&["a", "c", "d"]);

        // Round 2 would be b's turn; c takes it instead.
        assert_eq!(next_active_player(&seats, &without_b, 2), Some("c".into()));
        // When b reconnects the original order resumes.
        let all = reachable(&["a", "b", "c", "d"]);
        assert_eq!(next_active_player(&seats, &all, 6), Some("b".into()));
    }

    #[test]
    fn always_returns_a_reachable_player() {
        let seats = seating(&["a", "b", "c", "d", "e"]);
        let players = ["a", "b", "c", "d", "e"];

        // Every non-empty subset of the seating, every round offset.
        for mask in 1u32..(1 << players.len()) {
            let subset: Vec<&str> = players
                .iter()
                .enumerate()
                .filter(|(index, _)| mask & (1 << index) != 0)
                .map(|(_, player)| *player)
                .collect();
            let subset = reachable(&subset);
            for round in 1..=10 {
                let picked = next_active_player(&seats, &subset, round).unwrap();
                assert!(subset.contains(&picked), "round {round} mask {mask:b}");
            }
        }
    }

    #[test]
    fn falls_back_to_smallest_reachable_player_off_seating() {
        let seats = seating(&["a", "b"]);
        let strangers = reachable(&["z", "y"]);
        assert_eq!(next_active_player(&seats, &strangers, 3), Some("y".into()));
    }

    #[test]
    fn empty_reachable_set_yields_none() {
        let seats = seating(&["a", "b"]);
        assert_eq!(next_active_player(&seats, &HashSet::new(), 1), None);
    }
}
