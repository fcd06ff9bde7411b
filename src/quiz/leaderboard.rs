use std::cmp::Reverse;
use std::fmt::Write;

use crate::quiz::results::ResultsStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
    pub rank: usize,
}

/// Standings of every participant who has started, finished or not.
///
/// Sorted by score, highest first. Equal scores share a rank (competition
/// ranking: 1, 1, 3) and keep the order in which participants first
/// appeared in the store, not the order in which they reached the score.
/// A `limit` of zero returns everyone.
pub fn top(store: &ResultsStore, limit: usize) -> Vec<LeaderboardEntry> {
    let mut entries = store.all();
    // Stable sort keeps creation order among equal scores.
    entries.sort_by_key(|(_, entry)| Reverse(entry.score));

    let mut ranked = Vec::with_capacity(entries.len());
    let mut previous: Option<(u32, usize)> = None;
    for (position, (_, entry)) in entries.into_iter().enumerate() {
        let rank = match previous {
            Some((score, rank)) if score == entry.score => rank,
            _ => position + 1,
        };
        previous = Some((entry.score, rank));
        ranked.push(LeaderboardEntry {
            name: entry.name,
            score: entry.score,
            rank,
        });
    }

    if limit > 0 {
        ranked.truncate(limit);
    }
    ranked
}

pub fn render(entries: &[LeaderboardEntry], max_score: u32) -> String {
    if entries.is_empty() {
        return "No results yet 😅".to_string();
    }

    let mut text = String::from("🏆 Leaderboard:\n");
    for entry in entries {
        let _ = write!(
            text,
            "\n{}. {} — {}/{}",
            entry.rank, entry.name, entry.score, max_score
        );
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::results::{MemoryBackend, ResultEntry};

    fn store_with(scores: &[(&str, u32)]) -> ResultsStore {
        let store = ResultsStore::fresh(MemoryBackend).unwrap();
        for (name, score) in scores {
            store
                .upsert(
                    name,
                    ResultEntry {
                        name: name.to_string(),
                        score: *score,
                        progress: 0,
                    },
                )
                .unwrap();
        }
        store
    }

    fn summary(entries: &[LeaderboardEntry]) -> Vec<(&str, u32, usize)> {
        entries
            .iter()
            .map(|e| (e.name.as_str(), e.score, e.rank))
            .collect()
    }

    #[test]
    fn ties_share_rank_and_next_rank_skips() {
        let store = store_with(&[("carol", 2), ("ann", 3), ("bob", 3)]);
        assert_eq!(
            summary(&top(&store, 3)),
            [("ann", 3, 1), ("bob", 3, 1), ("carol", 2, 3)]
        );
    }

    #[test]
    fn equal_scores_keep_creation_order() {
        let store = store_with(&[("zed", 1), ("amy", 1), ("max", 4)]);
        assert_eq!(
            summary(&top(&store, 0)),
            [("max", 4, 1), ("zed", 1, 2), ("amy", 1, 2)]
        );
    }

    #[test]
    fn limit_truncates_after_ranking() {
        let store = store_with(&[("a", 5), ("b", 4), ("c", 4), ("d", 1)]);
        assert_eq!(summary(&top(&store, 2)), [("a", 5, 1), ("b", 4, 2)]);
        assert_eq!(top(&store, 0).len(), 4);
        assert_eq!(top(&store, 10).len(), 4);
    }

    #[test]
    fn scores_are_non_increasing() {
        let store = store_with(&[("a", 1), ("b", 7), ("c", 0), ("d", 7), ("e", 3)]);
        let board = top(&store, 0);
        assert!(board.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(
            board.iter().map(|e| e.rank).collect::<Vec<_>>(),
            [1, 1, 3, 4, 5]
        );
    }

    #[test]
    fn renders_lines_and_empty_board() {
        assert_eq!(render(&[], 5), "No results yet 😅");

        let store = store_with(&[("Ann", 3), ("Bob", 1)]);
        assert_eq!(
            render(&top(&store, 0), 3),
            "🏆 Leaderboard:\n\n1. Ann — 3/3\n2. Bob — 1/3"
        );
    }
}
