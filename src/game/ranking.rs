//! Converts elimination history into final standings

use crate::ws::protocol::RankingEntry;

use super::entity::{Elimination, Player};

/// Build the final standings at termination.
///
/// Rank 1 is the winner if one exists; everyone else ranks in reverse
/// elimination order, so the most recently eliminated player sits
/// immediately below the winner and the first-eliminated ranks last.
pub fn build_rankings(winner: Option<&Player>, eliminations: &[Elimination]) -> Vec<RankingEntry> {
    let mut rankings = Vec::with_capacity(eliminations.len() + usize::from(winner.is_some()));

    if let Some(winner) = winner {
        rankings.push(RankingEntry {
            id: winner.id,
            name: winner.name.clone(),
            rank: 1,
            survived: true,
            killed_by: None,
            reason: None,
        });
    }

    let mut rank = if winner.is_some() { 2 } else { 1 };
    for elim in eliminations.iter().rev() {
        rankings.push(RankingEntry {
            id: elim.player_id,
            name: elim.name.clone(),
            rank,
            survived: false,
            killed_by: elim.killed_by,
            reason: Some(elim.reason),
        });
        rank += 1;
    }

    rankings
}
