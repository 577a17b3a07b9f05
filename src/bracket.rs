use std::collections::HashMap;

use crate::types::{Competitor, CompetitorIndex};
use crate::win_matrix::WinMatrix;

/// Result applied without asking the driver, because the closure already decides it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoResult {
  pub winner: CompetitorIndex,
  pub loser: CompetitorIndex,
}

/// What one round of Swiss pairing produces before it is applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundPlan {
  /// Pairs whose outcome is unknown and must actually be played, in position order.
  pub pairings: Vec<(CompetitorIndex, CompetitorIndex)>,
  pub resolved: Vec<AutoResult>,
  pub byes: Vec<CompetitorIndex>,
}

impl RoundPlan {
  pub fn is_playable(&self) -> bool {
    !self.pairings.is_empty()
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
  /// No group holds two or more competitors.
  Complete,
  Planned(RoundPlan),
}

/// Groups real competitors by `(rounds_played, score)`.
///
/// Groups come out in order of first appearance when walking competitors by
/// index, and each group is sorted by index. Padding entries are never grouped.
pub fn group_competitors(competitors: &[Competitor]) -> Vec<Vec<CompetitorIndex>> {
  let mut slots: HashMap<(u32, i64), usize> = HashMap::new();
  let mut groups: Vec<Vec<CompetitorIndex>> = Vec::new();
  for competitor in competitors.iter().filter(|c| !c.synthetic) {
    let slot = *slots.entry(competitor.group_key()).or_insert_with(|| {
      groups.push(Vec::new());
      groups.len() - 1
    });
    groups[slot].push(competitor.index);
  }
  for group in groups.iter_mut() {
    group.sort_unstable();
  }
  groups
}

pub fn is_finished(groups: &[Vec<CompetitorIndex>]) -> bool {
  !groups.iter().any(|group| group.len() >= 2)
}

/// Builds the next round from the current standings without mutating anything.
pub fn plan_round(competitors: &[Competitor], matrix: &WinMatrix) -> RoundOutcome {
  let groups = group_competitors(competitors);
  if is_finished(&groups) {
    return RoundOutcome::Complete;
  }

  let mut plan = RoundPlan::default();
  for group in &groups {
    let mut pairs = group.chunks_exact(2);
    for pair in pairs.by_ref() {
      let (a, b) = (pair[0], pair[1]);
      match matrix.known_winner(a, b) {
        Some(winner) => {
          let loser = if winner == a { b } else { a };
          plan.resolved.push(AutoResult { winner, loser });
        }
        None => plan.pairings.push((a, b)),
      }
    }
    if let [odd] = pairs.remainder() {
      plan.byes.push(*odd);
    }
  }
  RoundOutcome::Planned(plan)
}

/// Applies the automatic results and byes of a plan. Pairings are left to the engine.
pub fn apply_plan(competitors: &mut [Competitor], plan: &RoundPlan) {
  for result in &plan.resolved {
    apply_result(competitors, result.winner, result.loser);
  }
  for &index in &plan.byes {
    competitors[index].rounds_played += 1;
  }
}

pub fn apply_result(competitors: &mut [Competitor], winner: CompetitorIndex, loser: CompetitorIndex) {
  let w = &mut competitors[winner];
  w.score += 1;
  w.rounds_played += 1;
  let l = &mut competitors[loser];
  l.score -= 1;
  l.rounds_played += 1;
}

/// Smallest power of two that holds `count` entries.
pub fn padded_size(count: usize) -> usize {
  count.max(1).next_power_of_two()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pool(n: usize) -> Vec<Competitor> {
    (0..n).map(|i| Competitor::real(i, format!("image-{i}"))).collect()
  }

  #[test]
  fn test_padded_size() {
    assert_eq!(padded_size(2), 2);
    assert_eq!(padded_size(3), 4);
    assert_eq!(padded_size(4), 4);
    assert_eq!(padded_size(5), 8);
    assert_eq!(padded_size(17), 32);
  }

  #[test]
  fn test_first_round_pairs_in_index_order_with_bye() {
    let competitors = pool(5);
    let matrix = WinMatrix::new(5);

    let RoundOutcome::Planned(plan) = plan_round(&competitors, &matrix) else {
      panic!("expected a planned round");
    };
    assert_eq!(plan.pairings, vec![(0, 1), (2, 3)]);
    assert_eq!(plan.byes, vec![4]);
    assert!(plan.resolved.is_empty());
  }

  #[test]
  fn test_groups_follow_first_appearance() {
    let mut competitors = pool(4);
    apply_result(&mut competitors, 0, 1);
    apply_result(&mut competitors, 2, 3);

    let groups = group_competitors(&competitors);
    assert_eq!(groups, vec![vec![0, 2], vec![1, 3]]);
  }

  #[test]
  fn test_known_results_are_resolved_automatically() {
    let mut competitors = pool(4);
    let mut matrix = WinMatrix::new(4);
    apply_result(&mut competitors, 0, 1);
    apply_result(&mut competitors, 2, 3);
    matrix.record(0, 1).unwrap();
    matrix.record(2, 3).unwrap();
    // 2 is already known to beat 0 through an earlier chain.
    matrix.record(2, 0).unwrap();

    let RoundOutcome::Planned(plan) = plan_round(&competitors, &matrix) else {
      panic!("expected a planned round");
    };
    assert_eq!(plan.resolved, vec![AutoResult { winner: 2, loser: 0 }]);
    assert_eq!(plan.pairings, vec![(1, 3)]);

    apply_plan(&mut competitors, &plan);
    assert_eq!(competitors[2].group_key(), (2, 2));
    assert_eq!(competitors[0].group_key(), (2, 0));
    // Pairings are untouched until played.
    assert_eq!(competitors[1].group_key(), (1, -1));
  }

  #[test]
  fn test_byes_keep_score() {
    let mut competitors = pool(3);
    let plan = RoundPlan {
      pairings: vec![(0, 1)],
      resolved: Vec::new(),
      byes: vec![2],
    };
    apply_plan(&mut competitors, &plan);
    assert_eq!(competitors[2].group_key(), (1, 0));
  }

  #[test]
  fn test_synthetic_entries_are_never_grouped() {
    let mut competitors = pool(3);
    competitors.push(Competitor::synthetic(3, 0));
    let groups = group_competitors(&competitors);
    assert_eq!(groups, vec![vec![0, 1, 2]]);
  }

  #[test]
  fn test_completion_when_all_groups_are_singletons() {
    let mut competitors = pool(3);
    apply_result(&mut competitors, 0, 1);
    competitors[2].rounds_played += 1;

    assert_eq!(plan_round(&competitors, &WinMatrix::new(3)), RoundOutcome::Complete);
  }
}
