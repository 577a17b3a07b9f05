use tracing::{debug, error, info};

use crate::bracket::{self, RoundOutcome, RoundPlan};
use crate::decision::DecisionSource;
use crate::error::{SeedError, SubmitError};
use crate::types::*;
use crate::win_matrix::WinMatrix;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
  /// Maximum consecutive rounds resolved without a playable match.
  /// `None` derives the limit from the number of real competitors.
  pub auto_round_limit: Option<u32>,
}

/// Swiss-style tournament over one pool of competitors.
///
/// Lifecycle is `Seeding -> Active -> Completed`. Results enter only through
/// [`TournamentEngine::submit_result`]; every call either applies fully or
/// leaves the engine untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TournamentEngine {
  config: EngineConfig,
  phase: TournamentPhase,
  competitors: Vec<Competitor>,
  real_count: usize,
  matrix: WinMatrix,
  matches: Vec<Match>,
  round_start: usize,
  current_round: u32,
  next_match_id: MatchId,
  matches_played: usize,
  auto_resolved: usize,
  byes_awarded: usize,
  rounds_completed: Option<u32>,
}

impl Default for TournamentEngine {
  fn default() -> Self {
    Self::new(EngineConfig::default())
  }
}

impl TournamentEngine {
  pub fn new(config: EngineConfig) -> Self {
    TournamentEngine {
      config,
      phase: TournamentPhase::Seeding,
      competitors: Vec::new(),
      real_count: 0,
      matrix: WinMatrix::default(),
      matches: Vec::new(),
      round_start: 0,
      current_round: 1,
      next_match_id: 0,
      matches_played: 0,
      auto_resolved: 0,
      byes_awarded: 0,
      rounds_completed: None,
    }
  }

  pub fn seeded<I, S>(labels: I) -> Result<Self, SeedError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut engine = Self::default();
    engine.seed(labels)?;
    Ok(engine)
  }

  /// Seeds the pool, pads it to a power of two and builds round 1.
  pub fn seed<I, S>(&mut self, labels: I) -> Result<RoundStatus, SeedError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    if self.phase != TournamentPhase::Seeding {
      return Err(SeedError::AlreadySeeded);
    }
    let mut competitors: Vec<Competitor> = labels
      .into_iter()
      .enumerate()
      .map(|(index, label)| Competitor::real(index, label.into()))
      .collect();
    let real_count = competitors.len();
    if real_count < MIN_REAL_COMPETITORS {
      return Err(SeedError::InsufficientCompetitors { supplied: real_count });
    }

    let total = bracket::padded_size(real_count);
    for ordinal in 0..total - real_count {
      competitors.push(Competitor::synthetic(real_count + ordinal, ordinal));
    }
    self.matrix.resize(total)?;

    self.competitors = competitors;
    self.real_count = real_count;
    self.phase = TournamentPhase::Active;
    self.current_round = 1;
    info!(real = real_count, padded = total, "tournament seeded");
    Ok(self.build_rounds())
  }

  /// Applies one played result.
  ///
  /// Validation runs before anything changes, so every error leaves the
  /// engine exactly as it was.
  pub fn submit_result(&mut self, match_id: MatchId, winner: CompetitorIndex) -> Result<RoundStatus, SubmitError> {
    if self.phase != TournamentPhase::Active {
      return Err(SubmitError::NotActive { phase: self.phase });
    }
    let slot = self.matches[self.round_start..]
      .iter()
      .position(|m| m.id == match_id)
      .map(|offset| self.round_start + offset)
      .ok_or(SubmitError::UnknownMatch { match_id })?;
    let pending = &self.matches[slot];
    let loser = pending
      .opponent_of(winner)
      .ok_or(SubmitError::InvalidWinner { match_id, winner })?;
    if pending.is_decided() {
      return Err(SubmitError::AlreadyDecided { match_id });
    }

    self.matrix.record(winner, loser)?;
    self.matches[slot].winner = Some(winner);
    bracket::apply_result(&mut self.competitors, winner, loser);
    self.matches_played += 1;
    debug!(round = self.current_round, match_id, winner, loser, "result recorded");

    self.resolve_implied_matches();
    if let Some(next) = self.current_match() {
      return Ok(RoundStatus::AwaitingMatch(next));
    }
    self.current_round += 1;
    Ok(self.build_rounds())
  }

  /// Feeds results from `source` until the tournament completes and returns
  /// the number of played matches.
  pub fn play_out<D>(&mut self, source: &mut D) -> Result<usize, SubmitError>
  where
    D: DecisionSource + ?Sized,
  {
    while let Some(pending) = self.current_match() {
      let winner = source.decide(&pending, &self.competitors);
      self.submit_result(pending.id, winner)?;
    }
    Ok(self.matches_played)
  }

  pub fn current_match(&self) -> Option<Match> {
    if self.phase != TournamentPhase::Active {
      return None;
    }
    self.round_matches().iter().find(|m| !m.is_decided()).cloned()
  }

  pub fn is_completed(&self) -> bool {
    self.phase == TournamentPhase::Completed
  }

  pub fn phase(&self) -> TournamentPhase {
    self.phase
  }

  pub fn current_round(&self) -> u32 {
    self.current_round
  }

  /// Decided matches in the current round.
  pub fn cursor(&self) -> usize {
    self.round_matches().iter().filter(|m| m.is_decided()).count()
  }

  pub fn competitors(&self) -> &[Competitor] {
    &self.competitors
  }

  pub fn competitor(&self, index: CompetitorIndex) -> Option<&Competitor> {
    self.competitors.get(index)
  }

  pub fn matrix(&self) -> &WinMatrix {
    &self.matrix
  }

  /// Every match ever created, in creation order.
  pub fn matches(&self) -> &[Match] {
    &self.matches
  }

  pub fn round_matches(&self) -> &[Match] {
    &self.matches[self.round_start..]
  }

  pub fn total_matches_played(&self) -> usize {
    self.matches_played
  }

  pub fn real_competitor_count(&self) -> usize {
    self.real_count
  }

  pub fn auto_resolved_count(&self) -> usize {
    self.auto_resolved
  }

  pub fn byes_awarded(&self) -> usize {
    self.byes_awarded
  }

  /// Rounds constructed before completion, counting rounds that resolved
  /// without play. `None` until the tournament is over.
  pub fn rounds_completed(&self) -> Option<u32> {
    self.rounds_completed
  }

  /// The estimator's data point, available once the tournament is over.
  pub fn observation(&self, origin: RunOrigin) -> Option<MatchCountObservation> {
    if !self.is_completed() {
      return None;
    }
    Some(MatchCountObservation {
      real_competitor_count: self.real_count,
      total_matches_played: self.matches_played,
      origin,
    })
  }

  /// Real competitors ranked by score, then rounds played, then index.
  /// `beaten` counts opponents proven weaker, directly or through the closure.
  pub fn standings(&self) -> Vec<Standing> {
    let mut ranked: Vec<&Competitor> = self.competitors.iter().filter(|c| !c.synthetic).collect();
    ranked.sort_by(|a, b| {
      b.score
        .cmp(&a.score)
        .then(b.rounds_played.cmp(&a.rounds_played))
        .then(a.index.cmp(&b.index))
    });
    ranked
      .into_iter()
      .enumerate()
      .map(|(pos, c)| Standing {
        rank: pos + 1,
        index: c.index,
        label: c.label.clone(),
        score: c.score,
        rounds_played: c.rounds_played,
        beaten: self.matrix.victims_of(c.index).len(),
      })
      .collect()
  }

  pub fn snapshot(&self) -> TournamentSnapshot {
    TournamentSnapshot {
      phase: self.phase,
      current_round: self.current_round,
      cursor: self.cursor(),
      competitors: self.competitors.clone(),
      round_matches: self.round_matches().to_vec(),
      total_matches_played: self.matches_played,
      auto_resolved: self.auto_resolved,
      byes_awarded: self.byes_awarded,
      rounds_completed: self.rounds_completed,
    }
  }

  fn auto_round_limit(&self) -> u32 {
    self.config.auto_round_limit.unwrap_or_else(|| {
      AUTO_ROUND_LIMIT_BASE + AUTO_ROUND_LIMIT_PER_COMPETITOR * self.real_count as u32
    })
  }

  // Constructs rounds starting at `current_round` until one has a playable
  // match or the pool is fully separated. Loops instead of recursing.
  fn build_rounds(&mut self) -> RoundStatus {
    let limit = self.auto_round_limit().max(1);
    let mut automatic = 0u32;
    loop {
      let plan = match bracket::plan_round(&self.competitors, &self.matrix) {
        RoundOutcome::Complete => {
          self.finish(self.current_round.saturating_sub(1));
          return RoundStatus::Completed;
        }
        RoundOutcome::Planned(plan) => plan,
      };
      bracket::apply_plan(&mut self.competitors, &plan);
      self.auto_resolved += plan.resolved.len();
      self.byes_awarded += plan.byes.len();

      if plan.is_playable() {
        self.open_round(&plan);
        return RoundStatus::RoundAdvanced { round: self.current_round };
      }

      automatic += 1;
      debug!(
        round = self.current_round,
        resolved = plan.resolved.len(),
        byes = plan.byes.len(),
        "round resolved without play"
      );
      if automatic >= limit {
        error!(
          round = self.current_round,
          limit, "automatic round limit reached, closing tournament"
        );
        self.finish(self.current_round);
        return RoundStatus::Completed;
      }
      self.current_round += 1;
    }
  }

  fn open_round(&mut self, plan: &RoundPlan) {
    self.round_start = self.matches.len();
    for (position, &(first, second)) in plan.pairings.iter().enumerate() {
      self.matches.push(Match {
        id: self.next_match_id,
        round: self.current_round,
        position,
        first,
        second,
        winner: None,
        inferred: false,
      });
      self.next_match_id += 1;
    }
    debug!(
      round = self.current_round,
      playable = plan.pairings.len(),
      resolved = plan.resolved.len(),
      byes = plan.byes.len(),
      "round opened"
    );
  }

  // A result can settle another pending pair of the same round through the
  // closure; those are applied here so the driver is never asked to contradict it.
  fn resolve_implied_matches(&mut self) {
    for slot in self.round_start..self.matches.len() {
      let pending = &self.matches[slot];
      if pending.is_decided() {
        continue;
      }
      let Some(winner) = self.matrix.known_winner(pending.first, pending.second) else {
        continue;
      };
      let m = &mut self.matches[slot];
      m.winner = Some(winner);
      m.inferred = true;
      if let Some(loser) = m.loser() {
        bracket::apply_result(&mut self.competitors, winner, loser);
        self.auto_resolved += 1;
        debug!(round = self.current_round, match_id = m.id, winner, loser, "pending match implied");
      }
    }
  }

  fn finish(&mut self, rounds: u32) {
    self.phase = TournamentPhase::Completed;
    self.round_start = self.matches.len();
    self.rounds_completed = Some(rounds);
    info!(
      real = self.real_count,
      matches = self.matches_played,
      auto_resolved = self.auto_resolved,
      rounds,
      "tournament completed"
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decision::RandomDecision;
  use proptest::prelude::*;

  fn labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("image-{i}")).collect()
  }

  fn pair(m: &Match) -> (CompetitorIndex, CompetitorIndex) {
    (m.first, m.second)
  }

  #[test]
  fn test_seed_rejects_small_pools() {
    assert_eq!(
      TournamentEngine::seeded(Vec::<String>::new()).unwrap_err(),
      SeedError::InsufficientCompetitors { supplied: 0 }
    );
    assert_eq!(
      TournamentEngine::seeded(["solo"]).unwrap_err(),
      SeedError::InsufficientCompetitors { supplied: 1 }
    );
  }

  #[test]
  fn test_seed_only_once() {
    let mut engine = TournamentEngine::seeded(labels(2)).unwrap();
    assert_eq!(engine.seed(labels(3)), Err(SeedError::AlreadySeeded));
    assert_eq!(engine.competitors().len(), 2);
  }

  #[test]
  fn test_two_and_three_competitors_play_once() {
    for n in [2, 3] {
      let mut engine = TournamentEngine::seeded(labels(n)).unwrap();
      let first = engine.current_match().unwrap();
      assert_eq!(pair(&first), (0, 1));

      let status = engine.submit_result(first.id, 1).unwrap();
      assert_eq!(status, RoundStatus::Completed);
      assert!(engine.is_completed());
      assert_eq!(engine.total_matches_played(), 1);
      assert_eq!(engine.real_competitor_count(), n);
      assert_eq!(engine.rounds_completed(), Some(1));
    }
  }

  #[test]
  fn test_padding_for_five_competitors() {
    let engine = TournamentEngine::seeded(["a", "b", "c", "d", "e"]).unwrap();

    assert_eq!(engine.competitors().len(), 8);
    let synthetic: Vec<i64> = engine
      .competitors()
      .iter()
      .filter(|c| c.synthetic)
      .map(|c| c.score)
      .collect();
    assert_eq!(synthetic, vec![-500, -501, -502]);
    assert_eq!(engine.matrix().size(), 8);

    let round: Vec<_> = engine.round_matches().iter().map(pair).collect();
    assert_eq!(round, vec![(0, 1), (2, 3)]);
    for m in engine.round_matches() {
      assert!(!engine.competitors()[m.first].synthetic);
      assert!(!engine.competitors()[m.second].synthetic);
    }
    // The odd competitor sits out round one.
    assert_eq!(engine.competitors()[4].rounds_played, 1);
  }

  #[test]
  fn test_four_competitor_walkthrough() {
    let mut engine = TournamentEngine::seeded(["A", "B", "C", "D"]).unwrap();
    assert_eq!(engine.competitors().len(), 4);
    let round: Vec<_> = engine.round_matches().iter().map(pair).collect();
    assert_eq!(round, vec![(0, 1), (2, 3)]);

    let status = engine.submit_result(0, 0).unwrap();
    let RoundStatus::AwaitingMatch(next) = status else {
      panic!("expected the second match of round one");
    };
    assert_eq!(pair(&next), (2, 3));
    assert_eq!(engine.cursor(), 1);

    assert_eq!(engine.submit_result(1, 2).unwrap(), RoundStatus::RoundAdvanced { round: 2 });
    let round: Vec<_> = engine.round_matches().iter().map(pair).collect();
    assert_eq!(round, vec![(0, 2), (1, 3)]);

    let a_vs_c = engine.current_match().unwrap();
    assert_eq!(a_vs_c.round, 2);
    let RoundStatus::AwaitingMatch(b_vs_d) = engine.submit_result(a_vs_c.id, 0).unwrap() else {
      panic!("expected B vs D");
    };
    assert_eq!(pair(&b_vs_d), (1, 3));

    // D beating B leaves C and D level; C already beat D, so round three
    // resolves itself and the pool is fully separated.
    assert_eq!(engine.submit_result(b_vs_d.id, 3).unwrap(), RoundStatus::Completed);
    assert_eq!(engine.total_matches_played(), 4);
    assert_eq!(engine.auto_resolved_count(), 1);

    let standings = engine.standings();
    let order: Vec<_> = standings.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(order, vec!["A", "C", "D", "B"]);
    let beaten: Vec<_> = standings.iter().map(|s| s.beaten).collect();
    assert_eq!(beaten, vec![3, 2, 1, 0]);
    assert_eq!(engine.rounds_completed(), Some(3));
  }

  #[test]
  fn test_four_competitors_needing_a_third_round() {
    let mut engine = TournamentEngine::seeded(["A", "B", "C", "D"]).unwrap();
    engine.submit_result(0, 0).unwrap();
    engine.submit_result(1, 2).unwrap();
    engine.submit_result(2, 0).unwrap();
    // B beats D: B and C meet with no result linking them.
    assert_eq!(engine.submit_result(3, 1).unwrap(), RoundStatus::RoundAdvanced { round: 3 });

    let b_vs_c = engine.current_match().unwrap();
    assert_eq!(pair(&b_vs_c), (1, 2));
    assert_eq!(engine.submit_result(b_vs_c.id, 2).unwrap(), RoundStatus::Completed);
    assert_eq!(engine.total_matches_played(), 5);
  }

  #[test]
  fn test_transitive_result_skips_match() {
    let mut engine = TournamentEngine::seeded(["A", "B", "C", "D"]).unwrap();
    engine.submit_result(0, 0).unwrap();
    engine.submit_result(1, 2).unwrap();
    engine.submit_result(2, 0).unwrap();

    // A beat C and C beat D, so A over D is already known.
    assert_eq!(engine.matrix().known_winner(0, 3), Some(0));
  }

  #[test]
  fn test_implied_match_in_same_round() {
    let mut engine = TournamentEngine::seeded(["A", "B", "C", "D"]).unwrap();
    // Earlier history: D beat A, B beat C.
    engine.matrix.record(3, 0).unwrap();
    engine.matrix.record(1, 2).unwrap();

    // A over B chains D > A > B > C, which settles C vs D. With a total order
    // known every later pairing resolves itself as well.
    let status = engine.submit_result(0, 0).unwrap();
    assert_eq!(status, RoundStatus::Completed);
    let settled = &engine.matches()[1];
    assert_eq!(settled.winner, Some(3));
    assert!(settled.inferred);
    assert_eq!(settled.loser(), Some(2));
    assert_eq!(engine.total_matches_played(), 1);
    assert_eq!(engine.auto_resolved_count(), 4);

    let order: Vec<_> = engine.standings().iter().map(|s| s.label.clone()).collect();
    assert_eq!(order, vec!["D", "A", "B", "C"]);
  }

  #[test]
  fn test_errors_leave_state_untouched() {
    let mut engine = TournamentEngine::seeded(labels(4)).unwrap();
    let before = engine.clone();

    assert_eq!(
      engine.submit_result(42, 0),
      Err(SubmitError::UnknownMatch { match_id: 42 })
    );
    assert_eq!(
      engine.submit_result(0, 2),
      Err(SubmitError::InvalidWinner { match_id: 0, winner: 2 })
    );
    assert_eq!(engine, before);

    engine.submit_result(0, 1).unwrap();
    let after_first = engine.clone();
    assert_eq!(
      engine.submit_result(0, 1),
      Err(SubmitError::AlreadyDecided { match_id: 0 })
    );
    assert_eq!(
      engine.submit_result(0, 0),
      Err(SubmitError::AlreadyDecided { match_id: 0 })
    );
    assert_eq!(engine, after_first);
  }

  #[test]
  fn test_previous_round_match_is_unknown() {
    let mut engine = TournamentEngine::seeded(labels(4)).unwrap();
    engine.submit_result(0, 0).unwrap();
    engine.submit_result(1, 2).unwrap();
    assert_eq!(engine.current_round(), 2);
    assert_eq!(
      engine.submit_result(0, 0),
      Err(SubmitError::UnknownMatch { match_id: 0 })
    );
  }

  #[test]
  fn test_not_active_outside_play() {
    let mut engine = TournamentEngine::default();
    assert_eq!(
      engine.submit_result(0, 0),
      Err(SubmitError::NotActive { phase: TournamentPhase::Seeding })
    );
    assert!(engine.current_match().is_none());

    engine.seed(labels(2)).unwrap();
    engine.submit_result(0, 0).unwrap();
    assert_eq!(
      engine.submit_result(0, 0),
      Err(SubmitError::NotActive { phase: TournamentPhase::Completed })
    );
    assert!(engine.current_match().is_none());
  }

  #[test]
  fn test_out_of_order_submission_within_round() {
    let mut engine = TournamentEngine::seeded(labels(4)).unwrap();
    let status = engine.submit_result(1, 3).unwrap();
    let RoundStatus::AwaitingMatch(next) = status else {
      panic!("match 0 is still pending");
    };
    assert_eq!(next.id, 0);
  }

  #[test]
  fn test_observation_only_after_completion() {
    let mut engine = TournamentEngine::seeded(labels(3)).unwrap();
    assert!(engine.observation(RunOrigin::User).is_none());
    engine.submit_result(0, 0).unwrap();
    assert_eq!(
      engine.observation(RunOrigin::User),
      Some(MatchCountObservation {
        real_competitor_count: 3,
        total_matches_played: 1,
        origin: RunOrigin::User,
      })
    );
  }

  #[test]
  fn test_auto_round_limit_closes_tournament() {
    let mut engine = TournamentEngine::new(EngineConfig { auto_round_limit: Some(1) });
    engine.seed(["A", "B", "C", "D"]).unwrap();
    engine.submit_result(0, 0).unwrap();
    engine.submit_result(1, 2).unwrap();
    engine.submit_result(2, 0).unwrap();
    // Round three is fully automatic and hits the limit of one.
    assert_eq!(engine.submit_result(3, 3).unwrap(), RoundStatus::Completed);
    assert!(engine.is_completed());
    assert_eq!(engine.rounds_completed(), Some(3));
  }

  #[test]
  fn test_rounds_completed_only_when_over() {
    let mut engine = TournamentEngine::default();
    assert_eq!(engine.rounds_completed(), None);
    engine.seed(labels(4)).unwrap();
    engine.submit_result(0, 0).unwrap();
    assert_eq!(engine.rounds_completed(), None);
    assert_eq!(engine.snapshot().rounds_completed, None);
  }

  #[test]
  fn test_snapshot_serializes() {
    let engine = TournamentEngine::seeded(labels(3)).unwrap();
    let value = serde_json::to_value(engine.snapshot()).unwrap();
    assert_eq!(value["phase"], "active");
    assert_eq!(value["roundMatches"].as_array().unwrap().len(), 1);
    assert_eq!(value["competitors"][3]["synthetic"], true);
  }

  #[test]
  fn test_identical_results_give_identical_runs() {
    let run = |seed: u64| {
      let mut engine = TournamentEngine::seeded(labels(11)).unwrap();
      engine.play_out(&mut RandomDecision::new(seed)).unwrap();
      engine
    };
    assert_eq!(run(5), run(5));
  }

  proptest! {
    #[test]
    fn prop_match_count_bounds(n in 2usize..24, seed in any::<u64>()) {
      let mut engine = TournamentEngine::seeded(labels(n)).unwrap();
      let mut source = RandomDecision::new(seed);
      let mut steps = 0usize;
      while let Some(pending) = engine.current_match() {
        prop_assert!(!engine.competitors()[pending.first].synthetic);
        prop_assert!(!engine.competitors()[pending.second].synthetic);
        let winner = source.decide(&pending, engine.competitors());
        engine.submit_result(pending.id, winner).unwrap();
        steps += 1;
        if !engine.is_completed() {
          prop_assert!(engine.current_match().is_some());
        }
      }

      let total = engine.total_matches_played();
      prop_assert!(engine.is_completed());
      prop_assert_eq!(total, steps);
      if n <= 3 {
        prop_assert_eq!(total, 1);
      } else {
        prop_assert!(total >= n - 1);
        prop_assert!(total <= n * (n - 1) / 2);
      }
      prop_assert!(engine.rounds_completed().is_some());
      prop_assert!(engine.matrix().is_closed());
    }

    #[test]
    fn prop_rounds_never_repeat_competitors(n in 2usize..20, seed in any::<u64>()) {
      let mut engine = TournamentEngine::seeded(labels(n)).unwrap();
      engine.play_out(&mut RandomDecision::new(seed)).unwrap();
      let mut by_round: std::collections::HashMap<u32, Vec<CompetitorIndex>> = Default::default();
      for m in engine.matches() {
        prop_assert_ne!(m.first, m.second);
        let seen = by_round.entry(m.round).or_default();
        prop_assert!(!seen.contains(&m.first) && !seen.contains(&m.second));
        seen.push(m.first);
        seen.push(m.second);
      }
    }
  }
}
