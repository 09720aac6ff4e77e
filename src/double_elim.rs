use tracing::debug;

use crate::error::{BracketError, BracketResult};
use crate::match_set::MatchSetBuilder;
use crate::seeding::SeedPlan;
use crate::single_elim::{build_solo, build_winners};
use crate::types::{BracketSection, FeedRole, Slot};

/// Losers bracket under construction: a pool of feeders still alive, and the
/// current losers round number.
struct LosersBracket<'b> {
  builder: &'b mut MatchSetBuilder,
  pool: Vec<Slot>,
  round: u32,
}

impl LosersBracket<'_> {
  fn push_round(&mut self, pairs: Vec<(Slot, Slot)>) -> Vec<Slot> {
    self.round += 1;
    pairs
      .into_iter()
      .enumerate()
      .map(|(i, (a, b))| {
        let id = self.builder.push(BracketSection::Losers, self.round, (i + 1) as u32, a, b);
        Slot::pending(id, FeedRole::Winner)
      })
      .collect()
  }

  /// Survivors each meet one fresh drop; unmatched entries join the pool as they are.
  fn merge(&mut self, drops: Vec<Slot>) {
    let mut survivors = std::mem::take(&mut self.pool).into_iter();
    let mut drops = drops.into_iter();
    let mut pairs = Vec::new();
    let mut carried = Vec::new();
    loop {
      match (survivors.next(), drops.next()) {
        (Some(survivor), Some(drop)) => pairs.push((survivor, drop)),
        (Some(lone), None) | (None, Some(lone)) => carried.push(lone),
        (None, None) => break,
      }
    }
    let mut pool = if pairs.is_empty() { Vec::new() } else { self.push_round(pairs) };
    pool.extend(carried);
    self.pool = pool;
  }

  /// Pair pool entries with each other until at most `target` remain.
  fn reduce(&mut self, target: usize) {
    while self.pool.len() > target.max(1) {
      let mut entries = std::mem::take(&mut self.pool).into_iter();
      let mut pairs = Vec::new();
      let mut odd = None;
      while let Some(a) = entries.next() {
        match entries.next() {
          Some(b) => pairs.push((a, b)),
          None => odd = Some(a),
        }
      }
      let mut pool = self.push_round(pairs);
      pool.extend(odd);
      self.pool = pool;
    }
  }
}

/// Winners bracket as in single elimination, then a losers bracket fed by every
/// winners-bracket loser, the grand final and an inactive reset.
pub(crate) fn build(builder: &mut MatchSetBuilder, plan: &SeedPlan) -> BracketResult<()> {
  match plan.order.as_slice() {
    [] => return Ok(()),
    [solo] => {
      build_solo(builder, *solo);
      return Ok(());
    }
    _ => {}
  }

  let winners = build_winners(builder, plan);
  let winners_final = *winners
    .last()
    .and_then(|round| round.first())
    .ok_or_else(|| BracketError::MalformedGraph("winners bracket has no final".to_string()))?;

  let mut losers = LosersBracket {
    builder,
    pool: Vec::new(),
    round: 0,
  };
  let non_final = winners.len() - 1;
  for (r, round_ids) in winners.iter().take(non_final).enumerate() {
    let mut drops = round_ids
      .iter()
      .map(|id| Slot::pending(*id, FeedRole::Loser))
      .collect::<Vec<_>>();
    if losers.pool.is_empty() {
      losers.pool = drops;
    } else {
      // Cross the drop order every other cohort so early rematches are less likely.
      if (r + 1) % 2 == 0 {
        drops.reverse();
      }
      losers.merge(drops);
    }
    let next_cohort = if r + 1 == non_final { 1 } else { winners[r + 1].len() };
    losers.reduce(next_cohort);
  }

  if losers.pool.len() > 1 {
    return Err(BracketError::MalformedGraph(format!(
      "losers bracket ended with {} survivors",
      losers.pool.len()
    )));
  }
  let survivor = losers.pool.pop().unwrap_or(Slot::Empty);
  let losers_round = losers.round + 1;
  let losers_final = builder.push(
    BracketSection::Losers,
    losers_round,
    1,
    survivor,
    Slot::pending(winners_final, FeedRole::Loser),
  );

  let grand_final = builder.push(
    BracketSection::GrandFinal,
    1,
    1,
    Slot::pending(winners_final, FeedRole::Winner),
    Slot::pending(losers_final, FeedRole::Winner),
  );
  let reset = builder.push(BracketSection::GrandFinalReset, 1, 1, Slot::Empty, Slot::Empty);

  debug!(
    winners_rounds = winners.len(),
    losers_rounds = losers_round,
    grand_final,
    reset,
    "double elimination bracket laid out"
  );
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;
  use crate::bracket::{clear_winner, generate_bracket, set_winner};
  use crate::test_support::{entrants, listed, play_out};
  use crate::types::{BracketFormat, Match};

  const DE: BracketFormat = BracketFormat::DoubleElimination;

  fn in_section(set: &crate::match_set::MatchSet, section: BracketSection) -> Vec<Match> {
    set.list(Some(section)).into_iter().cloned().collect()
  }

  #[test]
  fn test_four_entrants_layout() {
    let set = generate_bracket("t", &entrants(4), &listed(DE)).unwrap();
    let winners = set.rounds(BracketSection::Winners);
    assert_eq!(winners.len(), 2);
    assert_eq!(winners[0].1.len(), 2);
    assert_eq!(winners[1].1.len(), 1);

    let losers = set.rounds(BracketSection::Losers);
    assert_eq!(losers.len(), 2);
    assert_eq!(losers[0].1.len(), 1);
    let losers_final = losers[1].1[0].clone();
    assert_eq!(
      losers_final.slot_b,
      Slot::pending(winners[1].1[0].id, FeedRole::Loser)
    );
    assert_eq!(
      losers_final.slot_a,
      Slot::pending(losers[0].1[0].id, FeedRole::Winner)
    );

    assert_eq!(in_section(&set, BracketSection::GrandFinal).len(), 1);
    let reset = in_section(&set, BracketSection::GrandFinalReset);
    assert_eq!(reset.len(), 1);
    assert!(reset[0].is_bye);
    assert_eq!(reset[0].occupants(), [None, None]);
    assert_eq!(set.len(), 7);
  }

  fn play_to_grand_final(n: u32) -> crate::match_set::MatchSet {
    let mut set = generate_bracket("t", &entrants(n), &listed(DE)).unwrap();
    loop {
      let next = set
        .list(None)
        .into_iter()
        .find(|m| m.is_playable() && m.section != BracketSection::GrandFinal)
        .map(|m| (m.id, m.slot_a.occupant().unwrap()));
      let Some((id, winner)) = next else { break };
      set = set_winner(&set, id, winner, None).unwrap();
    }
    set
  }

  #[test]
  fn test_losers_side_grand_final_win_activates_reset() {
    let set = play_to_grand_final(4);
    let gf = in_section(&set, BracketSection::GrandFinal)[0].clone();
    let [Some(wb_rep), Some(lb_rep)] = gf.occupants() else {
      panic!("grand final not populated: {gf:?}");
    };

    let reset_played = set_winner(&set, gf.id, lb_rep, Some("3-2".to_string())).unwrap();
    let reset = in_section(&reset_played, BracketSection::GrandFinalReset)[0].clone();
    assert!(!reset.is_bye);
    assert_eq!(reset.occupants(), [Some(wb_rep), Some(lb_rep)]);
    assert_eq!(reset_played.champion(), None);

    let finished = set_winner(&reset_played, reset.id, wb_rep, None).unwrap();
    assert_eq!(finished.champion(), Some(wb_rep));

    let undone = clear_winner(&finished, gf.id).unwrap();
    let reset = in_section(&undone, BracketSection::GrandFinalReset)[0].clone();
    assert!(reset.is_bye);
    assert_eq!(reset.occupants(), [None, None]);
    assert_eq!(reset.winner_id, None);
  }

  #[test]
  fn test_winners_side_grand_final_win_ends_tournament() {
    let set = play_to_grand_final(6);
    let gf = in_section(&set, BracketSection::GrandFinal)[0].clone();
    let wb_rep = gf.slot_a.occupant().unwrap();
    let done = set_winner(&set, gf.id, wb_rep, None).unwrap();
    let reset = in_section(&done, BracketSection::GrandFinalReset)[0].clone();
    assert!(reset.is_bye);
    assert_eq!(reset.winner_id, None);
    assert_eq!(done.champion(), Some(wb_rep));
  }

  #[test]
  fn test_two_entrants_losers_final_resolves_as_bye() {
    let set = generate_bracket("t", &entrants(2), &listed(DE)).unwrap();
    assert_eq!(set.len(), 4);
    let wb_final = in_section(&set, BracketSection::Winners)[0].clone();
    let losers_final = in_section(&set, BracketSection::Losers)[0].clone();
    assert_eq!(losers_final.slot_a, Slot::Empty);
    assert!(!losers_final.is_bye);

    let next = set_winner(&set, wb_final.id, 1, None).unwrap();
    let losers_final = next.get(losers_final.id).unwrap();
    assert!(losers_final.is_bye);
    assert_eq!(losers_final.winner_id, Some(2));
    let gf = in_section(&next, BracketSection::GrandFinal)[0].clone();
    assert_eq!(gf.occupants(), [Some(1), Some(2)]);

    // Undoing the winners final unwinds the cascaded bye too.
    assert_eq!(clear_winner(&next, wb_final.id).unwrap(), set);
  }

  #[test]
  fn test_finalist_law_and_loser_wiring() {
    for n in 2..=33u32 {
      let set = generate_bracket("t", &entrants(n), &listed(DE)).unwrap();
      let gf = in_section(&set, BracketSection::GrandFinal);
      assert_eq!(gf.len(), 1, "n = {n}");
      let (a_from, a_role) = gf[0].slot_a.feeder().unwrap();
      let (b_from, b_role) = gf[0].slot_b.feeder().unwrap();
      assert_eq!((set.get(a_from).unwrap().section, a_role), (BracketSection::Winners, FeedRole::Winner));
      assert_eq!((set.get(b_from).unwrap().section, b_role), (BracketSection::Losers, FeedRole::Winner));

      // Every winners-bracket match drops its loser into exactly one losers slot.
      let loser_feeds = set
        .matches()
        .iter()
        .flat_map(|m| [m.slot_a.feeder(), m.slot_b.feeder()])
        .flatten()
        .filter(|(_, role)| *role == FeedRole::Loser)
        .map(|(from, _)| from)
        .collect::<Vec<_>>();
      let unique = loser_feeds.iter().copied().collect::<HashSet<_>>();
      assert_eq!(unique.len(), loser_feeds.len(), "n = {n}");
      let winners_ids = in_section(&set, BracketSection::Winners)
        .iter()
        .map(|m| m.id)
        .collect::<HashSet<_>>();
      assert_eq!(unique, winners_ids, "n = {n}");

      // n - 1 winners matches, n - 2 losers matches (the n = 2 losers final is a bye).
      assert_eq!(winners_ids.len() as u32, n - 1, "n = {n}");
      let losers = in_section(&set, BracketSection::Losers).len() as u32;
      assert_eq!(losers, (n - 2).max(1), "n = {n}");
    }
  }

  #[test]
  fn test_losers_rounds_feed_forward_to_single_final() {
    for n in [5u32, 7, 8, 11, 16, 23] {
      let set = generate_bracket("t", &entrants(n), &listed(DE)).unwrap();
      let rounds = set.rounds(BracketSection::Losers);
      let last = rounds.last().unwrap();
      assert_eq!(last.1.len(), 1, "n = {n}");
      for (round, matches) in &rounds {
        for m in matches {
          for slot in [&m.slot_a, &m.slot_b] {
            if let Some((from, _)) = slot.feeder() {
              let source = set.get(from).unwrap();
              if source.section == BracketSection::Losers {
                assert!(source.round < *round, "n = {n}");
              }
            }
          }
        }
      }
    }
  }

  #[test]
  fn test_full_playthrough_produces_champion() {
    for n in 2..=24u32 {
      for seed in 0..4u64 {
        let set = generate_bracket("t", &entrants(n), &listed(DE)).unwrap();
        let done = play_out(set, seed * 31 + n as u64);
        assert!(done.champion().is_some(), "n = {n}, seed = {seed}");
        done.validate().unwrap();
      }
    }
  }
}
