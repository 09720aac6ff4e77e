use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::error::{BracketError, BracketResult};
use crate::match_set::{Journal, MatchSet};
use crate::retract;
use crate::types::{BracketSection, FeedRole, MatchId, ParticipantId};

impl MatchSet {
  /// Record `winner_id` as the winner of `match_id` and push the winner (and the
  /// loser, where a losers bracket is fed) into every dependent slot, resolving
  /// any byes that completes.
  ///
  /// Replacing an existing different winner first retracts the old result.
  /// Returns the ids of every match whose contents changed, sorted.
  pub fn set_winner(
    &mut self,
    match_id: MatchId,
    winner_id: ParticipantId,
    score: Option<String>,
  ) -> BracketResult<Vec<MatchId>> {
    let idx = self.position_of(match_id)?;
    let target = &self.matches[idx];

    if target.is_bye {
      return if target.winner_id == Some(winner_id) {
        Ok(Vec::new())
      } else {
        Err(BracketError::InvalidWinner { match_id, winner_id })
      };
    }
    if !target.occupies(winner_id) {
      return Err(BracketError::InvalidWinner { match_id, winner_id });
    }
    if target.occupants().iter().any(Option::is_none) {
      return Err(BracketError::MatchNotReady(match_id));
    }

    if target.winner_id == Some(winner_id) {
      if target.score == score {
        return Ok(Vec::new());
      }
      return self.transaction(|set, journal| {
        journal.touch(set, idx).score = score;
        Ok(())
      });
    }

    let replacing = target.winner_id;
    let changed = self.transaction(|set, journal| {
      if replacing.is_some() {
        retract::cascade(set, journal, idx)?;
      }
      let m = journal.touch(set, idx);
      m.winner_id = Some(winner_id);
      m.score = score;
      propagate(set, journal, idx)
    })?;
    debug!(match_id, winner_id, ?replacing, changed = changed.len(), "winner recorded");
    Ok(changed)
  }
}

/// Push the outcome of `start` downstream. Matches that turn into resolved byes
/// along the way are queued and pushed in turn.
pub(crate) fn propagate(set: &mut MatchSet, journal: &mut Journal, start: usize) -> BracketResult<()> {
  let dependents = set.dependents();
  let budget = set.step_budget();
  let mut queue = VecDeque::from([start]);
  let mut steps = 0usize;

  while let Some(idx) = queue.pop_front() {
    steps += 1;
    if steps > budget {
      warn!(tournament_id = %set.tournament_id, steps, "advancement did not settle");
      return Err(BracketError::MalformedGraph(
        "advancement revisited matches more often than the graph allows".to_string(),
      ));
    }

    let source = &set.matches[idx];
    let source_id = source.id;
    let is_grand_final = source.section == BracketSection::GrandFinal;
    let outcomes = [
      (FeedRole::Winner, source.winner_id),
      (FeedRole::Loser, source.loser_id()),
    ];
    if is_grand_final {
      settle_reset(set, journal, idx);
    }

    for (role, participant) in outcomes {
      let Some(participant) = participant else {
        continue;
      };
      let Some(targets) = dependents.get(&(source_id, role)) else {
        continue;
      };
      for &(target, side) in targets {
        let m = journal.touch(set, target);
        m.slot_mut(side).fill(participant);
        if m.refresh_bye() {
          debug!(match_id = m.id, winner = ?m.winner_id, "bye resolved");
          queue.push_back(target);
        }
      }
    }
  }
  Ok(())
}

/// Bring the reset match in line with the grand final: playable between both
/// finalists when the losers-side entrant won, inactive otherwise.
fn settle_reset(set: &mut MatchSet, journal: &mut Journal, grand_final: usize) {
  let Some(reset) = set.reset_index() else {
    return;
  };
  let gf = &set.matches[grand_final];
  let [winners_side, losers_side] = gf.occupants();
  let losers_side_won = gf.winner_id.is_some() && gf.winner_id == losers_side;

  let m = journal.touch(set, reset);
  match (losers_side_won, winners_side, losers_side) {
    (true, Some(a), Some(b)) => {
      m.activate_reset(a, b);
      debug!(match_id = m.id, "grand final reset activated");
    }
    _ => m.deactivate_reset(),
  }
}

#[cfg(test)]
mod tests {
  use crate::bracket::generate_bracket;
  use crate::error::BracketError;
  use crate::match_set::MatchSet;
  use crate::test_support::{entrants, listed};
  use crate::types::{BracketFormat, BracketSection, FeedRole};

  #[test]
  fn test_setting_same_winner_twice_is_idempotent() {
    let mut set = generate_bracket("t", &entrants(6), &listed(BracketFormat::DoubleElimination)).unwrap();
    let first = set.list(None).into_iter().find(|m| m.is_playable()).unwrap().clone();
    let winner = first.slot_b.occupant().unwrap();

    let changed = set.set_winner(first.id, winner, Some("2-0".to_string())).unwrap();
    assert!(changed.contains(&first.id));
    let once = set.clone();
    let again = set.set_winner(first.id, winner, Some("2-0".to_string())).unwrap();
    assert!(again.is_empty());
    assert_eq!(set, once);

    // A new score on the same winner touches only that match.
    let rescored = set.set_winner(first.id, winner, Some("2-1".to_string())).unwrap();
    assert_eq!(rescored, vec![first.id]);
    assert_eq!(set.get(first.id).unwrap().score.as_deref(), Some("2-1"));
  }

  #[test]
  fn test_rejections_leave_set_untouched() {
    let mut set = generate_bracket("t", &entrants(5), &listed(BracketFormat::SingleElimination)).unwrap();
    let before = set.clone();

    assert_eq!(set.set_winner(404, 1, None), Err(BracketError::UnknownMatch(404)));

    let play_in = set.rounds(BracketSection::Winners)[0].1[0].clone();
    assert_eq!(
      set.set_winner(play_in.id, 1, None),
      Err(BracketError::InvalidWinner { match_id: play_in.id, winner_id: 1 })
    );

    let waiting = set
      .matches()
      .iter()
      .find(|m| m.round == 2 && m.slot_b.is_pending())
      .unwrap()
      .clone();
    let present = waiting.slot_a.occupant().unwrap();
    assert_eq!(set.set_winner(waiting.id, present, None), Err(BracketError::MatchNotReady(waiting.id)));
    assert_eq!(set, before);
  }

  #[test]
  fn test_changing_winner_moves_the_downstream_slot() {
    let mut set = generate_bracket("t", &entrants(8), &listed(BracketFormat::DoubleElimination)).unwrap();
    let opener = set.rounds(BracketSection::Winners)[0].1[0].clone();
    let [Some(a), Some(b)] = opener.occupants() else {
      panic!("opener not seeded");
    };
    set.set_winner(opener.id, a, None).unwrap();

    let fed_by = |set: &MatchSet, role: FeedRole| {
      set
        .matches()
        .iter()
        .flat_map(|m| [&m.slot_a, &m.slot_b])
        .find(|slot| slot.feeder() == Some((opener.id, role)))
        .and_then(|slot| slot.occupant())
    };
    assert_eq!(fed_by(&set, FeedRole::Winner), Some(a));
    assert_eq!(fed_by(&set, FeedRole::Loser), Some(b));

    set.set_winner(opener.id, b, None).unwrap();
    assert_eq!(fed_by(&set, FeedRole::Winner), Some(b));
    assert_eq!(fed_by(&set, FeedRole::Loser), Some(a));
    assert_eq!(set.get(opener.id).unwrap().winner_id, Some(b));
    set.validate().unwrap();
  }

  #[test]
  fn test_bye_accepts_only_its_occupant() {
    let mut set = generate_bracket("t", &entrants(1), &listed(BracketFormat::DoubleElimination)).unwrap();
    let solo = set.matches()[0].id;
    assert_eq!(set.set_winner(solo, 1, None), Ok(Vec::new()));
    assert_eq!(
      set.set_winner(solo, 2, None),
      Err(BracketError::InvalidWinner { match_id: solo, winner_id: 2 })
    );
  }

  #[test]
  fn test_inactive_reset_cannot_be_won() {
    let mut set = generate_bracket("t", &entrants(4), &listed(BracketFormat::DoubleElimination)).unwrap();
    let reset = set.list(Some(BracketSection::GrandFinalReset))[0].id;
    assert_eq!(
      set.set_winner(reset, 1, None),
      Err(BracketError::InvalidWinner { match_id: reset, winner_id: 1 })
    );
  }
}
