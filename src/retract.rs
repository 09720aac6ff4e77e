use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

use crate::error::{BracketError, BracketResult};
use crate::match_set::{Journal, MatchSet};
use crate::types::{BracketSection, FeedRole, MatchId};

impl MatchSet {
  /// Undo the result of `match_id` and everything downstream that followed from it.
  ///
  /// Structural byes and undecided matches have nothing to undo and come back
  /// with an empty change list.
  pub fn clear_winner(&mut self, match_id: MatchId) -> BracketResult<Vec<MatchId>> {
    let idx = self.position_of(match_id)?;
    let target = &self.matches[idx];
    if target.is_bye {
      debug!(match_id, "bye result is structural, nothing to clear");
      return Ok(Vec::new());
    }
    if target.winner_id.is_none() {
      debug!(match_id, "match has no result to clear");
      return Ok(Vec::new());
    }

    let changed = self.transaction(|set, journal| cascade(set, journal, idx))?;
    debug!(match_id, changed = changed.len(), "result cleared");
    Ok(changed)
  }
}

/// Clear the result of `start` and walk forward vacating every slot that was
/// filled from a now-cleared result. Downstream matches that had a winner are
/// cleared and walked in turn.
pub(crate) fn cascade(set: &mut MatchSet, journal: &mut Journal, start: usize) -> BracketResult<()> {
  let dependents = set.dependents();
  let budget = set.step_budget();

  let origin = journal.touch(set, start);
  origin.winner_id = None;
  origin.score = None;

  let mut queue = VecDeque::from([start]);
  let mut visited = HashSet::new();
  while let Some(idx) = queue.pop_front() {
    if !visited.insert(idx) {
      continue;
    }
    if visited.len() > budget {
      warn!(tournament_id = %set.tournament_id, "retraction did not settle");
      return Err(BracketError::MalformedGraph(
        "retraction visited more matches than the graph holds".to_string(),
      ));
    }

    let source_id = set.matches[idx].id;
    if set.matches[idx].section == BracketSection::GrandFinal {
      if let Some(reset) = set.reset_index() {
        journal.touch(set, reset).deactivate_reset();
      }
    }

    for role in [FeedRole::Winner, FeedRole::Loser] {
      let Some(targets) = dependents.get(&(source_id, role)) else {
        continue;
      };
      for &(target, side) in targets {
        let m = journal.touch(set, target);
        if m.slot(side).occupant().is_none() {
          continue;
        }
        m.slot_mut(side).vacate();
        let had_winner = m.winner_id.is_some();
        m.winner_id = None;
        m.score = None;
        m.refresh_bye();
        if had_winner {
          queue.push_back(target);
        }
      }
    }
  }
  Ok(())
}
