use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{BracketError, BracketResult};
use crate::types::{
  BracketFormat, BracketSection, FeedRole, Match, MatchId, ParticipantId, Slot, SlotSide,
};

/// Every slot that declares a given `(source match, role)` feeder.
pub(crate) type Dependents = HashMap<(MatchId, FeedRole), Vec<(usize, SlotSide)>>;

/// Arena of matches for one tournament, indexed by id.
///
/// Only the generators build one from scratch; afterwards it changes through
/// `set_winner` / `clear_winner`, each of which either applies completely or
/// leaves the set untouched.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "MatchSetRecord", into = "MatchSetRecord")]
pub struct MatchSet {
  pub(crate) tournament_id: String,
  pub(crate) format: BracketFormat,
  pub(crate) matches: Vec<Match>,
  pub(crate) index: HashMap<MatchId, usize>,
}

/// Persisted shape of a [`MatchSet`]; loading goes through validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSetRecord {
  pub tournament_id: String,
  pub format: BracketFormat,
  pub matches: Vec<Match>,
}

impl TryFrom<MatchSetRecord> for MatchSet {
  type Error = BracketError;

  fn try_from(record: MatchSetRecord) -> Result<Self, Self::Error> {
    MatchSet::from_matches(record.tournament_id, record.format, record.matches)
  }
}

impl From<MatchSet> for MatchSetRecord {
  fn from(set: MatchSet) -> Self {
    MatchSetRecord {
      tournament_id: set.tournament_id,
      format: set.format,
      matches: set.matches,
    }
  }
}

impl PartialEq for MatchSet {
  fn eq(&self, other: &Self) -> bool {
    self.tournament_id == other.tournament_id
      && self.format == other.format
      && self.matches == other.matches
  }
}

impl MatchSet {
  pub fn empty(tournament_id: impl Into<String>, format: BracketFormat) -> Self {
    MatchSet {
      tournament_id: tournament_id.into(),
      format,
      matches: Vec::new(),
      index: HashMap::new(),
    }
  }

  /// Rebuild a set handed back by a persistence layer, rejecting broken graphs.
  pub fn from_matches(
    tournament_id: impl Into<String>,
    format: BracketFormat,
    matches: Vec<Match>,
  ) -> BracketResult<Self> {
    let mut index = HashMap::with_capacity(matches.len());
    for (idx, m) in matches.iter().enumerate() {
      if index.insert(m.id, idx).is_some() {
        return Err(BracketError::MalformedGraph(format!("match id {} is used twice", m.id)));
      }
    }
    let set = MatchSet {
      tournament_id: tournament_id.into(),
      format,
      matches,
      index,
    };
    set.validate()?;
    Ok(set)
  }

  pub fn tournament_id(&self) -> &str {
    &self.tournament_id
  }

  pub fn format(&self) -> BracketFormat {
    self.format
  }

  pub fn len(&self) -> usize {
    self.matches.len()
  }

  pub fn is_empty(&self) -> bool {
    self.matches.is_empty()
  }

  /// Matches in arena (generation) order.
  pub fn matches(&self) -> &[Match] {
    &self.matches
  }

  pub fn get(&self, id: MatchId) -> Option<&Match> {
    self.index.get(&id).and_then(|idx| self.matches.get(*idx))
  }

  pub(crate) fn position_of(&self, id: MatchId) -> BracketResult<usize> {
    self.index.get(&id).copied().ok_or(BracketError::UnknownMatch(id))
  }

  fn section_index(&self, section: BracketSection) -> Option<usize> {
    self.matches.iter().position(|m| m.section == section)
  }

  pub(crate) fn grand_final_index(&self) -> Option<usize> {
    self.section_index(BracketSection::GrandFinal)
  }

  pub(crate) fn reset_index(&self) -> Option<usize> {
    self.section_index(BracketSection::GrandFinalReset)
  }

  pub(crate) fn dependents(&self) -> Dependents {
    let mut dependents: Dependents = HashMap::new();
    for (idx, m) in self.matches.iter().enumerate() {
      for side in [SlotSide::A, SlotSide::B] {
        if let Some(key) = m.slot(side).feeder() {
          dependents.entry(key).or_default().push((idx, side));
        }
      }
    }
    dependents
  }

  /// Upper bound on worklist steps for any single operation.
  pub(crate) fn step_budget(&self) -> usize {
    self.matches.len() * 2 + 2
  }

  /// Matches for display: by section, then round, then position.
  pub fn list(&self, section: Option<BracketSection>) -> Vec<&Match> {
    let mut out = self
      .matches
      .iter()
      .filter(|m| section.map_or(true, |wanted| m.section == wanted))
      .collect::<Vec<_>>();
    out.sort_by_key(|m| m.sort_key());
    out
  }

  pub fn rounds(&self, section: BracketSection) -> Vec<(u32, Vec<&Match>)> {
    let mut grouped: BTreeMap<u32, Vec<&Match>> = BTreeMap::new();
    for m in self.list(Some(section)) {
      grouped.entry(m.round).or_default().push(m);
    }
    grouped.into_iter().collect()
  }

  /// Tournament winner, once the last necessary match is decided.
  pub fn champion(&self) -> Option<ParticipantId> {
    if let Some(reset) = self.reset_index().map(|idx| &self.matches[idx]) {
      if !reset.is_bye {
        return reset.winner_id;
      }
    }
    if let Some(grand_final) = self.grand_final_index().map(|idx| &self.matches[idx]) {
      return grand_final.winner_id;
    }
    self
      .matches
      .iter()
      .filter(|m| m.section == BracketSection::Winners)
      .max_by_key(|m| m.round)
      .and_then(|m| m.winner_id)
  }

  pub fn is_complete(&self) -> bool {
    self.champion().is_some()
  }

  /// Check the structural invariants: feeders exist, strictly precede their
  /// target, feed one slot per role, agree with the source outcome, and bye
  /// flags match the slots.
  pub fn validate(&self) -> BracketResult<()> {
    let malformed = |msg: String| Err(BracketError::MalformedGraph(msg));
    let mut claimed: HashSet<(MatchId, FeedRole)> = HashSet::new();

    for m in &self.matches {
      if m.round == 0 || m.position == 0 {
        return malformed(format!("match {} has a zero round or position", m.id));
      }
      for side in [SlotSide::A, SlotSide::B] {
        let slot = m.slot(side);
        let Some((from, role)) = slot.feeder() else {
          continue;
        };
        let Some(source) = self.get(from) else {
          return malformed(format!("match {} is fed by missing match {from}", m.id));
        };
        if (source.section.rank(), source.round) >= (m.section.rank(), m.round) {
          return malformed(format!("match {} is fed by match {from}, which does not precede it", m.id));
        }
        if !claimed.insert((from, role)) {
          return malformed(format!("{role:?} of match {from} feeds more than one slot"));
        }
        let expected = match role {
          FeedRole::Winner => source.winner_id,
          FeedRole::Loser => source.loser_id(),
        };
        if slot.occupant() != expected {
          return malformed(format!(
            "slot {side:?} of match {} disagrees with the result of match {from}",
            m.id
          ));
        }
      }

      if let Some(winner) = m.winner_id {
        if !m.occupies(winner) {
          return malformed(format!("match {} names winner {winner} who is not in it", m.id));
        }
      }

      if m.section == BracketSection::GrandFinalReset {
        if m.is_bye && (m.slot_a != Slot::Empty || m.slot_b != Slot::Empty || m.winner_id.is_some()) {
          return malformed(format!("inactive reset match {} is not empty", m.id));
        }
        continue;
      }

      match (m.is_bye, m.bye_occupant()) {
        (true, Some(occupant)) if m.winner_id == Some(occupant) => {}
        (true, _) => return malformed(format!("bye match {} is not a resolved single-entrant match", m.id)),
        (false, Some(_)) => return malformed(format!("match {} should be a bye", m.id)),
        (false, None) => {
          if m.winner_id.is_some() && m.occupants().iter().any(Option::is_none) {
            return malformed(format!("match {} has a winner but an open slot", m.id));
          }
        }
      }
    }

    self.validate_reset()
  }

  fn validate_reset(&self) -> BracketResult<()> {
    let (Some(gf), Some(reset)) = (self.grand_final_index(), self.reset_index()) else {
      return Ok(());
    };
    let gf = &self.matches[gf];
    let reset = &self.matches[reset];
    let losers_side_won = gf.winner_id.is_some() && gf.winner_id == gf.slot_b.occupant();
    let consistent = if losers_side_won {
      !reset.is_bye && reset.occupants() == gf.occupants()
    } else {
      reset.is_bye
    };
    if consistent {
      Ok(())
    } else {
      Err(BracketError::MalformedGraph(format!(
        "reset match {} does not follow the grand final result",
        reset.id
      )))
    }
  }
}

/// Records the pre-image of every match an operation touches so the whole
/// operation can be undone on error.
#[derive(Default)]
pub(crate) struct Journal {
  originals: BTreeMap<usize, Match>,
}

impl Journal {
  pub(crate) fn touch<'s>(&mut self, set: &'s mut MatchSet, idx: usize) -> &'s mut Match {
    self
      .originals
      .entry(idx)
      .or_insert_with(|| set.matches[idx].clone());
    &mut set.matches[idx]
  }

  fn rollback(self, set: &mut MatchSet) {
    for (idx, original) in self.originals {
      set.matches[idx] = original;
    }
  }

  fn changed(self, set: &MatchSet) -> Vec<MatchId> {
    let mut ids = self
      .originals
      .into_iter()
      .filter(|(idx, original)| set.matches[*idx] != *original)
      .map(|(_, original)| original.id)
      .collect::<Vec<_>>();
    ids.sort_unstable();
    ids
  }
}

impl MatchSet {
  /// Run `apply` against the set; on error every touched match is restored.
  /// Returns the ids of matches whose contents actually changed.
  pub(crate) fn transaction<F>(&mut self, apply: F) -> BracketResult<Vec<MatchId>>
  where
    F: FnOnce(&mut MatchSet, &mut Journal) -> BracketResult<()>,
  {
    let mut journal = Journal::default();
    match apply(self, &mut journal) {
      Ok(()) => Ok(journal.changed(self)),
      Err(err) => {
        journal.rollback(self);
        Err(err)
      }
    }
  }
}

/// Appends matches with sequential ids, the way both generators lay out a bracket.
pub(crate) struct MatchSetBuilder {
  set: MatchSet,
  next_id: MatchId,
}

impl MatchSetBuilder {
  pub(crate) fn new(tournament_id: &str, format: BracketFormat) -> Self {
    MatchSetBuilder {
      set: MatchSet::empty(tournament_id, format),
      next_id: 1,
    }
  }

  pub(crate) fn push(
    &mut self,
    section: BracketSection,
    round: u32,
    position: u32,
    slot_a: Slot,
    slot_b: Slot,
  ) -> MatchId {
    let id = self.next_id;
    self.next_id += 1;
    let mut m = Match {
      id,
      tournament_id: self.set.tournament_id.clone(),
      section,
      round,
      position,
      slot_a,
      slot_b,
      winner_id: None,
      score: None,
      is_bye: false,
    };
    if section == BracketSection::GrandFinalReset {
      m.deactivate_reset();
    } else {
      m.refresh_bye();
    }
    self.set.matches.push(m);
    self.set.index.insert(id, self.set.matches.len() - 1);
    id
  }

  pub(crate) fn finish(self) -> BracketResult<MatchSet> {
    self.set.validate()?;
    Ok(self.set)
  }
}
