//! Entry points over whole match sets. Each call takes the current set and
//! hands back a new one, so a caller never observes a half-applied operation.

use tracing::info;

use crate::double_elim;
use crate::error::BracketResult;
use crate::match_set::{MatchSet, MatchSetBuilder};
use crate::seeding::plan_seeds;
use crate::single_elim;
use crate::types::{BracketFormat, BracketSection, BracketSettings, Match, MatchId, Participant, ParticipantId};

/// Build the complete match graph for `participants`.
///
/// Zero entrants produce an empty set and one entrant a single bye, unless
/// `settings.require_playable` asks for at least two.
pub fn generate_bracket(
  tournament_id: &str,
  participants: &[Participant],
  settings: &BracketSettings,
) -> BracketResult<MatchSet> {
  let plan = plan_seeds(participants, settings)?;
  let mut builder = MatchSetBuilder::new(tournament_id, settings.format);
  match settings.format {
    BracketFormat::SingleElimination => single_elim::build(&mut builder, &plan)?,
    BracketFormat::DoubleElimination => double_elim::build(&mut builder, &plan)?,
  }
  let set = builder.finish()?;
  info!(
    tournament_id,
    format = ?settings.format,
    entrants = plan.entrant_count(),
    byes = plan.bye_count(),
    matches = set.len(),
    "bracket generated"
  );
  Ok(set)
}

pub fn set_winner(
  set: &MatchSet,
  match_id: MatchId,
  winner_id: ParticipantId,
  score: Option<String>,
) -> BracketResult<MatchSet> {
  let mut next = set.clone();
  next.set_winner(match_id, winner_id, score)?;
  Ok(next)
}

pub fn clear_winner(set: &MatchSet, match_id: MatchId) -> BracketResult<MatchSet> {
  let mut next = set.clone();
  next.clear_winner(match_id)?;
  Ok(next)
}

pub fn list_matches(set: &MatchSet, section: Option<BracketSection>) -> Vec<&Match> {
  set.list(section)
}
