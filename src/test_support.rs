use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::bracket::set_winner;
use crate::match_set::MatchSet;
use crate::types::{BracketFormat, BracketSettings, Participant, Seeding};

pub fn entrants(n: u32) -> Vec<Participant> {
  (1..=n).map(|id| Participant::new(id, format!("Player{id}"))).collect()
}

pub fn listed(format: BracketFormat) -> BracketSettings {
  BracketSettings {
    format,
    seeding: Seeding::AsListed,
    ..BracketSettings::default()
  }
}

/// Decide every playable match with random winners until a champion exists,
/// checking the graph after each step.
pub fn play_out(mut set: MatchSet, seed: u64) -> MatchSet {
  let mut rng = StdRng::seed_from_u64(seed);
  for _ in 0..=set.len() {
    let playable = set
      .list(None)
      .into_iter()
      .filter(|m| m.is_playable())
      .map(|m| (m.id, m.occupants()))
      .collect::<Vec<_>>();
    if playable.is_empty() {
      break;
    }
    let (id, occupants) = playable[rng.gen_range(0..playable.len())];
    let winner = occupants[rng.gen_range(0..2)].unwrap();
    set = set_winner(&set, id, winner, None).unwrap();
    set.validate().unwrap();
  }
  set
}
