use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::HashSet;

use crate::error::{BracketError, BracketResult};
use crate::types::{BracketSettings, Participant, ParticipantId, Seeding};

/// One first-round line pair of the full bracket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Line {
  /// Both seeds are present and play in round 1.
  PlayIn(ParticipantId, ParticipantId),
  /// The opposing seed does not exist; the entrant goes straight to round 2.
  Bye(ParticipantId),
}

#[derive(Clone, Debug)]
pub struct SeedPlan {
  /// Bracket capacity: next power of two at or above the entrant count.
  pub capacity: usize,
  /// Participant ids in seed order, seed 1 first.
  pub order: Vec<ParticipantId>,
  /// First-round lines; `lines[i]` sits at position `i + 1`.
  pub lines: Vec<Line>,
}

impl SeedPlan {
  pub fn entrant_count(&self) -> usize {
    self.order.len()
  }

  pub fn play_in_count(&self) -> usize {
    self.lines.iter().filter(|line| matches!(line, Line::PlayIn(..))).count()
  }

  pub fn bye_count(&self) -> usize {
    self.lines.iter().filter(|line| matches!(line, Line::Bye(_))).count()
  }

  /// Number of rounds in a single-elimination tree of this capacity.
  pub fn round_count(&self) -> usize {
    let mut rounds = 0usize;
    let mut size = self.capacity;
    while size > 1 {
      rounds += 1;
      size /= 2;
    }
    rounds
  }
}

pub fn bracket_size(entrants: usize) -> usize {
  if entrants == 0 {
    0
  } else {
    entrants.next_power_of_two()
  }
}

pub fn first_round_match_count(entrants: usize) -> usize {
  if entrants < 2 {
    0
  } else {
    entrants - bracket_size(entrants) / 2
  }
}

/// Standard line-up for `size` lines: 1 v size, then recursively folded so the
/// top two seeds can only meet in the final.
pub fn seed_positions(size: usize) -> Vec<usize> {
  let mut seeds = vec![1usize];
  while seeds.len() < size {
    let n = seeds.len();
    let mut next = Vec::with_capacity(n * 2);
    for seed in seeds.iter().copied() {
      next.push(seed);
      next.push((n * 2 + 1).saturating_sub(seed));
    }
    seeds = next;
  }
  seeds
}

pub fn seed_order(participants: &[Participant], seeding: &Seeding) -> Vec<ParticipantId> {
  let mut order = participants.iter().map(|p| p.id).collect::<Vec<_>>();
  match seeding {
    Seeding::Random { seed } => {
      let mut rng = StdRng::seed_from_u64(*seed);
      order.shuffle(&mut rng);
    }
    Seeding::AsListed => {}
  }
  order
}

fn validate_entries(participants: &[Participant], settings: &BracketSettings) -> BracketResult<()> {
  let mut seen = HashSet::with_capacity(participants.len());
  for participant in participants {
    if !seen.insert(participant.id) {
      return Err(BracketError::DuplicateParticipant(participant.id));
    }
  }
  if let Some(capacity) = settings.capacity {
    if participants.len() > capacity {
      return Err(BracketError::CapacityExceeded {
        capacity,
        entrants: participants.len(),
      });
    }
  }
  if settings.require_playable && participants.len() < 2 {
    return Err(BracketError::InvalidParticipantCount(participants.len()));
  }
  Ok(())
}

pub fn plan_seeds(participants: &[Participant], settings: &BracketSettings) -> BracketResult<SeedPlan> {
  validate_entries(participants, settings)?;
  let order = seed_order(participants, &settings.seeding);
  let capacity = bracket_size(order.len());
  if order.len() < 2 {
    return Ok(SeedPlan {
      capacity,
      order,
      lines: Vec::new(),
    });
  }

  let seeds = seed_positions(capacity);
  let by_seed = |seed: usize| order.get(seed - 1).copied();
  let mut lines = Vec::with_capacity(capacity / 2);
  for (pair, chunk) in seeds.chunks(2).enumerate() {
    let line = match (by_seed(chunk[0]), by_seed(chunk[1])) {
      (Some(a), Some(b)) => Line::PlayIn(a, b),
      (Some(lone), None) | (None, Some(lone)) => Line::Bye(lone),
      (None, None) => {
        return Err(BracketError::MalformedGraph(format!(
          "first-round line {} has no entrants",
          pair + 1
        )))
      }
    };
    lines.push(line);
  }

  Ok(SeedPlan {
    capacity,
    order,
    lines,
  })
}
