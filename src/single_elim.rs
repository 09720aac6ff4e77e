use crate::error::BracketResult;
use crate::match_set::MatchSetBuilder;
use crate::seeding::{Line, SeedPlan};
use crate::types::{BracketSection, FeedRole, MatchId, ParticipantId, Slot};

/// Degenerate tournament of one: a single bye the entrant has already won.
pub(crate) fn build_solo(builder: &mut MatchSetBuilder, entrant: ParticipantId) -> MatchId {
  builder.push(BracketSection::Winners, 1, 1, Slot::entrant(entrant), Slot::Empty)
}

/// Lay out the winners tree and return match ids per round, round 1 first.
///
/// Round 1 only holds real play-in matches, kept at their line position so
/// `ceil(position / 2)` still addresses the round-2 match they feed. Bye
/// recipients are written straight into round-2 slots.
pub(crate) fn build_winners(builder: &mut MatchSetBuilder, plan: &SeedPlan) -> Vec<Vec<MatchId>> {
  let mut rounds: Vec<Vec<MatchId>> = Vec::with_capacity(plan.round_count());

  let mut feeds = Vec::with_capacity(plan.lines.len());
  let mut round_one = Vec::new();
  for (i, line) in plan.lines.iter().enumerate() {
    match *line {
      Line::PlayIn(a, b) => {
        let id = builder.push(
          BracketSection::Winners,
          1,
          (i + 1) as u32,
          Slot::entrant(a),
          Slot::entrant(b),
        );
        round_one.push(id);
        feeds.push(Slot::pending(id, FeedRole::Winner));
      }
      Line::Bye(entrant) => feeds.push(Slot::entrant(entrant)),
    }
  }
  rounds.push(round_one);

  let mut round = 2u32;
  while feeds.len() > 1 {
    let mut ids = Vec::with_capacity(feeds.len() / 2);
    let mut next_feeds = Vec::with_capacity(feeds.len() / 2);
    for (j, pair) in feeds.chunks(2).enumerate() {
      let slot_a = pair[0].clone();
      let slot_b = pair.get(1).cloned().unwrap_or(Slot::Empty);
      let id = builder.push(BracketSection::Winners, round, (j + 1) as u32, slot_a, slot_b);
      ids.push(id);
      next_feeds.push(Slot::pending(id, FeedRole::Winner));
    }
    rounds.push(ids);
    feeds = next_feeds;
    round += 1;
  }

  rounds
}

pub(crate) fn build(builder: &mut MatchSetBuilder, plan: &SeedPlan) -> BracketResult<()> {
  match plan.order.as_slice() {
    [] => {}
    [solo] => {
      build_solo(builder, *solo);
    }
    _ => {
      build_winners(builder, plan);
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use crate::bracket::{generate_bracket, set_winner};
  use crate::test_support::{entrants, listed, play_out};
  use crate::types::{BracketFormat, BracketSection, FeedRole, Slot};

  const SE: BracketFormat = BracketFormat::SingleElimination;

  #[test]
  fn test_no_entrants_no_matches() {
    let set = generate_bracket("t", &[], &listed(SE)).unwrap();
    assert!(set.is_empty());
    assert_eq!(set.champion(), None);
  }

  #[test]
  fn test_single_entrant_wins_by_bye() {
    let set = generate_bracket("t", &entrants(1), &listed(SE)).unwrap();
    assert_eq!(set.len(), 1);
    let only = &set.matches()[0];
    assert!(only.is_bye);
    assert_eq!(only.winner_id, Some(1));
    assert_eq!(set.champion(), Some(1));
  }

  #[test]
  fn test_two_entrants_single_match() {
    let set = generate_bracket("t", &entrants(2), &listed(SE)).unwrap();
    assert_eq!(set.len(), 1);
    let only = set.matches()[0].clone();
    assert!(!only.is_bye);
    assert_eq!(only.occupants(), [Some(1), Some(2)]);

    let played = set_winner(&set, only.id, 2, Some("2-1".to_string())).unwrap();
    assert_eq!(played.len(), 1);
    assert_eq!(played.matches()[0].winner_id, Some(2));
    assert_eq!(played.champion(), Some(2));
  }

  #[test]
  fn test_five_entrants_layout() {
    let set = generate_bracket("t", &entrants(5), &listed(SE)).unwrap();
    let rounds = set.rounds(BracketSection::Winners);
    assert_eq!(rounds.len(), 3);
    assert_eq!(rounds[0].1.len(), 1);
    assert_eq!(rounds[1].1.len(), 2);
    assert_eq!(rounds[2].1.len(), 1);
    assert!(set.matches().iter().all(|m| !m.is_bye));

    let play_in = rounds[0].1[0].clone();
    assert_eq!(play_in.occupants(), [Some(4), Some(5)]);
    assert_eq!(play_in.position, 2);

    let fed = rounds[1].1[0].clone();
    let untouched = rounds[1].1[1].clone();
    assert_eq!(fed.slot_a, Slot::entrant(1));
    assert_eq!(fed.slot_b, Slot::pending(play_in.id, FeedRole::Winner));
    assert_eq!(untouched.occupants(), [Some(2), Some(3)]);

    let next = set_winner(&set, play_in.id, 5, None).unwrap();
    assert_eq!(next.get(fed.id).unwrap().occupants(), [Some(1), Some(5)]);
    assert_eq!(next.get(untouched.id).unwrap(), &untouched);
  }

  #[test]
  fn test_pairing_follows_position() {
    let set = generate_bracket("t", &entrants(16), &listed(SE)).unwrap();
    for m in set.matches().iter().filter(|m| m.round > 1) {
      for slot in [&m.slot_a, &m.slot_b] {
        let (from, _) = slot.feeder().unwrap();
        let source = set.get(from).unwrap();
        assert_eq!(source.round + 1, m.round);
        assert_eq!((source.position + 1) / 2, m.position);
        let odd = source.position % 2 == 1;
        assert_eq!(odd, std::ptr::eq(slot, &m.slot_a));
      }
    }
  }

  #[test]
  fn test_count_law() {
    for n in 2..=40u32 {
      let set = generate_bracket("t", &entrants(n), &listed(SE)).unwrap();
      assert_eq!(set.len() as u32, n - 1, "n = {n}");
      let done = play_out(set, n as u64);
      let decided = done.matches().iter().filter(|m| !m.is_bye && m.winner_id.is_some()).count();
      assert_eq!(decided as u32, n - 1, "n = {n}");
      assert!(done.champion().is_some());
    }
  }
}
