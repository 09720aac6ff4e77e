use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

// ── Constants ──────────────────────────────────────────────────────────

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:17880";
pub const DEFAULT_SHUFFLE_SEED: u64 = 1337;

// ── Identifiers ────────────────────────────────────────────────────────

pub type ParticipantId = u32;
pub type MatchId = u64;

// ── Participants ───────────────────────────────────────────────────────

/// A registered entrant. The engine only ever looks at `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
}

impl Participant {
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Participant { id, name: name.into() }
    }
}

// ── Bracket settings ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BracketFormat {
    SingleElimination,
    #[default]
    DoubleElimination,
}

impl FromStr for BracketFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "single" | "singleelimination" | "se" => Ok(BracketFormat::SingleElimination),
            "double" | "doubleelimination" | "de" => Ok(BracketFormat::DoubleElimination),
            other => Err(format!("Unknown bracket format \"{other}\".")),
        }
    }
}

/// How arrival order is turned into seed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Seeding {
    /// Deterministic shuffle; the same seed always yields the same bracket.
    Random { seed: u64 },
    AsListed,
}

impl Default for Seeding {
    fn default() -> Self {
        Seeding::Random { seed: DEFAULT_SHUFFLE_SEED }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BracketSettings {
    pub format: BracketFormat,
    /// Registration cap. `None` accepts any number of entrants.
    pub capacity: Option<usize>,
    pub seeding: Seeding,
    /// Reject fewer than two entrants instead of building the trivial bracket.
    pub require_playable: bool,
}

impl Default for BracketSettings {
    fn default() -> Self {
        BracketSettings {
            format: BracketFormat::default(),
            capacity: None,
            seeding: Seeding::default(),
            require_playable: false,
        }
    }
}

// ── Match graph ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BracketSection {
    Winners,
    Losers,
    GrandFinal,
    GrandFinalReset,
}

impl BracketSection {
    /// Feeders must come from a strictly lower `(rank, round)`.
    pub fn rank(self) -> u8 {
        match self {
            BracketSection::Winners => 0,
            BracketSection::Losers => 1,
            BracketSection::GrandFinal => 2,
            BracketSection::GrandFinalReset => 3,
        }
    }

    pub fn label(self, round: u32) -> String {
        match self {
            BracketSection::Winners => format!("Winners Round {round}"),
            BracketSection::Losers => format!("Losers Round {round}"),
            BracketSection::GrandFinal => "Grand Final".to_string(),
            BracketSection::GrandFinalReset => "Grand Final Reset".to_string(),
        }
    }
}

impl fmt::Display for BracketSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BracketSection::Winners => "winners",
            BracketSection::Losers => "losers",
            BracketSection::GrandFinal => "grand final",
            BracketSection::GrandFinalReset => "grand final reset",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedRole {
    Winner,
    Loser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotSide {
    A,
    B,
}

/// Who sits (or will sit) in one side of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Slot {
    /// Permanently unfilled; no match will ever feed it.
    Empty,
    Entrant { id: ParticipantId },
    /// Filled by the winner or loser of `from`. `entrant` stays `None` until `from` is decided.
    Feeder {
        from: MatchId,
        role: FeedRole,
        #[serde(default)]
        entrant: Option<ParticipantId>,
    },
}

impl Slot {
    pub fn entrant(id: ParticipantId) -> Self {
        Slot::Entrant { id }
    }

    pub fn pending(from: MatchId, role: FeedRole) -> Self {
        Slot::Feeder { from, role, entrant: None }
    }

    pub fn occupant(&self) -> Option<ParticipantId> {
        match self {
            Slot::Empty => None,
            Slot::Entrant { id } => Some(*id),
            Slot::Feeder { entrant, .. } => *entrant,
        }
    }

    pub fn feeder(&self) -> Option<(MatchId, FeedRole)> {
        match self {
            Slot::Feeder { from, role, .. } => Some((*from, *role)),
            Slot::Empty | Slot::Entrant { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Feeder { entrant: None, .. })
    }

    pub(crate) fn fill(&mut self, participant: ParticipantId) {
        if let Slot::Feeder { entrant, .. } = self {
            *entrant = Some(participant);
        }
    }

    pub(crate) fn vacate(&mut self) {
        if let Slot::Feeder { entrant, .. } = self {
            *entrant = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: String,
    pub section: BracketSection,
    pub round: u32,
    pub position: u32,
    pub slot_a: Slot,
    pub slot_b: Slot,
    pub winner_id: Option<ParticipantId>,
    pub score: Option<String>,
    pub is_bye: bool,
}

impl Match {
    pub fn slot(&self, side: SlotSide) -> &Slot {
        match side {
            SlotSide::A => &self.slot_a,
            SlotSide::B => &self.slot_b,
        }
    }

    pub fn slot_mut(&mut self, side: SlotSide) -> &mut Slot {
        match side {
            SlotSide::A => &mut self.slot_a,
            SlotSide::B => &mut self.slot_b,
        }
    }

    pub fn occupants(&self) -> [Option<ParticipantId>; 2] {
        [self.slot_a.occupant(), self.slot_b.occupant()]
    }

    pub fn occupies(&self, participant: ParticipantId) -> bool {
        self.occupants().contains(&Some(participant))
    }

    pub fn sort_key(&self) -> (u8, u32, u32, MatchId) {
        (self.section.rank(), self.round, self.position, self.id)
    }

    /// Both entrants are known and nobody has won yet.
    pub fn is_playable(&self) -> bool {
        !self.is_bye && self.winner_id.is_none() && self.occupants().iter().all(Option::is_some)
    }

    pub fn loser_id(&self) -> Option<ParticipantId> {
        if self.is_bye {
            return None;
        }
        let winner = self.winner_id?;
        self.occupants().into_iter().flatten().find(|id| *id != winner)
    }

    /// The lone occupant when the other side can never be filled.
    pub fn bye_occupant(&self) -> Option<ParticipantId> {
        match (&self.slot_a, &self.slot_b) {
            (Slot::Empty, Slot::Empty) => None,
            (occupied, Slot::Empty) | (Slot::Empty, occupied) => occupied.occupant(),
            _ => None,
        }
    }

    /// Re-derive `is_bye` from the slots. Returns true when the match just became a
    /// resolved bye whose winner still has to be pushed downstream.
    pub(crate) fn refresh_bye(&mut self) -> bool {
        if self.section == BracketSection::GrandFinalReset {
            return false;
        }
        match self.bye_occupant() {
            Some(occupant) => {
                let newly_resolved = !self.is_bye || self.winner_id != Some(occupant);
                self.is_bye = true;
                self.winner_id = Some(occupant);
                self.score = None;
                newly_resolved
            }
            None => {
                if self.is_bye {
                    self.is_bye = false;
                    self.winner_id = None;
                    self.score = None;
                }
                false
            }
        }
    }

    pub(crate) fn deactivate_reset(&mut self) {
        self.slot_a = Slot::Empty;
        self.slot_b = Slot::Empty;
        self.winner_id = None;
        self.score = None;
        self.is_bye = true;
    }

    pub(crate) fn activate_reset(&mut self, winners_side: ParticipantId, losers_side: ParticipantId) {
        self.slot_a = Slot::entrant(winners_side);
        self.slot_b = Slot::entrant(losers_side);
        self.winner_id = None;
        self.score = None;
        self.is_bye = false;
    }

    pub fn label(&self) -> String {
        self.section.label(self.round)
    }
}
