//! Bracket engine error types.

use thiserror::Error;

use crate::types::{MatchId, ParticipantId};

/// Everything the engine can reject. None of these are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BracketError {
    /// Fewer than two entrants where the caller asked for a playable bracket
    #[error("A playable bracket needs at least two entrants, got {0}")]
    InvalidParticipantCount(usize),

    /// Operation referenced a match id that is not in the set
    #[error("Match {0} not found")]
    UnknownMatch(MatchId),

    /// Declared winner does not occupy either slot of the match
    #[error("Participant {winner_id} is not playing in match {match_id}")]
    InvalidWinner {
        match_id: MatchId,
        winner_id: ParticipantId,
    },

    /// One side of the match is still waiting on an earlier result
    #[error("Match {0} is still waiting on an entrant")]
    MatchNotReady(MatchId),

    /// Feeder wiring is broken (missing, cyclic or duplicated references)
    #[error("Malformed bracket graph: {0}")]
    MalformedGraph(String),

    /// Same participant id registered twice
    #[error("Participant {0} is registered more than once")]
    DuplicateParticipant(ParticipantId),

    /// More entrants than the tournament accepts
    #[error("Capacity exceeded: {entrants} entrants for {capacity} places")]
    CapacityExceeded { capacity: usize, entrants: usize },
}

pub type BracketResult<T> = Result<T, BracketError>;

impl BracketError {
    /// True when the caller sent something wrong, as opposed to the stored graph being broken.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, BracketError::MalformedGraph(_))
    }
}
