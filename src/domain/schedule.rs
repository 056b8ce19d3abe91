use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One scheduled pairing within a round. The match id is assigned when the
/// schedule is generated and stays stable for the whole championship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub match_id: Uuid,
    pub team_a: Uuid,
    pub team_b: Uuid,
}

/// A round of the round-robin: the pairings that may run in parallel, plus
/// the team sitting out when the roster size is odd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// Zero-based round index.
    pub index: usize,
    pub pairings: Vec<Pairing>,
    /// Team with no game this round (odd roster only). Byes award no points
    /// and consume no time.
    pub bye: Option<Uuid>,
}

/// Full round-robin schedule, immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub rounds: Vec<Round>,
}

impl Schedule {
    /// Generate a round-robin schedule with the circle method: seat 0 stays
    /// fixed while the other seats rotate one place per round. An odd roster
    /// gets a phantom seat whose opponent takes the bye.
    ///
    /// The pairing structure is fully determined by roster order.
    pub fn round_robin(team_ids: &[Uuid]) -> Self {
        let mut seats: Vec<Option<Uuid>> = team_ids.iter().copied().map(Some).collect();
        if seats.len() % 2 == 1 {
            seats.push(None);
        }
        let n = seats.len();
        if n < 2 {
            return Self { rounds: Vec::new() };
        }

        let mut rounds = Vec::with_capacity(n - 1);
        for index in 0..n - 1 {
            let mut pairings = Vec::with_capacity(n / 2);
            let mut bye = None;
            for i in 0..n / 2 {
                match (seats[i], seats[n - 1 - i]) {
                    (Some(team_a), Some(team_b)) => pairings.push(Pairing {
                        match_id: Uuid::new_v4(),
                        team_a,
                        team_b,
                    }),
                    (Some(team), None) | (None, Some(team)) => bye = Some(team),
                    (None, None) => {}
                }
            }
            rounds.push(Round {
                index,
                pairings,
                bye,
            });
            seats[1..].rotate_right(1);
        }

        Self { rounds }
    }

    pub fn total_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Number of real (non-bye) matches across all rounds.
    pub fn match_count(&self) -> usize {
        self.rounds.iter().map(|round| round.pairings.len()).sum()
    }
}
