use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::board::{COLS, ROWS};

/// Board snapshot posted to an agent endpoint when requesting a move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    /// 0 empty, 1 player one, 2 player two; row 0 is the top of the grid.
    pub board: [[u8; COLS]; ROWS],
    /// Seat expected to move (1 or 2).
    pub current_player: u8,
    /// Columns currently accepting a piece.
    pub valid_moves: Vec<usize>,
}

/// Expected 2xx response body.
#[derive(Debug, Deserialize)]
struct MoveResponse {
    #[serde(rename = "move")]
    column: i64,
}

/// Typed failure of a single move request. Ordered taxonomy: a slow answer
/// is a timeout even if it would also have been malformed, an unreachable
/// endpoint is transport before anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AgentFailure {
    #[error("agent did not produce a full response within the deadline")]
    Timeout,
    #[error("agent endpoint unreachable or returned a non-success status")]
    Transport,
    #[error("agent response could not be parsed as a move")]
    Malformed,
    #[error("agent chose a column outside the legal moves")]
    Illegal,
}

impl AgentFailure {
    /// Whether the failure means the endpoint never answered at all, as
    /// opposed to answering badly. Used by the match setup probe.
    pub fn is_unreachable(self) -> bool {
        matches!(self, AgentFailure::Timeout | AgentFailure::Transport)
    }
}

/// Uniform remote-call abstraction over the agent move protocol.
///
/// The remote call is treated as an adversarial action: there are no
/// retries, and a single failure decides the current turn.
pub trait AgentConnector: Send + Sync {
    fn request_move(
        &self,
        endpoint: &str,
        request: MoveRequest,
        deadline: Duration,
    ) -> BoxFuture<'static, Result<usize, AgentFailure>>;
}

/// HTTP implementation of the move protocol over a shared [`reqwest::Client`].
#[derive(Clone, Default)]
pub struct HttpAgentClient {
    client: Client,
}

impl HttpAgentClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl AgentConnector for HttpAgentClient {
    fn request_move(
        &self,
        endpoint: &str,
        request: MoveRequest,
        deadline: Duration,
    ) -> BoxFuture<'static, Result<usize, AgentFailure>> {
        let call = self
            .client
            .post(endpoint)
            .timeout(deadline)
            .json(&request)
            .send();

        Box::pin(async move {
            let response = call.await.map_err(|err| {
                if err.is_timeout() {
                    AgentFailure::Timeout
                } else {
                    AgentFailure::Transport
                }
            })?;

            if !response.status().is_success() {
                return Err(AgentFailure::Transport);
            }

            let body: MoveResponse = response.json().await.map_err(|err| {
                if err.is_timeout() {
                    AgentFailure::Timeout
                } else {
                    AgentFailure::Malformed
                }
            })?;

            validate_column(body.column, &request.valid_moves)
        })
    }
}

/// Check the announced column against the legal set for this turn.
fn validate_column(column: i64, valid_moves: &[usize]) -> Result<usize, AgentFailure> {
    let column = usize::try_from(column).map_err(|_| AgentFailure::Illegal)?;
    if column < COLS && valid_moves.contains(&column) {
        Ok(column)
    } else {
        Err(AgentFailure::Illegal)
    }
}
