//! Request-generation tokens for the UI workflows.
//!
//! Each `begin` hands out a new ticket; only the outcome carrying the current
//! ticket is applied, so a slow answer to an abandoned request can never
//! overwrite newer state.

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Ticket(pub u64);

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "phase", content = "value", rename_all = "snake_case")]
pub enum Phase<T> {
    Input,
    Generating,
    Ready(T),
}

#[derive(Serialize, Clone, Debug)]
pub struct Snapshot<T> {
    pub ticket: Ticket,
    #[serde(flatten)]
    pub phase: Phase<T>,
    pub error: Option<String>,
}

struct State<T> {
    seq: u64,
    phase: Phase<T>,
    error: Option<String>,
}

pub struct Workflow<T> {
    state: RwLock<State<T>>,
}

impl<T: Clone> Default for Workflow<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Workflow<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                seq: 0,
                phase: Phase::Input,
                error: None,
            }),
        }
    }

    /// Moves to `generating` and supersedes whatever was in flight.
    pub async fn begin(&self) -> Ticket {
        let mut st = self.state.write().await;
        st.seq += 1;
        st.phase = Phase::Generating;
        st.error = None;
        Ticket(st.seq)
    }

    /// Applies `outcome` if `ticket` is still current. Failures return the
    /// workflow to `input` with `error` set. Returns whether it was applied.
    pub async fn finish(&self, ticket: Ticket, outcome: Result<T, String>) -> bool {
        let mut st = self.state.write().await;
        if ticket.0 != st.seq {
            debug!(
                ticket = ticket.0,
                current = st.seq,
                "discarding superseded result"
            );
            return false;
        }
        match outcome {
            Ok(value) => {
                st.phase = Phase::Ready(value);
                st.error = None;
            }
            Err(msg) => {
                st.phase = Phase::Input;
                st.error = Some(msg);
            }
        }
        true
    }

    /// Back to `input`; in-flight results become stale.
    pub async fn reset(&self) -> Ticket {
        let mut st = self.state.write().await;
        st.seq += 1;
        st.phase = Phase::Input;
        st.error = None;
        Ticket(st.seq)
    }

    pub async fn snapshot(&self) -> Snapshot<T> {
        let st = self.state.read().await;
        Snapshot {
            ticket: Ticket(st.seq),
            phase: st.phase.clone(),
            error: st.error.clone(),
        }
    }

    pub async fn current(&self) -> Option<T> {
        match &self.state.read().await.phase {
            Phase::Ready(value) => Some(value.clone()),
            Phase::Input | Phase::Generating => None,
        }
    }
}
