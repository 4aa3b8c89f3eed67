//! The RKE2 cluster-bootstrap state machine (§4.5).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterBootstrapState {
    Uninitialized,
    FirstMasterInstalling,
    FirstMasterReady,
    TokenFetched,
    AdditionalMastersJoining,
    MastersReady,
    WorkersJoining,
    ClusterReady,
    Failed,
}

impl ClusterBootstrapState {
    /// `Failed` is reachable from any non-terminal state (§4.5).
    pub fn fail(self) -> Self {
        ClusterBootstrapState::Failed
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ClusterBootstrapState::ClusterReady | ClusterBootstrapState::Failed)
    }

    /// The state immediately following this one on the happy path. `None`
    /// for the terminal states.
    pub fn next(self) -> Option<Self> {
        use ClusterBootstrapState::*;
        match self {
            Uninitialized => Some(FirstMasterInstalling),
            FirstMasterInstalling => Some(FirstMasterReady),
            FirstMasterReady => Some(TokenFetched),
            TokenFetched => Some(AdditionalMastersJoining),
            AdditionalMastersJoining => Some(MastersReady),
            MastersReady => Some(WorkersJoining),
            WorkersJoining => Some(ClusterReady),
            ClusterReady | Failed => None,
        }
    }
}
