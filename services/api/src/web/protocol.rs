//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for the live fleet dashboard.

use bitacora_core::sync::{CollectionFailure, DashboardStats, Snapshot, SyncOutcome};
use bitacora_core::SessionContext;
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Asks for a fresh snapshot, e.g. the retry button after a failed load.
    Refresh,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Everything the session may see, pushed on connect and after every change.
    Snapshot {
        snapshot: Snapshot,
        stats: DashboardStats,
        /// Collections that failed to load this time; they are empty in `snapshot`.
        failures: Vec<CollectionFailure>,
    },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

impl ServerMessage {
    pub fn snapshot(outcome: SyncOutcome, ctx: &SessionContext) -> Self {
        let stats = outcome.snapshot.stats(ctx);
        ServerMessage::Snapshot {
            snapshot: outcome.snapshot,
            stats,
            failures: outcome.failures,
        }
    }
}
