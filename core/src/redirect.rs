//! Redirection builder — outbound redirect descriptors
//!
//! A selection result becomes an ordered alternate-destination list
//! attached to the re-issued request. Construction only; delivering the
//! redirect is the host transport's job.

use crate::{NodeId, CLOUD_NAME};

/// Where a redirected request should be steered next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Destination {
    /// A peer's own offload namespace (utility-mode pick).
    Offload(NodeId),
    /// The original request with the destination field substituted
    /// (capacity-mode pick).
    Exec(NodeId),
    /// The fixed upstream fallback.
    Cloud,
}

impl Destination {
    /// Render as a routable name.
    pub fn name(&self) -> String {
        match self {
            Destination::Offload(id) => format!("/cfn/offload/{id}"),
            Destination::Exec(id) => format!("/cfn/exec/{id}"),
            Destination::Cloud => CLOUD_NAME.to_string(),
        }
    }
}

/// A request re-issued with an ordered alternate-destination list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Redirect {
    /// The original request name, preserved so the far side can correlate.
    pub request: String,
    /// Alternates in preference order; currently always exactly one.
    pub alternates: Vec<Destination>,
}

/// Build the one-alternate redirect descriptor for `target`.
pub fn build(request: &str, target: Destination) -> Redirect {
    Redirect {
        request: request.to_string(),
        alternates: vec![target],
    }
}
