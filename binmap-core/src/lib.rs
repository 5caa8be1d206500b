//! Core of binmap: keeps nearby waste bins on a map centered on the user.

/// Map provider adapter over a vendor map SDK.
pub mod adapter;
/// Map view state machine.
pub mod controller;
/// Domain models and identifiers.
pub mod model;
/// Receptacle detail overlay.
pub mod overlay;
/// Traits describing the external collaborators.
pub mod ports;
/// Marker reconciliation.
pub mod reconcile;

#[cfg(test)]
mod test_support;

pub use adapter::*;
pub use controller::*;
pub use model::*;
pub use overlay::*;
pub use ports::*;
pub use reconcile::*;
