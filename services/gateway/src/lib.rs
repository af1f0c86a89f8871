//! Session fleet gateway.
//!
//! Fronts a fleet of nodes running the session service behind one API:
//! routes session calls to the owning node, places new sessions on the
//! least loaded node, grows the fleet when it saturates, and periodically
//! reconciles recorded session status with what the nodes report.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod model;
pub mod placement;
pub mod provision;
pub mod reconcile;
pub mod state;
