//! Shared primitive types used across the assignment engine.

/// Stable identifier of an account (customer or prospect).
pub type AccountId = String;

/// Stable identifier of a sales representative.
pub type RepId = String;

/// The scenario an assignment run belongs to.
pub type ScenarioId = String;

/// The canonical run identifier.
pub type RunId = String;
