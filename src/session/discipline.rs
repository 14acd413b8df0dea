//! Source-of-truth resolution for the active workout discipline.
//!
//! Three independently-mutable stores hold an opinion about which
//! discipline is active: the interactive selection, the persisted
//! setting, and the tracking engine. Before a session starts (and
//! after a join) they must agree. Fixed priority UI > persisted >
//! engine: the interactive selection reflects the user's most recent
//! explicit intent, while the engine may retain a stale value from a
//! prior screen or session.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::{SelectionStore, TrackingEngine};
use crate::error::SyncError;

/// Workout type/category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    OutdoorRun,
    Treadmill,
    Hike,
}

impl Discipline {
    pub fn is_indoor(self) -> bool {
        matches!(self, Self::Treadmill)
    }
}

/// The three discipline opinions, highest priority first.
#[derive(Debug, Clone, Copy)]
pub struct DisciplineSelection {
    pub ui: Option<Discipline>,
    pub persisted: Option<Discipline>,
    pub engine: Option<Discipline>,
}

impl DisciplineSelection {
    /// The winning value under UI > persisted > engine priority.
    pub fn winner(&self) -> Option<Discipline> {
        self.ui.or(self.persisted).or(self.engine)
    }
}

/// Reconciles the three discipline stores, writing the winning value
/// into the losing ones.
pub struct SourceOfTruthResolver {
    persisted: Arc<dyn SelectionStore>,
    engine: Arc<dyn TrackingEngine>,
}

impl SourceOfTruthResolver {
    pub fn new(persisted: Arc<dyn SelectionStore>, engine: Arc<dyn TrackingEngine>) -> Self {
        Self { persisted, engine }
    }

    /// Resolve the active discipline given the interactive selection.
    ///
    /// When all three stores agree, returns that value untouched.
    /// Otherwise the highest-priority present value wins and is
    /// propagated to the stores that disagree. Updating the engine
    /// may be rejected; that surfaces as [`SyncError::EngineRejected`]
    /// and nothing else is rolled back (the persisted write is
    /// idempotent and already correct).
    pub fn resolve(&self, ui: Option<Discipline>) -> Result<Discipline, SyncError> {
        let selection = DisciplineSelection {
            ui,
            persisted: self.persisted.discipline(),
            engine: Some(self.engine.discipline()),
        };
        // All slots empty cannot happen: the engine always has a value.
        let winner = selection.winner().unwrap_or(Discipline::OutdoorRun);

        if selection.persisted != Some(winner) {
            tracing::info!(
                from = ?selection.persisted,
                to = ?winner,
                "propagating discipline into persisted store"
            );
            self.persisted.set_discipline(winner);
        }
        if selection.engine != Some(winner) {
            tracing::info!(
                from = ?selection.engine,
                to = ?winner,
                "propagating discipline into tracking engine"
            );
            self.engine
                .set_discipline(winner)
                .map_err(SyncError::EngineRejected)?;
        }
        Ok(winner)
    }
}
