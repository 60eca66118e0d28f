//! Rule that hands the move to the AI whenever it is the AI's turn.

use crate::store::SessionStatus;
use contrast_core::{BoardSnapshot, Player};

/// Level-triggered AI move trigger.
///
/// The store evaluates it after every snapshot; it fires at most once until
/// the AI request it caused has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoplayTrigger {
    enabled: bool,
    outstanding: bool,
    halted: bool,
}

impl Default for AutoplayTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoplayTrigger {
    pub fn new() -> Self {
        Self {
            enabled: true,
            outstanding: false,
            halted: false,
        }
    }

    /// Whether the AI should be moving right now.
    ///
    /// With no human side configured the AI plays both sides.
    pub fn condition(status: SessionStatus, snapshot: Option<&BoardSnapshot>, human: Option<Player>) -> bool {
        let Some(snapshot) = snapshot else {
            return false;
        };
        status == SessionStatus::Ready
            && !snapshot.game_over
            && human.map_or(true, |h| snapshot.current_player != h)
    }

    /// Returns true exactly when the caller should issue an AI move request.
    pub fn evaluate(&mut self, status: SessionStatus, snapshot: Option<&BoardSnapshot>, human: Option<Player>) -> bool {
        if !self.enabled || self.outstanding || self.halted {
            return false;
        }
        if Self::condition(status, snapshot, human) {
            self.outstanding = true;
            true
        } else {
            false
        }
    }

    /// The AI request completed, or was never sent.
    pub fn settle(&mut self) {
        self.outstanding = false;
    }

    /// The AI request failed; stay quiet until re-armed.
    pub fn halt(&mut self) {
        self.outstanding = false;
        self.halted = true;
    }

    pub fn rearm(&mut self) {
        self.halted = false;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}
