//! Amulet identity checks
//!
//! Spending an amulet on another player reveals a team. The Shapeshifter
//! presents as good, so a check is only as trustworthy as `is_true_team`
//! says; that flag is kept for the match record and never shown to the
//! checker while the match runs.

use serde::Serialize;

use crate::catalog::{Role, Team};

/// One performed amulet check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmuletCheck {
    /// Name of the player who spent the amulet
    pub checker: String,
    /// Name of the checked player
    pub target: String,
    /// The team the amulet showed
    pub revealed_team: Team,
    /// Whether the shown team is the target's real team
    pub is_true_team: bool,
    /// Quest in progress when the check happened, the final quest included
    pub quest_number: usize,
}

/// What an amulet shows for a role
///
/// # Returns
///
/// The presented team and whether it is the role's real team
pub fn reveal(role: Role) -> (Team, bool) {
    let shown = role.amulet_team();
    (shown, shown == role.team())
}

/// Every check of a match in the order they happened
#[derive(Debug, Clone, Default, Serialize)]
pub struct AmuletLog {
    checks: Vec<AmuletCheck>,
}

impl AmuletLog {
    pub(crate) fn record(&mut self, check: AmuletCheck) {
        self.checks.push(check);
    }

    /// Checks made or received by the named player
    pub fn involving(&self, name: &str) -> Vec<AmuletCheck> {
        self.checks
            .iter()
            .filter(|c| c.checker == name || c.target == name)
            .cloned()
            .collect()
    }

    /// All checks in order
    pub fn iter(&self) -> std::slice::Iter<'_, AmuletCheck> {
        self.checks.iter()
    }

    /// Number of checks performed
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no check happened yet
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
