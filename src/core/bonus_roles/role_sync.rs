// Bonus role planning - pure set math over the ledger's top scorers.
//
// The discord layer feeds in the current role holders and applies the
// resulting plan; this module never touches serenity so the symmetric
// difference logic stays trivially testable.

use std::collections::HashSet;

/// How many top scorers hold the bonus role.
pub const BONUS_ROLE_SLOTS: usize = 12;

/// One-time points granted to a member newly entering the top slots.
/// Granted through the ledger's quiet increment so the grant can't trigger
/// another resync.
pub const ENTRY_BONUS: i64 = 5;

/// Role changes needed to make the holder set match the top scorers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleSyncPlan {
    /// Members gaining the role, in ledger order. Each also receives the
    /// entry bonus.
    pub grant: Vec<u64>,
    /// Members losing the role, sorted for determinism.
    pub revoke: Vec<u64>,
}

impl RoleSyncPlan {
    pub fn is_noop(&self) -> bool {
        self.grant.is_empty() && self.revoke.is_empty()
    }
}

/// Compute the symmetric difference between "should have the role" (the
/// top scorers still present in the guild) and "currently has the role".
pub fn plan_sync(top_scorers: &[u64], current_holders: &HashSet<u64>) -> RoleSyncPlan {
    let top: HashSet<u64> = top_scorers.iter().copied().collect();

    let grant = top_scorers
        .iter()
        .copied()
        .filter(|id| !current_holders.contains(id))
        .collect();

    let mut revoke: Vec<u64> = current_holders
        .iter()
        .copied()
        .filter(|id| !top.contains(id))
        .collect();
    revoke.sort_unstable();

    RoleSyncPlan { grant, revoke }
}
