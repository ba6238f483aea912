/// Pivot planning for the sparse phase of a sync round.
///
/// Given how far the peer's target is ahead of the common ancestor, decide
/// how many pivot headers to probe and how many headers to skip between them.
use super::config::{GAP, MAX_PIVOTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PivotPlan {
    /// Headers omitted between two returned pivots (0 or `GAP`).
    pub skip: u32,
    /// Pivots to collect before the round can move on.
    pub pivot_count: u32,
}

impl PivotPlan {
    /// With no skip, the pivots are the whole range and no fetch round follows.
    pub fn is_dense(&self) -> bool {
        self.skip == 0
    }
}

/// Plan the sparse probe for `distance = target - ancestor`.
///
/// Short distances are fetched densely in a single request. Longer ones are
/// covered by up to `MAX_PIVOTS` pivots spaced `GAP + 1` apart.
pub fn plan_pivots(distance: u64) -> PivotPlan {
    let stride = u64::from(GAP) + 1;

    if distance <= u64::from(GAP) {
        return PivotPlan {
            skip: 0,
            // bounded by GAP above
            pivot_count: distance as u32,
        };
    }

    let remainder = distance % stride;
    let pivots_needed = distance / stride + u64::from(remainder != 0);

    PivotPlan {
        skip: GAP,
        pivot_count: pivots_needed.min(u64::from(MAX_PIVOTS)) as u32,
    }
}
