//! Deterministic fault injection for exercising retransmission.
//!
//! Faults fire on a fixed cadence counted per direction, so a given plan
//! always produces the same sequence of losses.

/// Which publishes the channel should lose or damage.
///
/// Each field is a cadence: `Some(n)` fires on the n-th, 2n-th, ... publish in
/// that direction. `None` and `Some(0)` disable the fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Drop every n-th forward (frame) publish.
    pub drop_forward_every: Option<u32>,
    /// Invert one byte of every n-th forward publish.
    pub corrupt_forward_every: Option<u32>,
    /// Drop every n-th reverse (acknowledgement) publish.
    pub drop_reverse_every: Option<u32>,
}

impl FaultPlan {
    /// A plan that delivers everything intact.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether any fault is enabled.
    pub fn is_active(&self) -> bool {
        [
            self.drop_forward_every,
            self.corrupt_forward_every,
            self.drop_reverse_every,
        ]
        .iter()
        .any(|every| matches!(every, Some(n) if *n > 0))
    }

    pub(crate) fn drops_forward(&self, publish_no: u64) -> bool {
        fires(self.drop_forward_every, publish_no)
    }

    pub(crate) fn corrupts_forward(&self, publish_no: u64) -> bool {
        fires(self.corrupt_forward_every, publish_no)
    }

    pub(crate) fn drops_reverse(&self, publish_no: u64) -> bool {
        fires(self.drop_reverse_every, publish_no)
    }
}

/// Invert the middle byte of a message.
///
/// For a framed message of `n + 4` bytes the middle always lands inside the
/// payload, so the damage surfaces as a checksum mismatch. Returns the index
/// touched.
pub(crate) fn corrupt(message: &mut [u8]) -> Option<usize> {
    if message.is_empty() {
        return None;
    }
    let index = message.len() / 2;
    message[index] = !message[index];
    Some(index)
}

fn fires(every: Option<u32>, publish_no: u64) -> bool {
    match every {
        Some(n) if n > 0 => publish_no > 0 && publish_no % u64::from(n) == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_counts_from_one() {
        let plan = FaultPlan {
            drop_forward_every: Some(3),
            ..FaultPlan::default()
        };
        let fired: Vec<u64> = (1..=9).filter(|n| plan.drops_forward(*n)).collect();
        assert_eq!(fired, vec![3, 6, 9]);
    }

    #[test]
    fn zero_cadence_is_disabled() {
        let plan = FaultPlan {
            drop_reverse_every: Some(0),
            ..FaultPlan::default()
        };
        assert!(!plan.is_active());
        assert!(!(1..100).any(|n| plan.drops_reverse(n)));
    }

    #[test]
    fn default_plan_is_inactive() {
        assert!(!FaultPlan::none().is_active());
    }

    #[test]
    fn corrupt_hits_payload_of_frame() {
        // STX, LEN=3, 11 22 33, CHK, ETX
        let mut frame = [0x02, 0x03, 0x11, 0x22, 0x33, 0x00, 0x03];
        let index = corrupt(&mut frame).unwrap();
        assert_eq!(index, 3);
        assert_eq!(frame[3], !0x22);
    }

    #[test]
    fn corrupt_empty_is_noop() {
        assert_eq!(corrupt(&mut []), None);
    }
}
