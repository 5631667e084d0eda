use crate::session::SessionId;

/// The set of live sessions a publish fan-out decided to send to.
/// SF enqueueing happens inline during fan-out (it cannot fail), so
/// only the "attempt a live send" half needs to be handed back to
/// the caller, who owns the actual I/O.
pub struct FanOutPlan<H> {
    pub live: Vec<(SessionId, H)>,
}

impl<H> Default for FanOutPlan<H> {
    fn default() -> Self {
        Self { live: Vec::new() }
    }
}
