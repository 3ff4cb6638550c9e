use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(u64);

/// One-shot timers fired by polling with the current time
///
/// Cancelled timers never fire, so a stopped loop cannot produce a stray tick.
#[derive(Debug)]
pub struct Timers<K> {
    next_id: u64,
    pending: Vec<(Instant, TimerId, K)>,
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }
}

impl<K> Timers<K> {
    pub fn schedule(&mut self, at: Instant, kind: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push((at, id, kind));
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(_, pending, _)| *pending != id);
        self.pending.len() != before
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    #[cfg(test)]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|(_, pending, _)| *pending == id)
    }

    /// Remove and return the earliest timer due at or before `now`
    ///
    /// Ties fire in scheduling order.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, K)> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (at, _, _))| *at <= now)
            .min_by_key(|(_, (at, id, _))| (*at, id.0))
            .map(|(i, _)| i)?;
        let (at, _, kind) = self.pending.remove(index);
        Some((at, kind))
    }
}
