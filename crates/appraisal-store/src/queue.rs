use appraisal_types::{PendingUpdate, SectionPayload};

/// FIFO of updates accepted while the session was invalid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PendingQueue {
    entries: Vec<PendingUpdate>,
    next_sequence: u64,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries; new sequences continue after the
    /// highest one seen.
    pub fn from_entries(mut entries: Vec<PendingUpdate>) -> Self {
        entries.sort_by(PendingUpdate::replay_order);
        let next_sequence = entries
            .iter()
            .map(|e| e.sequence + 1)
            .max()
            .unwrap_or(0);
        Self {
            entries,
            next_sequence,
        }
    }

    pub fn enqueue(&mut self, source: Option<String>, payload: SectionPayload) -> &PendingUpdate {
        let entry = PendingUpdate::new(self.next_sequence, source, payload);
        self.next_sequence += 1;
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Remove the most recently enqueued entry.
    pub fn pop_last(&mut self) -> Option<PendingUpdate> {
        self.entries.pop()
    }

    /// Take every entry in replay order, leaving the queue empty.
    pub fn drain_ordered(&mut self) -> Vec<PendingUpdate> {
        let mut entries = std::mem::take(&mut self.entries);
        entries.sort_by(PendingUpdate::replay_order);
        entries
    }

    /// Put entries back at the front, ahead of anything queued since.
    pub fn requeue_front(&mut self, mut entries: Vec<PendingUpdate>) {
        entries.append(&mut self.entries);
        self.entries = entries;
    }

    pub fn entries(&self) -> &[PendingUpdate] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
