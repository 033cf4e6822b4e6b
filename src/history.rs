use crate::geometry::RegionRect;
use crate::region::RegionId;

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditKind {
    Move,
    Resize,
}

/// One committed geometric edit. Undo applies `old_rect`, redo `new_rect`.
#[derive(Clone, Debug, PartialEq)]
pub struct EditAction {
    pub kind: EditKind,
    pub region_id: RegionId,
    pub old_rect: RegionRect,
    pub new_rect: RegionRect,
}

/// Bounded undo/redo log, scoped to the page currently open. `applied` counts
/// entries before the cursor; undone entries stay behind it until pruned by
/// the next push.
pub struct HistoryLog {
    entries: Vec<EditAction>,
    applied: usize,
    capacity: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HistoryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            applied: 0,
            capacity,
        }
    }

    /// Append an action, discarding any redo tail and evicting from the front
    /// once over capacity.
    pub fn push(&mut self, action: EditAction) {
        self.entries.truncate(self.applied);
        self.entries.push(action);
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
        }
        self.applied = self.entries.len();
    }

    pub fn undo(&mut self) -> Option<EditAction> {
        if self.applied == 0 {
            return None;
        }
        self.applied -= 1;
        Some(self.entries[self.applied].clone())
    }

    pub fn redo(&mut self) -> Option<EditAction> {
        if self.applied == self.entries.len() {
            return None;
        }
        let action = self.entries[self.applied].clone();
        self.applied += 1;
        Some(action)
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.applied = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn action(tag: f32) -> EditAction {
        EditAction {
            kind: EditKind::Move,
            region_id: Uuid::nil(),
            old_rect: RegionRect::new(0.0, 0.0, tag, tag),
            new_rect: RegionRect::new(tag, tag, tag * 2.0, tag * 2.0),
        }
    }

    #[test]
    fn push_after_undo_prunes_redo_tail() {
        let mut log = HistoryLog::default();
        log.push(action(1.0));
        log.push(action(2.0));
        assert!(log.undo().is_some());
        log.push(action(3.0));
        assert!(log.redo().is_none(), "redo branch must be discarded");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn undo_on_empty_is_noop() {
        let mut log = HistoryLog::default();
        assert!(log.undo().is_none());
        assert!(!log.can_undo());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut log = HistoryLog::new(3);
        for i in 0..4 {
            log.push(action(i as f32 + 1.0));
        }
        assert_eq!(log.len(), 3);
        // drain everything; the first entry pushed is gone
        let mut tags = Vec::new();
        while let Some(a) = log.undo() {
            tags.push(a.old_rect.x2);
        }
        assert_eq!(tags, vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn undo_then_redo_returns_same_action() {
        let mut log = HistoryLog::default();
        log.push(action(5.0));
        let undone = log.undo().unwrap();
        let redone = log.redo().unwrap();
        assert_eq!(undone, redone);
        assert!(log.redo().is_none());
    }

    #[test]
    fn clear_resets_cursor() {
        let mut log = HistoryLog::default();
        log.push(action(1.0));
        log.clear();
        assert!(log.is_empty());
        assert!(log.undo().is_none());
        assert!(log.redo().is_none());
    }
}
