use crate::edit_state::EditState;

// ============================================================================
// EDIT HISTORY: linear undo/redo over EditState snapshots
// ============================================================================
//
// Snapshots live in an arena with a cursor. Undo/redo only move the cursor.
// Committing after an undo drops everything past the cursor: history is a
// line, never a tree.

pub const DEFAULT_MAX_UNDO_STEPS: usize = 50;

#[derive(Clone, Debug)]
pub struct EditHistory {
    snapshots: Vec<EditState>,
    cursor: usize,
    max_history_size: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO_STEPS)
    }
}

impl EditHistory {
    /// History holding only the neutral state.
    pub fn new(max_history_size: usize) -> Self {
        Self::starting_at(EditState::default(), max_history_size)
    }

    pub fn starting_at(initial: EditState, max_history_size: usize) -> Self {
        Self {
            snapshots: vec![initial],
            cursor: 0,
            max_history_size: max_history_size.max(1),
        }
    }

    /// Push a snapshot, discarding any redoable states.
    pub fn commit(&mut self, state: EditState) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(state);
        self.cursor = self.snapshots.len() - 1;
        self.prune();
    }

    /// Step back. Returns false at the oldest snapshot.
    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Step forward. Returns false at the newest snapshot.
    pub fn redo(&mut self) -> bool {
        if self.cursor + 1 >= self.snapshots.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn current(&self) -> EditState {
        self.snapshots[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn snapshots(&self) -> &[EditState] {
        &self.snapshots
    }

    pub fn undo_count(&self) -> usize {
        self.cursor
    }

    pub fn redo_count(&self) -> usize {
        self.snapshots.len() - 1 - self.cursor
    }

    /// Drop everything and start over from the neutral state.
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.snapshots.push(EditState::default());
        self.cursor = 0;
    }

    /// Keep at most `max_history_size` undo steps, dropping the oldest.
    fn prune(&mut self) {
        let limit = self.max_history_size + 1;
        if self.snapshots.len() > limit {
            let excess = self.snapshots.len() - limit;
            self.snapshots.drain(..excess);
            self.cursor -= excess;
            log::debug!("history pruned {} oldest snapshot(s)", excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bright(v: f32) -> EditState {
        EditState::default().with_brightness(v)
    }

    #[test]
    fn undo_redo_walks_the_line() {
        let mut h = EditHistory::default();
        for v in [110.0, 120.0, 130.0] {
            h.commit(bright(v));
        }
        assert_eq!(h.current(), bright(130.0));
        for n in 1..=3 {
            assert!(h.undo());
            assert_eq!(h.cursor(), 3 - n);
        }
        assert_eq!(h.current(), EditState::default());
        for _ in 0..3 {
            assert!(h.redo());
        }
        assert_eq!(h.current(), bright(130.0));
    }

    #[test]
    fn ends_clamp_without_error() {
        let mut h = EditHistory::default();
        assert!(!h.undo());
        assert!(!h.redo());
        h.commit(bright(110.0));
        assert!(!h.redo());
        assert!(h.undo());
        assert!(!h.undo());
        assert_eq!(h.cursor(), 0);
    }

    #[test]
    fn commit_after_undo_truncates_branch() {
        let mut h = EditHistory::default();
        h.commit(bright(110.0));
        h.commit(bright(120.0));
        h.undo();
        h.commit(bright(90.0));
        assert_eq!(h.snapshots(), &[EditState::default(), bright(110.0), bright(90.0)]);
        assert!(!h.can_redo());
    }

    #[test]
    fn prunes_oldest_beyond_limit() {
        let mut h = EditHistory::new(3);
        for i in 0..10 {
            h.commit(bright(100.0 + i as f32));
        }
        assert_eq!(h.len(), 4);
        assert_eq!(h.undo_count(), 3);
        assert_eq!(h.snapshots()[0], bright(106.0));
        assert_eq!(h.current(), bright(109.0));
    }

    #[test]
    fn clear_restores_single_neutral_snapshot() {
        let mut h = EditHistory::default();
        h.commit(bright(140.0));
        h.clear();
        assert_eq!(h.len(), 1);
        assert_eq!(h.current(), EditState::default());
        assert_eq!(h.redo_count(), 0);
    }
}
