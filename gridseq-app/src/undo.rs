use std::collections::VecDeque;

pub const UNDO_MAX_HISTORY: usize = 100;

/// Bounded undo/redo stacks of whole-state snapshots.
///
/// Callers push the state *before* mutating it; `undo` swaps the current
/// state with the newest entry and moves the replaced state onto the redo stack.
pub struct UndoHistory<T> {
    undo_stack: VecDeque<T>,
    redo_stack: VecDeque<T>,
    max_depth: usize,
}

impl<T> UndoHistory<T> {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    pub fn push(&mut self, snapshot: T) {
        if self.undo_stack.len() >= self.max_depth {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(snapshot);
        self.redo_stack.clear();
    }

    /// Replaces `current` with the newest undo entry. Returns false when empty.
    pub fn undo(&mut self, current: &mut T) -> bool {
        let Some(previous) = self.undo_stack.pop_back() else {
            return false;
        };
        let replaced = std::mem::replace(current, previous);
        self.redo_stack.push_back(replaced);
        true
    }

    pub fn redo(&mut self, current: &mut T) -> bool {
        let Some(next) = self.redo_stack.pop_back() else {
            return false;
        };
        let replaced = std::mem::replace(current, next);
        self.undo_stack.push_back(replaced);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl<T> Default for UndoHistory<T> {
    fn default() -> Self {
        Self::new(UNDO_MAX_HISTORY)
    }
}
