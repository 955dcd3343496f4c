//! Row selection. Every change re-evaluates the selection rules of the query's actions.

use super::{Query, Row};
use crate::events::QueryEvent;
use std::sync::Arc;

impl Query {
    pub fn selected_rows(&self) -> Vec<Arc<Row>> {
        self.state.read().selected.clone()
    }

    pub fn selected_count(&self) -> usize {
        self.state.read().selected.len()
    }

    pub fn is_selected(&self, row: &Row) -> bool {
        self.state.read().selected.iter().any(|r| r.id() == row.id())
    }

    pub fn select(&self, row: Arc<Row>) {
        let count = {
            let mut state = self.state.write();
            if state.selected.iter().any(|r| r.id() == row.id()) {
                return;
            }
            state.selected.push(row);
            state.selected.len()
        };
        self.selection_changed(count);
    }

    pub fn deselect(&self, row: &Row) {
        let count = {
            let mut state = self.state.write();
            let before = state.selected.len();
            state.selected.retain(|r| r.id() != row.id());
            if state.selected.len() == before {
                return;
            }
            state.selected.len()
        };
        self.selection_changed(count);
    }

    pub fn toggle_selection(&self, row: Arc<Row>) {
        if self.is_selected(&row) {
            self.deselect(&row);
        } else {
            self.select(row);
        }
    }

    /// Replace the selection.
    pub fn set_selection(&self, rows: Vec<Arc<Row>>) {
        let count = {
            let mut state = self.state.write();
            state.selected.clear();
            for row in rows {
                if !state.selected.iter().any(|r| r.id() == row.id()) {
                    state.selected.push(row);
                }
            }
            state.selected.len()
        };
        self.selection_changed(count);
    }

    /// Select every resident row.
    pub fn select_all(&self) {
        let rows = self.rows();
        self.set_selection(rows);
    }

    pub fn clear_selection(&self) {
        self.set_selection(Vec::new());
    }

    pub(super) fn selection_changed(&self, selected: usize) {
        for action in self.actions.iter().chain(&self.pinned_actions) {
            action.invalidate(selected);
        }
        self.events.emit(QueryEvent::SelectionChanged { selected });
    }
}
