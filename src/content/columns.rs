//! Comparison columns.
//!
//! Column 0 always exists. Extra columns each get their own container in
//! every row group, cycling through the version columns for their default
//! tab.

use crate::content::render::{ColumnHeader, ContentRenderer, RowTable};

/// 1-based default tab for the column at 0-based `index`.
pub fn default_tab_for_column(index: usize, version_count: usize) -> usize {
    if version_count == 0 {
        return 1;
    }
    index % version_count + 1
}

/// Adds and removes comparison columns on one rendered table.
pub struct ColumnManager<'a> {
    table: &'a mut RowTable,
    renderer: &'a ContentRenderer,
}

impl<'a> ColumnManager<'a> {
    pub fn new(table: &'a mut RowTable, renderer: &'a ContentRenderer) -> Self {
        Self { table, renderer }
    }

    pub fn column_count(&self) -> usize {
        self.table.headers.len()
    }

    fn version_count(&self) -> usize {
        self.table.version_columns.len()
    }

    /// Whether the remove affordance is shown.
    pub fn can_remove(&self) -> bool {
        self.table.can_remove_column()
    }

    /// Whether another column may be added.
    pub fn can_add(&self) -> bool {
        self.table.can_add_column()
    }

    /// Append a column with its own container in every group.
    /// Returns false once the added columns match the version count.
    pub fn add_column(&mut self) -> bool {
        if !self.can_add() {
            log::debug!("Column limit reached ({} versions)", self.version_count());
            return false;
        }
        let index = self.column_count();
        let default_tab = default_tab_for_column(index, self.version_count());
        self.table.headers.push(ColumnHeader { index, default_tab });

        let renderer = self.renderer;
        for group in self.table.groups.iter_mut() {
            let container = renderer.make_container(group, default_tab);
            group.containers.push(container);
        }
        true
    }

    /// Drop the last column. No-op at one column.
    pub fn remove_column(&mut self) -> bool {
        if !self.can_remove() {
            return false;
        }
        self.table.headers.pop();
        for group in self.table.groups.iter_mut() {
            group.containers.pop();
        }
        true
    }

    /// Back to exactly one column.
    pub fn reset_columns(&mut self) {
        while self.remove_column() {}
    }
}
