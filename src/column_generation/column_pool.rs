use std::slice::Iter;

use crate::column_generation::schedule::Schedule;
use crate::instance::ProductionLine;

/// Position of a lambda column: its line and its index within that line
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnId {
    pub line: ProductionLine,
    pub index: u32,
}

impl std::hash::Hash for ColumnId {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u64((u64::from(self.line.0) << 32) | u64::from(self.index))
    }
}

impl nohash_hasher::IsEnabled for ColumnId {}

#[derive(Clone, Debug)]
pub struct Column<Var> {
    pub id: ColumnId,
    pub schedule: Schedule,
    pub var: Var,
}

/// Holds all columns generated so far, one append-only list per line.
///
/// This is the only owner of schedules; `Schedule::lambda_index` merely
/// caches the position inside the line's list.
pub struct ColumnPool<Var> {
    columns: Vec<Vec<Column<Var>>>,
}

impl<Var> ColumnPool<Var> {
    pub fn new(number_of_lines: usize) -> Self {
        ColumnPool {
            columns: (0..number_of_lines).map(|_| Vec::new()).collect(),
        }
    }

    /// Total number of columns in pool
    pub fn count(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn count_line(&self, line: ProductionLine) -> usize {
        self.columns[line.0 as usize].len()
    }

    /// Returns a specific column from the pool
    pub fn get_column(&self, id: ColumnId) -> &Column<Var> {
        let column_at_index = &self.columns[id.line.0 as usize][id.index as usize];

        // ids of lookup key and value must match
        debug_assert_eq!(column_at_index.id, id);

        column_at_index
    }

    pub fn columns_of_line(&self, line: ProductionLine) -> Iter<Column<Var>> {
        self.columns[line.0 as usize].iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column<Var>> {
        self.columns.iter().flatten()
    }

    /// Id the next column of `line` will receive
    pub fn next_id(&self, line: ProductionLine) -> ColumnId {
        ColumnId {
            line,
            index: self.count_line(line) as u32,
        }
    }

    /// Column of the same line with exactly the same edge incidence
    pub fn find_duplicate(&self, schedule: &Schedule) -> Option<ColumnId> {
        self.columns_of_line(schedule.line)
            .find(|c| c.schedule.same_incidence(schedule))
            .map(|c| c.id)
    }

    /// Appends a column. Callers check for duplicates beforehand.
    pub fn push(&mut self, mut schedule: Schedule, var: Var) -> ColumnId {
        #[cfg(feature = "validity_assertions")]
        {
            // assert that we never store the same column twice
            assert!(self.find_duplicate(&schedule).is_none(), "duplicate column {}", schedule);
        }

        let id = self.next_id(schedule.line);
        schedule.lambda_index = Some(id.index as usize);
        self.columns[id.line.0 as usize].push(Column { id, schedule, var });
        id
    }
}

impl<Var: Clone> Clone for ColumnPool<Var> {
    fn clone(&self) -> Self {
        Self {
            columns: self.columns.clone(),
        }
    }
}
