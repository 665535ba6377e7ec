//! Typed rows and the assembled table.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

/// A single cell. Dimensions are always [`Value::String`], metrics are numeric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(Box<str>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(int) => write!(f, "{int}"),
            Self::Float(float) => write!(f, "{float}"),
            Self::String(string) => f.write_str(string),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

/// Column name to value, in header order (dimensions first, then metrics).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRow {
    cells: Vec<(Box<str>, Value)>,
}

impl ReportRow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    /// Sets `column` to `value`, overwriting in place if the column already exists.
    pub fn insert(&mut self, column: impl Into<Box<str>>, value: Value) {
        let column = column.into();

        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find_map(|(name, value)| (&**name == column).then_some(value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.cells.iter().map(|(name, _)| &**name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.cells.iter().map(|(name, value)| (&**name, value))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Strips `prefix` from every column, keeping the first cell when two names collide.
    /// Returns the names of the cells that were dropped.
    fn strip_prefix(&mut self, prefix: &str) -> Vec<Box<str>> {
        let mut stripped = Vec::with_capacity(self.cells.len());
        let mut collided = Vec::new();

        for (name, value) in self.cells.drain(..) {
            let new_name = strip_prefix(&name, prefix);

            if stripped.iter().any(|(existing, _): &(Box<str>, Value)| &**existing == new_name) {
                collided.push(name);
                continue;
            }

            let name = if new_name.len() == name.len() {
                name
            } else {
                Box::from(new_name)
            };

            stripped.push((name, value));
        }

        self.cells = stripped;
        collided
    }
}

impl<K: Into<Box<str>>> FromIterator<(K, Value)> for ReportRow {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        let mut row = Self::default();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

/// Removes every leading occurrence of `prefix` from `name`. Applying it to an already
/// stripped name is a no-op.
pub fn strip_prefix<'a>(mut name: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return name;
    }

    while let Some(rest) = name.strip_prefix(prefix) {
        name = rest;
    }

    name
}

/// Every row of a report, plus the distinct column names in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportTable {
    columns: Vec<Box<str>>,
    rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::with_capacity(rows),
        }
    }

    /// Appends rows, registering any column not seen before.
    pub fn extend<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = ReportRow>,
    {
        let mut seen: HashSet<Box<str>> = self.columns.iter().cloned().collect();

        for row in rows {
            for column in row.columns() {
                if !seen.contains(column) {
                    seen.insert(column.into());
                    self.columns.push(column.into());
                }
            }

            self.rows.push(row);
        }
    }

    pub fn push(&mut self, row: ReportRow) {
        self.extend(std::iter::once(row));
    }

    /// Strips `prefix` from every column name, in the header and in every row. Where two
    /// columns end up with the same name the first one wins, and the number of cells lost
    /// that way is returned.
    pub fn strip_prefix(&mut self, prefix: &str) -> usize {
        let mut seen = HashSet::with_capacity(self.columns.len());

        let columns = std::mem::take(&mut self.columns);
        for column in columns {
            let stripped = strip_prefix(&column, prefix);
            if seen.insert(Box::<str>::from(stripped)) {
                self.columns.push(stripped.into());
            }
        }

        let mut dropped = 0;
        let mut collided = HashSet::new();

        for row in self.rows.iter_mut() {
            for name in row.strip_prefix(prefix) {
                dropped += 1;
                collided.insert(name);
            }
        }

        for column in collided.iter() {
            warn!(
                message = "column collides with another once its prefix is stripped, dropping it",
                %column,
                prefix,
            );
        }

        dropped
    }

    #[inline]
    pub fn columns(&self) -> &[Box<str>] {
        &self.columns
    }

    #[inline]
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates one row as cells aligned to [`Self::columns`], with [`None`] for columns the
    /// row doesn't have.
    pub fn aligned_row<'a>(&'a self, row: &'a ReportRow) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.columns.iter().map(move |column| row.get(column))
    }
}
