use thiserror::Error;
use tracegrid_columnar::{BitVec, RowMap, StringId, StringPool};

use crate::executor::{Column, QueryExecutor};
use crate::storage::{IdStorage, NullStorage, NumericStorage, SetIdStorage, Storage, StringStorage};
use crate::types::Constraint;

/// Encoding invariants are enforced when a table is finalized, not deferred
/// to query-time assertions: a table that builds successfully can be
/// filtered without further checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("column `{name}` has {got} rows, expected {expected}")]
    RowCountMismatch { name: String, got: u32, expected: u32 },
    #[error("column `{name}` is declared sorted but row {row} is out of order")]
    NotSorted { name: String, row: u32 },
    #[error("column `{name}` breaks the set id encoding at row {row}")]
    InvalidSetId { name: String, row: u32 },
}

#[derive(Debug)]
enum ColumnData {
    Id,
    Int { values: Vec<i64>, sorted: bool },
    NullableInt { values: Vec<i64>, presence: BitVec, sorted: bool },
    Double { values: Vec<f64>, sorted: bool },
    String { ids: Vec<StringId>, sorted: bool },
    SetId { values: Vec<u32> },
}

impl ColumnData {
    fn row_count(&self) -> Option<u32> {
        match self {
            // An id column spans however many rows the table has.
            ColumnData::Id => None,
            ColumnData::Int { values, .. } => Some(values.len() as u32),
            ColumnData::NullableInt { presence, .. } => Some(presence.len()),
            ColumnData::Double { values, .. } => Some(values.len() as u32),
            ColumnData::String { ids, .. } => Some(ids.len() as u32),
            ColumnData::SetId { values } => Some(values.len() as u32),
        }
    }
}

/// Owns the backing arrays every per-query storage view borrows from.
///
/// Building is phase-separated from querying: columns are appended in full,
/// `finish` validates the encoding invariants, and the resulting table is
/// immutable from then on.
pub struct TableBuilder {
    pool: StringPool,
    columns: Vec<(String, ColumnData)>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { pool: StringPool::new(), columns: Vec::new() }
    }

    /// A column whose rows are their own values.
    pub fn add_id_column(&mut self, name: &str) -> &mut Self {
        self.columns.push((name.to_owned(), ColumnData::Id));
        self
    }

    pub fn add_int_column(&mut self, name: &str, values: &[i64], sorted: bool) -> &mut Self {
        self.columns
            .push((name.to_owned(), ColumnData::Int { values: values.to_vec(), sorted }));
        self
    }

    /// A nullable integer column; `None` rows read as SQL NULL.
    pub fn add_nullable_int_column(
        &mut self,
        name: &str,
        values: &[Option<i64>],
        sorted: bool,
    ) -> &mut Self {
        let mut presence = BitVec::new();
        let mut compact = Vec::new();
        for value in values {
            presence.push(value.is_some());
            if let Some(v) = value {
                compact.push(*v);
            }
        }
        self.columns.push((
            name.to_owned(),
            ColumnData::NullableInt { values: compact, presence, sorted },
        ));
        self
    }

    pub fn add_double_column(&mut self, name: &str, values: &[f64], sorted: bool) -> &mut Self {
        self.columns
            .push((name.to_owned(), ColumnData::Double { values: values.to_vec(), sorted }));
        self
    }

    /// A string column; `None` rows hold the null sentinel id.
    pub fn add_string_column(
        &mut self,
        name: &str,
        values: &[Option<&str>],
        sorted: bool,
    ) -> &mut Self {
        let ids = values
            .iter()
            .map(|v| match v {
                Some(s) => self.pool.intern(s),
                None => StringId::NULL,
            })
            .collect();
        self.columns.push((name.to_owned(), ColumnData::String { ids, sorted }));
        self
    }

    pub fn add_set_id_column(&mut self, name: &str, values: &[u32]) -> &mut Self {
        self.columns.push((name.to_owned(), ColumnData::SetId { values: values.to_vec() }));
        self
    }

    pub fn finish(self) -> Result<Table, TableError> {
        let row_count = self
            .columns
            .iter()
            .find_map(|(_, data)| data.row_count())
            .unwrap_or(0);

        for (name, data) in &self.columns {
            if let Some(got) = data.row_count() {
                if got != row_count {
                    return Err(TableError::RowCountMismatch {
                        name: name.clone(),
                        got,
                        expected: row_count,
                    });
                }
            }
            self.validate_column(name, data)?;
        }

        Ok(Table { pool: self.pool, columns: self.columns, row_count })
    }

    fn validate_column(&self, name: &str, data: &ColumnData) -> Result<(), TableError> {
        let not_sorted = |row: usize| TableError::NotSorted { name: name.to_owned(), row: row as u32 };
        match data {
            ColumnData::Id => {}
            ColumnData::Int { values, sorted } | ColumnData::NullableInt { values, sorted, .. } => {
                if *sorted {
                    if let Some(row) = first_unsorted(values) {
                        return Err(not_sorted(row));
                    }
                }
            }
            ColumnData::Double { values, sorted } => {
                if *sorted {
                    if let Some(row) = first_unsorted(values) {
                        return Err(not_sorted(row));
                    }
                }
            }
            ColumnData::String { ids, sorted } => {
                if *sorted {
                    let row = ids
                        .windows(2)
                        .position(|w| self.pool.get(w[0]) > self.pool.get(w[1]));
                    if let Some(row) = row {
                        return Err(not_sorted(row + 1));
                    }
                }
            }
            ColumnData::SetId { values } => {
                for (i, &v) in values.iter().enumerate() {
                    let breaks_encoding = v as usize > i
                        || values.get(v as usize) != Some(&v)
                        || (i > 0 && values[i - 1] > v);
                    if breaks_encoding {
                        return Err(TableError::InvalidSetId {
                            name: name.to_owned(),
                            row: i as u32,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn first_unsorted<T: PartialOrd>(values: &[T]) -> Option<usize> {
    values.windows(2).position(|w| w[0] > w[1]).map(|p| p + 1)
}

/// A finalized, immutable set of columns ready for querying.
#[derive(Debug)]
pub struct Table {
    pool: StringPool,
    columns: Vec<(String, ColumnData)>,
    row_count: u32,
}

impl Table {
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    pub fn string_pool(&self) -> &StringPool {
        &self.pool
    }

    /// Borrows per-query storage views over every column.
    pub fn query(&self) -> TableQuery<'_> {
        let mut storages: Vec<Box<dyn Storage + '_>> = Vec::with_capacity(self.columns.len());
        for (_, data) in &self.columns {
            let storage: Box<dyn Storage + '_> = match data {
                ColumnData::Id => Box::new(IdStorage::new(self.row_count)),
                ColumnData::Int { values, sorted } => Box::new(if *sorted {
                    NumericStorage::new_sorted(values)
                } else {
                    NumericStorage::new(values)
                }),
                ColumnData::NullableInt { values, presence, sorted } => {
                    let inner: Box<dyn Storage + '_> = Box::new(if *sorted {
                        NumericStorage::new_sorted(values)
                    } else {
                        NumericStorage::new(values)
                    });
                    Box::new(NullStorage::new(inner, presence))
                }
                ColumnData::Double { values, sorted } => Box::new(if *sorted {
                    NumericStorage::new_sorted(values)
                } else {
                    NumericStorage::new(values)
                }),
                ColumnData::String { ids, sorted } => Box::new(if *sorted {
                    StringStorage::new_sorted(&self.pool, ids)
                } else {
                    StringStorage::new(&self.pool, ids)
                }),
                ColumnData::SetId { values } => Box::new(SetIdStorage::new(values)),
            };
            storages.push(storage);
        }
        TableQuery { storages, row_count: self.row_count }
    }

    /// One-shot convenience over [`Table::query`].
    pub fn filter(&self, constraints: &[Constraint]) -> RowMap {
        self.query().filter(constraints)
    }
}

/// The borrowed query-time view of a table.
pub struct TableQuery<'t> {
    storages: Vec<Box<dyn Storage + 't>>,
    row_count: u32,
}

impl TableQuery<'_> {
    pub fn filter(&self, constraints: &[Constraint]) -> RowMap {
        let columns: Vec<Column<'_>> =
            self.storages.iter().map(|s| Column::new(s.as_ref())).collect();
        QueryExecutor::new(columns, self.row_count).filter(constraints)
    }

    pub fn storage(&self, column: usize) -> &dyn Storage {
        self.storages[column].as_ref()
    }
}
