use thiserror::Error;

use super::model::{CategoryDomain, Dataset, RawTable, RawValue, TypedColumn};

#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("integer column '{0}' not found")]
    MissingIntegerColumn(String),
    #[error("column '{column}', row {row}: cannot cast '{value}' to an integer")]
    IntegerCast {
        column: String,
        row: usize,
        value: String,
    },
}

/// Convert a loaded table into typed columns.
///
/// Every column except `integer_column` becomes an ordered categorical
/// column over the sorted set of its distinct stringified values. The
/// integer column is cast strictly; a cell that is not a whole number
/// (null included) fails the whole load.
pub fn normalize(raw: &RawTable, integer_column: &str) -> Result<Dataset, NormalizeError> {
    let year_idx = raw
        .column_index(integer_column)
        .ok_or_else(|| NormalizeError::MissingIntegerColumn(integer_column.to_string()))?;

    let columns = raw
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if idx == year_idx {
                cast_integer(raw, idx, name)
            } else {
                Ok(categorize(raw, idx))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "Normalized {} rows x {} columns (integer column '{integer_column}')",
        raw.len(),
        columns.len()
    );
    Ok(Dataset::new(raw.columns.clone(), columns, raw.len()))
}

fn cast_integer(raw: &RawTable, idx: usize, name: &str) -> Result<TypedColumn, NormalizeError> {
    raw.column_values(idx)
        .enumerate()
        .map(|(row, value)| {
            value.as_i64().ok_or_else(|| NormalizeError::IntegerCast {
                column: name.to_string(),
                row,
                value: value.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(TypedColumn::Integer)
}

fn categorize(raw: &RawTable, idx: usize) -> TypedColumn {
    let labels: Vec<Option<String>> = raw
        .column_values(idx)
        .map(|v: &RawValue| (!v.is_null()).then(|| v.to_string()))
        .collect();

    let domain = CategoryDomain::from_labels(labels.iter().flatten().cloned());
    let codes = labels
        .iter()
        .map(|label| label.as_deref().and_then(|l| domain.code_of(l)))
        .collect();

    TypedColumn::Categorical { domain, codes }
}
