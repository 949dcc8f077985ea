//! Missing value imputation
//!
//! Statistics are computed from the table being processed, both at
//! training and at prediction time.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::HashMap;

/// How a column is treated by the preprocessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Integer, float or boolean; imputed with the mean
    Numeric,
    /// Text; imputed with the mode, then label encoded
    Categorical,
}

impl ColumnKind {
    /// Classify a dtype, failing for anything that is neither numeric nor text.
    pub fn of(name: &str, dtype: &DataType) -> Result<Self> {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Boolean => Ok(ColumnKind::Numeric),
            DataType::String => Ok(ColumnKind::Categorical),
            // A fully empty CSV column is inferred as Null; treat it as text so
            // that the all-missing check reports it by name.
            DataType::Null => Ok(ColumnKind::Categorical),
            other => Err(PipelineError::DataError(format!(
                "column '{}' has unsupported type {}",
                name, other
            ))),
        }
    }
}

/// Cast a numeric series to f64 and fill nulls with the mean of the present values.
pub fn impute_mean(series: &Series) -> Result<Series> {
    let name = series.name().clone();
    let casted = series
        .cast(&DataType::Float64)
        .map_err(|e| PipelineError::DataError(e.to_string()))?;
    let ca = casted
        .f64()
        .map_err(|e| PipelineError::DataError(e.to_string()))?;

    if ca.null_count() == 0 {
        return Ok(casted.with_name(name));
    }

    let mean = ca.mean().ok_or_else(|| {
        PipelineError::DataError(format!(
            "column '{}' has no values to impute from",
            name
        ))
    })?;

    let filled: Float64Chunked = ca
        .into_iter()
        .map(|v| Some(v.unwrap_or(mean)))
        .collect();

    Ok(filled.with_name(name).into_series())
}

/// Fill nulls of a text series with its most frequent value.
///
/// Ties go to the value seen first.
pub fn impute_mode(series: &Series) -> Result<Series> {
    let name = series.name().clone();

    if series.dtype() == &DataType::Null {
        if series.is_empty() {
            return series
                .cast(&DataType::String)
                .map_err(|e| PipelineError::DataError(e.to_string()));
        }
        return Err(PipelineError::DataError(format!(
            "column '{}' has no values to impute from",
            name
        )));
    }

    let ca = series
        .str()
        .map_err(|e| PipelineError::DataError(e.to_string()))?;

    if ca.null_count() == 0 {
        return Ok(series.clone());
    }

    let mode = most_frequent(ca.into_iter().flatten()).ok_or_else(|| {
        PipelineError::DataError(format!(
            "column '{}' has no values to impute from",
            name
        ))
    })?;

    let filled: StringChunked = ca
        .into_iter()
        .map(|v| Some(v.unwrap_or(mode.as_str())))
        .collect();

    Ok(filled.with_name(name).into_series())
}

fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    // value -> (count, first position)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, value) in values.enumerate() {
        counts.entry(value).or_insert((0, pos)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (ca, pa)), (_, (cb, pb))| ca.cmp(cb).then(pb.cmp(pa)))
        .map(|(value, _)| value.to_string())
}
