use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;

use super::metadata::EvaluationMetadata;
use crate::{Array, array::ArrayError};

pub const TRIAL_INDICES_COLUMN: &str = "trial_indices";
pub const IMAGE_IDS_COLUMN: &str = "image_ids";
pub const NEURON_IDS_COLUMN: &str = "neuron_ids";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to write \"{path}\"")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Failed to read \"{path}\"")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Got {values} value rows for {rows} trials")]
    RowCountMismatch {
        rows: usize,
        values: usize,
    },
    #[error("Row {row} has {actual} values, expected one per neuron ({expected})")]
    WidthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Got {image_ids} image ids for {trial_indices} trial indices")]
    MetadataLengthMismatch {
        trial_indices: usize,
        image_ids: usize,
    },
    #[error("Unexpected header {0:?}")]
    UnexpectedHeader(Vec<String>),
    #[error("Invalid cell \"{value}\" in row {row}, column \"{column}\"")]
    InvalidCell {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error(transparent)]
    Array(#[from] ArrayError),
}

/// Name of the per-neuron value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueColumn {
    Prediction,
    Responses,
}

impl ValueColumn {
    pub fn name(&self) -> &'static str {
        match self {
            ValueColumn::Prediction => "prediction",
            ValueColumn::Responses => "responses",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        [ValueColumn::Prediction, ValueColumn::Responses]
            .into_iter()
            .find(|column| column.name() == name)
    }
}

impl Display for ValueColumn {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRow {
    pub trial_index: i64,
    pub image_id: i64,
    pub values: Vec<f64>,
    pub neuron_ids: Vec<i64>,
}

/// Per-trial values keyed by trial index, image id and neuron ids.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationTable {
    value_column: ValueColumn,
    rows: Vec<EvaluationRow>,
}

impl EvaluationTable {
    /// Zips `metadata` with the rows of `values`. Every trial gets the full
    /// neuron id list and exactly one value per neuron.
    pub fn assemble(
        value_column: ValueColumn,
        metadata: &EvaluationMetadata,
        values: &Array,
    ) -> Result<Self, TableError> {
        let EvaluationMetadata {
            trial_indices,
            image_ids,
            neuron_ids,
        } = metadata;
        if image_ids.len() != trial_indices.len() {
            return Err(TableError::MetadataLengthMismatch {
                trial_indices: trial_indices.len(),
                image_ids: image_ids.len(),
            });
        }
        let values = values.to_rows::<f64>()?;
        if values.len() != trial_indices.len() {
            return Err(TableError::RowCountMismatch {
                rows: trial_indices.len(),
                values: values.len(),
            });
        }

        let rows = trial_indices
            .iter()
            .zip(image_ids)
            .zip(values)
            .enumerate()
            .map(|(row, ((&trial_index, &image_id), values))| {
                if values.len() != neuron_ids.len() {
                    return Err(TableError::WidthMismatch {
                        row,
                        expected: neuron_ids.len(),
                        actual: values.len(),
                    });
                }
                Ok(EvaluationRow {
                    trial_index,
                    image_id,
                    values,
                    neuron_ids: neuron_ids.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            value_column,
            rows,
        })
    }

    pub fn value_column(&self) -> ValueColumn {
        self.value_column
    }

    pub fn rows(&self) -> &[EvaluationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of neurons, zero for an empty table.
    pub fn neurons(&self) -> usize {
        self.rows.first().map(|row| row.neuron_ids.len()).unwrap_or(0)
    }

    pub fn header(&self) -> [&'static str; 4] {
        [
            TRIAL_INDICES_COLUMN,
            IMAGE_IDS_COLUMN,
            self.value_column.name(),
            NEURON_IDS_COLUMN,
        ]
    }

    /// Writes the table as CSV with a header row, replacing any existing file.
    pub fn write(
        &self,
        path: &Path,
    ) -> Result<(), TableError> {
        let to_error = |source| TableError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(to_error)?;
        writer.write_record(self.header()).map_err(to_error)?;
        for row in &self.rows {
            writer
                .write_record([
                    row.trial_index.to_string(),
                    row.image_id.to_string(),
                    format_list(&row.values),
                    format_list(&row.neuron_ids),
                ])
                .map_err(to_error)?;
        }
        writer.flush().map_err(|source| to_error(source.into()))?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, TableError> {
        let to_error = |source| TableError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(to_error)?;
        let header: Vec<String> = reader.headers().map_err(to_error)?.iter().map(String::from).collect();
        let value_column = match header.as_slice() {
            [trial_indices, image_ids, value_column, neuron_ids]
                if trial_indices == TRIAL_INDICES_COLUMN
                    && image_ids == IMAGE_IDS_COLUMN
                    && neuron_ids == NEURON_IDS_COLUMN =>
            {
                ValueColumn::from_name(value_column)
            },
            _ => None,
        }
        .ok_or_else(|| TableError::UnexpectedHeader(header.clone()))?;

        let mut rows = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(to_error)?;
            let cell = |index: usize, column: &'static str| {
                record.get(index).ok_or_else(|| TableError::InvalidCell {
                    row,
                    column,
                    value: String::new(),
                })
            };
            let invalid = |column: &'static str, value: &str| TableError::InvalidCell {
                row,
                column,
                value: value.to_string(),
            };

            let trial_index = cell(0, TRIAL_INDICES_COLUMN)?;
            let image_id = cell(1, IMAGE_IDS_COLUMN)?;
            let values = cell(2, value_column.name())?;
            let neuron_ids = cell(3, NEURON_IDS_COLUMN)?;
            rows.push(EvaluationRow {
                trial_index: trial_index.parse().map_err(|_| invalid(TRIAL_INDICES_COLUMN, trial_index))?,
                image_id: image_id.parse().map_err(|_| invalid(IMAGE_IDS_COLUMN, image_id))?,
                values: parse_list(values).ok_or_else(|| invalid(value_column.name(), values))?,
                neuron_ids: parse_list(neuron_ids).ok_or_else(|| invalid(NEURON_IDS_COLUMN, neuron_ids))?,
            });
        }

        Ok(Self {
            value_column,
            rows,
        })
    }
}

/// Element of a list cell.
pub trait ListItem: FromStr {
    fn format_item(&self) -> String;
}

impl ListItem for i64 {
    fn format_item(&self) -> String {
        self.to_string()
    }
}

/// Finite values keep a decimal point (`2.0`), non-finite ones are written
/// as `nan`, `inf` and `-inf`.
impl ListItem for f64 {
    fn format_item(&self) -> String {
        if self.is_nan() {
            String::from("nan")
        } else if self.is_infinite() {
            String::from(if *self > 0.0 { "inf" } else { "-inf" })
        } else {
            format!("{self:?}")
        }
    }
}

/// Textual list literal, `[1.5, 2.0]`.
pub fn format_list<T: ListItem>(values: &[T]) -> String {
    let items: Vec<String> = values.iter().map(ListItem::format_item).collect();
    format!("[{}]", items.join(", "))
}

/// Inverse of [`format_list`].
pub fn parse_list<T: ListItem>(text: &str) -> Option<Vec<T>> {
    let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    inner.split(',').map(|item| item.trim().parse().ok()).collect()
}
