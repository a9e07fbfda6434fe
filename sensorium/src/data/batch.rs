use std::collections::BTreeMap;

use thiserror::Error;

use crate::{Array, device::Device};

/// Field holding the model input in mapping batches.
pub const INPUTS_FIELD: &str = "inputs";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("Batch has no \"inputs\" field")]
    MissingInputs,
    #[error("Batch has no fields")]
    Empty,
}

/// One trial's named fields, without a batch axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    fields: Vec<(String, Array)>,
}

impl Sample {
    pub fn new(fields: Vec<(String, Array)>) -> Self {
        Self {
            fields,
        }
    }

    pub fn field(
        &self,
        name: &str,
    ) -> Option<&Array> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, array)| array)
    }

    pub fn fields(&self) -> &[(String, Array)] {
        &self.fields
    }
}

/// A collated group of samples.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    /// Fields keyed by name, the model input is stored under [`INPUTS_FIELD`].
    Mapping(BTreeMap<String, Array>),
    /// Ordered named fields, the model input is the first one.
    Record(Vec<(String, Array)>),
}

impl Batch {
    /// The primary input array fed to the model.
    pub fn inputs(&self) -> Result<&Array, BatchError> {
        match self {
            Batch::Mapping(fields) => {
                fields.get(INPUTS_FIELD).ok_or(BatchError::MissingInputs)
            },
            Batch::Record(fields) => {
                fields.first().map(|(_, array)| array).ok_or(BatchError::Empty)
            },
        }
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Array> {
        match self {
            Batch::Mapping(fields) => fields.get(name),
            Batch::Record(fields) => fields
                .iter()
                .find(|(field_name, _)| field_name == name)
                .map(|(_, array)| array),
        }
    }

    pub fn fields(&self) -> Vec<(&str, &Array)> {
        match self {
            Batch::Mapping(fields) => fields
                .iter()
                .map(|(name, array)| (name.as_str(), array))
                .collect(),
            Batch::Record(fields) => fields
                .iter()
                .map(|(name, array)| (name.as_str(), array))
                .collect(),
        }
    }

    /// Number of trials in the batch, taken from the input array.
    pub fn len(&self) -> usize {
        self.inputs().map(Array::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the batch with every field placed on `device`.
    pub fn to_device(
        &self,
        device: Device,
    ) -> Batch {
        match self {
            Batch::Mapping(fields) => Batch::Mapping(
                fields
                    .iter()
                    .map(|(name, array)| (name.clone(), array.to_device(device)))
                    .collect(),
            ),
            Batch::Record(fields) => Batch::Record(
                fields
                    .iter()
                    .map(|(name, array)| (name.clone(), array.to_device(device)))
                    .collect(),
            ),
        }
    }

    /// Every field except the model input.
    pub fn context(&self) -> BatchContext<'_> {
        let fields = match self {
            Batch::Mapping(fields) => fields
                .iter()
                .filter(|(name, _)| name.as_str() != INPUTS_FIELD)
                .map(|(name, array)| (name.as_str(), array))
                .collect(),
            Batch::Record(fields) => fields
                .iter()
                .skip(1)
                .map(|(name, array)| (name.as_str(), array))
                .collect(),
        };
        BatchContext {
            fields,
        }
    }
}

/// Named side inputs passed to the model alongside the primary input.
#[derive(Debug, Clone, Default)]
pub struct BatchContext<'a> {
    fields: Vec<(&'a str, &'a Array)>,
}

impl<'a> BatchContext<'a> {
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&'a Array> {
        self.fields
            .iter()
            .find(|(field_name, _)| *field_name == name)
            .map(|(_, array)| *array)
    }

    pub fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Array)> + '_ {
        self.fields.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataType;

    fn field(
        name: &str,
        rows: usize,
    ) -> (String, Array) {
        (name.to_string(), Array::zeros(&[rows, 2], DataType::F32, name))
    }

    #[test]
    fn test_mapping_inputs() {
        let batch = Batch::Mapping(BTreeMap::from([
            field("behavior", 4),
            field(INPUTS_FIELD, 4),
        ]));
        assert_eq!(batch.inputs().unwrap().label(), INPUTS_FIELD);
        assert_eq!(batch.len(), 4);
        let context = batch.context();
        assert_eq!(context.names().collect::<Vec<_>>(), vec!["behavior"]);

        let missing = Batch::Mapping(BTreeMap::from([field("images", 4)]));
        assert_eq!(missing.inputs(), Err(BatchError::MissingInputs));
        assert_eq!(missing.len(), 0);
    }

    #[test]
    fn test_record_inputs_are_first_field() {
        let batch = Batch::Record(vec![
            field("images", 3),
            field("responses", 3),
            field("behavior", 3),
        ]);
        assert_eq!(batch.inputs().unwrap().label(), "images");
        assert_eq!(
            batch.context().names().collect::<Vec<_>>(),
            vec!["responses", "behavior"]
        );
        assert!(batch.get("responses").is_some());
        assert_eq!(Batch::Record(Vec::new()).inputs(), Err(BatchError::Empty));
    }

    #[test]
    fn test_to_device_moves_every_field() {
        let batch = Batch::Record(vec![field("images", 1), field("responses", 1)]);
        let moved = batch.to_device(Device::Cuda(0));
        assert!(moved
            .fields()
            .iter()
            .all(|(_, array)| array.device() == Device::Cuda(0)));
    }
}
