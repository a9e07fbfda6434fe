use std::rc::Rc;

use super::{
    batch::Batch,
    dataset::{Dataset, DatasetError},
};

/// Sequential loader: collates samples selected by an index list into batches,
/// in index order. The last batch may be shorter than `batch_size`.
#[derive(Clone)]
pub struct DataLoader {
    dataset: Rc<dyn Dataset>,
    indices: Vec<usize>,
    batch_size: usize,
}

impl DataLoader {
    /// Loader over every trial of `dataset`.
    pub fn new(
        dataset: Rc<dyn Dataset>,
        batch_size: usize,
    ) -> Self {
        let indices = (0..dataset.len()).collect();
        Self::with_indices(dataset, indices, batch_size)
    }

    pub fn with_indices(
        dataset: Rc<dyn Dataset>,
        indices: Vec<usize>,
        batch_size: usize,
    ) -> Self {
        Self {
            dataset,
            indices,
            batch_size: batch_size.max(1),
        }
    }

    pub fn dataset(&self) -> &Rc<dyn Dataset> {
        &self.dataset
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> Batches<'_> {
        Batches {
            loader: self,
            chunks: self.indices.chunks(self.batch_size),
        }
    }
}

impl std::fmt::Debug for DataLoader {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("dataset", &self.dataset.kind())
            .field("samples", &self.indices.len())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl<'a> IntoIterator for &'a DataLoader {
    type Item = Result<Batch, DatasetError>;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Batches<'a> {
    loader: &'a DataLoader,
    chunks: std::slice::Chunks<'a, usize>,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        let dataset = &self.loader.dataset;
        let batch = chunk
            .iter()
            .map(|&index| dataset.sample(index))
            .collect::<Result<Vec<_>, _>>()
            .and_then(|samples| dataset.collate(samples));
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Array,
        data::{batch::Sample, dataset::DatasetKind},
        evaluation::metadata::{EvaluationMetadata, MetadataError},
    };

    struct Counting {
        len: usize,
    }

    impl Dataset for Counting {
        fn kind(&self) -> DatasetKind {
            DatasetKind::FileTree
        }

        fn len(&self) -> usize {
            self.len
        }

        fn sample(
            &self,
            index: usize,
        ) -> Result<Sample, DatasetError> {
            let value = Array::from_vec(&[1], vec![index as f32], "images")?;
            Ok(Sample::new(vec![(String::from("images"), value)]))
        }

        fn evaluation_metadata(&self) -> Result<EvaluationMetadata, MetadataError> {
            Err(MetadataError::MissingAttribute("tiers"))
        }
    }

    #[test]
    fn test_batches_follow_index_order() {
        let dataset: Rc<dyn Dataset> = Rc::new(Counting {
            len: 10,
        });
        let loader = DataLoader::with_indices(dataset, vec![7, 1, 3, 4, 9], 2);
        assert_eq!(loader.len(), 3);
        assert_eq!(loader.num_samples(), 5);

        let batches: Vec<Vec<f32>> = loader
            .iter()
            .map(|batch| batch.unwrap().inputs().unwrap().to_vec::<f32>().unwrap())
            .collect();
        assert_eq!(batches, vec![vec![7.0, 1.0], vec![3.0, 4.0], vec![9.0]]);

        // restartable
        assert_eq!(loader.iter().count(), 3);
    }

    #[test]
    fn test_empty_loader_and_batch_size_floor() {
        let dataset: Rc<dyn Dataset> = Rc::new(Counting {
            len: 0,
        });
        let loader = DataLoader::new(dataset, 0);
        assert_eq!(loader.batch_size(), 1);
        assert!(loader.is_empty());
        assert_eq!(loader.iter().count(), 0);
    }
}
