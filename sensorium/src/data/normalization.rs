use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use super::{dataset::DatasetError, npy};
use crate::{Array, array::ArrayError};

/// Statistics of a field, stored under `meta/statistics/<field>/<source>/`.
const STATISTICS_SOURCE: &str = "all";
/// Responses whose std falls below this fraction of the mean std are scaled by
/// the inverse of the threshold instead of their own std.
const RESPONSE_PRECISION_THRESHOLD: f32 = 0.01;

#[derive(Debug, Clone, PartialEq)]
enum FieldTransform {
    /// `(x - mean) / std`
    Standardize {
        mean: Vec<f32>,
        std: Vec<f32>,
    },
    /// `x * factor`
    Scale {
        factor: Vec<f32>,
    },
}

/// Per-field normalization of file-tree samples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Normalizer {
    transforms: BTreeMap<String, FieldTransform>,
}

impl Normalizer {
    pub fn from_statistics(
        root: &Path,
        fields: &[String],
    ) -> Result<Self, DatasetError> {
        let mut transforms = BTreeMap::new();
        for field in fields {
            let transform = match field.as_str() {
                "images" | "pupil_center" => FieldTransform::Standardize {
                    mean: read_statistic(root, field, "mean")?,
                    std: read_statistic(root, field, "std")?,
                },
                "behavior" => FieldTransform::Scale {
                    factor: read_statistic(root, field, "std")?
                        .into_iter()
                        .map(|std| 1.0 / std)
                        .collect(),
                },
                "responses" => FieldTransform::Scale {
                    factor: response_precision(&read_statistic(root, field, "std")?),
                },
                _ => continue,
            };
            transforms.insert(field.clone(), transform);
        }
        Ok(Self {
            transforms,
        })
    }

    /// Normalized copy of `array`. Fields without statistics are returned unchanged.
    pub fn apply(
        &self,
        field: &str,
        array: Array,
    ) -> Result<Array, DatasetError> {
        let Some(transform) = self.transforms.get(field) else {
            return Ok(array);
        };
        let mut values = array.to_vec::<f32>()?;
        match transform {
            FieldTransform::Standardize {
                mean,
                std,
            } => {
                let mean = broadcast(mean, &array)?;
                let std = broadcast(std, &array)?;
                for (index, value) in values.iter_mut().enumerate() {
                    *value = (*value - mean(index)) / std(index);
                }
            },
            FieldTransform::Scale {
                factor,
            } => {
                let factor = broadcast(factor, &array)?;
                for (index, value) in values.iter_mut().enumerate() {
                    *value *= factor(index);
                }
            },
        }
        let mut result = Array::from_vec(array.shape(), values, array.label())?;
        result = result.to_device(array.device());
        Ok(result)
    }
}

fn statistics_path(
    root: &Path,
    field: &str,
    name: &str,
) -> PathBuf {
    root.join("meta")
        .join("statistics")
        .join(field)
        .join(STATISTICS_SOURCE)
        .join(format!("{name}.npy"))
}

fn read_statistic(
    root: &Path,
    field: &str,
    name: &str,
) -> Result<Vec<f32>, DatasetError> {
    let path = statistics_path(root, field, name);
    if !path.exists() {
        return Err(DatasetError::MissingStatistics {
            field: field.to_string(),
            path,
        });
    }
    let array = npy::read_array(&path).map_err(|source| DatasetError::Npy {
        path: path.clone(),
        source,
    })?;
    Ok(array.to_vec::<f32>()?)
}

fn response_precision(std: &[f32]) -> Vec<f32> {
    if std.is_empty() {
        return Vec::new();
    }
    let finite: Vec<f32> = std.iter().copied().filter(|value| !value.is_nan()).collect();
    let mean = finite.iter().sum::<f32>() / finite.len() as f32;
    let threshold = RESPONSE_PRECISION_THRESHOLD * mean;
    std.iter()
        .map(|&value| if value > threshold { 1.0 / value } else { 1.0 / threshold })
        .collect()
}

/// Maps a flat element index to the statistic applying to it. Statistics are
/// either a single value or one value per element of the trailing axis.
fn broadcast<'a>(
    statistic: &'a [f32],
    array: &Array,
) -> Result<impl Fn(usize) -> f32 + 'a, DatasetError> {
    let len = statistic.len();
    let trailing = array.shape().last().copied().unwrap_or(1);
    if len != 1 && len != trailing {
        return Err(ArrayError::ShapeMismatch {
            label: array.label().to_string(),
            expected: Box::new([len]),
            actual: array.shape().into(),
        }
        .into());
    }
    Ok(move |index: usize| statistic[index % len])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_statistic(
        root: &Path,
        field: &str,
        name: &str,
        values: Vec<f32>,
    ) {
        let path = statistics_path(root, field, name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let array = Array::from_vec(&[values.len()], values, name).unwrap();
        npy::write_array(&path, &array).unwrap();
    }

    #[test]
    fn test_response_precision_threshold() {
        let precision = response_precision(&[2.0, 4.0, 0.0001]);
        assert!(is_close!(precision[0], 0.5));
        assert!(is_close!(precision[1], 0.25));
        // threshold is 1% of the mean std, (2 + 4 + 0.0001) / 3
        assert!(is_close!(precision[2], 1.0 / (0.01 * 6.0001 / 3.0), rel_tol = 1e-5));
    }

    #[test]
    fn test_response_precision_ignores_nan() {
        let precision = response_precision(&[1.0, f32::NAN, 3.0, 0.0]);
        assert!(is_close!(precision[0], 1.0));
        assert!(precision[1].is_nan());
        assert!(is_close!(precision[2], 1.0 / 3.0));
        assert!(is_close!(precision[3], 50.0, rel_tol = 1e-5));
    }

    #[test]
    fn test_normalizer_applies_statistics() {
        let directory = tempfile::TempDir::new().unwrap();
        let root = directory.path();
        write_statistic(root, "images", "mean", vec![1.0]);
        write_statistic(root, "images", "std", vec![2.0]);
        write_statistic(root, "responses", "std", vec![2.0, 4.0]);

        let fields = vec![
            String::from("images"),
            String::from("responses"),
            String::from("unknown"),
        ];
        let normalizer = Normalizer::from_statistics(root, &fields).unwrap();

        let images = Array::from_vec(&[1, 2], vec![3.0f32, 5.0], "images").unwrap();
        let images = normalizer.apply("images", images).unwrap();
        assert_eq!(images.to_vec::<f32>().unwrap(), vec![1.0, 2.0]);

        let responses =
            Array::from_vec(&[2], vec![1.0f64, 1.0], "responses").unwrap();
        let responses = normalizer.apply("responses", responses).unwrap();
        assert_eq!(responses.to_vec::<f32>().unwrap(), vec![0.5, 0.25]);

        let other = Array::from_vec(&[1], vec![7u8], "unknown").unwrap();
        assert_eq!(normalizer.apply("unknown", other.clone()).unwrap(), other);
    }

    #[test]
    fn test_missing_statistics() {
        let directory = tempfile::TempDir::new().unwrap();
        let fields = vec![String::from("behavior")];
        assert!(matches!(
            Normalizer::from_statistics(directory.path(), &fields),
            Err(DatasetError::MissingStatistics { field, .. }) if field == "behavior"
        ));
    }
}
