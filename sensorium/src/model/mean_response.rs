use std::collections::BTreeMap;

use ndarray::{ArrayD, ArrayView1, Axis};

use super::{Model, ModelError};
use crate::{
    Array,
    data::{BatchContext, DataLoader},
    device::{Device, DeviceError, DevicePlacement},
};

const RESPONSES_FIELD: &str = "responses";

/// Null model: predicts the mean training response of every neuron,
/// independent of the stimulus.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeanResponseModel {
    means: BTreeMap<String, Vec<f32>>,
    device: Device,
}

impl MeanResponseModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_means(means: BTreeMap<String, Vec<f32>>) -> Self {
        Self {
            means,
            device: Device::Cpu,
        }
    }

    /// Fits one mean per data key.
    pub fn fit(loaders: &BTreeMap<String, DataLoader>) -> Result<Self, ModelError> {
        let mut model = Self::new();
        for (data_key, loader) in loaders {
            model.fit_loader(data_key, loader)?;
        }
        Ok(model)
    }

    /// Averages the `responses` field of every batch of `loader`.
    pub fn fit_loader(
        &mut self,
        data_key: &str,
        loader: &DataLoader,
    ) -> Result<(), ModelError> {
        let mut sums: Option<ArrayD<f64>> = None;
        let mut trials = 0usize;
        for batch in loader {
            let batch = batch?;
            let responses = batch
                .get(RESPONSES_FIELD)
                .ok_or_else(|| ModelError::MissingField(RESPONSES_FIELD.to_string()))?;
            let rows = responses.len();
            if rows == 0 {
                continue;
            }
            let neurons = responses.num_elements() / rows;
            let responses = responses.cast::<f64>()?.reshape(&[rows, neurons])?;
            let batch_sums = responses.as_view::<f64>()?.sum_axis(Axis(0));
            match sums.as_mut() {
                None => sums = Some(batch_sums),
                Some(sums) if sums.len() == neurons => *sums += &batch_sums,
                Some(sums) => {
                    return Err(ModelError::Forward(format!(
                        "responses of \"{data_key}\" changed from {} to {neurons} neurons",
                        sums.len()
                    )));
                },
            }
            trials += rows;
        }
        let Some(sums) = sums else {
            return Err(ModelError::NoTrainingData(data_key.to_string()));
        };
        let means = sums.iter().map(|sum| (sum / trials as f64) as f32).collect();
        log::debug!("Fitted mean responses of \"{data_key}\" over {trials} trials");
        self.means.insert(data_key.to_string(), means);
        Ok(())
    }

    pub fn data_keys(&self) -> impl Iterator<Item = &str> {
        self.means.keys().map(String::as_str)
    }

    pub fn mean(
        &self,
        data_key: &str,
    ) -> Option<&[f32]> {
        self.means.get(data_key).map(Vec::as_slice)
    }

    fn select(
        &self,
        data_key: Option<&str>,
    ) -> Result<&[f32], ModelError> {
        match data_key {
            Some(key) => self.mean(key).ok_or_else(|| ModelError::UnknownDataKey(key.to_string())),
            None => {
                let mut means = self.means.values();
                match (means.next(), means.next()) {
                    (Some(mean), None) => Ok(mean.as_slice()),
                    _ => Err(ModelError::DataKeyRequired(self.means.keys().cloned().collect())),
                }
            },
        }
    }
}

impl DevicePlacement for MeanResponseModel {
    fn device(&self) -> Device {
        self.device
    }

    fn to_device(
        &mut self,
        device: Device,
    ) -> Result<(), DeviceError> {
        self.device = device;
        Ok(())
    }
}

impl Model for MeanResponseModel {
    fn forward(
        &self,
        inputs: &Array,
        data_key: Option<&str>,
        _context: &BatchContext<'_>,
    ) -> Result<Array, ModelError> {
        let mean = self.select(data_key)?;
        let trials = inputs.len();
        let mean = ArrayView1::from(mean);
        let tiled = mean
            .broadcast((trials, mean.len()))
            .ok_or_else(|| ModelError::Forward(format!("cannot tile {} means", mean.len())))?;
        Ok(Array::from_view(tiled, "prediction").to_device(self.device))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{
        DataType,
        data::{Dataset, HubDataset},
    };

    fn model() -> MeanResponseModel {
        MeanResponseModel::from_means(BTreeMap::from([
            (String::from("a"), vec![1.0, 2.0]),
            (String::from("b"), vec![3.0]),
        ]))
    }

    #[test]
    fn test_forward_tiles_mean() {
        let inputs = Array::zeros(&[3, 1, 2, 2], DataType::F32, "images");
        let output = model().forward(&inputs, Some("a"), &BatchContext::default()).unwrap();
        assert_eq!(output.shape(), &[3, 2]);
        assert_eq!(output.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_data_key_selection() {
        let inputs = Array::zeros(&[1, 4], DataType::F32, "images");
        let context = BatchContext::default();
        assert!(matches!(
            model().forward(&inputs, None, &context),
            Err(ModelError::DataKeyRequired(keys)) if keys == vec!["a", "b"]
        ));
        assert!(matches!(
            model().forward(&inputs, Some("c"), &context),
            Err(ModelError::UnknownDataKey(_))
        ));

        let single = MeanResponseModel::from_means(BTreeMap::from([(String::from("a"), vec![5.0])]));
        assert_eq!(single.forward(&inputs, None, &context).unwrap().shape(), &[1, 1]);
    }

    #[test]
    fn test_fit_loader_without_responses() {
        let hub = HubDataset::new(
            Array::zeros(&[2, 4], DataType::F32, "images"),
            Array::zeros(&[2], DataType::I64, "image_ids"),
            Array::zeros(&[2], DataType::I64, "trial_indices"),
            serde_json::Map::new(),
        );
        let dataset: Rc<dyn Dataset> = Rc::new(hub);
        let loader = DataLoader::new(dataset, 2);
        let mut model = MeanResponseModel::new();
        assert!(matches!(
            model.fit_loader("a", &loader),
            Err(ModelError::MissingField(_))
        ));
    }

    #[test]
    fn test_device_is_a_tag() {
        let mut model = model();
        model.to_device(Device::Cuda(1)).unwrap();
        let inputs = Array::zeros(&[1, 4], DataType::F32, "images");
        let output = model.forward(&inputs, Some("b"), &BatchContext::default()).unwrap();
        assert_eq!(output.device(), Device::Cuda(1));
    }
}
