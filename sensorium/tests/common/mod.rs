#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    fs,
    path::{Path, PathBuf},
};

use sensorium::{
    Array, DataType, Device,
    data::{BatchContext, npy},
    device::{DeviceError, DevicePlacement},
    model::{Model, ModelError},
};
use tempfile::TempDir;

pub const TIERS: [&str; 5] = ["train", "test", "train", "test", "test"];
pub const NEURONS: usize = 3;
pub const UNIT_IDS: [i64; NEURONS] = [7, 8, 9];
pub const DATASET_NAME: &str = "static26872-17-20-preproc0";
pub const DATA_KEY: &str = "26872-17-20-0";

fn write(
    path: &Path,
    array: &Array,
) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    npy::write_array(path, array).unwrap();
}

pub fn image_id(trial: usize) -> i64 {
    100 + trial as i64
}

pub fn trial_idx(trial: usize) -> i64 {
    1000 + 2 * trial as i64
}

/// Responses of a trial: `10 * trial + neuron`.
pub fn responses(trial: usize) -> Vec<f32> {
    (0..NEURONS).map(|neuron| (10 * trial + neuron) as f32).collect()
}

/// Writes a file-tree dataset with one trial per tier and unit statistics.
pub fn write_file_tree(
    root: &Path,
    tiers: &[&str],
) {
    for (trial, _) in tiers.iter().enumerate() {
        let image = Array::from_vec(&[1, 4, 4], vec![trial as f32; 16], "images").unwrap();
        write(&root.join(format!("data/images/{trial}.npy")), &image);
        let trial_responses = Array::from_vec(&[NEURONS], responses(trial), "responses").unwrap();
        write(&root.join(format!("data/responses/{trial}.npy")), &trial_responses);
    }

    let trials = root.join("meta/trials");
    fs::create_dir_all(&trials).unwrap();
    npy::write_strings(&trials.join("tiers.npy"), tiers).unwrap();
    let ids = |f: fn(usize) -> i64| (0..tiers.len()).map(f).collect::<Vec<i64>>();
    write(
        &trials.join("frame_image_id.npy"),
        &Array::from_vec(&[tiers.len()], ids(image_id), "frame_image_id").unwrap(),
    );
    write(
        &trials.join("trial_idx.npy"),
        &Array::from_vec(&[tiers.len()], ids(trial_idx), "trial_idx").unwrap(),
    );
    write(
        &root.join("meta/neurons/unit_ids.npy"),
        &Array::from_vec(&[NEURONS], UNIT_IDS.to_vec(), "unit_ids").unwrap(),
    );

    let statistics = root.join("meta/statistics");
    write(
        &statistics.join("images/all/mean.npy"),
        &Array::from_vec(&[1], vec![0.0f32], "mean").unwrap(),
    );
    write(
        &statistics.join("images/all/std.npy"),
        &Array::from_vec(&[1], vec![1.0f32], "std").unwrap(),
    );
    write(
        &statistics.join("responses/all/std.npy"),
        &Array::from_vec(&[NEURONS], vec![1.0f32; NEURONS], "std").unwrap(),
    );
}

/// A temporary directory holding the default dataset under [`DATASET_NAME`].
pub fn dataset_dir(tiers: &[&str]) -> (TempDir, PathBuf) {
    let directory = TempDir::new().unwrap();
    let root = directory.path().join(DATASET_NAME);
    write_file_tree(&root, tiers);
    (directory, root)
}

/// Model returning zeros, with a configurable output width per call and an
/// optional failing call.
pub struct StubModel {
    device: Device,
    widths: Vec<usize>,
    fail_at: Option<usize>,
    calls: Cell<usize>,
    pub input_devices: RefCell<Vec<Device>>,
    pub model_devices: RefCell<Vec<Device>>,
}

impl StubModel {
    pub fn zeros(neurons: usize) -> Self {
        Self {
            device: Device::Cpu,
            widths: vec![neurons],
            fail_at: None,
            calls: Cell::new(0),
            input_devices: RefCell::new(Vec::new()),
            model_devices: RefCell::new(Vec::new()),
        }
    }

    pub fn with_widths(widths: Vec<usize>) -> Self {
        Self {
            widths,
            ..Self::zeros(0)
        }
    }

    pub fn failing_at(
        neurons: usize,
        call: usize,
    ) -> Self {
        Self {
            fail_at: Some(call),
            ..Self::zeros(neurons)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl DevicePlacement for StubModel {
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

impl Model for StubModel {
    fn forward(
        &self,
        inputs: &Array,
        _data_key: Option<&str>,
        _context: &BatchContext<'_>,
    ) -> Result<Array, ModelError> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        self.input_devices.borrow_mut().push(inputs.device());
        self.model_devices.borrow_mut().push(self.device);
        if self.fail_at == Some(call) {
            return Err(ModelError::Forward(String::from("stub failure")));
        }
        let width = self.widths[call.min(self.widths.len() - 1)];
        Ok(Array::zeros(&[inputs.len(), width], DataType::F32, "prediction").to_device(self.device))
    }
}
