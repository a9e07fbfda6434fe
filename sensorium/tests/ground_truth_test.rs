mod common;

use common::{NEURONS, TIERS, UNIT_IDS, dataset_dir, image_id, responses, trial_idx};
use sensorium::{
    Array,
    data::{FileTreeDataset, npy},
    evaluation::{
        EvaluationError, EvaluationTable, GroundTruthConfig, MetadataError, ValueColumn,
        generate_ground_truth_file, generate_ground_truth_file_from_dataset,
    },
};

#[test]
fn test_ground_truth_keeps_test_trials() {
    let (directory, root) = dataset_dir(&TIERS);
    let config = GroundTruthConfig {
        path: directory.path().join("ground_truth.csv"),
        ..GroundTruthConfig::default()
    };
    let summary = generate_ground_truth_file(&root, &config).unwrap();
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.neurons, NEURONS);

    let table = EvaluationTable::read(&config.path).unwrap();
    assert_eq!(table.value_column(), ValueColumn::Responses);

    // trials 2, 4 and 5 of the five, counting from one
    let expected = [1, 3, 4];
    for (row, &trial) in table.rows().iter().zip(&expected) {
        assert_eq!(row.trial_index, trial_idx(trial));
        assert_eq!(row.image_id, image_id(trial));
        let stored: Vec<f64> = responses(trial).into_iter().map(f64::from).collect();
        assert_eq!(row.values, stored);
        assert_eq!(row.neuron_ids, UNIT_IDS.to_vec());
    }
}

#[test]
fn test_ground_truth_from_dataset() {
    let (directory, root) = dataset_dir(&TIERS);
    let dataset = FileTreeDataset::open(&root, &FileTreeDataset::DEFAULT_DATA_KEYS).unwrap();
    let path = directory.path().join("ground_truth.csv");
    generate_ground_truth_file_from_dataset(&dataset, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "trial_indices,image_ids,responses,neuron_ids");
    assert_eq!(
        lines[3],
        format!("{},{},\"[40.0, 41.0, 42.0]\",\"[7, 8, 9]\"", trial_idx(4), image_id(4))
    );
}

#[test]
fn test_ground_truth_needs_tiers() {
    let (directory, root) = dataset_dir(&TIERS);
    std::fs::remove_file(root.join("meta/trials/tiers.npy")).unwrap();
    let dataset = FileTreeDataset::open(&root, &FileTreeDataset::DEFAULT_DATA_KEYS).unwrap();
    let result = generate_ground_truth_file_from_dataset(&dataset, &directory.path().join("out.csv"));
    assert!(matches!(
        result,
        Err(EvaluationError::Metadata(MetadataError::MissingAttribute("tiers")))
    ));
}

#[test]
fn test_single_neuron_ground_truth() {
    let tiers = ["train", "test", "test"];
    let (directory, root) = dataset_dir(&tiers);
    for trial in 0..tiers.len() {
        let value = Array::from_vec(&[1], vec![trial as f32 + 0.5], "responses").unwrap();
        npy::write_array(&root.join(format!("data/responses/{trial}.npy")), &value).unwrap();
    }
    npy::write_array(
        &root.join("meta/neurons/unit_ids.npy"),
        &Array::from_vec(&[1], vec![42i64], "unit_ids").unwrap(),
    )
    .unwrap();

    let dataset = FileTreeDataset::open(&root, &FileTreeDataset::DEFAULT_DATA_KEYS).unwrap();
    let path = directory.path().join("ground_truth.csv");
    let summary = generate_ground_truth_file_from_dataset(&dataset, &path).unwrap();
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.neurons, 1);

    let table = EvaluationTable::read(&path).unwrap();
    let values: Vec<Vec<f64>> = table.rows().iter().map(|row| row.values.clone()).collect();
    assert_eq!(values, vec![vec![1.5], vec![2.5]]);
    assert!(table.rows().iter().all(|row| row.neuron_ids == vec![42]));
}
