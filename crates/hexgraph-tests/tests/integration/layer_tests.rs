//! Loss and accuracy layers configured from fixture files.

use std::path::PathBuf;
use std::sync::Arc;

use hexgraph_core::layers::accuracy::rank_top_k;
use hexgraph_core::{
    infer, label_loss_and_gradient, Blob, EnumerationConfig, GraphSourceConfig,
    HexAccuracyConfig, HexAccuracyLayer, HexError, HexLossConfig, HexLossLayer, LossMode,
    PartitionStrategy,
};

fn assert_close(lhs: f64, rhs: f64, eps: f64) {
    assert!((lhs - rhs).abs() <= eps, "lhs={lhs} rhs={rhs} eps={eps}");
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

fn graph_source() -> GraphSourceConfig {
    GraphSourceConfig::new(fixture("animals.hex"), 8).with_label_names(fixture("animals.labels"))
}

fn batch() -> Blob {
    Blob::from_rows(&[
        vec![0.4, 1.1, -0.3, 0.8, -1.4, 0.2, 0.6, -0.9],
        vec![1.0, -1.0, 2.0, -0.5, 0.0, 1.5, -2.0, 0.0],
        vec![0.0, 0.5, 0.0, 0.0, 1.2, 0.0, 0.3, 0.0],
    ])
    .expect("scores")
}

#[test]
fn loss_layer_from_paths() {
    let config = HexLossConfig {
        graph: graph_source(),
        enumeration: EnumerationConfig::with_strategy(PartitionStrategy::JunctionTree),
        mode: LossMode::Joint,
    };
    let mut layer = HexLossLayer::configure(config).expect("layer");
    let mut scores = batch();
    let labels = Blob::from_labels(&[7.0, 5.0, 4.0]);
    let loss = layer.forward(&scores, &labels).expect("forward");

    let partition = Arc::clone(layer.partition());
    let expected: f64 = [(0, 7), (1, 5), (2, 4)]
        .iter()
        .map(|&(row, label)| {
            let row_scores = &scores.data()[row * 8..row * 8 + 8];
            label_loss_and_gradient(&partition, row_scores, label, LossMode::Joint)
                .expect("loss")
                .loss
        })
        .sum::<f64>()
        / 3.0;
    assert_close(loss, expected, 1e-9);

    layer.backward(3.0, [true, false], &mut scores).expect("backward");
    let first = label_loss_and_gradient(&partition, &scores.data()[0..8], 7, LossMode::Joint)
        .expect("loss");
    for (i, g) in first.gradient.iter().enumerate() {
        assert_close(scores.diff()[i], *g, 1e-12);
    }
}

#[test]
fn loss_layer_rejects_wrong_channel_count() {
    let config = HexLossConfig {
        graph: graph_source(),
        ..HexLossConfig::default()
    };
    let mut layer = HexLossLayer::configure(config).expect("layer");
    let scores = Blob::from_rows(&[vec![0.0; 7]]).expect("scores");
    assert!(matches!(
        layer.forward(&scores, &Blob::from_labels(&[0.0])),
        Err(HexError::Shape(_))
    ));
}

#[test]
fn missing_graph_file_fails_configuration() {
    let config = HexLossConfig {
        graph: GraphSourceConfig::new(fixture("missing.hex"), 8),
        ..HexLossConfig::default()
    };
    assert!(matches!(
        HexLossLayer::configure(config),
        Err(HexError::Frontend(_))
    ));
}

#[test]
fn top_one_with_ignore_label() {
    let config = HexAccuracyConfig {
        graph: graph_source(),
        top_k: 1,
        ignore_label: Some(255),
        per_class: true,
        ..HexAccuracyConfig::default()
    };
    let layer = HexAccuracyLayer::configure(config).expect("layer");
    let scores = batch();

    let baseline = layer
        .forward(&scores, &Blob::from_labels(&[0.0, 0.0, 0.0]))
        .expect("baseline");
    let with_ignored = layer
        .forward(&scores, &Blob::from_labels(&[0.0, 255.0, 0.0]))
        .expect("ignored");
    assert_eq!(baseline.counted, 3);
    assert_eq!(with_ignored.counted, 2);

    // Ignoring the middle row equals scoring the other two alone.
    let two = Blob::from_rows(&[scores.data()[0..8].to_vec(), scores.data()[16..24].to_vec()])
        .expect("two");
    let alone = layer
        .forward(&two, &Blob::from_labels(&[0.0, 0.0]))
        .expect("alone");
    assert_eq!(with_ignored, alone);

    let per_class = baseline.per_class.expect("per class");
    assert_eq!(per_class.len(), 8);
    assert_eq!(per_class[0], baseline.accuracy);
    assert!(per_class[1..].iter().all(|&a| a == 0.0));
}

#[test]
fn accuracy_matches_marginal_ranking() {
    let config = HexAccuracyConfig {
        graph: graph_source(),
        top_k: 3,
        ..HexAccuracyConfig::default()
    };
    let layer = HexAccuracyLayer::configure(config).expect("layer");
    let scores = batch();
    let partition = Arc::clone(layer.partition());
    let labels = [3.0, 5.0, 4.0];
    let out = layer
        .forward(&scores, &Blob::from_labels(&labels))
        .expect("forward");

    let mut hits = 0;
    for (row, &label) in labels.iter().enumerate() {
        let marginals = infer(&partition, &scores.data()[row * 8..row * 8 + 8])
            .expect("infer")
            .marginals;
        if rank_top_k(&marginals, 3).contains(&(label as usize)) {
            hits += 1;
        }
    }
    assert_close(out.accuracy, hits as f64 / 3.0, 1e-12);
}

#[test]
fn layers_can_share_one_partition() {
    let config = HexLossConfig {
        graph: graph_source(),
        ..HexLossConfig::default()
    };
    let loss = HexLossLayer::configure(config).expect("loss");
    let accuracy =
        HexAccuracyLayer::from_partition(Arc::clone(loss.partition()), &HexAccuracyConfig::default())
            .expect("accuracy");
    assert!(Arc::ptr_eq(loss.partition(), accuracy.partition()));
}

#[test]
fn marginal_mode_layer_runs() {
    let config = HexLossConfig {
        graph: graph_source(),
        mode: LossMode::Marginal,
        ..HexLossConfig::default()
    };
    let mut layer = HexLossLayer::configure(config).expect("layer");
    let loss = layer
        .forward(&batch(), &Blob::from_labels(&[1.0, 2.0, 6.0]))
        .expect("forward");
    assert!(loss > 0.0);
}

#[test]
fn layer_config_from_json() {
    let text = format!(
        r#"{{
            "graph": {{"graph_file": {:?}, "node_count": 8}},
            "mode": "marginal",
            "enumeration": {{"strategy": "flat"}}
        }}"#,
        fixture("animals.hex").display().to_string()
    );
    let config = HexLossConfig::from_json(&text).expect("config");
    assert_eq!(config.mode, LossMode::Marginal);
    let layer = HexLossLayer::configure(config).expect("layer");
    assert!(layer.partition().is_flat());
}

#[test]
fn batched_layers_match_per_example_calls() {
    // 16 examples of 2x2 positions each: 64 independent score vectors.
    let (num, height, width) = (16, 2, 2);
    let inner = height * width;
    let mut data = vec![0.0; num * 8 * inner];
    let mut label_data = vec![0.0; num * inner];
    for n in 0..num {
        for c in 0..8 {
            for j in 0..inner {
                let v = ((n * 31 + c * 7 + j * 13) % 17) as f64 * 0.25 - 2.0;
                data[(n * 8 + c) * inner + j] = v;
            }
        }
        for j in 0..inner {
            label_data[n * inner + j] = ((n + j) % 8) as f64;
        }
    }
    let mut scores = Blob::from_data([num, 8, height, width], data).expect("scores");
    let labels = Blob::from_data([num, 1, height, width], label_data).expect("labels");

    let config = HexLossConfig {
        graph: graph_source(),
        mode: LossMode::Marginal,
        ..HexLossConfig::default()
    };
    let mut loss_layer = HexLossLayer::configure(config).expect("loss");
    let accuracy_layer = HexAccuracyLayer::from_partition(
        Arc::clone(loss_layer.partition()),
        &HexAccuracyConfig {
            top_k: 2,
            ..HexAccuracyConfig::default()
        },
    )
    .expect("accuracy");

    let loss = loss_layer.forward(&scores, &labels).expect("forward");
    let accuracy = accuracy_layer.forward(&scores, &labels).expect("accuracy");
    loss_layer
        .backward(1.0, [true, false], &mut scores)
        .expect("backward");

    let partition = Arc::clone(loss_layer.partition());
    let count = (num * inner) as f64;
    let mut total = 0.0;
    let mut hits = 0usize;
    for n in 0..num {
        for j in 0..inner {
            let example: Vec<f64> = (0..8)
                .map(|c| scores.data()[(n * 8 + c) * inner + j])
                .collect();
            let label = labels.data()[n * inner + j] as i64;
            let out = label_loss_and_gradient(&partition, &example, label, LossMode::Marginal)
                .expect("loss");
            total += out.loss;
            for (c, g) in out.gradient.iter().enumerate() {
                assert_close(scores.diff()[(n * 8 + c) * inner + j], g / count, 1e-12);
            }
            if rank_top_k(&out.inference.marginals, 2).contains(&(label as usize)) {
                hits += 1;
            }
        }
    }
    assert_close(loss, total / count, 1e-9);
    assert_close(accuracy.accuracy, hits as f64 / count, 1e-12);
    assert_eq!(accuracy.counted, num * inner);
}
