//! Isolation-Forest Analyzer (C6)
//!
//! No pre-built isolation-forest crate is in the dependency stack, so this
//! hand-rolls the standard algorithm (Liu, Ting & Zhou 2008) on top of
//! `rand`/`rand_distr`, which the rest of the engine already depends on.
//! Contract: lower score = more anomalous, deterministic for a given seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::RcfConfig;
use crate::domain::Status;

/// One row's feature vector, z-score standardized before fitting.
pub type Features = [f64; 5];

/// Build a feature vector in the fixed order
/// `[vib_rms, temp_mean, crest_factor, temp_gradient_final, avg_line_vibration]`.
pub fn features(
    vib_rms: f64,
    temp_mean: f64,
    crest_factor: f64,
    temp_gradient_final: f64,
    avg_line_vibration: f64,
) -> Features {
    [
        vib_rms,
        temp_mean,
        crest_factor,
        temp_gradient_final,
        avg_line_vibration,
    ]
}

struct Standardizer {
    mean: Features,
    std: Features,
}

impl Standardizer {
    fn fit(rows: &[Features]) -> Self {
        let n = rows.len() as f64;
        let mut mean = [0.0; 5];
        for row in rows {
            for i in 0..5 {
                mean[i] += row[i];
            }
        }
        for m in &mut mean {
            *m /= n;
        }
        let mut var = [0.0; 5];
        for row in rows {
            for i in 0..5 {
                var[i] += (row[i] - mean[i]).powi(2);
            }
        }
        let mut std = [0.0; 5];
        for i in 0..5 {
            std[i] = (var[i] / n).sqrt();
            if std[i] < 1e-9 {
                std[i] = 1.0;
            }
        }
        Self { mean, std }
    }

    fn transform(&self, row: &Features) -> Features {
        let mut out = [0.0; 5];
        for i in 0..5 {
            out[i] = (row[i] - self.mean[i]) / self.std[i];
        }
        out
    }
}

enum Node {
    Leaf { size: usize },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

struct IsolationTree {
    root: Node,
    height_limit: u32,
}

fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + 0.5772156649) - 2.0 * (n - 1.0) / n
}

impl IsolationTree {
    fn build(rows: &[Features], height_limit: u32, rng: &mut StdRng) -> Self {
        let root = Self::build_node(rows, 0, height_limit, rng);
        Self { root, height_limit }
    }

    fn build_node(rows: &[Features], depth: u32, height_limit: u32, rng: &mut StdRng) -> Node {
        if depth >= height_limit || rows.len() <= 1 {
            return Node::Leaf { size: rows.len() };
        }

        let feature = rng.gen_range(0..5);
        let (min, max) = rows.iter().fold((f64::MAX, f64::MIN), |(mn, mx), r| {
            (mn.min(r[feature]), mx.max(r[feature]))
        });
        if (max - min).abs() < 1e-12 {
            return Node::Leaf { size: rows.len() };
        }

        let split = rng.gen_range(min..max);
        let (left_rows, right_rows): (Vec<Features>, Vec<Features>) =
            rows.iter().partition(|r| r[feature] < split);

        if left_rows.is_empty() || right_rows.is_empty() {
            return Node::Leaf { size: rows.len() };
        }

        Node::Split {
            feature,
            value: split,
            left: Box::new(Self::build_node(&left_rows, depth + 1, height_limit, rng)),
            right: Box::new(Self::build_node(&right_rows, depth + 1, height_limit, rng)),
        }
    }

    fn path_length(&self, row: &Features) -> f64 {
        Self::walk(&self.root, row, 0, self.height_limit)
    }

    fn walk(node: &Node, row: &Features, depth: u32, height_limit: u32) -> f64 {
        match node {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                value,
                left,
                right,
            } => {
                if depth >= height_limit {
                    return depth as f64;
                }
                if row[*feature] < *value {
                    Self::walk(left, row, depth + 1, height_limit)
                } else {
                    Self::walk(right, row, depth + 1, height_limit)
                }
            }
        }
    }
}

/// A fitted isolation forest plus the standardizer used to train it.
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    standardizer: Standardizer,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit on productive, non-break rows. Caller is responsible for the
    /// `min_rows` gate (spec §4.6) — below that, skip fitting entirely.
    pub fn fit(rows: &[Features], cfg: &RcfConfig) -> Self {
        let standardizer = Standardizer::fit(rows);
        let standardized: Vec<Features> = rows.iter().map(|r| standardizer.transform(r)).collect();
        let sample_size = cfg.max_sample.min(standardized.len()).max(1);
        let height_limit = (sample_size as f64).log2().ceil() as u32;

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let trees = (0..cfg.n_trees)
            .map(|_| {
                let sample: Vec<Features> = (0..sample_size)
                    .map(|_| standardized[rng.gen_range(0..standardized.len())])
                    .collect();
                IsolationTree::build(&sample, height_limit, &mut rng)
            })
            .collect();

        Self {
            trees,
            standardizer,
            sample_size,
        }
    }

    /// Anomaly score for one row: lower = more anomalous (standard
    /// isolation-forest convention, inverted from the textbook `s(x,n)`
    /// so "more negative" reads as "worse", matching the spec's ordering).
    pub fn score(&self, row: &Features) -> f64 {
        let z = self.standardizer.transform(row);
        let avg_path: f64 =
            self.trees.iter().map(|t| t.path_length(&z)).sum::<f64>() / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return 0.0;
        }
        // s(x,n) in [0,1], ~1 = anomalous. Score returned as (0.5 - s) so
        // that lower (more negative) means more anomalous, matching the
        // percentile-threshold convention documented at the module top.
        let s = 2f64.powf(-avg_path / c);
        0.5 - s
    }
}

/// Percentile of a score distribution (linear interpolation), `p` in `[0,100]`.
pub fn percentile(scores: &[f64], p: f64) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let rank = (p / 100.0) * (sorted.len() as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

fn median(xs: &[f64]) -> f64 {
    percentile(xs, 50.0)
}

/// Vibration-floor gate: alarms only fire when `vib_rms ≥ floor_ratio ×
/// median(productive vib_rms)` and the interval is not a run-down interval.
pub fn floor_gate(vib_rms: f64, productive_vib: &[f64], is_rundown: bool, floor_ratio: f64) -> bool {
    if is_rundown {
        return false;
    }
    vib_rms >= floor_ratio * median(productive_vib)
}

/// Classify one productive interval's RCF score against the warning/
/// critical percentile thresholds, gated by [`floor_gate`].
pub fn classify(
    score: f64,
    is_production: bool,
    gated: bool,
    warn_threshold: f64,
    crit_threshold: f64,
) -> Status {
    if !is_production {
        return Status::Idle;
    }
    if !gated {
        return Status::Monitoring;
    }
    if score <= crit_threshold {
        Status::CriticalAlarm
    } else if score <= warn_threshold {
        Status::PlanService
    } else {
        Status::Monitoring
    }
}
