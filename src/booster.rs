use anyhow::{anyhow, Result};
use std::str::FromStr;

/// One regression tree from the text-format model artifact.
#[derive(Debug)]
struct RegressionTree {
    split_features: Vec<usize>,
    thresholds: Vec<f64>,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    leaf_values: Vec<f64>,
    shrinkage: f64,
}

impl RegressionTree {
    fn from_lines(lines: &mut std::iter::Peekable<std::str::Lines<'_>>) -> Result<Self> {
        let mut num_leaves: Option<usize> = None;
        let mut split_features = Vec::new();
        let mut thresholds = Vec::new();
        let mut left_child = Vec::new();
        let mut right_child = Vec::new();
        let mut leaf_values = Vec::new();
        let mut shrinkage = 1.0;

        while let Some(peeked) = lines.peek() {
            if peeked.starts_with("Tree=") {
                break;
            }
            let line = lines.next().unwrap().trim();

            if line.starts_with("num_leaves=") {
                num_leaves = Some(parse_value(line, "num_leaves=")?);
            } else if line.starts_with("split_feature=") {
                split_features = parse_array(line, "split_feature=")?;
            } else if line.starts_with("threshold=") {
                thresholds = parse_array(line, "threshold=")?;
            } else if line.starts_with("left_child=") {
                left_child = parse_array(line, "left_child=")?;
            } else if line.starts_with("right_child=") {
                right_child = parse_array(line, "right_child=")?;
            } else if line.starts_with("leaf_value=") {
                leaf_values = parse_array(line, "leaf_value=")?;
            } else if line.starts_with("shrinkage=") {
                shrinkage = parse_value(line, "shrinkage=")?;
            }
        }

        let internal_nodes = split_features.len();
        if thresholds.len() != internal_nodes
            || left_child.len() != internal_nodes
            || right_child.len() != internal_nodes
        {
            return Err(anyhow!(
                "Tree definition invalid: split/child/threshold length mismatch"
            ));
        }

        let declared_leaves = num_leaves.unwrap_or(leaf_values.len());
        if declared_leaves != leaf_values.len() {
            return Err(anyhow!(
                "Tree leaf count mismatch: expected {declared_leaves}, found {}",
                leaf_values.len()
            ));
        }
        if leaf_values.is_empty() {
            return Err(anyhow!("Tree has no leaves"));
        }

        Ok(Self {
            split_features,
            thresholds,
            left_child,
            right_child,
            leaf_values,
            shrinkage,
        })
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let mut node_idx = 0usize;
        loop {
            if self.split_features.is_empty() {
                // Single-leaf stump.
                return self.leaf_values[0] * self.shrinkage;
            }
            let feature_idx = self
                .split_features
                .get(node_idx)
                .copied()
                .unwrap_or_default();
            let threshold = self.thresholds.get(node_idx).copied().unwrap_or(0.0);
            let feature_value = *features.get(feature_idx).unwrap_or(&0.0);
            let child = if feature_value <= threshold {
                self.left_child.get(node_idx).copied().unwrap_or(-1)
            } else {
                self.right_child.get(node_idx).copied().unwrap_or(-1)
            };

            if child < 0 {
                let leaf_idx = (-child - 1) as usize;
                return self.leaf_values.get(leaf_idx).copied().unwrap_or_default()
                    * self.shrinkage;
            }

            node_idx = child as usize;
        }
    }
}

/// Pre-trained gradient-boosted regression model, parsed from the text
/// artifact. The raw output lives in log-revenue space; the elasticity
/// layer owns the transform back to currency units.
#[derive(Debug)]
pub struct RegressionBooster {
    trees: Vec<RegressionTree>,
    feature_names: Vec<String>,
    feature_count: usize,
}

impl RegressionBooster {
    pub fn from_model_text(text: &str) -> Result<Self> {
        let mut lines = text.lines().peekable();
        let mut trees = Vec::new();
        let mut feature_names: Vec<String> = Vec::new();
        let mut max_feature_idx: Option<usize> = None;

        while let Some(line) = lines.next() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with("objective=") {
                if !trimmed.contains("regression") {
                    return Err(anyhow!(
                        "Model objective must be regression (found \"{trimmed}\")"
                    ));
                }
            } else if trimmed.starts_with("feature_names=") {
                feature_names = trimmed
                    .strip_prefix("feature_names=")
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(|name| name.to_string())
                    .collect();
            } else if trimmed.starts_with("max_feature_idx=") {
                max_feature_idx = Some(parse_value(trimmed, "max_feature_idx=")?);
            }

            if trimmed.starts_with("Tree=") {
                let tree = RegressionTree::from_lines(&mut lines)?;
                trees.push(tree);
            }
        }

        if trees.is_empty() {
            return Err(anyhow!("Model contained no trees"));
        }
        if feature_names.is_empty() {
            return Err(anyhow!("Model is missing the feature_names header"));
        }

        let inferred_max_feature = trees
            .iter()
            .flat_map(|tree| tree.split_features.iter())
            .copied()
            .max()
            .unwrap_or(0);
        let feature_count = max_feature_idx
            .map(|idx| idx + 1)
            .unwrap_or(inferred_max_feature + 1)
            .max(feature_names.len());
        if feature_count != feature_names.len() {
            return Err(anyhow!(
                "Model declares {} feature(s) but names {}",
                feature_count,
                feature_names.len()
            ));
        }

        Ok(Self {
            trees,
            feature_names,
            feature_count,
        })
    }

    /// Ordered trained schema: the column order every feature vector must
    /// follow. Columns the pipeline does not produce default to 0.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn num_features(&self) -> usize {
        self.feature_count
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw model output (log-revenue space) for one schema-ordered row.
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .map(|tree| tree.predict(features))
            .sum()
    }

    /// Single inference call over a whole feature matrix. Each row must be
    /// schema-ordered; row outputs line up with input rows.
    pub fn predict_matrix(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}

fn parse_value<T>(line: &str, prefix: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let raw = line
        .strip_prefix(prefix)
        .ok_or_else(|| anyhow!("Expected prefix {prefix}"))?;
    raw.trim().parse::<T>().map_err(|err| {
        anyhow!("Failed to parse value for {prefix} from \"{line}\" while loading model: {err}")
    })
}

fn parse_array<T>(line: &str, prefix: &str) -> Result<Vec<T>>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let raw = line
        .strip_prefix(prefix)
        .ok_or_else(|| anyhow!("Expected prefix {prefix}"))?;
    raw.split_whitespace()
        .map(|token| {
            token
                .parse::<T>()
                .map_err(|err| anyhow!("Failed to parse value {token} for {prefix}: {err}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_TEXT: &str = "\
objective=regression
max_feature_idx=2
feature_names=Unit_Price Month Is_Weekend

Tree=0
num_leaves=2
split_feature=0
threshold=50.0
left_child=-1
right_child=-2
leaf_value=1.0 2.0
shrinkage=1

Tree=1
num_leaves=2
split_feature=2
threshold=0.5
left_child=-1
right_child=-2
leaf_value=0.25 0.75
shrinkage=0.5
";

    #[test]
    fn parses_trees_and_schema() {
        let booster = RegressionBooster::from_model_text(MODEL_TEXT).unwrap();
        assert_eq!(booster.num_features(), 3);
        assert_eq!(
            booster.feature_names(),
            &["Unit_Price", "Month", "Is_Weekend"]
        );
    }

    #[test]
    fn predict_sums_shrunk_tree_outputs() {
        let booster = RegressionBooster::from_model_text(MODEL_TEXT).unwrap();
        // price 40 -> leaf 1.0; weekend 1.0 -> leaf 0.75 * 0.5
        let out = booster.predict(&[40.0, 6.0, 1.0]);
        assert!((out - 1.375).abs() < 1e-12, "got {out}");
        // price 60 -> leaf 2.0; weekday 0.0 -> leaf 0.25 * 0.5
        let out = booster.predict(&[60.0, 6.0, 0.0]);
        assert!((out - 2.125).abs() < 1e-12, "got {out}");
    }

    #[test]
    fn predict_matrix_matches_per_row_predict() {
        let booster = RegressionBooster::from_model_text(MODEL_TEXT).unwrap();
        let rows = vec![vec![40.0, 6.0, 1.0], vec![60.0, 1.0, 0.0]];
        let batch = booster.predict_matrix(&rows);
        for (row, out) in rows.iter().zip(batch.iter()) {
            assert_eq!(*out, booster.predict(row));
        }
    }

    #[test]
    fn rejects_classification_objectives() {
        let text = MODEL_TEXT.replace("objective=regression", "objective=binary sigmoid:1");
        assert!(RegressionBooster::from_model_text(&text).is_err());
    }

    #[test]
    fn rejects_model_without_feature_names() {
        let text = MODEL_TEXT.replace("feature_names=Unit_Price Month Is_Weekend", "");
        assert!(RegressionBooster::from_model_text(&text).is_err());
    }
}
