//! Tree-ensemble regressor evaluated from a JSON description
//!
//! Covers both boosted ensembles (summed leaves plus a base score) and
//! random forests (averaged leaves). Split nodes send a sample left when
//! `x <= threshold`; non-finite inputs follow `missing_left`.

use super::Regressor;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_missing_left")]
        missing_left: bool,
    },
    Leaf {
        value: f64,
    },
}

fn default_missing_left() -> bool {
    true
}

/// One tree; node 0 is the root and children always follow their parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Walk from the root to a leaf; out-of-range indices and paths
    /// longer than the tree are errors
    fn evaluate(&self, features: &[f64]) -> Result<f64> {
        let mut idx = 0;
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                None => bail!("node {idx} is out of range"),
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_left,
                }) => {
                    let x = *features
                        .get(*feature)
                        .with_context(|| format!("node {idx} splits on feature {feature}"))?;
                    let go_left = if x.is_finite() {
                        x <= *threshold
                    } else {
                        *missing_left
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
        bail!("no leaf within {} nodes", self.nodes.len())
    }

    fn validate(&self, tree_idx: usize, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("tree {tree_idx} has no nodes");
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                threshold,
                ..
            } = node
            {
                if *feature >= n_features {
                    bail!("tree {tree_idx} node {i} splits on feature {feature} of {n_features}");
                }
                if !threshold.is_finite() {
                    bail!("tree {tree_idx} node {i} has a non-finite threshold");
                }
                for child in [left, right] {
                    if *child <= i || *child >= self.nodes.len() {
                        bail!("tree {tree_idx} node {i} has invalid child {child}");
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Sum,
    Mean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default)]
    pub aggregation: Aggregation,
    pub trees: Vec<Tree>,
    /// Per-feature importances in schema order
    #[serde(default)]
    pub feature_importances: Option<Vec<f64>>,
}

impl TreeEnsemble {
    /// Reject structurally broken ensembles before they can be served
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            bail!("ensemble has no trees");
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, self.n_features)?;
        }
        if let Some(imp) = &self.feature_importances {
            if imp.len() != self.n_features {
                bail!(
                    "{} importances for {} features",
                    imp.len(),
                    self.n_features
                );
            }
            if imp.iter().any(|v| !v.is_finite()) {
                bail!("importances must be finite");
            }
        }
        Ok(())
    }
}

impl Regressor for TreeEnsemble {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features {
            bail!(
                "expected {} features, got {}",
                self.n_features,
                features.len()
            );
        }
        let mut total = 0.0;
        for (i, tree) in self.trees.iter().enumerate() {
            total += tree.evaluate(features).with_context(|| format!("tree {i}"))?;
        }
        let value = match self.aggregation {
            Aggregation::Sum => self.base_score + total,
            Aggregation::Mean => self.base_score + total / self.trees.len() as f64,
        };
        Ok(value)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances.as_deref()
    }

    fn kind(&self) -> &'static str {
        "tree_ensemble"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> Tree {
        Tree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                    missing_left: true,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }
    }

    #[test]
    fn test_boosted_sum() {
        let model = TreeEnsemble {
            n_features: 2,
            base_score: 3.0,
            aggregation: Aggregation::Sum,
            trees: vec![stump(0, 0.0, -0.5, 0.5), stump(1, 10.0, 0.1, 0.2)],
            feature_importances: Some(vec![0.7, 0.3]),
        };
        model.validate().unwrap();
        assert!((model.predict(&[1.0, 5.0]).unwrap() - 3.6).abs() < 1e-12);
        assert!((model.predict(&[-1.0, 50.0]).unwrap() - 2.7).abs() < 1e-12);
    }

    #[test]
    fn test_forest_mean_and_missing_values() {
        let model = TreeEnsemble {
            n_features: 1,
            base_score: 0.0,
            aggregation: Aggregation::Mean,
            trees: vec![stump(0, 1.0, 2.0, 4.0), stump(0, 2.0, 3.0, 5.0)],
            feature_importances: None,
        };
        assert!((model.predict(&[1.5]).unwrap() - 3.5).abs() < 1e-12);
        assert!((model.predict(&[f64::NAN]).unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let model = TreeEnsemble {
            n_features: 1,
            base_score: 0.0,
            aggregation: Aggregation::Sum,
            trees: vec![Tree {
                nodes: vec![TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 0,
                    missing_left: true,
                }],
            }],
            feature_importances: None,
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_unvalidated_tree_errors_instead_of_panicking() {
        let dangling = Tree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 5,
                right: 6,
                missing_left: true,
            }],
        };
        let err = dangling.evaluate(&[0.0]).unwrap_err();
        assert!(err.to_string().contains("node 5 is out of range"));

        let bad_feature = stump(3, 0.0, 1.0, 2.0);
        assert!(bad_feature.evaluate(&[0.0]).is_err());

        let cycle = Tree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 0,
                missing_left: true,
            }],
        };
        assert!(cycle.evaluate(&[0.0]).is_err());
        assert!(Tree { nodes: vec![] }.evaluate(&[0.0]).is_err());
    }

    #[test]
    fn test_wrong_width_is_an_error() {
        let model = TreeEnsemble {
            n_features: 2,
            base_score: 0.0,
            aggregation: Aggregation::Sum,
            trees: vec![stump(0, 0.0, 1.0, 2.0)],
            feature_importances: None,
        };
        assert!(model.predict(&[1.0]).is_err());
    }
}
