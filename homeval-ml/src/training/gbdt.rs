//! Gradient-boosted regression trees.
//!
//! Squared-error objective (gradient `pred - y`, hessian 1), exact greedy
//! split search over pre-sorted feature values, and a learned default
//! direction for missing values.

use crate::data::frame::DataFrame;
use crate::error::MlError;
use crate::training::metrics::{TrainingHistory, mean_squared_error};
use homeval_core::BoosterParams;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Regularisation and stopping parameters used while growing one tree.
#[derive(Debug, Clone, Copy)]
struct GainParams {
    reg_lambda: f64,
    gamma: f64,
    min_child_weight: f64,
    max_depth: usize,
}

impl GainParams {
    /// `0.5 * [G_L²/(H_L + λ) + G_R²/(H_R + λ) - G_P²/(H_P + λ)] - γ`
    fn split_gain(&self, left: GradStats, right: GradStats, parent: GradStats) -> f64 {
        0.5 * (self.score(left) + self.score(right) - self.score(parent)) - self.gamma
    }

    fn score(&self, s: GradStats) -> f64 {
        s.grad * s.grad / (s.hess + self.reg_lambda)
    }

    fn leaf_weight(&self, s: GradStats) -> f64 {
        -s.grad / (s.hess + self.reg_lambda)
    }

    fn is_valid_split(&self, left: GradStats, right: GradStats) -> bool {
        left.hess >= self.min_child_weight && right.hess >= self.min_child_weight
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct GradStats {
    grad: f64,
    hess: f64,
}

impl GradStats {
    fn add(self, other: GradStats) -> GradStats {
        GradStats {
            grad: self.grad + other.grad,
            hess: self.hess + other.hess,
        }
    }

    fn sub(self, other: GradStats) -> GradStats {
        GradStats {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
        }
    }
}

/// A node of a regression tree. Children are indices into the tree's arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        /// Present values `< threshold` go left.
        threshold: f64,
        default_left: bool,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: usize) -> usize {
            match &nodes[at] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    pub fn predict_row(&self, row: &[Option<f64>]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } => {
                    let go_left = match row[*feature] {
                        Some(v) if !v.is_nan() => v < *threshold,
                        _ => *default_left,
                    };
                    at = if go_left { *left } else { *right };
                }
            }
        }
    }
}

/// Best split found for one node.
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    default_left: bool,
    gain: f64,
}

/// Rows of a node, plus the present rows of every feature in ascending value
/// order. Splitting a node partitions these lists stably, so no re-sorting
/// happens below the root.
struct NodeRows {
    rows: Vec<usize>,
    sorted: Vec<Vec<usize>>,
}

struct TreeBuilder<'a> {
    columns: &'a [Vec<Option<f64>>],
    grads: &'a [GradStats],
    params: GainParams,
    learning_rate: f64,
    nodes: Vec<Node>,
    go_left: Vec<bool>,
}

impl<'a> TreeBuilder<'a> {
    fn build(mut self, root: NodeRows) -> Tree {
        self.grow(root, 0);
        Tree { nodes: self.nodes }
    }

    fn stats(&self, rows: &[usize]) -> GradStats {
        rows.iter()
            .fold(GradStats::default(), |acc, &r| acc.add(self.grads[r]))
    }

    fn push_leaf(&mut self, total: GradStats) -> usize {
        self.nodes.push(Node::Leaf {
            value: self.params.leaf_weight(total) * self.learning_rate,
        });
        self.nodes.len() - 1
    }

    fn grow(&mut self, node: NodeRows, depth: usize) -> usize {
        let total = self.stats(&node.rows);
        let split = if depth < self.params.max_depth && node.rows.len() >= 2 {
            self.best_split(&node, total)
        } else {
            None
        };
        let Some(split) = split else {
            return self.push_leaf(total);
        };

        for &r in &node.rows {
            self.go_left[r] = match self.columns[split.feature][r] {
                Some(v) if !v.is_nan() => v < split.threshold,
                _ => split.default_left,
            };
        }
        let (left, right) = self.partition(node);

        // Reserve this node's slot before the children are pushed.
        let at = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });
        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[at] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            default_left: split.default_left,
            left,
            right,
        };
        at
    }

    fn partition(&self, node: NodeRows) -> (NodeRows, NodeRows) {
        let (l_rows, r_rows): (Vec<usize>, Vec<usize>) =
            node.rows.iter().partition(|&&r| self.go_left[r]);
        let mut l_sorted = Vec::with_capacity(node.sorted.len());
        let mut r_sorted = Vec::with_capacity(node.sorted.len());
        for order in node.sorted {
            let (l, r): (Vec<usize>, Vec<usize>) = order.into_iter().partition(|&r| self.go_left[r]);
            l_sorted.push(l);
            r_sorted.push(r);
        }
        (
            NodeRows {
                rows: l_rows,
                sorted: l_sorted,
            },
            NodeRows {
                rows: r_rows,
                sorted: r_sorted,
            },
        )
    }

    fn best_split(&self, node: &NodeRows, total: GradStats) -> Option<SplitCandidate> {
        let mut best: Option<SplitCandidate> = None;
        for (feature, order) in node.sorted.iter().enumerate() {
            if order.len() < 2 {
                continue;
            }
            let values = &self.columns[feature];
            let present = self.stats(order);
            let missing = total.sub(present);
            let has_missing = order.len() < node.rows.len();

            let mut left = GradStats::default();
            for pair in order.windows(2) {
                left = left.add(self.grads[pair[0]]);
                let (Some(a), Some(b)) = (values[pair[0]], values[pair[1]]) else {
                    continue;
                };
                if a >= b {
                    continue;
                }
                let mid = a + (b - a) / 2.0;
                let threshold = if mid > a { mid } else { b };

                // Missing rows to the right, then (if any) to the left.
                let mut options = vec![(false, left, total.sub(left))];
                if has_missing {
                    let l = left.add(missing);
                    options.push((true, l, total.sub(l)));
                }
                for (default_left, l, r) in options {
                    if !self.params.is_valid_split(l, r) {
                        continue;
                    }
                    let gain = self.params.split_gain(l, r, total);
                    if gain > 0.0 && best.is_none_or(|b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature,
                            threshold,
                            default_left,
                            gain,
                        });
                    }
                }
            }
        }
        best
    }
}

/// A fitted gradient-boosted regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtRegressor {
    pub params: BoosterParams,
    pub feature_names: Vec<String>,
    pub base_score: f64,
    pub trees: Vec<Tree>,
    pub history: TrainingHistory,
}

impl GbdtRegressor {
    /// Fit on a numeric feature table and a target of equal length.
    pub fn fit(x: &DataFrame, y: &[f64], params: &BoosterParams) -> Result<Self, MlError> {
        params.validate()?;
        if x.n_rows() != y.len() {
            return Err(MlError::training(format!(
                "{} feature rows for {} targets",
                x.n_rows(),
                y.len()
            )));
        }
        if y.is_empty() {
            return Err(MlError::training("cannot train on an empty table"));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(MlError::training("target contains non-finite values"));
        }

        let feature_names = x.column_names().to_vec();
        let columns = numeric_columns(x, &feature_names)?;
        let sorted: Vec<Vec<usize>> = columns.iter().map(|c| presort(c)).collect();

        let n = y.len();
        let base_score = y.iter().sum::<f64>() / n as f64;
        let mut preds = vec![base_score; n];
        let gain = GainParams {
            reg_lambda: params.reg_lambda,
            gamma: params.gamma,
            min_child_weight: params.min_child_weight,
            max_depth: params.max_depth,
        };

        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut history = TrainingHistory::default();
        for round in 0..params.n_estimators {
            let grads: Vec<GradStats> = preds
                .iter()
                .zip(y)
                .map(|(p, t)| GradStats {
                    grad: p - t,
                    hess: 1.0,
                })
                .collect();

            let builder = TreeBuilder {
                columns: &columns,
                grads: &grads,
                params: gain,
                learning_rate: params.learning_rate,
                nodes: Vec::new(),
                go_left: vec![false; n],
            };
            let tree = builder.build(NodeRows {
                rows: (0..n).collect(),
                sorted: sorted.clone(),
            });

            for (row, pred) in preds.iter_mut().enumerate() {
                *pred += tree.predict_row(&row_values(&columns, row));
            }
            let loss = mean_squared_error(y, &preds);
            history.record_round(loss);
            debug!(round, leaves = tree.n_leaves(), loss, "Boosting round");
            trees.push(tree);
        }

        Ok(Self {
            params: params.clone(),
            feature_names,
            base_score,
            trees,
            history,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Predict for a table holding (at least) the training feature columns.
    pub fn predict(&self, x: &DataFrame) -> Result<Vec<f64>, MlError> {
        let columns = numeric_columns(x, &self.feature_names)?;
        Ok((0..x.n_rows())
            .map(|row| {
                let values = row_values(&columns, row);
                self.base_score + self.trees.iter().map(|t| t.predict_row(&values)).sum::<f64>()
            })
            .collect())
    }
}

fn numeric_columns(x: &DataFrame, names: &[String]) -> Result<Vec<Vec<Option<f64>>>, MlError> {
    names
        .iter()
        .map(|name| x.numeric(name).map(<[Option<f64>]>::to_vec))
        .collect()
}

fn row_values(columns: &[Vec<Option<f64>>], row: usize) -> Vec<Option<f64>> {
    columns.iter().map(|c| c[row]).collect()
}

/// Row positions with a present value, ordered by that value.
fn presort(values: &[Option<f64>]) -> Vec<usize> {
    let mut order: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_some_and(|v| !v.is_nan()))
        .map(|(i, _)| i)
        .collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (values[a].unwrap_or(0.0), values[b].unwrap_or(0.0));
        a.total_cmp(&b)
    });
    order
}
