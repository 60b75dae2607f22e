use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::{argmax, check_width};
use super::{ClassIndex, ClassPredictor};

const LEAF: i64 = -1;

/// One fitted decision tree in scikit-learn's flat array layout.
///
/// Node `i` is a leaf when `children_left[i] == -1`. Otherwise a sample goes
/// left when `x[feature[i]] <= threshold[i]`. `value[i]` holds the class
/// distribution (counts or fractions) reaching node `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err("node arrays have different lengths".into());
        }
        for node in 0..n {
            if self.value[node].len() != n_classes {
                return Err(format!("node {} has {} class values", node, self.value[node].len()));
            }
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == LEAF {
                continue;
            }
            // Children always come after their parent, which also rules out cycles.
            let in_range = |child: i64| child > node as i64 && (child as usize) < n;
            if !in_range(left) || !in_range(right) {
                return Err(format!("node {} has out-of-range children", node));
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!("node {} splits on unknown feature {}", node, feature));
            }
        }
        Ok(())
    }

    /// Class values of the leaf `sample` lands in.
    fn leaf(&self, sample: impl Fn(usize) -> f64) -> &[f64] {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let x = sample(self.feature[node] as usize);
            node = if x <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        &self.value[node]
    }
}

/// A forest whose prediction is the argmax of the averaged leaf
/// distributions, as `RandomForestClassifier` and `ExtraTreesClassifier` do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    pub n_classes: usize,
    pub trees: Vec<DecisionTree>,
}

impl TreeEnsemble {
    pub fn new(n_features: usize, n_classes: usize, trees: Vec<DecisionTree>) -> Result<Self, ClassifierError> {
        let ensemble = Self {
            n_features,
            n_classes,
            trees,
        };
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.trees.is_empty() {
            return Err(ClassifierError::ValidationError("Tree ensemble has no trees".into()));
        }
        if self.n_features == 0 || self.n_classes == 0 {
            return Err(ClassifierError::ValidationError(
                "Tree ensemble needs at least one feature and one class".into(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.n_classes)
                .map_err(|e| ClassifierError::ValidationError(format!("Tree {}: {}", i, e)))?;
        }
        Ok(())
    }
}

impl ClassPredictor for TreeEnsemble {
    fn backend(&self) -> &'static str {
        "tree_ensemble"
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn n_classes(&self) -> Option<usize> {
        Some(self.n_classes)
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<ClassIndex>, ClassifierError> {
        check_width(&features, self.n_features)?;

        let mut predictions = Vec::with_capacity(features.nrows());
        for (i, row) in features.rows().into_iter().enumerate() {
            let mut totals = vec![0.0; self.n_classes];
            for tree in &self.trees {
                let leaf = tree.leaf(|f| row[f]);
                let weight: f64 = leaf.iter().sum();
                if weight <= 0.0 {
                    continue;
                }
                for (total, v) in totals.iter_mut().zip(leaf) {
                    *total += v / weight;
                }
            }
            let class = argmax(totals).ok_or_else(|| {
                ClassifierError::PredictionError(format!("Row {} reached no class distribution", i))
            })?;
            predictions.push(class as ClassIndex);
        }
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Splits on feature `feature` at `threshold`: left leaf votes for
    /// `left_class`, right leaf for `right_class`.
    fn stump(feature: i64, threshold: f64, left_class: usize, right_class: usize, n_classes: usize) -> DecisionTree {
        let mut left = vec![0.0; n_classes];
        left[left_class] = 10.0;
        let mut right = vec![0.0; n_classes];
        right[right_class] = 10.0;
        DecisionTree {
            children_left: vec![1, LEAF, LEAF],
            children_right: vec![2, LEAF, LEAF],
            feature: vec![feature, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![vec![5.0; n_classes], left, right],
        }
    }

    #[test]
    fn test_majority_of_stumps() {
        let forest = TreeEnsemble::new(
            2,
            3,
            vec![stump(0, 0.0, 0, 1, 3), stump(1, 0.0, 0, 2, 3), stump(0, 1.0, 0, 2, 3)],
        )
        .unwrap();
        let x = array![[-1.0, -1.0], [0.5, -1.0], [2.0, 2.0]];
        assert_eq!(forest.predict(x.view()).unwrap(), vec![0, 0, 2]);
    }

    #[test]
    fn test_rejects_cycles_and_bad_features() {
        let mut tree = stump(0, 0.0, 0, 1, 2);
        tree.children_left[0] = 0;
        assert!(TreeEnsemble::new(1, 2, vec![tree]).is_err());

        let tree = stump(3, 0.0, 0, 1, 2);
        assert!(TreeEnsemble::new(1, 2, vec![tree]).is_err());

        assert!(TreeEnsemble::new(1, 2, vec![]).is_err());
    }

    #[test]
    fn test_width_mismatch() {
        let forest = TreeEnsemble::new(1, 2, vec![stump(0, 0.0, 0, 1, 2)]).unwrap();
        assert!(forest.predict(array![[1.0, 2.0]].view()).is_err());
    }
}
