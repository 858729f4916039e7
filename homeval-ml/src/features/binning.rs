//! Right-closed binning of continuous values into ordered labels.

use crate::error::MlError;

/// Upper edges of the median-income strata. The first bin is open below and
/// the last is open above.
pub const INCOME_EDGES: [f64; 6] = [f64::NEG_INFINITY, 1.5, 3.0, 4.5, 6.0, f64::INFINITY];

/// Column the stratification key is derived from.
pub const INCOME_COLUMN: &str = "median_income";

/// Assigns values to bins `(e[i], e[i+1]]`, labelled `1..=edges.len() - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucketizer {
    edges: Vec<f64>,
}

impl Bucketizer {
    /// Edges must be strictly increasing and contain at least two values.
    pub fn new(edges: Vec<f64>) -> Result<Self, MlError> {
        if edges.len() < 2 {
            return Err(MlError::dataset("a bucketizer needs at least two edges"));
        }
        if edges
            .windows(2)
            .any(|w| w[0].partial_cmp(&w[1]) != Some(std::cmp::Ordering::Less))
        {
            return Err(MlError::dataset("bucketizer edges must be strictly increasing"));
        }
        Ok(Self { edges })
    }

    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Label of the bin holding `value`, or `None` for a missing value or a
    /// value outside the outer edges.
    pub fn bucket(&self, value: Option<f64>) -> Option<u8> {
        let v = value.filter(|v| !v.is_nan())?;
        if v <= self.edges[0] || v > self.edges[self.edges.len() - 1] {
            return None;
        }
        // First upper edge that is >= v.
        let upper = self.edges[1..].partition_point(|&edge| edge < v);
        Some((upper + 1) as u8)
    }

    pub fn bucket_all(&self, values: &[Option<f64>]) -> Vec<Option<u8>> {
        values.iter().map(|v| self.bucket(*v)).collect()
    }
}

/// The five fixed median-income strata.
pub fn income_bucketizer() -> Bucketizer {
    Bucketizer {
        edges: INCOME_EDGES.to_vec(),
    }
}

/// Stratification label `1..=5` for a median income value.
pub fn income_category(value: Option<f64>) -> Option<u8> {
    income_bucketizer().bucket(value)
}
