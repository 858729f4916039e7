//! Seeded stratified train/test splitting.

use crate::data::frame::DataFrame;
use crate::error::MlError;
use homeval_core::ConfigError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// Row positions produced by a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    /// Rows without a stratification key; they belong to neither subset.
    pub excluded: Vec<usize>,
}

/// One stratified shuffle split: every stratum contributes to the test set in
/// proportion to its size.
#[derive(Debug, Clone)]
pub struct StratifiedShuffleSplit {
    test_size: f64,
    seed: u64,
}

impl StratifiedShuffleSplit {
    pub fn new(test_size: f64, seed: u64) -> Result<Self, MlError> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ConfigError::invalid(format!(
                "test_size must be in (0, 1), got {test_size}"
            ))
            .into());
        }
        Ok(Self { test_size, seed })
    }

    /// Split row positions by their stratification keys.
    pub fn split<K: Ord + Clone>(&self, keys: &[Option<K>]) -> Result<SplitIndices, MlError> {
        let mut strata: BTreeMap<K, Vec<usize>> = BTreeMap::new();
        let mut excluded = Vec::new();
        for (pos, key) in keys.iter().enumerate() {
            match key {
                Some(k) => strata.entry(k.clone()).or_default().push(pos),
                None => excluded.push(pos),
            }
        }

        let n: usize = strata.values().map(Vec::len).sum();
        let n_test = ((n as f64) * self.test_size).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(MlError::dataset(format!(
                "cannot split {n} keyed rows with test_size {}: both subsets must be non-empty",
                self.test_size
            )));
        }

        let quotas = allocate(&strata.values().map(Vec::len).collect::<Vec<_>>(), n_test, n);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut train = Vec::with_capacity(n - n_test);
        let mut test = Vec::with_capacity(n_test);
        for (members, quota) in strata.into_values().zip(quotas) {
            let mut members = members;
            members.shuffle(&mut rng);
            let (t, r) = members.split_at(quota);
            test.extend_from_slice(t);
            train.extend_from_slice(r);
        }
        train.shuffle(&mut rng);
        test.shuffle(&mut rng);

        Ok(SplitIndices {
            train,
            test,
            excluded,
        })
    }

    /// Split a table into (train, test) using per-row keys.
    pub fn split_frame<K: Ord + Clone>(
        &self,
        df: &DataFrame,
        keys: &[Option<K>],
    ) -> Result<(DataFrame, DataFrame, usize), MlError> {
        if keys.len() != df.n_rows() {
            return Err(MlError::dataset(format!(
                "{} stratification keys for {} rows",
                keys.len(),
                df.n_rows()
            )));
        }
        let indices = self.split(keys)?;
        Ok((
            df.take(&indices.train),
            df.take(&indices.test),
            indices.excluded.len(),
        ))
    }
}

/// Per-stratum test counts: floors of the proportional share, with the
/// leftover slots going to the largest remainders (earlier strata win ties).
fn allocate(counts: &[usize], n_test: usize, n: usize) -> Vec<usize> {
    let mut quotas: Vec<usize> = counts.iter().map(|&c| c * n_test / n).collect();
    let assigned: usize = quotas.iter().sum();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse((counts[i] * n_test) % n));
    for &i in order.iter().take(n_test - assigned) {
        quotas[i] += 1;
    }
    quotas
}
