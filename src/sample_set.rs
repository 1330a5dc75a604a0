//! Weighted sample sets: normalization and weighted random selection.
//!
//! Used for both choosing the query density and choosing the pose kernel within it.

use crate::error::{GraspError, GraspResult};
use crate::pose::Kernel;
use rand::Rng;

/// Item of a weighted sample set.
pub trait Weighted {
    fn weight(&self) -> f64;
    fn set_weight(&mut self, weight: f64);
    fn cdf(&self) -> f64;
    fn set_cdf(&mut self, cdf: f64);
}

impl Weighted for Kernel {
    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    fn cdf(&self) -> f64 {
        self.cdf
    }

    fn set_cdf(&mut self, cdf: f64) {
        self.cdf = cdf;
    }
}

/// Rescale weights to sum to one and fill in the running cumulative sum, in sequence order.
/// Fails if the sequence is empty, any weight is negative or not finite, or the total weight is
/// not positive. Items are not modified on failure.
pub fn normalize<T: Weighted>(items: &mut [T]) -> GraspResult<()> {
    if items.iter().any(|item| !(item.weight() >= 0.0) || !item.weight().is_finite()) {
        return Err(GraspError::EmptyInput);
    }
    let total: f64 = items.iter().map(|item| item.weight()).sum();
    if items.is_empty() || !(total > 0.0) || !total.is_finite() {
        return Err(GraspError::EmptyInput);
    }

    let mut cdf = 0.0;
    for item in items.iter_mut() {
        let weight = item.weight() / total;
        cdf += weight;
        item.set_weight(weight);
        item.set_cdf(cdf);
    }
    // Rounding must not leave the last item unreachable
    if let Some(last) = items.last_mut() {
        last.set_cdf(1.0);
    }
    Ok(())
}

/// Index of the first item whose cdf reaches a uniform draw from [0, 1).
/// Items must have been normalized.
pub fn sample_index<T: Weighted, R: Rng>(items: &[T], rng: &mut R) -> GraspResult<usize> {
    if items.is_empty() {
        return Err(GraspError::EmptySet);
    }
    let draw: f64 = rng.gen_range(0.0..1.0);
    let index = items.partition_point(|item| item.cdf() < draw);
    Ok(index.min(items.len() - 1))
}

/// Weighted random item. Items must have been normalized.
pub fn sample<'a, T: Weighted, R: Rng>(items: &'a [T], rng: &mut R) -> GraspResult<&'a T> {
    let index = sample_index(items, rng)?;
    Ok(&items[index])
}
