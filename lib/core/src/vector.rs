use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// A dense feature vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        Self {
            data: vec![0.0; dim],
        }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn dot(&self, other: &Vector) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Cosine similarity; zero when either side has no magnitude or the
    /// dimensions differ
    #[inline]
    pub fn cosine_similarity(&self, other: &Vector) -> f32 {
        if self.dim() != other.dim() {
            return 0.0;
        }

        let norm_a = self.norm();
        let norm_b = other.norm();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        self.dot(other) / (norm_a * norm_b)
    }

    /// Compute L2 (Euclidean) distance
    #[inline]
    pub fn l2_distance(&self, other: &Vector) -> f32 {
        if self.dim() != other.dim() {
            return f32::INFINITY;
        }

        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }

    /// Normalize the vector to unit length; zero vectors stay zero
    #[inline]
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > f32::EPSILON {
            let inv_norm = 1.0 / norm;
            for x in &mut self.data {
                *x *= inv_norm;
            }
        }
    }

    /// Get normalized copy
    #[inline]
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut v = self.clone();
        v.normalize();
        v
    }

    /// Component-wise mean of `vectors`, or `None` for an empty input.
    /// All vectors must share the first one's dimension.
    pub fn mean<'a, I>(vectors: I) -> Result<Option<Vector>>
    where
        I: IntoIterator<Item = &'a Vector>,
    {
        let mut iter = vectors.into_iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let mut sum = first.clone();
        let mut count = 1usize;
        for v in iter {
            if v.dim() != sum.dim() {
                return Err(Error::DimensionMismatch {
                    expected: sum.dim(),
                    actual: v.dim(),
                });
            }
            for (acc, x) in sum.data.iter_mut().zip(&v.data) {
                *acc += x;
            }
            count += 1;
        }
        Ok(Some(&sum * (1.0 / count as f32)))
    }
}

impl Mul<f32> for &Vector {
    type Output = Vector;

    fn mul(self, scalar: f32) -> Vector {
        Vector::new(self.data.iter().map(|x| x * scalar).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let v1 = Vector::new(vec![1.0, 0.0]);
        let v2 = Vector::new(vec![1.0, 0.0]);
        assert!((v1.cosine_similarity(&v2) - 1.0).abs() < 1e-6);

        let v3 = Vector::new(vec![1.0, 0.0]);
        let v4 = Vector::new(vec![0.0, 1.0]);
        assert!((v3.cosine_similarity(&v4) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_with_zero_vector() {
        let v = Vector::new(vec![1.0, 2.0]);
        assert_eq!(v.cosine_similarity(&Vector::zeros(2)), 0.0);
    }

    #[test]
    fn test_l2_distance() {
        let v1 = Vector::new(vec![0.0, 0.0]);
        let v2 = Vector::new(vec![3.0, 4.0]);
        assert!((v1.l2_distance(&v2) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_stays_zero() {
        let v = Vector::zeros(3).normalized();
        assert_eq!(v.as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_mean() {
        let a = Vector::new(vec![1.0, 3.0]);
        let b = Vector::new(vec![3.0, 5.0]);
        let mean = Vector::mean([&a, &b]).unwrap().unwrap();
        assert_eq!(mean.as_slice(), &[2.0, 4.0]);
        assert!(Vector::mean(std::iter::empty::<&Vector>()).unwrap().is_none());
    }

    #[test]
    fn test_mean_of_mixed_dimensions() {
        let a = Vector::new(vec![1.0, 3.0]);
        let b = Vector::new(vec![1.0, 3.0, 5.0]);
        assert!(matches!(
            Vector::mean([&a, &b]),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }
}
