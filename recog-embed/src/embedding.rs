use serde::{Deserialize, Serialize};

use crate::error::EmbedError;

/// A fixed-length feature vector produced by an upstream model.
///
/// The dimensionality is whatever the caller sends; vectors that are
/// compared against each other must agree on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }

    /// Euclidean length, accumulated in f64.
    pub fn norm(&self) -> f64 {
        self.vector
            .iter()
            .map(|&x| (x as f64) * (x as f64))
            .sum::<f64>()
            .sqrt()
    }

    /// Checks that the vector is non-empty and holds only finite values.
    pub fn validate(&self) -> Result<(), EmbedError> {
        if self.vector.is_empty() {
            return Err(EmbedError::Empty);
        }
        match self.vector.iter().position(|x| !x.is_finite()) {
            Some(index) => Err(EmbedError::NonFinite { index }),
            None => Ok(()),
        }
    }

    /// Like [`validate`](Self::validate), and additionally rejects zero-norm vectors.
    pub fn validate_query(&self) -> Result<(), EmbedError> {
        self.validate()?;
        if self.norm() == 0.0 {
            return Err(EmbedError::ZeroNorm);
        }
        Ok(())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

impl From<&[f32]> for Embedding {
    fn from(slice: &[f32]) -> Self {
        Self {
            vector: slice.to_vec(),
        }
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.vector
    }
}
