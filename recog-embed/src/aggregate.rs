use ndarray::{Array2, Axis};

use crate::{embedding::Embedding, error::EmbedError};

/// Per-dimension arithmetic mean of `samples`.
///
/// Every sample must be valid (see [`Embedding::validate`]) and share the
/// dimensionality of the first one. The result has that same dimensionality.
/// Sums run in f64, so the mean of finite samples is always finite.
pub fn centroid(samples: &[Embedding]) -> Result<Embedding, EmbedError> {
    let first = samples.first().ok_or(EmbedError::Empty)?;
    let dim = first.dim();

    let mut flat = Vec::with_capacity(samples.len() * dim);
    for sample in samples {
        sample.validate()?;
        if sample.dim() != dim {
            return Err(EmbedError::DimensionMismatch {
                expected: dim,
                got: sample.dim(),
            });
        }
        flat.extend(sample.as_slice().iter().map(|&x| x as f64));
    }

    let matrix = Array2::from_shape_vec((samples.len(), dim), flat).map_err(|_| {
        EmbedError::DimensionMismatch {
            expected: dim,
            got: 0,
        }
    })?;
    let mean = matrix.mean_axis(Axis(0)).ok_or(EmbedError::Empty)?;

    log::trace!("centroid of {} samples, dim {}", samples.len(), dim);
    Ok(Embedding::new(mean.iter().map(|&x| x as f32).collect()))
}
