//! Classification metrics.

use candle_core::{DType, Result, Tensor, D};

/// Fraction of rows whose arg-max matches the label.
///
/// `logits` is `(N, C)`, `labels` is `(N,)` of class indices. An empty
/// batch has accuracy 0.
pub fn accuracy(logits: &Tensor, labels: &Tensor) -> Result<f64> {
    let (n, _) = logits.dims2()?;
    if n == 0 {
        return Ok(0.0);
    }
    let predicted = logits.argmax(D::Minus1)?;
    let correct = predicted
        .eq(&labels.to_dtype(DType::U32)?)?
        .to_dtype(DType::F32)?
        .sum_all()?
        .to_scalar::<f32>()?;
    Ok(f64::from(correct) / n as f64)
}

/// Mean and sample standard deviation (n - 1 denominator).
///
/// A single value has zero spread; an empty slice gives `(NaN, NaN)`.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_accuracy() {
        let logits = Tensor::new(
            &[[0.9f32, 0.1], [0.2, 0.8], [0.6, 0.4], [0.3, 0.7]],
            &Device::Cpu,
        )
        .unwrap();
        let labels = Tensor::new(&[0u32, 1, 1, 1], &Device::Cpu).unwrap();
        assert!((accuracy(&logits, &labels).unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_accuracy_empty() {
        let logits = Tensor::zeros((0, 3), DType::F32, &Device::Cpu).unwrap();
        let labels = Tensor::zeros(0, DType::U32, &Device::Cpu).unwrap();
        assert_eq!(accuracy(&logits, &labels).unwrap(), 0.0);
    }

    #[test]
    fn test_mean_std() {
        let (m, s) = mean_std(&[0.8, 0.82, 0.84]);
        assert!((m - 0.82).abs() < 1e-12);
        assert!((s - 0.02).abs() < 1e-12);

        assert_eq!(mean_std(&[0.5]), (0.5, 0.0));
        assert!(mean_std(&[]).0.is_nan());
    }
}
