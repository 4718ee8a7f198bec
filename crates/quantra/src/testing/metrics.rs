//! Reconstruction quality of a decoded tensor against its original.

/// Quality metrics of one reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityReport {
    pub mse: f64,
    /// Peak signal-to-noise ratio in dB, infinite for exact reconstruction.
    pub psnr: f64,
    pub cosine_similarity: f64,
    pub max_error: f64,
    pub num_elements: usize,
}

impl QualityReport {
    /// Cosine similarity of at least 0.99 and PSNR of at least 30 dB.
    pub fn is_good_quality(&self) -> bool {
        self.cosine_similarity >= 0.99 && self.psnr >= 30.0
    }
}

impl std::fmt::Display for QualityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n={} MSE: {:.3e}, PSNR: {:.2} dB, Cosine: {:.6}, MaxErr: {:.3e}",
            self.num_elements, self.mse, self.psnr, self.cosine_similarity, self.max_error
        )
    }
}

/// All metrics in a single pass, accumulated in f64.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn compute_quality(original: &[f32], reconstructed: &[f32]) -> QualityReport {
    assert_eq!(original.len(), reconstructed.len(), "length mismatch");
    if original.is_empty() {
        return QualityReport::default();
    }

    let mut sum_sq_err = 0.0f64;
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    let mut max_err = 0.0f64;
    let mut peak = 0.0f64;
    for (&a, &b) in original.iter().zip(reconstructed) {
        let (a, b) = (f64::from(a), f64::from(b));
        let err = (a - b).abs();
        sum_sq_err += err * err;
        dot += a * b;
        norm_a += a * a;
        norm_b += b * b;
        max_err = max_err.max(err);
        peak = peak.max(a.abs());
    }

    let mse = sum_sq_err / original.len() as f64;
    QualityReport {
        mse,
        psnr: psnr_from_mse(mse, peak),
        cosine_similarity: cosine_from_parts(dot, norm_a, norm_b),
        max_error: max_err,
        num_elements: original.len(),
    }
}

/// Mean squared error; 0 for empty or mismatched inputs.
pub fn mse(original: &[f32], reconstructed: &[f32]) -> f64 {
    if original.len() != reconstructed.len() || original.is_empty() {
        return 0.0;
    }
    let sum: f64 = original
        .iter()
        .zip(reconstructed)
        .map(|(&a, &b)| (f64::from(a) - f64::from(b)).powi(2))
        .sum();
    sum / original.len() as f64
}

/// `10 log10(peak² / mse)`.
pub fn psnr_from_mse(mse: f64, peak: f64) -> f64 {
    if mse <= 0.0 {
        return f64::INFINITY;
    }
    if peak <= 0.0 {
        return 0.0;
    }
    10.0 * (peak * peak / mse).log10()
}

fn cosine_from_parts(dot: f64, norm_a: f64, norm_b: f64) -> f64 {
    // Two zero vectors reconstruct each other exactly.
    if norm_a == 0.0 && norm_b == 0.0 {
        return 1.0;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    cosine_from_parts(dot, norm_a, norm_b)
}

pub fn max_error(original: &[f32], reconstructed: &[f32]) -> f64 {
    original
        .iter()
        .zip(reconstructed)
        .map(|(&a, &b)| (f64::from(a) - f64::from(b)).abs())
        .fold(0.0, f64::max)
}
