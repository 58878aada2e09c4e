/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Trailing simple moving average aligned with `data`.
///
/// Entry `i` is the mean of `data[i + 1 - window..=i]`, or `None` while the
/// window is still filling. A zero window yields all `None`.
pub fn rolling_mean(data: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if window == 0 || data.len() < window {
        return out;
    }

    for (i, w) in data.windows(window).enumerate() {
        out[i + window - 1] = mean(w);
    }
    out
}
