//! Nan-aware summary statistics and index interpolation.
//!
//! Spectra may contain missing (NaN) flux samples, so every statistic here skips
//! non-finite values. Standard deviations are population (`ddof = 0`) values.

/// Mean of the finite values, or `None` when there are none.
pub fn nan_mean(values: &[f64]) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &v in values.iter().filter(|v| v.is_finite()) {
        sum += v;
        n += 1;
    }
    if n == 0 { None } else { Some(sum / n as f64) }
}

/// Population standard deviation of the finite values.
pub fn nan_std(values: &[f64]) -> Option<f64> {
    let mean = nan_mean(values)?;
    let mut ss = 0.0;
    let mut n = 0usize;
    for &v in values.iter().filter(|v| v.is_finite()) {
        let d = v - mean;
        ss += d * d;
        n += 1;
    }
    Some((ss / n as f64).sqrt())
}

/// Minimum of the finite values.
pub fn nan_min(values: &[f64]) -> Option<f64> {
    values.iter().copied().filter(|v| v.is_finite()).reduce(f64::min)
}

/// Map a fractional sample index onto `grid` by linear interpolation.
///
/// Positions outside `[0, len - 1]` clamp to the end values.
pub fn interp_index(position: f64, grid: &[f64]) -> f64 {
    let last = grid.len() - 1;
    if position <= 0.0 {
        return grid[0];
    }
    if position >= last as f64 {
        return grid[last];
    }
    let lo = position.floor() as usize;
    let frac = position - lo as f64;
    grid[lo] + frac * (grid[lo + 1] - grid[lo])
}
