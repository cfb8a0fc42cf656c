//! Peak finding on a 1-D signal.
//!
//! Definitions:
//! - a local maximum is a sample strictly higher than its neighbours; a flat
//!   top (plateau) counts once, at its middle sample; the first and last samples
//!   are never maxima
//! - prominence is the peak height above the higher of its two bases, where each
//!   base is the lowest sample between the peak and the nearest strictly higher
//!   sample (or the signal edge) on that side
//! - the width at relative height `h` is measured at `peak - h * prominence`,
//!   with the crossings linearly interpolated between samples
//!
//! NaN samples are never maxima and never lower a base; the prominence search
//! walks over them.

/// Prominence of one peak and the indices of its bases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prominence {
    pub value: f64,
    pub left_base: usize,
    pub right_base: usize,
}

/// Interpolated crossing positions, in fractional sample index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthCrossing {
    pub height: f64,
    pub left: f64,
    pub right: f64,
}

impl WidthCrossing {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }
}

/// Indices of local maxima, in ascending order.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let mut i = 1;
    let i_max = n - 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left_edge = i;
                let right_edge = ahead - 1;
                peaks.push((left_edge + right_edge) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// Prominence of the sample at `peak`.
pub fn prominence(x: &[f64], peak: usize) -> Prominence {
    let top = x[peak];

    let mut left_min = top;
    let mut left_base = peak;
    let mut i = peak;
    loop {
        let v = x[i];
        if v > top {
            break;
        }
        if v < left_min {
            left_min = v;
            left_base = i;
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_min = top;
    let mut right_base = peak;
    for (j, &v) in x.iter().enumerate().skip(peak) {
        if v > top {
            break;
        }
        if v < right_min {
            right_min = v;
            right_base = j;
        }
    }

    Prominence {
        value: top - left_min.max(right_min),
        left_base,
        right_base,
    }
}

/// Local maxima whose prominence is at least `min_prominence`.
pub fn find_peaks(x: &[f64], min_prominence: f64) -> Vec<usize> {
    local_maxima(x)
        .into_iter()
        .filter(|&p| prominence(x, p).value >= min_prominence)
        .collect()
}

/// Width of the peak at `peak`, measured `rel_height` of its prominence below
/// the top. Returns `None` for a zero-prominence peak.
pub fn peak_width(x: &[f64], peak: usize, rel_height: f64) -> Option<WidthCrossing> {
    let prom = prominence(x, peak);
    if !(prom.value > 0.0) {
        return None;
    }
    let height = x[peak] - prom.value * rel_height;

    let mut i = peak;
    while prom.left_base < i && height < x[i] {
        i -= 1;
    }
    let mut left = i as f64;
    if x[i] < height {
        left += (height - x[i]) / (x[i + 1] - x[i]);
    }

    let mut i = peak;
    while i < prom.right_base && height < x[i] {
        i += 1;
    }
    let mut right = i as f64;
    if x[i] < height {
        right -= (height - x[i]) / (x[i - 1] - x[i]);
    }

    Some(WidthCrossing { height, left, right })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_maxima_handle_plateaus_and_edges() {
        let x = [5.0, 1.0, 3.0, 3.0, 3.0, 1.0, 2.0, 0.0, 4.0];
        assert_eq!(local_maxima(&x), vec![3, 6]);
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn nan_is_never_a_peak() {
        let x = [0.0, f64::NAN, 0.0, 2.0, 0.0];
        assert_eq!(local_maxima(&x), vec![3]);
    }

    #[test]
    fn prominence_uses_higher_base() {
        // Peak at 3 (height 5): left base 1, right base 5 (the walk stops at 6 > 5).
        let x = [2.0, 1.0, 3.0, 5.0, 2.0, 0.0, 6.0];
        let p = prominence(&x, 3);
        assert_eq!(p.left_base, 1);
        assert_eq!(p.right_base, 5);
        assert!((p.value - 4.0).abs() < 1e-12);
    }

    #[test]
    fn find_peaks_applies_prominence_threshold() {
        let x = [0.0, 0.3, 0.0, 2.0, 0.0];
        assert_eq!(find_peaks(&x, 0.5), vec![3]);
        assert_eq!(find_peaks(&x, 0.1), vec![1, 3]);
    }

    #[test]
    fn width_interpolates_crossings() {
        // Triangle of height 4 on a zero baseline: half-height crossings at ±1 sample.
        let x = [0.0, 0.0, 2.0, 4.0, 2.0, 0.0, 0.0];
        let w = peak_width(&x, 3, 0.5).unwrap();
        assert!((w.height - 2.0).abs() < 1e-12);
        assert!((w.left - 2.0).abs() < 1e-12);
        assert!((w.right - 4.0).abs() < 1e-12);

        let x = [0.0, 1.0, 3.0, 4.0, 3.0, 1.0, 0.0];
        let w = peak_width(&x, 3, 0.5).unwrap();
        assert!((w.left - 1.5).abs() < 1e-12);
        assert!((w.right - 4.5).abs() < 1e-12);
        assert!((w.width() - 3.0).abs() < 1e-12);
    }
}
