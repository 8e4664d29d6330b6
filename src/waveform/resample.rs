use super::render::BarGeometry;

/// Linearly interpolate `input` to exactly `target` values.
///
/// Output `i` samples the input at `i * (N - 1) / (M - 1)`. A target of zero gives an
/// empty vector and a target of one gives the first sample. An empty input yields
/// `target` zeros so a track without data still draws a flat line.
pub fn resample(input: &[f32], target: usize) -> Vec<f32> {
    if input.is_empty() {
        return vec![0.0; target];
    }
    match target {
        0 => return Vec::new(),
        1 => return vec![input[0]],
        _ => {}
    }

    let last = input.len() - 1;
    let step = last as f64 / (target - 1) as f64;
    (0..target)
        .map(|i| {
            let pos = i as f64 * step;
            let lo = (pos.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let frac = (pos - lo as f64) as f32;
            input[lo] + (input[hi] - input[lo]) * frac
        })
        .collect()
}

/// Number of bars that fit in `width_px`.
pub fn bar_count(width_px: u32, geometry: BarGeometry) -> usize {
    let unit = geometry.peak_unit();
    if unit == 0 { 0 } else { (width_px / unit) as usize }
}
