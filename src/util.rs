//! Numeric helpers over columns where `NaN` marks an undefined cell.
//!
//! Aggregates skip undefined cells and return `None` when nothing is left.

pub fn mean(data: &[f64]) -> Option<f64> {
    let (sum, count) = data
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Sample variance (n - 1 denominator).
pub fn variance(data: &[f64]) -> Option<f64> {
    let defined: Vec<f64> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    match (mean(&defined), defined.len()) {
        (Some(data_mean), count) if count > 1 => {
            let sum_sq = defined
                .iter()
                .map(|value| {
                    let diff = data_mean - *value;

                    diff * diff
                })
                .sum::<f64>();

            Some(sum_sq / (count - 1) as f64)
        }
        _ => None,
    }
}

pub fn max(data: &[f64]) -> Option<f64> {
    data.iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

/// `out[i] = data[i] - data[i - periods]`; the first `periods` cells are undefined.
pub fn diff(data: &[f64], periods: usize) -> Vec<f64> {
    (0..data.len())
        .map(|i| {
            if i < periods {
                f64::NAN
            } else {
                data[i] - data[i - periods]
            }
        })
        .collect()
}

/// Element-wise division; either side undefined leaves the cell undefined.
pub fn divide(numerator: &[f64], denominator: &[f64]) -> Vec<f64> {
    numerator
        .iter()
        .zip(denominator)
        .map(|(n, d)| n / d)
        .collect()
}

/// Turns infinities into undefined cells, then fills every undefined cell with
/// the mean of the defined ones. A column with no defined cell stays undefined.
pub fn fill_undefined_with_mean(data: &mut [f64]) {
    for v in data.iter_mut() {
        if v.is_infinite() {
            *v = f64::NAN;
        }
    }
    if let Some(fill) = mean(data) {
        for v in data.iter_mut().filter(|v| v.is_nan()) {
            *v = fill;
        }
    }
}
