//! Numeric helpers shared by the loss models.

/// Convert a dB figure to a linear power ratio
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 10.0)
}

/// Convert a linear power ratio to dB
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    10.0 * linear.log10()
}

/// Composite Simpson's rule over `[a, b]` with `intervals` sub-intervals.
///
/// `intervals` is rounded up to the next even number. Returns 0 for an
/// empty or reversed range.
pub fn simpson<F>(f: F, a: f64, b: f64, intervals: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    if b <= a {
        return 0.0;
    }
    let n = (intervals.max(2) + 1) & !1;
    let h = (b - a) / n as f64;

    let mut sum = f(a) + f(b);
    for i in 1..n {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(a + i as f64 * h);
    }
    sum * h / 3.0
}
