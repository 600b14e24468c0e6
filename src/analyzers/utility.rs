/// Rounds to `places` decimal places, half away from zero, on the shortest
/// decimal representation of `value`.
///
/// Shifting through the decimal string keeps `12.345` at `1234.5` instead of
/// the binary `1234.4999..`, so it rounds to `12.35`. Non-finite input is
/// returned unchanged.
pub fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let shifted: f64 = match format!("{value}e{places}").parse() {
        Ok(v) => v,
        Err(_) => return value,
    };
    let rounded = shifted.round();
    match format!("{rounded}e-{places}").parse() {
        Ok(v) => v,
        Err(_) => value,
    }
}

/// Arithmetic mean ignoring `NaN` entries. Returns `NaN` when nothing remains.
pub fn mean(values: &[f64]) -> f64 {
    let (total, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(t, c), v| (t + v, c + 1));
    if count == 0 {
        return f64::NAN;
    }
    total / count as f64
}

/// Sum ignoring `NaN` entries. An all-`NaN` group sums to 0.
pub fn sum(values: &[f64]) -> f64 {
    values.iter().filter(|v| !v.is_nan()).sum()
}

/// Formats a percentile for column headers: `50.0` -> `"50"`, `99.9` -> `"99.9"`.
pub fn format_percentile(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("{p:.0}")
    } else {
        p.to_string()
    }
}

/// Renders an error rate as a percentage string.
///
/// The value is rounded to two places first. Integral results drop the
/// decimals (`"12 %"`), others keep exactly two (`"12.30 %"`). `NaN` yields
/// `None` so the cell stays blank.
pub fn format_percent(value: f64) -> Option<String> {
    if value.is_nan() {
        return None;
    }
    let rounded = round_to(value, 2);
    if rounded.fract() == 0.0 {
        Some(format!("{rounded:.0} %"))
    } else {
        Some(format!("{rounded:.2} %"))
    }
}
