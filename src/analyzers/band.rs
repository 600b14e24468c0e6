use crate::analyzers::types::Band;

pub const GREEN_BELOW: f64 = 1000.0;
pub const RED_ABOVE: f64 = 2000.0;

/// Classifies a scaled response-time value into a health band.
///
/// | Range              | Band      |
/// |--------------------|-----------|
/// | v < 1000           | green     |
/// | 1000 < v < 2000    | yellow    |
/// | v > 2000           | red       |
/// | v == 1000 or 2000  | undefined |
///
/// Both boundaries are open, so exact boundary values fall into no reported
/// band. `NaN` also lands in `Undefined`; callers tallying distributions
/// count it as missing before classifying.
pub fn categorize(value: f64) -> Band {
    match value {
        v if v < GREEN_BELOW => Band::Green,
        v if v > GREEN_BELOW && v < RED_ABOVE => Band::Yellow,
        v if v > RED_ABOVE => Band::Red,
        _ => Band::Undefined,
    }
}
