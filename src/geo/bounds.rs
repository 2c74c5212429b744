//! Scalar bounds over sanitized coordinate values.

const FULL_TURN: f64 = 360.0;

/// Compute `(low, high)` bounds for a list of values.
///
/// - No values yields `None`; a single value is returned twice.
/// - Non-wrapped values (latitude) give `(min, max)`.
/// - Wrapped values (longitude) are treated as points on a 360° ring. Two values are returned
///   in the order given, since their direction is meaningful. Three or more are sorted and the
///   widest circular gap between neighbours is excluded: the value just after the gap is the
///   low bound and the value just before it the high bound.
pub fn bounds(values: &[f64], wrapped: bool) -> Option<(f64, f64)> {
    match values {
        [] => None,
        [only] => Some((*only, *only)),
        [first, second] if wrapped => Some((*first, *second)),
        _ if wrapped => Some(widest_gap_arc(values)),
        _ => Some(min_max(values)),
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), value| {
        (low.min(*value), high.max(*value))
    })
}

fn widest_gap_arc(values: &[f64]) -> (f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let last = sorted.len() - 1;
    let (mut low, mut high) = (0, last);
    // The wrap-around gap from the largest value back to the smallest.
    let mut widest = (sorted[0] - sorted[last]).rem_euclid(FULL_TURN);

    for index in 1..sorted.len() {
        let gap = (sorted[index] - sorted[index - 1]).rem_euclid(FULL_TURN);
        if gap > widest {
            widest = gap;
            low = index;
            high = index - 1;
        }
    }

    (sorted[low], sorted[high])
}
