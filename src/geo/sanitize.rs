//! Coordinate cleaning applied before any bounds or geometry are computed.

/// Rules deciding which coordinate pairs survive sanitizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizePolicy {
    /// Treat an exact `0.0` on either axis as a fill value and drop the pair.
    ///
    /// Several upstream formats write `0.0` where a position is missing. Enabled by default,
    /// which also discards genuine equator and prime-meridian positions.
    pub drop_zero_sentinel: bool,
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        Self {
            drop_zero_sentinel: true,
        }
    }
}

/// Sanitize paired longitude/latitude sequences using the default policy.
///
/// `None` marks a value the reader flagged as masked. Sequences of unequal length are
/// truncated to the shorter one. Returns `(lons, lats)` of equal length.
pub fn sanitize(lons: &[Option<f64>], lats: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    sanitize_with(lons, lats, SanitizePolicy::default())
}

/// Sanitize paired longitude/latitude sequences with an explicit policy.
pub fn sanitize_with(
    lons: &[Option<f64>],
    lats: &[Option<f64>],
    policy: SanitizePolicy,
) -> (Vec<f64>, Vec<f64>) {
    let capacity = lons.len().min(lats.len());
    let mut sane_lons = Vec::with_capacity(capacity);
    let mut sane_lats = Vec::with_capacity(capacity);

    for (lon, lat) in lons.iter().zip(lats) {
        let (Some(lon), Some(lat)) = (*lon, *lat) else {
            continue;
        };
        if keep_pair(lon, lat, policy) {
            sane_lons.push(lon);
            sane_lats.push(lat);
        }
    }

    (sane_lons, sane_lats)
}

/// Lift plain values into the masked representation accepted by [`sanitize`].
pub fn unmasked(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

fn keep_pair(lon: f64, lat: f64, policy: SanitizePolicy) -> bool {
    // NaN fails both range checks.
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return false;
    }
    !(policy.drop_zero_sentinel && (lon == 0.0 || lat == 0.0))
}
