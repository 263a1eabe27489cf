// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Latency statistics over a group of span durations.

use serde::Serialize;

/// Rank-interpolated percentile of an ascending slice.
///
/// The rank is `pct/100 * (n - 1)`. A fractional rank interpolates linearly
/// between its neighbours and rounds half away from zero. Integer arithmetic
/// keeps ranks like `9.5` exact.
pub fn percentile(sorted: &[i64], pct: u32) -> Option<i64> {
    let last = sorted.len().checked_sub(1)?;
    let pct = u128::from(pct.min(100));

    let scaled = pct * last as u128;
    let lower = (scaled / 100) as usize;
    let remainder = (scaled % 100) as i128;

    let low = sorted[lower];
    if remainder == 0 {
        return Some(low);
    }

    let high = sorted[lower + 1];
    let delta = (i128::from(high) - i128::from(low)) * remainder;
    let offset = if delta >= 0 {
        (delta + 50) / 100
    } else {
        (delta - 50) / 100
    };
    Some((i128::from(low) + offset) as i64)
}

/// p95 and maximum of a set of durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationStats {
    pub p95_duration_ms: Option<i64>,
    pub max_duration_ms: Option<i64>,
}

impl DurationStats {
    /// Sort `durations` in place and derive the statistics.
    ///
    /// An empty set yields no statistics rather than zeros.
    pub fn from_durations(durations: &mut [i64]) -> Self {
        durations.sort_unstable();
        Self {
            p95_duration_ms: percentile(durations, 95),
            max_duration_ms: durations.last().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_p95_interpolates_between_ranks() {
        let mut durations = vec![100, 200, 300, 400, 500, 600, 700, 800, 900, 1000, 500];
        let stats = DurationStats::from_durations(&mut durations);

        assert_eq!(stats.p95_duration_ms, Some(950));
        assert_eq!(stats.max_duration_ms, Some(1000));
    }

    #[test]
    fn test_empty_durations_have_no_stats() {
        let stats = DurationStats::from_durations(&mut []);
        assert_eq!(stats, DurationStats::default());
        assert!(stats.p95_duration_ms.is_none());
    }

    #[test]
    fn test_single_duration() {
        let stats = DurationStats::from_durations(&mut [42]);
        assert_eq!(stats.p95_duration_ms, Some(42));
        assert_eq!(stats.max_duration_ms, Some(42));
    }

    #[test]
    fn test_integer_rank_takes_element() {
        // n = 21, rank = 0.95 * 20 = 19
        let sorted: Vec<i64> = (0..21).map(|i| i * 10).collect();
        assert_eq!(percentile(&sorted, 95), Some(190));
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        // n = 2, rank 0.95: 0 + 1 * 0.95 rounds to 1
        assert_eq!(percentile(&[0, 1], 95), Some(1));
        // rank 0.5: 10 + 5 * 0.5 = 12.5 rounds to 13
        assert_eq!(percentile(&[10, 15], 50), Some(13));
        // rank 0.5: 10 + 3 * 0.5 = 11.5 rounds to 12
        assert_eq!(percentile(&[10, 13], 50), Some(12));
    }

    #[test]
    fn test_extreme_percentiles() {
        let sorted = [3, 7, 9];
        assert_eq!(percentile(&sorted, 0), Some(3));
        assert_eq!(percentile(&sorted, 100), Some(9));
        assert_eq!(percentile(&[], 50), None);
    }
}
