//! Histogram snapshots and the diff-based quantile operator.

use crate::error::HistogramError;

/// One cumulative bucket: the count of samples with value `<= upper_bound`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// Inclusive upper bound of this bucket (`f64::INFINITY` for the last).
    pub upper_bound: f64,
    /// Cumulative count of samples at or below `upper_bound`.
    pub cumulative_count: i64,
}

/// A bucketed sample summary taken from one scrape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Sum of all observed sample values.
    pub sum: f64,
    /// Total sample count.
    pub count: i64,
    /// Cumulative buckets, sorted ascending by `upper_bound`.
    pub buckets: Vec<Bucket>,
}

impl Snapshot {
    /// Build a snapshot from an unsorted set of buckets, sorting them
    /// ascending by upper bound as the wire parser hands them over.
    pub fn new(sum: f64, count: i64, mut buckets: Vec<Bucket>) -> Self {
        buckets.sort_by(|a, b| {
            a.upper_bound
                .partial_cmp(&b.upper_bound)
                .expect("bucket upper bounds must be comparable")
        });
        Self { sum, count, buckets }
    }

    fn is_default(&self) -> bool {
        self.count == 0 && self.buckets.is_empty()
    }
}

/// Compute the `p`-th percentile (`1..=100`) over the samples that arrived
/// between `past` and `now`.
///
/// `past` may be [`Snapshot::default`] to mean "no prior scrape"; in that
/// case every bucket's prior count is treated as zero and the bucket-length
/// check is skipped. Otherwise `now` and `past` must have equal-length
/// bucket arrays.
pub fn quantile_in_diff(p: f64, now: &Snapshot, past: &Snapshot) -> Result<f64, HistogramError> {
    if !(1.0..=100.0).contains(&p) {
        return Err(HistogramError::InvalidInput(format!(
            "percentile must be in [1, 100], got {p}"
        )));
    }

    let past_is_default = past.is_default();
    if !past_is_default && past.buckets.len() != now.buckets.len() {
        return Err(HistogramError::InvalidInput(
            "bucket arrays must have the same length".to_string(),
        ));
    }

    let delta = now.count - past.count;
    if delta < 0 {
        return Err(HistogramError::InvalidInput(
            "cumulative count must be non-decreasing between past and now".to_string(),
        ));
    }
    if delta == 0 {
        return Ok(0.0);
    }

    let target_rank = ((delta as f64) * p / 100.0).ceil() as i64;
    let mut low_value = 0.0_f64;
    let mut prev_rank = 0_i64;

    for (i, bucket) in now.buckets.iter().enumerate() {
        let past_count = if past_is_default {
            0
        } else {
            past.buckets[i].cumulative_count
        };
        let rank = bucket.cumulative_count - past_count;
        if rank < prev_rank {
            return Err(HistogramError::InvalidInput(
                "cumulative bucket counts must be non-decreasing".to_string(),
            ));
        }

        if rank >= target_rank {
            let mut high_value = bucket.upper_bound;
            if high_value.is_infinite() {
                high_value = 2.0 * low_value;
            }
            let bucket_rank = rank - prev_rank;
            let value = if bucket_rank == 0 {
                high_value
            } else {
                let fraction = (target_rank - prev_rank) as f64 / bucket_rank as f64;
                low_value + fraction * (high_value - low_value)
            };
            return Ok(value);
        }

        prev_rank = rank;
        low_value = bucket.upper_bound;
    }

    Err(HistogramError::NotFound)
}
