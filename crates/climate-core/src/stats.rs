//! Single-pass summary statistics.

use serde::Serialize;

/// Average, extrema and sample count of a list of values.
///
/// An empty input reduces to the all-zero record rather than to an absent
/// value; callers that need to tell "nothing fetched" apart must do so before
/// reducing.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub count: usize,
}

/// Reduces `values` to [`Stats`] in one pass. No filtering happens here.
///
/// # Examples
///
/// ```
/// use climate_core::reduce;
///
/// let stats = reduce([1.0, 2.0, 3.0]);
/// assert_eq!(stats.average, 2.0);
/// assert_eq!(stats.count, 3);
/// ```
pub fn reduce<I>(values: I) -> Stats
where
    I: IntoIterator<Item = f64>,
{
    let mut values = values.into_iter();
    let Some(first) = values.next() else {
        return Stats::default();
    };

    let mut sum = first;
    let mut minimum = first;
    let mut maximum = first;
    let mut count = 1usize;

    for value in values {
        sum += value;
        if value < minimum {
            minimum = value;
        }
        if value > maximum {
            maximum = value;
        }
        count += 1;
    }

    Stats {
        average: sum / count as f64,
        minimum,
        maximum,
        count,
    }
}
