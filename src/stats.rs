//! Descriptive statistics over sensor samples

use itertools::{Itertools, MinMaxResult};
use std::fmt;

fn finite(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().cloned().filter(|x| x.is_finite())
}

/// Mean, standard deviation and range of a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub n: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}
impl Stats {
    /// Returns `None` for an empty sample, NaN values are ignored
    pub fn new(values: &[f64]) -> Option<Self> {
        let (min, max) = match finite(values).minmax() {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(x) => (x, x),
            MinMaxResult::MinMax(a, b) => (a, b),
        };
        let n = finite(values).count();
        let mean = finite(values).sum::<f64>() / n as f64;
        let std = (finite(values).map(|x| x - mean).fold(0f64, |s, x| s + x * x) / n as f64).sqrt();
        Some(Self {
            n,
            mean,
            std,
            min,
            max,
        })
    }
}
impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>12.3} {:>12.3} {:>12.3} {:>12.3}",
            self.mean, self.std, self.min, self.max
        )
    }
}

/// Pearson correlation coefficient of paired samples
///
/// Pairs with a NaN on either side are dropped.
/// Returns `None` if less than 2 pairs remain or if either side is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let (mx, my) = pairs
        .iter()
        .fold((0f64, 0f64), |(sx, sy), (a, b)| (sx + a, sy + b));
    let (mx, my) = (mx / n, my / n);
    let (sxy, sxx, syy) = pairs.iter().fold((0f64, 0f64, 0f64), |(sxy, sxx, syy), (a, b)| {
        let (da, db) = (a - mx, b - my);
        (sxy + da * db, sxx + da * da, syy + db * db)
    });
    if sxx == 0f64 || syy == 0f64 {
        None
    } else {
        Some(sxy / (sxx * syy).sqrt())
    }
}

/// Equal-width binned frequencies
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// bin edges, one more than the number of bins
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}
impl Histogram {
    /// Splits the sample range into `n_bins` bins
    ///
    /// A constant sample is centered in a unit range.
    pub fn with_bins(values: &[f64], n_bins: usize) -> Option<Self> {
        if n_bins == 0 {
            return None;
        }
        let (lo, hi) = match finite(values).minmax() {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(x) => (x - 0.5, x + 0.5),
            MinMaxResult::MinMax(a, b) if a == b => (a - 0.5, b + 0.5),
            MinMaxResult::MinMax(a, b) => (a, b),
        };
        let width = (hi - lo) / n_bins as f64;
        let edges = (0..=n_bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0usize; n_bins];
        finite(values).for_each(|x| {
            let i = (((x - lo) / width) as usize).min(n_bins - 1);
            counts[i] += 1;
        });
        Some(Self { edges, counts })
    }
    /// Bins of `width` starting at 0 and covering the sample maximum
    ///
    /// Negative values fall outside of the bins and are not counted.
    pub fn with_width(values: &[f64], width: f64) -> Option<Self> {
        if !(width > 0f64) {
            return None;
        }
        let max = finite(values).fold(f64::NEG_INFINITY, f64::max);
        if max.is_infinite() {
            return None;
        }
        let n_bins = ((max / width).ceil() as usize).max(1);
        let edges = (0..=n_bins).map(|i| width * i as f64).collect();
        let mut counts = vec![0usize; n_bins];
        finite(values).filter(|x| *x >= 0f64).for_each(|x| {
            let i = ((x / width) as usize).min(n_bins - 1);
            counts[i] += 1;
        });
        Some(Self { edges, counts })
    }
    /// Counts the values falling within the given bin edges
    ///
    /// Used to bin several samples over the same edges.
    pub fn with_edges(values: &[f64], edges: &[f64]) -> Option<Self> {
        if edges.len() < 2 {
            return None;
        }
        let n_bins = edges.len() - 1;
        let (lo, hi) = (edges[0], edges[n_bins]);
        let mut counts = vec![0usize; n_bins];
        finite(values)
            .filter(|x| *x >= lo && *x <= hi)
            .for_each(|x| {
                let i = edges.partition_point(|e| *e <= x).saturating_sub(1);
                counts[i.min(n_bins - 1)] += 1;
            });
        Some(Self {
            edges: edges.to_vec(),
            counts,
        })
    }
    pub fn len(&self) -> usize {
        self.counts.len()
    }
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
    /// Iterator over `(lower edge, upper edge, count)`
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        self.edges
            .iter()
            .tuple_windows()
            .zip(self.counts.iter())
            .map(|((a, b), c)| (*a, *b, *c))
    }
    pub fn max_count(&self) -> usize {
        self.counts.iter().cloned().max().unwrap_or_default()
    }
}

/// Empirical cumulative distribution: sorted values and cumulative fraction
pub fn ecdf(values: &[f64]) -> Vec<(f64, f64)> {
    let mut x: Vec<f64> = finite(values).collect();
    x.sort_by(f64::total_cmp);
    let n = x.len() as f64;
    x.into_iter()
        .enumerate()
        .map(|(i, x)| (x, (i + 1) as f64 / n))
        .collect()
}

/// Five-number summary, quartiles linearly interpolated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}
impl Quartiles {
    pub fn new(values: &[f64]) -> Option<Self> {
        let mut x: Vec<f64> = finite(values).collect();
        if x.is_empty() {
            return None;
        }
        x.sort_by(f64::total_cmp);
        let quantile = |p: f64| {
            let pos = p * (x.len() - 1) as f64;
            let (lo, hi) = (pos.floor() as usize, pos.ceil() as usize);
            x[lo] + (pos - lo as f64) * (x[hi] - x[lo])
        };
        Some(Self {
            min: x[0],
            q1: quantile(0.25),
            median: quantile(0.5),
            q3: quantile(0.75),
            max: x[x.len() - 1],
        })
    }
    pub fn as_array(&self) -> [f64; 5] {
        [self.min, self.q1, self.median, self.q3, self.max]
    }
}
