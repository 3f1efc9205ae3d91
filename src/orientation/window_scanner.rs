
use crate::data_types::orientation::WindowScore;
use crate::orientation::kmer_index::KmerIndex;

/// Lazy scan over fixed, non-overlapping windows of a query sequence.
/// Each window is scored by the fraction of its k-mers found in the reference index.
/// The windows partition `[0, len)`; the final window may be shorter and is never dropped.
/// A clone keeps the current position, so cloning a fresh scanner replays the full scan.
#[derive(Clone)]
pub struct WindowScanner<'a> {
    /// The sequence being scanned
    query: &'a [u8],
    /// Reference k-mers
    index: &'a KmerIndex,
    /// Window width in bp
    window_size: usize,
    /// Minimum concordance for a window to pass, inclusive
    threshold: f64,
    /// Start of the next window
    next_start: usize
}

impl<'a> WindowScanner<'a> {
    /// Constructor
    /// # Arguments
    /// * `query` - the sequence to scan
    /// * `index` - k-mer index of the reference (or consensus)
    /// * `window_size` - window width; a value of 0 yields no windows
    /// * `threshold` - windows with concordance >= this pass
    pub fn new(query: &'a [u8], index: &'a KmerIndex, window_size: usize, threshold: f64) -> Self {
        Self {
            query, index, window_size, threshold,
            next_start: 0
        }
    }

    /// Scores a single window of the query.
    /// k-mers must be fully inside the window; ambiguous k-mers are not counted at all.
    fn score_window(&self, start: usize, end: usize) -> WindowScore {
        let window = &self.query[start..end];
        let (mut found, mut valid) = (0_usize, 0_usize);
        for hit in self.index.hits(window).into_iter().flatten() {
            valid += 1;
            if hit {
                found += 1;
            }
        }

        let concordance = if valid > 0 {
            Some(found as f64 / valid as f64)
        } else {
            // shorter than k, or nothing but ambiguous k-mers
            None
        };
        let passed = concordance.map(|c| c >= self.threshold);
        WindowScore { start, end, concordance, passed }
    }
}

impl Iterator for WindowScanner<'_> {
    type Item = WindowScore;

    fn next(&mut self) -> Option<Self::Item> {
        if self.window_size == 0 || self.next_start >= self.query.len() {
            return None;
        }

        let start = self.next_start;
        let end = (start + self.window_size).min(self.query.len());
        self.next_start = end;
        Some(self.score_window(start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.window_size == 0 {
            0
        } else {
            (self.query.len().saturating_sub(self.next_start)).div_ceil(self.window_size)
        };
        (remaining, Some(remaining))
    }
}

/// Mean concordance over the scored windows; None if no window could be scored
pub fn mean_concordance<'a>(scores: impl IntoIterator<Item = &'a WindowScore>) -> Option<f64> {
    let (total, count) = scores.into_iter()
        .filter_map(|w| w.concordance)
        .fold((0.0, 0_usize), |(t, c), v| (t + v, c + 1));
    if count > 0 {
        Some(total / count as f64)
    } else {
        None
    }
}
