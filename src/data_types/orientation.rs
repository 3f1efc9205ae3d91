
use serde::Serialize;

/// Which variant of a span was kept
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, strum_macros::AsRefStr, strum_macros::Display)]
pub enum Orientation {
    /// The span as assembled
    #[strum(serialize = "original")]
    #[serde(rename = "original")]
    Original,
    /// The span replaced by its reverse complement in place
    #[strum(serialize = "reverse_complement")]
    #[serde(rename = "reverse_complement")]
    ReverseComplemented
}

impl Orientation {
    /// The other orientation
    pub fn opposite(&self) -> Self {
        match self {
            Orientation::Original => Orientation::ReverseComplemented,
            Orientation::ReverseComplemented => Orientation::Original
        }
    }
}

/// Concordance for a single scan window
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowScore {
    /// First included base, 0-based
    pub start: usize,
    /// First excluded base
    pub end: usize,
    /// Fraction of valid window k-mers found in the reference; None if the window could not be scored
    pub concordance: Option<f64>,
    /// concordance >= threshold; None if the window could not be scored
    pub passed: Option<bool>
}

impl WindowScore {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Only scored windows below the threshold count as failing
    pub fn is_failing(&self) -> bool {
        self.passed == Some(false)
    }
}

/// A contiguous half-open span of a sequence
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the two spans share at least one base
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Record of one re-orientation trial, written whether or not the span was flipped
#[derive(Clone, Debug, PartialEq)]
pub struct OrientationDecision {
    /// The failing span found by merging windows
    pub detected_span: Span,
    /// The span that was actually trialed, after edge refinement
    pub trial_span: Span,
    /// The orientation that was kept
    pub chosen: Orientation,
    /// Mean concordance of the original variant over the rescoring region
    pub original_score: f64,
    /// Mean concordance of the reverse-complemented variant over the rescoring region
    pub flipped_score: f64,
    /// Which repair pass produced the decision, 1-based
    pub pass: usize
}

impl OrientationDecision {
    pub fn is_flipped(&self) -> bool {
        self.chosen == Orientation::ReverseComplemented
    }
}

/// The losing variant of a decision, kept for downstream comparison
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchivedVariant {
    /// Coordinates of the variant in the final sequence
    pub span: Span,
    /// The orientation of the rejected bases
    pub orientation: Orientation,
    /// The rejected bases
    pub bases: Vec<u8>
}

/// Why a failing span was left in place
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum_macros::AsRefStr, strum_macros::Display, strum_macros::EnumIter)]
pub enum UnresolvedReason {
    /// At or below the minimum flip span, either as detected or after edge refinement
    #[strum(serialize = "too_short")]
    #[serde(rename = "too_short")]
    TooShort,
    /// Long enough, but it only showed up after the last repair pass
    #[strum(serialize = "pass_limit_reached")]
    #[serde(rename = "pass_limit_reached")]
    PassLimitReached,
    /// Trialed, but the reverse complement did not score better
    #[strum(serialize = "reorientation_not_better")]
    #[serde(rename = "reorientation_not_better")]
    ReorientationNotBetter
}

/// A failing span that is still in the final sequence
#[derive(Clone, Debug, PartialEq)]
pub struct UnresolvedSpan {
    /// Refined breakpoints when known, otherwise the window-aligned span
    pub span: Span,
    /// Mean concordance of the failing windows
    pub mean_concordance: f64,
    /// Reference regions overlapping the span, for the reviewer's benefit
    pub reference_regions: Vec<String>,
    pub reason: UnresolvedReason
}
