//! Bounding rectangles for spatial secondary indexes.
//!
//! Stored values are parsed into rectangles by collecting every bracketed
//! `[…]` group: the first group is the min corner, the last is the max
//! corner, and a single group denotes a point (min == max). Coordinates are
//! whitespace-separated floats; `-inf` and `+inf` decode to the infinities.
//! This one rule covers `"[x y]"` points, `"[x1 y1],[x2 y2]"` rectangles and
//! the axis-suppressed `"[-inf min], [+inf max]"` interval form.

/// An axis-aligned bounding rectangle with one coordinate per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    /// Min corner, one value per dimension.
    pub min: Vec<f64>,
    /// Max corner, one value per dimension.
    pub max: Vec<f64>,
}

impl Rect {
    /// Build a rectangle from explicit corners.
    #[must_use]
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Self {
        Self { min, max }
    }

    /// Build a degenerate rectangle covering a single point.
    #[must_use]
    pub fn point(coords: Vec<f64>) -> Self {
        Self { min: coords.clone(), max: coords }
    }

    /// Parse a rectangle from its text form.
    ///
    /// Corners are normalized per dimension, so unordered corner pairs (a
    /// top-left / bottom-right rectangle, say) parse into a proper min/max
    /// pair. The parser is lenient: a value with no bracketed groups yields
    /// a zero-dimensional rectangle, which intersects everything.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let mut groups: Vec<Vec<f64>> = Vec::new();
        let mut rest = value;
        while let Some(start) = rest.find('[') {
            let Some(end) = rest[start..].find(']') else { break };
            let body = &rest[start + 1..start + end];
            groups.push(body.split_whitespace().map(parse_coord).collect());
            rest = &rest[start + end + 1..];
        }

        match (groups.first(), groups.last()) {
            (Some(first), Some(last)) => {
                let mut min = first.clone();
                let mut max = last.clone();
                for d in 0..min.len().min(max.len()) {
                    if min[d] > max[d] {
                        std::mem::swap(&mut min[d], &mut max[d]);
                    }
                }
                Self { min, max }
            }
            _ => Self { min: Vec::new(), max: Vec::new() },
        }
    }

    /// Number of dimensions of the min corner.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.min.len().min(self.max.len())
    }

    /// Whether two rectangles overlap on every shared dimension.
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        let dims = self.dims().min(other.dims());
        (0..dims).all(|d| self.min[d] <= other.max[d] && other.min[d] <= self.max[d])
    }

    /// The smallest rectangle containing both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let dims = self.dims().max(other.dims());
        let mut min = Vec::with_capacity(dims);
        let mut max = Vec::with_capacity(dims);
        for d in 0..dims {
            min.push(match (self.min.get(d), other.min.get(d)) {
                (Some(a), Some(b)) => a.min(*b),
                (Some(a), None) => *a,
                (None, Some(b)) => *b,
                (None, None) => 0.0,
            });
            max.push(match (self.max.get(d), other.max.get(d)) {
                (Some(a), Some(b)) => a.max(*b),
                (Some(a), None) => *a,
                (None, Some(b)) => *b,
                (None, None) => 0.0,
            });
        }
        Rect { min, max }
    }

    /// Area-like measure used when choosing an insertion subtree. Infinite
    /// extents collapse to a large finite span so enlargement comparisons
    /// stay meaningful.
    pub(crate) fn measure(&self) -> f64 {
        let mut area = 1.0;
        for d in 0..self.dims() {
            let span = self.max[d] - self.min[d];
            area *= if span.is_finite() { span.abs() } else { f64::MAX.sqrt() };
        }
        area
    }
}

fn parse_coord(token: &str) -> f64 {
    match token {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        other => other.parse().unwrap_or_default(),
    }
}
