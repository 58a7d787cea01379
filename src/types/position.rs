use std::cmp::Ordering;
use std::fmt;

use super::error::PositionError;

/// A location in source text.
///
/// Lines are 1-based, columns are 0-based character offsets within the line.
/// Points order lexicographically by `(line, column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Point {
    pub line: u32,
    pub column: u32,
}

impl Point {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    #[must_use]
    pub fn is_before(&self, other: &Point) -> bool {
        self < other
    }

    #[must_use]
    pub fn is_after(&self, other: &Point) -> bool {
        self > other
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.line, self.column)
    }
}

/// How two positions in the same file relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Before,
    After,
    Overlapping,
}

/// A half-open source range `start..end`, with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    start: Point,
    end: Point,
}

impl Position {
    /// Build a position from two points.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::Reversed`] if `start` lies after `end`.
    pub fn new(start: Point, end: Point) -> Result<Self, PositionError> {
        if start > end {
            return Err(PositionError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    /// Build a position from raw coordinates.
    ///
    /// # Errors
    ///
    /// Same as [`Position::new`].
    pub fn from_coords(
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Result<Self, PositionError> {
        Self::new(
            Point::new(start_line, start_column),
            Point::new(end_line, end_column),
        )
    }

    /// The empty position `[0,0]-[0,0]`, used when no location is known.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            start: Point::new(0, 0),
            end: Point::new(0, 0),
        }
    }

    #[must_use]
    pub fn start(&self) -> Point {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> Point {
        self.end
    }

    /// Entirely before `other`: this ends before the other starts.
    #[must_use]
    pub fn is_before(&self, other: &Position) -> bool {
        self.end.is_before(&other.start)
    }

    /// Entirely after `other`: this starts after the other ends.
    #[must_use]
    pub fn is_after(&self, other: &Position) -> bool {
        self.start.is_after(&other.end)
    }

    #[must_use]
    pub fn starts_before(&self, other: &Position) -> bool {
        self.start.is_before(&other.start)
    }

    #[must_use]
    pub fn ends_after(&self, other: &Position) -> bool {
        self.end.is_after(&other.end)
    }

    /// Inclusive containment: `other` lies within this range, bounds included.
    #[must_use]
    pub fn contains(&self, other: &Position) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    #[must_use]
    pub fn relation(&self, other: &Position) -> Relation {
        if self.is_before(other) {
            Relation::Before
        } else if self.is_after(other) {
            Relation::After
        } else {
            Relation::Overlapping
        }
    }

    /// Order by start point, then by end point.
    #[must_use]
    pub fn cmp_start(&self, other: &Position) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.end.cmp(&other.end))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(sl: u32, sc: u32, el: u32, ec: u32) -> Position {
        Position::from_coords(sl, sc, el, ec).unwrap()
    }

    #[test]
    fn point_ordering_is_lexicographic() {
        assert!(Point::new(1, 9).is_before(&Point::new(2, 0)));
        assert!(Point::new(2, 1).is_after(&Point::new(2, 0)));
        assert!(!Point::new(3, 3).is_before(&Point::new(3, 3)));
    }

    #[test]
    fn reversed_position_rejected() {
        let err = Position::from_coords(2, 0, 1, 5).unwrap_err();
        assert_eq!(
            err.to_string(),
            "position start [2,0] lies after end [1,5]"
        );
    }

    #[test]
    fn before_and_after() {
        let a = pos(1, 0, 1, 4);
        let b = pos(2, 0, 2, 8);
        assert!(a.is_before(&b));
        assert!(b.is_after(&a));
        assert_eq!(a.relation(&b), Relation::Before);
        assert_eq!(b.relation(&a), Relation::After);
    }

    #[test]
    fn touching_ranges_overlap() {
        let a = pos(1, 0, 1, 4);
        let b = pos(1, 4, 1, 9);
        assert_eq!(a.relation(&b), Relation::Overlapping);
    }

    #[test]
    fn containment_is_inclusive() {
        let outer = pos(1, 0, 5, 1);
        let inner = pos(1, 0, 2, 3);
        assert!(outer.contains(&inner));
        assert!(outer.contains(&outer));
        assert!(!inner.contains(&outer));
        assert!(outer.ends_after(&inner));
        assert!(!outer.starts_before(&inner));
    }

    #[test]
    fn display_format() {
        assert_eq!(pos(1, 2, 3, 4).to_string(), "[1,2]-[3,4]");
        assert_eq!(Position::unknown().to_string(), "[0,0]-[0,0]");
    }
}
