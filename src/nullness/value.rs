use std::fmt;

use crate::dataflow::worklist::AbstractValue;

/// Nullability of a value, ordered `Bottom < {Null, NonNull} < Nullable`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Nullness {
    /// Infeasible path.
    Bottom,
    Null,
    NonNull,
    /// Either, or unknown.
    Nullable,
}

impl Nullness {
    pub(crate) fn least_upper_bound(self, other: Nullness) -> Nullness {
        if self == other {
            return self;
        }
        match (self, other) {
            (Nullness::Bottom, value) | (value, Nullness::Bottom) => value,
            _ => Nullness::Nullable,
        }
    }

    pub(crate) fn greatest_lower_bound(self, other: Nullness) -> Nullness {
        if self == other {
            return self;
        }
        match (self, other) {
            (Nullness::Nullable, value) | (value, Nullness::Nullable) => value,
            _ => Nullness::Bottom,
        }
    }

    /// What can be concluded about a value proven different from one with this nullness.
    ///
    /// Only inequality with a definite null tells anything: the other side is non-null.
    pub(crate) fn deduced_value_when_not_equal(self) -> Nullness {
        match self {
            Nullness::Null => Nullness::NonNull,
            Nullness::NonNull | Nullness::Nullable => Nullness::Nullable,
            Nullness::Bottom => Nullness::Bottom,
        }
    }
}

impl AbstractValue for Nullness {
    fn least_upper_bound(self, other: Self) -> Self {
        Nullness::least_upper_bound(self, other)
    }
}

impl fmt::Display for Nullness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Nullness::Bottom => "Bottom (always throws)",
            Nullness::Null => "Null",
            Nullness::NonNull => "Non-null",
            Nullness::Nullable => "Nullable",
        };
        f.write_str(text)
    }
}
