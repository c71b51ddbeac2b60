//! Interval endpoints.
//!
//! A bound is either infinite or a finite value tagged open/closed. The
//! same finite value ranks differently depending on which side of an
//! interval it sits: as a left bound, `(0` lies strictly right of `[0`;
//! as a right bound, `0)` lies strictly left of `0]`. Comparisons are
//! therefore positional, via [`Bound::left_key`] and [`Bound::right_key`].

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    MinusInfinity,
    Finite { value: f64, closed: bool },
    PlusInfinity,
}

impl Bound {
    #[inline]
    pub fn closed(value: f64) -> Self {
        Self::Finite { value, closed: true }
    }

    #[inline]
    pub fn open(value: f64) -> Self {
        Self::Finite { value, closed: false }
    }

    /// Finite value, or the signed infinity this bound stands for.
    #[inline]
    pub fn value(self) -> f64 {
        match self {
            Self::MinusInfinity => f64::NEG_INFINITY,
            Self::Finite { value, .. } => value,
            Self::PlusInfinity => f64::INFINITY,
        }
    }

    /// Whether the bound value itself belongs to the interval.
    /// Infinite bounds are never attained.
    #[inline]
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Finite { closed: true, .. })
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        matches!(self, Self::Finite { .. })
    }

    /// Positional key when used as a left bound: an open left bound sits
    /// just right of the closed one at the same value.
    #[inline]
    pub fn left_key(self) -> (f64, i8) {
        match self {
            Self::MinusInfinity => (f64::NEG_INFINITY, 0),
            Self::Finite { value, closed } => (value, if closed { 0 } else { 1 }),
            Self::PlusInfinity => (f64::INFINITY, 0),
        }
    }

    /// Positional key when used as a right bound: an open right bound sits
    /// just left of the closed one at the same value.
    #[inline]
    pub fn right_key(self) -> (f64, i8) {
        match self {
            Self::MinusInfinity => (f64::NEG_INFINITY, 0),
            Self::Finite { value, closed } => (value, if closed { 0 } else { -1 }),
            Self::PlusInfinity => (f64::INFINITY, 0),
        }
    }

    #[inline]
    pub fn cmp_as_left(self, other: Self) -> Ordering {
        cmp_key(self.left_key(), other.left_key())
    }

    #[inline]
    pub fn cmp_as_right(self, other: Self) -> Ordering {
        cmp_key(self.right_key(), other.right_key())
    }

    /// Negation flips direction: a left bound becomes a right bound of the
    /// reflected interval and vice versa. Openness is preserved.
    #[inline]
    pub fn neg(self) -> Self {
        match self {
            Self::MinusInfinity => Self::PlusInfinity,
            Self::PlusInfinity => Self::MinusInfinity,
            Self::Finite { value, closed } => Self::Finite { value: -value, closed },
        }
    }

    /// Sum of two same-side bounds. Any infinite operand dominates; a finite
    /// sum is attained only when both operands are.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        match (self, other) {
            (Self::MinusInfinity, _) | (_, Self::MinusInfinity) => Self::MinusInfinity,
            (Self::PlusInfinity, _) | (_, Self::PlusInfinity) => Self::PlusInfinity,
            (
                Self::Finite { value: a, closed: ca },
                Self::Finite { value: b, closed: cb },
            ) => Self::Finite { value: a + b, closed: ca && cb },
        }
    }

    /// Builds a bound from a raw value, mapping infinities onto the infinite
    /// variants (which are open by nature).
    #[inline]
    pub fn from_value(value: f64, closed: bool) -> Self {
        if value == f64::NEG_INFINITY {
            Self::MinusInfinity
        } else if value == f64::INFINITY {
            Self::PlusInfinity
        } else {
            Self::Finite { value, closed }
        }
    }
}

#[inline]
fn cmp_key(a: (f64, i8), b: (f64, i8)) -> Ordering {
    a.0.partial_cmp(&b.0)
        .unwrap_or(Ordering::Equal)
        .then(a.1.cmp(&b.1))
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MinusInfinity => write!(f, "-inf"),
            Self::PlusInfinity => write!(f, "+inf"),
            Self::Finite { value, closed } => {
                write!(f, "{value}{}", if *closed { "" } else { "*" })
            }
        }
    }
}
