//! Sets of real intervals with arithmetic and membership queries.
//!
//! A [`Domain`] is the abstract value-set of a script expression or
//! variable: a strictly ordered, non-overlapping, non-adjacent collection
//! of intervals. The point of the algebra is to distinguish singletons
//! from continuous intervals (`{0} * (-inf, +inf)` is `{0}`), not to
//! compute the tightest possible ranges, so conservative widening is
//! acceptable wherever exactness is expensive.

mod bound;
mod interval;

pub use bound::Bound;
pub use interval::Interval;

use std::cmp::Ordering;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Normalized set of intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    intervals: Vec<Interval>,
}

impl Domain {
    /// The singleton `{value}`.
    pub fn singleton(value: f64) -> Self {
        Self { intervals: vec![Interval::singleton(value)] }
    }

    pub fn from_interval(interval: Interval) -> Self {
        Self { intervals: vec![interval] }
    }

    pub fn from_intervals(intervals: Vec<Interval>) -> Self {
        let mut d = Self { intervals };
        d.normalize();
        d
    }

    pub fn real_line() -> Self {
        Self::from_interval(Interval::real_line())
    }

    /// The strictly positive half-line, e.g. the numeraire's domain.
    pub fn positive() -> Self {
        Self::from_interval(Interval::positive())
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Union with another domain in place.
    pub fn add_domain(&mut self, other: &Domain) {
        self.intervals.extend_from_slice(&other.intervals);
        self.normalize();
    }

    /// Sort by left bound and merge overlapping or adjacent intervals,
    /// preserving genuine holes such as the missing point of
    /// `(0,1) ∪ (1,2)`.
    fn normalize(&mut self) {
        self.intervals
            .sort_by(|a, b| a.lb.cmp_as_left(b.lb).then(a.rb.cmp_as_right(b.rb)));
        let mut merged: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        for iv in self.intervals.drain(..) {
            match merged.last_mut() {
                Some(last) if last.connects_to(&iv) => {
                    if last.rb.cmp_as_right(iv.rb) == Ordering::Less {
                        last.rb = iv.rb;
                    }
                }
                _ => merged.push(iv),
            }
        }
        self.intervals = merged;
    }

    // --- queries ---

    /// All intervals are singletons.
    pub fn is_discrete(&self) -> bool {
        self.intervals.iter().all(Interval::is_singleton)
    }

    pub fn can_be_zero(&self) -> bool {
        self.intervals.iter().any(|iv| iv.contains(0.0))
    }

    pub fn can_be_nonzero(&self) -> bool {
        self.intervals.iter().any(|iv| !iv.is_singleton_of(0.0))
    }

    /// Whether the domain reaches a value `> 0` (`strict`) or `>= 0`.
    pub fn can_be_positive(&self, strict: bool) -> bool {
        self.intervals.iter().any(|iv| match iv.rb {
            Bound::PlusInfinity => true,
            Bound::Finite { value, closed } => {
                value > 0.0 || (!strict && value == 0.0 && closed)
            }
            Bound::MinusInfinity => false,
        }) || (!strict && self.can_be_zero())
    }

    /// Whether the domain reaches a value `< 0` (`strict`) or `<= 0`.
    pub fn can_be_negative(&self, strict: bool) -> bool {
        self.intervals.iter().any(|iv| match iv.lb {
            Bound::MinusInfinity => true,
            Bound::Finite { value, closed } => {
                value < 0.0 || (!strict && value == 0.0 && closed)
            }
            Bound::PlusInfinity => false,
        }) || (!strict && self.can_be_zero())
    }

    /// Zero is present as an isolated singleton, not interior to any
    /// interval. Normalization guarantees an adjacent singleton would have
    /// been merged away, so membership of `{0}` is the whole test.
    pub fn zero_is_discrete(&self) -> bool {
        self.intervals.iter().any(|iv| iv.is_singleton_of(0.0))
    }

    /// Left bound value of the leftmost sub-interval lying entirely right
    /// of zero (`strict`) or right of-or-touching zero.
    pub fn smallest_pos_lb(&self, strict: bool) -> Option<f64> {
        self.intervals
            .iter()
            .find(|iv| match iv.lb {
                Bound::Finite { value, closed } => {
                    value > 0.0 || (value == 0.0 && (!closed || !strict))
                }
                _ => false,
            })
            .map(|iv| iv.lb.value())
    }

    /// Right bound value of the rightmost sub-interval lying entirely left
    /// of zero (`strict`) or left of-or-touching zero.
    pub fn biggest_neg_rb(&self, strict: bool) -> Option<f64> {
        self.intervals
            .iter()
            .rev()
            .find(|iv| match iv.rb {
                Bound::Finite { value, closed } => {
                    value < 0.0 || (value == 0.0 && (!closed || !strict))
                }
                _ => false,
            })
            .map(|iv| iv.rb.value())
    }

    /// Smallest bound across the whole domain.
    pub fn min_bound(&self) -> Bound {
        self.intervals.first().map_or(Bound::MinusInfinity, |iv| iv.lb)
    }

    /// Largest bound across the whole domain.
    pub fn max_bound(&self) -> Bound {
        self.intervals.last().map_or(Bound::PlusInfinity, |iv| iv.rb)
    }

    // --- algebra ---

    fn pairwise(&self, other: &Domain, f: impl Fn(&Interval, &Interval) -> Interval) -> Domain {
        let mut out = Vec::with_capacity(self.intervals.len() * other.intervals.len());
        for a in &self.intervals {
            for b in &other.intervals {
                out.push(f(a, b));
            }
        }
        Domain::from_intervals(out)
    }

    /// Elementwise minimum.
    pub fn dmin(&self, other: &Domain) -> Domain {
        self.pairwise(other, Interval::dmin)
    }

    /// Elementwise maximum.
    pub fn dmax(&self, other: &Domain) -> Domain {
        self.pairwise(other, Interval::dmax)
    }

    /// Image under a monotone-enough scalar function, intervalwise;
    /// `fallback` stands in for intervals straying outside the function's
    /// domain.
    pub fn apply_fn(&self, f: impl Fn(f64) -> f64 + Copy, fallback: Interval) -> Domain {
        Domain::from_intervals(
            self.intervals.iter().map(|iv| iv.apply_fn(f, &fallback)).collect(),
        )
    }

    /// Binary variant of [`Domain::apply_fn`], e.g. for `pow`.
    pub fn apply_fn2(
        &self,
        f: impl Fn(f64, f64) -> f64 + Copy,
        other: &Domain,
        fallback: Interval,
    ) -> Domain {
        self.pairwise(other, |a, b| a.apply_fn2(f, b, &fallback))
    }
}

impl Add for &Domain {
    type Output = Domain;
    fn add(self, rhs: &Domain) -> Domain {
        self.pairwise(rhs, Interval::add)
    }
}

impl Sub for &Domain {
    type Output = Domain;
    fn sub(self, rhs: &Domain) -> Domain {
        self.pairwise(rhs, Interval::sub)
    }
}

impl Mul for &Domain {
    type Output = Domain;
    fn mul(self, rhs: &Domain) -> Domain {
        self.pairwise(rhs, Interval::mul)
    }
}

impl Div for &Domain {
    type Output = Domain;

    /// Division widens to the full real line whenever the divisor can be
    /// zero, the singleton `{0}` included: evaluation is total under IEEE
    /// semantics, so the algebra stays conservative instead of failing.
    fn div(self, rhs: &Domain) -> Domain {
        if rhs.can_be_zero() {
            return Domain::real_line();
        }
        self.pairwise(rhs, |a, b| a.mul(&b.recip()))
    }
}

impl Neg for &Domain {
    type Output = Domain;
    fn neg(self) -> Domain {
        Domain::from_intervals(self.intervals.iter().map(Interval::neg).collect())
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.intervals.is_empty() {
            return write!(f, "{{}}");
        }
        for (i, iv) in self.intervals.iter().enumerate() {
            if i > 0 {
                write!(f, " U ")?;
            }
            write!(f, "{iv}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(a: f64, b: f64) -> Interval {
        Interval::new(Bound::closed(a), Bound::closed(b))
    }

    #[test]
    fn normalization_merges_overlaps_and_keeps_holes() {
        let d = Domain::from_intervals(vec![
            closed(0.0, 2.0),
            closed(1.0, 3.0),
            Interval::new(Bound::open(5.0), Bound::open(6.0)),
            Interval::new(Bound::open(6.0), Bound::open(7.0)),
        ]);
        assert_eq!(d.intervals().len(), 3);
        assert_eq!(d.intervals()[0], closed(0.0, 3.0));
        // Hole at 6 preserved.
        assert!(!d.intervals()[1].contains(6.0));
    }

    #[test]
    fn adjacent_singleton_is_absorbed() {
        // (-1, 0) U {0} U (0, 1) is the continuous (-1, 1).
        let d = Domain::from_intervals(vec![
            Interval::new(Bound::open(-1.0), Bound::open(0.0)),
            Interval::singleton(0.0),
            Interval::new(Bound::open(0.0), Bound::open(1.0)),
        ]);
        assert_eq!(d.intervals().len(), 1);
        assert!(!d.zero_is_discrete());
        assert!(d.can_be_zero());
    }

    #[test]
    fn singleton_algebra_stays_exact() {
        let a = Domain::singleton(2.0);
        let b = Domain::singleton(3.0);
        assert!((&a + &b).is_discrete());
        assert_eq!(&a + &b, Domain::singleton(5.0));
        assert_eq!(&a * &b, Domain::singleton(6.0));
        assert_eq!(&a - &b, Domain::singleton(-1.0));
        assert_eq!(-&a, Domain::singleton(-2.0));
    }

    #[test]
    fn zero_singleton_times_real_line_is_zero() {
        let z = Domain::singleton(0.0);
        let r = Domain::real_line();
        assert_eq!(&z * &r, Domain::singleton(0.0));
    }

    #[test]
    fn division_by_possibly_zero_widens() {
        let a = Domain::singleton(1.0);
        let b = Domain::from_interval(closed(-1.0, 1.0));
        assert_eq!(&a / &b, Domain::real_line());

        let pos = Domain::positive();
        let q = &a / &pos;
        assert!(q.can_be_positive(true));
        assert!(!q.can_be_negative(false), "1/(0,inf) stays positive: {q}");
    }

    #[test]
    fn positivity_queries() {
        let d = Domain::from_intervals(vec![closed(-3.0, -1.0), Interval::singleton(0.0)]);
        assert!(!d.can_be_positive(true));
        assert!(d.can_be_positive(false), "0 counts when not strict");
        assert!(d.can_be_negative(true));
        assert!(d.zero_is_discrete());
    }

    #[test]
    fn nearest_subintervals_around_zero() {
        let d = Domain::from_intervals(vec![
            Interval::singleton(-2.0),
            Interval::singleton(0.0),
            Interval::singleton(5.0),
        ]);
        assert_eq!(d.smallest_pos_lb(true), Some(5.0));
        assert_eq!(d.biggest_neg_rb(true), Some(-2.0));

        let only_zero = Domain::singleton(0.0);
        assert_eq!(only_zero.smallest_pos_lb(true), None);
        assert_eq!(only_zero.biggest_neg_rb(true), None);
    }

    #[test]
    fn dmin_dmax_merge_pairs() {
        let a = Domain::from_interval(closed(0.0, 10.0));
        let b = Domain::singleton(5.0);
        let mn = a.dmin(&b);
        assert_eq!(mn.intervals()[0], closed(0.0, 5.0));
        let mx = a.dmax(&b);
        assert_eq!(mx.intervals()[0], closed(5.0, 10.0));
    }

    #[test]
    fn union_accumulates() {
        let mut d = Domain::singleton(1.0);
        d.add_domain(&Domain::singleton(2.0));
        assert_eq!(d.intervals().len(), 2);
        assert!(d.is_discrete());
    }

    #[test]
    fn display_is_compact() {
        let d = Domain::from_intervals(vec![
            Interval::singleton(0.0),
            Interval::new(Bound::open(1.0), Bound::PlusInfinity),
        ]);
        assert_eq!(d.to_string(), "{0} U (1, inf)");
    }
}
