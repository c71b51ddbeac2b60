//! Single real intervals with open/closed endpoints.

use std::cmp::Ordering;

use crate::domain::bound::Bound;

/// An ordered pair of bounds, `lb <= rb` positionally. A singleton has both
/// bounds finite, closed and equal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lb: Bound,
    pub rb: Bound,
}

impl Interval {
    #[inline]
    pub fn new(lb: Bound, rb: Bound) -> Self {
        debug_assert!(
            lb.left_key().0 <= rb.right_key().0,
            "interval bounds out of order: {lb} > {rb}"
        );
        Self { lb, rb }
    }

    #[inline]
    pub fn singleton(value: f64) -> Self {
        Self { lb: Bound::closed(value), rb: Bound::closed(value) }
    }

    #[inline]
    pub fn real_line() -> Self {
        Self { lb: Bound::MinusInfinity, rb: Bound::PlusInfinity }
    }

    /// The strictly positive half-line `(0, +inf)`.
    #[inline]
    pub fn positive() -> Self {
        Self { lb: Bound::open(0.0), rb: Bound::PlusInfinity }
    }

    /// The non-negative half-line `[0, +inf)`.
    #[inline]
    pub fn non_negative() -> Self {
        Self { lb: Bound::closed(0.0), rb: Bound::PlusInfinity }
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.lb.is_closed() && self.rb.is_closed() && self.lb.value() == self.rb.value()
    }

    #[inline]
    pub fn is_singleton_of(&self, value: f64) -> bool {
        self.is_singleton() && self.lb.value() == value
    }

    #[inline]
    pub fn contains(&self, x: f64) -> bool {
        let above_lb = match self.lb {
            Bound::MinusInfinity => true,
            Bound::Finite { value, closed } => x > value || (closed && x == value),
            Bound::PlusInfinity => false,
        };
        let below_rb = match self.rb {
            Bound::MinusInfinity => false,
            Bound::Finite { value, closed } => x < value || (closed && x == value),
            Bound::PlusInfinity => true,
        };
        above_lb && below_rb
    }

    /// Whether `self.rb` touches or overlaps `next.lb`, i.e. the union of the
    /// two intervals has no hole between them. `(0,1)` followed by `(1,2)`
    /// leaves the hole `{1}` and does not connect; either endpoint closed
    /// makes them connect.
    #[inline]
    pub fn connects_to(&self, next: &Interval) -> bool {
        match (self.rb, next.lb) {
            (Bound::PlusInfinity, _) | (_, Bound::MinusInfinity) => true,
            (Bound::MinusInfinity, _) | (_, Bound::PlusInfinity) => false,
            (
                Bound::Finite { value: r, closed: rc },
                Bound::Finite { value: l, closed: lc },
            ) => match r.partial_cmp(&l) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Less) => false,
                _ => rc || lc,
            },
        }
    }

    // --- arithmetic ---

    #[inline]
    pub fn neg(&self) -> Interval {
        Interval { lb: self.rb.neg(), rb: self.lb.neg() }
    }

    #[inline]
    pub fn add(&self, other: &Interval) -> Interval {
        Interval { lb: self.lb.add(other.lb), rb: self.rb.add(other.rb) }
    }

    #[inline]
    pub fn sub(&self, other: &Interval) -> Interval {
        self.add(&other.neg())
    }

    /// Interval product via the four endpoint candidates. The product of a
    /// bilinear form over a box attains its extrema at corners, which holds
    /// in the limit for infinite endpoints as well. A zero factor kills an
    /// infinite one.
    pub fn mul(&self, other: &Interval) -> Interval {
        if self.is_singleton_of(0.0) || other.is_singleton_of(0.0) {
            return Interval::singleton(0.0);
        }

        let xs = [
            (self.lb.value(), self.lb.is_closed()),
            (self.rb.value(), self.rb.is_closed()),
        ];
        let ys = [
            (other.lb.value(), other.lb.is_closed()),
            (other.rb.value(), other.rb.is_closed()),
        ];

        let mut candidates = [(0.0_f64, false); 4];
        let mut k = 0;
        for &(x, xc) in &xs {
            for &(y, yc) in &ys {
                let (v, c) = if x == 0.0 && y == 0.0 {
                    (0.0, xc && yc)
                } else if x == 0.0 {
                    // 0 * anything = 0, attained whenever the zero endpoint is.
                    (0.0, xc)
                } else if y == 0.0 {
                    (0.0, yc)
                } else {
                    (x * y, xc && yc)
                };
                candidates[k] = (v, c);
                k += 1;
            }
        }

        hull(&candidates)
    }

    /// Reciprocal of an interval that does not contain zero.
    pub fn recip(&self) -> Interval {
        let lb = match self.rb {
            Bound::PlusInfinity => Bound::open(0.0),
            Bound::Finite { value, closed } => {
                if value == 0.0 {
                    // Interval of the form (x, 0): reciprocal reaches -inf.
                    Bound::MinusInfinity
                } else {
                    Bound::Finite { value: 1.0 / value, closed }
                }
            }
            Bound::MinusInfinity => Bound::open(0.0),
        };
        let rb = match self.lb {
            Bound::MinusInfinity => Bound::open(0.0),
            Bound::Finite { value, closed } => {
                if value == 0.0 {
                    Bound::PlusInfinity
                } else {
                    Bound::Finite { value: 1.0 / value, closed }
                }
            }
            Bound::PlusInfinity => Bound::open(0.0),
        };
        Interval::new(lb, rb)
    }

    /// Elementwise minimum of two intervals.
    pub fn dmin(&self, other: &Interval) -> Interval {
        // Lower end: the smaller left bound, attained when it is.
        let lb = match self.lb.cmp_as_left(other.lb) {
            Ordering::Less => self.lb,
            Ordering::Greater => other.lb,
            Ordering::Equal => or_closed_left(self.lb, other.lb),
        };
        // Upper end: min of the sups; at a tie both must be attained.
        let rb = match self.rb.cmp_as_right(other.rb) {
            Ordering::Less => self.rb,
            Ordering::Greater => other.rb,
            Ordering::Equal => and_closed_right(self.rb, other.rb),
        };
        Interval::new(lb, rb)
    }

    /// Elementwise maximum of two intervals.
    pub fn dmax(&self, other: &Interval) -> Interval {
        let lb = match self.lb.cmp_as_left(other.lb) {
            Ordering::Less => other.lb,
            Ordering::Greater => self.lb,
            Ordering::Equal => and_closed_left(self.lb, other.lb),
        };
        let rb = match self.rb.cmp_as_right(other.rb) {
            Ordering::Less => other.rb,
            Ordering::Greater => self.rb,
            Ordering::Equal => or_closed_right(self.rb, other.rb),
        };
        Interval::new(lb, rb)
    }

    /// Image under a monotone-enough scalar function. If an endpoint maps to
    /// NaN the interval strays outside the function's domain and the caller's
    /// fallback applies instead.
    pub fn apply_fn(&self, f: impl Fn(f64) -> f64, fallback: &Interval) -> Interval {
        let flo = f(self.lb.value());
        let fhi = f(self.rb.value());
        if flo.is_nan() || fhi.is_nan() {
            return *fallback;
        }
        hull(&[(flo, self.lb.is_closed()), (fhi, self.rb.is_closed())])
    }

    /// Image under a binary scalar function, via the four corners.
    pub fn apply_fn2(
        &self,
        f: impl Fn(f64, f64) -> f64,
        other: &Interval,
        fallback: &Interval,
    ) -> Interval {
        let mut candidates = [(0.0_f64, false); 4];
        let mut k = 0;
        for &(x, xc) in &[
            (self.lb.value(), self.lb.is_closed()),
            (self.rb.value(), self.rb.is_closed()),
        ] {
            for &(y, yc) in &[
                (other.lb.value(), other.lb.is_closed()),
                (other.rb.value(), other.rb.is_closed()),
            ] {
                let v = f(x, y);
                if v.is_nan() {
                    return *fallback;
                }
                candidates[k] = (v, xc && yc);
                k += 1;
            }
        }
        hull(&candidates)
    }
}

/// Smallest interval covering a set of (value, attained) candidates.
fn hull(candidates: &[(f64, bool)]) -> Interval {
    let mut lo = f64::INFINITY;
    let mut lo_closed = false;
    let mut hi = f64::NEG_INFINITY;
    let mut hi_closed = false;
    for &(v, c) in candidates {
        if v < lo {
            lo = v;
            lo_closed = c;
        } else if v == lo {
            lo_closed |= c;
        }
        if v > hi {
            hi = v;
            hi_closed = c;
        } else if v == hi {
            hi_closed |= c;
        }
    }
    Interval::new(Bound::from_value(lo, lo_closed), Bound::from_value(hi, hi_closed))
}

#[inline]
fn or_closed_left(a: Bound, b: Bound) -> Bound {
    Bound::from_value(a.value(), a.is_closed() || b.is_closed())
}

#[inline]
fn and_closed_left(a: Bound, b: Bound) -> Bound {
    Bound::from_value(a.value(), a.is_closed() && b.is_closed())
}

#[inline]
fn or_closed_right(a: Bound, b: Bound) -> Bound {
    Bound::from_value(a.value(), a.is_closed() || b.is_closed())
}

#[inline]
fn and_closed_right(a: Bound, b: Bound) -> Bound {
    Bound::from_value(a.value(), a.is_closed() && b.is_closed())
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_singleton() {
            return write!(f, "{{{}}}", self.lb.value());
        }
        let lopen = if self.lb.is_closed() { '[' } else { '(' };
        let ropen = if self.rb.is_closed() { ']' } else { ')' };
        write!(f, "{lopen}{}, {}{ropen}", self.lb.value(), self.rb.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_respects_openness() {
        let i = Interval::new(Bound::open(0.0), Bound::closed(1.0));
        assert!(!i.contains(0.0));
        assert!(i.contains(0.5));
        assert!(i.contains(1.0));
        assert!(!i.contains(1.1));
    }

    #[test]
    fn adjacency_detects_holes() {
        let a = Interval::new(Bound::open(0.0), Bound::open(1.0));
        let b = Interval::new(Bound::open(1.0), Bound::open(2.0));
        let c = Interval::new(Bound::closed(1.0), Bound::closed(2.0));
        assert!(!a.connects_to(&b), "hole at 1 must be kept");
        assert!(a.connects_to(&c));
    }

    #[test]
    fn add_propagates_openness() {
        let a = Interval::new(Bound::closed(1.0), Bound::open(2.0));
        let b = Interval::singleton(3.0);
        let s = a.add(&b);
        assert_eq!(s.lb, Bound::closed(4.0));
        assert_eq!(s.rb, Bound::open(5.0));
    }

    #[test]
    fn mul_zero_singleton_absorbs() {
        let z = Interval::singleton(0.0);
        let any = Interval::real_line();
        assert!(z.mul(&any).is_singleton_of(0.0));
    }

    #[test]
    fn mul_half_line() {
        // [0, 1] * [2, +inf) = [0, +inf)
        let a = Interval::new(Bound::closed(0.0), Bound::closed(1.0));
        let b = Interval::new(Bound::closed(2.0), Bound::PlusInfinity);
        let p = a.mul(&b);
        assert_eq!(p.lb, Bound::closed(0.0));
        assert_eq!(p.rb, Bound::PlusInfinity);

        // (0, 1] * [2, +inf) = (0, +inf)
        let a = Interval::new(Bound::open(0.0), Bound::closed(1.0));
        let p = a.mul(&b);
        assert_eq!(p.lb, Bound::open(0.0));
    }

    #[test]
    fn mul_signed_box() {
        let a = Interval::new(Bound::closed(-2.0), Bound::closed(3.0));
        let b = Interval::singleton(5.0);
        let p = a.mul(&b);
        assert_eq!(p.lb, Bound::closed(-10.0));
        assert_eq!(p.rb, Bound::closed(15.0));
    }

    #[test]
    fn recip_of_positive_half_line() {
        // 1 / (0, +inf) = (0, +inf)
        let p = Interval::positive().recip();
        assert_eq!(p.lb, Bound::open(0.0));
        assert_eq!(p.rb, Bound::PlusInfinity);
    }

    #[test]
    fn dmin_dmax_of_overlapping() {
        let a = Interval::new(Bound::closed(0.0), Bound::closed(10.0));
        let b = Interval::new(Bound::closed(5.0), Bound::closed(20.0));
        let mn = a.dmin(&b);
        assert_eq!(mn.lb, Bound::closed(0.0));
        assert_eq!(mn.rb, Bound::closed(10.0));
        let mx = a.dmax(&b);
        assert_eq!(mx.lb, Bound::closed(5.0));
        assert_eq!(mx.rb, Bound::closed(20.0));
    }

    #[test]
    fn apply_fn_log_falls_back_outside_domain() {
        let neg = Interval::new(Bound::closed(-2.0), Bound::closed(-1.0));
        let fallback = Interval::real_line();
        assert_eq!(neg.apply_fn(f64::ln, &fallback), fallback);

        let pos = Interval::new(Bound::closed(1.0), Bound::closed(std::f64::consts::E));
        let img = pos.apply_fn(f64::ln, &fallback);
        assert_eq!(img.lb, Bound::closed(0.0));
        assert!((img.rb.value() - 1.0).abs() < 1.0e-12);
    }
}
