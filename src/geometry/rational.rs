//! Exact fractions for aspect-ratio math.
//!
//! A [`Rational`] is always stored in lowest terms with the sign carried by the
//! numerator, so equality and hashing are plain structural comparisons. The
//! pair `0/0` is the single [`Rational::UNDEFINED`] value: any fraction with a
//! zero denominator collapses to it on construction. That is a normalization,
//! not an error.
//!
//! Arithmetic is carried out in `i64` and narrowed back to `i32` after
//! reduction. A result that does not fit fails with [`ArithmeticOverflow`].
//!
//! ```
//! # use variant_engine::geometry::Rational;
//! let tv = Rational::of(4, 3).unwrap();
//! assert_eq!(tv.multiply(tv).unwrap(), Rational::of(16, 9).unwrap());
//! assert_eq!(Rational::of(-8, -6).unwrap(), tv);
//! assert_eq!(Rational::of(7, 0).unwrap(), Rational::UNDEFINED);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A rational operation whose reduced result does not fit in 32 bits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation}({lhs}, {rhs}) cannot be represented as a 32-bit fraction")]
pub struct ArithmeticOverflow {
    /// Name of the operation that overflowed (`of`, `multiply`, `divide`, `add_integer`).
    pub operation: &'static str,
    pub lhs: String,
    pub rhs: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseRationalError {
    #[error("ratio should be of pattern \"p/q\", got {0:?}")]
    Format(String),
    #[error(transparent)]
    Overflow(#[from] ArithmeticOverflow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    p: i32,
    q: i32,
}

impl Rational {
    pub const UNDEFINED: Rational = Rational { p: 0, q: 0 };
    pub const ONE: Rational = Rational { p: 1, q: 1 };

    /// Build `p/q` in lowest terms.
    ///
    /// Fails only when normalizing the sign pushes a component out of range,
    /// e.g. `of(i32::MIN, -1)`.
    pub fn of(p: i32, q: i32) -> Result<Self, ArithmeticOverflow> {
        Self::narrow(i64::from(p), i64::from(q), "of", p, q)
    }

    /// A whole number `n/1`.
    pub const fn integer(n: i32) -> Self {
        Self { p: n, q: 1 }
    }

    /// Aspect ratio of a `width x height` box.
    pub fn from_dimensions(width: u32, height: u32) -> Result<Self, ArithmeticOverflow> {
        Self::narrow(i64::from(width), i64::from(height), "of", width, height)
    }

    pub fn numerator(self) -> i32 {
        self.p
    }

    pub fn denominator(self) -> i32 {
        self.q
    }

    pub fn is_undefined(self) -> bool {
        self.q == 0
    }

    pub fn is_integer(self) -> bool {
        self.q == 1
    }

    pub fn is_negative(self) -> bool {
        self.p < 0
    }

    /// `p > q`: landscape.
    pub fn is_larger_on_width(self) -> bool {
        self.p > self.q
    }

    /// `p < q`: portrait. A square ratio is larger on neither side.
    pub fn is_larger_on_height(self) -> bool {
        self.p < self.q
    }

    pub fn multiply(self, other: Rational) -> Result<Self, ArithmeticOverflow> {
        let p = i64::from(self.p) * i64::from(other.p);
        let q = i64::from(self.q) * i64::from(other.q);
        Self::narrow(p, q, "multiply", self, other)
    }

    /// Division by zero yields [`Rational::UNDEFINED`].
    pub fn divide(self, other: Rational) -> Result<Self, ArithmeticOverflow> {
        let p = i64::from(self.p) * i64::from(other.q);
        let q = i64::from(self.q) * i64::from(other.p);
        Self::narrow(p, q, "divide", self, other)
    }

    pub fn add_integer(self, addend: i32) -> Result<Self, ArithmeticOverflow> {
        let p = i64::from(self.q) * i64::from(addend) + i64::from(self.p);
        Self::narrow(p, i64::from(self.q), "add_integer", self, addend)
    }

    /// Width matching `height` under this ratio, rounded to the nearest pixel.
    pub fn calculate_width_for_height(self, height: u32) -> u32 {
        if self.is_undefined() {
            return 0;
        }
        scale_rounded(height, self.p, self.q)
    }

    /// Height matching `width` under this ratio, rounded to the nearest pixel.
    pub fn calculate_height_for_width(self, width: u32) -> u32 {
        if self.p == 0 {
            return 0;
        }
        scale_rounded(width, self.q, self.p)
    }

    pub fn to_f64(self) -> f64 {
        if self.is_undefined() {
            return f64::NAN;
        }
        f64::from(self.p) / f64::from(self.q)
    }

    /// Sign normalization, gcd reduction and the 32-bit bounds check shared
    /// by every constructor and operation.
    fn narrow(
        p: i64,
        q: i64,
        operation: &'static str,
        lhs: impl fmt::Display,
        rhs: impl fmt::Display,
    ) -> Result<Self, ArithmeticOverflow> {
        if q == 0 {
            return Ok(Self::UNDEFINED);
        }
        let (p, q) = if q < 0 { (-p, -q) } else { (p, q) };
        // q != 0, so the gcd is at least 1
        let divisor = gcd(p.unsigned_abs(), q.unsigned_abs()) as i64;
        match (i32::try_from(p / divisor), i32::try_from(q / divisor)) {
            (Ok(p), Ok(q)) => Ok(Self { p, q }),
            _ => Err(ArithmeticOverflow {
                operation,
                lhs: lhs.to_string(),
                rhs: rhs.to_string(),
            }),
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn scale_rounded(value: u32, numerator: i32, denominator: i32) -> u32 {
    let scaled = (f64::from(value) * f64::from(numerator)) / f64::from(denominator);
    scaled.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

impl Ord for Rational {
    /// [`Rational::UNDEFINED`] sorts before every defined value.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_undefined(), other.is_undefined()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            // Denominators are positive, so cross-multiplication keeps the order
            (false, false) => (i64::from(self.p) * i64::from(other.q))
                .cmp(&(i64::from(other.p) * i64::from(self.q))),
        }
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            f.write_str("undefined")
        } else {
            write!(f, "{}/{}", self.p, self.q)
        }
    }
}

impl FromStr for Rational {
    type Err = ParseRationalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_error = || ParseRationalError::Format(s.to_string());
        let (p, q) = s.trim().split_once('/').ok_or_else(format_error)?;
        let p: i32 = p.trim().parse().map_err(|_| format_error())?;
        let q: i32 = q.trim().parse().map_err(|_| format_error())?;
        Ok(Rational::of(p, q)?)
    }
}
