//! A `Number` is the scalar carried by image pixels.

use std::fmt::{Debug, Display};

use num_traits::{PrimInt, Saturating};

/// The trait bound for pixel intensities.
///
/// The tree algorithm is defined over a discrete intensity range, so pixel
/// scalars are primitive integers. The conversion methods keep everything
/// downstream of the image buffer non-generic: nodes carry levels as `i64`,
/// running sums are accumulated in `i64`, and derived statistics live in
/// `f64`.
pub trait Number: PrimInt + Saturating + Debug + Display + Send + Sync {
    /// The scalar widened to `i64`.
    fn as_i64(self) -> i64;

    /// The scalar as an `f64`.
    fn as_f64(self) -> f64;

    /// Narrows an `i64` back to the scalar type.
    ///
    /// Values produced by the tree (node levels) always originated from this
    /// type, so the cast is lossless in practice.
    fn from_i64(value: i64) -> Self;
}

macro_rules! impl_number {
    ($($ty:ty),*) => {
        $(impl Number for $ty {
            fn as_i64(self) -> i64 {
                self as i64
            }

            fn as_f64(self) -> f64 {
                self as f64
            }

            fn from_i64(value: i64) -> Self {
                value as $ty
            }
        })*
    };
}

impl_number!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

#[cfg(test)]
mod tests {
    use super::Number;

    #[test]
    fn test_casts() {
        assert_eq!(250_u8.as_i64(), 250);
        assert_eq!(u8::from_i64(250), 250);
        assert_eq!(65_535_u16.as_i64(), 65_535);
        assert_eq!(7_u32.as_f64(), 7.0);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(<u8 as num_traits::Bounded>::max_value(), 255);
        assert_eq!(<u16 as num_traits::Bounded>::max_value(), 65_535);
        assert_eq!(<u8 as num_traits::Bounded>::min_value(), 0);
    }
}
