//! Checked arithmetic for sequence numbers, heights and cursor positions.
//!
//! Queue bookkeeping must never wrap silently: an overflowing sequence
//! counter would reuse a sequence number, and a modulo by an empty queue
//! length would panic mid-block.

/// Error representing the failure of an arithmetic operation.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArithError {
    #[error("overflow")]
    Overflow,
    #[error("divide by zero")]
    DivisionByZero,
}

pub type Result<T> = std::result::Result<T, ArithError>;

/// Checked operations on the unsigned integers used for queue bookkeeping.
pub trait SafeArith<Rhs = Self>: Sized + Copy {
    /// Safe variant of `+` that guards against overflow.
    fn safe_add(&self, other: Rhs) -> Result<Self>;

    /// Safe variant of `-` that guards against underflow.
    fn safe_sub(&self, other: Rhs) -> Result<Self>;

    /// Safe variant of `%` that guards against division by 0.
    fn safe_rem(&self, other: Rhs) -> Result<Self>;
}

macro_rules! impl_safe_arith {
    ($typ:ty) => {
        impl SafeArith for $typ {
            #[inline]
            fn safe_add(&self, other: Self) -> Result<Self> {
                self.checked_add(other).ok_or(ArithError::Overflow)
            }

            #[inline]
            fn safe_sub(&self, other: Self) -> Result<Self> {
                self.checked_sub(other).ok_or(ArithError::Overflow)
            }

            #[inline]
            fn safe_rem(&self, other: Self) -> Result<Self> {
                self.checked_rem(other).ok_or(ArithError::DivisionByZero)
            }
        }
    };
}

impl_safe_arith!(u64);
impl_safe_arith!(usize);
