//! Key canonicalization
//!
//! The Bloom filter hashes a byte form of the key rather than the key's
//! `Hash` impl, so two filters built at different times agree on every key.

use std::borrow::Cow;

/// A key with a deterministic byte representation.
///
/// Integers, `bool` and `char` canonicalize to their decimal/text form, so
/// `42_u32` and `"42"` share filter bits.
pub trait CacheKey {
    /// Bytes fed to the filter hash functions
    fn canonical_bytes(&self) -> Cow<'_, [u8]>;
}

impl CacheKey for str {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl CacheKey for String {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl CacheKey for [u8] {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl CacheKey for Vec<u8> {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_slice())
    }
}

impl<T: CacheKey + ?Sized> CacheKey for &T {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        (**self).canonical_bytes()
    }
}

macro_rules! impl_cache_key_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CacheKey for $ty {
                fn canonical_bytes(&self) -> Cow<'_, [u8]> {
                    Cow::Owned(self.to_string().into_bytes())
                }
            }
        )*
    };
}

impl_cache_key_display!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, char);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_forms_agree() {
        let owned = String::from("user:1");
        assert_eq!(owned.canonical_bytes(), "user:1".canonical_bytes());
        assert_eq!(owned.canonical_bytes().as_ref(), b"user:1");
    }

    #[test]
    fn test_integers_use_decimal() {
        assert_eq!(42_u32.canonical_bytes().as_ref(), b"42");
        assert_eq!((-7_i64).canonical_bytes().as_ref(), b"-7");
        assert_eq!(42_u64.canonical_bytes(), "42".canonical_bytes());
    }

    #[test]
    fn test_bytes_pass_through() {
        let raw = vec![0_u8, 255, 7];
        assert_eq!(raw.canonical_bytes().as_ref(), &[0, 255, 7]);
        assert!(matches!(raw.canonical_bytes(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_misc_scalars() {
        assert_eq!(true.canonical_bytes().as_ref(), b"true");
        assert_eq!('x'.canonical_bytes().as_ref(), b"x");
    }
}
