use arbitrary::{Arbitrary, Unstructured};

/// A `ByteCursor` is a finite, forward-only source of fuzz bytes.
///
/// Every `consume_*` call is destructive: it advances the read position and
/// shrinks `remaining_bytes()` by at most the number of bytes it asked for.
/// Once the cursor is exhausted, consumption must keep succeeding with
/// deterministic defaults (`0`, `false`, empty collections) instead of
/// failing. Helpers built on top of a cursor rely on this to stay total.
///
/// A cursor is a single mutable read position. It is owned by one fuzz
/// iteration on one thread.
pub trait ByteCursor {
    /// Consumes up to `n` bytes. Returns fewer when fewer remain.
    fn consume_bytes(&mut self, n: usize) -> Vec<u8>;

    /// Consumes an integer in the inclusive range `[lo, hi]`.
    ///
    /// Returns `lo` when the cursor is exhausted.
    fn consume_int_in_range(&mut self, lo: usize, hi: usize) -> usize;

    /// Consumes a boolean. Returns `false` when exhausted.
    fn consume_bool(&mut self) -> bool;

    /// Consumes an arbitrary `f64`, including non-finite values.
    fn consume_float(&mut self) -> f64;

    /// Consumes up to `n` bytes and decodes them as text.
    ///
    /// Rust strings cannot hold surrogate code points, and malformed
    /// sequences are replaced with U+FFFD rather than rejected.
    fn consume_unicode_no_surrogates(&mut self, n: usize) -> String;

    /// Picks one element of `list`. `None` only when `list` is empty.
    fn pick_value_in_list<'a, T>(&mut self, list: &'a [T]) -> Option<&'a T>;

    /// Number of bytes not yet consumed.
    fn remaining_bytes(&self) -> usize;
}

impl ByteCursor for Unstructured<'_> {
    fn consume_bytes(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.len());
        self.bytes(n).map(<[u8]>::to_vec).unwrap_or_default()
    }

    fn consume_int_in_range(&mut self, lo: usize, hi: usize) -> usize {
        if lo >= hi {
            return lo;
        }
        self.int_in_range(lo..=hi).unwrap_or(lo)
    }

    fn consume_bool(&mut self) -> bool {
        bool::arbitrary(self).unwrap_or(false)
    }

    fn consume_float(&mut self) -> f64 {
        f64::arbitrary(self).unwrap_or(0.0)
    }

    fn consume_unicode_no_surrogates(&mut self, n: usize) -> String {
        let bytes = self.consume_bytes(n);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn pick_value_in_list<'a, T>(&mut self, list: &'a [T]) -> Option<&'a T> {
        self.choose(list).ok()
    }

    fn remaining_bytes(&self) -> usize {
        self.len()
    }
}
