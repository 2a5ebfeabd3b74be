use crate::cursor::ByteCursor;
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use std::ops::RangeInclusive;
use tracing::debug;

const MICROS_PER_SECOND: f64 = 1_000_000.0;
/// Calendar years a consumed date may fall in.
const SUPPORTED_YEARS: RangeInclusive<i32> = 1..=9999;

/// Date returned by [`EnhancedDataProvider::consume_date`] when the consumed
/// timestamp cannot be converted: `1970-01-01T00:00:00`.
pub fn fallback_date() -> NaiveDateTime {
    NaiveDateTime::default()
}

/// Wraps a [`ByteCursor`] and builds higher-level values out of its primitives.
///
/// Every operation is total: an exhausted cursor yields empty values, and
/// conversions that cannot succeed fall back to fixed defaults. The provider
/// also implements `ByteCursor` itself by forwarding to the wrapped cursor.
#[derive(Debug)]
pub struct EnhancedDataProvider<C: ByteCursor> {
    cursor: C,
}

impl<C: ByteCursor> EnhancedDataProvider<C> {
    pub fn new(cursor: C) -> Self {
        Self { cursor }
    }

    pub fn cursor(&self) -> &C {
        &self.cursor
    }

    pub fn into_inner(self) -> C {
        self.cursor
    }

    /// Consumes a length in `[0, remaining_bytes()]`, then that many bytes.
    pub fn consume_random_bytes(&mut self) -> Vec<u8> {
        let len = self.random_len();
        self.cursor.consume_bytes(len)
    }

    /// Same length policy as [`Self::consume_random_bytes`], decoded as text.
    pub fn consume_random_string(&mut self) -> String {
        let len = self.random_len();
        self.cursor.consume_unicode_no_surrogates(len)
    }

    pub fn consume_remaining_string(&mut self) -> String {
        let len = self.cursor.remaining_bytes();
        self.cursor.consume_unicode_no_surrogates(len)
    }

    pub fn consume_remaining_bytes(&mut self) -> Vec<u8> {
        let len = self.cursor.remaining_bytes();
        self.cursor.consume_bytes(len)
    }

    /// Returns a shuffled sub-list of `source` with length in `[1, source.len()]`.
    ///
    /// One boolean is consumed per element, in order, to decide inclusion. The
    /// shuffle then walks `i` from the last index down to `2`, so the first two
    /// chosen elements only move when swapped with a later one. This partial
    /// shuffle is kept as is: changing it changes which values a given input
    /// decodes to.
    ///
    /// If nothing was included, one element is picked from `source`. An empty
    /// `source` yields an empty list and consumes nothing.
    pub fn consume_sublist<T: Clone>(&mut self, source: &[T]) -> Vec<T> {
        if source.is_empty() {
            return Vec::new();
        }

        let mut chosen: Vec<T> = source
            .iter()
            .filter(|_| self.cursor.consume_bool())
            .cloned()
            .collect();

        for i in (2..chosen.len()).rev() {
            let j = self.cursor.consume_int_in_range(0, i);
            chosen.swap(i, j);
        }

        if chosen.is_empty() {
            chosen.extend(self.cursor.pick_value_in_list(source).cloned());
        }
        chosen
    }

    /// Consumes an `f64` and reads it as a POSIX timestamp in UTC.
    ///
    /// The fractional part is rounded to whole microseconds, ties to even.
    /// Non-finite timestamps, and timestamps outside years 1 through 9999,
    /// return [`fallback_date`].
    pub fn consume_date(&mut self) -> NaiveDateTime {
        let timestamp = self.cursor.consume_float();
        match timestamp_to_datetime(timestamp) {
            Some(date) => date,
            None => {
                debug!(timestamp, "timestamp not representable, using fallback date");
                fallback_date()
            }
        }
    }

    fn random_len(&mut self) -> usize {
        let remaining = self.cursor.remaining_bytes();
        self.cursor.consume_int_in_range(0, remaining)
    }
}

fn timestamp_to_datetime(timestamp: f64) -> Option<NaiveDateTime> {
    if !timestamp.is_finite() {
        return None;
    }
    let mut secs = timestamp.floor();
    let mut micros = ((timestamp - secs) * MICROS_PER_SECOND).round_ties_even();
    if micros >= MICROS_PER_SECOND {
        secs += 1.0;
        micros -= MICROS_PER_SECOND;
    }
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if secs < i64::MIN as f64 || secs >= i64::MAX as f64 {
        return None;
    }
    let nanos = (micros as u32).checked_mul(1_000)?;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos)
        .map(|dt| dt.naive_utc())
        .filter(|dt| SUPPORTED_YEARS.contains(&dt.year()))
}

impl<C: ByteCursor> ByteCursor for EnhancedDataProvider<C> {
    fn consume_bytes(&mut self, n: usize) -> Vec<u8> {
        self.cursor.consume_bytes(n)
    }

    fn consume_int_in_range(&mut self, lo: usize, hi: usize) -> usize {
        self.cursor.consume_int_in_range(lo, hi)
    }

    fn consume_bool(&mut self) -> bool {
        self.cursor.consume_bool()
    }

    fn consume_float(&mut self) -> f64 {
        self.cursor.consume_float()
    }

    fn consume_unicode_no_surrogates(&mut self, n: usize) -> String {
        self.cursor.consume_unicode_no_surrogates(n)
    }

    fn pick_value_in_list<'a, T>(&mut self, list: &'a [T]) -> Option<&'a T> {
        self.cursor.pick_value_in_list(list)
    }

    fn remaining_bytes(&self) -> usize {
        self.cursor.remaining_bytes()
    }
}
