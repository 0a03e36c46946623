//! Fixed-width local timestamps (`YYYYMMDDHHMMSS`)
//!
//! Session tokens and backup suffixes both use this format. Because every
//! field is zero-padded and the width never changes, ordering the strings
//! lexicographically is the same as ordering the instants, so `Timestamp`
//! derives `Ord` straight from its text.

use chrono::{Duration, Local, NaiveDateTime};
use std::fmt;

pub const FORMAT: &str = "%Y%m%d%H%M%S";
const WIDTH: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(String);

impl Timestamp {
    /// Current local time
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self(at.format(FORMAT).to_string())
    }

    /// `at` shifted forward by `seconds`
    pub fn after(at: NaiveDateTime, seconds: i64) -> Self {
        Self::from_datetime(at + Duration::seconds(seconds))
    }

    /// Accepts exactly fourteen ASCII digits
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim_end();
        if s.len() == WIDTH && s.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
