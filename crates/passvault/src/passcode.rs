//! Passcode generation and validation
//!
//! A passcode is twelve characters: 2 lowercase, 3 uppercase, 2 digits,
//! 1 of `!#%`, and 4 drawn from all of the above, shuffled. It is accepted
//! only if it starts with a letter and no character appears more than
//! twice. Rejected candidates are thrown away whole and rebuilt.
//!
//! About one candidate in three is rejected, nearly always because a digit
//! or symbol was shuffled into first place, so generation averages roughly
//! 1.5 attempts. `MAX_ATTEMPTS` is never reached in practice (the chance is
//! below 0.34^10000); it exists so the loop has an end.

use crate::error::VaultError;
use anyhow::{bail, Result};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng, RngCore};
use std::collections::HashMap;

pub const LENGTH: usize = 12;
pub const MAX_ATTEMPTS: usize = 10_000;

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
pub const SPECIAL: &[u8] = b"!#%";
const ANY: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#%";

/// (pool, how many to draw from it)
const QUOTA: [(&[u8], usize); 5] = [(LOWER, 2), (UPPER, 3), (DIGITS, 2), (SPECIAL, 1), (ANY, 4)];

/// Non-empty, starts with a letter, no character more than twice
pub fn is_valid(candidate: &str) -> bool {
    match candidate.chars().next() {
        Some(first) if first.is_alphabetic() => {}
        _ => return false,
    }

    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in candidate.chars() {
        let seen = counts.entry(c).or_insert(0);
        *seen += 1;
        if *seen > 2 {
            return false;
        }
    }
    true
}

/// Generate one passcode from OS entropy
pub fn generate() -> Result<String> {
    generate_with(&mut OsRng)
}

/// Generate one passcode from the given generator
pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Result<String> {
    for attempt in 1..=MAX_ATTEMPTS {
        let passcode = candidate(rng);
        if is_valid(&passcode) {
            tracing::trace!(attempt, "passcode accepted");
            return Ok(passcode);
        }
    }
    bail!(VaultError::GenerationExhausted(MAX_ATTEMPTS))
}

/// Generate `count` independent passcodes
pub fn generate_many(count: usize) -> Result<Vec<String>> {
    (0..count).map(|_| generate()).collect()
}

/// One shuffled draw, not yet validated
fn candidate<R: RngCore + CryptoRng>(rng: &mut R) -> String {
    let mut chars: Vec<u8> = Vec::with_capacity(LENGTH);
    for (pool, count) in QUOTA {
        for _ in 0..count {
            chars.push(pool[rng.gen_range(0..pool.len())]);
        }
    }
    chars.shuffle(rng);
    chars.into_iter().map(char::from).collect()
}
