//! Small helpers shared across the crate.

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::time::Duration;

use crate::common::constants::{JITTER_HIGH, JITTER_LOW};

/// Apply the protocol jitter to a base wait.
///
/// Every acquisition sleep is drawn uniformly from [0.6·wait, 1.4·wait] so
/// that processes which collided once do not stay in lockstep on retry.
pub fn jittered(wait: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(JITTER_LOW..JITTER_HIGH);
    wait.mul_f64(factor)
}

/// Generate a random alphanumeric suffix of `len` characters.
///
/// Used to give each scope's shadow file a unique name in the shared
/// scratch directory.
pub fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
