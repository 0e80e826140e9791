//! Username and password generation
//!
//! Usernames are a fixed prefix followed by a random decimal suffix of fixed
//! width, checked against the live directory before being handed out.
//! Passwords are drawn uniformly, with replacement, from printable ASCII
//! without the space character. No character-class balancing is applied.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, error, instrument};

use extacct_core::{CredentialPolicy, DirectoryQuery, ExtacctError, GeneratedCredential, Result};

/// Code point ranges passwords are drawn from: digits, upper, lower, then
/// the punctuation and symbol blocks in between
pub const PASSWORD_RANGES: [RangeInclusive<u8>; 7] = [
    48..=57,
    65..=90,
    97..=122,
    33..=47,
    58..=64,
    91..=96,
    123..=126,
];

static PASSWORD_ALPHABET: Lazy<Vec<u8>> = Lazy::new(|| {
    let mut alphabet: Vec<u8> = PASSWORD_RANGES.iter().cloned().flatten().collect();
    alphabet.sort_unstable();
    alphabet.dedup();
    alphabet
});

/// Whether `c` may appear in a generated password
pub fn is_password_char(c: char) -> bool {
    c.is_ascii() && PASSWORD_ALPHABET.binary_search(&(c as u8)).is_ok()
}

/// Draw `length` characters uniformly from the password alphabet
pub fn generate_password<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| PASSWORD_ALPHABET[rng.gen_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect()
}

/// One username candidate; not checked against anything
pub fn sample_username<R: Rng + ?Sized>(rng: &mut R, policy: &CredentialPolicy) -> String {
    let digits = policy.username_digits.clamp(1, 18);
    let low = 10u64.pow(digits - 1);
    let suffix = rng.gen_range(low..low * 10);
    format!("{}{}", policy.username_prefix, suffix)
}

/// Generates credentials that are unique in the directory and in this run
pub struct CredentialGenerator<Q: DirectoryQuery> {
    directory: Arc<Q>,
    policy: CredentialPolicy,
    rng: StdRng,
    /// Lowercased usernames handed out by this generator
    issued: HashSet<String>,
}

impl<Q: DirectoryQuery> CredentialGenerator<Q> {
    pub fn new(directory: Arc<Q>, policy: CredentialPolicy) -> Self {
        Self::with_rng(directory, policy, StdRng::from_entropy())
    }

    /// Use a caller-supplied generator, e.g. a seeded one
    pub fn with_rng(directory: Arc<Q>, policy: CredentialPolicy, rng: StdRng) -> Self {
        Self {
            directory,
            policy,
            rng,
            issued: HashSet::new(),
        }
    }

    pub fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }

    /// Sample candidates until one is free in the directory.
    ///
    /// Fails with `ExhaustedNamespace` after `max_username_attempts`
    /// collisions. Directory errors abort immediately.
    #[instrument(skip(self))]
    pub async fn generate_username(&mut self) -> Result<String> {
        let attempts = self.policy.max_username_attempts.max(1);

        for attempt in 1..=attempts {
            let candidate = sample_username(&mut self.rng, &self.policy);
            let key = candidate.to_lowercase();

            if self.issued.contains(&key) {
                debug!(attempt, "{} already issued in this run", candidate);
                continue;
            }
            if self.directory.find_account(&candidate).await?.is_some() {
                debug!(attempt, "{} already exists in the directory", candidate);
                continue;
            }

            self.issued.insert(key);
            return Ok(candidate);
        }

        error!(
            "No free username with prefix '{}' after {} attempts",
            self.policy.username_prefix, attempts
        );
        Err(ExtacctError::ExhaustedNamespace { attempts })
    }

    pub fn generate_password(&mut self) -> String {
        generate_password(&mut self.rng, self.policy.password_length)
    }

    pub async fn generate(&mut self) -> Result<GeneratedCredential> {
        let username = self.generate_username().await?;
        let password = self.generate_password();
        Ok(GeneratedCredential { username, password })
    }
}
