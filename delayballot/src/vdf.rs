//! Pietrzak's verifiable delay function over an RSA group.
//!
//! A puzzle is a modulus `n` together with a starting value `x`. Its solution is
//! `y = x^(2^T) mod n`, which takes `T` sequential squarings to compute unless the
//! factorization of `n` is known. The proof lets anyone check `y` with roughly
//! `log(T)` small exponentiations instead of redoing the squarings.
//!
//! The interactive halving protocol is made non-interactive with Fiat-Shamir: each
//! round commits to the square root of the midpoint value `μ` and derives the folding
//! challenge from a SHA-256 digest of the round's transcript.

use crate::*;
use num_bigint_dig::{BigUint, RandBigInt, RandPrime};
use num_traits::One;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Maximum number of squarings done in a single exponentiation.
pub const DELTA: u64 = 4096;

/// Size of each prime factor of a freshly created modulus.
pub const PRIME_BITS: usize = 1024;

pub const MAX_INPUT_LEN: usize = 2048;
pub const MAX_OUTPUT_LEN: usize = 1024;

/// A VDF puzzle together with its solution and proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// Encoded modulus followed by the encoded starting value, both of the same width.
    pub input: Vec<u8>,
    pub output: Vec<u8>,
    pub proof: Vec<u8>,
}

impl Solution {
    pub fn to_bytes(&self) -> Vec<u8> {
        debug_assert!(self.input.len() <= MAX_INPUT_LEN);
        debug_assert!(self.output.len() <= MAX_OUTPUT_LEN);

        let mut out = Vec::with_capacity(4 + self.input.len() + self.output.len() + self.proof.len());
        out.extend_from_slice(&(self.input.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.input);
        out.extend_from_slice(&(self.output.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.output);
        out.extend_from_slice(&self.proof);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::new("VDF.Solution", bytes);
        let input = reader.read_u16_prefixed("input", MAX_INPUT_LEN)?.to_vec();
        let output = reader.read_u16_prefixed("output", MAX_OUTPUT_LEN)?.to_vec();
        let proof = reader.read_remaining("proof", usize::MAX)?.to_vec();
        Ok(Solution {
            input,
            output,
            proof,
        })
    }
}

/// How repeated squaring is carried out.
enum Squaring<'a> {
    /// The group order is known, so `x^(2^t)` reduces to a single exponentiation.
    Trapdoor(&'a BigUint),

    /// Honest sequential squaring, optionally abandoned when the flag is raised.
    Sequential(Option<&'a AtomicBool>),
}

/// Pietrzak VDF with a fixed difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pietrzak {
    time: u64,
}

impl Pietrzak {
    /// `time` is the number of sequential squarings and must be positive and even.
    pub fn new(time: u64) -> Result<Self, Error> {
        if time == 0 || time % 2 != 0 {
            return Err(Error::InvalidDifficulty(time));
        }
        Ok(Pietrzak { time })
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    /// Create a fresh puzzle and solve it instantly using the factorization of its modulus.
    pub fn create(&self) -> Result<Solution, Error> {
        let mut rng = rand::rngs::OsRng {};
        let started = Instant::now();

        let p = rng.gen_prime(PRIME_BITS);
        let mut q = rng.gen_prime(PRIME_BITS);
        while q == p {
            q = rng.gen_prime(PRIME_BITS);
        }
        let n = &p * &q;
        let phi = (&p - BigUint::one()) * (&q - BigUint::one());
        let x = rng.gen_biguint_below(&n);

        let length = PRIME_BITS / 4;
        let mut input = nat_to_bytes(&n, length);
        input.extend(nat_to_bytes(&x, length));

        let solution = self.prove(input, &n, x, Squaring::Trapdoor(&phi))?;
        tracing::debug!(
            time = self.time,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "created vdf puzzle"
        );
        Ok(solution)
    }

    /// Solve the puzzle in `input` without knowledge of the factorization.
    ///
    /// This performs about `2 * time` sequential modular squarings.
    pub fn solve(&self, input: &[u8]) -> Result<Solution, Error> {
        self.solve_inner(input, None)
    }

    /// Like `solve`, but gives up with `Error::Cancelled` once `cancel` is set.
    pub fn solve_cancellable(&self, input: &[u8], cancel: &AtomicBool) -> Result<Solution, Error> {
        self.solve_inner(input, Some(cancel))
    }

    fn solve_inner(&self, input: &[u8], cancel: Option<&AtomicBool>) -> Result<Solution, Error> {
        let (length, n, x) = parse_input(input).ok_or(Error::InvalidVdfInput)?;
        let started = Instant::now();

        let solution = self.prove(input.to_vec(), &n, x, Squaring::Sequential(cancel))?;
        debug_assert_eq!(solution.output.len(), length);

        tracing::debug!(
            time = self.time,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "solved vdf puzzle"
        );
        Ok(solution)
    }

    fn prove(
        &self,
        input: Vec<u8>,
        n: &BigUint,
        mut x: BigUint,
        squaring: Squaring,
    ) -> Result<Solution, Error> {
        let length = input.len() / 2;
        let mut t = self.time;
        let mut y = repeat_square(&x, t, n, &squaring)?;
        let output = nat_to_bytes(&y, length);

        let mut proof = Vec::new();
        while t > DELTA {
            let half_t = t / 2;
            let mu_root = repeat_square(&x, half_t - 1, n, &squaring)?;
            proof.extend(nat_to_bytes(&mu_root, length));

            let (next_x, next_y, next_t) = fold(n, &mu_root, &x, &y, t, length);
            x = next_x;
            y = next_y;
            t = next_t;
        }

        Ok(Solution {
            input,
            output,
            proof,
        })
    }

    /// Check that `solution.output` is the result of `time` squarings of the puzzle input.
    ///
    /// Malformed solutions are rejected, never reported as errors.
    pub fn verify(&self, solution: &Solution) -> bool {
        let (length, n, mut x) = match parse_input(&solution.input) {
            Some(parsed) => parsed,
            None => return false,
        };
        let mut y = nat_from_bytes(&solution.output);
        if y >= n {
            return false;
        }

        let mut t = self.time;
        let mut proof = solution.proof.chunks_exact(length);
        while t > DELTA {
            let mu_root = match proof.next() {
                Some(bytes) => nat_from_bytes(bytes),
                None => return false,
            };

            let (next_x, next_y, next_t) = fold(&n, &mu_root, &x, &y, t, length);
            x = next_x;
            y = next_y;
            t = next_t;
        }

        match repeat_square(&x, t, &n, &Squaring::Sequential(None)) {
            Ok(expected) => expected == y,
            Err(_) => false,
        }
    }
}

/// Split a puzzle input into its width, modulus and starting value.
fn parse_input(input: &[u8]) -> Option<(usize, BigUint, BigUint)> {
    if input.is_empty() || input.len() % 2 != 0 {
        return None;
    }
    let length = input.len() / 2;
    let n = nat_from_bytes(&input[..length]);
    if n <= BigUint::one() {
        return None;
    }
    let x = nat_from_bytes(&input[length..]) % &n;
    Some((length, n, x))
}

/// One halving round: maps a claim about `t` squarings to one about (about) `t / 2`.
///
/// `t` stays even after every round.
fn fold(
    n: &BigUint,
    mu_root: &BigUint,
    x: &BigUint,
    y: &BigUint,
    t: u64,
    length: usize,
) -> (BigUint, BigUint, u64) {
    let half_t = t / 2;
    let r = challenge(mu_root, x, y, t, length);

    // Squaring the committed root guarantees μ is a quadratic residue
    let mu = (mu_root * mu_root) % n;
    let next_x = (x.modpow(&r, n) * &mu) % n;
    let mut next_y = (mu.modpow(&r, n) * y) % n;

    if half_t % 2 == 0 {
        (next_x, next_y, half_t)
    } else {
        next_y = (&next_y * &next_y) % n;
        (next_x, next_y, half_t + 1)
    }
}

fn challenge(mu_root: &BigUint, x: &BigUint, y: &BigUint, t: u64, length: usize) -> BigUint {
    let mut hasher = Sha256::new();
    hasher.update(nat_to_bytes(mu_root, length));
    hasher.update(nat_to_bytes(x, length));
    hasher.update(nat_to_bytes(y, length));
    hasher.update(t.to_be_bytes());
    nat_from_bytes(&hasher.finalize())
}

fn repeat_square(x: &BigUint, t: u64, n: &BigUint, squaring: &Squaring) -> Result<BigUint, Error> {
    if t == 0 {
        return Ok(x.clone());
    }

    match squaring {
        Squaring::Trapdoor(phi) => {
            let e = BigUint::from(2u32).modpow(&BigUint::from(t), phi);
            Ok(x.modpow(&e, n))
        }
        Squaring::Sequential(cancel) => {
            let two_pow_delta = BigUint::one() << (DELTA as usize);
            let mut x = x.clone();
            let mut t = t;
            while t >= DELTA {
                if let Some(cancel) = cancel {
                    if cancel.load(Ordering::Relaxed) {
                        return Err(Error::Cancelled);
                    }
                }
                x = x.modpow(&two_pow_delta, n);
                t -= DELTA;
            }
            if t == 0 {
                return Ok(x);
            }
            Ok(x.modpow(&(BigUint::one() << (t as usize)), n))
        }
    }
}
