//! Randomness provider for tree keys and chain nonces.
//!
//! The ledger never reaches for a global generator. A [`RandomSource`] is
//! handed to each tree and chain at construction, so production code can use
//! the operating system CSPRNG while tests plug in a seeded or failing source.

use rand::RngCore;

/// Fallible source of random bytes.
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    fn try_fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError>;
}

impl<R: RngCore + Send + Sync> RandomSource for R {
    fn try_fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        self.try_fill_bytes(dest)
            .map_err(|e| EntropyError::Unavailable(e.to_string()))
    }
}

/// The operating system CSPRNG, boxed for injection.
pub fn os_source() -> Box<dyn RandomSource> {
    Box::new(rand::rngs::OsRng)
}

/// Draw `N` random bytes.
pub fn draw_array<const N: usize>(source: &mut dyn RandomSource) -> Result<[u8; N], EntropyError> {
    let mut out = [0u8; N];
    source.try_fill(&mut out)?;
    Ok(out)
}

/// Draw a uniformly random 128-bit integer.
pub fn draw_u128(source: &mut dyn RandomSource) -> Result<u128, EntropyError> {
    draw_array::<16>(source).map(u128::from_be_bytes)
}

/// Draw a random value strictly between `low` and `high`.
///
/// Returns `Ok(None)` when the open interval is empty. The modulo bias is
/// below 2^-64 for any interval narrower than 2^64 and irrelevant for key
/// placement.
pub fn draw_between(
    source: &mut dyn RandomSource,
    low: u128,
    high: u128,
) -> Result<Option<u128>, EntropyError> {
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    let span = high - low;
    if span < 2 {
        return Ok(None);
    }
    let offset = draw_u128(source)? % (span - 1);
    Ok(Some(low + 1 + offset))
}

/// Errors from the randomness provider.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EntropyError {
    #[error("random source unavailable: {0}")]
    Unavailable(String),
}
