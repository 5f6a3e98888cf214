//! Fetched secret values

use std::fmt;
use zeroize::Zeroize;

/// Decoded secret plaintext
///
/// The buffer is overwritten with zeros before it is returned to the
/// allocator, including when the holder unwinds. Debug output is redacted.
pub struct SecretValue {
    bytes: Vec<u8>,
}

impl SecretValue {
    /// Take ownership of a plaintext buffer without copying it
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    /// The plaintext as UTF-8, `None` for binary secrets
    pub fn expose_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Lend the plaintext to `action` for the duration of the call
    pub fn use_secret<F, R>(&self, action: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        action(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Zero the buffer in place, keeping its length
    pub(crate) fn scrub(&mut self) {
        self.bytes.as_mut_slice().zeroize();
    }
}

impl Drop for SecretValue {
    fn drop(&mut self) {
        // Spare capacity too, not just the initialized length.
        self.bytes.zeroize();
        #[cfg(test)]
        DROP_SCRUBS.with(|count| count.set(count.get() + 1));
    }
}

#[cfg(test)]
thread_local! {
    static DROP_SCRUBS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Values zeroed by `Drop` on the current thread
#[cfg(test)]
pub(crate) fn drop_scrubs() -> usize {
    DROP_SCRUBS.with(std::cell::Cell::get)
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue([REDACTED; {} bytes])", self.bytes.len())
    }
}
