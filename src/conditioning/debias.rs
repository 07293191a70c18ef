//! Von Neumann debiasing.
//!
//! Removes first-order bias from a source whose bits are independent
//! but not necessarily balanced. Independence is a precondition that
//! this filter does not check; the statistical tests downstream do.

/// Streaming Von Neumann extractor.
///
/// Bits are consumed one at a time and paired in arrival order:
/// `(0, 1)` emits 1, `(1, 0)` emits 0, equal pairs emit nothing.
/// An unpaired trailing bit is held until the next call.
#[derive(Debug, Clone, Default)]
pub struct VonNeumannDebiaser {
    /// First half of an incomplete pair.
    pending: Option<u8>,
}

impl VonNeumannDebiaser {
    /// Creates a debiaser with no pending bit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw bit, returning the unbiased bit if a pair completed.
    ///
    /// Any non-zero input is treated as 1.
    #[inline]
    pub fn push(&mut self, bit: u8) -> Option<u8> {
        let bit = u8::from(bit != 0);
        match self.pending.take() {
            None => {
                self.pending = Some(bit);
                None
            }
            Some(0) if bit == 1 => Some(1),
            Some(1) if bit == 0 => Some(0),
            Some(_) => None,
        }
    }

    /// Feeds a run of raw bits, appending unbiased output to `out`.
    ///
    /// Returns the number of bits emitted.
    pub fn process_into(&mut self, raw: &[u8], out: &mut Vec<u8>) -> usize {
        let before = out.len();
        out.extend(raw.iter().filter_map(|&bit| self.push(bit)));
        out.len() - before
    }

    /// Convenience wrapper returning a fresh output vector.
    pub fn process(&mut self, raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(raw.len() / 2);
        self.process_into(raw, &mut out);
        out
    }

    /// Returns true if half a pair is buffered.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Discards any buffered half pair.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}
