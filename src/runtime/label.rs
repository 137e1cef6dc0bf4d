//! Cycling suffixes for diagnostic labels.

/// Hands out label suffixes by cycling through an alphabet.
///
/// The first call returns the first entry; after the last entry it wraps.
#[derive(Debug, Clone)]
pub struct SuffixCycler {
    alphabet: Vec<char>,
    next: usize,
}

impl SuffixCycler {
    /// Creates a cycler over the characters of `alphabet`.
    ///
    /// An empty alphabet yields `'?'` forever; [`LoopConfig::normalize`](super::LoopConfig::normalize)
    /// keeps that from happening through the loop.
    #[must_use]
    pub fn new(alphabet: &str) -> Self {
        Self {
            alphabet: alphabet.chars().collect(),
            next: 0,
        }
    }

    /// Returns the next suffix.
    pub fn next_suffix(&mut self) -> char {
        let Some(&c) = self.alphabet.get(self.next) else {
            return '?';
        };
        self.next = (self.next + 1) % self.alphabet.len();
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_first_entry_and_wraps() {
        let mut cycler = SuffixCycler::new("xyz");
        let got: String = (0..5).map(|_| cycler.next_suffix()).collect();
        assert_eq!(got, "xyzxy");
    }

    #[test]
    fn empty_alphabet_is_harmless() {
        let mut cycler = SuffixCycler::new("");
        assert_eq!(cycler.next_suffix(), '?');
    }
}
