use std::fmt;

/// Position of a representation inside a manifest.
///
/// Equality is structural: the same triple found in a freshly parsed manifest refers to the
/// same representation as before, which makes it usable as a key across refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepresentationAddress {
    pub period: usize,
    pub adaptation_set: usize,
    pub representation: usize,
}

impl RepresentationAddress {
    pub fn new(period: usize, adaptation_set: usize, representation: usize) -> Self {
        Self {
            period,
            adaptation_set,
            representation,
        }
    }
}

impl fmt::Display for RepresentationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Representation (period={} adaptation-set={} representation={})",
            self.period, self.adaptation_set, self.representation
        )
    }
}
