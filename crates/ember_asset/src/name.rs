use std::fmt;

/// Hashed identifier of a virtual path.
///
/// Mounted assets, dependencies and defaults are all keyed by `Name` so that
/// registry lookups never compare full path strings.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(u64);

impl Name {
    pub fn new(s: &str) -> Self {
        Self(fxhash::hash64(s.as_bytes()))
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:016x})", self.0)
    }
}
