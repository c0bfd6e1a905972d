use std::{fmt, sync::Arc};

use itertools::Itertools;

/// One step of an address path: a symbolic name or an integer index.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Name(Arc<str>),
    Index(usize),
}

impl From<&str> for Segment {
    fn from(name: &str) -> Self {
        Segment::Name(name.into())
    }
}

impl From<String> for Segment {
    fn from(name: String) -> Self {
        Segment::Name(name.into())
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(name) => write!(f, ":{}", name),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Hierarchical key of a random choice, e.g. `:data => 3 => :y`.
///
/// Addresses compare segment by segment, so the ordering is total and
/// every address sorts directly before the addresses it is a prefix of.
/// An address always has at least one segment.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(Vec<Segment>);

impl Address {
    pub fn new(segment: impl Into<Segment>) -> Self {
        Address(vec![segment.into()])
    }

    /// Build an address from a path. Returns `None` for an empty path.
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Option<Self> {
        let segments: Vec<_> = segments.into_iter().collect();
        if segments.is_empty() {
            None
        } else {
            Some(Address(segments))
        }
    }

    /// Extend the path by one segment.
    pub fn then(mut self, segment: impl Into<Segment>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Concatenate two paths: `self => other`.
    pub fn join(&self, other: &Address) -> Self {
        Address(self.0.iter().chain(other.0.iter()).cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn starts_with(&self, prefix: &Address) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The remainder of the path below `prefix`, if `prefix` is a proper prefix.
    pub fn strip_prefix(&self, prefix: &Address) -> Option<Address> {
        let rest = self.0.strip_prefix(prefix.0.as_slice())?;
        Address::from_segments(rest.iter().cloned())
    }

    /// All proper prefixes, shortest first.
    pub fn prefixes(&self) -> impl Iterator<Item = Address> + '_ {
        (1..self.0.len()).map(|n| Address(self.0[..n].to_vec()))
    }
}

impl From<&str> for Address {
    fn from(name: &str) -> Self {
        Address::new(name)
    }
}

impl From<String> for Address {
    fn from(name: String) -> Self {
        Address::new(name)
    }
}

impl From<Segment> for Address {
    fn from(segment: Segment) -> Self {
        Address(vec![segment])
    }
}

impl From<&Address> for Address {
    fn from(address: &Address) -> Self {
        address.clone()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(" => "))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Build an [`Address`] from a list of names and indices.
///
/// ```
/// use gentrace::addr;
///
/// let a = addr!("data", 3usize, "y");
/// assert_eq!(a.to_string(), ":data => 3 => :y");
/// ```
#[macro_export]
macro_rules! addr {
    ($first:expr $(, $rest:expr)* $(,)?) => {
        $crate::Address::new($crate::Segment::from($first))
            $(.then($crate::Segment::from($rest)))*
    };
}
