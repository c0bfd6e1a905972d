use std::collections::BTreeSet;

use crate::address::Address;

/// A set of addresses that an update is allowed to touch.
///
/// Selecting an address selects it and everything below it, so selecting
/// `:data => 3` covers `:data => 3 => :is_outlier` and `:data => 3 => :y`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Selection {
    #[default]
    None,
    All,
    Addresses(BTreeSet<Address>),
    Complement(Box<Selection>),
    Union(Vec<Selection>),
}

impl Selection {
    pub fn select<A: Into<Address>>(addresses: impl IntoIterator<Item = A>) -> Self {
        Selection::Addresses(addresses.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, address: &Address) -> bool {
        match self {
            Selection::None => false,
            Selection::All => true,
            Selection::Addresses(set) => {
                set.contains(address) || address.prefixes().any(|prefix| set.contains(&prefix))
            }
            Selection::Complement(inner) => !inner.contains(address),
            Selection::Union(parts) => parts.iter().any(|part| part.contains(address)),
        }
    }

    pub fn union(self, other: Selection) -> Selection {
        match (self, other) {
            (Selection::None, other) | (other, Selection::None) => other,
            (Selection::All, _) | (_, Selection::All) => Selection::All,
            (Selection::Addresses(mut left), Selection::Addresses(right)) => {
                left.extend(right);
                Selection::Addresses(left)
            }
            (Selection::Union(mut parts), other) | (other, Selection::Union(mut parts)) => {
                parts.push(other);
                Selection::Union(parts)
            }
            (left, right) => Selection::Union(vec![left, right]),
        }
    }

    pub fn complement(self) -> Selection {
        match self {
            Selection::None => Selection::All,
            Selection::All => Selection::None,
            Selection::Complement(inner) => *inner,
            other => Selection::Complement(Box::new(other)),
        }
    }

    /// True if the selection cannot contain any address.
    pub fn is_empty(&self) -> bool {
        match self {
            Selection::None => true,
            Selection::All => false,
            Selection::Addresses(set) => set.is_empty(),
            Selection::Complement(inner) => matches!(**inner, Selection::All),
            Selection::Union(parts) => parts.iter().all(Selection::is_empty),
        }
    }
}

impl From<Address> for Selection {
    fn from(address: Address) -> Self {
        Selection::Addresses(BTreeSet::from([address]))
    }
}

impl From<&str> for Selection {
    fn from(name: &str) -> Self {
        Selection::from(Address::from(name))
    }
}
