use std::{collections::BTreeMap, fmt};

use itertools::Itertools;

use crate::{
    address::Address,
    error::{GenError, Result},
    selection::Selection,
    value::{ChoiceValue, Value},
};

/// A mapping from leaf addresses to values.
///
/// Hierarchy is implicit in the addresses: the sub-map under `:data`
/// holds every leaf whose address starts with `:data`. No address may be
/// both a leaf and a proper prefix of another leaf.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChoiceMap {
    leaves: BTreeMap<Address, Value>,
}

impl ChoiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ChoiceMap::insert`].
    pub fn with(mut self, address: impl Into<Address>, value: impl Into<Value>) -> Result<Self> {
        self.insert(address, value)?;
        Ok(self)
    }

    /// Insert or replace the value at a leaf, returning the previous value.
    pub fn insert(
        &mut self,
        address: impl Into<Address>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>> {
        let address = address.into();
        self.check_leaf(&address)?;
        Ok(self.leaves.insert(address, value.into()))
    }

    fn check_leaf(&self, address: &Address) -> Result<()> {
        if let Some(prefix) = address
            .prefixes()
            .find(|prefix| self.leaves.contains_key(prefix))
        {
            return Err(GenError::AddressConflict(prefix));
        }
        // Descendants sort directly after their prefix.
        let below = self
            .leaves
            .range(address..)
            .map(|(key, _)| key)
            .find(|key| *key != address);
        match below {
            Some(key) if key.starts_with(address) => Err(GenError::AddressConflict(address.clone())),
            _ => Ok(()),
        }
    }

    pub fn get(&self, address: &Address) -> Option<&Value> {
        self.leaves.get(address)
    }

    /// The value at `address`, or `AddressNotFound`.
    pub fn value(&self, address: impl Into<Address>) -> Result<&Value> {
        let address = address.into();
        self.leaves
            .get(&address)
            .ok_or(GenError::AddressNotFound(address))
    }

    /// Typed read of a leaf.
    pub fn get_as<T: ChoiceValue>(&self, address: impl Into<Address>) -> Result<T> {
        let address = address.into();
        let value = self
            .leaves
            .get(&address)
            .ok_or_else(|| GenError::AddressNotFound(address.clone()))?;
        T::from_value(value).ok_or_else(|| GenError::TypeMismatch {
            address,
            expected: T::KIND,
            found: value.kind(),
        })
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.leaves.contains_key(address)
    }

    pub fn remove(&mut self, address: &Address) -> Option<Value> {
        self.leaves.remove(address)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Value)> {
        self.leaves.iter()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.leaves.keys()
    }

    /// Whether any leaf lives strictly below `prefix`.
    pub fn has_submap(&self, prefix: &Address) -> bool {
        self.leaves
            .range(prefix..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .any(|(key, _)| key != prefix)
    }

    /// The leaves below `prefix`, re-rooted at `prefix`.
    pub fn submap(&self, prefix: &Address) -> ChoiceMap {
        let leaves = self
            .leaves
            .range(prefix..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter_map(|(key, value)| Some((key.strip_prefix(prefix)?, value.clone())))
            .collect();
        ChoiceMap { leaves }
    }

    /// Insert every leaf of `submap` below `prefix`.
    pub fn insert_submap(&mut self, prefix: &Address, submap: &ChoiceMap) -> Result<()> {
        for (address, value) in submap.iter() {
            self.insert(prefix.join(address), value.clone())?;
        }
        Ok(())
    }

    /// Overlay `other` onto `self`; values in `other` win.
    pub fn merge(&mut self, other: &ChoiceMap) -> Result<()> {
        for (address, value) in other.iter() {
            self.insert(address, value.clone())?;
        }
        Ok(())
    }

    /// Split into the leaves selected by `selection` and the rest.
    pub fn filter(&self, selection: &Selection) -> (ChoiceMap, ChoiceMap) {
        let (selected, rest) = self
            .leaves
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .partition(|(key, _)| selection.contains(key));
        (ChoiceMap { leaves: selected }, ChoiceMap { leaves: rest })
    }
}

impl fmt::Display for ChoiceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.leaves
                .iter()
                .format_with(", ", |(key, value), f| f(&format_args!("{} = {}", key, value)))
        )
    }
}
