// consensus/src/punish.rs

use chain_crypto::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Addresses flagged for minor protocol violations ("yellow card") during
/// one block-validation pass.
///
/// Written once per block and read by block validation; no lifecycle across
/// blocks. Insertion order is observable through [`addresses`], so appending
/// never deduplicates; [`address_set`] is the deduplicated view.
///
/// [`addresses`]: YellowPunishRecord::addresses
/// [`address_set`]: YellowPunishRecord::address_set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YellowPunishRecord {
    addresses: Vec<Address>,
}

impl YellowPunishRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_addresses(addresses: Vec<Address>) -> Self {
        Self { addresses }
    }

    /// Flag an address; duplicates are kept
    pub fn push(&mut self, address: Address) {
        self.addresses.push(address);
    }

    /// Accumulated addresses in insertion order, duplicates included
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Deduplicated view of the flagged addresses
    pub fn address_set(&self) -> HashSet<Address> {
        self.addresses.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_kept_with_duplicates() {
        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);

        let mut record = YellowPunishRecord::new();
        record.push(b);
        record.push(a);
        record.push(b);

        assert_eq!(record.addresses(), &[b, a, b]);
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_address_set_deduplicates() {
        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);

        let record = YellowPunishRecord::from_addresses(vec![b, a, b, a]);
        let set = record.address_set();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a) && set.contains(&b));
    }

    #[test]
    fn test_empty_record() {
        let record = YellowPunishRecord::new();
        assert!(record.is_empty());
        assert!(record.address_set().is_empty());
    }
}
