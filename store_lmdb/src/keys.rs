//! Composite key encodings for the secondary index databases.

use bap_types::{BitcoinAddress, BlockHeight, IdKey};

/// Separates the variable-length address from the identity key, so one
/// address is never a key prefix of another.
const SEP: u8 = 0;

/// `address ++ 0x00 ++ idKey` in `identity_addresses`.
pub(crate) fn address_key(address: &BitcoinAddress, id_key: &IdKey) -> Vec<u8> {
    let mut key = address_prefix(address);
    key.extend_from_slice(id_key.as_bytes());
    key
}

pub(crate) fn address_prefix(address: &BitcoinAddress) -> Vec<u8> {
    let mut key = Vec::with_capacity(address.as_bytes().len() + 1);
    key.extend_from_slice(address.as_bytes());
    key.push(SEP);
    key
}

/// `height_be ++ idKey` in `identity_first_seen`. Big-endian heights sort
/// numerically.
pub(crate) fn first_seen_key(height: BlockHeight, id_key: &IdKey) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + id_key.as_bytes().len());
    key.extend_from_slice(&height.to_be_bytes());
    key.extend_from_slice(id_key.as_bytes());
    key
}

/// The identity key part of a `first_seen_key`.
pub(crate) fn id_key_from_first_seen(key: &[u8]) -> Option<IdKey> {
    let raw = key.get(4..)?;
    std::str::from_utf8(raw).ok().map(IdKey::new)
}

/// Increment a byte string to the smallest key greater than every key it
/// prefixes. Used as the exclusive upper bound of prefix scans.
pub(crate) fn increment_prefix(prefix: &mut Vec<u8>) {
    while let Some(last) = prefix.last_mut() {
        if *last < u8::MAX {
            *last += 1;
            return;
        }
        prefix.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_carries() {
        let mut p = vec![1, 0xff];
        increment_prefix(&mut p);
        assert_eq!(p, vec![2]);
        let mut q = vec![b'a', 0];
        increment_prefix(&mut q);
        assert_eq!(q, vec![b'a', 1]);
    }

    #[test]
    fn first_seen_keys_sort_by_height() {
        let a = first_seen_key(9, &IdKey::new("z"));
        let b = first_seen_key(256, &IdKey::new("a"));
        assert!(a < b);
        assert_eq!(id_key_from_first_seen(&b), Some(IdKey::new("a")));
    }

    #[test]
    fn address_prefix_does_not_match_longer_address() {
        let short = address_prefix(&BitcoinAddress::new("1abc"));
        let long = address_key(&BitcoinAddress::new("1abcd"), &IdKey::new("k"));
        assert!(!long.starts_with(&short));
    }
}
