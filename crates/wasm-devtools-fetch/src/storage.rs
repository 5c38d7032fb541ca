//! Storage key derivation and value decoding.
//!
//! A storage map entry lives under
//!
//! ```text
//! twox128(pallet) ++ twox128(map) ++ hasher(arg) ++ arg
//! ```
//!
//! where `hasher(arg)` is empty for identity maps. The key argument of the
//! maps this tool targets is a content hash, recovered from the raw key by
//! stripping the prefix and the hasher output.

use std::hash::Hasher;

use parity_scale_codec::DecodeAll;
use twox_hash::XxHash64;

use wasm_devtools_common::{FetchError, KeyHasherKind};

/// Length of the `twox128(pallet) ++ twox128(map)` prefix.
pub const MAP_PREFIX_LEN: usize = 32;

/// 128-bit xxhash as used for pallet and storage item names.
pub fn twox_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (seed, chunk) in (0u64..).zip(out.chunks_exact_mut(8)) {
        let mut hasher = XxHash64::with_seed(seed);
        hasher.write(data);
        chunk.copy_from_slice(&hasher.finish().to_le_bytes());
    }
    out
}

/// Key prefix shared by every entry of `pallet.map`.
pub fn storage_prefix(pallet: &str, map: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(MAP_PREFIX_LEN);
    prefix.extend_from_slice(&twox_128(pallet.as_bytes()));
    prefix.extend_from_slice(&twox_128(map.as_bytes()));
    prefix
}

/// Encode bytes as `0x`-prefixed lower-case hex.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `0x`-prefixed (or bare) hex.
pub fn from_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

/// An enumerated storage map entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobKey {
    /// Full raw storage key, used to fetch the value.
    pub storage_key: Vec<u8>,
    /// Key argument in canonical `0x`-prefixed hex form.
    pub hash: String,
}

impl BlobKey {
    /// Recover the key argument from a raw storage key.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Query`] if the key does not start with `prefix`
    /// or carries no argument after the hasher output.
    pub fn from_storage_key(
        prefix: &[u8],
        hasher: KeyHasherKind,
        storage_key: Vec<u8>,
    ) -> Result<Self, FetchError> {
        let arg_start = prefix.len() + hasher.hash_len();

        if !storage_key.starts_with(prefix) || storage_key.len() <= arg_start {
            return Err(FetchError::query(
                "state_getKeysPaged",
                format!("unexpected storage key {}", to_hex(&storage_key)),
            ));
        }

        let hash = to_hex(&storage_key[arg_start..]);
        Ok(Self { storage_key, hash })
    }

    /// The hash without its `0x` prefix, used as the file stem.
    pub fn file_stem(&self) -> &str {
        self.hash.strip_prefix("0x").unwrap_or(&self.hash)
    }
}

/// Decode a stored blob value (a SCALE-encoded byte vector).
///
/// # Errors
///
/// Returns [`FetchError::Query`] if the value is not exactly one encoded
/// byte vector.
pub fn decode_blob(value: &[u8]) -> Result<Vec<u8>, FetchError> {
    Vec::<u8>::decode_all(&mut &value[..])
        .map_err(|e| FetchError::query("state_getStorage", format!("malformed blob value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twox_128_known_vectors() {
        assert_eq!(
            hex::encode(twox_128(b"System")),
            "26aa394eea5630e07c48ae0c9558cef7"
        );
        assert_eq!(
            hex::encode(twox_128(b"Account")),
            "b99d880ec681799c0cf30e8886371da9"
        );
    }

    #[test]
    fn test_storage_prefix() {
        let prefix = storage_prefix("System", "Account");
        assert_eq!(prefix.len(), MAP_PREFIX_LEN);
        assert_eq!(
            to_hex(&prefix),
            "0x26aa394eea5630e07c48ae0c9558cef7b99d880ec681799c0cf30e8886371da9"
        );
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(to_hex(&[0xde, 0xad]), "0xdead");
        assert_eq!(from_hex("0xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(from_hex("dead").unwrap(), vec![0xde, 0xad]);
        assert!(from_hex("0xzz").is_err());
    }

    #[test]
    fn test_identity_key() {
        let prefix = storage_prefix("Paras", "CodeByHash");
        let mut raw = prefix.clone();
        raw.extend_from_slice(&[0xab; 32]);

        let key = BlobKey::from_storage_key(&prefix, KeyHasherKind::Identity, raw.clone()).unwrap();

        assert_eq!(key.hash, format!("0x{}", "ab".repeat(32)));
        assert_eq!(key.file_stem(), "ab".repeat(32));
        assert_eq!(key.storage_key, raw);
    }

    #[test]
    fn test_concat_hasher_keys() {
        let prefix = storage_prefix("Preimage", "PreimageFor");

        let mut raw = prefix.clone();
        raw.extend_from_slice(&[0xff; 16]);
        raw.extend_from_slice(&[0x01, 0x02]);
        let key = BlobKey::from_storage_key(&prefix, KeyHasherKind::Blake2_128Concat, raw).unwrap();
        assert_eq!(key.hash, "0x0102");

        let mut raw = prefix.clone();
        raw.extend_from_slice(&[0xee; 8]);
        raw.extend_from_slice(&[0x03]);
        let key = BlobKey::from_storage_key(&prefix, KeyHasherKind::Twox64Concat, raw).unwrap();
        assert_eq!(key.hash, "0x03");
    }

    #[test]
    fn test_foreign_or_truncated_key() {
        let prefix = storage_prefix("Paras", "CodeByHash");

        let mut foreign = storage_prefix("Paras", "Heads");
        foreign.push(0x01);
        assert!(BlobKey::from_storage_key(&prefix, KeyHasherKind::Identity, foreign).is_err());

        let bare = prefix.clone();
        assert!(BlobKey::from_storage_key(&prefix, KeyHasherKind::Identity, bare).is_err());
    }

    #[test]
    fn test_decode_blob() {
        // compact(3) ++ bytes
        assert_eq!(decode_blob(&[0x0c, 1, 2, 3]).unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_blob(&[0x00]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_blob_rejects_malformed() {
        // Claims 3 bytes, carries 2
        assert!(decode_blob(&[0x0c, 1, 2]).is_err());
        // Trailing garbage
        assert!(decode_blob(&[0x04, 1, 2]).is_err());
    }
}
