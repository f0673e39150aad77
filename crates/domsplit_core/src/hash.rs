use xxhash_rust::xxh3::xxh3_64;
use xxhash_rust::xxh3::Xxh3;

/// Hasher for identifiers that feed build caches.
///
/// The hashes don't need to be incredibly fast, but they must be stable across
/// runs, machines, platforms and versions.
pub type IdentifierHasher = Xxh3;

pub fn hash_string(s: String) -> String {
  hash_bytes(s.as_bytes())
}

pub fn hash_bytes(s: &[u8]) -> String {
  let res = xxh3_64(s);
  format!("{:016x}", res)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hash_is_stable_and_padded() {
    let first = hash_string(String::from("bundle:entry:1"));
    let second = hash_bytes(b"bundle:entry:1");

    assert_eq!(first, second);
    assert_eq!(first.len(), 16);
    assert_ne!(first, hash_string(String::from("bundle:entry:2")));
  }

  #[test]
  fn test_streaming_hasher_matches_one_shot() {
    let mut hasher = IdentifierHasher::new();
    hasher.update(b"bundle:");
    hasher.update(b"entry:1");

    assert_eq!(format!("{:016x}", hasher.digest()), hash_bytes(b"bundle:entry:1"));
  }
}
