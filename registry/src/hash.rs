use sha2::{Digest, Sha256};

pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// The registry export's aggregate hash: SHA-256 over every tracked entry
/// hash, sorted lexicographically then concatenated.
pub fn aggregate_hash<'a>(hashes: impl Iterator<Item = &'a str>) -> String {
    let mut sorted: Vec<&str> = hashes.collect();
    sorted.sort_unstable();
    content_hash(sorted.concat().as_bytes())
}

pub fn next_version(previous: Option<&str>) -> String {
    match previous {
        None => "v1".to_string(),
        Some(v) => {
            let n: u64 = v.strip_prefix('v').and_then(|rest| rest.parse().ok()).unwrap_or(0);
            format!("v{}", n + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_version_increments_the_numeric_suffix() {
        assert_eq!(next_version(None), "v1");
        assert_eq!(next_version(Some("v1")), "v2");
        assert_eq!(next_version(Some("v9")), "v10");
    }

    #[test]
    fn aggregate_hash_is_order_independent_of_input_iteration() {
        let a = aggregate_hash(vec!["b", "a", "c"].into_iter());
        let b = aggregate_hash(vec!["c", "b", "a"].into_iter());
        assert_eq!(a, b);
    }
}
