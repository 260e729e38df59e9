//! Opaque identifier generation.
//!
//! Ids are `{prefix}-{hex}` where the hex digits come from a random v4 UUID.
//! They are never reused; deleting an entity only removes its map entry.

use uuid::Uuid;

pub const SESSION_PREFIX: &str = "session";
pub const PROJECT_PREFIX: &str = "proj";
pub const EXPERIMENT_PREFIX: &str = "exp";
pub const DATASET_PREFIX: &str = "ds";

/// Generates `{prefix}-{hex}` with `hex_len` random hex digits (max 32).
pub fn generate_id(prefix: &str, hex_len: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &hex[..hex_len.min(hex.len())])
}

pub fn session_id() -> String {
    generate_id(SESSION_PREFIX, 12)
}

pub fn project_id() -> String {
    generate_id(PROJECT_PREFIX, 8)
}

pub fn experiment_id() -> String {
    generate_id(EXPERIMENT_PREFIX, 8)
}

pub fn dataset_id() -> String {
    generate_id(DATASET_PREFIX, 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_has_prefix_and_hex_suffix() {
        let id = generate_id("proj", 8);
        let (prefix, hex) = id.split_once('-').unwrap();
        assert_eq!(prefix, "proj");
        assert_eq!(hex.len(), 8);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_ids_use_twelve_digits() {
        assert_eq!(session_id().len(), "session-".len() + 12);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = dataset_id();
        let b = dataset_id();
        assert_ne!(a, b);
    }
}
