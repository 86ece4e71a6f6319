//! Rule hashing utilities.
//!
//! This module provides the [`RuleHasher`] type used to compute a stable
//! SHA-256 digest for [`Rule`] definitions. Sessions record the digest of
//! every rule they emit so a second emission under the same name can be
//! recognised as either a harmless repeat or a conflicting redefinition.
//!
//! # Examples
//!
//! ```
//! use tsugite::hasher::RuleHasher;
//! use tsugite::ir::Rule;
//!
//! let rule = Rule::new("C_COMPILER__app", "cc -c $in -o $out");
//! let hash = RuleHasher::hash(&rule);
//! assert_eq!(hash.len(), 64);
//! ```

use sha2::{Digest, Sha256};

use crate::ir::Rule;

/// Computes stable digests for [`Rule`] definitions.
pub struct RuleHasher;

impl RuleHasher {
    /// Calculate the hash of a [`Rule`].
    #[must_use]
    pub fn hash(rule: &Rule) -> String {
        let mut hasher = Sha256::new();
        Self::update_with_len(&mut hasher, rule.name.as_bytes());
        Self::update_with_len(&mut hasher, rule.command.as_bytes());
        Self::hash_optional_fields(&mut hasher, rule);
        format!("{:x}", hasher.finalize())
    }

    fn hash_optional_fields(hasher: &mut Sha256, rule: &Rule) {
        Self::hash_optional_string(hasher, rule.description.as_ref());
        Self::hash_optional_string(hasher, rule.depfile.as_ref());
        Self::hash_optional_string(hasher, rule.deps.as_ref());
        Self::hash_optional_string(hasher, rule.msvc_deps_prefix.as_ref());
        Self::hash_optional_string(hasher, rule.rspfile.as_ref());
        Self::hash_optional_string(hasher, rule.rspfile_content.as_ref());
        hasher.update(if rule.restat { b"1" } else { b"0" });
        hasher.update(if rule.generator { b"1" } else { b"0" });
    }

    fn hash_optional_string(hasher: &mut Sha256, value: Option<&String>) {
        match value {
            Some(v) => {
                hasher.update(b"1");
                Self::update_with_len(hasher, v.as_bytes());
            }
            None => hasher.update(b"0"),
        }
    }

    fn update_with_len(hasher: &mut Sha256, bytes: &[u8]) {
        let len = bytes.len();
        hasher.update(format!("{len}:").as_bytes());
        hasher.update(bytes);
    }
}

/// First eight hex digits of the SHA-256 of `text`.
///
/// Used to derive stable suffixes from directory names.
#[must_use]
pub fn short_digest(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}
