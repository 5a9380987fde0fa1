//! Session token and pseudo-identifier derivation.
//!
//! Neither value is a credential. The pseudo-identifier folds the current
//! epoch milliseconds into its input, so it is effectively a per-load nonce
//! and must not be expected to match across sessions.

use crate::fingerprint::EnvironmentSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the random part of a session id.
const SESSION_TOKEN_LEN: usize = 9;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identity of one gate session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    /// `session_<9 base36 chars>_<epoch millis>`, random per load
    pub session_id: String,
    /// Rolling hash of agent string, screen size and epoch millis
    pub pseudo_user_id: u32,
}

impl SessionIdentity {
    /// Derive an identity from a snapshot at the given instant.
    pub fn derive(snapshot: &EnvironmentSnapshot, now: DateTime<Utc>) -> Self {
        let (width, height) = snapshot.screen_dimensions();
        let epoch_ms = now.timestamp_millis();
        Self {
            session_id: session_id(epoch_ms),
            pseudo_user_id: pseudo_user_id(snapshot.agent_string(), width, height, epoch_ms),
        }
    }
}

/// 32-bit rolling hash over UTF-16 code units: `h = (h << 5) - h + c`,
/// wrapping on overflow.
pub fn rolling_hash(input: &str) -> i32 {
    input.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

/// `|hash(agent + width + height + epoch_ms)|`
pub fn pseudo_user_id(agent: &str, width: u32, height: u32, epoch_ms: i64) -> u32 {
    rolling_hash(&format!("{agent}{width}{height}{epoch_ms}")).unsigned_abs()
}

/// `session_` + 9 random base36 chars + `_` + epoch millis.
pub fn session_id(epoch_ms: i64) -> String {
    format!("session_{}_{epoch_ms}", random_base36(SESSION_TOKEN_LEN))
}

fn random_base36(len: usize) -> String {
    (0..len)
        .map(|_| char::from(BASE36[rand::random::<u32>() as usize % BASE36.len()]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_hash_matches_reference_values() {
        assert_eq!(rolling_hash(""), 0);
        assert_eq!(rolling_hash("a"), 97);
        // 97 * 31 + 98
        assert_eq!(rolling_hash("ab"), 3105);
        // Same accumulator as Java's String.hashCode
        assert_eq!(rolling_hash("hello"), 99162322);
    }

    #[test]
    fn test_rolling_hash_wraps() {
        let long = "z".repeat(64);
        // Must not panic on overflow
        let _ = rolling_hash(&long);
    }

    #[test]
    fn test_pseudo_user_id_depends_on_time() {
        let agent = "Mozilla/5.0";
        let a = pseudo_user_id(agent, 1920, 1080, 1_700_000_000_000);
        let b = pseudo_user_id(agent, 1920, 1080, 1_700_000_000_000);
        let c = pseudo_user_id(agent, 1920, 1080, 1_700_000_000_001);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_session_id_format() {
        let id = session_id(1_700_000_000_000);
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert_eq!(parts[1].len(), 9);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_eq!(parts[2], "1700000000000");
    }

    #[test]
    fn test_session_ids_are_random() {
        assert_ne!(session_id(0), session_id(0));
    }
}
