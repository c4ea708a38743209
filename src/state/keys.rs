//! Key layout for the `state` partition
//!
//! - `sync:next_batch` -> resumption cursor (UTF-8)
//! - `member:{user_id}` -> "1", one key per known participant

pub const SYNC_CURSOR_KEY: &[u8] = b"sync:next_batch";

pub const MEMBER_PREFIX: &str = "member:";

/// Largest key fjall accepts
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Encode a member key: member:{user_id}
pub fn encode_member_key(user_id: &str) -> Vec<u8> {
    format!("{MEMBER_PREFIX}{user_id}").into_bytes()
}

/// Decode a member key: member:{user_id} -> user_id
pub fn decode_member_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix(MEMBER_PREFIX).map(String::from)
}
