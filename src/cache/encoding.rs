// Compact binary encoding shared by the L1 and L2 cache tiers so a promotion
// from L2 into L1 is a copy, never a re-encode. Format: 1-byte version, then
// varint/length-prefixed fields in a fixed canonical order. Unknown version
// is treated as a decode failure, which callers fold into a cache miss.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::models::cache_entry::CacheEntry;
use crate::models::link::RedirectKind;

const VERSION: u8 = 2;

const FLAG_DISABLED: u8 = 0b0000_0001;
const FLAG_PASSWORD_PROTECTED: u8 = 0b0000_0010;
const FLAG_TRACK_BOTS: u8 = 0b0000_0100;
const FLAG_WEBHOOKS_ENABLED: u8 = 0b0000_1000;
const FLAG_REALTIME_ENABLED: u8 = 0b0001_0000;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unsupported cache entry version: {0}")]
    UnsupportedVersion(u8),
    #[error("truncated cache entry payload")]
    Truncated,
    #[error("invalid utf-8 in cache entry payload")]
    InvalidUtf8,
}

pub fn encode(entry: &CacheEntry) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    buf.push(VERSION);

    write_uuid(&mut buf, entry.id);
    write_str(&mut buf, &entry.short_code);
    write_uuid(&mut buf, entry.workspace_id);
    write_option_uuid(&mut buf, entry.domain_id);
    write_str(&mut buf, &entry.destination);
    buf.push(entry.redirect_kind.as_i16() as u8);
    write_option_timestamp(&mut buf, entry.expires_at);

    let mut flags = 0u8;
    if entry.disabled {
        flags |= FLAG_DISABLED;
    }
    if entry.password_protected {
        flags |= FLAG_PASSWORD_PROTECTED;
    }
    if entry.track_bots {
        flags |= FLAG_TRACK_BOTS;
    }
    if entry.webhooks_enabled {
        flags |= FLAG_WEBHOOKS_ENABLED;
    }
    if entry.realtime_enabled {
        flags |= FLAG_REALTIME_ENABLED;
    }
    buf.push(flags);

    write_varint(&mut buf, entry.platform_overrides.len() as u64);
    for (platform, destination) in &entry.platform_overrides {
        write_str(&mut buf, platform);
        write_str(&mut buf, destination);
    }

    write_timestamp(&mut buf, entry.cached_at);
    buf
}

pub fn decode(bytes: &[u8]) -> Result<CacheEntry, CodecError> {
    let mut cursor = Cursor::new(bytes);

    let version = cursor.read_u8()?;
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let id = cursor.read_uuid()?;
    let short_code = cursor.read_str()?;
    let workspace_id = cursor.read_uuid()?;
    let domain_id = cursor.read_option_uuid()?;
    let destination = cursor.read_str()?;
    let redirect_kind = RedirectKind::from(cursor.read_u8()? as i16);
    let expires_at = cursor.read_option_timestamp()?;

    let flags = cursor.read_u8()?;
    let disabled = flags & FLAG_DISABLED != 0;
    let password_protected = flags & FLAG_PASSWORD_PROTECTED != 0;
    let track_bots = flags & FLAG_TRACK_BOTS != 0;
    let webhooks_enabled = flags & FLAG_WEBHOOKS_ENABLED != 0;
    let realtime_enabled = flags & FLAG_REALTIME_ENABLED != 0;

    let override_count = cursor.read_varint()?;
    let mut platform_overrides = Vec::with_capacity(override_count as usize);
    for _ in 0..override_count {
        let platform = cursor.read_str()?;
        let destination = cursor.read_str()?;
        platform_overrides.push((platform, destination));
    }

    let cached_at = cursor.read_timestamp()?;

    Ok(CacheEntry {
        id,
        workspace_id,
        domain_id,
        short_code,
        destination,
        redirect_kind,
        expires_at,
        disabled,
        password_protected,
        track_bots,
        webhooks_enabled,
        realtime_enabled,
        platform_overrides,
        cached_at,
    })
}

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_varint(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn write_uuid(buf: &mut Vec<u8>, id: Uuid) {
    buf.extend_from_slice(id.as_bytes());
}

fn write_option_uuid(buf: &mut Vec<u8>, id: Option<Uuid>) {
    match id {
        Some(id) => {
            buf.push(1);
            write_uuid(buf, id);
        }
        None => buf.push(0),
    }
}

fn write_timestamp(buf: &mut Vec<u8>, ts: DateTime<Utc>) {
    write_varint(buf, ts.timestamp_millis().max(0) as u64);
}

fn write_option_timestamp(buf: &mut Vec<u8>, ts: Option<DateTime<Utc>>) {
    match ts {
        Some(ts) => {
            buf.push(1);
            write_timestamp(buf, ts);
        }
        None => buf.push(0),
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        let byte = *self.bytes.get(self.pos).ok_or(CodecError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_varint(&mut self) -> Result<u64, CodecError> {
        let mut value = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(value)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(len).ok_or(CodecError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(CodecError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn read_str(&mut self) -> Result<String, CodecError> {
        let len = self.read_varint()? as usize;
        let slice = self.read_bytes(len)?;
        std::str::from_utf8(slice)
            .map(|s| s.to_string())
            .map_err(|_| CodecError::InvalidUtf8)
    }

    fn read_uuid(&mut self) -> Result<Uuid, CodecError> {
        let slice = self.read_bytes(16)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(slice);
        Ok(Uuid::from_bytes(raw))
    }

    fn read_option_uuid(&mut self) -> Result<Option<Uuid>, CodecError> {
        match self.read_u8()? {
            0 => Ok(None),
            _ => Ok(Some(self.read_uuid()?)),
        }
    }

    fn read_timestamp(&mut self) -> Result<DateTime<Utc>, CodecError> {
        let millis = self.read_varint()? as i64;
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or(CodecError::Truncated)
    }

    fn read_option_timestamp(&mut self) -> Result<Option<DateTime<Utc>>, CodecError> {
        match self.read_u8()? {
            0 => Ok(None),
            _ => Ok(Some(self.read_timestamp()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::link::RedirectKind;

    fn sample_entry() -> CacheEntry {
        CacheEntry {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            domain_id: Some(Uuid::new_v4()),
            short_code: "abc123".to_string(),
            destination: "https://example.com/target".to_string(),
            redirect_kind: RedirectKind::Temporary,
            expires_at: Some(Utc::now()),
            disabled: false,
            password_protected: true,
            track_bots: false,
            webhooks_enabled: true,
            realtime_enabled: true,
            platform_overrides: vec![("ios".to_string(), "https://apps.apple.com/x".to_string())],
            cached_at: Utc::now(),
        }
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let entry = sample_entry();
        let bytes = encode(&entry);
        let decoded = decode(&bytes).expect("decode should succeed");

        assert_eq!(decoded.id, entry.id);
        assert_eq!(decoded.short_code, entry.short_code);
        assert_eq!(decoded.destination, entry.destination);
        assert_eq!(decoded.domain_id, entry.domain_id);
        assert_eq!(decoded.password_protected, entry.password_protected);
        assert_eq!(decoded.webhooks_enabled, entry.webhooks_enabled);
        assert_eq!(decoded.realtime_enabled, entry.realtime_enabled);
        assert_eq!(decoded.platform_overrides, entry.platform_overrides);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = encode(&sample_entry());
        bytes[0] = 0xff;
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::UnsupportedVersion(0xff))
        ));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let bytes = encode(&sample_entry());
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(decode(truncated), Err(CodecError::Truncated)));
    }
}
