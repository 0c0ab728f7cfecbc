use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Number of digest bytes kept in a derived part id.
const PART_ID_BYTES: usize = 8;

/// Derive a stable id for a parts-search result that arrived without one.
///
/// Computes `SHA-256(len || name || len || part_number || len || supplier || price_cents)`
/// and keeps the first 8 bytes as hex. Each text field is length-prefixed
/// (little-endian u32) to prevent concatenation collisions; the price is
/// hashed in integer cents so `12.5` and `12.50` agree.
pub fn derive_part_id(name: &str, part_number: &str, supplier: &str, unit_price: f64) -> String {
    let mut hasher = Sha256::new();

    for field in [name.trim(), part_number.trim(), supplier.trim()] {
        let bytes = field.as_bytes();
        hasher.update((bytes.len() as u32).to_le_bytes());
        hasher.update(bytes);
    }
    let cents = (unit_price * 100.0).round() as i64;
    hasher.update(cents.to_le_bytes());

    let hash: [u8; 32] = hasher.finalize().into();
    format!("part-{}", hex::encode(&hash[..PART_ID_BYTES]))
}

/// Fresh id for a damage center created without one.
pub fn new_center_id() -> String {
    format!("dc-{}", Uuid::new_v4().simple())
}
