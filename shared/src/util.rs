/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a Snowflake-style i64 for use as resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random (4096 values per ms, collision-free at POS scale)
pub fn snowflake_id() -> i64 {
    use rand::Rng;
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let now = now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    (ts << 12) | rand_bits
}

/// Canonical SHA-256 hash of a JSON payload (hex-encoded).
///
/// Object keys are sorted recursively before hashing so that
/// semantically-identical payloads with reordered keys produce the same
/// digest. Top-level fields listed in `strip` (idempotency control fields
/// that are not part of the request semantics) are removed first.
pub fn canonical_payload_hash(payload: &serde_json::Value, strip: &[&str]) -> String {
    use sha2::{Digest, Sha256};

    let mut buf = String::new();
    match payload {
        serde_json::Value::Object(map) => {
            let mut filtered = serde_json::Map::new();
            for (k, v) in map {
                if !strip.contains(&k.as_str()) {
                    filtered.insert(k.clone(), v.clone());
                }
            }
            write_canonical(&serde_json::Value::Object(filtered), &mut buf);
        }
        other => write_canonical(other, &mut buf),
    }

    let mut hasher = Sha256::new();
    hasher.update(buf.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serialize a JSON value with recursively sorted object keys.
fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_ignores_key_order() {
        let a = json!({"b": 1, "a": {"y": 2, "x": [1, 2]}});
        let b = json!({"a": {"x": [1, 2], "y": 2}, "b": 1});
        assert_eq!(
            canonical_payload_hash(&a, &[]),
            canonical_payload_hash(&b, &[])
        );
    }

    #[test]
    fn hash_strips_control_fields() {
        let a = json!({"idempotency_key": "k1", "amount": 5});
        let b = json!({"idempotency_key": "k2", "amount": 5});
        assert_eq!(
            canonical_payload_hash(&a, &["idempotency_key"]),
            canonical_payload_hash(&b, &["idempotency_key"])
        );
    }

    #[test]
    fn hash_distinguishes_values() {
        let a = json!({"amount": 5});
        let b = json!({"amount": 6});
        assert_ne!(
            canonical_payload_hash(&a, &[]),
            canonical_payload_hash(&b, &[])
        );
    }

    #[test]
    fn hash_array_order_matters() {
        let a = json!({"items": [1, 2]});
        let b = json!({"items": [2, 1]});
        assert_ne!(
            canonical_payload_hash(&a, &[]),
            canonical_payload_hash(&b, &[])
        );
    }
}
