//! Deterministic identifier derivation.
//!
//! Two sources, deliberately kept apart:
//! - `uuid_from_rng` draws from the simulation's single RNG stream and is
//!   used only inside the tick loop (job arrivals, random failures).
//! - `uuid_from_seq` derives an id from the config seed and a per-engine
//!   counter via splitmix64, so manual operations (API submits, manual
//!   failure injection) never perturb the tick stream. Without this split,
//!   injecting and resolving a failure would shift every subsequent random
//!   draw and break replay identity.

use rand::rngs::StdRng;
use rand::Rng;
use uuid::Uuid;

/// UUID drawn from the shared simulation stream. Tick-loop use only.
pub fn uuid_from_rng(rng: &mut StdRng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// UUID derived from (seed, sequence) without touching any RNG stream.
pub fn uuid_from_seq(seed: u64, seq: u64) -> Uuid {
    let a = splitmix64(seed ^ seq.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    let b = splitmix64(a);
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&a.to_le_bytes());
    bytes[8..].copy_from_slice(&b.to_le_bytes());
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_seq_ids_deterministic() {
        assert_eq!(uuid_from_seq(42, 0), uuid_from_seq(42, 0));
        assert_ne!(uuid_from_seq(42, 0), uuid_from_seq(42, 1));
        assert_ne!(uuid_from_seq(42, 0), uuid_from_seq(43, 0));
    }

    #[test]
    fn test_rng_ids_follow_stream() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        assert_eq!(uuid_from_rng(&mut a), uuid_from_rng(&mut b));
    }
}
