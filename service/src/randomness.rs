// Seeded selection used for ticket ids and winner draws
use rand::{rngs::OsRng, RngCore};
use solana_program::hash::{hashv, Hash};
use std::collections::BTreeSet;

/// Draw a fresh 32-byte seed from the operating system CSPRNG
pub fn fresh_seed() -> Hash {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Hash::new_from_array(bytes)
}

/// Uniform index in `0..bound` derived from `seed` and `round`.
///
/// Candidates are the first 8 bytes of `sha256(seed || round || counter)`;
/// values in the incomplete top bucket are rejected so every index is
/// equally likely.
pub fn uniform_index(seed: &Hash, round: u64, bound: u64) -> u64 {
    if bound <= 1 {
        return 0;
    }

    let zone = u64::MAX - (u64::MAX % bound);
    let mut counter = 0u64;
    loop {
        let digest = hashv(&[seed.as_ref(), &round.to_le_bytes(), &counter.to_le_bytes()]);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.as_ref()[..8]);
        let value = u64::from_le_bytes(bytes);
        if value < zone {
            return value % bound;
        }
        counter += 1;
    }
}

/// Pick `count` distinct ids from `1..=max_id` that are not in `issued`.
///
/// Ranks among the free ids are drawn with Floyd's algorithm and then mapped
/// to ids by walking the gaps of `issued`, so the cost grows with `count` and
/// `issued.len()`, never with `max_id`. Returns every free id when fewer than
/// `count` remain. Ids come back in ascending order.
pub fn sample_unissued(seed: &Hash, issued: &BTreeSet<u32>, max_id: u32, count: usize) -> Vec<u32> {
    let free = free_ids(issued, max_id);
    let count = (count as u64).min(free);

    let mut ranks = BTreeSet::new();
    for j in (free - count)..free {
        let pick = uniform_index(seed, j, j + 1);
        if !ranks.insert(pick) {
            ranks.insert(j);
        }
    }

    let mut taken = issued.range(1..=max_id).peekable();
    let mut skipped = 0u64;
    let mut ids = Vec::with_capacity(ranks.len());
    for rank in ranks {
        let mut candidate = rank + 1 + skipped;
        while let Some(&&id) = taken.peek() {
            if u64::from(id) > candidate {
                break;
            }
            skipped += 1;
            candidate += 1;
            taken.next();
        }
        ids.push(candidate as u32);
    }
    ids
}

/// Ids in `1..=max_id` not yet issued
pub fn free_ids(issued: &BTreeSet<u32>, max_id: u32) -> u64 {
    u64::from(max_id) - issued.range(1..=max_id).count() as u64
}
