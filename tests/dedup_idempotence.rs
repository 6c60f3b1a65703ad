// tests/dedup_idempotence.rs
mod common;

use common::{at, record};
use fire_incident_monitor::dedup::{DedupKey, Deduplicator};

#[test]
fn is_new_is_true_at_most_once_per_title_and_source() {
    let mut d = Deduplicator::new();
    let recs = vec![
        record("Brush fire in Sylmar", "KTLA", "Los Angeles", at(6, 0)),
        record("Brush fire in Sylmar", "KTLA", "Pasadena", at(7, 0)),
        record("Brush fire in Sylmar", "LAist", "Los Angeles", at(6, 0)),
        record("Brush fire in Sylmar", "KTLA", "Glendale", at(9, 0)),
    ];

    let admitted: Vec<bool> = recs.iter().map(|r| d.is_new(r)).collect();
    assert_eq!(admitted, [true, false, true, false]);

    for _ in 0..5 {
        for r in &recs {
            assert!(!d.is_new(r));
        }
    }
    assert_eq!(d.len(), 2);
}

#[test]
fn keys_are_case_and_whitespace_sensitive() {
    // identity is the exact pair; normalization is the adapters' job
    assert_ne!(DedupKey::new("Fire", "KTLA"), DedupKey::new("fire", "KTLA"));
    assert_ne!(DedupKey::new("Fire ", "KTLA"), DedupKey::new("Fire", "KTLA"));
}
