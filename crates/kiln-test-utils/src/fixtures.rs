//! Small heap configurations for tests.

use kiln_heap::{BufferHeapConfig, DescriptorHeapConfig, DescriptorHeapKind};

/// A host-visible buffer heap of `size` bytes.
pub fn buffer_config(size: u32) -> BufferHeapConfig {
    BufferHeapConfig {
        name: "test buffer heap".into(),
        ..BufferHeapConfig::new(size)
    }
}

/// Descriptor tables of `capacity` slots each, in
/// [`DescriptorHeapKind::ALL`] order.
pub fn descriptor_configs(capacity: u32) -> [DescriptorHeapConfig; 3] {
    DescriptorHeapKind::ALL.map(|kind| DescriptorHeapConfig::new(kind, capacity))
}

/// Deterministic byte pattern of `len` bytes seeded by `seed`.
pub fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_add((i as u8).wrapping_mul(31)))
        .collect()
}
