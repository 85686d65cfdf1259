//! Benchmark workloads for Kiln.
//!
//! - [`churn_workload`]: deterministic allocate/free mix for free-list
//!   benchmarks
//! - [`frame_profile`]: a frame pipeline configuration sized like a
//!   small renderer

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use kiln_frame::FrameConfig;

/// One step of a churn workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChurnOp {
    /// Allocate this many bytes.
    Allocate(u32),
    /// Free the live allocation at this position (modulo the live count).
    Free(usize),
}

/// Generate `len` deterministic churn operations.
///
/// Roughly three allocations for every two frees, sizes in
/// `16..16 + max_size`, derived from `seed` with a 64-bit LCG.
pub fn churn_workload(len: usize, max_size: u32, seed: u64) -> Vec<ChurnOp> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };
    (0..len)
        .map(|_| {
            let r = next();
            if r % 5 < 3 {
                ChurnOp::Allocate(16 + (next() % u64::from(max_size.max(1))) as u32)
            } else {
                ChurnOp::Free(next() as usize)
            }
        })
        .collect()
}

/// Frame configuration for pipeline benchmarks: three frames in flight,
/// 256 KiB scratch chunks.
pub fn frame_profile() -> FrameConfig {
    FrameConfig {
        frames_in_flight: 3,
        host_chunk_size: 256 * 1024,
        scratch_buffer_chunk_size: 256 * 1024,
        stack_chunk_size: 64 * 1024,
        ..FrameConfig::default()
    }
}
