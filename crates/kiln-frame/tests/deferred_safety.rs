//! Nothing released during a frame is freed before the device retires it.

use kiln_arena::SubAllocation;
use kiln_core::{CompletionValue, Device};
use kiln_frame::{FrameConfig, FramePipeline, RenderHeaps};
use kiln_test_utils::fixtures::{buffer_config, descriptor_configs};
use kiln_test_utils::ManualTimeline;

fn config(frames_in_flight: u32) -> FrameConfig {
    FrameConfig {
        frames_in_flight,
        host_chunk_size: 256,
        scratch_buffer_chunk_size: 256,
        scratch_buffer_initial_chunks: 0,
        scratch_descriptor_chunk_size: 16,
        stack_chunk_size: 256,
        ..FrameConfig::default()
    }
}

#[test]
fn release_waits_a_full_ring() {
    for depth in 1..=3u32 {
        let mut heaps = RenderHeaps::new(&buffer_config(4096), &descriptor_configs(256)).unwrap();
        let mut pipeline = FramePipeline::new(config(depth), ManualTimeline::new(), &mut heaps).unwrap();

        let mut ctx = pipeline.begin(&mut heaps).unwrap();
        let mut a = ctx.allocate_buffer(64, 16).unwrap();
        let copy = a;
        ctx.safe_release(&mut a);
        pipeline.end().unwrap();

        for _ in 1..depth {
            pipeline.begin(&mut heaps).unwrap();
            pipeline.end().unwrap();
            assert!(heaps.buffers.size(&copy).is_some(), "freed early at depth {depth}");
        }

        pipeline.begin(&mut heaps).unwrap();
        assert!(heaps.buffers.size(&copy).is_none());
        assert!(pipeline
            .device()
            .completed_value()
            .has_reached(CompletionValue(1)));
        pipeline.end().unwrap();
    }
}

#[cfg(not(miri))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn released_ranges_outlive_their_frame(
            depth in 1u32..=4,
            frames in prop::collection::vec((0u32..4, any::<u8>(), 0u64..=3), 1..40),
        ) {
            let mut heaps = RenderHeaps::new(&buffer_config(64 * 1024), &descriptor_configs(256)).unwrap();
            let mut pipeline = FramePipeline::new(config(depth), ManualTimeline::new(), &mut heaps).unwrap();
            let mut live: Vec<SubAllocation> = Vec::new();
            let mut pending: Vec<(SubAllocation, u32, CompletionValue)> = Vec::new();

            for (allocs, mask, lag) in frames {
                let mut released = Vec::new();
                let freed: Vec<CompletionValue>;
                {
                    let mut ctx = pipeline.begin(&mut heaps).unwrap();
                    let buffers = &ctx.heaps().buffers;
                    freed = pending
                        .iter()
                        .filter(|(a, size, _)| buffers.size(a) != Some(*size))
                        .map(|&(_, _, target)| target)
                        .collect();
                    for i in 0..allocs {
                        live.push(ctx.allocate_buffer(32 + i * 16, 16).unwrap());
                    }
                    let mut kept = Vec::new();
                    for (i, mut a) in live.drain(..).enumerate() {
                        if mask & (1 << (i % 8)) != 0 {
                            let copy = a;
                            prop_assert!(ctx.safe_release(&mut a));
                            prop_assert!(!a.is_valid());
                            released.push(copy);
                        } else {
                            kept.push(a);
                        }
                    }
                    live = kept;
                }
                let target = pipeline.end().unwrap();
                let now = pipeline.device().completed_value();
                for t in freed {
                    prop_assert!(now.has_reached(t), "range from frame {} freed at {}", t, now);
                }
                for a in released {
                    let size = heaps.buffers.size(&a).unwrap();
                    pending.push((a, size, target));
                }

                let completed = CompletionValue(target.0.saturating_sub(lag));
                pipeline.device_mut().complete(completed);
                let now = pipeline.device().completed_value();
                for (a, size, t) in &pending {
                    if !now.has_reached(*t) {
                        prop_assert_eq!(heaps.buffers.size(a), Some(*size));
                    }
                }
                pending.retain(|(_, _, t)| !now.has_reached(*t));
            }

            pipeline.flush(&mut heaps).unwrap();
            prop_assert_eq!(heaps.buffers.diagnostics().live_allocations, live.len());
        }
    }
}
