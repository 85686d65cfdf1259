//! Criterion benchmarks for the frame pipeline.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use kiln_core::{PipelineId, ResourceId};
use kiln_frame::{FramePipeline, RenderHeaps};
use kiln_test_utils::fixtures::{buffer_config, descriptor_configs};
use kiln_test_utils::ManualTimeline;

fn setup() -> (FramePipeline<ManualTimeline>, RenderHeaps) {
    let mut heaps = RenderHeaps::new(&buffer_config(64 * 1024 * 1024), &descriptor_configs(8192)).unwrap();
    let pipeline = FramePipeline::new(kiln_bench::frame_profile(), ManualTimeline::new(), &mut heaps).unwrap();
    (pipeline, heaps)
}

/// Benchmark: empty begin/end cycle with the device keeping up.
fn bench_empty_frame(c: &mut Criterion) {
    let (mut pipeline, mut heaps) = setup();
    c.bench_function("frame_empty", |b| {
        b.iter(|| {
            black_box(pipeline.begin(&mut heaps).unwrap().index());
            black_box(pipeline.end().unwrap());
            pipeline.device_mut().complete_all();
        });
    });
}

/// Benchmark: a frame with 256 scratch uploads, 64 scratch descriptors,
/// and 32 persistent allocations released through the deferred queue.
fn bench_busy_frame(c: &mut Criterion) {
    let (mut pipeline, mut heaps) = setup();
    let constants = [0.5f32; 64];
    let mut next_id = 0u64;
    c.bench_function("frame_busy", |b| {
        b.iter(|| {
            let mut ctx = pipeline.begin(&mut heaps).unwrap();
            for _ in 0..256 {
                black_box(ctx.write_scratch(&constants).unwrap());
            }
            black_box(ctx.scratch_descriptors(64).unwrap());
            for _ in 0..32 {
                let mut a = ctx.allocate_buffer(1024, 256).unwrap();
                ctx.safe_release(&mut a);
            }
            next_id += 1;
            ctx.safe_release(&mut Some(PipelineId(next_id)));
            ctx.safe_release(&mut Some(ResourceId(next_id)));
            black_box(pipeline.end().unwrap());
            pipeline.device_mut().complete_all();
        });
    });
}

criterion_group!(benches, bench_empty_frame, bench_busy_frame);
criterion_main!(benches);
