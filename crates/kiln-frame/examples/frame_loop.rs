//! Kiln frame loop against a simulated device.
//!
//! Demonstrates:
//!   1. Creating the shared heaps and a frame pipeline
//!   2. Uploading per-frame constants into scratch buffer memory
//!   3. Creating persistent buffers and views, then releasing them safely
//!   4. Reading frame metrics and heap diagnostics
//!   5. Flushing and shutting down
//!
//! Run with:
//!   cargo run --example frame_loop

use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use kiln_core::{Device, ResourceId};
use kiln_frame::{FrameConfig, FrameError, FramePipeline, RenderHeaps, ThreadedTimeline};
use kiln_heap::{BufferHeapConfig, DescriptorHeapConfig, DescriptorHeapKind, ViewDescriptor};

// ─── Per-frame constants ────────────────────────────────────────

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct FrameConstants {
    view_projection: [[f32; 4]; 4],
    time: f32,
    frame: u32,
    _pad: [u32; 2],
}

const FRAMES: u32 = 12;
const DEVICE_LATENCY: Duration = Duration::from_millis(8);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    // ─── Heaps and pipeline ─────────────────────────────────────

    let mut heaps = RenderHeaps::new(
        &BufferHeapConfig {
            name: "frame loop buffers".into(),
            ..BufferHeapConfig::new(16 * 1024 * 1024)
        },
        &DescriptorHeapKind::ALL.map(DescriptorHeapConfig::for_kind),
    )?;
    let device = ThreadedTimeline::new(DEVICE_LATENCY)?;
    let config = FrameConfig {
        frames_in_flight: 2,
        scratch_buffer_chunk_size: 256 * 1024,
        host_chunk_size: 64 * 1024,
        ..FrameConfig::default()
    };
    let mut pipeline = FramePipeline::new(config, device, &mut heaps)?;

    // ─── Frame loop ─────────────────────────────────────────────

    for frame in 0..FRAMES {
        let mut ctx = pipeline.begin(&mut heaps)?;

        let constants = FrameConstants {
            view_projection: identity(),
            time: frame as f32 / 60.0,
            frame,
            _pad: [0; 2],
        };
        let uploaded = ctx.write_scratch(std::slice::from_ref(&constants))?;

        // A short-lived mesh: created this frame, retired immediately.
        let mut vertices = ctx.allocate_buffer(4096, 256)?;
        ctx.write_buffer(vertices.offset(), &[0.0f32; 64])?;
        let mut view = ctx.create_view(ViewDescriptor::ShaderResource {
            resource: ResourceId(u64::from(frame)),
        })?;

        let table = ctx.scratch_descriptors(4)?;
        ctx.write_view(
            table.id(0),
            ViewDescriptor::ShaderResource {
                resource: ResourceId(1000 + u64::from(frame)),
            },
        )?;

        {
            let mut scope = ctx.stack_scope();
            let draw_keys = scope.allocate::<u64>(32)?;
            for (i, key) in draw_keys.iter_mut().enumerate() {
                *key = ((i as u64) << 32) | u64::from(frame);
            }
            draw_keys.sort_unstable();
        }

        let address = ctx.device_address(uploaded.offset);
        ctx.safe_release(&mut vertices);
        ctx.safe_release(&mut view);

        let target = pipeline.end()?;
        let metrics = pipeline.metrics();
        println!(
            "frame {frame:>2}: target {target}, constants at {address:#x}, waited {:?}, drained {}, scratch {} B",
            metrics.wait_time,
            metrics.drained.total(),
            metrics.scratch_buffer_bytes,
        );
    }

    // ─── Diagnostics and shutdown ───────────────────────────────

    let diagnostics = pipeline.diagnostics();
    println!(
        "submitted {}, completed {}, pending releases {}",
        diagnostics.submitted,
        diagnostics.completed,
        diagnostics.pending_releases(),
    );
    if let Some(fps) = pipeline.timer().frames_per_second() {
        println!("average frame rate: {fps:.1} fps");
    }

    let device = match pipeline.shutdown(&mut heaps) {
        Ok(device) => device,
        Err(FrameError::DeviceLost { reason }) => {
            eprintln!("device lost during shutdown: {reason}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    println!("device retired {} frames", device.completed_value());

    let buffers = heaps.buffers.diagnostics();
    println!(
        "buffer heap: {} / {} bytes used, high water {}",
        buffers.used, buffers.capacity, buffers.high_water
    );
    Ok(())
}

fn identity() -> [[f32; 4]; 4] {
    let mut m = [[0.0; 4]; 4];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}
