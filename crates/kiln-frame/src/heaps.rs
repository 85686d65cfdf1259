//! The renderer's shared persistent heaps.

use kiln_heap::{
    BufferHeap, BufferHeapConfig, DescriptorHeap, DescriptorHeapConfig, DescriptorHeapKind,
    HeapDiagnostics, HeapError,
};

/// Every persistent heap a renderer allocates from, passed explicitly to
/// the frame pipeline.
pub struct RenderHeaps {
    /// The device buffer heap.
    pub buffers: BufferHeap,
    /// Shader-visible table of shader resource and unordered access views.
    pub shader_resources: DescriptorHeap,
    /// Render target view table.
    pub render_targets: DescriptorHeap,
    /// Depth-stencil view table.
    pub depth_stencils: DescriptorHeap,
}

impl RenderHeaps {
    /// Create all heaps. `descriptors` is in [`DescriptorHeapKind::ALL`]
    /// order.
    pub fn new(
        buffer: &BufferHeapConfig,
        descriptors: &[DescriptorHeapConfig; 3],
    ) -> Result<Self, HeapError> {
        let [srv, rtv, dsv] = descriptors;
        for (config, kind) in [srv, rtv, dsv].into_iter().zip(DescriptorHeapKind::ALL) {
            if config.kind != kind {
                return Err(HeapError::WrongDescriptorKind {
                    expected: kind,
                    found: config.kind,
                });
            }
        }
        Ok(Self {
            buffers: BufferHeap::new(buffer)?,
            shader_resources: DescriptorHeap::new(srv)?,
            render_targets: DescriptorHeap::new(rtv)?,
            depth_stencils: DescriptorHeap::new(dsv)?,
        })
    }

    /// A `buffer_size`-byte buffer heap and default-sized descriptor tables.
    pub fn with_buffer_size(buffer_size: u32) -> Result<Self, HeapError> {
        Self::new(
            &BufferHeapConfig::new(buffer_size),
            &DescriptorHeapKind::ALL.map(DescriptorHeapConfig::for_kind),
        )
    }

    /// The table holding descriptors of `kind`.
    pub fn descriptors(&self, kind: DescriptorHeapKind) -> &DescriptorHeap {
        match kind {
            DescriptorHeapKind::ShaderResource => &self.shader_resources,
            DescriptorHeapKind::RenderTarget => &self.render_targets,
            DescriptorHeapKind::DepthStencil => &self.depth_stencils,
        }
    }

    /// The table holding descriptors of `kind`, mutably.
    pub fn descriptors_mut(&mut self, kind: DescriptorHeapKind) -> &mut DescriptorHeap {
        match kind {
            DescriptorHeapKind::ShaderResource => &mut self.shader_resources,
            DescriptorHeapKind::RenderTarget => &mut self.render_targets,
            DescriptorHeapKind::DepthStencil => &mut self.depth_stencils,
        }
    }

    /// Usage of every heap.
    pub fn diagnostics(&self) -> RenderHeapDiagnostics {
        RenderHeapDiagnostics {
            buffers: self.buffers.diagnostics(),
            shader_resources: self.shader_resources.diagnostics(),
            render_targets: self.render_targets.diagnostics(),
            depth_stencils: self.depth_stencils.diagnostics(),
        }
    }
}

/// Usage of every heap in a [`RenderHeaps`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderHeapDiagnostics {
    /// Buffer heap, in bytes.
    pub buffers: HeapDiagnostics,
    /// Shader resource table, in slots.
    pub shader_resources: HeapDiagnostics,
    /// Render target table, in slots.
    pub render_targets: HeapDiagnostics,
    /// Depth-stencil table, in slots.
    pub depth_stencils: HeapDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_routed_by_kind() {
        let heaps = RenderHeaps::with_buffer_size(4096).unwrap();
        for kind in DescriptorHeapKind::ALL {
            assert_eq!(heaps.descriptors(kind).kind(), kind);
        }
    }

    #[test]
    fn misordered_descriptor_configs_rejected() {
        let configs = [
            DescriptorHeapConfig::for_kind(DescriptorHeapKind::RenderTarget),
            DescriptorHeapConfig::for_kind(DescriptorHeapKind::ShaderResource),
            DescriptorHeapConfig::for_kind(DescriptorHeapKind::DepthStencil),
        ];
        assert!(matches!(
            RenderHeaps::new(&BufferHeapConfig::new(1024), &configs),
            Err(HeapError::WrongDescriptorKind { .. })
        ));
    }
}
