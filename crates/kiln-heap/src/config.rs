//! Heap configuration parameters.

use crate::descriptor::DescriptorHeapKind;
use crate::error::HeapError;

/// Configuration for a [`BufferHeap`](crate::BufferHeap).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferHeapConfig {
    /// Size of the device buffer in bytes. Must be non-zero.
    ///
    /// Default: 64 MiB.
    pub size: u32,

    /// Whether the host can write the buffer directly (upload memory).
    ///
    /// Default: `true`. A device-local heap rejects host writes with
    /// [`HeapError::NotHostVisible`]; its contents are filled by device copies.
    pub host_visible: bool,

    /// Device virtual address of byte 0 of the buffer.
    ///
    /// Default: `0`. Added to an offset by
    /// [`BufferHeap::device_address`](crate::BufferHeap::device_address).
    pub device_address: u64,

    /// Debug name, used in log events.
    pub name: String,
}

impl BufferHeapConfig {
    /// Default buffer size: 64 MiB.
    pub const DEFAULT_SIZE: u32 = 64 * 1024 * 1024;

    /// Host-visible config of `size` bytes.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            host_visible: true,
            device_address: 0,
            name: String::from("buffer heap"),
        }
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<(), HeapError> {
        if self.size == 0 {
            return Err(HeapError::InvalidConfig {
                reason: "buffer heap size must be non-zero".into(),
            });
        }
        Ok(())
    }
}

impl Default for BufferHeapConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

/// Configuration for a [`DescriptorHeap`](crate::DescriptorHeap).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorHeapConfig {
    /// What the table holds. Only shader-resource tables are shader visible.
    pub kind: DescriptorHeapKind,

    /// Number of descriptor slots. Must be non-zero.
    pub capacity: u32,

    /// Bytes between consecutive descriptors in the table.
    ///
    /// Default: [`DescriptorHeapKind::default_increment`].
    pub increment: u32,

    /// Host handle value of slot 0.
    pub cpu_base: u64,

    /// Device handle value of slot 0. Ignored for tables that are not
    /// shader visible.
    pub gpu_base: u64,
}

impl DescriptorHeapConfig {
    /// Default capacity of the shader-resource table.
    pub const DEFAULT_SHADER_RESOURCE_CAPACITY: u32 = 4096;

    /// Default capacity of render-target and depth-stencil tables.
    pub const DEFAULT_ATTACHMENT_CAPACITY: u32 = 256;

    /// Config of `capacity` slots of `kind` with default handle layout.
    pub fn new(kind: DescriptorHeapKind, capacity: u32) -> Self {
        Self {
            kind,
            capacity,
            increment: kind.default_increment(),
            cpu_base: 0,
            gpu_base: 0,
        }
    }

    /// Default-capacity config for `kind`.
    pub fn for_kind(kind: DescriptorHeapKind) -> Self {
        let capacity = match kind {
            DescriptorHeapKind::ShaderResource => Self::DEFAULT_SHADER_RESOURCE_CAPACITY,
            DescriptorHeapKind::RenderTarget | DescriptorHeapKind::DepthStencil => {
                Self::DEFAULT_ATTACHMENT_CAPACITY
            }
        };
        Self::new(kind, capacity)
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<(), HeapError> {
        if self.capacity == 0 {
            return Err(HeapError::InvalidConfig {
                reason: format!("{:?} table capacity must be non-zero", self.kind),
            });
        }
        if self.increment == 0 {
            return Err(HeapError::InvalidConfig {
                reason: "descriptor increment must be non-zero".into(),
            });
        }
        Ok(())
    }
}
