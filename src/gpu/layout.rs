//! Packing of logical arrays into physical buffers.
//!
//! Storage arrays share a physical buffer when they are updated together.
//! Inside a buffer arrays are laid out in [`PhysicalBuffer::arrays`] order,
//! each starting at a multiple of `lcm(stride, storage_offset_alignment)` so
//! the offset is valid both as a storage binding offset and as an element
//! index. An empty array still occupies one element: zero-sized bindings are
//! rejected by the API.

use super::{ArrayKind, FrameUniforms, PhysicalBuffer};
use crate::util::{Error, Result};

/// Device limits that shape the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// `min_storage_buffer_offset_alignment`.
    pub storage_offset_alignment: u64,
    /// `max_buffer_size`.
    pub max_buffer_size: u64,
    /// `max_storage_buffer_binding_size`.
    pub max_binding_size: u64,
    /// Smallest capacity a storage buffer is created with.
    pub min_capacity: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            storage_offset_alignment: 256,
            max_buffer_size: 256 << 20,
            max_binding_size: 128 << 20,
            min_capacity: 64 << 10,
        }
    }
}

impl LayoutConfig {
    /// Take limits from a wgpu device.
    #[cfg(feature = "wgpu")]
    pub fn from_limits(limits: &wgpu::Limits, min_capacity: u64) -> Self {
        Self {
            storage_offset_alignment: limits.min_storage_buffer_offset_alignment as u64,
            max_buffer_size: limits.max_buffer_size,
            max_binding_size: limits.max_storage_buffer_binding_size as u64,
            min_capacity,
        }
    }

    /// Offset granularity for arrays of `stride`-sized elements.
    pub fn offset_alignment(&self, stride: u64) -> u64 {
        lcm(stride.max(1), self.storage_offset_alignment.max(4))
    }
}

/// Element count per logical array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArraySizes {
    counts: [u64; 7],
}

impl ArraySizes {
    pub fn get(&self, kind: ArrayKind) -> u64 {
        self.counts[kind.index()]
    }

    pub fn set(&mut self, kind: ArrayKind, count: u64) {
        self.counts[kind.index()] = count;
    }

    pub fn with(mut self, kind: ArrayKind, count: u64) -> Self {
        self.set(kind, count);
        self
    }
}

/// Allocated size in bytes of every storage buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacities {
    bytes: [u64; 4],
}

impl Capacities {
    /// Same capacity for every storage buffer.
    pub fn uniform(bytes: u64) -> Self {
        Self { bytes: [bytes; 4] }
    }

    /// Capacity of `buffer`. The uniform buffer has a fixed size.
    pub fn get(&self, buffer: PhysicalBuffer) -> u64 {
        match buffer.storage_index() {
            Some(i) => self.bytes[i],
            None => std::mem::size_of::<FrameUniforms>() as u64,
        }
    }

    pub fn set(&mut self, buffer: PhysicalBuffer, bytes: u64) {
        if let Some(i) = buffer.storage_index() {
            self.bytes[i] = bytes;
        }
    }

    /// Raise every capacity to at least what `layout` needs.
    pub fn cover(&mut self, layout: &BufferLayout) {
        for buffer in PhysicalBuffer::STORAGE {
            let required = layout.required(buffer);
            if required > self.get(buffer) {
                self.set(buffer, required);
            }
        }
    }
}

/// Placement of one logical array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArraySlice {
    pub kind: ArrayKind,
    pub buffer: PhysicalBuffer,
    /// Byte offset inside `buffer`.
    pub offset: u64,
    /// Bytes bound, `max(count, 1) * stride`.
    pub size: u64,
    /// Elements actually present.
    pub count: u64,
}

impl ArraySlice {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Byte range of the present elements.
    pub fn data_range(&self) -> std::ops::Range<u64> {
        self.offset..self.offset + self.count * self.kind.stride()
    }
}

/// Offsets and sizes of every logical array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferLayout {
    slices: [ArraySlice; 7],
    required: [u64; 4],
}

impl BufferLayout {
    /// Lay out `sizes` with no regard for current capacities.
    pub fn plan(sizes: &ArraySizes, config: &LayoutConfig) -> Result<Self> {
        let mut slices = ArrayKind::ALL.map(|kind| ArraySlice {
            kind,
            buffer: kind.buffer(),
            offset: 0,
            size: 0,
            count: 0,
        });
        let mut required = [0u64; 4];

        for (slot, buffer) in PhysicalBuffer::STORAGE.into_iter().enumerate() {
            let mut cursor = 0u64;
            for &kind in buffer.arrays() {
                let count = sizes.get(kind);
                let stride = kind.stride();
                let size = count.max(1).saturating_mul(stride);
                if size > config.max_binding_size {
                    return Err(Error::SceneTooLarge {
                        buffer,
                        required: size,
                        limit: config.max_binding_size,
                    });
                }
                let offset = align_up(cursor, config.offset_alignment(stride));
                slices[kind.index()] = ArraySlice {
                    kind,
                    buffer,
                    offset,
                    size,
                    count,
                };
                cursor = offset + size;
            }
            if cursor > config.max_buffer_size {
                return Err(Error::SceneTooLarge {
                    buffer,
                    required: cursor,
                    limit: config.max_buffer_size,
                });
            }
            required[slot] = cursor;
        }

        Ok(Self { slices, required })
    }

    /// Lay out `sizes` inside the buffers described by `capacities`.
    ///
    /// Fails with `BufferCapacityExceeded` naming the first buffer that is too
    /// small; the caller grows it and tries again.
    pub fn fit(sizes: &ArraySizes, capacities: &Capacities, config: &LayoutConfig) -> Result<Self> {
        let layout = Self::plan(sizes, config)?;
        for buffer in PhysicalBuffer::STORAGE {
            let required = layout.required(buffer);
            let capacity = capacities.get(buffer);
            if required > capacity {
                return Err(Error::BufferCapacityExceeded {
                    buffer,
                    required,
                    capacity,
                });
            }
        }
        Ok(layout)
    }

    pub fn slice(&self, kind: ArrayKind) -> &ArraySlice {
        &self.slices[kind.index()]
    }

    pub fn slices(&self) -> &[ArraySlice] {
        &self.slices
    }

    /// Slices packed into `buffer`, in offset order.
    pub fn slices_in(&self, buffer: PhysicalBuffer) -> impl Iterator<Item = &ArraySlice> {
        buffer.arrays().iter().map(|&k| self.slice(k))
    }

    /// Bytes `buffer` must hold for this layout.
    pub fn required(&self, buffer: PhysicalBuffer) -> u64 {
        match buffer.storage_index() {
            Some(i) => self.required[i],
            None => std::mem::size_of::<FrameUniforms>() as u64,
        }
    }

    pub fn count(&self, kind: ArrayKind) -> u64 {
        self.slice(kind).count
    }
}

/// New capacity for `buffer` holding at least `required` bytes.
///
/// Rounds up to a power of two and never below `min_capacity`. Past
/// `max_buffer_size` the scene cannot be represented.
pub fn grow_capacity(buffer: PhysicalBuffer, required: u64, config: &LayoutConfig) -> Result<u64> {
    if required > config.max_buffer_size {
        return Err(Error::SceneTooLarge {
            buffer,
            required,
            limit: config.max_buffer_size,
        });
    }
    let grown = required
        .max(config.min_capacity)
        .checked_next_power_of_two()
        .unwrap_or(u64::MAX);
    Ok(grown.min(config.max_buffer_size))
}

/// Round `value` up to a multiple of `align`.
#[inline]
pub fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}
