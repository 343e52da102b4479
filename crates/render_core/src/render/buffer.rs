//! Fixed-size GPU buffers with bump allocation
//!
//! A [`Buffer`] wraps one GPU allocation of a fixed byte capacity. Sub-ranges
//! are handed out by advancing a write cursor and are only reclaimed all at
//! once by [`Buffer::clear`]. A sub-range is referenced from the outside
//! exclusively through a packed [`BufferHandle`].
//!
//! # Handle layout
//!
//! ```text
//!  63        53 52   51..48   47 ........ 24   23 ......... 0
//! [  unused   ][idx][ class ][     size     ][    offset    ]
//! ```
//!
//! Every field can be extracted with shifts and masks alone; no table lookup
//! is needed to find out where a handle points.

use crate::render::backend::GpuBuffer;
use crate::render::mesh::VertexType;

/// Largest value representable by the offset and size fields (24 bits)
pub const MAX_FIELD_VALUE: u32 = 0x00FF_FFFF;

/// Byte size of one index element
pub const INDEX_STRIDE: usize = std::mem::size_of::<u32>();

const OFFSET_SHIFT: u32 = 0;
const SIZE_SHIFT: u32 = 24;
const CLASS_SHIFT: u32 = 48;
const KIND_SHIFT: u32 = 52;

const FIELD_MASK: u64 = MAX_FIELD_VALUE as u64;
const CLASS_MASK: u64 = 0xF;

/// Usage class of a buffer pair
///
/// Each class owns exactly one vertex buffer and one index buffer. The
/// discriminant is the 4-bit class index stored in handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum BufferClass {
    /// Static geometry, uploaded once
    StaticGeometry = 0,
    /// Geometry rebuilt by gameplay code
    DynamicGeometry = 1,
    /// Particle emitter quads
    Particles = 2,
    /// UI quads, rebuilt every frame
    Ui = 3,
    /// Debug triangles
    DebugTriangles = 4,
    /// Debug lines
    DebugLines = 5,
    /// Reserved for applications
    Custom1 = 6,
    /// Reserved for applications
    Custom2 = 7,
}

impl BufferClass {
    /// Number of buffer classes
    pub const COUNT: usize = 8;

    /// Every class in index order
    pub const ALL: [Self; Self::COUNT] = [
        Self::StaticGeometry,
        Self::DynamicGeometry,
        Self::Particles,
        Self::Ui,
        Self::DebugTriangles,
        Self::DebugLines,
        Self::Custom1,
        Self::Custom2,
    ];

    /// Class index as stored in handles
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a class by its handle index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Vertex layout stored in this class's vertex buffer
    pub const fn vertex_type(self) -> VertexType {
        match self {
            Self::Ui => VertexType::Ui,
            Self::DebugTriangles | Self::DebugLines => VertexType::Debug,
            Self::Particles => VertexType::Particle,
            Self::StaticGeometry | Self::DynamicGeometry | Self::Custom1 | Self::Custom2 => VertexType::Mesh,
        }
    }

    /// Byte stride of one vertex in this class
    pub const fn vertex_stride(self) -> usize {
        self.vertex_type().stride()
    }
}

/// Whether a buffer holds indices or vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex attribute storage
    Vertex,
    /// Index storage
    Index,
}

impl BufferKind {
    /// `true` for index buffers
    #[inline]
    pub const fn is_index(self) -> bool {
        matches!(self, Self::Index)
    }
}

/// Packed reference to a sub-range of one class buffer
///
/// Handles are plain values: copying them is free and they stay valid until
/// the owning class is cleared. A cleared class silently invalidates every
/// handle issued for it before the clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

impl BufferHandle {
    /// Pack the four fields into a handle
    ///
    /// Returns `None` when `offset` or `size` does not fit in 24 bits; values
    /// are never truncated.
    pub fn pack(offset: u32, size: u32, class: BufferClass, kind: BufferKind) -> Option<Self> {
        if offset > MAX_FIELD_VALUE || size > MAX_FIELD_VALUE {
            return None;
        }

        let raw = (u64::from(offset) << OFFSET_SHIFT)
            | (u64::from(size) << SIZE_SHIFT)
            | ((class.index() as u64) << CLASS_SHIFT)
            | (u64::from(kind.is_index()) << KIND_SHIFT);

        Some(Self(raw))
    }

    /// Rebuild a handle from its integer form
    ///
    /// Rejects zero (the "no allocation" value used by external callers) and
    /// class indices that do not name a class.
    pub fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 || raw >> (KIND_SHIFT + 1) != 0 {
            return None;
        }
        let class_index = ((raw >> CLASS_SHIFT) & CLASS_MASK) as usize;
        BufferClass::from_index(class_index).map(|_| Self(raw))
    }

    /// Integer form of the handle
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Byte offset inside the class buffer
    #[inline]
    pub const fn offset(self) -> u32 {
        ((self.0 >> OFFSET_SHIFT) & FIELD_MASK) as u32
    }

    /// Byte size of the sub-range
    #[inline]
    pub const fn size(self) -> u32 {
        ((self.0 >> SIZE_SHIFT) & FIELD_MASK) as u32
    }

    /// Class the sub-range belongs to
    pub fn class(self) -> BufferClass {
        let index = ((self.0 >> CLASS_SHIFT) & CLASS_MASK) as usize;
        // pack() and from_raw() only ever produce valid class indices
        BufferClass::from_index(index).unwrap_or(BufferClass::StaticGeometry)
    }

    /// Whether the sub-range lives in the index or the vertex buffer
    #[inline]
    pub const fn kind(self) -> BufferKind {
        if (self.0 >> KIND_SHIFT) & 1 == 1 {
            BufferKind::Index
        } else {
            BufferKind::Vertex
        }
    }
}

/// One fixed-size GPU allocation with a bump cursor
#[derive(Debug)]
pub struct Buffer {
    gpu: GpuBuffer,
    kind: BufferKind,
    capacity: u32,
    cursor: u32,
}

impl Buffer {
    /// Wrap an already reserved GPU buffer of `capacity` bytes
    pub fn new(gpu: GpuBuffer, kind: BufferKind, capacity: u32) -> Self {
        Self {
            gpu,
            kind,
            capacity,
            cursor: 0,
        }
    }

    /// Reserve `size` bytes, returning their offset
    ///
    /// Returns `None` without moving the cursor when the remaining space is
    /// too small.
    pub fn allocate(&mut self, size: u32) -> Option<u32> {
        if size > self.remaining() {
            return None;
        }
        let offset = self.cursor;
        self.cursor += size;
        Some(offset)
    }

    /// Reset the cursor to the start of the buffer
    pub fn clear(&mut self) {
        self.cursor = 0;
    }

    /// GPU buffer backing this allocation
    #[inline]
    pub const fn gpu(&self) -> GpuBuffer {
        self.gpu
    }

    /// Index or vertex usage
    #[inline]
    pub const fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Total capacity in bytes
    #[inline]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bytes handed out since the last clear
    #[inline]
    pub const fn used(&self) -> u32 {
        self.cursor
    }

    /// Bytes still available
    #[inline]
    pub const fn remaining(&self) -> u32 {
        self.capacity - self.cursor
    }
}
