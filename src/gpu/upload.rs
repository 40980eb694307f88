//! CPU-side mirrors of per-frame constant buffers
//!
//! Elements are laid out at dynamic-offset alignment so one GPU buffer per
//! kind can serve every object, material or light.

use crate::error::{EngineError, EngineResult};
use bytemuck::Pod;
use std::marker::PhantomData;
use std::ops::Range;

/// Minimum dynamic uniform offset alignment guaranteed by every backend
pub const CONSTANT_ALIGNMENT: usize = 256;

pub const fn aligned_stride(size: usize) -> usize {
    (size + CONSTANT_ALIGNMENT - 1) & !(CONSTANT_ALIGNMENT - 1)
}

pub struct UploadBuffer<T: Pod> {
    name: &'static str,
    data: Vec<u8>,
    capacity: usize,
    dirty: Option<Range<usize>>,
    _marker: PhantomData<T>,
}

impl<T: Pod> UploadBuffer<T> {
    pub const STRIDE: usize = aligned_stride(std::mem::size_of::<T>());

    /// A buffer always holds at least one element so it can be bound
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            data: vec![0; capacity * Self::STRIDE],
            capacity,
            dirty: None,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stride(&self) -> usize {
        Self::STRIDE
    }

    pub fn element_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn copy_data(&mut self, index: usize, value: &T) -> EngineResult<()> {
        if index >= self.capacity {
            return Err(EngineError::ConstantIndexOutOfRange {
                buffer: self.name,
                index,
                capacity: self.capacity,
            });
        }
        let start = index * Self::STRIDE;
        let bytes = bytemuck::bytes_of(value);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);

        let written = start..start + Self::STRIDE;
        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(written.start)..range.end.max(written.end),
            None => written,
        });
        Ok(())
    }

    pub fn read(&self, index: usize) -> EngineResult<T> {
        if index >= self.capacity {
            return Err(EngineError::ConstantIndexOutOfRange {
                buffer: self.name,
                index,
                capacity: self.capacity,
            });
        }
        let start = index * Self::STRIDE;
        Ok(bytemuck::pod_read_unaligned(
            &self.data[start..start + std::mem::size_of::<T>()],
        ))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// Byte offset and contents of everything written since the last call
    pub fn take_dirty(&mut self) -> Option<(u64, &[u8])> {
        let range = self.dirty.take()?;
        Some((range.start as u64, &self.data[range]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Small {
        value: [f32; 4],
    }

    #[test]
    fn test_stride_is_aligned() {
        assert_eq!(UploadBuffer::<Small>::STRIDE, 256);
        assert_eq!(aligned_stride(257), 512);
        assert_eq!(aligned_stride(640), 768);
    }

    #[test]
    fn test_dirty_range_covers_writes() {
        let mut buffer = UploadBuffer::<Small>::new("small", 4);
        buffer.copy_data(1, &Small { value: [1.0; 4] }).unwrap();
        buffer.copy_data(3, &Small { value: [3.0; 4] }).unwrap();
        let (offset, bytes) = buffer.take_dirty().unwrap();
        assert_eq!(offset, 256);
        assert_eq!(bytes.len(), 3 * 256);
        assert!(buffer.take_dirty().is_none());
        assert_eq!(buffer.read(3).unwrap().value, [3.0; 4]);
    }

    #[test]
    fn test_out_of_range_write_fails() {
        let mut buffer = UploadBuffer::<Small>::new("small", 2);
        let err = buffer.copy_data(2, &Small { value: [0.0; 4] }).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ConstantIndexOutOfRange { index: 2, capacity: 2, .. }
        ));
    }

    #[test]
    fn test_zero_capacity_still_bindable() {
        let buffer = UploadBuffer::<Small>::new("lights", 0);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.byte_len(), 256);
    }
}
