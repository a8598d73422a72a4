//! Untyped byte buffers
//!
//! A raw timeline stores opaque payloads of one fixed size; consumers decode
//! the bytes themselves.

use crate::error::{Result, TimelineError};
use crate::timeline::object::{Buffer, TimelineBuffer, Timestamp};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Payload size of a raw timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLayout {
    /// Bytes per buffer
    pub size: usize,
}

impl RawLayout {
    /// Layout for payloads of `size` bytes
    pub fn new(size: usize) -> Self {
        RawLayout { size }
    }
}

/// Flat byte payload
#[derive(Debug)]
pub struct RawBuffer {
    buffer: Buffer,
}

impl RawBuffer {
    /// Sample time
    pub fn timestamp(&self) -> Timestamp {
        self.buffer.timestamp()
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.buffer.size()
    }

    /// Payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Mutable payload bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.buffer.as_bytes_mut()
    }

    /// Overwrite the payload
    pub fn copy_from_slice(&mut self, payload: &[u8]) -> Result<()> {
        self.buffer.copy_from_slice(payload)
    }

    /// Copy the payload out of pool storage
    pub fn to_bytes(&self) -> Bytes {
        self.buffer.to_bytes()
    }
}

impl TimelineBuffer for RawBuffer {
    type Layout = RawLayout;

    fn block_size(layout: &RawLayout) -> Result<usize> {
        if layout.size == 0 {
            return Err(TimelineError::InvalidConfig(
                "raw buffer size must be at least 1 byte".to_string(),
            ));
        }
        Ok(layout.size)
    }

    fn from_buffer(buffer: Buffer, _layout: &RawLayout) -> Self {
        RawBuffer { buffer }
    }

    fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    fn deep_copy(&mut self, other: &Self) -> Result<()> {
        self.buffer.deep_copy(&other.buffer)
    }
}
