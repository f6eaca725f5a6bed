//! Length-prefixed frame codec
//!
//! Wire layout: `[flags: u8][len: u32 BE][body: len bytes]`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::IpcError;
use crate::protocol::{Frame, PayloadFlags};

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 5;

/// Largest body the codec accepts (16 MiB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Encoder/decoder for relay frames
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Codec with a custom body size limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = IpcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let raw_flags = src[0];
        let flags = PayloadFlags::from_bits(raw_flags).ok_or(IpcError::InvalidFlags(raw_flags))?;

        let len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len > self.max_frame_size {
            return Err(IpcError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        if src.len() < HEADER_SIZE + len {
            src.reserve(HEADER_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let body = src.split_to(len).freeze();
        Ok(Some(Frame { flags, body }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = IpcError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = frame.body.len();
        if len > self.max_frame_size {
            return Err(IpcError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        dst.reserve(HEADER_SIZE + len);
        dst.put_u8(frame.flags.bits());
        dst.put_u32(len as u32);
        dst.extend_from_slice(&frame.body);
        Ok(())
    }
}
