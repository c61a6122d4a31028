use std::io;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::{Frame, MAX_FRAME_LEN};

/// Frame codec errors. Both protocol variants indicate a broken or
/// malicious peer and are treated as transport failures by the server.
#[derive(Debug, Error)]
pub enum FrameCodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The frame body length exceeds [`MAX_FRAME_LEN`].
    #[error("frame too large")]
    FrameTooLarge,

    /// An item length prefix overruns the frame body.
    #[error("bad frame format")]
    BadFrameFormat,
}

/// Codec for length-prefixed frames, used with `tokio_util::codec::Framed`.
///
/// Decoding rejects an oversize body length as soon as the 4-byte prefix
/// is readable, before any body bytes are buffered. Items are sliced out
/// of the receive buffer without copying.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameCodecError> {
        if src.len() < 4 {
            return Ok(None);
        }

        // Peek at the body length without consuming it.
        let body_len = {
            let mut prefix = &src[..4];
            prefix.get_u32() as usize
        };

        if body_len > MAX_FRAME_LEN {
            return Err(FrameCodecError::FrameTooLarge);
        }

        if src.len() < 4 + body_len {
            src.reserve(4 + body_len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let mut body = src.split_to(body_len).freeze();

        let mut frame = Frame::new();
        while !body.is_empty() {
            if body.len() < 4 {
                return Err(FrameCodecError::BadFrameFormat);
            }
            let item_len = body.get_u32() as usize;
            if body.len() < item_len {
                return Err(FrameCodecError::BadFrameFormat);
            }
            frame.push(body.split_to(item_len));
        }

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameCodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameCodecError> {
        let body_len: usize = frame.iter().map(|item| 4 + item.len()).sum();
        if body_len > MAX_FRAME_LEN {
            return Err(FrameCodecError::FrameTooLarge);
        }

        dst.reserve(4 + body_len);
        dst.put_u32(body_len as u32);
        for item in &frame {
            dst.put_u32(item.len() as u32);
            dst.extend_from_slice(item);
        }

        Ok(())
    }
}
