//! Length-prefixed bincode framing for [`Message`]s.
//!
//! Every frame is a big-endian `u16` byte count followed by the serialized message.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::{FrameError, Message};

const HEADER_LEN: usize = std::mem::size_of::<u16>();

pub type ConnectionTx = FrameWriter<OwnedWriteHalf>;
pub type ConnectionRx = FrameReader<OwnedReadHalf>;

pub fn from_socket(socket: TcpStream) -> (ConnectionTx, ConnectionRx) {
    let (read_stream, write_stream) = socket.into_split();
    (FrameWriter::new(write_stream), FrameReader::new(read_stream))
}

#[derive(Debug)]
pub struct FrameWriter<W> {
    write_stream: BufWriter<W>,
}

#[derive(Debug)]
pub struct FrameReader<R> {
    read_stream: R,
    buffer: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(write_stream: W) -> Self {
        Self {
            write_stream: BufWriter::new(write_stream),
        }
    }

    pub async fn write_frame(&mut self, frame: Message) -> Result<(), FrameError> {
        let bytes = bincode::serialize(&frame)?;
        let len = u16::try_from(bytes.len()).map_err(|_| FrameError::FrameLength)?;
        self.write_stream.write_all(&len.to_be_bytes()).await?;
        self.write_stream.write_all(&bytes).await?;
        self.write_stream.flush().await?;
        Ok(())
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(read_stream: R) -> Self {
        Self {
            read_stream,
            buffer: BytesMut::with_capacity(64),
        }
    }

    /// Read the next message, or `None` if the remote closed the connection between frames.
    pub async fn read_frame(&mut self) -> Result<Option<Message>, FrameError> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            if self.read_stream.read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                // Connection closed while still sending data
                return Err(FrameError::ConnectionReset);
            }
        }
    }

    fn parse_frame(&mut self) -> Result<Option<Message>, FrameError> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let message_len = usize::from(u16::from_be_bytes([self.buffer[0], self.buffer[1]]));
        if self.buffer.len() < HEADER_LEN + message_len {
            return Ok(None);
        }

        self.buffer.advance(HEADER_LEN);
        let message = bincode::deserialize::<Message>(&self.buffer[..message_len]);
        self.buffer.advance(message_len);

        Ok(Some(message?))
    }
}
