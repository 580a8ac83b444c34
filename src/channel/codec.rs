// ============================================================================
// File: packages/vmhost/src/channel/codec.rs
// ----------------------------------------------------------------------------
// Frame reader/writer over a duplex byte stream.
// ============================================================================

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};

use super::errors::{ChannelError, ChannelResult};
use super::frame::{decode_header, Frame, FrameType, HEADER_LEN};
use crate::async_task::{AsyncTask, AsyncTaskBuilder};

/// Read one frame from `reader`
///
/// Blocks until the whole frame has arrived. A header with an unknown type
/// byte still has its payload drained before `UnknownFrameType` is returned.
pub async fn read_frame<R>(reader: &mut R) -> ChannelResult<Frame>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .await
        .map_err(ChannelError::from_transport)?;
    let (type_byte, payload_len) = decode_header(&header);

    // Grow with what actually arrives instead of trusting the length up front.
    let mut payload = Vec::new();
    let received = reader
        .take(u64::from(payload_len))
        .read_to_end(&mut payload)
        .await
        .map_err(ChannelError::from_transport)?;
    if received < payload_len as usize {
        log::debug!(
            "control channel closed after {received} of {payload_len} payload bytes"
        );
        return Err(ChannelError::ChannelClosed);
    }

    let frame_type = FrameType::try_from(type_byte).map_err(|type_byte| {
        ChannelError::UnknownFrameType {
            type_byte,
            payload_len,
        }
    })?;

    Ok(Frame::new(frame_type, payload))
}

/// Write one frame to `writer` as a single contiguous buffer
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> ChannelResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = frame.encode()?;
    writer
        .write_all(&bytes)
        .await
        .map_err(ChannelError::from_transport)?;
    writer.flush().await.map_err(ChannelError::from_transport)
}

/// Framed control connection
///
/// Owns the stream; `&mut self` on every operation keeps one frame from
/// interleaving with another. A request/response exchange should go through
/// [`ControlChannel::exchange`] so both halves happen under the same borrow.
#[derive(Debug)]
pub struct ControlChannel<S> {
    stream: S,
}

impl<S> ControlChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Send a frame
    pub async fn write_frame<P: Into<Bytes>>(
        &mut self,
        frame_type: FrameType,
        payload: P,
    ) -> ChannelResult<()> {
        let frame = Frame::new(frame_type, payload);
        log::trace!(
            "control frame out: {} ({} bytes)",
            frame.frame_type,
            frame.payload.len()
        );
        write_frame(&mut self.stream, &frame).await
    }

    /// Receive a frame
    pub async fn read_frame(&mut self) -> ChannelResult<Frame> {
        let frame = read_frame(&mut self.stream).await?;
        log::trace!(
            "control frame in: {} ({} bytes)",
            frame.frame_type,
            frame.payload.len()
        );
        Ok(frame)
    }

    /// Send a request and wait for exactly one response frame
    pub async fn exchange<P: Into<Bytes>>(
        &mut self,
        frame_type: FrameType,
        payload: P,
    ) -> ChannelResult<Frame> {
        self.write_frame(frame_type, payload).await?;
        self.read_frame().await
    }

    /// Close the write side; the peer sees end-of-stream
    pub async fn close(&mut self) -> ChannelResult<()> {
        self.stream
            .shutdown()
            .await
            .map_err(ChannelError::from_transport)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> ControlChannel<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Split into a reader and a cloneable sender
    ///
    /// The write half moves into a dedicated writer task; every
    /// [`FrameSender`] clone queues whole frames to it, so concurrent
    /// writers never interleave bytes on the wire. The returned task ends
    /// when all senders are dropped or a write fails.
    pub fn into_split(
        self,
    ) -> (
        FrameReader<ReadHalf<S>>,
        FrameSender,
        AsyncTask<ChannelResult<()>>,
    ) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        let (tx, rx) = mpsc::channel(32);
        let writer = AsyncTaskBuilder::new(run_writer(write_half, rx)).spawn();
        (FrameReader { reader: read_half }, FrameSender { tx }, writer)
    }
}

type WriteRequest = (Frame, oneshot::Sender<ChannelResult<()>>);

async fn run_writer<W>(
    mut writer: WriteHalf<W>,
    mut rx: mpsc::Receiver<WriteRequest>,
) -> ChannelResult<()>
where
    W: AsyncRead + AsyncWrite,
{
    while let Some((frame, ack)) = rx.recv().await {
        match write_frame(&mut writer, &frame).await {
            Ok(()) => {
                let _ = ack.send(Ok(()));
            }
            Err(e) => {
                log::warn!("control channel writer stopping: {e}");
                let _ = ack.send(Err(ChannelError::ChannelClosed));
                return Err(e);
            }
        }
    }

    writer.shutdown().await.map_err(ChannelError::from_transport)
}

/// Read side of a split control channel
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub async fn read_frame(&mut self) -> ChannelResult<Frame> {
        read_frame(&mut self.reader).await
    }
}

/// Cloneable write handle of a split control channel
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<WriteRequest>,
}

impl FrameSender {
    /// Queue a frame and wait until it is on the wire
    pub async fn send<P: Into<Bytes>>(
        &self,
        frame_type: FrameType,
        payload: P,
    ) -> ChannelResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send((Frame::new(frame_type, payload), ack_tx))
            .await
            .map_err(|_| ChannelError::ChannelClosed)?;
        ack_rx.await.map_err(|_| ChannelError::ChannelClosed)?
    }
}
