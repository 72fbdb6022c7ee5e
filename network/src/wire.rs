//! Wire codec (§4.7/§6): every message on the sync TCP stream is a u32
//! big-endian length prefix followed by a `bincode`-encoded payload. A tips
//! summary is one message; a unit stream is a sequence of unit-record
//! messages terminated by a zero-length frame.

use poset_unit::{CreatorId, Unit};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are rejected outright rather than trusted to
/// allocate — a malformed or hostile length prefix must not be able to
/// force an unbounded allocation.
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Per-creator max known height, `None` where we have no unit at all.
/// One entry per committee member, always sent in process-id order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TipsSummary {
    pub heights: Vec<Option<u64>>,
}

impl TipsSummary {
    pub fn of(poset: &poset_dag::Poset) -> Self {
        let heights = (0..poset.n_processes() as CreatorId).map(|c| poset.tip_height(c)).collect();
        TipsSummary { heights }
    }

    pub fn height_of(&self, creator: CreatorId) -> Option<u64> {
        self.heights.get(creator as usize).copied().flatten()
    }
}

pub async fn write_frame<W: AsyncWrite + Unpin>(stream: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    let len: u32 = bytes.len().try_into().map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame too large"))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(bytes).await?;
    stream.flush().await
}

/// Reads one frame. `Ok(None)` marks the zero-length terminator frame that
/// ends a unit stream.
pub async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R) -> std::io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len == 0 {
        return Ok(None);
    }
    if len > MAX_FRAME_BYTES {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "frame exceeds the maximum allowed size"));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

pub async fn write_message<W: AsyncWrite + Unpin, T: Serialize>(stream: &mut W, message: &T) -> std::io::Result<()> {
    let bytes = bincode::serialize(message).expect("message serialization is infallible");
    write_frame(stream, &bytes).await
}

pub async fn read_message<R: AsyncRead + Unpin, T: DeserializeOwned>(stream: &mut R) -> std::io::Result<T> {
    let bytes = read_frame(stream)
        .await?
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "expected a message, got the stream terminator"))?;
    bincode::deserialize(&bytes).map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
}

pub async fn write_unit<W: AsyncWrite + Unpin>(stream: &mut W, unit: &Unit) -> std::io::Result<()> {
    write_frame(stream, &poset_unit::encode(unit)).await
}

/// Writes the zero-length frame that ends a unit stream.
pub async fn write_end_of_stream<W: AsyncWrite + Unpin>(stream: &mut W) -> std::io::Result<()> {
    stream.write_all(&0u32.to_be_bytes()).await?;
    stream.flush().await
}

/// Reads the next unit in a unit stream, or `Ok(None)` at the terminator.
pub async fn read_unit<R: AsyncRead + Unpin>(stream: &mut R) -> std::io::Result<Option<Unit>> {
    match read_frame(stream).await? {
        None => Ok(None),
        Some(bytes) => poset_unit::decode(&bytes).map(Some).map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tips_summary_round_trips_over_a_duplex_stream() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let summary = TipsSummary { heights: vec![Some(3), None, Some(0)] };
        write_message(&mut a, &summary).await.unwrap();
        let decoded: TipsSummary = read_message(&mut b).await.unwrap();
        assert_eq!(summary, decoded);
    }

    #[tokio::test]
    async fn unit_stream_terminator_reads_back_as_none() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        write_end_of_stream(&mut a).await.unwrap();
        assert!(read_unit(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_without_allocating() {
        let (mut a, mut b) = tokio::io::duplex(16);
        a.write_all(&(MAX_FRAME_BYTES + 1).to_be_bytes()).await.unwrap();
        let err = read_frame(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
