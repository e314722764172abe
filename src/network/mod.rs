//! Network Module
//!
//! Length-prefixed, checksummed TCP framing shared by the metadata
//! authority, the data nodes and the clients.

pub mod protocol;
mod server;
mod client;

pub use protocol::{DataNodeStatus, ErrorCode, FrameHeader, Message};
pub use server::{NetworkServer, RequestHandler};
pub use client::NetworkClient;

use crate::error::{Error, Result};

/// Read a framed message from a reader
pub async fn read_message<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    use tokio::io::AsyncReadExt;

    // Read header
    let mut header_bytes = [0u8; FrameHeader::SIZE];
    reader.read_exact(&mut header_bytes).await?;
    let header = FrameHeader::from_bytes(&header_bytes);

    if header.length > FrameHeader::MAX_BODY {
        return Err(Error::Network(format!(
            "Message too large: {} bytes",
            header.length
        )));
    }

    // Read body
    let mut body = vec![0u8; header.length as usize];
    reader.read_exact(&mut body).await?;

    // Verify checksum
    let computed_checksum = crc32fast::hash(&body);
    if computed_checksum != header.checksum {
        return Err(Error::Network("Message checksum mismatch".into()));
    }

    // Deserialize
    let message = Message::deserialize(&body)?;
    Ok(message)
}

/// Write a framed message to a writer
pub async fn write_message<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let body = message.serialize()?;
    if body.len() > FrameHeader::MAX_BODY as usize {
        return Err(Error::Network(format!(
            "Message too large: {} bytes",
            body.len()
        )));
    }
    let header = FrameHeader::new(&body);

    writer.write_all(&header.to_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        write_message(&mut a, &Message::ReadChunk { chunk_id: "x-0".into() })
            .await
            .unwrap();

        match read_message(&mut b).await.unwrap() {
            Message::ReadChunk { chunk_id } => assert_eq!(chunk_id, "x-0"),
            other => panic!("unexpected {}", other.type_name()),
        }
    }

    #[tokio::test]
    async fn test_corrupted_body_rejected() {
        use tokio::io::AsyncWriteExt;

        let body = Message::Heartbeat.serialize().unwrap();
        let mut header = FrameHeader::new(&body);
        header.checksum ^= 0xdead_beef;

        let (mut a, mut b) = tokio::io::duplex(4096);
        a.write_all(&header.to_bytes()).await.unwrap();
        a.write_all(&body).await.unwrap();

        assert!(matches!(read_message(&mut b).await, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        use tokio::io::AsyncWriteExt;

        let header = FrameHeader {
            length: FrameHeader::MAX_BODY + 1,
            checksum: 0,
        };

        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&header.to_bytes()).await.unwrap();

        assert!(matches!(read_message(&mut b).await, Err(Error::Network(_))));
    }
}
