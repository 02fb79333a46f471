use crate::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read exactly `len` bytes of a frame
///
/// Returns `None` when the peer closed the connection before the first byte
/// of the frame, and [Error::ShortRead] when it closed in the middle.
pub(crate) async fn read_frame<T: AsyncRead + Unpin>(
    socket: &mut T,
    len: usize,
) -> Result<Option<Vec<u8>>> {
    let mut buf = vec![0; len];
    let mut filled = 0;
    while filled < len {
        let n = socket.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::ShortRead {
                expected: len,
                actual: filled,
            });
        }
        filled += n;
    }
    Ok(Some(buf))
}

/// Read exactly `len` bytes that must follow an already received frame
///
/// `len` comes from the peer, so the buffer only grows as data arrives.
pub(crate) async fn read_payload<T: AsyncRead + Unpin>(socket: &mut T, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    socket.take(len as u64).read_to_end(&mut buf).await?;
    if buf.len() < len {
        return Err(Error::ShortRead {
            expected: len,
            actual: buf.len(),
        });
    }
    Ok(buf)
}

/// Check validity of a chain of USB descriptors
#[cfg(test)]
pub(crate) fn verify_descriptor(desc: &[u8]) {
    let mut offset = 0;
    while offset < desc.len() {
        assert_ne!(desc[offset], 0, "zero bLength at offset {}", offset);
        offset += desc[offset] as usize; // length
    }
    assert_eq!(offset, desc.len());
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::net::{TcpListener, TcpStream};

    pub(crate) async fn get_free_address() -> SocketAddr {
        let stream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        stream.local_addr().unwrap()
    }

    pub(crate) async fn poll_connect(addr: SocketAddr) -> TcpStream {
        loop {
            if let Ok(stream) = TcpStream::connect(addr).await {
                return stream;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    pub(crate) fn setup_test_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[tokio::test]
    async fn read_frame_exact() -> Result<()> {
        let mut input: &[u8] = &[1, 2, 3, 4, 5];
        assert_eq!(read_frame(&mut input, 3).await?, Some(vec![1, 2, 3]));
        assert_eq!(read_payload(&mut input, 2).await?, vec![4, 5]);
        assert_eq!(read_frame(&mut input, 3).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn read_frame_across_partial_reads() -> Result<()> {
        let (mut client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            client.write_all(&[1, 2]).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            client.write_all(&[3, 4]).await.unwrap();
        });
        assert_eq!(read_frame(&mut server, 4).await?, Some(vec![1, 2, 3, 4]));
        writer.await.unwrap();
        Ok(())
    }

    #[tokio::test]
    async fn eof_mid_frame_is_short_read() {
        let mut input: &[u8] = &[1, 2];
        let err = read_frame(&mut input, 8).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRead {
                expected: 8,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn missing_payload_is_short_read() -> Result<()> {
        let mut input: &[u8] = &[];
        assert!(matches!(
            read_payload(&mut input, 4).await,
            Err(Error::ShortRead {
                expected: 4,
                actual: 0
            })
        ));
        assert_eq!(read_payload(&mut input, 0).await?, Vec::<u8>::new());
        Ok(())
    }

    #[tokio::test]
    async fn oversized_payload_length_is_short_read() {
        let mut input: &[u8] = &[1, 2];
        let len = u32::MAX as usize;
        assert!(matches!(
            read_payload(&mut input, len).await,
            Err(Error::ShortRead { expected, actual: 2 }) if expected == len
        ));
    }

    #[test]
    #[should_panic]
    fn verify_descriptor_rejects_overrun() {
        verify_descriptor(&[0x09, 0x02, 0x00]);
    }
}
