//! Guaranteed-full reads and writes over async byte streams.
//!
//! A single `read`/`write` on a socket may move fewer bytes than asked for.
//! These helpers keep issuing calls until the whole request has been
//! transferred, the peer reaches a clean EOF, or the OS reports an error.
//! They return the number of bytes actually moved so the caller can tell
//! a short transfer apart from a complete one.

use std::io::{self, IoSlice, IoSliceMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads until `buf` is full or the stream hits EOF.
pub async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Writes until all of `buf` is accepted or the stream stops taking bytes.
pub async fn write_full<W>(writer: &mut W, buf: &[u8]) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]).await {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

/// Fills each segment in order. A transfer that ends mid-segment only
/// advances that segment; the rest of it is filled by the next read.
pub async fn read_full_vectored<R>(
    reader: &mut R,
    mut bufs: &mut [IoSliceMut<'_>],
) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut total = 0;
    IoSliceMut::advance_slices(&mut bufs, 0);
    while !bufs.is_empty() {
        let n = match reader.read(&mut bufs[0]).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        total += n;
        IoSliceMut::advance_slices(&mut bufs, n);
    }
    Ok(total)
}

/// Vectored counterpart of [`write_full`].
pub async fn write_full_vectored<W>(
    writer: &mut W,
    mut bufs: &mut [IoSlice<'_>],
) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut total = 0;
    IoSlice::advance_slices(&mut bufs, 0);
    while !bufs.is_empty() {
        let n = match writer.write_vectored(bufs).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        total += n;
        IoSlice::advance_slices(&mut bufs, n);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_full_joins_short_reads() {
        let mut mock = Builder::new()
            .read(&[1, 2])
            .read(&[3])
            .read(&[4, 5, 6])
            .build();

        let mut buf = [0u8; 6];
        let n = read_full(&mut mock, &mut buf).await.unwrap();

        assert_eq!(n, 6);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_read_full_reports_short_count_on_eof() {
        let mut mock = Builder::new().read(&[9, 8, 7]).build();

        let mut buf = [0u8; 8];
        let n = read_full(&mut mock, &mut buf).await.unwrap();

        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[9, 8, 7]);
    }

    #[tokio::test]
    async fn test_read_full_propagates_errors() {
        let mut mock = Builder::new()
            .read(&[1])
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let mut buf = [0u8; 4];
        let err = read_full(&mut mock, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_write_full_retries_partial_writes() {
        let mut mock = Builder::new().write(&[1, 2]).write(&[3, 4, 5]).build();

        let n = write_full(&mut mock, &[1, 2, 3, 4, 5]).await.unwrap();
        assert_eq!(n, 5);
    }

    #[tokio::test]
    async fn test_read_full_vectored_resumes_mid_segment() {
        // The second read straddles the boundary between both segments.
        let mut mock = Builder::new()
            .read(&[1, 2])
            .read(&[3, 4, 5])
            .read(&[6])
            .build();

        let mut head = [0u8; 3];
        let mut tail = [0u8; 3];
        let n = {
            let mut bufs = [IoSliceMut::new(&mut head), IoSliceMut::new(&mut tail)];
            read_full_vectored(&mut mock, &mut bufs).await.unwrap()
        };

        assert_eq!(n, 6);
        assert_eq!(head, [1, 2, 3]);
        assert_eq!(tail, [4, 5, 6]);
    }

    #[tokio::test]
    async fn test_read_full_vectored_skips_empty_segments() {
        let mut mock = Builder::new().read(&[7, 7]).build();

        let mut empty = [0u8; 0];
        let mut data = [0u8; 2];
        let n = {
            let mut bufs = [IoSliceMut::new(&mut empty), IoSliceMut::new(&mut data)];
            read_full_vectored(&mut mock, &mut bufs).await.unwrap()
        };

        assert_eq!(n, 2);
        assert_eq!(data, [7, 7]);
    }

    #[tokio::test]
    async fn test_write_full_vectored_handles_split_segments() {
        let mut mock = Builder::new()
            .write(&[0xA, 0xB])
            .write(&[0xC])
            .write(&[0xD, 0xE])
            .build();

        let header = [0xA, 0xB, 0xC];
        let payload = [0xD, 0xE];
        let mut bufs = [IoSlice::new(&header), IoSlice::new(&payload)];
        let n = write_full_vectored(&mut mock, &mut bufs).await.unwrap();

        assert_eq!(n, 5);
    }
}
