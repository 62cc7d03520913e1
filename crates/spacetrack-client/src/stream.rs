//! Streamed response bodies.
//!
//! [`LineStream`] and [`ChunkStream`] own the response body and release it as
//! soon as it is exhausted, fails, or the stream is dropped. Both are
//! single-pass: once they return `None` they keep returning `None`.
//!
//! Text decoding uses the charset declared in the response's `Content-Type`
//! header, falling back to UTF-8.

use crate::error::{ClientError, Result};
use bytes::{Bytes, BytesMut};
use encoding_rs::{DecoderResult, Encoding, UTF_8};
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Default chunk size for [`ChunkStream`] (100 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 100 * 1024;

type Body = BoxStream<'static, Result<Bytes>>;

/// Resolves the character encoding of a response.
#[derive(Debug, Clone, Copy)]
pub struct EncodingResolver;

impl EncodingResolver {
    /// Encoding named by the `charset` parameter of `Content-Type`, or UTF-8.
    pub fn resolve(headers: &HeaderMap) -> &'static Encoding {
        headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .and_then(|mime| {
                mime.get_param(mime::CHARSET)
                    .and_then(|charset| Encoding::for_label(charset.as_str().as_bytes()))
            })
            .unwrap_or(UTF_8)
    }
}

/// Box a byte stream, converting its error type.
fn boxed_body<S, E>(body: S) -> Body
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<ClientError>,
{
    body.map(|item| item.map_err(Into::into)).boxed()
}

pub(crate) fn decode_whole(encoding: &'static Encoding, bytes: &[u8]) -> Result<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            ClientError::Decode(format!("Response is not valid {}", encoding.name()))
        })
}

/// Line-by-line view of a text response.
///
/// Each item is one line with trailing `\r` and `\n` removed. A final line
/// without a terminator is still yielded.
pub struct LineStream {
    body: Option<Body>,
    buffer: BytesMut,
    encoding: &'static Encoding,
}

impl LineStream {
    /// Wrap a response, taking ownership of its connection.
    pub fn from_response(response: reqwest::Response) -> Self {
        let encoding = EncodingResolver::resolve(response.headers());
        Self::new(response.bytes_stream(), encoding)
    }

    /// Wrap any byte stream.
    pub fn new<S, E>(body: S, encoding: &'static Encoding) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<ClientError>,
    {
        Self {
            body: Some(boxed_body(body)),
            buffer: BytesMut::new(),
            encoding,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Release the connection without reading the rest of the body.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.body.take().is_some() {
            tracing::debug!("Released line stream body");
        }
    }

    fn decode_line(&self, line: &[u8]) -> Result<String> {
        let text = decode_whole(self.encoding, line)?;
        Ok(text.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Stream for LineStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(pos) = this.buffer.iter().position(|b| *b == b'\n') {
                let line = this.buffer.split_to(pos + 1);
                return Poll::Ready(Some(this.decode_line(&line)));
            }

            let Some(body) = this.body.as_mut() else {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                let tail = this.buffer.split();
                return Poll::Ready(Some(this.decode_line(&tail)));
            };

            match ready!(body.as_mut().poll_next(cx)) {
                Some(Ok(bytes)) => this.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    this.buffer.clear();
                    this.release();
                    return Poll::Ready(Some(Err(e)));
                }
                None => this.release(),
            }
        }
    }
}

impl std::fmt::Debug for LineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineStream")
            .field("open", &self.body.is_some())
            .field("buffered", &self.buffer.len())
            .field("encoding", &self.encoding.name())
            .finish()
    }
}

/// One item of a [`ChunkStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Decoded text with `\r\n` normalized to `\n`
    Text(String),
    /// Untouched bytes of a binary response
    Binary(Bytes),
}

impl Chunk {
    pub fn len(&self) -> usize {
        match self {
            Chunk::Text(s) => s.len(),
            Chunk::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Chunk::Text(s) => s.as_bytes(),
            Chunk::Binary(b) => b,
        }
    }
}

/// Fixed-size chunk view of a response.
///
/// Every chunk except the last holds exactly `chunk_size` bytes of the
/// underlying body. With decoding enabled, multi-byte characters split
/// across a boundary are carried into the next chunk and a `\r` left dangling
/// by a split `\r\n` is dropped.
pub struct ChunkStream {
    body: Option<Body>,
    buffer: BytesMut,
    chunk_size: usize,
    decoder: Option<encoding_rs::Decoder>,
    encoding: &'static Encoding,
    finished: bool,
}

impl ChunkStream {
    /// Wrap a response, taking ownership of its connection.
    pub fn from_response(response: reqwest::Response, chunk_size: usize, decode: bool) -> Self {
        let encoding = EncodingResolver::resolve(response.headers());
        Self::new(response.bytes_stream(), encoding, chunk_size, decode)
    }

    /// Wrap any byte stream.
    pub fn new<S, E>(body: S, encoding: &'static Encoding, chunk_size: usize, decode: bool) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<ClientError>,
    {
        Self {
            body: Some(boxed_body(body)),
            buffer: BytesMut::new(),
            chunk_size: chunk_size.max(1),
            decoder: decode.then(|| encoding.new_decoder_without_bom_handling()),
            encoding,
            finished: false,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Release the connection without reading the rest of the body.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.body.take().is_some() {
            tracing::debug!("Released chunk stream body");
        }
    }

    fn emit(&mut self, bytes: Bytes, last: bool) -> Result<Chunk> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(Chunk::Binary(bytes));
        };

        let capacity = decoder
            .max_utf8_buffer_length_without_replacement(bytes.len())
            .unwrap_or(bytes.len() * 3 + 16);
        let mut text = String::with_capacity(capacity);
        let (result, _read) =
            decoder.decode_to_string_without_replacement(&bytes, &mut text, last);
        match result {
            DecoderResult::InputEmpty => {}
            DecoderResult::Malformed(_, _) => {
                return Err(ClientError::Decode(format!(
                    "Response is not valid {}",
                    self.encoding.name()
                )))
            }
            DecoderResult::OutputFull => {
                return Err(ClientError::Decode(
                    "Decoded chunk exceeded its buffer".to_string(),
                ))
            }
        }

        let text = text.replace("\r\n", "\n");
        Ok(Chunk::Text(text.trim_end_matches('\r').to_string()))
    }
}

impl Stream for ChunkStream {
    type Item = Result<Chunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.buffer.len() >= this.chunk_size {
                let bytes = this.buffer.split_to(this.chunk_size).freeze();
                return Poll::Ready(Some(this.emit(bytes, false)));
            }

            let Some(body) = this.body.as_mut() else {
                if this.finished {
                    return Poll::Ready(None);
                }
                this.finished = true;
                let tail = this.buffer.split().freeze();
                if tail.is_empty() && this.decoder.is_none() {
                    return Poll::Ready(None);
                }
                // An empty final call still flushes the decoder, so a body
                // truncated inside a multi-byte sequence is reported.
                return match this.emit(tail, true) {
                    Ok(chunk) if chunk.is_empty() => Poll::Ready(None),
                    other => Poll::Ready(Some(other)),
                };
            };

            match ready!(body.as_mut().poll_next(cx)) {
                Some(Ok(bytes)) => this.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    this.buffer.clear();
                    this.finished = true;
                    this.release();
                    return Poll::Ready(Some(Err(e)));
                }
                None => this.release(),
            }
        }
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("open", &self.body.is_some())
            .field("chunk_size", &self.chunk_size)
            .field("decode", &self.decoder.is_some())
            .field("encoding", &self.encoding.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use reqwest::header::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Body stream that counts how often it is dropped.
    struct TrackedBody {
        inner: stream::Iter<std::vec::IntoIter<Result<Bytes>>>,
        released: Arc<AtomicUsize>,
    }

    impl Stream for TrackedBody {
        type Item = Result<Bytes>;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            Pin::new(&mut self.inner).poll_next(cx)
        }
    }

    impl Drop for TrackedBody {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked(parts: &[&[u8]]) -> (TrackedBody, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let items: Vec<Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();
        let body = TrackedBody {
            inner: stream::iter(items),
            released: released.clone(),
        };
        (body, released)
    }

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_encoding_from_charset() {
        let encoding = EncodingResolver::resolve(&headers("text/plain; charset=ISO-8859-1"));
        // WHATWG maps the latin-1 label to windows-1252
        assert_eq!(encoding, encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn test_encoding_defaults_to_utf8() {
        assert_eq!(EncodingResolver::resolve(&headers("text/plain")), UTF_8);
        assert_eq!(EncodingResolver::resolve(&HeaderMap::new()), UTF_8);
        assert_eq!(
            EncodingResolver::resolve(&headers("text/plain; charset=not-a-charset")),
            UTF_8
        );
        assert_eq!(EncodingResolver::resolve(&headers(";;;")), UTF_8);
    }

    #[tokio::test]
    async fn test_lines_strip_newlines() {
        let (body, _) = tracked(&[b"1 25544U 98067A\r\n2 25544  51.6", b"400\r\nlast line"]);
        let lines: Vec<String> = LineStream::new(body, UTF_8)
            .map(|line| line.unwrap())
            .collect()
            .await;

        assert_eq!(lines, vec!["1 25544U 98067A", "2 25544  51.6400", "last line"]);
        assert!(lines.iter().all(|l| !l.ends_with('\r') && !l.ends_with('\n')));
    }

    #[tokio::test]
    async fn test_lines_keep_blank_lines() {
        let (body, _) = tracked(&[b"a\n\nb\r\n"]);
        let lines: Vec<String> = LineStream::new(body, UTF_8)
            .map(|line| line.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn test_lines_use_declared_charset() {
        let encoding = EncodingResolver::resolve(&headers("text/plain; charset=ISO-8859-1"));
        let (body, _) = tracked(&[b"caf\xe9\r\n"]);
        let mut lines = LineStream::new(body, encoding);
        assert_eq!(lines.next().await.unwrap().unwrap(), "café");
    }

    #[tokio::test]
    async fn test_lines_invalid_utf8() {
        let (body, _) = tracked(&[b"caf\xe9\n"]);
        let mut lines = LineStream::new(body, UTF_8);
        let err = lines.next().await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_lines_release_on_exhaustion() {
        let (body, released) = tracked(&[b"one\ntwo\n"]);
        let mut lines = LineStream::new(body, UTF_8);

        assert_eq!(lines.next().await.unwrap().unwrap(), "one");
        assert_eq!(lines.next().await.unwrap().unwrap(), "two");
        assert!(lines.next().await.is_none());
        assert_eq!(released.load(Ordering::SeqCst), 1);

        // Single pass: nothing more, nothing reopened
        assert!(lines.next().await.is_none());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lines_release_on_drop() {
        let (body, released) = tracked(&[b"one\n", b"two\n", b"three\n"]);
        let mut lines = LineStream::new(body, UTF_8);

        assert_eq!(lines.next().await.unwrap().unwrap(), "one");
        assert_eq!(released.load(Ordering::SeqCst), 0);

        drop(lines);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lines_close() {
        let (body, released) = tracked(&[b"one\n"]);
        LineStream::new(body, UTF_8).close();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chunks_fixed_size() {
        let (body, _) = tracked(&[b"abcd", b"efghij"]);
        let chunks: Vec<Chunk> = ChunkStream::new(body, UTF_8, 4, false)
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(
            chunks,
            vec![
                Chunk::Binary(Bytes::from_static(b"abcd")),
                Chunk::Binary(Bytes::from_static(b"efgh")),
                Chunk::Binary(Bytes::from_static(b"ij")),
            ]
        );
    }

    #[tokio::test]
    async fn test_chunks_binary_untouched() {
        let (body, _) = tracked(&[b"a\r\nb\r"]);
        let mut chunks = ChunkStream::new(body, UTF_8, DEFAULT_CHUNK_SIZE, false);
        assert_eq!(
            chunks.next().await.unwrap().unwrap(),
            Chunk::Binary(Bytes::from_static(b"a\r\nb\r"))
        );
    }

    #[tokio::test]
    async fn test_chunks_split_crlf_leaves_no_orphan() {
        let (body, _) = tracked(&[b"ab\r\ncd\r\nef"]);
        let chunks: Vec<String> = ChunkStream::new(body, UTF_8, 3, true)
            .map(|c| match c.unwrap() {
                Chunk::Text(text) => text,
                Chunk::Binary(_) => panic!("expected text"),
            })
            .collect()
            .await;

        assert!(chunks.iter().all(|c| !c.ends_with('\r')), "{:?}", chunks);
        assert_eq!(chunks.concat(), "ab\ncd\nef");
    }

    #[tokio::test]
    async fn test_chunks_carry_split_multibyte() {
        // "é" is two bytes in UTF-8; a two-byte chunk size splits it
        let (body, _) = tracked(&["xé".as_bytes()]);
        let text: String = ChunkStream::new(body, UTF_8, 2, true)
            .map(|c| match c.unwrap() {
                Chunk::Text(text) => text,
                Chunk::Binary(_) => panic!("expected text"),
            })
            .collect::<Vec<_>>()
            .await
            .concat();
        assert_eq!(text, "xé");
    }

    #[tokio::test]
    async fn test_chunks_truncated_multibyte_is_error() {
        let (body, _) = tracked(&[b"ok\xc3"]);
        let results: Vec<Result<Chunk>> = ChunkStream::new(body, UTF_8, 16, true).collect().await;
        assert!(results.iter().any(|r| matches!(r, Err(ClientError::Decode(_)))));
    }

    #[tokio::test]
    async fn test_chunks_release_on_drop_and_exhaustion() {
        let (body, released) = tracked(&[b"0123456789"]);
        let mut chunks = ChunkStream::new(body, UTF_8, 4, false);
        assert!(chunks.next().await.is_some());
        drop(chunks);
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let (body, released) = tracked(&[b"0123"]);
        let mut chunks = ChunkStream::new(body, UTF_8, 4, false);
        assert!(chunks.next().await.is_some());
        assert!(chunks.next().await.is_none());
        assert!(chunks.next().await.is_none());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
