use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;

/// Boxed error type for body stream errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A streaming body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// Body of a proxied request or response.
///
/// Inbound requests are buffered (`Empty` or `Bytes`); backend responses are
/// always `Stream` so long-running queries reach the caller incrementally.
pub enum Body {
    Empty,
    Bytes(Bytes),
    Stream(BodyStream),
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => write!(f, "Body::Empty"),
            Body::Bytes(b) => write!(f, "Body::Bytes({} bytes)", b.len()),
            Body::Stream(_) => write!(f, "Body::Stream(...)"),
        }
    }
}

impl Body {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Consume this body into `Bytes`, draining a stream if necessary.
    ///
    /// # Errors
    ///
    /// Returns the first error yielded by the stream.
    pub async fn into_bytes(self) -> Result<Bytes, BoxError> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Bytes(b) => Ok(b),
            Body::Stream(mut s) => {
                use futures_util::StreamExt;
                let mut buf = Vec::new();
                while let Some(chunk) = s.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Convert into a `BodyStream`; buffered bodies become a one-item stream.
    #[must_use]
    pub fn into_stream(self) -> BodyStream {
        match self {
            Body::Empty => Box::pin(futures_util::stream::empty()),
            Body::Bytes(b) => Box::pin(futures_util::stream::once(async { Ok(b) })),
            Body::Stream(s) => s,
        }
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        if b.is_empty() {
            Body::Empty
        } else {
            Body::Bytes(b)
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Bytes::from(v).into()
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Bytes::from(s).into()
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Bytes::from(s).into()
    }
}

impl From<BodyStream> for Body {
    fn from(s: BodyStream) -> Self {
        Body::Stream(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_body_is_empty() {
        assert!(Body::from(Bytes::new()).is_empty());
        assert!(Body::from("").is_empty());
    }

    #[test]
    fn debug_reports_size_not_content() {
        let body = Body::from("q=SELECT * FROM cpu");
        let debug = format!("{body:?}");
        assert!(debug.contains("19 bytes"));
        assert!(!debug.contains("SELECT"));
    }

    #[tokio::test]
    async fn stream_is_drained_in_order() {
        let chunks = vec![
            Ok(Bytes::from("{\"results\":")),
            Ok(Bytes::from("[]}")),
        ];
        let stream: BodyStream = Box::pin(futures_util::stream::iter(chunks));
        let bytes = Body::Stream(stream).into_bytes().await.unwrap();
        assert_eq!(bytes, Bytes::from("{\"results\":[]}"));
    }

    #[tokio::test]
    async fn stream_error_is_propagated() {
        let chunks: Vec<Result<Bytes, BoxError>> =
            vec![Ok(Bytes::from("partial")), Err("connection reset".into())];
        let stream: BodyStream = Box::pin(futures_util::stream::iter(chunks));
        let err = Body::Stream(stream).into_bytes().await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }

    #[tokio::test]
    async fn buffered_body_becomes_single_chunk_stream() {
        use futures_util::StreamExt;
        let mut stream = Body::from("payload").into_stream();
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from("payload"));
        assert!(stream.next().await.is_none());
    }
}
