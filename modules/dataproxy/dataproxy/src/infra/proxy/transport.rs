use std::time::Duration;

use bytes::{Bytes, BytesMut};
use dataproxy_sdk::body::{BodyStream, BoxError};
use futures_util::StreamExt;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::config::TransportConfig;

/// Pending bytes above this size are flushed without waiting for the next tick.
const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Build the shared outbound client. Called once at startup.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_client(cfg: &TransportConfig) -> anyhow::Result<reqwest::Client> {
    if cfg.tls_skip_verify {
        warn!("TLS certificate verification is disabled for data source backends");
    }

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(cfg.tls_skip_verify)
        // Covers TCP connect and the TLS handshake.
        .connect_timeout(cfg.connect_timeout())
        .tcp_keepalive(cfg.keep_alive())
        // Never follow redirects: the backend answer goes back to the caller as is.
        .redirect(reqwest::redirect::Policy::none())
        // No overall timeout: query results may stream for a long time.
        // The response-header timeout is applied by the dispatcher.
        .build()?;

    Ok(client)
}

enum Event {
    Chunk(Option<Result<Bytes, BoxError>>),
    Tick,
}

/// Coalesce `inner` into chunks flushed at least every `interval`.
///
/// A zero interval returns `inner` unchanged. Dropping the returned stream
/// drops `inner`, which releases the backend connection.
pub fn flushing_stream(inner: BodyStream, interval: Duration) -> BodyStream {
    if interval.is_zero() {
        return inner;
    }

    Box::pin(async_stream::stream! {
        let mut inner = inner;
        let mut pending = BytesMut::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            let event = tokio::select! {
                chunk = inner.next() => Event::Chunk(chunk),
                _ = ticker.tick() => Event::Tick,
            };

            match event {
                Event::Chunk(Some(Ok(bytes))) => {
                    pending.extend_from_slice(&bytes);
                    if pending.len() >= MAX_PENDING_BYTES {
                        yield Ok(pending.split().freeze());
                    }
                }
                Event::Chunk(Some(Err(e))) => {
                    if !pending.is_empty() {
                        yield Ok(pending.split().freeze());
                    }
                    yield Err(e);
                    break;
                }
                Event::Chunk(None) => {
                    if !pending.is_empty() {
                        yield Ok(pending.split().freeze());
                    }
                    break;
                }
                Event::Tick => {
                    if !pending.is_empty() {
                        yield Ok(pending.split().freeze());
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&'static str]) -> BodyStream {
        let items: Vec<Result<Bytes, BoxError>> =
            parts.iter().map(|&p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        Box::pin(futures_util::stream::iter(items))
    }

    async fn collect(stream: BodyStream) -> Vec<Bytes> {
        stream.map(|r| r.unwrap()).collect().await
    }

    #[tokio::test]
    async fn quick_chunks_are_coalesced() {
        let out = collect(flushing_stream(
            chunks(&["{\"results\":", "[1,", "2]}"]),
            Duration::from_millis(200),
        ))
        .await;
        assert_eq!(out, vec![Bytes::from_static(b"{\"results\":[1,2]}")]);
    }

    #[tokio::test]
    async fn zero_interval_forwards_every_chunk() {
        let out = collect(flushing_stream(chunks(&["a", "b", "c"]), Duration::ZERO)).await;
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn slow_stream_is_flushed_incrementally() {
        let slow: BodyStream = Box::pin(async_stream::stream! {
            yield Ok::<_, BoxError>(Bytes::from_static(b"first"));
            tokio::time::sleep(Duration::from_millis(150)).await;
            yield Ok(Bytes::from_static(b"second"));
        });

        let out = collect(flushing_stream(slow, Duration::from_millis(20))).await;

        assert_eq!(
            out,
            vec![Bytes::from_static(b"first"), Bytes::from_static(b"second")]
        );
    }

    #[tokio::test]
    async fn error_is_forwarded_after_pending_bytes() {
        let failing: BodyStream = Box::pin(futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err::<Bytes, BoxError>("backend reset".into()),
        ]));

        let mut out = flushing_stream(failing, Duration::from_millis(200));

        assert_eq!(out.next().await.unwrap().unwrap(), "partial");
        assert!(out.next().await.unwrap().is_err());
        assert!(out.next().await.is_none());
    }
}
