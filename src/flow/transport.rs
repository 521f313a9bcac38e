// SPDX-License-Identifier: MIT

//! Delivery of stream events to a single subscriber
//!
//! The executor side holds an [`EventSink`]; the client side holds a
//! [`RunStream`]. Both share the run's cancellation token: a closed or
//! stalled subscriber cancels the run, and dropping the stream before
//! `completed` does the same.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::flow::events::{EventType, StreamEvent};

/// Create a connected sink/stream pair for one run
pub fn channel(buffer: usize, send_timeout: Duration) -> (EventSink, RunStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let cancel = CancellationToken::new();
    let sink = EventSink {
        tx: Some(tx),
        cancel: cancel.clone(),
        send_timeout,
    };
    let stream = RunStream {
        inner: ReceiverStream::new(rx),
        cancel,
        finished: false,
    };
    (sink, stream)
}

/// Executor-side handle that pushes events in emission order
#[derive(Clone)]
pub struct EventSink {
    tx: Option<mpsc::Sender<StreamEvent>>,
    cancel: CancellationToken,
    send_timeout: Duration,
}

impl EventSink {
    /// A sink with no subscriber, for non-streaming callers
    pub fn disabled() -> Self {
        Self {
            tx: None,
            cancel: CancellationToken::new(),
            send_timeout: Duration::ZERO,
        }
    }

    /// Cancellation token shared with the subscriber
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Push one event; a gone or stalled subscriber cancels the run
    pub async fn emit(&self, event: StreamEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.is_closed() {
            self.cancel.cancel();
            return;
        }

        match tx.send_timeout(event, self.send_timeout).await {
            Ok(()) => {}
            Err(SendTimeoutError::Closed(event)) => {
                log::warn!(
                    "Subscriber disconnected, dropping '{}' event and cancelling run",
                    event.kind
                );
                self.cancel.cancel();
            }
            Err(SendTimeoutError::Timeout(event)) => {
                log::warn!(
                    "Subscriber did not accept '{}' event within {:?}, cancelling run",
                    event.kind,
                    self.send_timeout
                );
                self.cancel.cancel();
            }
        }
    }
}

/// Client-side ordered event stream, ends after `completed`
pub struct RunStream {
    inner: ReceiverStream<StreamEvent>,
    cancel: CancellationToken,
    finished: bool,
}

impl RunStream {
    /// Cancel the run without dropping the stream
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Stream for RunStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(event)) => {
                if event.kind == EventType::Completed {
                    this.finished = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RunStream {
    fn drop(&mut self) {
        if !self.finished {
            log::info!("Run stream dropped before completion, cancelling run");
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_events_arrive_in_order_and_stream_ends_after_completed() {
        let (sink, mut stream) = channel(8, Duration::from_secs(1));

        sink.emit(StreamEvent::node_start("entry")).await;
        sink.emit(StreamEvent::message("entry", "hello")).await;
        sink.emit(StreamEvent::node_end("entry", true, Duration::ZERO))
            .await;
        let state = crate::flow::state::WorkflowState::new("u", "r", Default::default());
        sink.emit(StreamEvent::completed(&state)).await;
        sink.emit(StreamEvent::node_start("late")).await;

        let kinds: Vec<EventType> = (&mut stream).map(|e| e.kind).collect().await;
        assert_eq!(
            kinds,
            vec![
                EventType::NodeStart,
                EventType::Message,
                EventType::NodeEnd,
                EventType::Completed
            ]
        );
        assert!(stream.is_finished());
    }

    #[tokio::test]
    async fn test_dropping_stream_early_cancels() {
        let (sink, stream) = channel(8, Duration::from_secs(1));
        let token = sink.cancellation();
        assert!(!token.is_cancelled());

        drop(stream);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_stalled_subscriber_cancels() {
        let (sink, _stream) = channel(1, Duration::from_millis(10));
        sink.emit(StreamEvent::node_start("a")).await;
        // buffer is full and nobody reads
        sink.emit(StreamEvent::node_start("b")).await;
        assert!(sink.cancellation().is_cancelled());
    }

    #[tokio::test]
    async fn test_disabled_sink_is_silent() {
        let sink = EventSink::disabled();
        sink.emit(StreamEvent::node_start("a")).await;
        assert!(!sink.cancellation().is_cancelled());
    }
}
