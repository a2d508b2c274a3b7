//! The boundary between the assistant and the model server.
//!
//! A [`Backend`] turns a [`ChatRequest`] into a [`ChatStream`]: an ordered, cancellable
//! sequence of response fragments.  The interpreter only ever sees a `ChatStream`, so any
//! source of fragments can stand in for a live server.

use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{ChatRequest, ChatResponse};

/// A boxed stream of response fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<ChatResponse>> + Send>>;

/// A model server that answers chat requests with a stream.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Open a streaming chat.
    ///
    /// Transport failures that happen before the first fragment are returned here; later
    /// failures surface as `Err` items of the stream.
    async fn chat(&self, request: ChatRequest) -> Result<ChatStream>;
}

#[async_trait::async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn chat(&self, request: ChatRequest) -> Result<ChatStream> {
        (**self).chat(request).await
    }
}

/// A streamed chat response that can be cancelled.
///
/// Cancelling drops the underlying connection.  Cancelling is idempotent, and dropping a
/// `ChatStream` cancels it.
pub struct ChatStream {
    inner: Option<FragmentStream>,
    token: CancellationToken,
}

impl ChatStream {
    /// Wrap a stream of responses.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<ChatResponse>> + Send + 'static,
    {
        Self {
            inner: Some(Box::pin(stream)),
            token: CancellationToken::new(),
        }
    }

    /// A stream that yields each fragment in order and then ends.
    pub fn from_fragments<I, T>(fragments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let responses: Vec<Result<ChatResponse>> = fragments
            .into_iter()
            .map(|fragment| Ok(ChatResponse::fragment(fragment)))
            .collect();
        Self::new(stream::iter(responses))
    }

    /// Cancel this stream through `token` instead of its own.
    ///
    /// Used to hand a stream a token that was tracked before the stream was opened.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// The token that cancels this stream.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Returns true once the stream was cancelled, from here or through its token.
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the stream and release the connection.  Safe to call repeatedly.
    pub fn abort(&mut self) {
        self.token.cancel();
        self.inner = None;
    }

    /// Wait for the next response.
    ///
    /// Returns `None` when the server closed the stream or after [`ChatStream::abort`].  A
    /// cancellation through the token (an [`AbortHandle`], say) while the stream is open yields
    /// one [`Error::Abort`] first, so a cut-off answer is never mistaken for a complete one.
    pub async fn next_event(&mut self) -> Option<Result<ChatResponse>> {
        let next = {
            let inner = self.inner.as_mut()?;
            tokio::select! {
                biased;
                _ = self.token.cancelled() => Some(Err(Error::abort("the answer was aborted"))),
                event = inner.next() => event,
            }
        };
        if !matches!(next, Some(Ok(_))) {
            self.inner = None;
        }
        next
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream")
            .field("open", &self.inner.is_some())
            .field("aborted", &self.token.is_cancelled())
            .finish()
    }
}

/// Cancels whichever stream its owner is currently consuming.
///
/// Clones share the same slot, so a clone can be moved into a signal handler.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl AbortHandle {
    /// Creates a handle that tracks nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a new answer and return the token that cancels it.
    ///
    /// The token exists before any stream does, so an abort while the request is still being
    /// sent is not lost.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = Some(token.clone());
        token
    }

    /// Cancel the tracked stream.
    ///
    /// Returns true if a stream was still running.  Calling this with nothing in flight, or
    /// more than once, does nothing.
    pub fn abort(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        match current.as_ref() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A backend that replays canned fragments and remembers the requests it saw.
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        fragments: Mutex<Vec<Vec<String>>>,
        pub(crate) requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Queue the fragments for the next call to `chat`.
        pub(crate) fn answer(self, fragments: &[&str]) -> Self {
            self.fragments
                .lock()
                .unwrap()
                .push(fragments.iter().map(|s| s.to_string()).collect());
            self
        }

        pub(crate) fn last_prompt(&self) -> String {
            let requests = self.requests.lock().unwrap();
            requests
                .last()
                .and_then(|r| r.prompt())
                .unwrap_or_default()
                .to_string()
        }
    }

    #[async_trait::async_trait]
    impl Backend for ScriptedBackend {
        async fn chat(&self, request: ChatRequest) -> Result<ChatStream> {
            self.requests.lock().unwrap().push(request);
            let mut queued = self.fragments.lock().unwrap();
            let fragments = if queued.is_empty() {
                Vec::new()
            } else {
                queued.remove(0)
            };
            Ok(ChatStream::from_fragments(fragments))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn yields_fragments_in_order() {
        let mut stream = ChatStream::from_fragments(["a", "b"]);
        assert_eq!(stream.next_event().await.unwrap().unwrap().content(), "a");
        assert_eq!(stream.next_event().await.unwrap().unwrap().content(), "b");
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn abort_is_idempotent() {
        let mut stream = ChatStream::from_fragments(["a", "b"]);
        stream.abort();
        stream.abort();
        assert!(stream.is_aborted());
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn token_cancels_pending_read_with_abort_error() {
        let mut stream = ChatStream::new(stream::pending::<Result<ChatResponse>>());
        let token = stream.cancellation_token();
        let reader = tokio::spawn(async move {
            let first = stream.next_event().await;
            let second = stream.next_event().await;
            (first, second)
        });
        token.cancel();
        let (first, second) = reader.await.unwrap();
        assert!(first.unwrap().unwrap_err().is_abort());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn own_abort_ends_quietly() {
        let mut stream = ChatStream::new(stream::pending::<Result<ChatResponse>>());
        stream.abort();
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn errors_pass_through() {
        let items: Vec<Result<ChatResponse>> = vec![Err(Error::streaming("reset", None))];
        let mut stream = ChatStream::new(stream::iter(items));
        assert!(stream.next_event().await.unwrap().is_err());
    }

    #[test]
    fn drop_cancels_token() {
        let stream = ChatStream::from_fragments(["a"]);
        let token = stream.cancellation_token();
        drop(stream);
        assert!(token.is_cancelled());
    }

    #[test]
    fn abort_handle_cancels_tracked_stream_once() {
        let handle = AbortHandle::new();
        assert!(!handle.abort());

        let stream = ChatStream::from_fragments(["a"]).with_cancellation_token(handle.begin());
        let remote = handle.clone();
        assert!(remote.abort());
        assert!(stream.is_aborted());
        assert!(!handle.abort());
    }

    #[tokio::test]
    async fn token_cancelled_before_open_aborts_stream() {
        let handle = AbortHandle::new();
        let token = handle.begin();
        assert!(handle.abort());
        let mut stream = ChatStream::from_fragments(["a"]).with_cancellation_token(token);
        assert!(stream.is_aborted());
        assert!(stream.next_event().await.unwrap().unwrap_err().is_abort());
        assert!(stream.next_event().await.is_none());
    }
}
