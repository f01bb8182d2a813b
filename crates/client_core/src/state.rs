use std::{
    pin::Pin,
    task::{ready, Context, Poll},
};

use futures::{Stream, StreamExt};
use shared::domain::Product;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchState {
    #[default]
    Initial,
    Loaded(Vec<Product>),
    Error(String),
}

impl FetchState {
    /// Displayed items; empty for `Initial` and `Error`.
    pub fn items(&self) -> &[Product] {
        match self {
            Self::Loaded(items) => items,
            Self::Initial | Self::Error(_) => &[],
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            Self::Initial | Self::Loaded(_) => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// Stream of controller states: the state current at subscription time,
/// then every later transition until the controller is disposed.
pub struct StateStream {
    pending: Option<FetchState>,
    updates: Option<BroadcastStream<FetchState>>,
}

impl StateStream {
    pub(crate) fn new(
        current: FetchState,
        updates: Option<broadcast::Receiver<FetchState>>,
    ) -> Self {
        Self {
            pending: Some(current),
            updates: updates.map(BroadcastStream::new),
        }
    }
}

impl Stream for StateStream {
    type Item = FetchState;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(state) = this.pending.take() {
            return Poll::Ready(Some(state));
        }
        let Some(updates) = this.updates.as_mut() else {
            return Poll::Ready(None);
        };

        loop {
            match ready!(updates.poll_next_unpin(cx)) {
                Some(Ok(state)) => return Poll::Ready(Some(state)),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(skipped, "state observer lagged behind; transitions dropped");
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
