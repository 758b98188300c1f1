//! [`SignalingSocket`] implementation on top of [`tokio_tungstenite`].

use std::{cell::RefCell, rc::Rc};

use async_trait::async_trait;
use futures::{
    channel::mpsc, future, stream::LocalBoxStream, SinkExt as _,
    StreamExt as _,
};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::{
    platform::{self, SignalingSocket, SocketEvent, SocketFactory},
    utils::TaskHandle,
};

/// [`SocketFactory`] opening [WebSocket] connections.
///
/// [WebSocket]: https://tools.ietf.org/html/rfc6455
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketFactory;

#[async_trait(?Send)]
impl SocketFactory for WebSocketFactory {
    async fn connect(
        &self,
        url: &Url,
    ) -> Result<Rc<dyn SignalingSocket>, platform::Error> {
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| platform::Error::new(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded::<Message>();
        platform::spawn(async move {
            while let Some(msg) = outgoing_rx.next().await {
                if let Err(e) = sink.send(msg).await {
                    log::error!("Failed to write to WebSocket: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let (events_tx, events_rx) = mpsc::unbounded();
        let (reader, abort) = future::abortable(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let event = SocketEvent::Message(text.to_string());
                        let _ = events_tx.unbounded_send(event);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map_or_else(
                            || "closed by server".to_owned(),
                            |f| f.reason.to_string(),
                        );
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break e.to_string(),
                    None => break "stream ended".to_owned(),
                }
            };
            let _ = events_tx.unbounded_send(SocketEvent::Closed(reason));
        });
        platform::spawn(async move {
            let _ = reader.await;
        });

        Ok(Rc::new(WebSocket {
            outgoing: outgoing_tx,
            events: RefCell::new(Some(events_rx)),
            _reader: TaskHandle::from(abort),
        }))
    }
}

/// Opened [WebSocket] connection.
///
/// [WebSocket]: https://tools.ietf.org/html/rfc6455
struct WebSocket {
    /// Messages queued for the writer task.
    outgoing: mpsc::UnboundedSender<Message>,

    /// Received [`SocketEvent`]s, until taken by [`WebSocket::on_message`].
    events: RefCell<Option<mpsc::UnboundedReceiver<SocketEvent>>>,

    /// Reader task, aborted once this [`WebSocket`] is dropped.
    _reader: TaskHandle,
}

impl SignalingSocket for WebSocket {
    fn send(&self, text: String) -> Result<(), platform::Error> {
        self.outgoing
            .unbounded_send(Message::Text(text.into()))
            .map_err(|_| platform::Error::from("WebSocket is closed"))
    }

    fn on_message(&self) -> LocalBoxStream<'static, SocketEvent> {
        match self.events.borrow_mut().take() {
            Some(rx) => Box::pin(rx),
            None => Box::pin(futures::stream::empty()),
        }
    }

    fn close(&self) {
        self.outgoing.close_channel();
    }
}
