//! Per-connection handler.
//!
//! Reads RESP frames from the TCP stream into a `BytesMut`, dispatches
//! each request, and writes the reply back. Requests on one connection
//! are processed and answered strictly in arrival order.
//!
//! A SUBSCRIBE request switches the connection into subscriber mode: a
//! select loop over the topic's broadcast receiver and the socket that
//! streams every delivered payload to the client and never returns to
//! the request/response cycle while the subscription is live. Client
//! disconnect (EOF or error) unregisters the subscriber and drops its
//! receiver, so publishers never target a dead subscriber.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use cinder_protocol::{parse_frame, Command, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;

use crate::dispatch::Dispatcher;
use crate::pubsub::PubSub;

const READ_BUF_SIZE: usize = 4 * 1024;

/// How subscriber mode ended.
enum SubExit {
    /// The topic's channel closed; the connection can resume the
    /// normal request/response cycle.
    TopicClosed,
    /// The client went away.
    Disconnected,
}

/// Serves one client connection until it disconnects or sends
/// malformed wire data.
pub(crate) async fn handle(mut stream: TcpStream, peer: SocketAddr, dispatcher: Arc<Dispatcher>) {
    tracing::debug!(%peer, "connection established");

    let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);
    let mut out = BytesMut::with_capacity(READ_BUF_SIZE);

    loop {
        // drain every complete frame currently buffered
        loop {
            match parse_frame(&buf) {
                Ok(Some((frame, consumed))) => {
                    buf.advance(consumed);
                    match process(&mut stream, &frame, &dispatcher, &mut out).await {
                        Ok(true) => {}
                        Ok(false) => {
                            tracing::debug!(%peer, "client disconnected");
                            return;
                        }
                        Err(e) => {
                            tracing::debug!(%peer, error = %e, "write failed");
                            return;
                        }
                    }
                }
                Ok(None) => break,
                // malformed wire data is fatal to this connection only
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "protocol error, closing connection");
                    return;
                }
            }
        }

        match stream.read_buf(&mut buf).await {
            Ok(0) => {
                tracing::debug!(%peer, "client disconnected");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%peer, error = %e, "read failed");
                return;
            }
        }
    }
}

/// Handles one request frame. Returns `Ok(false)` when the connection
/// should close (client went away during a subscription).
async fn process(
    stream: &mut TcpStream,
    frame: &Frame,
    dispatcher: &Arc<Dispatcher>,
    out: &mut BytesMut,
) -> std::io::Result<bool> {
    let reply = match Command::from_frame(frame) {
        // SUBSCRIBE needs the socket, not a reply value
        Ok(Command::Subscribe { topic }) => {
            let exit = subscriber_mode(stream, &topic, dispatcher.pubsub()).await;
            return Ok(matches!(exit, SubExit::TopicClosed));
        }
        Ok(cmd) => dispatcher.execute(cmd, frame),
        // arity, type-mismatch, and shape errors become Error replies;
        // the connection stays open
        Err(e) => Frame::error(format!("ERR {e}")),
    };

    out.clear();
    reply.serialize(out);
    stream.write_all(out).await?;
    Ok(true)
}

/// Streams published payloads for `topic` to the client until the
/// channel closes or the client disconnects. Always unregisters the
/// subscription on the way out.
async fn subscriber_mode(stream: &mut TcpStream, topic: &str, pubsub: &Arc<PubSub>) -> SubExit {
    let mut rx = pubsub.subscribe(topic);
    tracing::debug!(topic, "entered subscriber mode");

    let (mut rd, mut wr) = stream.split();
    let mut scratch = [0u8; 512];
    let mut out = BytesMut::new();

    let exit = loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(payload) => {
                    out.clear();
                    Frame::Bulk(payload).serialize(&mut out);
                    if let Err(e) = wr.write_all(&out).await {
                        tracing::debug!(topic, error = %e, "subscriber write failed");
                        break SubExit::Disconnected;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic, skipped, "slow subscriber dropped messages");
                }
                Err(RecvError::Closed) => break SubExit::TopicClosed,
            },
            res = rd.read(&mut scratch) => match res {
                // bytes sent while subscribed are discarded; EOF or an
                // error means the client went away
                Ok(0) | Err(_) => break SubExit::Disconnected,
                Ok(_) => {}
            },
        }
    };

    pubsub.unsubscribe(topic);
    drop(rx);
    tracing::debug!(topic, "subscriber unregistered");
    exit
}
