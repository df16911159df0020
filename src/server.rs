//! The UDP and TCP listeners. Every request gets its own task, so a handler
//! stalled on a slow upstream only ever delays its own client.

use crate::dispatch::Dispatcher;
use crate::proxy::UPSTREAM_TIMEOUT;
use log::{info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream, UdpSocket};
use tokio::signal;
use tokio::task::JoinSet;
use tokio::time;

/// Binds the configured listener and serves until interrupted.
pub async fn run(listen: SocketAddr, tcp: bool, dispatcher: Dispatcher) -> io::Result<()> {
    let dispatcher = Arc::new(dispatcher);

    if tcp {
        serve_tcp(listen, dispatcher).await
    } else {
        serve_udp(listen, dispatcher).await
    }
}

/// One datagram in, one dispatcher call, one datagram back out.
async fn serve_udp(listen: SocketAddr, dispatcher: Arc<Dispatcher>) -> io::Result<()> {
    let socket = Arc::new(UdpSocket::bind(listen).await?);
    let mut handlers = JoinSet::new();
    let mut buf = vec![0; 65535];

    loop {
        let (len, peer) = tokio::select! {
            _ = signal::ctrl_c() => break,

            // Reap finished handlers so the set doesn't grow unbounded.
            Some(_) = handlers.join_next(), if !handlers.is_empty() => continue,

            received = socket.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(e) => {
                    warn!("receive error: {}", e);
                    continue;
                }
            },
        };

        let request = buf[..len].to_vec();
        let socket = Arc::clone(&socket);
        let dispatcher = Arc::clone(&dispatcher);

        handlers.spawn(async move {
            if let Some(response) = dispatcher.dispatch(&request, peer).await {
                if let Err(e) = socket.send_to(&response, peer).await {
                    warn!("{}: failed to send response: {}", peer.ip(), e);
                }
            }
        });
    }

    drain(handlers).await;
    Ok(())
}

async fn serve_tcp(listen: SocketAddr, dispatcher: Arc<Dispatcher>) -> io::Result<()> {
    let socket = match listen {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(listen)?;
    let listener = socket.listen(128)?;

    let mut handlers = JoinSet::new();

    loop {
        let (stream, peer) = tokio::select! {
            _ = signal::ctrl_c() => break,

            Some(_) = handlers.join_next(), if !handlers.is_empty() => continue,

            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept error: {}", e);
                    continue;
                }
            },
        };

        let dispatcher = Arc::clone(&dispatcher);
        handlers.spawn(async move {
            if let Err(e) = handle_stream(stream, peer, dispatcher).await {
                warn!("{}: connection error: {}", peer.ip(), e);
            }
        });
    }

    drain(handlers).await;
    Ok(())
}

/// One request per connection: length-prefixed request in, length-prefixed
/// response out (rfc1035 §4.2.2).
async fn handle_stream(
    mut stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> io::Result<()> {
    let mut len = [0; 2];
    stream.read_exact(&mut len).await?;

    let mut request = vec![0; u16::from_be_bytes(len).into()];
    stream.read_exact(&mut request).await?;

    if let Some(response) = dispatcher.dispatch(&request, peer).await {
        stream
            .write_all(&(response.len() as u16).to_be_bytes())
            .await?;
        stream.write_all(&response).await?;
    }

    Ok(())
}

/// Lets in-flight handlers finish, bounded by [`UPSTREAM_TIMEOUT`]. Whatever
/// is still running after that is cut off.
async fn drain(mut handlers: JoinSet<()>) {
    if handlers.is_empty() {
        return;
    }

    info!("waiting for {} in-flight queries", handlers.len());
    let _ = time::timeout(UPSTREAM_TIMEOUT, async {
        while handlers.join_next().await.is_some() {}
    })
    .await;
}
