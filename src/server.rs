use std::net::SocketAddr;
use thiserror::Error as ThisError;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

use crate::aof::{Aof, AofError};
use crate::config::Config;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Starts the server: opens and replays the append-only file, then serves clients until the
/// process receives Ctrl-C. Failing to open or replay the file is fatal, no client is ever served
/// against a partially restored store.
pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let store = Store::new();
    let aof = Aof::open(&config.aof_path, config.fsync_interval).await?;
    load(&store, &aof).await?;

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;

    tokio::select! {
        res = serve(listener, store, aof.clone()) => res?,
        _ = signal::ctrl_c() => info!("Shutting down"),
    }

    aof.close().await?;
    Ok(())
}

/// Rebuilds `store` from the append-only file. Entries go through the same dispatch path as live
/// requests but are not appended again.
pub async fn load(store: &Store, aof: &Aof) -> Result<usize, AofError> {
    aof.replay(|frame| {
        let (command, args) = split_request(&frame)?;
        let reply = store.handle(&command, args)?;
        if reply.is_error() {
            warn!(%frame, %reply, "Replayed entry was rejected");
        }
        Ok(())
    })
    .await
}

/// Accepts clients on `listener` forever, one task per connection.
pub async fn serve(listener: TcpListener, store: Store, aof: Aof) -> Result<(), Error> {
    info!("Redis server listening on {}", listener.local_addr()?);

    loop {
        let (socket, client_address) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                // Transient, e.g. the process ran out of file descriptors.
                error!(error = %e, "Failed to accept connection");
                time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };
        let store = store.clone();
        let aof = aof.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, store, aof).await {
                error!(error = %e, "Connection terminated with an error");
            }
        });
    }
}

#[instrument(
    name = "connection",
    skip(stream, store, aof),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: Store,
    aof: Aof,
) -> Result<(), Error> {
    let mut conn = Connection::new(stream);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    while let Some(frame) = conn.read_frame().await? {
        debug!("Received frame from client: {}", frame);
        let res = process(&store, &aof, frame).await;
        debug!("Sending response to client: {}", res);

        conn.write_frame(&res).await?;
    }

    info!("Connection closed");
    Ok(())
}

/// Runs one request and returns the reply for the client. Accepted writes are appended to the
/// append-only file; if that fails the client still gets its reply, but the write is not durable.
async fn process(store: &Store, aof: &Aof, frame: Frame) -> Frame {
    let (command, args) = match split_request(&frame) {
        Ok(request) => request,
        Err(e) => return Frame::Error(e.to_string()),
    };

    let res = match store.handle(&command, args) {
        Ok(res) => res,
        Err(e) => return Frame::Error(e.to_string()),
    };

    if store.is_write(&command) && !res.is_error() {
        if let Err(e) = aof.append(&frame).await {
            error!(error = %e, %frame, "Failed to append to the append-only file");
        }
    }

    res
}

/// Splits a request into its upper-cased command name and arguments.
fn split_request(frame: &Frame) -> Result<(String, &[Frame]), RequestError> {
    match frame {
        Frame::Array(parts) if !parts.is_empty() => {
            Ok((parts[0].as_bulk_text().to_uppercase(), &parts[1..]))
        }
        frame => Err(RequestError::InvalidRequest(frame.to_string())),
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum RequestError {
    #[error("ERR protocol error; expected a non-empty array, got {0}")]
    InvalidRequest(String),
}
