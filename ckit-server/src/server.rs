//! # TCP Server
//!
//! Accept RESP connections, feed each connection's parser, and dispatch one
//! frame at a time. A response is fully written before the next frame is
//! taken, so replies leave in request order even when a client pipelines.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::command::{dispatch, ServerCtx};
use crate::protocol::{ReplyBuf, RespParser};

/// Accept loop: one task per connection.
pub async fn serve(listener: TcpListener, ctx: Arc<ServerCtx>) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "cachekit listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            ctx.stats.client_connected();
            debug!(%peer, "client connected");
            if let Err(err) = handle_connection(stream, &ctx).await {
                debug!(%peer, error = %err, "connection error");
            }
            ctx.stats.client_disconnected();
            debug!(%peer, "client disconnected");
        });
    }
}

/// Handles a single client connection until EOF or a framing error.
pub async fn handle_connection(mut stream: TcpStream, ctx: &ServerCtx) -> std::io::Result<()> {
    let mut parser = RespParser::new();
    let mut scratch = BytesMut::with_capacity(8 * 1024);
    let mut out = ReplyBuf::new();

    loop {
        scratch.clear();
        let n = stream.read_buf(&mut scratch).await?;
        if n == 0 {
            break;
        }
        parser.feed(&scratch);

        loop {
            match parser.parse() {
                Ok(Some(frame)) => {
                    out.clear();
                    dispatch(ctx, &frame, &mut out);
                    stream.write_all(out.as_bytes()).await?;
                }
                Ok(None) => break,
                Err(err) => {
                    // answer once, then drop the poisoned stream
                    out.clear();
                    out.write_error(&format!("ERR protocol error: {err}"));
                    let _ = stream.write_all(out.as_bytes()).await;
                    return Ok(());
                }
            }
        }
    }

    Ok(())
}
