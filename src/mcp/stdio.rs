//! Line-delimited JSON-RPC over stdin/stdout.
//!
//! stdout carries protocol frames only; all logging goes to stderr.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::server::{json_rpc_error, McpServer, PARSE_ERROR};

/// Serve until stdin closes.
pub async fn run(server: McpServer) -> anyhow::Result<()> {
    serve(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve any reader/writer pair. Split out so tests can drive it in memory.
pub async fn serve<R, W>(server: McpServer, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    tracing::info!(adapter = server.adapter().name(), "MCP server listening on stdio");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str(line) {
            Ok(message) => server.handle(message).await,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable MCP message");
                Some(json_rpc_error(
                    serde_json::Value::Null,
                    PARSE_ERROR,
                    &format!("Parse error: {}", e),
                ))
            }
        };

        if let Some(reply) = reply {
            let mut frame = serde_json::to_vec(&reply)?;
            frame.push(b'\n');
            writer.write_all(&frame).await?;
            writer.flush().await?;
        }
    }

    tracing::info!("stdin closed, MCP server shutting down");
    Ok(())
}
