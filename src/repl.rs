// Line-oriented interactive prompt
use crate::error::AppError;
use crate::services::CachedQueryService;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const BANNER: &str = "Enter your SQL query (or type 'exit' to quit):";
pub const PROMPT: &str = "> ";

/// `exit` in any letter case ends the session
pub fn is_exit(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit")
}

/// Read one query per line until `exit` or end of input
///
/// Each line, minus its terminator, is passed to the service as-is. Request
/// errors are printed and the loop continues; only I/O errors end it early.
pub async fn run<R, W>(service: &CachedQueryService, mut input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(format!("{}\n", BANNER).as_bytes()).await?;

    let mut line = Vec::new();
    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        line.clear();
        if input.read_until(b'\n', &mut line).await? == 0 {
            tracing::info!("End of input");
            break;
        }

        let query = match std::str::from_utf8(&line) {
            Ok(text) => text.trim_end_matches(|c: char| c == '\n' || c == '\r'),
            Err(e) => {
                let err = AppError::Input(format!("line is not valid UTF-8: {}", e));
                output.write_all(format!("Error: {}\n", err).as_bytes()).await?;
                continue;
            }
        };
        if is_exit(query) {
            tracing::info!("Exiting. . .");
            break;
        }

        match service.execute(query).await {
            Ok(table) => {
                output.write_all(format!("Result: {}\n", table).as_bytes()).await?;
            }
            Err(e) => {
                tracing::error!(code = e.code(), "Request failed: {}", e);
                output.write_all(format!("Error: {}\n", e).as_bytes()).await?;
            }
        }
    }

    output.flush().await
}
