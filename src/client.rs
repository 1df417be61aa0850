//! Chat client
//!
//! Dials the relay, sends the login line, then runs two loops side by
//! side: one prints every inbound line, the other forwards input lines.
//! After each forwarded line a read deadline is armed; any inbound line
//! disarms it. Every failure ends the session and is returned to the
//! caller, which decides how to report it. There is no reconnect.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::config::DEFAULT_READ_TIMEOUT;
use crate::error::ClientError;

/// A connected chat client
#[derive(Debug)]
pub struct ChatClient {
    nickname: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    read_timeout: Duration,
}

impl ChatClient {
    /// Open a TCP connection to `connection_string` (host:port)
    pub async fn connect(connection_string: &str, nickname: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(connection_string)
            .await
            .map_err(|source| ClientError::Connect {
                addr: connection_string.to_string(),
                source,
            })?;

        info!("Connected to {}", connection_string);

        let (reader, writer) = stream.into_split();
        Ok(Self {
            nickname: nickname.to_string(),
            reader: BufReader::new(reader),
            writer,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// Override how long to wait for an inbound line after sending one
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Send the login line
    pub async fn login(&mut self) -> Result<(), ClientError> {
        let line = format!("{}\r\n", self.nickname);
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(ClientError::Login)?;
        self.writer.flush().await.map_err(ClientError::Login)?;
        debug!("Logged in as {}", self.nickname);
        Ok(())
    }

    /// Relay `input` lines to the server and server lines to `output`
    ///
    /// Returns `Ok(())` when `input` ends. Any network failure, a closed
    /// server or an expired read deadline returns an error.
    pub async fn run<I, O>(self, input: I, output: O) -> Result<(), ClientError>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let ChatClient {
            reader,
            writer,
            read_timeout,
            ..
        } = self;

        let (deadline_tx, deadline_rx) = watch::channel(None);

        tokio::select! {
            result = listen(reader, output, deadline_rx) => result,
            result = input_loop(input, writer, deadline_tx, read_timeout) => result,
        }
    }
}

/// Print inbound lines until the server goes away or the deadline expires
async fn listen<R, O>(
    mut reader: R,
    mut output: O,
    mut deadline: watch::Receiver<Option<Instant>>,
) -> Result<(), ClientError>
where
    R: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut armed: Option<Instant> = None;
    let mut deadline_open = true;

    loop {
        tokio::select! {
            // Bytes of a line interrupted by another branch stay in `buf`.
            read = reader.read_until(b'\n', &mut buf) => {
                read?;
                if buf.last() != Some(&b'\n') {
                    return Err(ClientError::ServerClosed);
                }

                // Any deadline armed before this line was read is satisfied.
                let _ = deadline.borrow_and_update();
                armed = None;

                output.write_all(&buf).await?;
                output.flush().await?;
                buf.clear();
            }
            changed = deadline.changed(), if deadline_open => {
                match changed {
                    Ok(()) => armed = *deadline.borrow_and_update(),
                    Err(_) => deadline_open = false,
                }
            }
            _ = expiry(armed) => {
                return Err(ClientError::Timeout);
            }
        }
    }
}

/// Forward input lines to the server, arming the read deadline for each
async fn input_loop<I, W>(
    mut input: I,
    mut writer: W,
    deadline: watch::Sender<Option<Instant>>,
    read_timeout: Duration,
) -> Result<(), ClientError>
where
    I: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        input.read_line(&mut line).await?;
        if !line.ends_with('\n') {
            debug!("End of input");
            return Ok(());
        }

        // Armed before the write so the echo can never race ahead of it.
        deadline.send_replace(Some(Instant::now() + read_timeout));

        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
}

/// Complete at `deadline`, or never when disarmed
async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
