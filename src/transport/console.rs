use super::process_blocking;
use crate::terminal::{SimTerminal, QUIT_SENTINEL};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::{debug, info};

pub const BANNER: &str = "This is the simulator terminal program.  Type 'HELP' for help.\n\n";
pub const FAREWELL: &str = "SimTerminal is quitting!\n";

/// Line-at-a-time interactive loop.
pub struct ConsoleTransport<R, W> {
    reader: R,
    writer: W,
    history: Vec<String>,
}

impl ConsoleTransport<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            history: Vec::new(),
        }
    }

    /// Non-blank lines entered so far, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Print `text`, ending it with a newline if it lacks one.
    pub async fn print(&mut self, text: &str) -> std::io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.writer.write_all(text.as_bytes()).await?;
        if !text.ends_with('\n') {
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await
    }

    /// Run until end of input or `QUIT`.
    pub async fn run(&mut self, terminal: &mut SimTerminal) -> std::io::Result<()> {
        self.writer.write_all(BANNER.as_bytes()).await?;
        info!("Console transport started");

        let mut line = String::new();
        loop {
            self.writer.write_all(terminal.prompt().as_bytes()).await?;
            self.writer.flush().await?;

            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                debug!("Console input closed");
                break;
            }

            let input = line.trim_end_matches(['\r', '\n']);
            if !input.trim().is_empty() {
                self.history.push(input.to_string());
            }

            let result = process_blocking(terminal, input);
            if result == QUIT_SENTINEL {
                break;
            }
            self.print(&result).await?;
        }

        self.writer.write_all(FAREWELL.as_bytes()).await?;
        self.writer.flush().await
    }
}
