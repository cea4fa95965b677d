//! Interactive command loop.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use courier_client::ClientSession;
use courier_locator::Locator;

const MENU: &str = "\
CONN - Connect to server
UPLD - Upload a file
LIST - List files on server
DWLD - Download a file
DELF - Delete a file on server
QUIT - Exit";

enum Command {
    Connect,
    Upload,
    List,
    Download,
    Delete,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_uppercase().as_str() {
            "CONN" => Some(Self::Connect),
            "UPLD" => Some(Self::Upload),
            "LIST" => Some(Self::List),
            "DWLD" => Some(Self::Download),
            "DELF" => Some(Self::Delete),
            "QUIT" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Reads commands from `input` and drives `session`, writing to `out`.
pub struct Repl<L: Locator, R, W> {
    session: ClientSession<L>,
    input: R,
    out: W,
}

impl<L, R, W> Repl<L, R, W>
where
    L: Locator,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(session: ClientSession<L>, input: R, out: W) -> Self {
        Self {
            session,
            input,
            out,
        }
    }

    /// Runs until QUIT or end of input. Returns the session, disconnected.
    pub async fn run(mut self) -> std::io::Result<ClientSession<L>> {
        loop {
            let status = if self.session.is_connected() {
                "Connected to server"
            } else {
                "Not connected to server"
            };
            writeln!(self.out, "\n{status}\n{MENU}")?;

            let Some(line) = self.prompt("> ").await? else {
                break;
            };
            if line.is_empty() {
                continue;
            }

            match Command::parse(&line) {
                Some(Command::Quit) => break,
                Some(command) => self.execute(command).await?,
                None => writeln!(self.out, "Unrecognized command: {line}")?,
            }
        }

        self.session.disconnect();
        writeln!(self.out, "Goodbye.")?;
        Ok(self.session)
    }

    async fn execute(&mut self, command: Command) -> std::io::Result<()> {
        if !matches!(command, Command::Connect) && !self.session.is_connected() {
            writeln!(self.out, "Not connected to server. Use CONN first.")?;
            return Ok(());
        }

        match command {
            Command::Connect => self.connect().await,
            Command::Upload => self.upload().await,
            Command::List => self.list().await,
            Command::Download => self.download().await,
            Command::Delete => self.delete().await,
            Command::Quit => Ok(()),
        }
    }

    async fn connect(&mut self) -> std::io::Result<()> {
        if self.session.is_connected() {
            writeln!(self.out, "Already connected.")?;
            return Ok(());
        }

        let config = self.session.config();
        let target = format!("{}:{}", config.host, config.port);
        match self.session.connect().await {
            Ok(()) => writeln!(self.out, "Connected to {target}."),
            Err(e) => writeln!(self.out, "Could not connect to {target}: {e}"),
        }
    }

    async fn upload(&mut self) -> std::io::Result<()> {
        let Some(path) = self.prompt_required("Enter file name to upload: ").await? else {
            return Ok(());
        };
        match self.session.upload_file(Path::new(&path)).await {
            Ok(name) => writeln!(self.out, "Uploaded {name}."),
            Err(e) => writeln!(self.out, "Upload failed: {e}"),
        }
    }

    async fn list(&mut self) -> std::io::Result<()> {
        match self.session.list_remote_files().await {
            Ok(files) if files.is_empty() => writeln!(self.out, "No files stored on server."),
            Ok(files) => {
                for name in files {
                    writeln!(self.out, "  {name}")?;
                }
                Ok(())
            }
            Err(e) => writeln!(self.out, "List failed: {e}"),
        }
    }

    async fn download(&mut self) -> std::io::Result<()> {
        let Some(remote) = self.prompt_required("Enter remote file name: ").await? else {
            return Ok(());
        };

        let default_local = Path::new(&remote)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&remote));
        let Some(answer) = self
            .prompt(&format!("Save as [{}]: ", default_local.display()))
            .await?
        else {
            return Ok(());
        };
        let local = if answer.is_empty() {
            default_local
        } else {
            PathBuf::from(answer)
        };

        match self.session.download_file(&remote, &local).await {
            Ok(size) => writeln!(
                self.out,
                "Downloaded {remote} to {} ({size} bytes).",
                local.display()
            ),
            Err(e) => writeln!(self.out, "Download failed: {e}"),
        }
    }

    async fn delete(&mut self) -> std::io::Result<()> {
        let Some(remote) = self.prompt_required("Enter remote file name to delete: ").await? else {
            return Ok(());
        };
        match self.session.delete_remote_file(&remote).await {
            Ok(()) => writeln!(self.out, "Deleted {remote}."),
            Err(e) => writeln!(self.out, "Delete failed: {e}"),
        }
    }

    /// Prompts for a value, reporting and skipping an empty answer.
    async fn prompt_required(&mut self, text: &str) -> std::io::Result<Option<String>> {
        match self.prompt(text).await? {
            Some(answer) if answer.is_empty() => {
                writeln!(self.out, "No file name given.")?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Prints `text` and reads one trimmed line. `None` at end of input.
    async fn prompt(&mut self, text: &str) -> std::io::Result<Option<String>> {
        write!(self.out, "{text}")?;
        self.out.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}
