//! Public engine facade.
//!
//! One method per protocol operation. Each is a thin composition over the
//! session: an outbound command (or two, for the chained-ack pattern), a
//! terminal condition, and a result extractor.
//!
//! # Example
//!
//! ```ignore
//! use uciwire::{Engine, Setup};
//!
//! #[tokio::main]
//! async fn main() -> uciwire::Result<()> {
//!     let engine = Engine::spawn("stockfish", &[]).await?;
//!     let identity = engine.handshake().await?;
//!     println!("engine: {:?}", identity.name);
//!
//!     engine.new_game().await?;
//!     engine.set_position(Setup::Start, &[]).await?;
//!     engine.go_infinite(|info| println!("{info}")).await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(2)).await;
//!     let best = engine.stop().await?;
//!     println!("bestmove: {:?}", best.mv);
//!
//!     engine.quit().await?;
//!     Ok(())
//! }
//! ```

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command as ProcessCommand;

use crate::error::{Result, UciError};
use crate::protocol::{BestMove, Command, Setup};
use crate::session::{
    spawn_info_task, Awaiting, EngineIdentity, InfoHandler, Reply, Session, Shutdown,
};

/// A running UCI engine process.
///
/// Commands are serialized: the engine answers one at a time, so each
/// pending command's reply is matched strictly in issuance order. All
/// methods are cancel-safe — a caller racing a command against
/// `tokio::time::timeout` leaves later commands correctly aligned.
pub struct Engine {
    session: Session,
    pid: u32,
}

impl Engine {
    /// Spawn an engine executable with piped stdio and wire up the
    /// session. Returns as soon as the process is running; protocol
    /// startup failures (stderr before any output) surface on the first
    /// command issued.
    pub async fn spawn<P, I, A>(path: P, args: I) -> Result<Engine>
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let mut child = ProcessCommand::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| UciError::Startup("child stdin is not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| UciError::Startup("child stdout is not piped".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| UciError::Startup("child stderr is not piped".into()))?;
        let pid = child
            .id()
            .ok_or_else(|| UciError::Startup("child exited before startup".into()))?;

        tracing::debug!(pid, "engine process spawned");

        let exit = async move { child.wait().await };
        let session = Session::attach(stdin, stdout, stderr, exit);

        Ok(Engine { session, pid })
    }

    /// Process id of the spawned engine.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// `uci` — identify the engine and switch it into UCI mode.
    ///
    /// Resolves on `uciok` with the name, author, and raw option lines
    /// accumulated along the way.
    pub async fn handshake(&self) -> Result<EngineIdentity> {
        match self
            .session
            .submit(&[Command::Uci], Awaiting::Handshake(EngineIdentity::default()))
            .await?
        {
            Reply::Identity(identity) => Ok(identity),
            _ => unreachable!("handshake resolved with a foreign reply"),
        }
    }

    /// `isready` — resolves on `readyok`.
    pub async fn ready(&self) -> Result<()> {
        self.acked(&[Command::IsReady]).await
    }

    /// `setoption name <N> [value <V>]`.
    ///
    /// The protocol has no acknowledgment for this command, so an
    /// `isready` is chained immediately after and its `readyok` is
    /// treated as the ack.
    pub async fn set_option(&self, name: &str, value: Option<&str>) -> Result<()> {
        self.acked(&[
            Command::SetOption {
                name: name.to_string(),
                value: value.map(str::to_string),
            },
            Command::IsReady,
        ])
        .await
    }

    /// `ucinewgame`, acknowledged by a chained `isready`.
    pub async fn new_game(&self) -> Result<()> {
        self.acked(&[Command::NewGame, Command::IsReady]).await
    }

    /// `position startpos|fen <FEN> [moves ...]`, acknowledged by a
    /// chained `isready`. Moves are opaque algebraic tokens.
    pub async fn set_position(&self, setup: Setup, moves: &[&str]) -> Result<()> {
        self.acked(&[
            Command::Position {
                setup,
                moves: moves.iter().map(|m| m.to_string()).collect(),
            },
            Command::IsReady,
        ])
        .await
    }

    /// `go wtime <W> btime <B>` — search under clock times, resolving on
    /// `bestmove`. Info lines emitted during the search are discarded.
    pub async fn go_clock(&self, wtime: Duration, btime: Duration) -> Result<BestMove> {
        self.search(Command::GoClock { wtime, btime }, None).await
    }

    /// Like [`go_clock`](Self::go_clock), invoking `on_info` for every
    /// raw `info ...` line the search emits before its `bestmove`.
    pub async fn go_clock_with_info<F>(
        &self,
        wtime: Duration,
        btime: Duration,
        on_info: F,
    ) -> Result<BestMove>
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.search(Command::GoClock { wtime, btime }, Some(Box::new(on_info)))
            .await
    }

    /// `go infinite` — start an unbounded search, invoking `on_info` for
    /// every `info ...` line until [`stop`](Self::stop) resolves.
    ///
    /// Returns once the subscription is installed and the command is
    /// written; it does not wait for any engine reply. Fails with
    /// [`UciError::SearchActive`] while a previous unbounded search has
    /// not been stopped yet.
    pub async fn go_infinite<F>(&self, on_info: F) -> Result<()>
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.session.start_streaming(Box::new(on_info)).await
    }

    /// `stop` — end the current search, resolving on its `bestmove` and
    /// removing the info subscription installed by
    /// [`go_infinite`](Self::go_infinite).
    ///
    /// Safe to call when no search is active: engines ignore `stop`
    /// outside a search, so nothing is written and the call resolves
    /// immediately with the no-move sentinel.
    pub async fn stop(&self) -> Result<BestMove> {
        match self.session.submit_stop().await? {
            Some(Reply::Best(best)) => Ok(best),
            None => Ok(BestMove {
                mv: None,
                ponder: None,
            }),
            Some(_) => unreachable!("stop resolved with a foreign reply"),
        }
    }

    /// Arbitrary passthrough text. Serialized through the same command
    /// queue as every other operation; resolves with the first complete
    /// line of output, uninterpreted.
    pub async fn send_raw(&self, line: &str) -> Result<String> {
        match self
            .session
            .submit(&[Command::Raw(line.to_string())], Awaiting::AnyLine)
            .await?
        {
            Reply::Raw(text) => Ok(text),
            _ => unreachable!("raw command resolved with a foreign reply"),
        }
    }

    /// `quit` — resolves once the process close notification fires, with
    /// the spawn-time pid and the exit status.
    pub async fn quit(self) -> Result<Shutdown> {
        match self.session.submit(&[Command::Quit], Awaiting::Exit).await? {
            Reply::Exit(status) => Ok(Shutdown {
                pid: self.pid,
                status,
            }),
            _ => unreachable!("quit resolved with a foreign reply"),
        }
    }

    async fn acked(&self, commands: &[Command]) -> Result<()> {
        match self.session.submit(commands, Awaiting::ReadyOk).await? {
            Reply::Ready => Ok(()),
            _ => unreachable!("ready-check resolved with a foreign reply"),
        }
    }

    /// Run a search command and await its `bestmove`.
    async fn search(&self, command: Command, on_info: Option<InfoHandler>) -> Result<BestMove> {
        match self
            .session
            .submit(
                &[command],
                Awaiting::BestMove {
                    clear_forwarder: false,
                    on_info: on_info.map(spawn_info_task),
                },
            )
            .await?
        {
            Reply::Best(best) => Ok(best),
            _ => unreachable!("search resolved with a foreign reply"),
        }
    }
}
