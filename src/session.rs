//! Engine session: stream ownership and command correlation.
//!
//! A [`Session`] wraps the three pipe endpoints of a spawned engine plus
//! its exit notification. Three tasks feed a shared [`Correlator`]:
//!
//! ```text
//! stdout reader ─► LineBuffer ─► classify ─┐
//! stderr reader ───────────────────────────┼─► Correlator ─► oneshot
//! exit watcher ────────────────────────────┘      │
//!                                                 └─► info forwarder
//! ```
//!
//! The correlator keeps a FIFO of pending commands and matches classified
//! lines only against the head of the queue. The engine answers one
//! command at a time on a single stream, so attaching anything but the
//! head risks one command consuming a line meant for another. The single
//! sanctioned overlap is the `go infinite` info forwarder, which coexists
//! with the bestmove matcher queued by `stop` and is removed together
//! with it when the terminal line (or a malformed one) arrives.
//!
//! Commands are enqueued under the correlator lock *before* their bytes
//! are written, so a reply can never arrive ahead of its listener. The
//! writer mutex keeps write order identical to queue order under
//! concurrent callers. Info subscribers are fed through a channel and
//! run on their own task, so the correlator lock is never held across
//! user code.

use std::collections::VecDeque;
use std::future::Future;
use std::process::ExitStatus;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, UciError};
use crate::protocol::{classify, BestMove, Command, EngineLine, LineBuffer};

/// Identification accumulated during the `uci` handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineIdentity {
    /// From `id name ...`, if the engine sent one.
    pub name: Option<String>,
    /// From `id author ...`, if the engine sent one.
    pub author: Option<String>,
    /// Raw `option ...` lines, in the order the engine printed them.
    pub options: Vec<String>,
}

/// Confirmation of a completed `quit`.
#[derive(Debug)]
pub struct Shutdown {
    /// Process id the engine was spawned with.
    pub pid: u32,
    /// Exit status reported by the close notification.
    pub status: ExitStatus,
}

/// Handler invoked for each raw `info ...` line of a search.
pub type InfoHandler = Box<dyn FnMut(&str) + Send>;

/// Sending half of an info subscription. The correlator only ever
/// pushes into the channel; the handler itself runs on its own task so
/// user code never executes under the correlator lock.
pub(crate) type InfoSink = mpsc::UnboundedSender<String>;

/// Spawn the delivery task for an info handler and return its sink.
/// The task drains remaining lines and exits once every sink clone is
/// dropped (forwarder teardown, process exit).
pub(crate) fn spawn_info_task(mut handler: InfoHandler) -> InfoSink {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            handler(&line);
        }
    });
    tx
}

/// What a resolved command yields.
pub(crate) enum Reply {
    Identity(EngineIdentity),
    Ready,
    Best(BestMove),
    Raw(String),
    Exit(ExitStatus),
}

/// Terminal condition the head of the queue is waiting for.
pub(crate) enum Awaiting {
    /// `uciok`, accumulating id/option lines along the way.
    Handshake(EngineIdentity),
    /// `readyok` (direct or chained after an unacknowledged command).
    ReadyOk,
    /// `bestmove ...`.
    BestMove {
        /// Set by `stop`: tear down the `go infinite` forwarder too.
        clear_forwarder: bool,
        /// Per-search sink for `info` lines (bounded search).
        on_info: Option<InfoSink>,
    },
    /// The first complete line, whatever it is (raw passthrough).
    AnyLine,
    /// The process close notification, not a line (`quit`).
    Exit,
}

struct Pending {
    awaiting: Awaiting,
    tx: oneshot::Sender<Result<Reply>>,
}

/// Correlation state shared by the stream tasks and the command writers.
#[derive(Default)]
struct Correlator {
    /// FIFO of pending commands; only the head sees classified lines.
    queue: VecDeque<Pending>,
    /// Installed by `go infinite`, removed by `stop`'s terminal.
    info_forwarder: Option<InfoSink>,
    /// Whether the engine has produced any stdout yet.
    saw_stdout: bool,
    /// First stderr text seen before any stdout; fails later commands.
    fatal: Option<String>,
    /// Set once the process close notification fired.
    closed: bool,
}

impl Correlator {
    /// Why a new command must be refused, if it must.
    fn refusal(&self) -> Option<UciError> {
        if self.closed {
            Some(UciError::Closed)
        } else {
            self.fatal.clone().map(UciError::Startup)
        }
    }

    fn note_stdout(&mut self) {
        self.saw_stdout = true;
    }

    /// Whether a search can still produce a `bestmove` terminal, either
    /// through the installed forwarder or a queued bestmove matcher.
    fn search_active(&self) -> bool {
        self.info_forwarder.is_some()
            || self
                .queue
                .iter()
                .any(|p| matches!(p.awaiting, Awaiting::BestMove { .. }))
    }

    /// Feed one complete stdout line through classification and the
    /// head-of-queue matcher.
    fn handle_line(&mut self, raw: &str) {
        // Raw passthrough resolves on the first complete line with no
        // classification at all.
        if matches!(
            self.queue.front().map(|p| &p.awaiting),
            Some(Awaiting::AnyLine)
        ) {
            if let Some(pending) = self.queue.pop_front() {
                let _ = pending.tx.send(Ok(Reply::Raw(raw.to_string())));
            }
            return;
        }

        match classify(raw) {
            EngineLine::Info(text) => self.route_info(&text),
            line => self.match_head(line, raw),
        }
    }

    /// Deliver an info line to whoever subscribed to the running
    /// search. Delivery is a channel send; the subscriber's task picks
    /// the line up outside this lock.
    fn route_info(&mut self, text: &str) {
        if let Some(Pending {
            awaiting:
                Awaiting::BestMove {
                    on_info: Some(sink),
                    ..
                },
            ..
        }) = self.queue.front()
        {
            let _ = sink.send(text.to_string());
        } else if let Some(forwarder) = &self.info_forwarder {
            let _ = forwarder.send(text.to_string());
        } else {
            tracing::trace!(line = %text, "info line with no subscriber");
        }
    }

    /// Match a classified line against the head pending command.
    fn match_head(&mut self, line: EngineLine, raw: &str) {
        let Some(head) = self.queue.front_mut() else {
            tracing::trace!(line = %raw, "line arrived with no pending command");
            return;
        };

        let outcome = match (&mut head.awaiting, line) {
            (Awaiting::Handshake(id), EngineLine::IdName(name)) => {
                id.name = Some(name);
                None
            }
            (Awaiting::Handshake(id), EngineLine::IdAuthor(author)) => {
                id.author = Some(author);
                None
            }
            (Awaiting::Handshake(id), EngineLine::Option(text)) => {
                id.options.push(text);
                None
            }
            (Awaiting::Handshake(id), EngineLine::UciOk) => {
                Some(Ok(Reply::Identity(std::mem::take(id))))
            }
            (Awaiting::ReadyOk, EngineLine::ReadyOk) => Some(Ok(Reply::Ready)),
            (
                Awaiting::BestMove {
                    clear_forwarder, ..
                },
                EngineLine::BestMove(best),
            ) => {
                if *clear_forwarder {
                    self.info_forwarder = None;
                }
                Some(Ok(Reply::Best(best)))
            }
            (
                Awaiting::BestMove {
                    clear_forwarder, ..
                },
                EngineLine::MalformedBestMove(text),
            ) => {
                // The terminal prefix matched but the grammar did not: a
                // defect in the engine's output, surfaced as a rejection
                // rather than a wedge. The forwarder still comes down so
                // no listener outlives the search.
                if *clear_forwarder {
                    self.info_forwarder = None;
                }
                Some(Err(UciError::Format(text)))
            }
            (_, other) => {
                tracing::trace!(line = ?other, "dropped line while awaiting terminal");
                None
            }
        };

        if let Some(result) = outcome {
            if let Some(pending) = self.queue.pop_front() {
                // Sending to a dropped receiver is a no-op, which is how
                // a timed-out caller deregisters: its entry still
                // consumes its own terminal line, keeping later commands
                // aligned with their responses.
                let _ = pending.tx.send(result);
            }
        }
    }

    /// Data on the error stream. Before any stdout it means the engine
    /// failed to launch; afterwards it rejects the pending command.
    fn handle_stderr(&mut self, text: &str) {
        let startup = !self.saw_stdout;
        if startup && self.fatal.is_none() {
            self.fatal = Some(text.to_string());
        }

        let head_rejectable = matches!(
            self.queue.front().map(|p| &p.awaiting),
            Some(awaiting) if !matches!(awaiting, Awaiting::Exit)
        );
        if !head_rejectable {
            tracing::warn!(stderr = %text, "engine stderr with no rejectable command");
            return;
        }

        if let Some(pending) = self.queue.pop_front() {
            let err = if startup {
                UciError::Startup(text.to_string())
            } else {
                UciError::Process(text.to_string())
            };
            let _ = pending.tx.send(Err(err));
        }
    }

    /// The process closed. Resolves `quit` waiters with the status and
    /// rejects everything else so no future is left pending forever.
    fn handle_exit(&mut self, status: ExitStatus) {
        tracing::debug!(%status, "engine process closed");
        self.closed = true;
        self.info_forwarder = None;

        for pending in self.queue.drain(..) {
            let result = match pending.awaiting {
                Awaiting::Exit => Ok(Reply::Exit(status)),
                _ => Err(UciError::Terminated),
            };
            let _ = pending.tx.send(result);
        }
    }
}

/// One spawned engine process, as three stream endpoints plus an exit
/// notification. Owns the partial-line carry for the whole session so
/// bytes arriving between command boundaries are never lost.
pub(crate) struct Session {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    state: Arc<Mutex<Correlator>>,
}

impl Session {
    /// Wire up a session from raw stream endpoints.
    ///
    /// `exit` must resolve exactly once, when the process closes.
    pub(crate) fn attach<W, O, E, X>(writer: W, stdout: O, stderr: E, exit: X) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        O: AsyncRead + Send + Unpin + 'static,
        E: AsyncRead + Send + Unpin + 'static,
        X: Future<Output = std::io::Result<ExitStatus>> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(Correlator::default()));

        tokio::spawn(stdout_loop(stdout, state.clone()));
        tokio::spawn(stderr_loop(stderr, state.clone()));

        let exit_state = state.clone();
        tokio::spawn(async move {
            match exit.await {
                Ok(status) => exit_state.lock().handle_exit(status),
                Err(e) => {
                    tracing::error!(error = %e, "failed to await engine exit");
                    exit_state.lock().handle_exit(ExitStatus::default());
                }
            }
        });

        Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            state,
        }
    }

    /// Send command lines and await the terminal condition.
    ///
    /// All lines are written back-to-back under the writer lock; the
    /// chained-ack pattern (`setoption` + `isready`) passes two commands
    /// with a single `ReadyOk` pending.
    pub(crate) async fn submit(&self, commands: &[Command], awaiting: Awaiting) -> Result<Reply> {
        let mut writer = self.writer.lock().await;

        let rx = {
            let mut state = self.state.lock();
            if let Some(err) = state.refusal() {
                return Err(err);
            }
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(Pending { awaiting, tx });
            rx
        };

        if let Err(e) = write_commands(&mut writer, commands).await {
            // The listener was never going to fire; take it back out.
            self.state.lock().queue.pop_back();
            return Err(e);
        }
        drop(writer);

        rx.await.map_err(|_| UciError::Terminated)?
    }

    /// Queue a `stop` only when a search can still produce a `bestmove`
    /// terminal. Engines ignore `stop` outside a search, so queueing a
    /// matcher with nothing running would wedge the head of the queue;
    /// an idle stop resolves immediately with `None` instead, writing
    /// nothing.
    pub(crate) async fn submit_stop(&self) -> Result<Option<Reply>> {
        let mut writer = self.writer.lock().await;

        let rx = {
            let mut state = self.state.lock();
            if let Some(err) = state.refusal() {
                return Err(err);
            }
            if !state.search_active() {
                return Ok(None);
            }
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(Pending {
                awaiting: Awaiting::BestMove {
                    clear_forwarder: true,
                    on_info: None,
                },
                tx,
            });
            rx
        };

        if let Err(e) = write_commands(&mut writer, &[Command::Stop]).await {
            self.state.lock().queue.pop_back();
            return Err(e);
        }
        drop(writer);

        rx.await.map_err(|_| UciError::Terminated)?.map(Some)
    }

    /// Install the long-lived info forwarder and start an unbounded
    /// search. Returns as soon as the command is written; `info` lines
    /// flow to the handler until `stop`'s bestmove tears it down.
    ///
    /// Rejected with [`UciError::SearchActive`] while a previous
    /// subscription is still installed.
    pub(crate) async fn start_streaming(&self, handler: InfoHandler) -> Result<()> {
        let mut writer = self.writer.lock().await;

        {
            let mut state = self.state.lock();
            if let Some(err) = state.refusal() {
                return Err(err);
            }
            if state.info_forwarder.is_some() {
                return Err(UciError::SearchActive);
            }
            state.info_forwarder = Some(spawn_info_task(handler));
        }

        if let Err(e) = write_commands(&mut writer, &[Command::GoInfinite]).await {
            self.state.lock().info_forwarder = None;
            return Err(e);
        }
        Ok(())
    }
}

async fn write_commands(
    writer: &mut Box<dyn AsyncWrite + Send + Unpin>,
    commands: &[Command],
) -> Result<()> {
    for command in commands {
        tracing::debug!(command = %command, "sending");
        let mut line = command.to_string();
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Read loop for the engine's stdout. Owns the carry buffer: every byte
/// read lands in exactly one reconstructed line, in order.
async fn stdout_loop<O>(mut stdout: O, state: Arc<Mutex<Correlator>>)
where
    O: AsyncRead + Send + Unpin,
{
    let mut lines = LineBuffer::new();
    let mut buf = vec![0u8; 8 * 1024];

    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let mut correlator = state.lock();
                correlator.note_stdout();
                for line in lines.push(&buf[..n]) {
                    tracing::trace!(line = %line, "engine");
                    correlator.handle_line(&line);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "engine stdout read failed");
                break;
            }
        }
    }
}

async fn stderr_loop<E>(mut stderr: E, state: Arc<Mutex<Correlator>>)
where
    E: AsyncRead + Send + Unpin,
{
    let mut buf = vec![0u8; 8 * 1024];

    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                state.lock().handle_stderr(text.trim_end());
            }
            Err(e) => {
                tracing::error!(error = %e, "engine stderr read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pend(correlator: &mut Correlator, awaiting: Awaiting) -> oneshot::Receiver<Result<Reply>> {
        let (tx, rx) = oneshot::channel();
        correlator.queue.push_back(Pending { awaiting, tx });
        rx
    }

    fn feed(correlator: &mut Correlator, lines: &[&str]) {
        correlator.note_stdout();
        for line in lines {
            correlator.handle_line(line);
        }
    }

    #[test]
    fn test_handshake_accumulates_until_uciok() {
        let mut c = Correlator::default();
        let mut rx = pend(&mut c, Awaiting::Handshake(EngineIdentity::default()));

        feed(
            &mut c,
            &["id name Sample", "id author Dev", "option name X type check"],
        );
        assert!(rx.try_recv().is_err(), "must not resolve before uciok");

        feed(&mut c, &["uciok"]);
        let Ok(Reply::Identity(id)) = rx.try_recv().unwrap() else {
            panic!("expected identity");
        };
        assert_eq!(id.name.as_deref(), Some("Sample"));
        assert_eq!(id.author.as_deref(), Some("Dev"));
        assert_eq!(id.options, vec!["option name X type check"]);
        assert!(c.queue.is_empty());
    }

    #[test]
    fn test_fifo_never_cross_matches() {
        let mut c = Correlator::default();
        let mut rx1 = pend(&mut c, Awaiting::ReadyOk);
        let mut rx2 = pend(&mut c, Awaiting::ReadyOk);

        feed(&mut c, &["readyok"]);
        assert!(matches!(rx1.try_recv().unwrap(), Ok(Reply::Ready)));
        assert!(rx2.try_recv().is_err(), "second readyok not yet seen");

        feed(&mut c, &["readyok"]);
        assert!(matches!(rx2.try_recv().unwrap(), Ok(Reply::Ready)));
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_bounded_search_info_goes_to_own_sink() {
        let (info_tx, mut info_rx) = mpsc::unbounded_channel();

        let mut c = Correlator::default();
        let mut rx = pend(
            &mut c,
            Awaiting::BestMove {
                clear_forwarder: false,
                on_info: Some(info_tx),
            },
        );

        feed(&mut c, &["info depth 1", "info depth 2", "bestmove e2e4"]);

        assert_eq!(drain(&mut info_rx), vec!["info depth 1", "info depth 2"]);
        let Ok(Reply::Best(best)) = rx.try_recv().unwrap() else {
            panic!("expected bestmove");
        };
        assert_eq!(best.mv.unwrap().to_string(), "e2e4");
    }

    #[test]
    fn test_forwarder_torn_down_with_stop_terminal() {
        let (info_tx, mut info_rx) = mpsc::unbounded_channel();

        let mut c = Correlator::default();
        c.info_forwarder = Some(info_tx);

        feed(&mut c, &["info depth 1"]);

        let mut rx = pend(
            &mut c,
            Awaiting::BestMove {
                clear_forwarder: true,
                on_info: None,
            },
        );
        feed(&mut c, &["info depth 2", "bestmove g1f3 ponder g8f6"]);

        assert!(matches!(rx.try_recv().unwrap(), Ok(Reply::Best(_))));
        assert!(c.info_forwarder.is_none(), "forwarder must be removed");

        // Lines arriving after the terminal reach no subscriber.
        feed(&mut c, &["info depth 3"]);
        assert_eq!(drain(&mut info_rx), vec!["info depth 1", "info depth 2"]);
    }

    #[test]
    fn test_search_active_tracks_forwarder_and_matchers() {
        let mut c = Correlator::default();
        assert!(!c.search_active());

        let _rx = pend(&mut c, Awaiting::ReadyOk);
        assert!(!c.search_active(), "readyok pending is not a search");

        let _rx = pend(
            &mut c,
            Awaiting::BestMove {
                clear_forwarder: false,
                on_info: None,
            },
        );
        assert!(c.search_active());

        let mut c = Correlator::default();
        let (info_tx, _info_rx) = mpsc::unbounded_channel();
        c.info_forwarder = Some(info_tx);
        assert!(c.search_active());
    }

    #[test]
    fn test_malformed_bestmove_rejects_and_clears_forwarder() {
        let mut c = Correlator::default();
        let (info_tx, _info_rx) = mpsc::unbounded_channel();
        c.info_forwarder = Some(info_tx);

        let mut rx = pend(
            &mut c,
            Awaiting::BestMove {
                clear_forwarder: true,
                on_info: None,
            },
        );
        feed(&mut c, &["bestmove"]);

        assert!(matches!(rx.try_recv().unwrap(), Err(UciError::Format(_))));
        assert!(c.info_forwarder.is_none());
    }

    #[test]
    fn test_any_line_resolves_raw() {
        let mut c = Correlator::default();
        let mut rx = pend(&mut c, Awaiting::AnyLine);

        feed(&mut c, &["info string anything at all"]);
        let Ok(Reply::Raw(raw)) = rx.try_recv().unwrap() else {
            panic!("expected raw line");
        };
        assert_eq!(raw, "info string anything at all");
    }

    #[test]
    fn test_stderr_before_stdout_is_startup_failure() {
        let mut c = Correlator::default();
        let mut rx = pend(&mut c, Awaiting::ReadyOk);

        c.handle_stderr("no such nnue file");
        assert!(matches!(rx.try_recv().unwrap(), Err(UciError::Startup(_))));
        assert!(matches!(c.refusal(), Some(UciError::Startup(_))));
    }

    #[test]
    fn test_stderr_while_pending_rejects_head_only() {
        let mut c = Correlator::default();
        c.note_stdout();
        let mut rx1 = pend(&mut c, Awaiting::ReadyOk);
        let mut rx2 = pend(&mut c, Awaiting::ReadyOk);

        c.handle_stderr("illegal option");
        assert!(matches!(rx1.try_recv().unwrap(), Err(UciError::Process(_))));
        assert!(rx2.try_recv().is_err(), "second command still pending");

        feed(&mut c, &["readyok"]);
        assert!(matches!(rx2.try_recv().unwrap(), Ok(Reply::Ready)));
    }

    #[test]
    fn test_exit_rejects_pending_and_resolves_quit() {
        let mut c = Correlator::default();
        c.note_stdout();
        let mut search_rx = pend(
            &mut c,
            Awaiting::BestMove {
                clear_forwarder: false,
                on_info: None,
            },
        );
        let mut quit_rx = pend(&mut c, Awaiting::Exit);
        let (info_tx, _info_rx) = mpsc::unbounded_channel();
        c.info_forwarder = Some(info_tx);

        c.handle_exit(ExitStatus::default());

        assert!(matches!(
            search_rx.try_recv().unwrap(),
            Err(UciError::Terminated)
        ));
        assert!(matches!(quit_rx.try_recv().unwrap(), Ok(Reply::Exit(_))));
        assert!(c.info_forwarder.is_none());
        assert!(matches!(c.refusal(), Some(UciError::Closed)));
    }

    #[test]
    fn test_abandoned_pending_still_consumes_its_terminal() {
        let mut c = Correlator::default();
        let rx1 = pend(&mut c, Awaiting::ReadyOk);
        drop(rx1); // caller timed out
        let mut rx2 = pend(&mut c, Awaiting::ReadyOk);

        // First readyok belongs to the abandoned command and must not
        // resolve the second one.
        feed(&mut c, &["readyok"]);
        assert!(rx2.try_recv().is_err());

        feed(&mut c, &["readyok"]);
        assert!(matches!(rx2.try_recv().unwrap(), Ok(Reply::Ready)));
    }

    #[test]
    fn test_unrelated_lines_dropped_while_awaiting() {
        let mut c = Correlator::default();
        let mut rx = pend(&mut c, Awaiting::ReadyOk);

        feed(&mut c, &["Stockfish 16 by the Stockfish developers", "uciok"]);
        assert!(rx.try_recv().is_err());

        feed(&mut c, &["readyok"]);
        assert!(matches!(rx.try_recv().unwrap(), Ok(Reply::Ready)));
    }
}
