//! Interactive client session.
//!
//! One state machine drives the whole process: connect, authenticate, send
//! commands one at a time, run the vehicle follow-up exchange when asked,
//! reconnect with a fixed backoff when the transport dies. The console and
//! the socket are independent event sources multiplexed with `select!`.
//!
//! At most one request is in flight, so the next decoded frame is always the
//! response to the last sent request. After a response timeout the session
//! returns to `Idle` with a locally synthesized error and clears the frame
//! accumulator; bytes that arrive while no request is in flight are
//! discarded, so an abandoned reply can never be correlated with the next
//! request. That is the accepted cost of staying on the same connection.

pub mod console;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout_at};

use crate::protocol::{decode_payload, encode_frame, FrameDecoder, Request, Response};

use console::{prompt, prompt_vehicle, Console, ConsoleEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Idle,
    Sending,
    AwaitingResponse,
    AwaitingVehicleInput,
    Reconnecting,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Per-request response deadline.
    pub response_timeout: Duration,
    /// Fixed backoff between reconnect attempts.
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            response_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// How an exchange with the server ended.
enum Exchange {
    Reply(Response),
    TimedOut,
    Transport,
}

/// Why the per-connection loop returned.
enum SessionEnd {
    Terminated,
    Disconnected,
}

/// What a single interaction step decided.
enum Step {
    Continue,
    Disconnected,
    Terminated,
}

pub struct ClientSession {
    config: ClientConfig,
    state: SessionState,
    credentials: Option<(String, String)>,
    console: Console,
}

impl ClientSession {
    pub fn new(config: ClientConfig, console: Console) -> Self {
        Self {
            config,
            state: SessionState::Connecting,
            credentials: None,
            console,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run until the user exits or stdin closes. Transport failures reconnect
    /// forever at a fixed backoff.
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            self.state = SessionState::Connecting;
            let addr = format!("{}:{}", self.config.host, self.config.port);
            let stream = match TcpStream::connect(&addr).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(%addr, error = %e, "connect failed");
                    println!("[client] cannot reach {}: {}", addr, e);
                    self.state = SessionState::Reconnecting;
                    sleep(self.config.reconnect_delay).await;
                    continue;
                }
            };
            println!("[client] connected to {}", addr);

            match self.drive(stream).await {
                SessionEnd::Terminated => {
                    self.state = SessionState::Terminated;
                    println!("[client] bye");
                    return Ok(());
                }
                SessionEnd::Disconnected => {
                    self.state = SessionState::Reconnecting;
                    tracing::warn!(%addr, "connection lost, retrying");
                    println!(
                        "[client] connection lost, retrying in {}s",
                        self.config.reconnect_delay.as_secs()
                    );
                    sleep(self.config.reconnect_delay).await;
                }
            }
        }
    }

    /// Interaction loop over one live connection.
    async fn drive(&mut self, mut stream: TcpStream) -> SessionEnd {
        let mut decoder = FrameDecoder::new();

        // A reconnected session re-presents its stored credentials before
        // prompting the user again.
        if let Some((login, password)) = self.credentials.clone() {
            self.state = SessionState::Authenticating;
            let request = Request::new("login", None).with_credentials(login, password);
            match self.exchange(&mut stream, &mut decoder, &request).await {
                Exchange::Reply(response) if response.success => {
                    println!("[client] session restored");
                    self.state = SessionState::Idle;
                }
                Exchange::Reply(response) => {
                    println!("server: {}", response.message);
                    self.credentials = None;
                    self.state = SessionState::Authenticating;
                }
                Exchange::TimedOut | Exchange::Transport => return SessionEnd::Disconnected,
            }
        } else {
            self.state = SessionState::Authenticating;
        }

        loop {
            let step = match self.state {
                SessionState::Authenticating => self.authenticate(&mut stream, &mut decoder).await,
                SessionState::Idle => self.command_round(&mut stream, &mut decoder).await,
                SessionState::Terminated => return SessionEnd::Terminated,
                _ => Step::Continue,
            };
            match step {
                Step::Continue => {}
                Step::Disconnected => return SessionEnd::Disconnected,
                Step::Terminated => return SessionEnd::Terminated,
            }
        }
    }

    /// Pre-auth prompt: `login`, `register` or `exit`.
    async fn authenticate(&mut self, stream: &mut TcpStream, decoder: &mut FrameDecoder) -> Step {
        prompt("login, register or exit: ");
        let line = match self.await_line(stream).await {
            Ok(line) => line,
            Err(step) => return step,
        };
        let verb = line.trim().to_ascii_lowercase();
        match verb.as_str() {
            "exit" => Step::Terminated,
            "login" | "register" => {
                let Some(login) = self.read_line("login: ").await else {
                    return Step::Terminated;
                };
                let Some(password) = self.read_line("password: ").await else {
                    return Step::Terminated;
                };
                let request = Request::new(verb.clone(), None)
                    .with_credentials(login.clone(), password.clone());
                match self.exchange(stream, decoder, &request).await {
                    Exchange::Reply(response) => {
                        println!("server: {}", response.message);
                        self.state = if response.success {
                            self.credentials = Some((login, password));
                            SessionState::Idle
                        } else {
                            SessionState::Authenticating
                        };
                        Step::Continue
                    }
                    Exchange::TimedOut => {
                        println!("[client] no response from server, try again");
                        decoder.clear();
                        self.state = SessionState::Authenticating;
                        Step::Continue
                    }
                    Exchange::Transport => Step::Disconnected,
                }
            }
            "" => Step::Continue,
            _ => {
                println!("[client] not logged in; use login, register or exit");
                Step::Continue
            }
        }
    }

    /// One full command round: read a line, send the request, render the
    /// response, run the vehicle follow-up if asked.
    async fn command_round(&mut self, stream: &mut TcpStream, decoder: &mut FrameDecoder) -> Step {
        prompt("> ");
        let line = match self.await_line(stream).await {
            Ok(line) => line,
            Err(step) => return step,
        };
        let Some((command, argument)) = parse_command_line(&line) else {
            return Step::Continue;
        };
        if command == "exit" {
            return Step::Terminated;
        }

        let mut request = Request::new(command, argument);
        if let Some((login, password)) = self.credentials.clone() {
            request = request.with_credentials(login, password);
        }

        loop {
            match self.exchange(stream, decoder, &request).await {
                Exchange::Reply(response) => {
                    render(&response);
                    if !response.requires_vehicle {
                        self.state = SessionState::Idle;
                        return Step::Continue;
                    }
                    // Follow-up: same command and argument, vehicle attached.
                    self.state = SessionState::AwaitingVehicleInput;
                    let Some(vehicle) = prompt_vehicle(&mut self.console).await else {
                        return Step::Terminated;
                    };
                    request.vehicle = Some(vehicle);
                }
                Exchange::TimedOut => {
                    // Synthetic local failure, distinguishable from a server
                    // error by the [client] prefix.
                    println!(
                        "[client] no response within {}s, command may not have run",
                        self.config.response_timeout.as_secs()
                    );
                    decoder.clear();
                    self.state = SessionState::Idle;
                    return Step::Continue;
                }
                Exchange::Transport => return Step::Disconnected,
            }
        }
    }

    /// Wait for a console line while watching the socket; remote close while
    /// idle surfaces immediately instead of on the next send.
    async fn await_line(&mut self, stream: &mut TcpStream) -> Result<String, Step> {
        let mut probe = [0u8; 1024];
        loop {
            tokio::select! {
                event = self.console.next() => match event {
                    ConsoleEvent::Line(line) => return Ok(line),
                    ConsoleEvent::Eof => return Err(Step::Terminated),
                },
                read = stream.read(&mut probe) => match read {
                    Ok(0) | Err(_) => return Err(Step::Disconnected),
                    Ok(n) => {
                        // No request in flight, so anything here is a
                        // leftover from an abandoned exchange. Discard it,
                        // matching the clear on timeout.
                        tracing::debug!(bytes = n, "dropping unsolicited data while idle");
                    }
                },
            }
        }
    }

    async fn read_line(&mut self, label: &str) -> Option<String> {
        prompt(label);
        match self.console.next().await {
            ConsoleEvent::Line(line) => Some(line.trim().to_string()),
            ConsoleEvent::Eof => None,
        }
    }

    /// Send one request and wait for its response under the deadline.
    async fn exchange(
        &mut self,
        stream: &mut TcpStream,
        decoder: &mut FrameDecoder,
        request: &Request,
    ) -> Exchange {
        let frame = match encode_frame(request) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "request not encodable");
                return Exchange::Reply(Response::error(format!(
                    "[client] could not encode request: {}",
                    e
                )));
            }
        };
        self.state = SessionState::Sending;
        if stream.write_all(&frame).await.is_err() {
            return Exchange::Transport;
        }
        self.state = SessionState::AwaitingResponse;

        let mut chunk = [0u8; 8 * 1024];
        let deadline = tokio::time::Instant::now() + self.config.response_timeout;
        loop {
            match decoder.try_decode() {
                Ok(Some(payload)) => {
                    return match decode_payload::<Response>(&payload) {
                        Ok(response) => Exchange::Reply(response),
                        Err(e) => {
                            tracing::error!(error = %e, "undecodable response, dropping connection");
                            Exchange::Transport
                        }
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "framing violation from server");
                    return Exchange::Transport;
                }
            }
            match timeout_at(deadline, stream.read(&mut chunk)).await {
                Err(_) => return Exchange::TimedOut,
                Ok(Ok(0)) | Ok(Err(_)) => return Exchange::Transport,
                Ok(Ok(n)) => decoder.extend(&chunk[..n]),
            }
        }
    }
}

/// Split a console line into command word and optional argument.
/// Returns `None` for blank input.
pub fn parse_command_line(line: &str) -> Option<(String, Option<String>)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.split_once(' ') {
        Some((command, rest)) => {
            let rest = rest.trim();
            let argument = (!rest.is_empty()).then(|| rest.to_string());
            Some((command.to_string(), argument))
        }
        None => Some((trimmed.to_string(), None)),
    }
}

fn render(response: &Response) {
    println!("server: {}", response.message);
    if let Some(data) = &response.data {
        for item in data {
            println!("  {}", item);
        }
    }
    if let Some(fault) = &response.exception {
        println!("server error: {}", fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    fn short_timeout_config(port: u16) -> ClientConfig {
        let mut config = ClientConfig::new("127.0.0.1", port);
        config.response_timeout = Duration::from_millis(200);
        config
    }

    #[test]
    fn parse_splits_command_and_argument() {
        assert_eq!(
            parse_command_line("insert 5"),
            Some(("insert".into(), Some("5".into())))
        );
        assert_eq!(parse_command_line("show"), Some(("show".into(), None)));
        assert_eq!(
            parse_command_line("  remove   7  "),
            Some(("remove".into(), Some("7".into())))
        );
        assert_eq!(parse_command_line("   "), None);
    }

    #[test]
    fn new_session_starts_connecting() {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        let session = ClientSession::new(
            ClientConfig::new("localhost", 9999),
            Console::from_channel(rx),
        );
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn response_timeout_returns_to_idle_with_empty_accumulator() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut sink = [0u8; 1024];
            assert!(sock.read(&mut sink).await.unwrap() > 0);
            // Half a frame, then silence until the client hangs up.
            sock.write_all(&[0, 0, 0, 10, 1, 2]).await.unwrap();
            while sock.read(&mut sink).await.unwrap_or(0) > 0 {}
        });

        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(ConsoleEvent::Line("show".into())).await.unwrap();
        let mut session =
            ClientSession::new(short_timeout_config(addr.port()), Console::from_channel(rx));
        session.state = SessionState::Idle;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut decoder = FrameDecoder::new();

        let step = session.command_round(&mut stream, &mut decoder).await;
        assert!(matches!(step, Step::Continue));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(decoder.pending_bytes(), 0);

        drop(stream);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_close_mid_exchange_reports_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut sink = [0u8; 1024];
            assert!(sock.read(&mut sink).await.unwrap() > 0);
            // Dropping the socket closes it with the request unanswered.
        });

        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(ConsoleEvent::Line("show".into())).await.unwrap();
        let mut session =
            ClientSession::new(short_timeout_config(addr.port()), Console::from_channel(rx));
        session.state = SessionState::Idle;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut decoder = FrameDecoder::new();

        let step = session.command_round(&mut stream, &mut decoder).await;
        assert!(matches!(step, Step::Disconnected));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn stale_bytes_while_idle_do_not_poison_next_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            // A well-framed but undecodable leftover, delivered before the
            // client has anything in flight.
            sock.write_all(&[0, 0, 0, 1, 0xC1]).await.unwrap();
            let mut sink = [0u8; 1024];
            assert!(sock.read(&mut sink).await.unwrap() > 0);
            let reply = encode_frame(&Response::success("pong")).unwrap();
            sock.write_all(&reply).await.unwrap();
            while sock.read(&mut sink).await.unwrap_or(0) > 0 {}
        });

        let (tx, rx) = tokio::sync::mpsc::channel(1);
        tokio::spawn(async move {
            // Hold the console back so the stale frame lands while idle.
            sleep(Duration::from_millis(250)).await;
            tx.send(ConsoleEvent::Line("ping".into())).await.unwrap();
        });
        let mut session =
            ClientSession::new(short_timeout_config(addr.port()), Console::from_channel(rx));
        session.state = SessionState::Idle;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut decoder = FrameDecoder::new();

        let step = session.command_round(&mut stream, &mut decoder).await;
        assert!(matches!(step, Step::Continue));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(decoder.pending_bytes(), 0);

        drop(stream);
        server.await.unwrap();
    }
}
