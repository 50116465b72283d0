//! Twitch IRC session: login, keepalive and dispatch of chat messages.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, error, info, warn};

use crate::common::error::{ChatError, ChatResult};
use crate::config::types::Config;
use crate::protocol::irc::{new_irc_connection, IrcConnection, IrcMessage};
use crate::relay::RelayOrchestrator;
use crate::twitch::auth::bare_token;
use crate::twitch::handler::{event_from_privmsg, TwitchReplier};

/// NOTICE texts Twitch sends when PASS is rejected.
const LOGIN_FAILURE_NOTICES: &[&str] = &["Login authentication failed", "Improperly formatted auth"];

/// Why a session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested; the channel has been left.
    Shutdown,
    /// The server asked us to reconnect.
    Reconnect,
    /// The server closed the connection.
    Closed,
}

pub struct TwitchClient {
    host: String,
    port: u16,
    tls: bool,
    /// Built on first connect and reused across reconnects.
    connector: Option<TlsConnector>,
    token: String,
    login: String,
    channel: String,
    orchestrator: Arc<RelayOrchestrator>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TwitchClient {
    pub fn new(
        config: &Config,
        login: impl Into<String>,
        orchestrator: Arc<RelayOrchestrator>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            host: config.twitch.host.clone(),
            port: config.twitch.port,
            tls: config.twitch.tls,
            connector: None,
            token: config.twitch.oauth_token.clone(),
            login: login.into().to_lowercase(),
            channel: config.irc_channel(),
            orchestrator,
            shutdown_rx,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Wait until shutdown is requested.
    pub async fn wait_for_shutdown(&mut self) {
        while !*self.shutdown_rx.borrow_and_update() {
            if self.shutdown_rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Connect to the chat server and run one session.
    pub async fn run(&mut self) -> ChatResult<SessionEnd> {
        info!("Connecting to Twitch chat at {}:{}", self.host, self.port);
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| ChatError::ConnectFailed {
                host: self.host.clone(),
                port: self.port,
                source: e,
            })?;
        stream.set_nodelay(true)?;

        if !self.tls {
            warn!("TLS is disabled; the OAuth token is sent in clear text");
            return self.run_session(stream).await;
        }

        let connector = match &self.connector {
            Some(connector) => connector.clone(),
            None => {
                let connector = build_tls_connector()?;
                self.connector = Some(connector.clone());
                connector
            }
        };
        let server_name = ServerName::try_from(self.host.clone()).map_err(|e| ChatError::Tls {
            message: format!("invalid server name '{}': {}", self.host, e),
        })?;

        let stream = connector.connect(server_name, stream).await?;
        debug!("TLS handshake with {} complete", self.host);
        self.run_session(stream).await
    }

    /// Log in, join the channel and relay messages until the session ends.
    pub async fn run_session<S>(&mut self, stream: S) -> ChatResult<SessionEnd>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut connection = new_irc_connection(stream);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

        connection
            .send(format!("PASS oauth:{}", bare_token(&self.token)))
            .await?;
        connection.send(format!("NICK {}", self.login)).await?;
        connection
            .send("CAP REQ :twitch.tv/tags twitch.tv/commands".to_string())
            .await?;
        connection.send(format!("JOIN {}", self.channel)).await?;

        loop {
            tokio::select! {
                line = connection.next() => {
                    let line = match line {
                        Some(Ok(line)) => line,
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            info!("Twitch closed the connection");
                            return Ok(SessionEnd::Closed);
                        }
                    };
                    if let Some(end) = self.handle_line(&mut connection, &out_tx, &line).await? {
                        return Ok(end);
                    }
                }

                Some(outgoing) = out_rx.recv() => {
                    if let Err(e) = connection.send(outgoing).await {
                        error!("Failed to send chat message: {}", e);
                        return Err(e.into());
                    }
                }

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Leaving {}", self.channel);
                        connection.send(format!("PART {}", self.channel)).await?;
                        return Ok(SessionEnd::Shutdown);
                    }
                }
            }
        }
    }

    async fn handle_line<S>(
        &self,
        connection: &mut IrcConnection<S>,
        out_tx: &mpsc::UnboundedSender<String>,
        line: &str,
    ) -> ChatResult<Option<SessionEnd>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let Some(msg) = IrcMessage::parse(line) else {
            debug!("Ignoring unparseable line: {}", line);
            return Ok(None);
        };

        match msg.command.as_str() {
            "PING" => {
                let token = msg.trailing.as_deref().unwrap_or("tmi.twitch.tv");
                connection.send(format!("PONG :{}", token)).await?;
            }
            "RECONNECT" => {
                info!("Twitch requested a reconnect");
                return Ok(Some(SessionEnd::Reconnect));
            }
            "NOTICE" => {
                let text = msg.trailing.as_deref().unwrap_or_default();
                if LOGIN_FAILURE_NOTICES.iter().any(|n| text.contains(n)) {
                    return Err(ChatError::AuthFailed {
                        reason: text.to_string(),
                    });
                }
                info!("Twitch notice: {}", text);
            }
            "001" => info!("Logged in to Twitch chat as {}", self.login),
            "JOIN" if msg.nick() == Some(self.login.as_str()) => {
                info!("Joined {}", self.channel);
            }
            "PRIVMSG" => self.dispatch_privmsg(&msg, out_tx),
            _ => {}
        }
        Ok(None)
    }

    /// Hand a chat message to the relay on its own task.
    fn dispatch_privmsg(&self, msg: &IrcMessage, out_tx: &mpsc::UnboundedSender<String>) {
        if msg.channel() != Some(self.channel.as_str()) {
            debug!("Ignoring message for {:?}", msg.channel());
            return;
        }
        let Some(event) = event_from_privmsg(msg) else {
            warn!("Dropping PRIVMSG without a speaker");
            return;
        };

        let replier = TwitchReplier::new(
            out_tx.clone(),
            self.channel.clone(),
            msg.tag("id").map(str::to_string),
        );
        let orchestrator = Arc::clone(&self.orchestrator);

        tokio::spawn(async move {
            let outcome = orchestrator.handle_chat_event(&event, &replier).await;
            debug!(user = %event.speaker_id, "Chat event handled: {:?}", outcome);
        });
    }
}

/// TLS connector trusting the system root certificates.
fn build_tls_connector() -> ChatResult<TlsConnector> {
    let mut root_store = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        warn!("Failed to load a system certificate: {}", e);
    }
    let (added, ignored) = root_store.add_parsable_certificates(native.certs);
    debug!("Loaded {} system root certificates ({} ignored)", added, ignored);
    if root_store.is_empty() {
        warn!("No system root certificates found; the TLS handshake will fail");
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ChatError::Tls {
            message: e.to_string(),
        })?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
    use tokio_test::{assert_err, assert_ok};

    use crate::common::error::BackendResult;
    use crate::config::types::test_config;
    use crate::relay::gateway::BackendGateway;

    struct ChannelGateway(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl BackendGateway for ChannelGateway {
        async fn execute(&self, command: &str) -> BackendResult<String> {
            let _ = self.0.send(command.to_string());
            Ok(String::new())
        }
    }

    struct FakeServer {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeServer {
        async fn expect(&mut self, expected: &str) {
            let line = self.lines.next_line().await.unwrap().unwrap();
            assert_eq!(line.trim_end_matches('\r'), expected);
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(format!("{}\r\n", line).as_bytes()).await.unwrap();
        }

        async fn expect_login(&mut self) {
            self.expect("PASS oauth:abcdef123456").await;
            self.expect("NICK relaybot").await;
            self.expect("CAP REQ :twitch.tv/tags twitch.tv/commands").await;
            self.expect("JOIN #streamer").await;
        }
    }

    fn setup() -> (
        TwitchClient,
        FakeServer,
        DuplexStream,
        watch::Sender<bool>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let config = test_config();
        let (backend_tx, backend_rx) = mpsc::unbounded_channel();
        let orchestrator = Arc::new(RelayOrchestrator::new(
            &config,
            Arc::new(ChannelGateway(backend_tx)),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let client = TwitchClient::new(&config, "RelayBot", orchestrator, shutdown_rx);

        let (client_stream, server_stream) = tokio::io::duplex(8192);
        let (read, writer) = tokio::io::split(server_stream);
        let server = FakeServer {
            lines: BufReader::new(read).lines(),
            writer,
        };
        (client, server, client_stream, shutdown_tx, backend_rx)
    }

    #[tokio::test]
    async fn test_session_relays_and_reconnects() {
        let (mut client, mut server, stream, _shutdown_tx, mut backend_rx) = setup();
        let session = tokio::spawn(async move { client.run_session(stream).await });

        server.expect_login().await;
        server.send(":tmi.twitch.tv 001 relaybot :Welcome, GLHF!").await;

        server.send("PING :tmi.twitch.tv").await;
        server.expect("PONG :tmi.twitch.tv").await;

        server
            .send("@display-name=Viewer;id=m-1;user-id=42 :viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #streamer :!egg")
            .await;
        server
            .expect("@reply-parent-msg-id=m-1 PRIVMSG #streamer :EGGG!!!!")
            .await;

        server
            .send("@display-name=Viewer;id=m-2;user-id=42 :viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #streamer :hi everyone")
            .await;
        assert_eq!(
            backend_rx.recv().await.unwrap(),
            "/silent-command game.print(\"[color=purple]Viewer[/color]: hi everyone\")"
        );

        server.send(":tmi.twitch.tv RECONNECT").await;
        let end = assert_ok!(session.await.unwrap());
        assert_eq!(end, SessionEnd::Reconnect);
    }

    #[tokio::test]
    async fn test_login_failure() {
        let (mut client, mut server, stream, _shutdown_tx, _backend_rx) = setup();
        let session = tokio::spawn(async move { client.run_session(stream).await });

        server.expect_login().await;
        server.send(":tmi.twitch.tv NOTICE * :Login authentication failed").await;

        let err = assert_err!(session.await.unwrap());
        assert!(matches!(err, ChatError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_parts_channel() {
        let (mut client, mut server, stream, shutdown_tx, _backend_rx) = setup();
        let session = tokio::spawn(async move { client.run_session(stream).await });

        server.expect_login().await;
        shutdown_tx.send(true).unwrap();
        server.expect("PART #streamer").await;

        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Shutdown);
    }

    #[tokio::test]
    async fn test_server_hangup_ends_session() {
        let (mut client, mut server, stream, _shutdown_tx, _backend_rx) = setup();
        let session = tokio::spawn(async move { client.run_session(stream).await });

        server.expect_login().await;
        drop(server);

        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Closed);
    }

    /// Accept one connection and return the first bytes the client writes.
    async fn first_bytes_on_wire(config: &Config) -> (ChatResult<SessionEnd>, Vec<u8>) {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = config.clone();
        config.twitch.host = "localhost".to_string();
        config.twitch.port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16];
            let n = stream.read(&mut buf).await.unwrap();
            buf.truncate(n);
            buf
        });

        let (backend_tx, _backend_rx) = mpsc::unbounded_channel();
        let orchestrator = Arc::new(RelayOrchestrator::new(
            &config,
            Arc::new(ChannelGateway(backend_tx)),
        ));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut client = TwitchClient::new(&config, "relaybot", orchestrator, shutdown_rx);

        let result = client.run().await;
        (result, server.await.unwrap())
    }

    #[tokio::test]
    async fn test_token_never_sent_in_clear_text() {
        let config = test_config();
        assert!(config.twitch.tls);
        assert_eq!(config.twitch.port, 6697);

        let (result, wire) = first_bytes_on_wire(&config).await;

        // TLS handshake record, not an IRC line
        assert_eq!(wire.first(), Some(&0x16));
        assert!(!String::from_utf8_lossy(&wire).contains("PASS"));
        // The server hung up mid-handshake
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_plain_tcp_when_tls_disabled() {
        let mut config = test_config();
        config.twitch.tls = false;

        let (_result, wire) = first_bytes_on_wire(&config).await;
        assert!(wire.starts_with(b"PASS oauth:"));
    }

    #[tokio::test]
    async fn test_other_channels_ignored() {
        let (mut client, mut server, stream, _shutdown_tx, mut backend_rx) = setup();
        let session = tokio::spawn(async move { client.run_session(stream).await });

        server.expect_login().await;
        server.send(":v!v@v PRIVMSG #elsewhere :hello").await;
        server.send(":tmi.twitch.tv RECONNECT").await;

        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Reconnect);
        assert!(backend_rx.try_recv().is_err());
    }
}
