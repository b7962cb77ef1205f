//! Subprocess plugin lifecycle.
//!
//! The server starts the plugin binary, proves mutual intent through a
//! magic cookie placed in the child environment, reads a single
//! handshake line from the child's stdout naming the gRPC endpoint the
//! plugin listens on, and then treats the child's remaining output as
//! log lines. The handshake format and cookie are a fixed wire contract
//! shared with the existing plugin ecosystem; changing any of it breaks
//! every deployed plugin.

use crate::error::PluginError;
use crate::v1::AuthorizationServiceClient;
use hyper_util::rt::TokioIo;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::Level;

/// Environment variable the child checks to know it was started by a
/// real host rather than by hand.
pub const MAGIC_COOKIE_KEY: &str = "FileButlerPluginKey";
/// The expected cookie value.
pub const MAGIC_COOKIE_VALUE: &str = "ILovePenguins";
/// Version of the handshake protocol itself.
pub const CORE_PROTOCOL_VERSION: u32 = 1;
/// Version of the authorization app protocol spoken over the channel.
pub const APP_PROTOCOL_VERSION: u32 = 1;

/// How long the child gets to print its handshake line.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// The transport the child listens on.
#[derive(Clone, Debug, PartialEq, Eq)]
enum HandshakeNetwork {
    Tcp,
    Unix,
}

/// Parsed handshake line:
/// `core-version|app-version|network|address|protocol`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Handshake {
    network: HandshakeNetwork,
    addr: String,
}

fn parse_handshake(line: &str) -> Result<Handshake, PluginError> {
    let fields: Vec<&str> = line.trim().split('|').collect();
    if fields.len() < 5 {
        return Err(PluginError::Handshake(format!(
            "malformed handshake line: {line:?}"
        )));
    }

    let core: u32 = fields[0]
        .parse()
        .map_err(|_| PluginError::Handshake(format!("bad core protocol version: {}", fields[0])))?;
    if core != CORE_PROTOCOL_VERSION {
        return Err(PluginError::Handshake(format!(
            "unsupported core protocol version: {core}"
        )));
    }

    let app: u32 = fields[1]
        .parse()
        .map_err(|_| PluginError::Handshake(format!("bad app protocol version: {}", fields[1])))?;
    if app != APP_PROTOCOL_VERSION {
        return Err(PluginError::Handshake(format!(
            "unsupported app protocol version: {app}"
        )));
    }

    let network = match fields[2] {
        "tcp" => HandshakeNetwork::Tcp,
        "unix" => HandshakeNetwork::Unix,
        other => {
            return Err(PluginError::Handshake(format!(
                "unsupported network type: {other}"
            )));
        }
    };

    if fields[4] != "grpc" {
        return Err(PluginError::Handshake(format!(
            "unsupported protocol: {}",
            fields[4]
        )));
    }

    Ok(Handshake {
        network,
        addr: fields[3].to_string(),
    })
}

async fn connect(handshake: &Handshake) -> Result<Channel, PluginError> {
    match handshake.network {
        HandshakeNetwork::Tcp => {
            let endpoint = Channel::from_shared(format!("http://{}", handshake.addr))
                .map_err(|err| PluginError::Handshake(format!("bad plugin address: {err}")))?;
            Ok(endpoint.connect().await?)
        }
        HandshakeNetwork::Unix => {
            let path = handshake.addr.clone();
            // The URI is ignored; the connector dials the socket path.
            let channel = Endpoint::from_static("http://127.0.0.1:0")
                .connect_with_connector(service_fn(move |_: Uri| {
                    let path = path.clone();
                    async move {
                        Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?))
                    }
                }))
                .await?;
            Ok(channel)
        }
    }
}

/// Forward the child's output to the server log, one event per line,
/// tagged with the plugin name.
fn forward_output<R>(mut lines: Lines<BufReader<R>>, plugin: String, level: Level)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => log_line(&plugin, level, &line),
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(plugin = %plugin, error = %err, "error reading plugin output");
                    break;
                }
            }
        }
    });
}

fn log_line(plugin: &str, level: Level, line: &str) {
    if level == Level::ERROR {
        tracing::error!(plugin = %plugin, "{line}");
    } else if level == Level::WARN {
        tracing::warn!(plugin = %plugin, "{line}");
    } else if level == Level::DEBUG {
        tracing::debug!(plugin = %plugin, "{line}");
    } else if level == Level::TRACE {
        tracing::trace!(plugin = %plugin, "{line}");
    } else {
        tracing::info!(plugin = %plugin, "{line}");
    }
}

/// A plugin running as a child process owned by the server.
#[derive(Debug)]
pub struct SubprocessPlugin {
    name: String,
    client: AuthorizationServiceClient,
    child: tokio::sync::Mutex<Child>,
}

impl SubprocessPlugin {
    /// Spawn `cmd` (plus `args`), complete the handshake and connect.
    pub async fn start(
        name: impl Into<String>,
        cmd: &[String],
        args: &[String],
        log_level: Level,
    ) -> Result<Self, PluginError> {
        let name = name.into();
        let program = cmd
            .first()
            .ok_or_else(|| PluginError::Config("cmd must not be empty".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(&cmd[1..])
            .args(args)
            .env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
            .env("PLUGIN_PROTOCOL_VERSIONS", CORE_PROTOCOL_VERSION.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let mut stdout_lines = BufReader::new(stdout).lines();
        let line = tokio::time::timeout(HANDSHAKE_TIMEOUT, stdout_lines.next_line())
            .await
            .map_err(|_| {
                PluginError::Handshake("timed out waiting for handshake".to_string())
            })?
            .map_err(PluginError::Io)?
            .ok_or_else(|| {
                PluginError::Handshake("plugin exited before handshake".to_string())
            })?;

        let handshake = parse_handshake(&line)?;
        let channel = connect(&handshake).await?;

        tracing::info!(plugin = %name, addr = %handshake.addr, "plugin started");

        forward_output(stdout_lines, name.clone(), log_level);
        forward_output(BufReader::new(stderr).lines(), name.clone(), Level::WARN);

        Ok(Self {
            name,
            client: AuthorizationServiceClient::new(channel),
            child: tokio::sync::Mutex::new(child),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> AuthorizationServiceClient {
        self.client.clone()
    }

    /// Kill the child process.
    pub async fn stop(&self) -> Result<(), PluginError> {
        let mut child = self.child.lock().await;
        match child.kill().await {
            Ok(()) => Ok(()),
            // Already exited on its own.
            Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_handshake_accepts_tcp() {
        let handshake = parse_handshake("1|1|tcp|127.0.0.1:4000|grpc").unwrap();
        assert_eq!(handshake.network, HandshakeNetwork::Tcp);
        assert_eq!(handshake.addr, "127.0.0.1:4000");
    }

    #[test]
    fn parse_handshake_accepts_unix_with_extra_fields() {
        let handshake = parse_handshake("1|1|unix|/tmp/plug.sock|grpc|extra\n").unwrap();
        assert_eq!(handshake.network, HandshakeNetwork::Unix);
        assert_eq!(handshake.addr, "/tmp/plug.sock");
    }

    #[test]
    fn parse_handshake_rejects_garbage() {
        for line in [
            "",
            "hello world",
            "2|1|tcp|addr|grpc",
            "1|9|tcp|addr|grpc",
            "1|1|carrier-pigeon|addr|grpc",
            "1|1|tcp|addr|netrpc",
        ] {
            assert!(parse_handshake(line).is_err(), "accepted {line:?}");
        }
    }

    #[tokio::test]
    async fn start_fails_when_child_exits_silently() {
        let err = SubprocessPlugin::start(
            "quitter",
            &["/bin/sh".to_string(), "-c".to_string(), "exit 0".to_string()],
            &[],
            Level::INFO,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PluginError::Handshake(_)));
    }

    #[tokio::test]
    async fn start_fails_for_missing_binary() {
        let err = SubprocessPlugin::start(
            "ghost",
            &["/nonexistent/porter-plugin".to_string()],
            &[],
            Level::INFO,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PluginError::Io(_)));
    }
}
