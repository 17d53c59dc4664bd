//! Link transports
//!
//! One [`MountLink`] owns one physical channel. The real variants wrap a
//! TCP socket or a serial port; the simulated variant lives in
//! [`crate::simulator`]. Which variant backs a driver is decided once at
//! construction, never per call.

use crate::error::MountError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;
use tracing::info;

/// Byte-level capability contract for a mount channel.
///
/// Implementations report EOF/closed handles as [`MountError::LinkClosed`]
/// so the command channel never has to interpret a zero-length read.
#[async_trait]
pub trait MountLink: Send {
    /// Write the whole buffer to the device.
    async fn write_all(&mut self, data: &[u8]) -> Result<(), MountError>;

    /// Read whatever is available, at least one byte, into `buf`.
    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, MountError>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// [`MountLink`] over any async byte stream.
#[derive(Debug)]
pub struct StreamLink<S> {
    stream: S,
    label: String,
}

impl<S> StreamLink<S> {
    pub fn new(stream: S, label: impl Into<String>) -> Self {
        Self {
            stream,
            label: label.into(),
        }
    }
}

#[async_trait]
impl<S> MountLink for StreamLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, data: &[u8]) -> Result<(), MountError> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, MountError> {
        let n = self.stream.read(buf).await?;
        if n == 0 {
            return Err(MountError::LinkClosed);
        }
        Ok(n)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// TCP variant (WiFi/Ethernet controllers).
pub type TcpLink = StreamLink<TcpStream>;

/// Serial variant (USB controllers).
pub type SerialLink = StreamLink<tokio_serial::SerialStream>;

/// Open a TCP link to the controller.
pub async fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpLink, MountError> {
    let target = format!("{}:{}", host, port);
    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| MountError::LinkUnavailable {
            target: target.clone(),
            reason: format!("connect timed out after {:?}", timeout),
        })?
        .map_err(|e| MountError::LinkUnavailable {
            target: target.clone(),
            reason: e.to_string(),
        })?;
    let _ = stream.set_nodelay(true);
    info!(%target, "mount link open (network)");
    Ok(StreamLink::new(stream, target))
}

/// Open a serial link to the controller, 8N1, no flow control.
pub fn open_serial(port: &str, baud_rate: u32) -> Result<SerialLink, MountError> {
    let stream = tokio_serial::new(port, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| MountError::LinkUnavailable {
            target: port.to_string(),
            reason: e.to_string(),
        })?;
    info!(port, baud_rate, "mount link open (serial)");
    Ok(StreamLink::new(stream, port.to_string()))
}

fn default_network_port() -> u16 {
    9999
}

fn default_baud_rate() -> u32 {
    9600
}

/// How to reach the controller. Selected once, at driver construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionConfig {
    /// TCP/IP connection (WiFi or Ethernet).
    Network {
        host: String,
        #[serde(default = "default_network_port")]
        port: u16,
    },
    /// USB serial connection.
    Serial {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
}

impl ConnectionConfig {
    /// Open the configured link.
    pub async fn open(&self, connect_timeout: Duration) -> Result<Box<dyn MountLink>, MountError> {
        match self {
            ConnectionConfig::Network { host, port } => {
                Ok(Box::new(connect_tcp(host, *port, connect_timeout).await?))
            }
            ConnectionConfig::Serial { port, baud_rate } => {
                Ok(Box::new(open_serial(port, *baud_rate)?))
            }
        }
    }

    /// Target description for error messages.
    pub fn target(&self) -> String {
        match self {
            ConnectionConfig::Network { host, port } => format!("{}:{}", host, port),
            ConnectionConfig::Serial { port, .. } => port.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg: ConnectionConfig =
            serde_json::from_str(r#"{"type": "network", "host": "192.168.1.100"}"#).unwrap();
        match cfg {
            ConnectionConfig::Network { host, port } => {
                assert_eq!(host, "192.168.1.100");
                assert_eq!(port, 9999);
            }
            _ => panic!("expected network config"),
        }

        let cfg: ConnectionConfig =
            serde_json::from_str(r#"{"type": "serial", "port": "/dev/ttyUSB0"}"#).unwrap();
        match cfg {
            ConnectionConfig::Serial { port, baud_rate } => {
                assert_eq!(port, "/dev/ttyUSB0");
                assert_eq!(baud_rate, 9600);
            }
            _ => panic!("expected serial config"),
        }
    }

    #[tokio::test]
    async fn test_connect_refused_maps_to_link_unavailable() {
        let err = connect_tcp("127.0.0.1", 1, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, MountError::LinkUnavailable { .. }));
    }
}
