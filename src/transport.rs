//! Modbus transport abstraction.
//!
//! The poller talks to devices through the [`Transport`] and [`Connection`]
//! traits so the polling engine can be exercised against a mock in tests.
//! [`TcpTransport`] is the production implementation on top of tokio-modbus.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_modbus::client::{Context, Reader};
use tokio_modbus::prelude::*;
use tracing::debug;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Read failed: {0}")]
    Read(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Read operation selector: Modbus function code 3 or 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterFunction {
    /// Function code 3: read holding registers.
    Holding,
    /// Function code 4: read input registers.
    Input,
}

impl RegisterFunction {
    /// Map a configured function code to a read operation. Codes other than
    /// 3 and 4 are unsupported and yield `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            3 => Some(Self::Holding),
            4 => Some(Self::Input),
            _ => None,
        }
    }
}

/// Capability to open connections to Modbus devices.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `host:port`, bounded by `timeout`.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// An open connection to one device. Dropping the connection releases it.
#[async_trait]
pub trait Connection: Send {
    /// Read `words` 16-bit registers at `address` from slave `unit_id`,
    /// returning the raw payload bytes in wire order (big-endian per word).
    async fn read_registers(
        &mut self,
        unit_id: u8,
        function: RegisterFunction,
        address: u16,
        words: u16,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Modbus TCP transport backed by tokio-modbus.
#[derive(Debug, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let target = format!("{}:{}", host, port);

        let addr = tokio::net::lookup_host(&target)
            .await
            .map_err(|e| TransportError::Connect(format!("resolve {}: {}", target, e)))?
            .next()
            .ok_or_else(|| {
                TransportError::Connect(format!("no addresses for {}", target))
            })?;

        let ctx = tokio::time::timeout(timeout, tcp::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        debug!(%target, "Modbus TCP connected");

        Ok(Box::new(TcpConnection { ctx, timeout }))
    }
}

struct TcpConnection {
    ctx: Context,
    timeout: Duration,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn read_registers(
        &mut self,
        unit_id: u8,
        function: RegisterFunction,
        address: u16,
        words: u16,
    ) -> Result<Vec<u8>, TransportError> {
        self.ctx.set_slave(Slave(unit_id));

        let result = match function {
            RegisterFunction::Holding => {
                tokio::time::timeout(
                    self.timeout,
                    self.ctx.read_holding_registers(address, words),
                )
                .await
            }
            RegisterFunction::Input => {
                tokio::time::timeout(
                    self.timeout,
                    self.ctx.read_input_registers(address, words),
                )
                .await
            }
        };

        let registers = result
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(|e| TransportError::Read(e.to_string()))?
            .map_err(|e| TransportError::Read(format!("Exception: {:?}", e)))?;

        Ok(words_to_bytes(&registers))
    }
}

/// Flatten register words into bytes, big-endian within each word, matching
/// the Modbus wire layout.
fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(words.len() * 2);
    for word in words {
        raw.extend_from_slice(&word.to_be_bytes());
    }
    raw
}
