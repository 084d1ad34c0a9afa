//! Modbus device polling.
//!
//! One poller task walks the configured device/slave/register tree on a
//! fixed interval, reads raw register payloads through the transport,
//! decodes them, applies gain, and writes the results into the sample
//! store. Every failure is local to one device or register: the cycle
//! always completes and the loop always re-arms.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{DeviceConfig, ExporterConfig, PROTOCOL_MODBUS_TCP};
use crate::store::{Sample, SharedStore};
use crate::transport::{RegisterFunction, Transport};

/// Counters for one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Samples written to the store.
    pub samples: usize,
    /// Connect or read failures.
    pub failures: usize,
    /// Registers skipped for configuration reasons (bad offset, unsupported
    /// function code or protocol, non-numeric datatype).
    pub skipped: usize,
}

impl CycleStats {
    fn add(&mut self, other: CycleStats) {
        self.samples += other.samples;
        self.failures += other.failures;
        self.skipped += other.skipped;
    }
}

/// The polling engine.
pub struct Poller {
    devices: Vec<DeviceConfig>,
    interval: Duration,
    transport: Arc<dyn Transport>,
    store: SharedStore,
}

impl Poller {
    /// Create a poller over an already-validated configuration.
    pub fn new(
        config: &ExporterConfig,
        transport: Arc<dyn Transport>,
        store: SharedStore,
    ) -> Self {
        Self {
            devices: config.devices.clone(),
            interval: config.poll_interval(),
            transport,
            store,
        }
    }

    /// Run the polling loop until `shutdown` flips to true.
    ///
    /// The first cycle starts immediately; subsequent cycles fire on the
    /// configured interval, skipping (not bursting) ticks missed by an
    /// overlong cycle. Shutdown is checked before each cycle, so a cycle
    /// in flight finishes but a new one never starts afterwards.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            devices = self.devices.len(),
            interval_secs = self.interval.as_secs(),
            "Starting Modbus poller"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let stats = self.poll_once().await;
                    debug!(
                        samples = stats.samples,
                        failures = stats.failures,
                        skipped = stats.skipped,
                        "Poll cycle complete"
                    );
                }
            }
        }

        info!("Poller stopped");
    }

    /// Run one poll cycle over every configured device.
    pub async fn poll_once(&self) -> CycleStats {
        let mut stats = CycleStats::default();

        for device in &self.devices {
            if device.protocol != PROTOCOL_MODBUS_TCP {
                debug!(
                    device = %device.name,
                    protocol = %device.protocol,
                    "Unsupported protocol, skipping device"
                );
                stats.skipped += 1;
                continue;
            }

            stats.add(self.poll_device(device).await);
        }

        stats
    }

    /// Poll all slaves and registers of one device over a single connection.
    async fn poll_device(&self, device: &DeviceConfig) -> CycleStats {
        let mut stats = CycleStats::default();

        let mut conn = match self
            .transport
            .connect(&device.host, device.port, device.timeout())
            .await
        {
            Ok(conn) => conn,
            Err(e) => {
                warn!(
                    device = %device.name,
                    host = %device.host,
                    port = device.port,
                    error = %e,
                    "Connect failed, skipping device this cycle"
                );
                stats.failures += 1;
                return stats;
            }
        };

        for slave in &device.slaves {
            for register in &slave.registers {
                // Effective address: nominal address minus the slave offset.
                // Underflow is a configuration condition, not a read error.
                let Some(effective) = register.address.checked_sub(slave.offset) else {
                    warn!(
                        device = %device.name,
                        slave = slave.unit_id,
                        register = register.address,
                        offset = slave.offset,
                        "Register address below slave offset, skipping"
                    );
                    stats.skipped += 1;
                    continue;
                };

                let Some(function) = RegisterFunction::from_code(register.function) else {
                    debug!(
                        device = %device.name,
                        slave = slave.unit_id,
                        register = register.address,
                        function = register.function,
                        "Unsupported function code, skipping"
                    );
                    stats.skipped += 1;
                    continue;
                };

                let raw = match conn
                    .read_registers(slave.unit_id, function, effective, register.words)
                    .await
                {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(
                            device = %device.name,
                            slave = slave.unit_id,
                            register = register.address,
                            name = %register.name,
                            error = %e,
                            "Read failed"
                        );
                        stats.failures += 1;
                        continue;
                    }
                };

                let Some(value) = codec::decode(register.datatype, &raw) else {
                    debug!(
                        device = %device.name,
                        slave = slave.unit_id,
                        register = register.address,
                        datatype = ?register.datatype,
                        "Non-numeric datatype, nothing to export"
                    );
                    stats.skipped += 1;
                    continue;
                };

                let value = value * register.gain;

                self.store.insert(Sample {
                    value,
                    timestamp: Utc::now(),
                    device: device.name.clone(),
                    slave_id: slave.unit_id,
                    register: register.address,
                    name: register.name.clone(),
                    unit: register.unit.clone(),
                    ip_address: device.host.clone(),
                });
                stats.samples += 1;
            }
        }

        // Connection drops here; the next cycle reconnects from scratch.
        stats
    }
}
