/*!
 # Byte transport

 The [`Transport`] trait is the only thing a [`crate::Device`] needs to talk
 to the string lights: connect, disconnect and write a frame. [`BleTransport`]
 implements it on top of btleplug, writing every frame to a single GATT
 characteristic.

 Discovery helpers are provided as well, Konstsmide devices advertise
 themselves with the local name `Konstsmide`.
*/

use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::time;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use crate::device::DeviceConfig;
use crate::{Error, Result};

/// Characteristic every frame is written to
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x00001001_0000_1000_8000_00805f9b34fb);

/// Local name advertised by Konstsmide devices, compared case-insensitively
pub const DEVICE_NAME: &str = "konstsmide";

/// Number of attempts for a single write
const MAX_RETRIES: u8 = 3;

/// Delay between two write attempts
const RETRY_DELAY: Duration = Duration::from_millis(300);

/// A point-to-point byte stream to a device
///
/// Implementations only move opaque frames, they never interpret them.
pub trait Transport {
    /// Establishes the connection
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Tears down the connection
    fn disconnect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether frames can currently be sent
    fn is_connected(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Writes a single frame, fire and forget
    fn send(&self, frame: &[u8]) -> impl Future<Output = Result<()>> + Send;
}

/// Whether an advertised local name belongs to a Konstsmide device
pub fn is_konstsmide_name(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(DEVICE_NAME)
}

/// Gets the default Bluetooth adapter
#[instrument(skip(manager))]
async fn get_central(manager: &Manager) -> Result<Adapter> {
    debug!("Getting default Bluetooth adapter");
    let adapters = manager.adapters().await?;
    match adapters.into_iter().next() {
        Some(adapter) => Ok(adapter),
        None => {
            error!("No Bluetooth adapters found");
            Err(Error::NoBluetoothAdapters)
        }
    }
}

async fn local_name(peripheral: &Peripheral) -> Option<String> {
    match peripheral.properties().await {
        Ok(Some(props)) => props.local_name,
        _ => None,
    }
}

fn matches_address(peripheral: &Peripheral, address: &str) -> bool {
    peripheral.address().to_string().eq_ignore_ascii_case(address)
        || peripheral.id().to_string().eq_ignore_ascii_case(address)
}

/// Scans for Konstsmide devices
///
/// Returns the addresses of all devices seen within `timeout`.
#[instrument]
pub async fn find_devices(timeout: Duration) -> Result<Vec<String>> {
    let manager = Manager::new().await?;
    let central = get_central(&manager).await?;

    info!("Scanning for Konstsmide devices...");
    central.start_scan(ScanFilter::default()).await?;
    time::sleep(timeout).await;

    let peripherals = central.peripherals().await?;
    debug!("Found {} BLE peripherals", peripherals.len());

    let mut addresses = Vec::new();
    for p in peripherals {
        if let Some(name) = local_name(&p).await {
            debug!("Found device: {} {}", p.address(), name);
            if is_konstsmide_name(&name) {
                addresses.push(p.address().to_string());
            }
        }
    }
    central.stop_scan().await?;

    info!("Found {} Konstsmide device(s)", addresses.len());
    Ok(addresses)
}

/// Checks if `address` belongs to a reachable Konstsmide device
#[instrument]
pub async fn check_address(address: &str, timeout: Duration) -> Result<bool> {
    let manager = Manager::new().await?;
    let central = get_central(&manager).await?;
    Ok(find_peripheral(&central, address, timeout).await?.is_some())
}

/// Scans until a Konstsmide device with the given address or id shows up
async fn find_peripheral(
    central: &Adapter,
    address: &str,
    timeout: Duration,
) -> Result<Option<Peripheral>> {
    let mut events = central.events().await?;
    central.start_scan(ScanFilter::default()).await?;

    let found = match time::timeout(timeout, wait_for_peripheral(central, &mut events, address))
        .await
    {
        Ok(found) => found?,
        Err(_) => {
            debug!("No matching device within {:?}", timeout);
            None
        }
    };
    central.stop_scan().await?;
    Ok(found)
}

async fn wait_for_peripheral<S>(
    central: &Adapter,
    events: &mut S,
    address: &str,
) -> Result<Option<Peripheral>>
where
    S: Stream<Item = CentralEvent> + Unpin,
{
    // Devices the adapter already knows don't always emit a new event
    for p in central.peripherals().await? {
        if matches_address(&p, address) {
            if let Some(name) = local_name(&p).await.filter(|n| is_konstsmide_name(n)) {
                debug!("Found known device: {}", name);
                return Ok(Some(p));
            }
        }
    }

    while let Some(event) = events.next().await {
        let id = match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
            _ => continue,
        };
        let p = central.peripheral(&id).await?;
        if !matches_address(&p, address) {
            continue;
        }
        match local_name(&p).await {
            Some(name) if is_konstsmide_name(&name) => {
                debug!("Found device: {}", name);
                return Ok(Some(p));
            }
            Some(name) => warn!("Device {} is not a Konstsmide device: {}", address, name),
            None => trace!("Device {} has no name yet", address),
        }
    }
    Ok(None)
}

/// Command queue to manage Bluetooth writes with rate limiting
struct CommandQueue {
    /// Semaphore to limit write concurrency
    semaphore: Semaphore,
    /// Minimum delay between writes
    min_delay: Duration,
    /// Last write timestamp
    last_command: Mutex<Instant>,
}

impl CommandQueue {
    fn new(min_delay: Duration) -> Self {
        Self {
            semaphore: Semaphore::new(1),
            min_delay,
            last_command: Mutex::new(
                Instant::now()
                    .checked_sub(min_delay)
                    .unwrap_or_else(Instant::now),
            ),
        }
    }

    async fn execute<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| Error::BleError(e.to_string()))?;

        let mut last_cmd = self.last_command.lock().await;
        let elapsed = last_cmd.elapsed();
        if elapsed < self.min_delay {
            let wait_time = self.min_delay - elapsed;
            trace!("Rate limiting: waiting {:?} before next write", wait_time);
            time::sleep(wait_time).await;
        }

        let result = future.await;
        *last_cmd = Instant::now();
        result
    }
}

/// Bluetooth LE transport to a Konstsmide device
pub struct BleTransport {
    /// Connected peripheral
    peripheral: Peripheral,
    /// Characteristic frames are written to
    characteristic_uuid: Uuid,
    /// Resolved after connecting
    write_characteristic: Option<Characteristic>,
    /// Command queue for rate limiting
    command_queue: Arc<CommandQueue>,
    /// Upper bound for connecting
    timeout: Duration,
}

impl BleTransport {
    /// Scans for the device at `config.address`
    ///
    /// Fails with [`Error::DeviceNotFound`] if no Konstsmide device with that
    /// address shows up within `config.timeout`. Does not connect yet.
    #[instrument(skip(config), fields(address = %config.address))]
    pub async fn new(config: &DeviceConfig) -> Result<Self> {
        info!("Initializing BLE transport");
        let manager = Manager::new().await?;
        let central = get_central(&manager).await?;

        info!("Scanning for device...");
        let peripheral = find_peripheral(&central, &config.address, config.timeout)
            .await?
            .ok_or_else(|| {
                error!(
                    "No Konstsmide device found within {} seconds",
                    config.timeout.as_secs()
                );
                Error::DeviceNotFound(config.address.clone())
            })?;

        Ok(Self {
            peripheral,
            characteristic_uuid: config.characteristic_uuid,
            write_characteristic: None,
            command_queue: Arc::new(CommandQueue::new(config.command_delay)),
            timeout: config.timeout,
        })
    }

    async fn connect_peripheral(&mut self) -> Result<()> {
        if !self.peripheral.is_connected().await? {
            info!("Connecting to device...");
            self.peripheral.connect().await?;
        }

        debug!("Discovering services...");
        self.peripheral.discover_services().await?;

        let characteristic = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == self.characteristic_uuid)
            .ok_or_else(|| Error::CharacteristicNotFound(self.characteristic_uuid.to_string()))?;
        debug!("Found write characteristic: {}", characteristic.uuid);

        self.write_characteristic = Some(characteristic);
        Ok(())
    }
}

impl Transport for BleTransport {
    #[instrument(skip(self))]
    async fn connect(&mut self) -> Result<()> {
        let timeout = self.timeout;
        time::timeout(timeout, self.connect_peripheral())
            .await
            .map_err(|_| Error::Timeout)??;
        info!("BLE connection established");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn disconnect(&mut self) -> Result<()> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
            info!("BLE connection closed");
        }
        self.write_characteristic = None;
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.write_characteristic.is_some() && self.peripheral.is_connected().await?)
    }

    #[instrument(skip(self, frame), fields(frame_len = frame.len()))]
    async fn send(&self, frame: &[u8]) -> Result<()> {
        let characteristic = self.write_characteristic.clone().ok_or(Error::NotConnected)?;
        let peripheral = self.peripheral.clone();

        // Prefer WriteWithResponse when supported
        let write_type = if characteristic.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        self.command_queue
            .execute(async move {
                let mut attempt = 0;
                loop {
                    trace!("Sending frame (attempt {}/{})", attempt + 1, MAX_RETRIES);
                    match peripheral.write(&characteristic, frame, write_type).await {
                        Ok(()) => {
                            trace!("Frame sent successfully");
                            return Ok(());
                        }
                        Err(e) => {
                            attempt += 1;
                            warn!("Write failed (attempt {}/{}): {}", attempt, MAX_RETRIES, e);
                            if attempt >= MAX_RETRIES {
                                error!("Write failed permanently: {}", e);
                                return Err(Error::CommandTimeout(MAX_RETRIES));
                            }
                            time::sleep(RETRY_DELAY).await;
                        }
                    }
                }
            })
            .await
    }
}
