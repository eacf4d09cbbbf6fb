use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::codec;
use crate::function::Function;
use crate::message::{self, Timer, TIMER_SLOTS};
use crate::transport::{BleTransport, Transport, CHARACTERISTIC_UUID};
use crate::{Error, Result};

/// Password of a factory-new device
pub const DEFAULT_PASSWORD: &str = "123456";

/// Status the device is set to, the device can't report it back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Whether the lights are on
    pub on: bool,
    /// Current light function
    pub function: Function,
    /// Current brightness (0-100)
    pub brightness: u8,
    /// Current flash speed (0-100)
    pub flash_speed: u8,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            on: true,
            function: Function::Steady,
            brightness: 100,
            flash_speed: 50,
        }
    }
}

/// Connection settings for a device
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Bluetooth address or platform id of the device
    pub address: String,
    /// Six digit device password
    pub password: String,
    /// UUID of the characteristic frames are written to
    pub characteristic_uuid: Uuid,
    /// Minimum delay between two writes
    pub command_delay: Duration,
    /// Upper bound for scanning and connecting
    pub timeout: Duration,
    /// Reconnect automatically when a command is sent after the connection dropped
    pub auto_reconnect: bool,
    /// Status applied on every (re)connect
    pub initial_status: Status,
}

impl DeviceConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            password: DEFAULT_PASSWORD.to_owned(),
            characteristic_uuid: CHARACTERISTIC_UUID,
            command_delay: Duration::from_millis(15),
            timeout: Duration::from_secs(5),
            auto_reconnect: true,
            initial_status: Status::default(),
        }
    }
}

/// Connection lifecycle of a [`Device`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Password sent
    Authenticating,
    /// Status and clock being pushed to the device
    Syncing,
    Ready,
}

/// A Konstsmide device reached through a [`Transport`]
///
/// The device can't be queried, so the last commanded [`Status`] is kept
/// here and pushed to the device on every connect.
pub struct Device<T> {
    transport: T,
    config: DeviceConfig,
    status: Status,
    state: SessionState,
    /// Cleared by [`Device::disconnect`]
    reconnect: bool,
}

impl<T: Transport> Device<T> {
    /// Creates a disconnected device, call [`Device::connect`] before sending commands
    pub fn new(transport: T, config: DeviceConfig) -> Self {
        Self {
            transport,
            status: config.initial_status,
            config,
            state: SessionState::Disconnected,
            reconnect: false,
        }
    }

    /// Creates a device on top of `transport` and connects it
    pub async fn connect_with(transport: T, config: DeviceConfig) -> Result<Self> {
        let mut device = Self::new(transport, config);
        device.connect().await?;
        Ok(device)
    }

    /// Connects, authenticates and synchronizes status and clock
    ///
    /// Does nothing if the device is already connected. Make sure to call
    /// [`Device::disconnect`] when done, otherwise the device may not accept
    /// new connections until it is power cycled.
    #[instrument(skip(self), fields(address = %self.config.address))]
    pub async fn connect(&mut self) -> Result<()> {
        self.reconnect = self.config.auto_reconnect;
        if self.state == SessionState::Ready && self.transport.is_connected().await? {
            debug!("Already connected");
            return Ok(());
        }

        let result = self.bootstrap().await;
        if let Err(e) = &result {
            error!("Failed to connect to device: {}", e);
            self.state = SessionState::Disconnected;
        }
        result
    }

    async fn bootstrap(&mut self) -> Result<()> {
        self.state = SessionState::Connecting;
        if !self.transport.is_connected().await? {
            self.transport.connect().await?;
        }

        self.state = SessionState::Authenticating;
        debug!("Device connected, sending password");
        let password = message::password_input(&self.config.password)?;
        self.write(&password).await?;

        self.state = SessionState::Syncing;
        debug!("Synchronizing status");
        self.write_status().await?;
        debug!("Synchronizing time");
        self.write_time().await?;

        self.state = SessionState::Ready;
        info!("Device ready");
        Ok(())
    }

    /// Disconnects from the device and disables automatic reconnects
    #[instrument(skip(self), fields(address = %self.config.address))]
    pub async fn disconnect(&mut self) -> Result<()> {
        self.reconnect = false;
        if self.transport.is_connected().await? {
            self.transport.disconnect().await?;
        }
        self.state = SessionState::Disconnected;
        info!("Device disconnected");
        Ok(())
    }

    /// Current connection state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last commanded status
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_on(&self) -> bool {
        self.status.on
    }

    pub fn function(&self) -> Function {
        self.status.function
    }

    pub fn brightness(&self) -> u8 {
        self.status.brightness
    }

    pub fn flash_speed(&self) -> u8 {
        self.status.flash_speed
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Turns the lights on
    #[instrument(skip(self))]
    pub async fn on(&mut self) -> Result<()> {
        self.set_power(true).await
    }

    /// Turns the lights off
    #[instrument(skip(self))]
    pub async fn off(&mut self) -> Result<()> {
        self.set_power(false).await
    }

    /// Toggles between on and off
    #[instrument(skip(self))]
    pub async fn toggle(&mut self) -> Result<()> {
        self.set_power(!self.status.on).await
    }

    async fn set_power(&mut self, on: bool) -> Result<()> {
        self.ensure_connected().await?;
        debug!("Turning {}", if on { "on" } else { "off" });
        self.status.on = on;
        self.write(&message::on_off(on)).await?;
        info!("Lights turned {}", if on { "on" } else { "off" });
        Ok(())
    }

    /// Sets function, brightness and flash speed
    ///
    /// A `None` argument keeps the current value. Setting these turns the
    /// lights on.
    ///
    /// # Arguments
    ///
    /// * `function` - Function to set, [`Function::Keep`] is not allowed
    /// * `brightness` - Brightness level (0-100)
    /// * `flash_speed` - Flash speed (0-100), only affects the flash functions
    #[instrument(skip(self))]
    pub async fn control(
        &mut self,
        function: Option<Function>,
        brightness: Option<u8>,
        flash_speed: Option<u8>,
    ) -> Result<()> {
        let status = Status {
            on: true,
            function: function.unwrap_or(self.status.function),
            brightness: brightness.unwrap_or(self.status.brightness),
            flash_speed: flash_speed.unwrap_or(self.status.flash_speed),
        };
        let payload = message::control(status.function, status.brightness, status.flash_speed)?;

        self.ensure_connected().await?;
        debug!(
            "Setting function {} with brightness {} and flash speed {}",
            status.function, status.brightness, status.flash_speed
        );
        self.status = status;
        self.write(&payload).await?;
        info!("Function set to {}", status.function);
        Ok(())
    }

    /// Configures one of the 8 built-in timers
    ///
    /// The clock is synchronized first so the timer triggers at the right time.
    #[instrument(skip(self))]
    pub async fn timer(&mut self, timer: &Timer) -> Result<()> {
        let payload = message::timer(timer)?;

        self.ensure_connected().await?;
        self.write_time().await?;
        self.write(&payload).await?;
        info!(
            "Timer {} set to turn {} at {}:{:02} on {}",
            timer.slot,
            if timer.turn_on { "on" } else { "off" },
            timer.hour,
            timer.minute,
            timer.repeat
        );
        Ok(())
    }

    /// Deactivates one timer, or all of them when `slot` is `None`
    #[instrument(skip(self))]
    pub async fn deactivate_timer(&mut self, slot: Option<u8>) -> Result<()> {
        match slot {
            Some(slot) => {
                let timer = Timer::inactive(slot).brightness(self.status.brightness);
                self.timer(&timer).await
            }
            None => {
                self.ensure_connected().await?;
                for slot in 0..TIMER_SLOTS {
                    let timer = Timer::inactive(slot).brightness(self.status.brightness);
                    self.write(&message::timer(&timer)?).await?;
                }
                info!("All timers deactivated");
                Ok(())
            }
        }
    }

    /// Synchronizes the device clock with the local time
    ///
    /// Happens implicitly when connecting and when setting a timer.
    #[instrument(skip(self))]
    pub async fn sync_time(&mut self) -> Result<()> {
        self.ensure_connected().await?;
        self.write_time().await
    }

    /// Changes the device password, used for all future connects
    #[instrument(skip(self, password))]
    pub async fn set_password(&mut self, password: &str) -> Result<()> {
        let payload = message::set_password(password)?;

        self.ensure_connected().await?;
        self.write(&payload).await?;
        self.config.password = password.to_owned();
        info!("Password changed");
        Ok(())
    }

    /// Makes sure commands can be sent, reconnecting after a dropped connection
    async fn ensure_connected(&mut self) -> Result<()> {
        if self.state == SessionState::Ready && self.transport.is_connected().await? {
            return Ok(());
        }
        self.state = SessionState::Disconnected;

        if !self.reconnect {
            error!("Tried to send message to device, but it's disconnected!");
            return Err(Error::NotConnected);
        }

        warn!("Device disconnected, trying to reconnect");
        let result = self.bootstrap().await;
        if result.is_err() {
            self.state = SessionState::Disconnected;
        }
        result
    }

    async fn write_status(&self) -> Result<()> {
        let status = self.status;
        let payload = message::control(status.function, status.brightness, status.flash_speed)?;
        self.write(&payload).await?;
        self.write(&message::on_off(status.on)).await
    }

    async fn write_time(&self) -> Result<()> {
        let now = chrono::Local::now();
        debug!("Syncing device time to {}", now.format("%Y-%m-%d %H:%M:%S"));
        self.write(&message::rtc(&now)).await
    }

    async fn write(&self, payload: &[u8]) -> Result<()> {
        debug!("Sending message to device: {:02x?}", payload);
        let frame = codec::encode(payload)?;
        self.transport.send(&frame).await
    }
}

impl Device<BleTransport> {
    /// Scans for the device at `config.address` and connects to it
    ///
    /// The status in `config.initial_status` is applied right away.
    pub async fn connect_ble(config: DeviceConfig) -> Result<Self> {
        let transport = BleTransport::new(&config).await?;
        Self::connect_with(transport, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::new("f8:dc:f0:2a:d3:ff");
        assert_eq!(config.address, "f8:dc:f0:2a:d3:ff");
        assert_eq!(config.password, "123456");
        assert_eq!(config.characteristic_uuid, CHARACTERISTIC_UUID);
        assert!(config.auto_reconnect);

        let status = config.initial_status;
        assert!(status.on);
        assert_eq!(status.function, Function::Steady);
        assert_eq!(status.brightness, 100);
        assert_eq!(status.flash_speed, 50);
    }
}
