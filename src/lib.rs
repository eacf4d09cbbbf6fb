/*!
 # Konstsmide Bluetooth String Light Controller Library

 A Rust library for controlling Konstsmide Bluetooth string lights.

 ## Features

 * Power on/off control
 * Light functions (combination, in waves, twinkle, steady, ...)
 * Brightness and flash speed adjustment
 * Up to 8 on-device timers with weekday repeats
 * Real time clock synchronization
 * Password handling

 Every command is a fixed-length plaintext payload built by the [`message`]
 module and obfuscated by the [`codec`] module before it is written to the
 device.

 ## Example

 ```rust,no_run
 use konstsmide::*;

 #[tokio::main]
 async fn main() -> Result<()> {
     // Initialize tracing for logs
     tracing_subscriber::fmt::init();

     let config = DeviceConfig::new("f8:dc:f0:2a:d3:ff");
     let mut device = Device::connect_ble(config).await?;

     // Basic operations
     device.control(Some(Function::Twinkle), Some(80), None).await?;
     device.timer(&Timer::new(0, 16, 30).repeat(Repeat::EVERYDAY)).await?;

     device.disconnect().await?;
     Ok(())
 }
 ```
*/

use thiserror::Error;

pub mod codec;
pub mod device;
pub mod function;
pub mod message;
pub mod schedule;
pub mod transport;

pub use codec::{DecodeError, EncodeError};
pub use device::{Device, DeviceConfig, SessionState, Status};
pub use function::Function;
pub use message::{Command, Timer, ValidationError};
pub use schedule::{Repeat, Weekday};
pub use transport::{BleTransport, Transport};

/// Custom error types for the Konstsmide controller library
#[derive(Error, Debug)]
pub enum Error {
    /// A payload could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A frame could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A command parameter was rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No Bluetooth adapters found
    #[error("No Bluetooth adapters found")]
    NoBluetoothAdapters,

    /// The device couldn't be found or is not a Konstsmide device
    #[error("No Konstsmide device found at {0}")]
    DeviceNotFound(String),

    /// Failed to find required BLE characteristic
    #[error("Could not find required BLE characteristic: {0}")]
    CharacteristicNotFound(String),

    /// Tried to write while the device is disconnected
    #[error("Device is not connected")]
    NotConnected,

    /// BLE communication error
    #[error("BLE communication error: {0}")]
    BleError(String),

    /// Command failed after all retries
    #[error("Command timed out after {0} retries")]
    CommandTimeout(u8),

    /// Scanning or connecting took longer than the configured timeout
    #[error("Operation timed out")]
    Timeout,

    /// Textual input could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error from btleplug
    #[error(transparent)]
    BtlePlugError(#[from] btleplug::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
