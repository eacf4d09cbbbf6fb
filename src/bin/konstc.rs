use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Result};
use konstsmide::transport::{self, BleTransport};
use konstsmide::*;
use tokio::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Bluetooth address or id of the device
    #[arg(short, long, global = true)]
    address: Option<String>,

    /// Six digit device password
    #[arg(short, long, global = true, default_value = device::DEFAULT_PASSWORD)]
    password: String,

    /// Scan and connect timeout in seconds
    #[arg(short, long, global = true, default_value_t = 5.0)]
    timeout: f64,
}

#[derive(Clone, Copy, ValueEnum, Debug)]
enum FunctionArg {
    /// Cycle through all functions
    Combination,
    /// Waves of light
    InWaves,
    /// One after another
    Sequential,
    /// Slow glow
    SloGlo,
    /// Chasing lights
    Chasing,
    /// Slow fade in and out
    SlowFade,
    /// Twinkling lights
    Twinkle,
    /// Steady light
    Steady,
    /// Alternating flash
    FlashAlternating,
    /// Synchronous flash
    FlashSynchronous,
    /// Keep the current function (timers only)
    Keep,
}

impl From<FunctionArg> for Function {
    fn from(arg: FunctionArg) -> Self {
        match arg {
            FunctionArg::Combination => Function::Combination,
            FunctionArg::InWaves => Function::InWaves,
            FunctionArg::Sequential => Function::Sequential,
            FunctionArg::SloGlo => Function::SloGlo,
            FunctionArg::Chasing => Function::Chasing,
            FunctionArg::SlowFade => Function::SlowFade,
            FunctionArg::Twinkle => Function::Twinkle,
            FunctionArg::Steady => Function::Steady,
            FunctionArg::FlashAlternating => Function::FlashAlternating,
            FunctionArg::FlashSynchronous => Function::FlashSynchronous,
            FunctionArg::Keep => Function::Keep,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for Konstsmide devices
    Scan,
    /// Demonstration cycling through all functions
    Demo {
        /// Duration of each demo step in seconds
        #[arg(short, long, default_value_t = 3)]
        duration: u64,
    },
    /// Turn lights on
    On,
    /// Turn lights off
    Off,
    /// Toggle lights on/off
    Toggle,
    /// Set function, brightness and flash speed
    Control {
        /// Light function
        #[arg(short, long, value_enum)]
        function: Option<FunctionArg>,
        /// Brightness level (0-100)
        #[arg(short, long)]
        brightness: Option<u8>,
        /// Flash speed (0-100)
        #[arg(short = 's', long)]
        flash_speed: Option<u8>,
    },
    /// Configure a timer
    Timer {
        /// Timer number (0-7)
        #[arg(long)]
        slot: u8,
        /// Hour (0-23)
        #[arg(long)]
        hour: u8,
        /// Minute (0-59)
        #[arg(short, long)]
        minute: u8,
        /// Turn the lights off instead of on
        #[arg(long)]
        off: bool,
        /// Store the timer without activating it
        #[arg(long)]
        inactive: bool,
        /// Function to set when triggered
        #[arg(short, long, value_enum, default_value_t = FunctionArg::Steady)]
        function: FunctionArg,
        /// Days (mon,tue,wed,thu,fri,sat,sun,all,weekdays,weekend,none)
        #[arg(short, long, default_value = "all", value_parser = parse_days)]
        days: Repeat,
        /// Brightness level (0-100)
        #[arg(short, long, default_value_t = 100)]
        brightness: u8,
    },
    /// Deactivate one timer or all timers
    DeactivateTimer {
        /// Timer number (0-7), all timers if omitted
        #[arg(long)]
        slot: Option<u8>,
    },
    /// Synchronize the device clock with the local time
    SyncTime,
    /// Change the device password
    SetPassword {
        /// New six digit password
        new_password: String,
    },
}

#[tokio::main]
#[instrument]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("konstsmide=info")),
        )
        .compact()
        .init();

    color_eyre::install()?;

    let cli = Cli::parse();
    debug!("Parsed command line arguments");
    let timeout = Duration::from_secs_f64(cli.connection.timeout);

    if let Commands::Scan = cli.command {
        for address in transport::find_devices(timeout).await? {
            println!("{address}");
        }
        return Ok(());
    }

    let address = cli
        .connection
        .address
        .ok_or_else(|| eyre!("--address is required for this command"))?;
    let config = DeviceConfig {
        password: cli.connection.password,
        timeout,
        ..DeviceConfig::new(address)
    };

    let mut device = match Device::connect_ble(config).await {
        Ok(device) => device,
        Err(e) => {
            error!("Failed to initialize device: {}", e);
            return Err(e.into());
        }
    };

    let result = run(&mut device, cli.command).await;
    device.disconnect().await?;
    result
}

async fn run(device: &mut Device<BleTransport>, command: Commands) -> Result<()> {
    match command {
        Commands::Scan => return Err(eyre!("scan doesn't need a connection")),
        Commands::Demo { duration } => run_demo(device, duration).await?,
        Commands::On => device.on().await?,
        Commands::Off => device.off().await?,
        Commands::Toggle => device.toggle().await?,
        Commands::Control {
            function,
            brightness,
            flash_speed,
        } => {
            device
                .control(function.map(Function::from), brightness, flash_speed)
                .await?
        }
        Commands::Timer {
            slot,
            hour,
            minute,
            off,
            inactive,
            function,
            days,
            brightness,
        } => {
            debug!("Days value: {:#04x}", days.mask());
            let timer = Timer::new(slot, hour, minute)
                .active(!inactive)
                .turn_on(!off)
                .function(function.into())
                .repeat(days)
                .brightness(brightness);
            device.timer(&timer).await?;
        }
        Commands::DeactivateTimer { slot } => device.deactivate_timer(slot).await?,
        Commands::SyncTime => device.sync_time().await?,
        Commands::SetPassword { new_password } => device.set_password(&new_password).await?,
    }
    Ok(())
}

/// Parse days string to a repeat set
fn parse_days(days: &str) -> std::result::Result<Repeat, String> {
    days.parse::<Repeat>().map_err(|e| e.to_string())
}

/// Sleep for specified number of seconds
async fn sleep(seconds: u64) {
    tokio::time::sleep(Duration::from_secs(seconds)).await;
}

/// Run a demonstration of all light functions
#[instrument(skip(device))]
async fn run_demo(device: &mut Device<BleTransport>, duration: u64) -> Result<()> {
    info!("Running demo with {}s intervals", duration);

    info!("Turning lights off");
    device.off().await?;
    sleep(duration).await;

    for function in Function::ALL {
        if function == Function::Keep {
            continue;
        }
        info!("Setting function {}", function);
        device.control(Some(function), Some(80), Some(80)).await?;
        sleep(duration).await;
    }

    info!("Dimming to 20%");
    device.control(Some(Function::Steady), Some(20), None).await?;
    sleep(duration).await;

    info!("Back to steady light");
    device.control(Some(Function::Steady), Some(100), None).await?;

    info!("Demo completed!");
    Ok(())
}
