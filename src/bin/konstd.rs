use konstsmide::*;
use std::env;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing_subscriber::EnvFilter;

/// Executes a single `command:args` line
async fn execute<T: Transport>(device: &mut Device<T>, line: &str) -> Result<()> {
    let (command, args) = match line.split_once(':') {
        Some((command, args)) => (command.trim(), args.trim()),
        None => (line.trim(), ""),
    };
    let args: Vec<&str> = if args.is_empty() {
        Vec::new()
    } else {
        args.split(',').map(str::trim).collect()
    };

    match command {
        "on" | "power_on" => device.on().await,
        "off" | "power_off" => device.off().await,
        "toggle" => device.toggle().await,
        "sync_time" => device.sync_time().await,
        "control" => {
            // control:<function>,<brightness>,<flash_speed>, empty fields keep the current value
            let function = args
                .first()
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Function>())
                .transpose()?;
            let brightness = parse_number(args.get(1).copied(), "brightness")?;
            let flash_speed = parse_number(args.get(2).copied(), "flash speed")?;
            device.control(function, brightness, flash_speed).await
        }
        "timer" => {
            // timer:<slot>,<on|off>,<hh:mm>,<function>,<days...>
            if args.len() < 5 {
                return Err(Error::Parse(
                    "use timer:<slot>,<on|off>,<hh:mm>,<function>,<days>".to_owned(),
                ));
            }
            let slot = required(parse_number(Some(args[0]), "slot")?, "slot")?;
            let turn_on = match args[1] {
                "on" => true,
                "off" => false,
                other => return Err(Error::Parse(format!("expected on or off, got '{other}'"))),
            };
            let (hour, minute) = args[2]
                .split_once(':')
                .ok_or_else(|| Error::Parse(format!("expected hh:mm, got '{}'", args[2])))?;
            let hour = required(parse_number(Some(hour), "hour")?, "hour")?;
            let minute = required(parse_number(Some(minute), "minute")?, "minute")?;
            let function: Function = args[3].parse()?;
            let repeat: Repeat = args[4..].join(",").parse()?;

            let timer = Timer::new(slot, hour, minute)
                .turn_on(turn_on)
                .function(function)
                .repeat(repeat)
                .brightness(device.brightness());
            device.timer(&timer).await
        }
        "deactivate_timer" => {
            let slot = parse_number(args.first().copied(), "slot")?;
            device.deactivate_timer(slot).await
        }
        "" => Err(Error::Parse("No command given".to_owned())),
        other => Err(Error::Parse(format!("Unknown command: {other}"))),
    }
}

fn parse_number(value: Option<&str>, field: &str) -> Result<Option<u8>> {
    match value {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| Error::Parse(format!("invalid {field} '{value}'"))),
    }
}

fn required(value: Option<u8>, field: &str) -> Result<u8> {
    value.ok_or_else(|| Error::Parse(format!("missing {field}")))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout is reserved for replies
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("konstsmide=warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    // Get a target address from command line arguments.
    // If not provided, exit.
    let usage = "Usage: konstd <address> [password]";
    let args: Vec<_> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{usage}");
        std::process::exit(1);
    }
    if args[1] == "-h" || args[1] == "--help" {
        eprintln!("{usage}");
        std::process::exit(0);
    }

    let mut config = DeviceConfig::new(&args[1]);
    if let Some(password) = args.get(2) {
        config.password = password.clone();
    }

    let mut device = Device::connect_ble(config).await?;

    // Inform about successful initialization
    println!("OK");

    // Mainloop: wait for user input, line by line
    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.map_err(|e| Error::Parse(e.to_string()))? else {
                    break;
                };
                match execute(&mut device, &line).await {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR {e}"),
                }
            }
            _ = signal::ctrl_c() => break,
        }
    }

    device.disconnect().await
}
