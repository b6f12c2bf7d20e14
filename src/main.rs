mod discovery;
mod dispatch;
mod error;
mod measurement;
mod monitor;
mod outlet;
mod services;
mod session;

use std::io::{self, Write};
use std::time::Duration;

use bluer::{Adapter, Address};
use clap::Parser;
use log::{error, info};
use tokio::sync::watch;

use discovery::Discovered;
use dispatch::Dispatcher;
use error::Error;
use monitor::Monitor;
use outlet::Publisher;
use session::Session;

#[derive(Parser)]
#[command(about = "Streams heart-rate and rr-interval samples from a BLE heart-rate monitor")]
struct Args {
    /// Peripheral address (AA:BB:CC:DD:EE:FF); scans interactively when omitted
    address: Option<Address>,

    /// Scan duration in seconds
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let args = Args::parse();

    let bluetooth = bluer::Session::new().await?;
    let adapter = bluetooth.default_adapter().await?;
    adapter.set_powered(true).await?;

    let (name, address) = match args.address {
        Some(address) => (device_name(&adapter, address).await, address),
        None => select_device(&adapter, Duration::from_secs(args.timeout)).await?,
    };

    let (publisher, mut hr_rx, mut rr_rx) = Publisher::new(&name);

    info!("opened outlets `{}` and `{}` for {address}", publisher.hr.name(), publisher.rr.name());

    tokio::spawn(async move {
        while let Some(bpm) = hr_rx.recv().await {
            println!("HR: {bpm}");
        }
    });

    tokio::spawn(async move {
        while let Some(rr) = rr_rx.recv().await {
            println!("    RR: {rr}");
        }
    });

    let (cancel_tx, mut cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stopped by user");
            let _ = cancel_tx.send(true);
        }
    });

    let dispatcher = Dispatcher::new(&publisher);
    let mut session = Session::new(Monitor::new(&adapter, address)?, name, address);

    info!("connecting to {address}...");

    let result = session.run(&dispatcher, &mut cancel_rx).await;

    match &result {
        Ok(()) => info!("session closed ({:?})", session.state()),
        Err(e) => error!("session failed ({:?}): {e}", session.state()),
    }

    result
}

async fn device_name(adapter: &Adapter, address: Address) -> String {
    let name = match adapter.device(address) {
        Ok(device) => device.name().await.ok().flatten(),
        Err(_) => None,
    };

    name.unwrap_or_else(|| address.to_string())
}

async fn select_device(adapter: &Adapter, timeout: Duration) -> Result<(String, Address), Error> {
    loop {
        println!("Scanning for devices...");

        let devices = discovery::discover(adapter, timeout).await?;

        if devices.is_empty() {
            if confirm("No devices found. Try again?")? {
                continue;
            }

            return Err(Error::NoDeviceSelected);
        }

        for (i, device) in devices.iter().enumerate() {
            println!("{i}) {} ({})", device.name, device.address);
        }

        let Discovered { name, address } = choose(devices)?;

        return Ok((name, address));
    }
}

fn choose(mut devices: Vec<Discovered>) -> Result<Discovered, Error> {
    loop {
        print!("Select a device [0-{}]: ", devices.len() - 1);
        io::stdout().flush()?;

        let Some(line) = read_line()? else {
            return Err(Error::NoDeviceSelected);
        };

        match line.trim().parse::<usize>() {
            Ok(i) if i < devices.len() => return Ok(devices.swap_remove(i)),
            _ => println!("Invalid selection."),
        }
    }
}

fn confirm(prompt: &str) -> Result<bool, Error> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;

    let Some(line) = read_line()? else {
        return Ok(false);
    };

    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn read_line() -> Result<Option<String>, Error> {
    let mut line = String::new();

    match io::stdin().read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line)),
    }
}
