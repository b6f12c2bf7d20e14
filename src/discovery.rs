use std::time::Duration;

use bluer::{Adapter, AdapterEvent, Address};
use futures::{pin_mut, StreamExt};
use log::debug;
use tokio::time::sleep;

use crate::error::Error;

pub struct Discovered {
    pub address: Address,
    pub name:    String,
}

/// Scans for `duration` and returns every named device seen, in discovery
/// order. Devices without a name can't be offered for selection and are
/// skipped.
pub async fn discover(adapter: &Adapter, duration: Duration) -> Result<Vec<Discovered>, Error> {
    let events = adapter.discover_devices().await?;
    pin_mut!(events);

    let deadline = sleep(duration);
    tokio::pin!(deadline);

    let mut found: Vec<Discovered> = Vec::new();

    loop {
        tokio::select! {
            _ = &mut deadline => break,

            event = events.next() => match event {
                Some(AdapterEvent::DeviceAdded(address)) => {
                    if found.iter().any(|device| device.address == address) {
                        continue;
                    }

                    let Some(name) = adapter.device(address)?.name().await.ok().flatten() else {
                        debug!("skipping unnamed device {address}");
                        continue;
                    };

                    debug!("discovered {name} ({address})");
                    found.push(Discovered { address, name });
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    Ok(found)
}
