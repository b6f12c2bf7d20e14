use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bluer::gatt::remote::Characteristic;
use bluer::{Adapter, Address, Device};
use derive_more::Deref;
use futures::{Stream, StreamExt};
use log::debug;
use uuid::Uuid;

use crate::error::Error;
use crate::services;

type Notifications = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Transport seam for a single heart-rate peripheral.
/// The supervisor drives it; tests substitute their own implementation.
#[async_trait]
pub trait HeartRateMonitor: Send {
    async fn connect(&mut self) -> Result<(), Error>;
    async fn subscribe(&mut self) -> Result<(), Error>;

    /// Next notification payload, or `None` once the transport side ends.
    async fn next_notification(&mut self) -> Option<Vec<u8>>;

    async fn unsubscribe(&mut self) -> Result<(), Error>;
    async fn disconnect(&mut self) -> Result<(), Error>;
}

#[derive(Deref)]
pub struct Monitor {
    #[deref]
    device:          Device,
    characteristics: HashMap<Uuid, Characteristic>,
    notifications:   Option<Notifications>,
}

impl Monitor {
    pub fn new(adapter: &Adapter, address: Address) -> Result<Monitor, Error> {
        Ok(Monitor {
            device:          adapter.device(address)?,
            characteristics: HashMap::new(),
            notifications:   None,
        })
    }
}

#[async_trait]
impl HeartRateMonitor for Monitor {
    async fn connect(&mut self) -> Result<(), Error> {
        if !self.is_connected().await? {
            self.device.connect().await?;
        }

        self.characteristics.clear();

        for service in self.services().await? {
            for characteristic in service.characteristics().await? {
                let uuid = characteristic.uuid().await?;

                debug!("characteristic found: {}", services::display(uuid));
                self.characteristics.insert(uuid, characteristic);
            }
        }

        Ok(())
    }

    async fn subscribe(&mut self) -> Result<(), Error> {
        let characteristic = self.characteristics
            .get(&services::uuid::HEART_RATE_MEASUREMENT)
            .ok_or(Error::CharacteristicNotFound(services::uuid::HEART_RATE_MEASUREMENT))?;

        let notifications = characteristic.notify().await?;
        self.notifications = Some(Box::pin(notifications));

        Ok(())
    }

    async fn next_notification(&mut self) -> Option<Vec<u8>> {
        match self.notifications.as_mut() {
            Some(notifications) => notifications.next().await,
            None => None,
        }
    }

    async fn unsubscribe(&mut self) -> Result<(), Error> {
        // BlueZ ends the notify session once the stream is dropped.
        self.notifications.take();

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        self.device.disconnect().await.map_err(Into::into)
    }
}
