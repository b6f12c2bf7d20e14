use log::{debug, warn};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

pub const DEFAULT_CAPACITY: usize = 32;

/// One named sample channel of the streaming sink.
pub struct Outlet {
    name: String,
    tx:   Sender<u16>,
}

impl Outlet {
    pub fn new(name: String, capacity: usize) -> (Outlet, Receiver<u16>) {
        let (tx, rx) = mpsc::channel(capacity);

        (Outlet { name, tx }, rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // Sits on the notification delivery path and must never block;
    // a full channel costs the newest sample, loudly.
    pub fn push(&self, sample: u16) {
        match self.tx.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(sample)) => {
                warn!("`{}` consumer is lagging, dropping sample {sample}", self.name);
            }
            Err(TrySendError::Closed(sample)) => {
                debug!("`{}` has no consumer, dropping sample {sample}", self.name);
            }
        }
    }
}

pub struct Publisher {
    pub hr: Outlet,
    pub rr: Outlet,
}

impl Publisher {
    pub fn new(device_name: &str) -> (Publisher, Receiver<u16>, Receiver<u16>) {
        Publisher::with_capacity(device_name, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(device_name: &str, capacity: usize) -> (Publisher, Receiver<u16>, Receiver<u16>) {
        let (hr, hr_rx) = Outlet::new(format!("HR {device_name}"), capacity);
        let (rr, rr_rx) = Outlet::new(format!("RR {device_name}"), capacity);

        (Publisher { hr, rr }, hr_rx, rr_rx)
    }
}
