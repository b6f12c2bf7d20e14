use log::{debug, warn};

use crate::measurement::Measurement;
use crate::outlet::{Outlet, Publisher};

/// Per-session bridge between the notification stream and the publisher.
/// Holds nothing but the outlet handles it publishes to.
pub struct Dispatcher<'a> {
    hr: &'a Outlet,
    rr: &'a Outlet,
}

impl<'a> Dispatcher<'a> {
    pub fn new(publisher: &'a Publisher) -> Dispatcher<'a> {
        Dispatcher { hr: &publisher.hr, rr: &publisher.rr }
    }

    // A malformed payload is dropped without ending the session.
    pub fn dispatch(&self, payload: &[u8]) {
        let measurement = match Measurement::try_from(payload) {
            Ok(measurement) => measurement,
            Err(e) => {
                warn!("dropping malformed notification: {e}");
                return;
            }
        };

        debug!("{measurement}");

        self.hr.push(measurement.bpm);

        if measurement.rr_present {
            for rr in measurement.rr_intervals {
                self.rr.push(rr);
            }
        }
    }
}
