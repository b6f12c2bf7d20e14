use bluer::Address;
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::monitor::HeartRateMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Connecting,
    Subscribed,
    Unsubscribing,
    Disconnected,
    Failed,
}

/// Supervises one connect-subscribe-stream-teardown cycle.
/// `Disconnected` and `Failed` are terminal; a new session needs a new value.
pub struct Session<M: HeartRateMonitor> {
    monitor: M,
    name:    String,
    address: Address,
    state:   State,
}

impl<M: HeartRateMonitor> Session<M> {
    pub fn new(monitor: M, name: String, address: Address) -> Session<M> {
        Session { monitor, name, address, state: State::Idle }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn advance(&mut self, state: State) {
        debug!("{}: {:?} -> {:?}", self.address, self.state, state);

        self.state = state;
    }

    /// Streams notifications into the dispatcher until `cancel` flips or the
    /// transport gives out. Teardown runs on every exit path; each step is
    /// attempted even when the previous one errored.
    pub async fn run(&mut self, dispatcher: &Dispatcher<'_>, cancel: &mut watch::Receiver<bool>) -> Result<(), Error> {
        self.advance(State::Connecting);

        if let Err(e) = self.monitor.connect().await {
            self.advance(State::Failed);
            return Err(e);
        }

        if let Err(e) = self.monitor.subscribe().await {
            if let Err(e) = self.monitor.disconnect().await {
                warn!("couldn't release the half-open connection: {e}");
            }

            self.advance(State::Failed);
            return Err(e);
        }

        self.advance(State::Subscribed);
        info!("streaming heart rate from {} ({})", self.name, self.address);

        let outcome = loop {
            tokio::select! {
                _ = cancel.changed() => break Ok(()),

                notification = self.monitor.next_notification() => match notification {
                    Some(payload) => dispatcher.dispatch(&payload),
                    None => break Err(Error::ConnectionLost),
                },
            }
        };

        self.advance(State::Unsubscribing);

        if let Err(e) = self.monitor.unsubscribe().await {
            warn!("couldn't unsubscribe from the peripheral: {e}");
        }

        if let Err(e) = self.monitor.disconnect().await {
            warn!("couldn't disconnect from the peripheral: {e}");
        }

        match &outcome {
            Ok(()) => self.advance(State::Disconnected),
            Err(_) => self.advance(State::Failed),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bluer::Address;
    use tokio::sync::watch;

    use super::*;
    use crate::outlet::Publisher;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Connect,
        Subscribe,
        Unsubscribe,
        Disconnect,
    }

    #[derive(Default)]
    struct MockMonitor {
        calls:             Arc<Mutex<Vec<Call>>>,
        notifications:     VecDeque<Vec<u8>>,
        idle_when_drained: bool,
        fail_connect:      bool,
        fail_subscribe:    bool,
        fail_unsubscribe:  bool,
    }

    impl MockMonitor {
        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn fault() -> Error {
        Error::Io(io::Error::new(io::ErrorKind::Other, "transport refused"))
    }

    #[async_trait]
    impl HeartRateMonitor for MockMonitor {
        async fn connect(&mut self) -> Result<(), Error> {
            self.record(Call::Connect);

            if self.fail_connect { Err(fault()) } else { Ok(()) }
        }

        async fn subscribe(&mut self) -> Result<(), Error> {
            self.record(Call::Subscribe);

            if self.fail_subscribe { Err(fault()) } else { Ok(()) }
        }

        async fn next_notification(&mut self) -> Option<Vec<u8>> {
            match self.notifications.pop_front() {
                Some(payload) => Some(payload),
                None if self.idle_when_drained => std::future::pending().await,
                None => None,
            }
        }

        async fn unsubscribe(&mut self) -> Result<(), Error> {
            self.record(Call::Unsubscribe);

            if self.fail_unsubscribe { Err(fault()) } else { Ok(()) }
        }

        async fn disconnect(&mut self) -> Result<(), Error> {
            self.record(Call::Disconnect);

            Ok(())
        }
    }

    fn address() -> Address {
        Address::new([0xC8, 0x0F, 0x10, 0x80, 0xD0, 0xAA])
    }

    #[tokio::test]
    async fn cancellation_tears_down_in_order() {
        let mock = MockMonitor { idle_when_drained: true, ..Default::default() };
        let calls = mock.calls.clone();

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        cancel_tx.send(true).unwrap();

        let (publisher, _hr_rx, _rr_rx) = Publisher::with_capacity("Mock HRM", 8);
        let dispatcher = Dispatcher::new(&publisher);

        let mut session = Session::new(mock, "Mock HRM".to_owned(), address());
        let result = session.run(&dispatcher, &mut cancel_rx).await;

        assert!(result.is_ok());
        assert_eq!(session.state(), State::Disconnected);
        assert_eq!(
            *calls.lock().unwrap(),
            [Call::Connect, Call::Subscribe, Call::Unsubscribe, Call::Disconnect]
        );
    }

    #[tokio::test]
    async fn notifications_flow_until_cancelled() {
        let mock = MockMonitor {
            notifications: VecDeque::from([
                vec![0x00, 0x50],
                vec![0x10, 0x4B, 0x04],
                vec![0x10, 0x4B, 0x04, 0x00],
            ]),
            idle_when_drained: true,
            ..Default::default()
        };
        let calls = mock.calls.clone();

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let (publisher, mut hr_rx, mut rr_rx) = Publisher::with_capacity("Mock HRM", 8);

        let handle = tokio::spawn(async move {
            let dispatcher = Dispatcher::new(&publisher);
            let mut session = Session::new(mock, "Mock HRM".to_owned(), address());

            let result = session.run(&dispatcher, &mut cancel_rx).await;

            (session.state(), result)
        });

        // The malformed middle notification is dropped, the rest flow in order.
        assert_eq!(hr_rx.recv().await, Some(80));
        assert_eq!(hr_rx.recv().await, Some(75));
        assert_eq!(rr_rx.recv().await, Some(4));

        cancel_tx.send(true).unwrap();

        let (state, result) = handle.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(state, State::Disconnected);
        assert_eq!(
            *calls.lock().unwrap(),
            [Call::Connect, Call::Subscribe, Call::Unsubscribe, Call::Disconnect]
        );
    }

    #[tokio::test]
    async fn failed_unsubscribe_still_disconnects() {
        let mock = MockMonitor {
            idle_when_drained: true,
            fail_unsubscribe: true,
            ..Default::default()
        };
        let calls = mock.calls.clone();

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        cancel_tx.send(true).unwrap();

        let (publisher, _hr_rx, _rr_rx) = Publisher::with_capacity("Mock HRM", 8);
        let dispatcher = Dispatcher::new(&publisher);

        let mut session = Session::new(mock, "Mock HRM".to_owned(), address());
        let result = session.run(&dispatcher, &mut cancel_rx).await;

        assert!(result.is_ok());
        assert_eq!(session.state(), State::Disconnected);
        assert_eq!(
            *calls.lock().unwrap(),
            [Call::Connect, Call::Subscribe, Call::Unsubscribe, Call::Disconnect]
        );
    }

    #[tokio::test]
    async fn connect_failure_is_terminal() {
        let mock = MockMonitor { fail_connect: true, ..Default::default() };
        let calls = mock.calls.clone();

        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let (publisher, _hr_rx, _rr_rx) = Publisher::with_capacity("Mock HRM", 8);
        let dispatcher = Dispatcher::new(&publisher);

        let mut session = Session::new(mock, "Mock HRM".to_owned(), address());
        let result = session.run(&dispatcher, &mut cancel_rx).await;

        assert!(result.is_err());
        assert_eq!(session.state(), State::Failed);
        assert_eq!(*calls.lock().unwrap(), [Call::Connect]);
    }

    #[tokio::test]
    async fn subscribe_failure_releases_the_connection() {
        let mock = MockMonitor { fail_subscribe: true, ..Default::default() };
        let calls = mock.calls.clone();

        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let (publisher, _hr_rx, _rr_rx) = Publisher::with_capacity("Mock HRM", 8);
        let dispatcher = Dispatcher::new(&publisher);

        let mut session = Session::new(mock, "Mock HRM".to_owned(), address());
        let result = session.run(&dispatcher, &mut cancel_rx).await;

        assert!(result.is_err());
        assert_eq!(session.state(), State::Failed);
        assert_eq!(*calls.lock().unwrap(), [Call::Connect, Call::Subscribe, Call::Disconnect]);
    }

    #[tokio::test]
    async fn lost_connection_fails_after_teardown() {
        let mock = MockMonitor {
            notifications: VecDeque::from([vec![0x00, 0x50]]),
            ..Default::default()
        };
        let calls = mock.calls.clone();

        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let (publisher, _hr_rx, _rr_rx) = Publisher::with_capacity("Mock HRM", 8);
        let dispatcher = Dispatcher::new(&publisher);

        let mut session = Session::new(mock, "Mock HRM".to_owned(), address());
        let result = session.run(&dispatcher, &mut cancel_rx).await;

        assert!(matches!(result, Err(Error::ConnectionLost)));
        assert_eq!(session.state(), State::Failed);
        assert_eq!(
            *calls.lock().unwrap(),
            [Call::Connect, Call::Subscribe, Call::Unsubscribe, Call::Disconnect]
        );
    }
}
