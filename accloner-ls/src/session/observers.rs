//! Observer registry for one learning session
//!
//! Groups the four observer lists a session exposes. The ready list is
//! one-shot: it drains when the controller becomes ready. The other lists
//! stay registered until their token is removed.

use accloner_common::events::{CaptureEvent, TransmitterStatus};
use accloner_common::observer::{ObserverList, SubscriberId};

/// The four observer lists of a session controller
pub struct SessionObservers {
    ready: ObserverList<()>,
    listening: ObserverList<bool>,
    transmitter: ObserverList<TransmitterStatus>,
    capture: ObserverList<CaptureEvent>,
}

impl SessionObservers {
    pub fn new() -> Self {
        Self {
            ready: ObserverList::new(),
            listening: ObserverList::new(),
            transmitter: ObserverList::new(),
            capture: ObserverList::new(),
        }
    }

    /// Registers a one-shot readiness callback
    pub fn on_ready(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriberId {
        self.ready.subscribe(move |_: &()| callback())
    }

    /// Registers a listening-state callback (true = accepting connections)
    pub fn on_listening(&self, callback: impl Fn(bool) + Send + Sync + 'static) -> SubscriberId {
        self.listening.subscribe(move |state: &bool| callback(*state))
    }

    /// Registers a transmitter connect/disconnect callback
    pub fn on_transmitter(
        &self,
        callback: impl Fn(&TransmitterStatus) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.transmitter.subscribe(callback)
    }

    /// Registers a signal-captured callback
    pub fn on_capture(
        &self,
        callback: impl Fn(&CaptureEvent) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.capture.subscribe(callback)
    }

    pub fn remove_ready(&self, id: SubscriberId) -> bool {
        self.ready.unsubscribe(id)
    }

    pub fn remove_listening(&self, id: SubscriberId) -> bool {
        self.listening.unsubscribe(id)
    }

    pub fn remove_transmitter(&self, id: SubscriberId) -> bool {
        self.transmitter.unsubscribe(id)
    }

    pub fn remove_capture(&self, id: SubscriberId) -> bool {
        self.capture.unsubscribe(id)
    }

    /// Fires all ready callbacks once and drains the list
    pub fn fire_ready(&self) {
        self.ready.emit_and_drain(&());
    }

    pub fn notify_listening(&self, is_listening: bool) {
        self.listening.emit(&is_listening);
    }

    pub fn notify_transmitter(&self, status: &TransmitterStatus) {
        self.transmitter.emit(status);
    }

    pub fn notify_capture(&self, event: &CaptureEvent) {
        self.capture.emit(event);
    }
}

impl Default for SessionObservers {
    fn default() -> Self {
        Self::new()
    }
}
