/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Mutex;

use tokio::sync::{mpsc, watch};

/// A single slot event channel.
///
/// A new event is dropped if the consumer has not drained the previous one,
/// so the receiver only sees a latest value indicator, not every event.
pub(crate) struct EventSlot<T> {
    sender: Mutex<Option<mpsc::Sender<T>>>,
    receiver: Mutex<Option<mpsc::Receiver<T>>>,
}

impl<T> EventSlot<T> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::channel(1);
        EventSlot {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Returns false if the event was dropped.
    pub(crate) fn send(&self, v: T) -> bool {
        let lock = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match lock.as_ref() {
            Some(sender) => sender.try_send(v).is_ok(),
            None => false,
        }
    }

    pub(crate) fn take_receiver(&self) -> Option<mpsc::Receiver<T>> {
        let mut lock = self.receiver.lock().unwrap_or_else(|e| e.into_inner());
        lock.take()
    }

    /// The receiver sees the end of stream once pending events are drained.
    pub(crate) fn close(&self) {
        let mut lock = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        lock.take();
    }
}

pub(crate) struct CloseSignal {
    sender: Mutex<Option<watch::Sender<()>>>,
    receiver: watch::Receiver<()>,
}

impl CloseSignal {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = watch::channel(());
        CloseSignal {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<()> {
        self.receiver.clone()
    }

    /// Returns true only for the call that fired the signal.
    pub(crate) fn fire(&self) -> bool {
        let mut lock = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        lock.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_drops_when_full() {
        let slot = EventSlot::new();
        assert!(slot.send(1));
        assert!(!slot.send(2));

        let mut r = slot.take_receiver().unwrap();
        assert!(slot.take_receiver().is_none());
        assert_eq!(r.try_recv().unwrap(), 1);
        assert!(slot.send(3));
        assert_eq!(r.try_recv().unwrap(), 3);

        slot.close();
        assert!(!slot.send(4));
        assert_eq!(
            r.try_recv().unwrap_err(),
            mpsc::error::TryRecvError::Disconnected
        );
    }

    #[tokio::test]
    async fn close_signal_once() {
        let signal = CloseSignal::new();
        let mut r1 = signal.subscribe();
        let mut r2 = r1.clone();
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(r1.changed().await.is_err());
        assert!(r2.changed().await.is_err());
        assert!(signal.subscribe().changed().await.is_err());
    }
}
