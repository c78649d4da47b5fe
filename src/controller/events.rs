// SPDX-License-Identifier: GPL-3.0-only

//! Event bus between the host-facing controller and the orchestration task
//!
//! Each event kind has its own broadcast channel. Emitting never blocks and an
//! event with no subscriber is dropped, so events raised while no session is
//! subscribed (e.g. a shutter press while paused) have no effect.

use crate::backends::camera::SurfaceTexture;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// One event kind
#[derive(Debug)]
pub struct EventChannel<T: Clone> {
    name: &'static str,
    sender: broadcast::Sender<T>,
}

impl<T: Clone> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> EventChannel<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { name, sender }
    }

    /// Deliver to current subscribers; returns how many received it
    pub fn emit(&self, value: T) -> usize {
        self.sender.send(value).unwrap_or(0)
    }

    /// Receive every value emitted from now on
    pub fn subscribe(&self) -> EventSubscription<T> {
        EventSubscription {
            name: self.name,
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receiving end of an [`EventChannel`]
pub struct EventSubscription<T: Clone> {
    name: &'static str,
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> EventSubscription<T> {
    /// Next value, or `None` once the channel is gone
    ///
    /// Values lost to a slow receiver are skipped with a warning.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = self.name, skipped, "Event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Wait for one value and unsubscribe
    pub async fn first(mut self) -> Option<T> {
        self.next().await
    }
}

/// All events the orchestration task reacts to
#[derive(Clone)]
pub struct EventBus {
    /// Preview texture became available (or should be re-used after a restart)
    pub surface_available: EventChannel<Arc<dyn SurfaceTexture>>,
    /// Preview texture is gone
    pub surface_destroyed: EventChannel<()>,
    pub shutter: EventChannel<()>,
    pub switch_camera: EventChannel<()>,
    pub pause: EventChannel<()>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            surface_available: EventChannel::new("surface_available", EVENT_CHANNEL_CAPACITY),
            surface_destroyed: EventChannel::new("surface_destroyed", EVENT_CHANNEL_CAPACITY),
            shutter: EventChannel::new("shutter", EVENT_CHANNEL_CAPACITY),
            switch_camera: EventChannel::new("switch_camera", EVENT_CHANNEL_CAPACITY),
            pause: EventChannel::new("pause", EVENT_CHANNEL_CAPACITY),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_dropped() {
        let channel = EventChannel::<u32>::new("test", 4);
        assert_eq!(channel.emit(1), 0);
    }

    #[tokio::test]
    async fn test_subscription_sees_only_later_values() {
        let channel = EventChannel::<u32>::new("test", 4);
        channel.emit(1);
        let mut subscription = channel.subscribe();
        assert_eq!(channel.emit(2), 1);
        channel.emit(3);

        assert_eq!(subscription.next().await, Some(2));
        assert_eq!(subscription.next().await, Some(3));
    }

    #[tokio::test]
    async fn test_first_and_closed_channel() {
        let channel = EventChannel::<&'static str>::new("test", 4);
        let subscription = channel.subscribe();
        channel.emit("switch");
        assert_eq!(subscription.first().await, Some("switch"));

        let mut orphan = channel.subscribe();
        drop(channel);
        assert_eq!(orphan.next().await, None);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_to_retained_values() {
        let channel = EventChannel::<u32>::new("test", 2);
        let mut subscription = channel.subscribe();
        for value in 0..5 {
            channel.emit(value);
        }
        assert_eq!(subscription.next().await, Some(3));
        assert_eq!(subscription.next().await, Some(4));
    }
}
