use std::collections::HashSet;

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::SchedulingConfig, db::DbPool, events::AppointmentEvent};

const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub events: EventBus,
    pub scheduling: SchedulingConfig,
}

/// In-process fan-out of appointment changes to live listeners.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppointmentEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: AppointmentEvent) {
        if self.sender.send(event).is_err() {
            debug!("No live listeners for appointment event");
        }
    }

    /// Events for the given pets only. Filtering happens here so a listener
    /// never receives another client's appointments.
    pub fn subscribe_pets(
        &self,
        pet_ids: HashSet<Uuid>,
    ) -> impl Stream<Item = AppointmentEvent> + Send + 'static + use<> {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |result| {
            let event = match result {
                Ok(event) if pet_ids.contains(&event.pet_id) => Some(event),
                Ok(_) => None,
                Err(err) => {
                    warn!("Live listener fell behind: {}", err);
                    None
                }
            };
            futures::future::ready(event)
        })
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::events::AppointmentEventKind;

    fn event(pet_id: Uuid) -> AppointmentEvent {
        AppointmentEvent {
            kind: AppointmentEventKind::StatusChanged,
            appointment_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            pet_id,
            status: "ready".into(),
            start_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_listener_only_sees_its_pets() {
        let bus = EventBus::default();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let stream = bus.subscribe_pets(HashSet::from([mine]));
        futures::pin_mut!(stream);

        bus.publish(event(theirs));
        bus.publish(event(mine));

        let received = stream.next().await.unwrap();
        assert_eq!(received.pet_id, mine);
    }

    #[tokio::test]
    async fn test_stream_outlives_the_bus_handle() {
        let bus = EventBus::default();
        let pet_id = Uuid::new_v4();
        let stream = {
            let handle = bus.clone();
            handle.subscribe_pets(HashSet::from([pet_id]))
        };
        let task = tokio::spawn(async move {
            futures::pin_mut!(stream);
            stream.next().await
        });
        assert_eq!(bus.listener_count(), 1);

        bus.publish(event(pet_id));
        let received = task.await.unwrap().unwrap();
        assert_eq!(received.pet_id, pet_id);
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_receiver() {
        let bus = EventBus::default();
        let stream = bus.subscribe_pets(HashSet::new());
        assert_eq!(bus.listener_count(), 1);
        drop(stream);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_publish_without_listeners_is_harmless() {
        let bus = EventBus::new(4);
        bus.publish(event(Uuid::new_v4()));
        assert_eq!(bus.listener_count(), 0);
    }
}
