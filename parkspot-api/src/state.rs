use parkspot_booking::{BookingLifecycleManager, LotCatalog};
use parkspot_core::{ParkingStore, RetryPolicy};
use parkspot_shared::BookingEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<BookingLifecycleManager>,
    pub catalog: Arc<LotCatalog>,
    pub events: broadcast::Sender<BookingEvent>,
}

impl AppState {
    pub fn new(store: Arc<dyn ParkingStore>, retry: RetryPolicy, channel_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(channel_capacity.max(1));
        let manager = BookingLifecycleManager::new(store.clone())
            .with_retry_policy(retry)
            .with_events(events.clone());

        Self {
            manager: Arc::new(manager),
            catalog: Arc::new(LotCatalog::new(store)),
            events,
        }
    }
}
