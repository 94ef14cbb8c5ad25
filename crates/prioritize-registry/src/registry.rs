//! The event registry: listener bookkeeping, event matching, delivery and the
//! expiry sweep.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use prioritize_core::clock::Clock;
use prioritize_core::config::{EventSettings, EventStrategy};
use prioritize_core::consumer::EventConsumer;
use prioritize_core::error::DomainError;
use prioritize_core::event::{Event, EventBuilder, SourceType, WatchKey};
use prioritize_core::listener::{Destination, DestinationCategory, EventListener};
use prioritize_core::repository::EventStore;

use crate::dispatch::DispatchTable;

/// Per-listener tally of one delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Listeners whose consumer accepted the event.
    pub delivered: usize,
    /// Listeners whose destination category has no consumer.
    pub unroutable: usize,
    /// Listeners whose consumer returned an error or timed out.
    pub failed: usize,
}

/// What [`EventRegistry::add_event`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Producers of this source type are switched off.
    Suppressed,
    /// No live listener watches the event's key.
    Discarded,
    /// Stored for delivery on the next sweep.
    Deferred {
        /// Listeners matched at the time of storing.
        listeners: usize,
    },
    /// Handed to the consumers of every matched listener.
    Dispatched(DeliveryReport),
}

/// Result of one [`EventRegistry::process_events`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Another sweep was still running; nothing was done.
    pub skipped: bool,
    /// Stored events handed out by the delayed-delivery pass.
    pub delivered_events: usize,
    /// Events removed because their lifetime elapsed.
    pub expired_events: u64,
    /// Listeners removed because their lifetime elapsed.
    pub expired_listeners: u64,
    /// Passes that failed against the store.
    pub errors: usize,
}

/// Matches raised events against registered listeners and delivers them
/// through the dispatch table.
///
/// Each store operation that spans several store calls runs under a single
/// async lock so that a sweep never interleaves with a lookup. Consumers are
/// always called with that lock released.
pub struct EventRegistry {
    settings: EventSettings,
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    dispatch: DispatchTable,
    store_guard: Mutex<()>,
    sweep_guard: Mutex<()>,
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("settings", &self.settings)
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

impl EventRegistry {
    /// Creates a registry over an already populated dispatch table.
    #[must_use]
    pub fn new(
        settings: EventSettings,
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        dispatch: DispatchTable,
    ) -> Self {
        Self {
            settings,
            store,
            clock,
            dispatch,
            store_guard: Mutex::new(()),
            sweep_guard: Mutex::new(()),
        }
    }

    /// Builds the dispatch table from `consumers` and creates the registry.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateConsumer` if two different consumers
    /// claim the same destination category.
    pub fn initialize(
        settings: EventSettings,
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        consumers: impl IntoIterator<Item = (DestinationCategory, Arc<dyn EventConsumer>)>,
    ) -> Result<Self, DomainError> {
        let mut dispatch = DispatchTable::new();
        for (category, consumer) in consumers {
            dispatch.register(category, consumer)?;
        }
        info!(
            strategy = %settings.strategy,
            categories = ?dispatch.categories(),
            "event registry initialized"
        );
        Ok(Self::new(settings, store, clock, dispatch))
    }

    /// The settings this registry was built with.
    #[must_use]
    pub fn settings(&self) -> &EventSettings {
        &self.settings
    }

    /// The active delivery strategy.
    #[must_use]
    pub fn strategy(&self) -> EventStrategy {
        self.settings.strategy
    }

    /// The clock used for event dates and expiry checks.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// The dispatch table.
    #[must_use]
    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    /// Starts building an event for the given source. Finish it with
    /// `builder.build(registry.clock())`.
    #[must_use]
    pub fn event_builder(&self, source_type: SourceType, source_id: i64) -> EventBuilder {
        EventBuilder::new(source_type, source_id)
    }

    /// Registers interest of `destination` in changes of `property_name` on
    /// the given source.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `lifetime_ms` is below
    /// [`NEVER_EXPIRES`](prioritize_core::listener::NEVER_EXPIRES), or the
    /// store's error if the listener cannot be persisted.
    #[instrument(skip(self))]
    pub async fn create_event_listener(
        &self,
        source_type: SourceType,
        source_id: i64,
        destination: Destination,
        property_name: &str,
        lifetime_ms: i64,
        one_shot: bool,
    ) -> Result<EventListener, DomainError> {
        let listener = EventListener::new(
            WatchKey::new(source_type, source_id, property_name),
            destination,
            lifetime_ms,
            one_shot,
            self.clock.now(),
        )?;

        let _guard = self.store_guard.lock().await;
        self.store.insert_listener(&listener).await?;

        info!(listener_id = %listener.id(), key = %listener.key(), "event listener created");
        Ok(listener)
    }

    /// Like [`create_event_listener`](Self::create_event_listener), with the
    /// configured default listener lifetime.
    ///
    /// # Errors
    ///
    /// Same as [`create_event_listener`](Self::create_event_listener).
    pub async fn create_event_listener_with_default_lifetime(
        &self,
        source_type: SourceType,
        source_id: i64,
        destination: Destination,
        property_name: &str,
        one_shot: bool,
    ) -> Result<EventListener, DomainError> {
        self.create_event_listener(
            source_type,
            source_id,
            destination,
            property_name,
            self.settings.listener_default_lifetime_ms,
            one_shot,
        )
        .await
    }

    /// Lists every listener watching the given key, in creation order.
    /// Listeners past their lifetime are included until a sweep removes them.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the lookup fails.
    pub async fn get_event_listeners_registered_for(
        &self,
        source_type: SourceType,
        source_id: i64,
        property_name: &str,
    ) -> Result<Vec<EventListener>, DomainError> {
        let key = WatchKey::new(source_type, source_id, property_name);
        let _guard = self.store_guard.lock().await;
        self.store.find_listeners_by_key(&key).await
    }

    /// Removes a listener. Returns `false` if no listener has `listener_id`.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the removal fails.
    pub async fn remove_event_listener(&self, listener_id: Uuid) -> Result<bool, DomainError> {
        let removed = {
            let _guard = self.store_guard.lock().await;
            self.store.remove_listeners(&[listener_id]).await?
        };
        if removed > 0 {
            info!(%listener_id, "event listener removed");
        } else {
            debug!(%listener_id, "no event listener to remove");
        }
        Ok(removed > 0)
    }

    /// Loads a registered listener.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ListenerNotFound` if no listener has
    /// `listener_id`.
    pub async fn find_event_listener(
        &self,
        listener_id: Uuid,
    ) -> Result<EventListener, DomainError> {
        self.store
            .find_listener(listener_id)
            .await?
            .ok_or(DomainError::ListenerNotFound(listener_id))
    }

    /// Loads a stored event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EventNotFound` if no stored event has
    /// `event_id`.
    pub async fn find_event(&self, event_id: Uuid) -> Result<Event, DomainError> {
        self.store
            .find_event(event_id)
            .await?
            .ok_or(DomainError::EventNotFound(event_id))
    }

    /// Builds an event for a property change and adds it, unless producers
    /// of `source_type` are switched off.
    ///
    /// # Errors
    ///
    /// Same as [`add_event`](Self::add_event).
    pub async fn raise_event(
        &self,
        source_type: SourceType,
        source_id: i64,
        property_name: &str,
        old_value: &str,
        new_value: &str,
        lifetime_ms: i64,
    ) -> Result<DeliveryOutcome, DomainError> {
        if !self.settings.fires_for(source_type) {
            debug!(%source_type, source_id, property_name, "events suppressed for source type");
            return Ok(DeliveryOutcome::Suppressed);
        }
        let event = self
            .event_builder(source_type, source_id)
            .property_name(property_name)
            .old_value(old_value)
            .new_value(new_value)
            .lifetime_ms(lifetime_ms)
            .build(self.clock.as_ref());
        self.add_event(event).await
    }

    /// Like [`raise_event`](Self::raise_event), with the configured default
    /// event lifetime.
    ///
    /// # Errors
    ///
    /// Same as [`add_event`](Self::add_event).
    pub async fn raise_event_with_default_lifetime(
        &self,
        source_type: SourceType,
        source_id: i64,
        property_name: &str,
        old_value: &str,
        new_value: &str,
    ) -> Result<DeliveryOutcome, DomainError> {
        self.raise_event(
            source_type,
            source_id,
            property_name,
            old_value,
            new_value,
            self.settings.event_default_lifetime_ms,
        )
        .await
    }

    /// Matches `event` against the listeners of its key.
    ///
    /// Without a live listener the event is discarded. Otherwise it is
    /// delivered now or stored for the next sweep, depending on the
    /// strategy. Consumer failures are counted in the report, not returned.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the lookup or persistence fails. Nothing
    /// is delivered in that case.
    #[instrument(skip(self, event), fields(event_id = %event.id(), key = %event.key()))]
    pub async fn add_event(&self, event: Event) -> Result<DeliveryOutcome, DomainError> {
        let targets = {
            let _guard = self.store_guard.lock().await;
            let listeners = self.live_listeners(event.key()).await?;
            if listeners.is_empty() {
                debug!("no listener registered, event discarded");
                return Ok(DeliveryOutcome::Discarded);
            }

            match self.settings.strategy {
                EventStrategy::Delayed => {
                    self.store.insert_event(&event, false).await?;
                    debug!(listeners = listeners.len(), "event stored for delayed delivery");
                    return Ok(DeliveryOutcome::Deferred {
                        listeners: listeners.len(),
                    });
                }
                EventStrategy::Immediate => {
                    let stored = event.has_limited_lifetime();
                    if stored {
                        self.store.insert_event(&event, true).await?;
                    }
                    if let Err(err) = self.claim_one_shot(&listeners).await {
                        if stored {
                            self.forget_event(event.id()).await;
                        }
                        return Err(err);
                    }
                    listeners
                }
            }
        };

        let report = self.deliver(&event, &targets).await;
        info!(
            delivered = report.delivered,
            unroutable = report.unroutable,
            failed = report.failed,
            "event dispatched"
        );
        Ok(DeliveryOutcome::Dispatched(report))
    }

    /// Runs one sweep: delivers stored events still pending, then removes
    /// expired events and expired listeners.
    ///
    /// Returns immediately with `skipped` set when another sweep is running.
    /// A failing pass is logged and counted; the remaining passes still run.
    #[instrument(skip(self))]
    pub async fn process_events(&self) -> SweepReport {
        let Ok(_sweep) = self.sweep_guard.try_lock() else {
            debug!("previous sweep still running, skipping");
            return SweepReport {
                skipped: true,
                ..SweepReport::default()
            };
        };

        let mut report = SweepReport::default();

        match self.deliver_pending_events().await {
            Ok(count) => report.delivered_events = count,
            Err(err) => {
                warn!(error = %err, "delayed delivery pass failed");
                report.errors += 1;
            }
        }

        match self.remove_expired_events().await {
            Ok(count) => report.expired_events = count,
            Err(err) => {
                warn!(error = %err, "expired event removal failed");
                report.errors += 1;
            }
        }

        match self.remove_expired_listeners().await {
            Ok(count) => report.expired_listeners = count,
            Err(err) => {
                warn!(error = %err, "expired listener removal failed");
                report.errors += 1;
            }
        }

        debug!(
            delivered_events = report.delivered_events,
            expired_events = report.expired_events,
            expired_listeners = report.expired_listeners,
            errors = report.errors,
            "sweep finished"
        );
        report
    }

    // Caller holds the store guard.
    async fn live_listeners(&self, key: &WatchKey) -> Result<Vec<EventListener>, DomainError> {
        let now = self.clock.now();
        Ok(self
            .store
            .find_listeners_by_key(key)
            .await?
            .into_iter()
            .filter(|listener| !listener.is_expired(now))
            .collect())
    }

    // Unroutable one-shot listeners stay registered.
    fn one_shot_claims(&self, listeners: &[EventListener]) -> Vec<Uuid> {
        listeners
            .iter()
            .filter(|l| l.is_one_shot() && self.dispatch.is_routable(l.destination().category))
            .map(EventListener::id)
            .collect()
    }

    // Caller holds the store guard.
    async fn claim_one_shot(&self, listeners: &[EventListener]) -> Result<(), DomainError> {
        let claimed = self.one_shot_claims(listeners);
        if !claimed.is_empty() {
            self.store.remove_listeners(&claimed).await?;
            debug!(count = claimed.len(), "one-shot listeners claimed");
        }
        Ok(())
    }

    // Caller holds the store guard. Undoes the insert of an event that will
    // not be delivered.
    async fn forget_event(&self, event_id: Uuid) {
        if let Err(err) = self.store.remove_events(&[event_id]).await {
            warn!(%event_id, error = %err, "undelivered event left in store");
        }
    }

    async fn deliver(&self, event: &Event, listeners: &[EventListener]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for listener in listeners {
            let destination = listener.destination();
            let Some(consumer) = self.dispatch.consumer_for(destination.category) else {
                warn!(
                    listener_id = %listener.id(),
                    %destination,
                    "no consumer for destination category, event not routable"
                );
                report.unroutable += 1;
                continue;
            };
            match self.consume(consumer.as_ref(), &destination, event).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(
                        listener_id = %listener.id(),
                        %destination,
                        error = %err,
                        "event delivery failed"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn consume(
        &self,
        consumer: &dyn EventConsumer,
        destination: &Destination,
        event: &Event,
    ) -> Result<(), DomainError> {
        let Some(limit) = self.settings.delivery_timeout() else {
            return consumer.consume_event(destination, event).await;
        };
        tokio::time::timeout(limit, consumer.consume_event(destination, event))
            .await
            .map_err(|_| {
                DomainError::Delivery(format!(
                    "consumer for {destination} timed out after {}ms",
                    limit.as_millis()
                ))
            })?
    }

    // Every lookup happens before the store is touched, so a failing lookup
    // leaves the batch intact for the next sweep. Once one-shot listeners are
    // claimed the batch is delivered even if settling the events fails.
    async fn deliver_pending_events(&self) -> Result<usize, DomainError> {
        let (batch, settled) = {
            let _guard = self.store_guard.lock().await;
            let now = self.clock.now();
            let pending = self.store.find_undelivered_events().await?;

            let mut batch = Vec::with_capacity(pending.len());
            let mut claimed = HashSet::new();
            for event in pending {
                if event.is_expired(now) {
                    continue;
                }
                let listeners: Vec<EventListener> = self
                    .live_listeners(event.key())
                    .await?
                    .into_iter()
                    .filter(|listener| !claimed.contains(&listener.id()))
                    .collect();
                claimed.extend(self.one_shot_claims(&listeners));
                batch.push((event, listeners));
            }
            if batch.is_empty() {
                return Ok(0);
            }

            let claimed: Vec<Uuid> = claimed.into_iter().collect();
            if !claimed.is_empty() {
                self.store.remove_listeners(&claimed).await?;
                debug!(count = claimed.len(), "one-shot listeners claimed");
            }
            let settled = self.settle_delivered(&batch).await;
            (batch, settled)
        };

        for (event, listeners) in &batch {
            let report = self.deliver(event, listeners).await;
            debug!(
                event_id = %event.id(),
                delivered = report.delivered,
                unroutable = report.unroutable,
                failed = report.failed,
                "stored event dispatched"
            );
        }
        settled.map(|()| batch.len())
    }

    // Caller holds the store guard. Events with a lifetime stay until they
    // expire; the rest are spent.
    async fn settle_delivered(
        &self,
        batch: &[(Event, Vec<EventListener>)],
    ) -> Result<(), DomainError> {
        let (kept, spent): (Vec<&Event>, Vec<&Event>) = batch
            .iter()
            .map(|(event, _)| event)
            .partition(|event| event.has_limited_lifetime());
        let kept: Vec<Uuid> = kept.into_iter().map(Event::id).collect();
        let spent: Vec<Uuid> = spent.into_iter().map(Event::id).collect();
        self.store.mark_events_delivered(&kept).await?;
        self.store.remove_events(&spent).await?;
        Ok(())
    }

    async fn remove_expired_events(&self) -> Result<u64, DomainError> {
        let _guard = self.store_guard.lock().await;
        let now = self.clock.now();
        let expired: Vec<Uuid> = self
            .store
            .find_events_with_limited_lifetime()
            .await?
            .iter()
            .filter(|event| event.is_expired(now))
            .map(Event::id)
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }
        let removed = self.store.remove_events(&expired).await?;
        info!(removed, "expired events removed");
        Ok(removed)
    }

    async fn remove_expired_listeners(&self) -> Result<u64, DomainError> {
        let _guard = self.store_guard.lock().await;
        let now = self.clock.now();
        let expired: Vec<Uuid> = self
            .store
            .find_listeners_with_limited_lifetime()
            .await?
            .iter()
            .filter(|listener| listener.is_expired(now))
            .map(EventListener::id)
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }
        let removed = self.store.remove_listeners(&expired).await?;
        info!(removed, "expired event listeners removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use prioritize_core::listener::NEVER_EXPIRES;
    use prioritize_event_store::InMemoryEventStore;
    use prioritize_test_support::{
        FailingConsumer, FailingEventStore, FlakyEventStore, ManualClock, RecordingConsumer,
        SlowConsumer,
    };

    use super::*;

    const USER_7: Destination = Destination {
        category: DestinationCategory::User,
        id: 7,
    };

    struct Harness {
        registry: EventRegistry,
        store: Arc<InMemoryEventStore>,
        clock: Arc<ManualClock>,
        users: Arc<RecordingConsumer>,
    }

    fn harness(settings: EventSettings) -> Harness {
        let store = Arc::new(InMemoryEventStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let users = Arc::new(RecordingConsumer::new());
        let registry = EventRegistry::initialize(
            settings,
            store.clone(),
            clock.clone(),
            [(
                DestinationCategory::User,
                users.clone() as Arc<dyn EventConsumer>,
            )],
        )
        .unwrap();
        Harness {
            registry,
            store,
            clock,
            users,
        }
    }

    fn delayed() -> EventSettings {
        EventSettings {
            strategy: EventStrategy::Delayed,
            ..EventSettings::default()
        }
    }

    async fn watch_task_state(h: &Harness, lifetime_ms: i64, one_shot: bool) -> EventListener {
        h.registry
            .create_event_listener(SourceType::Task, 3, USER_7, "state", lifetime_ms, one_shot)
            .await
            .unwrap()
    }

    async fn raise_task_state(h: &Harness, lifetime_ms: i64) -> DeliveryOutcome {
        h.registry
            .raise_event(SourceType::Task, 3, "state", "open", "done", lifetime_ms)
            .await
            .unwrap()
    }

    // --- listener management ---

    #[tokio::test]
    async fn test_create_event_listener_is_listed_for_its_key() {
        // Arrange
        let h = harness(EventSettings::default());

        // Act
        let listener = watch_task_state(&h, NEVER_EXPIRES, false).await;

        // Assert
        let listed = h
            .registry
            .get_event_listeners_registered_for(SourceType::Task, 3, "state")
            .await
            .unwrap();
        assert_eq!(listed, vec![listener]);
        assert!(
            h.registry
                .get_event_listeners_registered_for(SourceType::Task, 4, "state")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_create_event_listener_rejects_lifetime_below_never_expires() {
        let h = harness(EventSettings::default());

        let result = h
            .registry
            .create_event_listener(SourceType::Task, 3, USER_7, "state", -5, false)
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(h.store.listener_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_event_listener_reports_whether_it_existed() {
        let h = harness(EventSettings::default());
        let listener = watch_task_state(&h, NEVER_EXPIRES, false).await;

        assert!(h.registry.remove_event_listener(listener.id()).await.unwrap());
        assert!(!h.registry.remove_event_listener(listener.id()).await.unwrap());
        assert_eq!(raise_task_state(&h, 0).await, DeliveryOutcome::Discarded);
    }

    #[test]
    fn test_initialize_rejects_conflicting_consumers() {
        let result = EventRegistry::initialize(
            EventSettings::default(),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(ManualClock::new(Utc::now())),
            [
                (
                    DestinationCategory::User,
                    Arc::new(RecordingConsumer::new()) as Arc<dyn EventConsumer>,
                ),
                (
                    DestinationCategory::User,
                    Arc::new(RecordingConsumer::new()) as Arc<dyn EventConsumer>,
                ),
            ],
        );

        assert!(matches!(
            result,
            Err(DomainError::DuplicateConsumer(DestinationCategory::User))
        ));
    }

    // --- matching and immediate delivery ---

    #[tokio::test]
    async fn test_event_without_listener_is_discarded_and_not_stored() {
        let h = harness(EventSettings::default());

        let outcome = raise_task_state(&h, 60_000).await;

        assert_eq!(outcome, DeliveryOutcome::Discarded);
        assert_eq!(h.store.event_count().unwrap(), 0);
        assert_eq!(h.users.count(), 0);
    }

    #[tokio::test]
    async fn test_only_listener_with_exact_key_receives_event() {
        // Arrange
        let h = harness(EventSettings::default());
        watch_task_state(&h, NEVER_EXPIRES, false).await;
        for (source_type, source_id, property) in [
            (SourceType::Task, 4, "state"),
            (SourceType::Task, 3, "title"),
            (SourceType::Document, 3, "state"),
        ] {
            h.registry
                .create_event_listener(
                    source_type,
                    source_id,
                    Destination::new(DestinationCategory::User, 99),
                    property,
                    NEVER_EXPIRES,
                    false,
                )
                .await
                .unwrap();
        }

        // Act
        raise_task_state(&h, 0).await;

        // Assert
        let received = h.users.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, USER_7);
        assert_eq!(received[0].1.property_name(), "state");
        assert_eq!(received[0].1.new_value(), "done");
    }

    #[tokio::test]
    async fn test_immediate_strategy_delivers_before_returning() {
        let h = harness(EventSettings::default());
        watch_task_state(&h, NEVER_EXPIRES, false).await;

        let outcome = raise_task_state(&h, 60_000).await;

        assert_eq!(
            outcome,
            DeliveryOutcome::Dispatched(DeliveryReport {
                delivered: 1,
                unroutable: 0,
                failed: 0,
            })
        );
        assert_eq!(h.users.count(), 1);
    }

    #[tokio::test]
    async fn test_limited_lifetime_event_is_stored_and_can_be_found() {
        let h = harness(EventSettings::default());
        watch_task_state(&h, NEVER_EXPIRES, false).await;

        raise_task_state(&h, 60_000).await;

        let (_, delivered) = h.users.received().remove(0);
        let stored = h.registry.find_event(delivered.id()).await.unwrap();
        assert_eq!(stored, delivered);
    }

    #[tokio::test]
    async fn test_zero_lifetime_event_is_delivered_but_not_stored() {
        let h = harness(EventSettings::default());
        watch_task_state(&h, NEVER_EXPIRES, false).await;

        raise_task_state(&h, 0).await;

        assert_eq!(h.users.count(), 1);
        assert_eq!(h.store.event_count().unwrap(), 0);
        let (_, delivered) = h.users.received().remove(0);
        assert!(matches!(
            h.registry.find_event(delivered.id()).await,
            Err(DomainError::EventNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_suppressed_source_type_raises_nothing() {
        let h = harness(EventSettings {
            fire_task_events: false,
            ..EventSettings::default()
        });
        watch_task_state(&h, NEVER_EXPIRES, false).await;

        let outcome = raise_task_state(&h, 60_000).await;

        assert_eq!(outcome, DeliveryOutcome::Suppressed);
        assert_eq!(h.users.count(), 0);
        assert_eq!(h.store.event_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_event_delivers_a_prebuilt_event() {
        let h = harness(EventSettings::default());
        watch_task_state(&h, NEVER_EXPIRES, false).await;
        let event = h
            .registry
            .event_builder(SourceType::Task, 3)
            .property_name("state")
            .new_value("blocked")
            .build(h.registry.clock());

        h.registry.add_event(event.clone()).await.unwrap();

        assert_eq!(h.users.received()[0].1, event);
    }

    // --- one-shot listeners ---

    #[tokio::test]
    async fn test_one_shot_listener_fires_once() {
        let h = harness(EventSettings::default());
        watch_task_state(&h, NEVER_EXPIRES, true).await;

        raise_task_state(&h, 0).await;
        let second = raise_task_state(&h, 0).await;

        assert_eq!(h.users.count(), 1);
        assert_eq!(second, DeliveryOutcome::Discarded);
        assert_eq!(h.store.listener_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unroutable_one_shot_listener_stays_registered() {
        let h = harness(EventSettings::default());
        h.registry
            .create_event_listener(
                SourceType::Task,
                3,
                Destination::new(DestinationCategory::Department, 2),
                "state",
                NEVER_EXPIRES,
                true,
            )
            .await
            .unwrap();

        let outcome = raise_task_state(&h, 0).await;

        assert_eq!(
            outcome,
            DeliveryOutcome::Dispatched(DeliveryReport {
                delivered: 0,
                unroutable: 1,
                failed: 0,
            })
        );
        assert_eq!(h.store.listener_count().unwrap(), 1);
    }

    // --- failure isolation ---

    #[tokio::test]
    async fn test_failing_consumer_does_not_block_other_destinations() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let documents = Arc::new(RecordingConsumer::new());
        let registry = EventRegistry::initialize(
            EventSettings::default(),
            store,
            Arc::new(ManualClock::new(Utc::now())),
            [
                (
                    DestinationCategory::User,
                    Arc::new(FailingConsumer) as Arc<dyn EventConsumer>,
                ),
                (
                    DestinationCategory::Document,
                    documents.clone() as Arc<dyn EventConsumer>,
                ),
            ],
        )
        .unwrap();
        for destination in [USER_7, Destination::new(DestinationCategory::Document, 12)] {
            registry
                .create_event_listener(SourceType::Task, 3, destination, "state", NEVER_EXPIRES, false)
                .await
                .unwrap();
        }

        // Act
        let outcome = registry
            .raise_event(SourceType::Task, 3, "state", "open", "done", 0)
            .await
            .unwrap();

        // Assert
        assert_eq!(
            outcome,
            DeliveryOutcome::Dispatched(DeliveryReport {
                delivered: 1,
                unroutable: 0,
                failed: 1,
            })
        );
        assert_eq!(documents.count(), 1);
    }

    #[tokio::test]
    async fn test_slow_consumer_is_cut_off_by_delivery_timeout() {
        let registry = EventRegistry::initialize(
            EventSettings {
                delivery_timeout_ms: 20,
                ..EventSettings::default()
            },
            Arc::new(InMemoryEventStore::new()),
            Arc::new(ManualClock::new(Utc::now())),
            [(
                DestinationCategory::User,
                Arc::new(SlowConsumer(Duration::from_secs(5))) as Arc<dyn EventConsumer>,
            )],
        )
        .unwrap();
        registry
            .create_event_listener(SourceType::Task, 3, USER_7, "state", NEVER_EXPIRES, false)
            .await
            .unwrap();

        let outcome = registry
            .raise_event(SourceType::Task, 3, "state", "open", "done", 0)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DeliveryOutcome::Dispatched(DeliveryReport {
                delivered: 0,
                unroutable: 0,
                failed: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_returned_from_raise_event() {
        let registry = EventRegistry::initialize(
            EventSettings::default(),
            Arc::new(FailingEventStore),
            Arc::new(ManualClock::new(Utc::now())),
            [],
        )
        .unwrap();

        let result = registry
            .raise_event(SourceType::Task, 3, "state", "open", "done", 0)
            .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    // --- expiry sweep ---

    #[tokio::test]
    async fn test_sweep_removes_event_once_its_lifetime_elapses() {
        // Arrange
        let h = harness(EventSettings::default());
        watch_task_state(&h, NEVER_EXPIRES, false).await;
        raise_task_state(&h, 100).await;
        let (_, event) = h.users.received().remove(0);

        // Act
        h.clock.advance_ms(50);
        let early = h.registry.process_events().await;
        h.clock.advance_ms(100);
        let late = h.registry.process_events().await;

        // Assert
        assert_eq!(early.expired_events, 0);
        assert_eq!(late.expired_events, 1);
        assert!(matches!(
            h.registry.find_event(event.id()).await,
            Err(DomainError::EventNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_listener_receives_nothing_and_is_swept() {
        let h = harness(EventSettings::default());
        let listener = watch_task_state(&h, 50, false).await;

        h.clock.advance_ms(60);
        let outcome = raise_task_state(&h, 0).await;

        assert_eq!(outcome, DeliveryOutcome::Discarded);
        assert_eq!(h.users.count(), 0);
        assert_eq!(
            h.registry
                .get_event_listeners_registered_for(SourceType::Task, 3, "state")
                .await
                .unwrap(),
            vec![listener]
        );

        let report = h.registry.process_events().await;

        assert_eq!(report.expired_listeners, 1);
        assert!(
            h.registry
                .get_event_listeners_registered_for(SourceType::Task, 3, "state")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_never_expiring_listener_survives_sweeps() {
        let h = harness(EventSettings::default());
        watch_task_state(&h, NEVER_EXPIRES, false).await;

        h.clock.advance_ms(86_400_000);
        let report = h.registry.process_events().await;

        assert_eq!(report.expired_listeners, 0);
        assert_eq!(h.store.listener_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_going_when_the_store_fails() {
        let registry = EventRegistry::initialize(
            EventSettings::default(),
            Arc::new(FailingEventStore),
            Arc::new(ManualClock::new(Utc::now())),
            [],
        )
        .unwrap();

        let report = registry.process_events().await;

        assert!(!report.skipped);
        assert_eq!(report.errors, 3);
    }

    #[tokio::test]
    async fn test_overlapping_sweep_is_skipped() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let registry = EventRegistry::initialize(
            delayed(),
            store,
            Arc::new(ManualClock::new(Utc::now())),
            [(
                DestinationCategory::User,
                Arc::new(SlowConsumer(Duration::from_millis(100))) as Arc<dyn EventConsumer>,
            )],
        )
        .unwrap();
        registry
            .create_event_listener(SourceType::Task, 3, USER_7, "state", NEVER_EXPIRES, false)
            .await
            .unwrap();
        registry
            .raise_event(SourceType::Task, 3, "state", "open", "done", 0)
            .await
            .unwrap();

        // Act
        let (first, second) = tokio::join!(registry.process_events(), registry.process_events());

        // Assert
        assert!(!first.skipped);
        assert_eq!(first.delivered_events, 1);
        assert!(second.skipped);
    }

    // --- delayed strategy ---

    #[tokio::test]
    async fn test_delayed_strategy_defers_delivery_to_the_sweep() {
        // Arrange
        let h = harness(delayed());
        watch_task_state(&h, NEVER_EXPIRES, false).await;

        // Act
        let outcome = raise_task_state(&h, 60_000).await;
        let before_sweep = h.users.count();
        let report = h.registry.process_events().await;

        // Assert
        assert_eq!(outcome, DeliveryOutcome::Deferred { listeners: 1 });
        assert_eq!(before_sweep, 0);
        assert_eq!(report.delivered_events, 1);
        assert_eq!(h.users.count(), 1);
        assert_eq!(h.store.event_count().unwrap(), 1);

        let again = h.registry.process_events().await;
        assert_eq!(again.delivered_events, 0);
        assert_eq!(h.users.count(), 1);
    }

    #[tokio::test]
    async fn test_delayed_zero_lifetime_event_is_removed_after_delivery() {
        let h = harness(delayed());
        watch_task_state(&h, NEVER_EXPIRES, true).await;

        raise_task_state(&h, 0).await;
        assert_eq!(h.store.event_count().unwrap(), 1);

        h.registry.process_events().await;

        assert_eq!(h.users.count(), 1);
        assert_eq!(h.store.event_count().unwrap(), 0);
        assert_eq!(h.store.listener_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delayed_event_expired_before_sweep_is_not_delivered() {
        let h = harness(delayed());
        watch_task_state(&h, NEVER_EXPIRES, false).await;
        raise_task_state(&h, 100).await;

        h.clock.advance_ms(200);
        let report = h.registry.process_events().await;

        assert_eq!(report.delivered_events, 0);
        assert_eq!(report.expired_events, 1);
        assert_eq!(h.users.count(), 0);
    }

    // --- store outages mid-operation ---

    struct FlakyHarness {
        registry: EventRegistry,
        inner: Arc<InMemoryEventStore>,
        store: Arc<FlakyEventStore>,
        users: Arc<RecordingConsumer>,
    }

    fn flaky_harness(settings: EventSettings) -> FlakyHarness {
        let inner = Arc::new(InMemoryEventStore::new());
        let store = Arc::new(FlakyEventStore::new(inner.clone()));
        let users = Arc::new(RecordingConsumer::new());
        let registry = EventRegistry::initialize(
            settings,
            store.clone(),
            Arc::new(ManualClock::new(Utc::now())),
            [(
                DestinationCategory::User,
                users.clone() as Arc<dyn EventConsumer>,
            )],
        )
        .unwrap();
        FlakyHarness {
            registry,
            inner,
            store,
            users,
        }
    }

    async fn watch_and_raise_task(h: &FlakyHarness, task_id: i64, one_shot: bool) {
        h.registry
            .create_event_listener(
                SourceType::Task,
                task_id,
                USER_7,
                "state",
                NEVER_EXPIRES,
                one_shot,
            )
            .await
            .unwrap();
        h.registry
            .raise_event(SourceType::Task, task_id, "state", "open", "done", 60_000)
            .await
            .unwrap();
    }

    fn notified_tasks(users: &RecordingConsumer) -> Vec<i64> {
        let mut ids: Vec<i64> = users
            .received()
            .iter()
            .map(|(_, event)| event.source_id())
            .collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn test_lookup_failure_mid_sweep_keeps_one_shot_listener_for_next_sweep() {
        // Arrange
        let h = flaky_harness(delayed());
        watch_and_raise_task(&h, 1, true).await;
        watch_and_raise_task(&h, 2, false).await;
        h.store.fail_lookups_after(1);

        // Act
        let failed = h.registry.process_events().await;
        let listeners_after_failure = h.inner.listener_count().unwrap();
        h.store.recover();
        let retried = h.registry.process_events().await;

        // Assert
        assert_eq!(failed.errors, 1);
        assert_eq!(failed.delivered_events, 0);
        assert_eq!(listeners_after_failure, 2);
        assert_eq!(retried.errors, 0);
        assert_eq!(retried.delivered_events, 2);
        assert_eq!(notified_tasks(&h.users), vec![1, 2]);
        assert_eq!(h.inner.listener_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claim_failure_in_sweep_delivers_nothing_until_retry() {
        let h = flaky_harness(delayed());
        watch_and_raise_task(&h, 1, true).await;
        watch_and_raise_task(&h, 2, false).await;
        h.store.fail_listener_removals();

        let failed = h.registry.process_events().await;
        assert_eq!(failed.errors, 1);
        assert_eq!(h.users.count(), 0);

        h.store.recover();
        let retried = h.registry.process_events().await;

        assert_eq!(retried.delivered_events, 2);
        assert_eq!(notified_tasks(&h.users), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_one_shot_listener_matching_two_stored_events_fires_once() {
        let h = flaky_harness(delayed());
        watch_and_raise_task(&h, 1, true).await;
        h.registry
            .raise_event(SourceType::Task, 1, "state", "done", "reopened", 60_000)
            .await
            .unwrap();

        let report = h.registry.process_events().await;

        assert_eq!(report.delivered_events, 2);
        assert_eq!(h.users.count(), 1);
        assert_eq!(h.inner.listener_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_claim_failure_on_raise_leaves_no_event_behind() {
        // Arrange
        let h = flaky_harness(EventSettings::default());
        h.registry
            .create_event_listener(SourceType::Task, 3, USER_7, "state", NEVER_EXPIRES, true)
            .await
            .unwrap();
        h.store.fail_listener_removals();

        // Act
        let result = h
            .registry
            .raise_event(SourceType::Task, 3, "state", "open", "done", 60_000)
            .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert_eq!(h.users.count(), 0);
        assert_eq!(h.inner.event_count().unwrap(), 0);
        assert_eq!(h.inner.listener_count().unwrap(), 1);

        h.store.recover();
        let outcome = h
            .registry
            .raise_event(SourceType::Task, 3, "state", "open", "done", 60_000)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            DeliveryOutcome::Dispatched(DeliveryReport { delivered: 1, .. })
        ));
    }

    // --- routing and defaults ---

    #[tokio::test]
    async fn test_unroutable_listener_does_not_block_routable_one_on_same_key() {
        // Arrange
        let h = harness(EventSettings::default());
        h.registry
            .create_event_listener(
                SourceType::Task,
                3,
                Destination::new(DestinationCategory::Department, 2),
                "state",
                NEVER_EXPIRES,
                false,
            )
            .await
            .unwrap();
        watch_task_state(&h, NEVER_EXPIRES, false).await;

        // Act
        let outcome = raise_task_state(&h, 0).await;

        // Assert
        assert_eq!(
            outcome,
            DeliveryOutcome::Dispatched(DeliveryReport {
                delivered: 1,
                unroutable: 1,
                failed: 0,
            })
        );
        let received = h.users.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, USER_7);
    }

    #[tokio::test]
    async fn test_default_lifetimes_come_from_settings() {
        // Arrange
        let h = harness(EventSettings {
            event_default_lifetime_ms: 5_000,
            listener_default_lifetime_ms: 30_000,
            ..EventSettings::default()
        });

        // Act
        let listener = h
            .registry
            .create_event_listener_with_default_lifetime(
                SourceType::Task,
                3,
                USER_7,
                "state",
                false,
            )
            .await
            .unwrap();
        let outcome = h
            .registry
            .raise_event_with_default_lifetime(SourceType::Task, 3, "state", "open", "done")
            .await
            .unwrap();

        // Assert
        assert_eq!(listener.lifetime_ms(), 30_000);
        assert!(matches!(outcome, DeliveryOutcome::Dispatched(_)));
        let stored = h.store.find_events_with_limited_lifetime().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].lifetime_ms(), 5_000);
    }

    #[tokio::test]
    async fn test_find_event_listener() {
        let h = harness(EventSettings::default());
        let listener = watch_task_state(&h, NEVER_EXPIRES, false).await;

        let found = h.registry.find_event_listener(listener.id()).await.unwrap();
        let missing = h.registry.find_event_listener(Uuid::new_v4()).await;

        assert_eq!(found, listener);
        assert!(matches!(missing, Err(DomainError::ListenerNotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_delivery_still_uses_up_one_shot_listener() {
        let store = Arc::new(InMemoryEventStore::new());
        let registry = EventRegistry::initialize(
            EventSettings::default(),
            store.clone(),
            Arc::new(ManualClock::new(Utc::now())),
            [(
                DestinationCategory::User,
                Arc::new(FailingConsumer) as Arc<dyn EventConsumer>,
            )],
        )
        .unwrap();
        registry
            .create_event_listener(SourceType::Task, 3, USER_7, "state", NEVER_EXPIRES, true)
            .await
            .unwrap();

        let outcome = registry
            .raise_event(SourceType::Task, 3, "state", "open", "done", 0)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DeliveryOutcome::Dispatched(DeliveryReport {
                delivered: 0,
                unroutable: 0,
                failed: 1,
            })
        );
        assert_eq!(store.listener_count().unwrap(), 0);
    }
}
