use crate::audit::{AuditRepository, AuditTrail};
use crate::channels::{ChannelRepository, ad_hoc_labels, channel_description, channel_name};
use crate::checkins::CheckInRepository;
use crate::collaborators::{ChannelHost, TripSheetDirectory};
use crate::config::EngineConfig;
use crate::error::{
    ChannelError, CheckInError, EngineError, LocationError, NotificationError, StoreError,
    ZoneError,
};
use crate::evaluator;
use crate::events::EventRepository;
use crate::idempotency::{channel_key, check_in_key, time_bucket};
use crate::locations::{LocationRepository, transition_kind};
use crate::locks::KeyedLocks;
use crate::notifications::{self, NotificationQuery, NotificationRepository};
use crate::store::{Store, StoreProvider};
use crate::types::{
    AuditAction, AuditEntry, AuditFilter, Channel, ChannelId, ChannelRequest, ChannelSpec,
    CheckInAttempt, CheckInEvent, CheckInId, DwellSample, EventBody, GeofenceZone, HostedChannel,
    LegType, LocationSample, LocationUpdate, LocationUpdateResult, NearbyZone, NearbyZonesQuery,
    Notification, NotificationFilter, NotificationId, RegisterZoneInput, SubjectKind, SubjectRef,
    TransitionFilter, TransitionId, TripSheet, ZoneId, ZoneReading, ZoneTransition,
};
use crate::zones::ZoneRepository;
use chrono::{DateTime, SubsecRound, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wp_events::bus::EventBus;
use wp_events::types::{BROADCAST_TOPIC, EventRecord, EventSource, SYSTEM_TOPIC};

const DEFAULT_NEARBY_RADIUS_KM: f64 = 10.0;

/// Wall clock at the precision timestamps are stored with, so a value handed
/// back to the caller equals the one later read from storage.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub source: EventSource,
    pub correlation_id: Option<String>,
    /// Identity supplied by the authentication layer, recorded on audit entries.
    pub actor: String,
}

impl RequestContext {
    pub fn new(source: EventSource, correlation_id: Option<String>, actor: impl Into<String>) -> Self {
        Self {
            source,
            correlation_id,
            actor: actor.into(),
        }
    }

    pub fn system(actor: impl Into<String>) -> Self {
        Self::new(EventSource::System, None, actor)
    }
}

/// A live message addressed to one topic, appended to the event log inside the
/// same transaction as the state change it describes.
struct Outbound {
    topic: String,
    body: EventBody,
}

impl Outbound {
    fn new(topic: &str, body: EventBody) -> Self {
        Self {
            topic: topic.to_string(),
            body,
        }
    }
}

pub struct Engine<P: StoreProvider> {
    provider: P,
    event_bus: EventBus,
    trips: Arc<dyn TripSheetDirectory>,
    channel_host: Arc<dyn ChannelHost>,
    channel_locks: KeyedLocks,
    audit: AuditTrail,
    config: EngineConfig,
}

impl<P: StoreProvider> Engine<P> {
    pub fn new(
        provider: P,
        event_bus: EventBus,
        trips: Arc<dyn TripSheetDirectory>,
        channel_host: Arc<dyn ChannelHost>,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            event_bus,
            trips,
            channel_host,
            channel_locks: KeyedLocks::new(),
            audit: AuditTrail::new(),
            config,
        }
    }

    pub fn zones(&self) -> ZonesApi<'_, P> {
        ZonesApi { core: self }
    }

    pub fn check_ins(&self) -> CheckInsApi<'_, P> {
        CheckInsApi { core: self }
    }

    pub fn locations(&self) -> LocationsApi<'_, P> {
        LocationsApi { core: self }
    }

    pub fn notifications(&self) -> NotificationsApi<'_, P> {
        NotificationsApi { core: self }
    }

    pub fn channels(&self) -> ChannelsApi<'_, P> {
        ChannelsApi { core: self }
    }

    pub fn audit(&self) -> AuditApi<'_, P> {
        AuditApi { core: self }
    }

    pub fn events(&self) -> EventsApi<'_, P> {
        EventsApi { core: self }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn audit_alert_count(&self) -> u64 {
        self.audit.alert_count()
    }

    fn with_store<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&P::Store) -> Result<T, EngineError>,
    {
        let store = self.provider.open()?;
        f(&store)
    }

    /// Runs `f` in one transaction together with the event-log appends for the
    /// messages it returns, then publishes them once the commit succeeded.
    fn with_events<T, F>(&self, ctx: &RequestContext, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&P::Store) -> Result<(T, Vec<Outbound>), EngineError>,
    {
        let store = self.provider.open()?;
        let (value, records) = store.with_tx(|store| {
            let (value, outbound) = f(store)?;
            let mut records = Vec::with_capacity(outbound.len());
            for Outbound { topic, body } in outbound {
                let record = build_event_record(ctx, topic, body)?;
                records.push(store.events().append(record)?);
            }
            Ok((value, records))
        })?;
        drop(store);
        for record in records {
            self.event_bus.publish(record);
        }
        Ok(value)
    }

    fn record_audit(
        &self,
        ctx: &RequestContext,
        action: AuditAction,
        subject: SubjectRef,
        detail: Value,
    ) {
        self.audit.record(
            |entry| {
                let store = self.provider.open()?;
                store.audit().append(entry)
            },
            &ctx.actor,
            action,
            subject,
            detail,
        );
    }

    async fn lookup_trip(&self, trip_id: &str) -> Result<TripSheet, EngineError> {
        let timeout = self.config.upstream_timeout();
        match tokio::time::timeout(timeout, self.trips.lookup(trip_id)).await {
            Err(_) => {
                warn!(trip_id, timeout_ms = self.config.upstream_timeout_ms, "trip-sheet lookup timed out");
                Err(EngineError::UpstreamUnavailable {
                    collaborator: "trip-sheet directory",
                    reason: format!("no response within {}ms", self.config.upstream_timeout_ms),
                })
            }
            Ok(Err(err)) => {
                warn!(trip_id, error = %err, "trip-sheet lookup failed");
                Err(EngineError::UpstreamUnavailable {
                    collaborator: "trip-sheet directory",
                    reason: err.message,
                })
            }
            Ok(Ok(None)) => Err(CheckInError::TripNotFound {
                trip_id: trip_id.to_string(),
            }
            .into()),
            Ok(Ok(Some(sheet))) => Ok(sheet),
        }
    }

    async fn host_channel(&self, spec: &ChannelSpec) -> Result<HostedChannel, EngineError> {
        let timeout = self.config.upstream_timeout();
        match tokio::time::timeout(timeout, self.channel_host.create_channel(spec)).await {
            Err(_) => {
                warn!(key = %spec.idempotency_key, "channel host timed out");
                Err(EngineError::UpstreamUnavailable {
                    collaborator: "channel host",
                    reason: format!("no response within {}ms", self.config.upstream_timeout_ms),
                })
            }
            Ok(Err(err)) => {
                warn!(key = %spec.idempotency_key, error = %err, "channel host failed");
                Err(EngineError::UpstreamUnavailable {
                    collaborator: "channel host",
                    reason: err.message,
                })
            }
            Ok(Ok(hosted)) => Ok(hosted),
        }
    }

    fn fan_out(&self, notification: &Notification) -> Vec<Outbound> {
        notification
            .recipient_groups
            .iter()
            .map(|group| Outbound::new(group, EventBody::CheckinRequested(notification.clone())))
            .collect()
    }
}

pub struct ZonesApi<'a, P: StoreProvider> {
    core: &'a Engine<P>,
}

impl<P: StoreProvider> ZonesApi<'_, P> {
    pub fn register(
        &self,
        ctx: &RequestContext,
        input: RegisterZoneInput,
    ) -> Result<GeofenceZone, EngineError> {
        input.validate(self.core.config.max_zone_radius_meters)?;
        evaluator::validate_shape(&input.shape)?;
        let zone = GeofenceZone {
            id: ZoneId::generate(),
            trip_id: input.trip_id.trim().to_string(),
            leg: input.leg,
            name: input.name.trim().to_string(),
            center: input.center,
            shape: input.shape,
            required_dwell_seconds: input.required_dwell_seconds,
            created_at: now(),
        };

        let zone = self.core.with_events(ctx, |store| {
            store.zones().insert(&zone).map_err(|err| match err {
                StoreError::UniqueViolation { .. } => EngineError::from(ZoneError::AlreadyRegistered {
                    trip_id: zone.trip_id.clone(),
                    leg: zone.leg,
                }),
                other => other.into(),
            })?;
            let events = vec![Outbound::new(
                SYSTEM_TOPIC,
                EventBody::ZoneRegistered { zone: zone.clone() },
            )];
            Ok((zone.clone(), events))
        })?;

        info!(zone_id = %zone.id, trip_id = %zone.trip_id, leg = %zone.leg, "zone registered");
        self.core.record_audit(
            ctx,
            AuditAction::ZoneRegistered,
            SubjectRef::new(SubjectKind::Zone, zone.id.as_str()),
            json!({ "trip_id": zone.trip_id, "leg": zone.leg, "shape": zone.shape }),
        );
        Ok(zone)
    }

    pub fn get(&self, id: &ZoneId) -> Result<GeofenceZone, EngineError> {
        self.core
            .with_store(|store| Ok(store.zones().get(id)?))?
            .ok_or_else(|| ZoneError::NotFound.into())
    }

    pub fn list(&self, trip_id: Option<&str>) -> Result<Vec<GeofenceZone>, EngineError> {
        self.core.with_store(|store| Ok(store.zones().list(trip_id)?))
    }

    pub fn zone_for(&self, trip_id: &str, leg: LegType) -> Result<Option<GeofenceZone>, EngineError> {
        self.core
            .with_store(|store| Ok(store.zones().for_leg(trip_id, leg)?))
    }

    /// Zones within `radius_km` of a position, nearest first.
    pub fn nearby(&self, query: &NearbyZonesQuery) -> Result<Vec<NearbyZone>, EngineError> {
        let position = crate::types::Coordinate::new(query.latitude, query.longitude);
        if !position.is_valid() {
            return Err(ZoneError::InvalidInput {
                message: "position is not a valid coordinate".to_string(),
            }
            .into());
        }
        let radius_km = query.radius_km.unwrap_or(DEFAULT_NEARBY_RADIUS_KM);
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(ZoneError::InvalidInput {
                message: format!("radius_km must be positive, got {radius_km}"),
            }
            .into());
        }

        let mut nearby = Vec::new();
        for zone in self.list(None)? {
            let placement = evaluator::place(&zone, position)?;
            if placement.distance_meters <= radius_km * 1000.0 {
                nearby.push(NearbyZone {
                    zone,
                    distance_meters: placement.distance_meters,
                    inside: placement.inside,
                });
            }
        }
        nearby.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
        Ok(nearby)
    }
}

pub struct CheckInsApi<'a, P: StoreProvider> {
    core: &'a Engine<P>,
}

impl<P: StoreProvider> CheckInsApi<'_, P> {
    /// Turns an attempt into at most one durable event per idempotency key.
    /// Replays of an accepted key return the stored event untouched.
    #[tracing::instrument(skip_all, fields(trip_id = %attempt.trip_id, leg = %attempt.leg))]
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        mut attempt: CheckInAttempt,
    ) -> Result<CheckInEvent, EngineError> {
        let config = &self.core.config;
        attempt.trip_id = attempt.trip_id.trim().to_string();
        if attempt.trip_id.is_empty() {
            return Err(CheckInError::InvalidRequest {
                message: "trip_id is required".to_string(),
            }
            .into());
        }
        if !attempt.position.is_valid() {
            return Err(CheckInError::InvalidRequest {
                message: "position must have latitude in [-90, 90] and longitude in [-180, 180]"
                    .to_string(),
            }
            .into());
        }

        let zone = self
            .core
            .zones()
            .zone_for(&attempt.trip_id, attempt.leg)?
            .ok_or(ZoneError::NotFound)?;
        let bucket = time_bucket(attempt.timestamp, config.check_in_bucket_secs);
        let key = check_in_key(&attempt.trip_id, attempt.leg, &zone.id, bucket);

        if let Some(existing) = self
            .core
            .with_store(|store| Ok(store.check_ins().get_by_key(&key)?))?
        {
            debug!(idempotency_key = %key, check_in_id = %existing.id, "check-in replayed");
            return Ok(existing);
        }

        let override_reason = attempt.override_reason().map(str::to_string);
        check_accuracy(config, attempt.accuracy_meters, override_reason.is_some())?;

        let history = self.dwell_history(&zone, &attempt)?;
        let fix = DwellSample {
            at: attempt.timestamp,
            position: attempt.position,
        };
        let evaluation = evaluator::evaluate(&zone, fix, &history, config.dwell_max_gap())?;
        let radius_meters = zone.shape.effective_radius_meters();
        if override_reason.is_none() {
            if !evaluation.inside {
                return Err(CheckInError::outside(evaluation.distance_meters, radius_meters).into());
            }
            if !evaluation.dwell_satisfied {
                return Err(CheckInError::DwellNotSatisfied {
                    dwelled_seconds: evaluation.dwelled_seconds,
                    required_seconds: zone.required_dwell_seconds,
                }
                .into());
            }
        }

        let sheet = self.core.lookup_trip(&attempt.trip_id).await?;
        let now = now();
        let event = CheckInEvent {
            id: CheckInId::generate(),
            idempotency_key: key.clone(),
            trip_id: attempt.trip_id.clone(),
            leg: attempt.leg,
            zone_id: zone.id.clone(),
            driver_id: attempt.driver_id.clone(),
            position: attempt.position,
            accuracy_meters: attempt.accuracy_meters,
            distance_meters: evaluation.distance_meters,
            radius_meters,
            is_override: override_reason.is_some(),
            override_reason,
            bucket,
            recorded_at: attempt.timestamp.trunc_subsecs(6),
            created_at: now,
        };
        let notification =
            notifications::compose(&event, &sheet, &config.recipient_groups, now);

        let result = self.core.with_events(ctx, |store| {
            store.check_ins().insert(&event).map_err(|err| match err {
                StoreError::UniqueViolation { .. } => EngineError::from(CheckInError::DuplicateEvent {
                    idempotency_key: event.idempotency_key.clone(),
                }),
                other => other.into(),
            })?;
            store.notifications().insert(&notification)?;
            let mut events = vec![Outbound::new(
                SYSTEM_TOPIC,
                EventBody::CheckInCreated {
                    event: event.clone(),
                },
            )];
            events.extend(self.core.fan_out(&notification));
            Ok((event.clone(), events))
        });

        let event = match result {
            Ok(event) => event,
            Err(EngineError::CheckIn(CheckInError::DuplicateEvent { idempotency_key })) => {
                debug!(idempotency_key = %idempotency_key, "lost check-in insert race");
                return self
                    .core
                    .with_store(|store| Ok(store.check_ins().get_by_key(&idempotency_key)?))?
                    .ok_or_else(|| EngineError::Internal {
                        message: format!("check-in {idempotency_key} vanished after conflict"),
                    });
            }
            Err(err) => return Err(err),
        };

        info!(
            check_in_id = %event.id,
            idempotency_key = %event.idempotency_key,
            distance_meters = event.distance_meters,
            is_override = event.is_override,
            "check-in created"
        );
        let subject = SubjectRef::new(SubjectKind::CheckIn, event.id.as_str());
        self.core.record_audit(
            ctx,
            AuditAction::CheckInCreated,
            subject.clone(),
            json!({
                "trip_id": event.trip_id,
                "leg": event.leg,
                "zone_id": event.zone_id,
                "idempotency_key": event.idempotency_key,
                "distance_meters": event.distance_meters,
                "notification_id": notification.id,
            }),
        );
        if let Some(reason) = &event.override_reason {
            warn!(check_in_id = %event.id, reason = %reason, "check-in override used");
            self.core.record_audit(
                ctx,
                AuditAction::OverrideUsed,
                subject,
                json!({
                    "reason": reason,
                    "distance_meters": event.distance_meters,
                    "radius_meters": event.radius_meters,
                    "inside": evaluation.inside,
                }),
            );
        }
        Ok(event)
    }

    pub fn get(&self, id: &CheckInId) -> Result<CheckInEvent, EngineError> {
        self.core
            .with_store(|store| Ok(store.check_ins().get(id)?))?
            .ok_or_else(|| CheckInError::NotFound.into())
    }

    /// Tracked fixes for the attempting driver that can still reach back to
    /// the attempt. Without a driver there is no history to draw on.
    fn dwell_history(
        &self,
        zone: &GeofenceZone,
        attempt: &CheckInAttempt,
    ) -> Result<Vec<DwellSample>, EngineError> {
        let Some(driver_id) = attempt.driver_id.as_deref() else {
            return Ok(Vec::new());
        };
        if zone.required_dwell_seconds == 0 {
            return Ok(Vec::new());
        }
        let reach = chrono::Duration::seconds(i64::from(zone.required_dwell_seconds))
            + self.core.config.dwell_max_gap();
        let samples = self.core.locations().history(
            driver_id,
            &zone.id,
            attempt.timestamp - reach,
            attempt.timestamp,
        )?;
        Ok(samples.iter().map(LocationSample::as_dwell).collect())
    }

    pub fn list(&self, trip_id: Option<&str>) -> Result<Vec<CheckInEvent>, EngineError> {
        self.core.with_store(|store| Ok(store.check_ins().list(trip_id)?))
    }
}

fn check_accuracy(
    config: &EngineConfig,
    accuracy_meters: Option<f64>,
    overridden: bool,
) -> Result<(), CheckInError> {
    let Some(accuracy) = accuracy_meters else {
        return Ok(());
    };
    if !accuracy.is_finite() || accuracy < 0.0 {
        return Err(CheckInError::InvalidRequest {
            message: format!("accuracy_meters must be non-negative, got {accuracy}"),
        });
    }
    match config.max_accuracy_meters {
        Some(max) if accuracy > max && !overridden => Err(CheckInError::InvalidRequest {
            message: format!(
                "GPS accuracy too low: {accuracy:.0}m (need better than {max:.0}m); wait for a better fix or supply an override reason"
            ),
        }),
        _ => Ok(()),
    }
}

pub struct LocationsApi<'a, P: StoreProvider> {
    core: &'a Engine<P>,
}

impl<P: StoreProvider> LocationsApi<'_, P> {
    /// Stores the fix against every zone of the trip and records a transition
    /// wherever the driver crossed a boundary since their previous fix.
    #[tracing::instrument(skip_all, fields(driver_id = %update.driver_id, trip_id = %update.trip_id))]
    pub fn record(
        &self,
        ctx: &RequestContext,
        update: LocationUpdate,
    ) -> Result<LocationUpdateResult, EngineError> {
        let driver_id = update.driver_id.trim().to_string();
        let trip_id = update.trip_id.trim().to_string();
        if driver_id.is_empty() || trip_id.is_empty() {
            return Err(LocationError::InvalidRequest {
                message: "driver_id and trip_id are required".to_string(),
            }
            .into());
        }
        if !update.position.is_valid() {
            return Err(LocationError::InvalidRequest {
                message: "position must have latitude in [-90, 90] and longitude in [-180, 180]"
                    .to_string(),
            }
            .into());
        }
        if let Some(accuracy) = update.accuracy_meters {
            let too_coarse = self
                .core
                .config
                .max_accuracy_meters
                .is_some_and(|max| accuracy > max);
            if !accuracy.is_finite() || accuracy < 0.0 || too_coarse {
                return Err(LocationError::InvalidRequest {
                    message: format!("fix accuracy {accuracy}m is not usable for tracking"),
                }
                .into());
            }
        }

        let zones = self.core.zones().list(Some(&trip_id))?;
        let at = update.at.trunc_subsecs(6);
        let readings = self.core.with_events(ctx, |store| {
            let locations = store.locations();
            let mut readings = Vec::with_capacity(zones.len());
            let mut outbound = Vec::new();
            for zone in &zones {
                let placement = evaluator::place(zone, update.position)?;
                let previous = locations.last_sample(&driver_id, &zone.id, at)?;
                locations.insert_sample(&LocationSample {
                    driver_id: driver_id.clone(),
                    zone_id: zone.id.clone(),
                    position: update.position,
                    accuracy_meters: update.accuracy_meters,
                    distance_meters: placement.distance_meters,
                    inside: placement.inside,
                    at,
                })?;
                let transition = transition_kind(
                    previous.map(|sample| sample.inside),
                    placement.inside,
                )
                .map(|kind| ZoneTransition {
                    id: TransitionId::generate(),
                    driver_id: driver_id.clone(),
                    zone_id: zone.id.clone(),
                    trip_id: zone.trip_id.clone(),
                    leg: zone.leg,
                    kind,
                    position: update.position,
                    at,
                });
                if let Some(transition) = &transition {
                    locations.insert_transition(transition)?;
                    outbound.push(Outbound::new(
                        SYSTEM_TOPIC,
                        EventBody::ZoneTransition(transition.clone()),
                    ));
                }
                readings.push(ZoneReading {
                    zone_id: zone.id.clone(),
                    leg: zone.leg,
                    inside: placement.inside,
                    distance_meters: placement.distance_meters,
                    transition,
                });
            }
            Ok((readings, outbound))
        })?;

        for transition in readings.iter().filter_map(|reading| reading.transition.as_ref()) {
            info!(
                zone_id = %transition.zone_id,
                leg = %transition.leg,
                kind = ?transition.kind,
                "zone transition"
            );
        }
        debug!(zones = readings.len(), "location recorded");
        Ok(LocationUpdateResult {
            driver_id,
            trip_id,
            recorded_at: at,
            zones: readings,
        })
    }

    /// Stored fixes for one driver and zone, oldest first.
    pub fn history(
        &self,
        driver_id: &str,
        zone_id: &ZoneId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<LocationSample>, EngineError> {
        self.core
            .with_store(|store| Ok(store.locations().samples(driver_id, zone_id, since, until)?))
    }

    pub fn transitions(&self, filter: &TransitionFilter) -> Result<Vec<ZoneTransition>, EngineError> {
        self.core
            .with_store(|store| Ok(store.locations().transitions(filter)?))
    }
}

pub struct NotificationsApi<'a, P: StoreProvider> {
    core: &'a Engine<P>,
}

impl<P: StoreProvider> NotificationsApi<'_, P> {
    /// Projects an existing check-in into a notification and fans it out.
    /// A check-in that already has one gets it back unchanged.
    pub async fn on_check_in_created(
        &self,
        ctx: &RequestContext,
        event: &CheckInEvent,
    ) -> Result<Notification, EngineError> {
        if let Some(existing) = self
            .core
            .with_store(|store| Ok(store.notifications().for_check_in(&event.id)?))?
        {
            return Ok(existing);
        }
        let sheet = self.core.lookup_trip(&event.trip_id).await?;
        let notification =
            notifications::compose(event, &sheet, &self.core.config.recipient_groups, now());
        self.core.with_events(ctx, |store| {
            if store.check_ins().get(&event.id)?.is_none() {
                return Err(CheckInError::NotFound.into());
            }
            if let Some(existing) = store.notifications().for_check_in(&event.id)? {
                return Ok((existing, Vec::new()));
            }
            store.notifications().insert(&notification)?;
            Ok((notification.clone(), self.core.fan_out(&notification)))
        })
    }

    /// Filtered view for one recipient group. Stranded notifications are
    /// retired first so a half-finished channel creation never resurfaces.
    pub fn list(
        &self,
        ctx: &RequestContext,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, EngineError> {
        self.reconcile(ctx)?;
        let query = NotificationQuery::from_filter(
            filter,
            self.core.config.primary_recipient_group(),
            now(),
        );
        self.core
            .with_store(|store| Ok(store.notifications().list(&query)?))
    }

    pub fn get(&self, id: &NotificationId) -> Result<Notification, EngineError> {
        self.core
            .with_store(|store| Ok(store.notifications().get(id)?))?
            .ok_or_else(|| NotificationError::NotFound.into())
    }

    /// Idempotent: a repeat receipt for the same group changes nothing.
    pub fn mark_read(
        &self,
        ctx: &RequestContext,
        id: &NotificationId,
        recipient_group: Option<&str>,
    ) -> Result<Notification, EngineError> {
        let group = recipient_group
            .map(str::trim)
            .filter(|group| !group.is_empty())
            .unwrap_or(self.core.config.primary_recipient_group())
            .to_string();
        let now = now();

        let (notification, changed) = self.core.with_events(ctx, |store| {
            let repo = store.notifications();
            let existing = repo.get(id)?.ok_or(NotificationError::NotFound)?;
            if !existing.recipient_groups.contains(&group) {
                return Err(NotificationError::InvalidInput {
                    message: format!("notification is not addressed to {group}"),
                }
                .into());
            }
            if !repo.mark_read(id, &group, now)? {
                return Ok(((existing, false), Vec::new()));
            }
            let updated = repo.get(id)?.ok_or(NotificationError::NotFound)?;
            let events = vec![Outbound::new(
                &group,
                EventBody::NotificationRead {
                    notification_id: id.clone(),
                    recipient_group: group.clone(),
                },
            )];
            Ok(((updated, true), events))
        })?;

        if changed {
            debug!(notification_id = %id, recipient_group = %group, "notification read");
            self.core.record_audit(
                ctx,
                AuditAction::NotificationRead,
                SubjectRef::new(SubjectKind::Notification, id.as_str()),
                json!({ "recipient_group": group }),
            );
        }
        Ok(notification)
    }

    /// Removes the notification from the actionable list. Idempotent; stamps the
    /// channel id when its trip leg already has a channel.
    pub fn retire(
        &self,
        ctx: &RequestContext,
        id: &NotificationId,
    ) -> Result<Notification, EngineError> {
        let now = now();
        let (notification, changed) = self.core.with_events(ctx, |store| {
            let existing = store
                .notifications()
                .get(id)?
                .ok_or(NotificationError::NotFound)?;
            if existing.is_retired() {
                return Ok(((existing, false), Vec::new()));
            }
            let channel_id = store
                .channels()
                .for_leg(&existing.trip_id, existing.leg)?
                .map(|channel| channel.id);
            store.notifications().retire(id, channel_id.as_ref(), now)?;
            let updated = store
                .notifications()
                .get(id)?
                .ok_or(NotificationError::NotFound)?;
            let events = vec![Outbound::new(
                BROADCAST_TOPIC,
                EventBody::NotificationRetired {
                    notification_id: id.clone(),
                    channel_id,
                },
            )];
            Ok(((updated, true), events))
        })?;

        if changed {
            info!(notification_id = %id, channel_id = ?notification.channel_id, "notification retired");
            self.core.record_audit(
                ctx,
                AuditAction::NotificationRetired,
                SubjectRef::new(SubjectKind::Notification, id.as_str()),
                json!({ "channel_id": notification.channel_id }),
            );
        }
        Ok(notification)
    }

    /// Retires every actionable notification whose trip leg already has a
    /// channel. Returns how many were retired.
    pub fn reconcile(&self, ctx: &RequestContext) -> Result<usize, EngineError> {
        let stranded = self
            .core
            .with_store(|store| Ok(store.notifications().stranded()?))?;
        if stranded.is_empty() {
            return Ok(0);
        }

        let now = now();
        let retired = self.core.with_events(ctx, |store| {
            let mut retired = Vec::new();
            let mut events = Vec::new();
            for (id, channel_id) in stranded {
                if store.notifications().retire(&id, Some(&channel_id), now)? {
                    events.push(Outbound::new(
                        BROADCAST_TOPIC,
                        EventBody::NotificationRetired {
                            notification_id: id.clone(),
                            channel_id: Some(channel_id.clone()),
                        },
                    ));
                    retired.push((id, channel_id));
                }
            }
            Ok((retired, events))
        })?;

        for (id, channel_id) in &retired {
            warn!(notification_id = %id, channel_id = %channel_id, "retired stranded notification");
            self.core.record_audit(
                ctx,
                AuditAction::NotificationRetired,
                SubjectRef::new(SubjectKind::Notification, id.as_str()),
                json!({ "channel_id": channel_id, "reconciled": true }),
            );
        }
        Ok(retired.len())
    }
}

/// Everything a channel creation needs once the request has been resolved.
struct ChannelTarget {
    trip_id: String,
    leg: LegType,
    po_number: Option<String>,
    driver_id: Option<String>,
    trip_number: String,
    location: String,
    notification_id: Option<NotificationId>,
}

pub struct ChannelsApi<'a, P: StoreProvider> {
    core: &'a Engine<P>,
}

impl<P: StoreProvider> ChannelsApi<'_, P> {
    /// At most one channel per (trip, leg). Concurrent callers for the same leg
    /// all receive the single winning channel.
    #[tracing::instrument(skip_all)]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        request: ChannelRequest,
    ) -> Result<Channel, EngineError> {
        let target = self.resolve(request)?;
        let key = channel_key(&target.trip_id, target.leg);
        let _guard = self.core.channel_locks.lock(&key).await;

        if let Some(existing) = self.for_trip(&target.trip_id, target.leg)? {
            debug!(channel_id = %existing.id, key = %key, "channel already exists");
            self.converge(ctx, &target, &existing)?;
            return Ok(existing);
        }

        let mut members = self.core.config.recipient_groups.clone();
        if let Some(driver_id) = &target.driver_id {
            members.push(driver_id.clone());
        }
        let spec = ChannelSpec {
            idempotency_key: key.clone(),
            name: channel_name(&target.trip_number, &target.location),
            description: channel_description(&target.trip_number, &target.location),
            trip_id: target.trip_id.clone(),
            leg: target.leg,
            members,
        };
        // Nothing is written until the host confirms, so a failure here leaves
        // the source notification actionable.
        let hosted = self.core.host_channel(&spec).await?;

        let now = now();
        let channel = Channel {
            id: ChannelId::generate(),
            external_id: hosted.external_id,
            trip_id: target.trip_id.clone(),
            leg: target.leg,
            po_number: target.po_number.clone(),
            driver_id: target.driver_id.clone(),
            name: spec.name,
            description: spec.description,
            source_notification_id: target.notification_id.clone(),
            created_by: ctx.actor.clone(),
            created_at: now,
        };

        let result = self.core.with_events(ctx, |store| {
            store.channels().insert(&channel).map_err(|err| match err {
                StoreError::UniqueViolation { .. } => {
                    EngineError::from(ChannelError::DuplicateChannelRace {
                        trip_id: channel.trip_id.clone(),
                        leg: channel.leg,
                    })
                }
                other => other.into(),
            })?;
            let mut events = vec![Outbound::new(
                BROADCAST_TOPIC,
                EventBody::ChannelCreated(channel.clone()),
            )];
            let mut retired = None;
            if let Some(notification_id) = &target.notification_id {
                if store
                    .notifications()
                    .retire(notification_id, Some(&channel.id), now)?
                {
                    events.push(Outbound::new(
                        BROADCAST_TOPIC,
                        EventBody::NotificationRetired {
                            notification_id: notification_id.clone(),
                            channel_id: Some(channel.id.clone()),
                        },
                    ));
                    retired = Some(notification_id.clone());
                }
            }
            Ok(((channel.clone(), retired), events))
        });

        let (channel, retired) = match result {
            Ok(created) => created,
            Err(EngineError::Channel(ChannelError::DuplicateChannelRace { trip_id, leg })) => {
                debug!(trip_id = %trip_id, leg = %leg, "lost channel insert race");
                let winner = self.for_trip(&trip_id, leg)?.ok_or_else(|| EngineError::Internal {
                    message: format!("channel for {trip_id} {leg} vanished after conflict"),
                })?;
                self.converge(ctx, &target, &winner)?;
                return Ok(winner);
            }
            Err(err) => return Err(err),
        };

        info!(
            channel_id = %channel.id,
            external_id = %channel.external_id,
            trip_id = %channel.trip_id,
            leg = %channel.leg,
            "channel created"
        );
        self.core.record_audit(
            ctx,
            AuditAction::ChannelCreated,
            SubjectRef::new(SubjectKind::Channel, channel.id.as_str()),
            json!({
                "trip_id": channel.trip_id,
                "leg": channel.leg,
                "external_id": channel.external_id,
                "name": channel.name,
                "source_notification_id": channel.source_notification_id,
            }),
        );
        if let Some(notification_id) = retired {
            self.core.record_audit(
                ctx,
                AuditAction::NotificationRetired,
                SubjectRef::new(SubjectKind::Notification, notification_id.as_str()),
                json!({ "channel_id": channel.id }),
            );
        }
        Ok(channel)
    }

    pub fn get(&self, id: &ChannelId) -> Result<Channel, EngineError> {
        self.core
            .with_store(|store| Ok(store.channels().get(id)?))?
            .ok_or_else(|| ChannelError::NotFound.into())
    }

    pub fn for_trip(&self, trip_id: &str, leg: LegType) -> Result<Option<Channel>, EngineError> {
        self.core
            .with_store(|store| Ok(store.channels().for_leg(trip_id, leg)?))
    }

    pub fn list(&self, trip_id: Option<&str>) -> Result<Vec<Channel>, EngineError> {
        self.core.with_store(|store| Ok(store.channels().list(trip_id)?))
    }

    fn resolve(&self, request: ChannelRequest) -> Result<ChannelTarget, EngineError> {
        match request {
            ChannelRequest::Notification { notification_id } => {
                let notification = self
                    .core
                    .with_store(|store| Ok(store.notifications().get(&notification_id)?))?
                    .ok_or(ChannelError::NotificationNotFound)?;
                Ok(ChannelTarget {
                    trip_id: notification.trip_id,
                    leg: notification.leg,
                    po_number: Some(notification.trip.po_number),
                    driver_id: Some(notification.trip.driver_id),
                    trip_number: notification.trip.trip_number,
                    location: notification.location.name,
                    notification_id: Some(notification_id),
                })
            }
            ChannelRequest::AdHoc {
                trip_id,
                leg,
                po_number,
                driver_id,
            } => {
                let trip_id = trip_id.trim().to_string();
                if trip_id.is_empty() {
                    return Err(ChannelError::InvalidRequest {
                        message: "trip_id is required".to_string(),
                    }
                    .into());
                }
                let (trip_number, location) = ad_hoc_labels(&trip_id, leg, po_number.as_deref());
                Ok(ChannelTarget {
                    trip_id,
                    leg,
                    po_number,
                    driver_id,
                    trip_number,
                    location,
                    notification_id: None,
                })
            }
        }
    }

    /// A caller that found the channel already in place still gets its source
    /// notification retired against that channel.
    fn converge(
        &self,
        ctx: &RequestContext,
        target: &ChannelTarget,
        channel: &Channel,
    ) -> Result<(), EngineError> {
        let Some(notification_id) = &target.notification_id else {
            return Ok(());
        };
        let notification = self.core.notifications().retire(ctx, notification_id)?;
        if notification.channel_id.as_ref() != Some(&channel.id) {
            debug!(
                notification_id = %notification_id,
                channel_id = %channel.id,
                "notification was retired before the channel existed"
            );
        }
        Ok(())
    }
}

pub struct AuditApi<'a, P: StoreProvider> {
    core: &'a Engine<P>,
}

impl<P: StoreProvider> AuditApi<'_, P> {
    pub fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, EngineError> {
        self.core.with_store(|store| Ok(store.audit().list(filter)?))
    }
}

pub struct EventsApi<'a, P: StoreProvider> {
    core: &'a Engine<P>,
}

impl<P: StoreProvider> EventsApi<'_, P> {
    pub fn list(&self, after: Option<i64>, limit: Option<u32>) -> Result<Vec<EventRecord>, EngineError> {
        self.core
            .with_store(|store| Ok(store.events().list(after, limit)?))
    }
}

fn build_event_record(
    ctx: &RequestContext,
    topic: String,
    body: EventBody,
) -> Result<EventRecord, EngineError> {
    let value = serde_json::to_value(body).map_err(|err| EngineError::Internal {
        message: err.to_string(),
    })?;
    Ok(EventRecord {
        id: String::new(),
        seq: 0,
        at: now(),
        correlation_id: ctx.correlation_id.clone(),
        source: ctx.source,
        topic,
        body: value,
    })
}
