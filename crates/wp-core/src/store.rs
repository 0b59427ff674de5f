use crate::EngineError;
use crate::audit::AuditRepository;
use crate::channels::ChannelRepository;
use crate::checkins::CheckInRepository;
use crate::error::StoreError;
use crate::events::EventRepository;
use crate::locations::LocationRepository;
use crate::notifications::NotificationRepository;
use crate::zones::ZoneRepository;

pub trait Store {
    type Zones<'a>: ZoneRepository
    where
        Self: 'a;
    type CheckIns<'a>: CheckInRepository
    where
        Self: 'a;
    type Notifications<'a>: NotificationRepository
    where
        Self: 'a;
    type Channels<'a>: ChannelRepository
    where
        Self: 'a;
    type Audit<'a>: AuditRepository
    where
        Self: 'a;
    type Events<'a>: EventRepository
    where
        Self: 'a;
    type Locations<'a>: LocationRepository
    where
        Self: 'a;

    fn zones(&self) -> Self::Zones<'_>;
    fn check_ins(&self) -> Self::CheckIns<'_>;
    fn notifications(&self) -> Self::Notifications<'_>;
    fn channels(&self) -> Self::Channels<'_>;
    fn audit(&self) -> Self::Audit<'_>;
    fn events(&self) -> Self::Events<'_>;
    fn locations(&self) -> Self::Locations<'_>;

    fn with_tx<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&Self) -> Result<T, EngineError>;
}

/// Hands out short-lived stores. The engine opens one per unit of work and
/// drops it before awaiting anything, so stores need not be `Send`.
pub trait StoreProvider: Send + Sync {
    type Store: Store;

    fn open(&self) -> Result<Self::Store, StoreError>;
}
