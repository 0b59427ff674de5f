pub mod audit;
pub mod channel;
pub mod checkin;
pub mod enums;
pub mod event;
pub mod geo;
pub mod ids;
pub mod io;
pub mod location;
pub mod notification;
pub mod trip;

pub use audit::{AuditEntry, AuditFilter, SubjectKind, SubjectRef};
pub use channel::{Channel, ChannelRequest, ChannelSpec, HostedChannel};
pub use checkin::{CheckInAttempt, CheckInEvent};
pub use enums::{AuditAction, DateRange, LegType, ReadStatus, TransitionKind};
pub use event::EventBody;
pub use geo::{Coordinate, DwellSample, Evaluation, GeofenceZone, ZoneShape};
pub use ids::{AuditId, ChannelId, CheckInId, IdError, NotificationId, TransitionId, ZoneId};
pub use io::{
    CreateChannelInput, MarkReadInput, NearbyZone, NearbyZonesQuery, RegisterZoneInput,
    SubmitCheckInInput,
};
pub use location::{
    LocationSample, LocationUpdate, LocationUpdateInput, LocationUpdateResult, TransitionFilter,
    ZoneReading, ZoneTransition,
};
pub use notification::{
    CheckInDetails, Notification, NotificationFilter, RecipientRead,
};
pub use trip::{LocationSummary, Stop, TripSheet, TripSummary};
