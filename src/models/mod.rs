pub mod alert;
pub mod beckn;
pub mod booking;
pub mod mapping;
pub mod transition;

pub use alert::{AlertKind, OperatorAlert};
pub use beckn::{Action, Context, ContextIds, Envelope, PassthroughRequest};
pub use booking::{
    Address, Booking, BookingItem, BookingStatus, BookingType, CreateBookingRequest, FieldError,
    Itinerary, NewBooking, Passenger, Payment, PaymentStatus,
};
pub use mapping::{
    BppBookingMapping, BppServiceType, MappingStats, MappingStatsRow, MappingStatus,
    MappingWithBooking, NewMapping, RecordMappingRequest,
};
pub use transition::{InvalidTransition, Transition};
