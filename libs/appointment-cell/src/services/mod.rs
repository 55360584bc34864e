pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod slot;

pub use booking::AppointmentBookingService;
pub use conflict::OverlapGuard;
pub use lifecycle::AppointmentLifecycleService;
