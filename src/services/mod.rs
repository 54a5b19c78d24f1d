pub mod alerts;
pub mod bookings;
pub mod bpp;
pub mod mappings;
pub mod protocol;
