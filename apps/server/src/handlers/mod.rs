pub mod bookings;
pub mod disputes;
pub mod health;
pub mod services;
