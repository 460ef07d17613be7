pub mod driver;
pub mod events;
pub mod pricing;
pub mod ride;
pub mod rider;
pub mod route;
