pub mod dispatch_service;
pub mod driver_index;
pub mod pricing_service;
pub mod ride_service;
pub mod route_service;
