pub mod order;
pub mod route;
pub mod snapshot;
