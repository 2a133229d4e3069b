pub mod events;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod tasks;

pub use routes::create_router;
