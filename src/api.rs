//! Admin API: product CRUD and the background scrape trigger

pub mod handlers;
pub mod routes;
pub mod server;
pub mod types;

pub use handlers::AppState;
pub use routes::create_router;
pub use server::serve;
