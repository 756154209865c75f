pub mod codecs;
pub mod handlers;
pub mod jobs;
pub mod metadata;
pub mod middleware;
pub mod paths;
pub mod routes;

pub use routes::create_router;
