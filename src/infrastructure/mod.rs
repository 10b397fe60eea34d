pub mod axum_http;
pub mod http;
pub mod postgres;
pub mod storages;
