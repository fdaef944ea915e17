//! License server: a hello exchange over WebSocket establishes per-session
//! keys, then every call travels as an encrypted, signed envelope.

pub mod client;
pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod handshake;
pub mod routes;
pub mod state;
pub mod store;

pub mod crypto {
    pub mod aes;
    pub mod derive;
    pub mod dh;
    pub mod hmac;
    pub mod keys;
}

pub mod models {
    pub mod account;
    pub mod application;
    pub mod license;
    pub mod owner;
    pub mod session;
}

pub mod repositories {
    pub mod account;
    pub mod application;
    pub mod license;
    pub mod owner;
}

pub mod services {
    pub mod admin;
    pub mod auth;
    pub mod license;
}

pub mod handlers {
    pub mod admin;
    pub mod auth;
    pub mod hello;
    pub mod license;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod integrity;
}

pub mod validation {
    pub mod auth;
    pub mod messages;
}

pub use routes::build_router;
pub use state::AppState;
