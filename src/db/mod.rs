// Postgres access through diesel-async connections pooled by bb8

mod pool;

pub use pool::{connect, connect_lazy, ping, redact_url, DatabaseError, DieselPool};
