//! Configuration access port trait.
//!
//! Configuration is an explicit value handed to feed/engine construction,
//! never ambient global state. Typed getters with defaults keep call sites
//! short; only truly required keys go through `get_string` and fail upstream.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
