//! Sectioned key/value configuration access.
//!
//! Typed loading and validation live in `domain::config`; adapters only
//! hand back raw strings and lenient scalar reads.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
