//! End-to-end transfer properties, exercised through the directory
//! pool backend. See `tests/roundtrip.rs`.
