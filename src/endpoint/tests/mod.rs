//! Unit tests for endpoint services against the in-memory broker.
