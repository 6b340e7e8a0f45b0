//! End-to-end comparison runs against a local axum target live in `tests/`.
