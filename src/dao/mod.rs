/// Persisted record definitions handed to the store.
pub mod models;
/// Game result/answer storage abstraction.
pub mod game_store;
/// Storage error types shared by all backends.
pub mod storage;
