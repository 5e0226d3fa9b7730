/// OpenAPI documentation generation.
pub mod documentation;
/// Game creation and the HTTP request/response surface.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Per-room session tasks owning all game state mutations.
pub mod room_session;
/// Per-round countdown timers.
pub mod round_clock;
/// WebSocket connection and message handling service.
pub mod websocket_service;
