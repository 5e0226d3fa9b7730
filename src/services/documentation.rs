use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Hit-Guessr Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::create_game,
        crate::routes::game::game_detail,
        crate::routes::game::join_game,
        crate::routes::game::submit_answer,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::SubmitAnswerRequest,
            crate::dto::game::GameSummary,
            crate::dto::game::RoundPublicView,
            crate::dto::game::RoundRevealView,
            crate::dto::game::AnswerView,
            crate::dto::ws::ClientCommand,
            crate::dto::ws::ServerEvent,
            crate::scoring::ScoreBreakdown,
            crate::state::game::GameMode,
            crate::state::game::GameResult,
            crate::state::game::PlayerIdentity,
            crate::state::state_machine::RoomPhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game lifecycle and answer submission"),
        (name = "ws", description = "WebSocket operations for game clients"),
    )
)]
pub struct ApiDoc;
