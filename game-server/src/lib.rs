use std::sync::Arc;
use warp::Filter;
use warp::http::StatusCode;

use crate::orchestrator::Orchestrator;
use crate::websocket::ConnectionManager;

pub mod config;
pub mod orchestrator;
pub mod websocket;

pub fn create_routes(
    connection_manager: Arc<ConnectionManager>,
    orchestrator: Arc<Orchestrator>,
    static_dir: String,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    // Clone for filters
    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let orchestrator_filter = warp::any().map({
        let orchestrator = orchestrator.clone();
        move || orchestrator.clone()
    });

    // WebSocket endpoint, one upgrade per player
    let game = warp::path("game")
        .and(warp::ws())
        .and(connection_manager_filter.clone())
        .and(orchestrator_filter.clone())
        .map(|ws: warp::ws::Ws, conn_mgr, orch| {
            ws.on_upgrade(move |socket| websocket::handle_connection(socket, conn_mgr, orch))
        });

    // Out-of-band start trigger (Lobby -> Countdown)
    let start = warp::path("start")
        .and(warp::path::end())
        .and(warp::post())
        .and(orchestrator_filter.clone())
        .and_then(handle_start);

    // Explicit reset back to the lobby (Summary -> Lobby)
    let reset = warp::path("reset")
        .and(warp::path::end())
        .and(warp::post())
        .and(orchestrator_filter.clone())
        .and_then(handle_reset);

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    // The bundled front end
    let static_files = warp::fs::dir(static_dir);

    game.or(start)
        .or(reset)
        .or(health)
        .or(static_files)
        .with(warp::log("word_derby"))
}

async fn handle_start(orchestrator: Arc<Orchestrator>) -> Result<impl warp::Reply, warp::Rejection> {
    match orchestrator.start().await {
        Ok(()) => Ok(warp::reply::with_status(
            "Game started".to_string(),
            StatusCode::OK,
        )),
        Err(error) => Ok(warp::reply::with_status(
            error.to_string(),
            StatusCode::CONFLICT,
        )),
    }
}

async fn handle_reset(orchestrator: Arc<Orchestrator>) -> Result<impl warp::Reply, warp::Rejection> {
    orchestrator.reset().await;
    Ok(warp::reply::with_status(
        "Back to the lobby".to_string(),
        StatusCode::OK,
    ))
}
