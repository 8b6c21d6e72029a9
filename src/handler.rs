// Rocket routes for the four Battlesnake endpoints
//
// Requests are parsed into GameState by Rocket and handed to the managed Bot.
// Only /move does real work; it awaits the search, which runs off the
// async executor.

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::Value;

use snake_duel_mcts::bot::Bot;
use snake_duel_mcts::types::GameState;

/// GET /: snake metadata and appearance
#[get("/")]
pub fn index(bot: &State<Bot>) -> Json<Value> {
    Json(bot.info())
}

#[post("/start", format = "json", data = "<req>")]
pub fn start(bot: &State<Bot>, req: Json<GameState>) -> Status {
    let GameState { game, turn, board, you } = req.into_inner();
    bot.start(&game, &turn, &board, &you);
    Status::Ok
}

/// POST /move: one search per request, answered as {"move": ...}
#[post("/move", format = "json", data = "<req>")]
pub async fn get_move(bot: &State<Bot>, req: Json<GameState>) -> Json<Value> {
    let GameState { game, turn, board, you } = req.into_inner();
    Json(bot.get_move(&game, &turn, &board, &you).await)
}

#[post("/end", format = "json", data = "<req>")]
pub fn end(bot: &State<Bot>, req: Json<GameState>) -> Status {
    let GameState { game, turn, board, you } = req.into_inner();
    bot.end(&game, &turn, &board, &you);
    Status::Ok
}
