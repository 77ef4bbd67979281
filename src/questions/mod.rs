pub mod dto;
pub mod handlers;
pub mod repo;

use crate::state::AppState;
use axum::Router;

/// Question categories offered across solo and head-to-head play.
pub const CATEGORIES: [&str; 5] = ["Chumash", "Tanach", "Talmud", "Halacha", "Jewish History"];

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::question_routes())
}
