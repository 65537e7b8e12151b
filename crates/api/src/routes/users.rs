use axum::Json;
use store::User;

use crate::extract::CurrentUser;

/// GET /users/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
