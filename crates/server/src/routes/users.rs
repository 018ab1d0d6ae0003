use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use rollcall_db::Db;
use rollcall_db::users::{NewUser, User};

use crate::error::ApiErr;
use crate::routes::ApiSecret;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub uid: String,
    pub name: String,
    pub division: String,
    pub year: i64,
    pub batch: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    pub contact_id: String,
    #[serde(default)]
    pub is_admin: bool,
}

fn default_branch() -> String {
    "COMPS".to_string()
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub division: String,
    pub year: i64,
    pub batch: String,
    pub branch: String,
    pub contact_id: String,
    pub is_admin: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            uid: user.uid,
            name: user.name,
            division: user.division,
            year: user.year,
            batch: user.batch,
            branch: user.branch,
            contact_id: user.contact_id,
            is_admin: user.is_admin,
        }
    }
}

/// POST /api/users — register a student.
pub async fn register(
    _auth: ApiSecret,
    State(db): State<Db>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiErr> {
    let user = db.create_user(&NewUser {
        uid: req.uid,
        name: req.name,
        division: req.division,
        year: req.year,
        batch: req.batch,
        branch: req.branch,
        contact_id: req.contact_id,
        is_admin: req.is_admin,
    })?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/users — list registered users.
pub async fn list(
    _auth: ApiSecret,
    State(db): State<Db>,
) -> Result<Json<Vec<UserResponse>>, ApiErr> {
    Ok(Json(
        db.list_users()?.into_iter().map(Into::into).collect(),
    ))
}
