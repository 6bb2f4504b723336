//! Response bodies for writes and login.

use crate::store::Record;
use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Serialize)]
pub struct CreatedBody {
    pub message: String,
    pub id: i64,
}

#[derive(Serialize)]
pub struct LoginBody {
    pub message: String,
    pub account: Record,
}

#[derive(Serialize)]
pub struct AccountBody {
    pub account: Record,
}

pub fn created(message: String, id: i64) -> (StatusCode, Json<CreatedBody>) {
    (StatusCode::CREATED, Json(CreatedBody { message, id }))
}

pub fn message(message: String) -> (StatusCode, Json<MessageBody>) {
    (StatusCode::OK, Json(MessageBody { message }))
}
