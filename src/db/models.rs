use sqlx::FromRow;
use time::{Date, PrimitiveDateTime};

use crate::db::types::StaffRole;

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Admin {
    pub(crate) id: i64,
    pub(crate) telegram_id: i64,
    pub(crate) role: StaffRole,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Group {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Student {
    pub(crate) id: i64,
    pub(crate) full_name: String,
    pub(crate) group_id: Option<i64>,
    pub(crate) telegram_id: Option<i64>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Lesson {
    pub(crate) id: i64,
    pub(crate) group_subject_id: i64,
    pub(crate) date: Date,
    pub(crate) topic: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}
