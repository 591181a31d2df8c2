use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use crate::slug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub views: i64,
    pub likes: i64,
}

/// A category as listed in navigation, carrying its slug for links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryLink {
    #[serde(flatten)]
    pub category: Category,
    pub url: String,
}

impl From<Category> for CategoryLink {
    fn from(category: Category) -> Self {
        let url = slug::encode(&category.name);

        Self { category, url }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Page {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub url: String,
    pub views: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct UserProfile {
    pub user_id: i64,
    pub website: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: Option<i64>,
    pub visits: i64,
    pub last_visit: Option<NaiveDateTime>,
}
