//! # Sessions
//!
//! Opaque random token in an HTTP-only cookie, everything else in the
//! `sessions` table: the logged-in user and the visit counter.
//!
//! Nothing is stored for a browser until its first counted visit or login,
//! so cookieless clients never create rows.
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::NaiveDateTime;
use directory::{SessionRecord, SqlitePool, User, sessions, users};

use crate::error::AppError;

pub const SESSION_COOKIE: &str = "sessionid";

pub struct Session {
    pub record: SessionRecord,
    pub user: Option<User>,
    stored: bool,
}

impl Session {
    /// Loads the session named by the cookie. Without a live one the
    /// session starts out empty and unsaved.
    pub async fn open(pool: &SqlitePool, jar: CookieJar) -> Result<(CookieJar, Self), AppError> {
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            if let Some(record) = sessions::get_session(pool, cookie.value()).await? {
                let user = match record.user_id {
                    Some(id) => users::get_user(pool, id).await?.filter(|u| u.is_active),
                    None => None,
                };

                let session = Self {
                    record,
                    user,
                    stored: true,
                };
                return Ok((jar, session));
            }
        }

        let record = SessionRecord {
            token: String::new(),
            user_id: None,
            visits: 0,
            last_visit: None,
        };

        let session = Self {
            record,
            user: None,
            stored: false,
        };
        Ok((jar, session))
    }

    pub fn username(&self) -> Option<String> {
        self.user.as_ref().map(|u| u.username.clone())
    }

    pub fn require_user(&self, path: &str) -> Result<&User, AppError> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::LoginRequired(path.to_string()))
    }

    /// Binds `user` to a freshly issued token. The old token stops working,
    /// the visit counter carries over.
    pub async fn login(
        &mut self,
        pool: &SqlitePool,
        jar: CookieJar,
        user: User,
    ) -> Result<CookieJar, AppError> {
        self.record = sessions::rotate_session(pool, &self.record.token, user.id).await?;
        self.user = Some(user);
        self.stored = true;

        Ok(jar.add(session_cookie(self.record.token.clone())))
    }

    pub async fn end(self, pool: &SqlitePool, jar: CookieJar) -> Result<CookieJar, AppError> {
        if self.stored {
            sessions::delete_session(pool, &self.record.token).await?;
        }

        Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
    }

    /// Applies [`register_visit`] and persists the result if it changed,
    /// saving the session (and setting its cookie) on the first visit.
    pub async fn count_visit(
        &mut self,
        pool: &SqlitePool,
        jar: CookieJar,
        now: NaiveDateTime,
    ) -> Result<(CookieJar, i64), AppError> {
        let (visits, last_visit) = register_visit(self.record.last_visit, self.record.visits, now);

        if visits == self.record.visits && Some(last_visit) == self.record.last_visit {
            return Ok((jar, visits));
        }

        if self.stored {
            sessions::record_visit(pool, &self.record.token, visits, last_visit).await?;
            self.record.visits = visits;
            self.record.last_visit = Some(last_visit);

            return Ok((jar, visits));
        }

        self.record = sessions::create_session(pool, visits, Some(last_visit)).await?;
        self.stored = true;

        Ok((jar.add(session_cookie(self.record.token.clone())), visits))
    }
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Visit counting, once per calendar day.
///
/// Only the date part of `last_visit` and `now` is compared. Returns the new
/// counter and the new last-visit timestamp.
pub fn register_visit(
    last_visit: Option<NaiveDateTime>,
    visits: i64,
    now: NaiveDateTime,
) -> (i64, NaiveDateTime) {
    match last_visit {
        None => (1, now),
        Some(last) if now.date() > last.date() => (visits + 1, now),
        Some(last) => (visits, last),
    }
}
