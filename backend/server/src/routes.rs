use std::sync::Arc;

use axum::{
    Form,
    extract::{Multipart, Query, State},
    http::{HeaderValue, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Local;
use directory::{
    Category, CategoryLink, DirectoryError, Page, User, UserProfile, slug,
    store::{self, FALLBACK_PATH},
    users::{self, LoginOutcome},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::AppError,
    forms::{
        CategoryForm, CleanRegistration, FieldErrors, LoginForm, PageForm, QueryForm,
        RegistrationForm,
    },
    search::SearchResult,
    session::Session,
    state::AppState,
    templates::render,
    utils::{HOME_PATH, category_slug, safe_next},
};

const TOP_COUNT: u32 = 5;
const SUGGESTION_COUNT: u32 = 8;

const INVALID_LOGIN: &str = "Invalid login details supplied.";
const DISABLED_LOGIN: &str = "Your Rango account is disabled.";

type HtmlPage = Result<(CookieJar, Html<String>), AppError>;

/// Fields every full page needs for navigation and the sidebar.
#[derive(Serialize)]
struct Layout {
    user: Option<String>,
    cat_list: Vec<CategoryLink>,
}

async fn layout(state: &AppState, session: &Session) -> Result<Layout, AppError> {
    Ok(Layout {
        user: session.username(),
        cat_list: store::list_categories(&state.pool, 0, "").await?,
    })
}

#[derive(Serialize)]
struct IndexView {
    #[serde(flatten)]
    layout: Layout,
    top_categories: Vec<CategoryLink>,
    top_five_views: Vec<Page>,
    visits: i64,
}

pub async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> HtmlPage {
    let (jar, mut session) = Session::open(&state.pool, jar).await?;
    let (jar, visits) = session
        .count_visit(&state.pool, jar, Local::now().naive_local())
        .await?;

    let view = IndexView {
        layout: layout(&state, &session).await?,
        top_categories: store::top_categories(&state.pool, TOP_COUNT).await?,
        top_five_views: store::top_pages(&state.pool, TOP_COUNT).await?,
        visits,
    };

    Ok((jar, render(&state.templates, "index.html", &view)?))
}

#[derive(Serialize)]
struct AboutView {
    #[serde(flatten)]
    layout: Layout,
    visits: i64,
}

pub async fn about(State(state): State<Arc<AppState>>, jar: CookieJar) -> HtmlPage {
    let (jar, session) = Session::open(&state.pool, jar).await?;

    let view = AboutView {
        layout: layout(&state, &session).await?,
        visits: session.record.visits,
    };

    Ok((jar, render(&state.templates, "about.html", &view)?))
}

#[derive(Serialize)]
struct CategoryView {
    #[serde(flatten)]
    layout: Layout,
    category_name: String,
    category_name_url: String,
    category: Option<Category>,
    pages: Vec<Page>,
    query: String,
    result_list: Vec<SearchResult>,
}

/// Resolves a raw slug to its category. Undecodable slugs and unknown
/// names both come back as `None`, with the best-effort display name.
async fn resolve_category(
    state: &AppState,
    raw_slug: &str,
) -> Result<(String, Option<Category>), AppError> {
    match slug::decode(raw_slug) {
        Some(name) => {
            let category = store::get_category_by_name(&state.pool, &name).await?;
            Ok((name, category))
        }
        None => Ok((raw_slug.to_string(), None)),
    }
}

async fn category_view(
    state: &AppState,
    session: &Session,
    raw_slug: &str,
    count_view: bool,
) -> Result<CategoryView, AppError> {
    let (category_name, mut category) = resolve_category(state, raw_slug).await?;

    let mut pages = Vec::new();
    if let Some(category) = category.as_mut() {
        if count_view {
            if let Some(views) = store::increment_category_views(&state.pool, category.id).await? {
                category.views = views;
            }
        }
        pages = store::pages_for_category(&state.pool, category.id).await?;
    }

    Ok(CategoryView {
        layout: layout(state, session).await?,
        category_name,
        category_name_url: raw_slug.to_string(),
        category,
        pages,
        query: String::new(),
        result_list: Vec::new(),
    })
}

pub async fn category(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    uri: Uri,
) -> HtmlPage {
    let raw_slug = category_slug(&uri).ok_or(AppError::MalformedPayload)?;
    let (jar, session) = Session::open(&state.pool, jar).await?;

    let view = category_view(&state, &session, raw_slug, true).await?;

    Ok((jar, render(&state.templates, "category.html", &view)?))
}

pub async fn category_search(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    uri: Uri,
    Form(form): Form<QueryForm>,
) -> HtmlPage {
    let raw_slug = category_slug(&uri).ok_or(AppError::MalformedPayload)?;
    let (jar, session) = Session::open(&state.pool, jar).await?;

    let mut view = category_view(&state, &session, raw_slug, false).await?;

    let query = form.query.trim();
    if !query.is_empty() {
        view.result_list = state.search.search(query).await;
    }
    view.query = query.to_string();

    Ok((jar, render(&state.templates, "category.html", &view)?))
}

#[derive(Serialize)]
struct AddCategoryView {
    #[serde(flatten)]
    layout: Layout,
    form: CategoryForm,
    errors: FieldErrors,
}

const ADD_CATEGORY_PATH: &str = "/rango/add_category/";

pub async fn add_category_form(State(state): State<Arc<AppState>>, jar: CookieJar) -> HtmlPage {
    let (jar, session) = Session::open(&state.pool, jar).await?;
    session.require_user(ADD_CATEGORY_PATH)?;

    let view = AddCategoryView {
        layout: layout(&state, &session).await?,
        form: CategoryForm::default(),
        errors: FieldErrors::default(),
    };

    Ok((jar, render(&state.templates, "add_category.html", &view)?))
}

pub async fn add_category(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<CategoryForm>,
) -> Result<Response, AppError> {
    let (jar, session) = Session::open(&state.pool, jar).await?;
    session.require_user(ADD_CATEGORY_PATH)?;

    let errors = match form.clean() {
        Ok(name) => match store::insert_category(&state.pool, &name, 0, 0).await {
            Ok(category) => {
                info!("Created category {}", category.name);
                return Ok((jar, Redirect::to(HOME_PATH)).into_response());
            }
            Err(DirectoryError::Duplicate(_)) => {
                let mut errors = FieldErrors::default();
                errors.add("name", "Category with this Name already exists.");
                errors
            }
            Err(e) => return Err(e.into()),
        },
        Err(errors) => errors,
    };

    warn!("Invalid category form: {errors:?}");

    let view = AddCategoryView {
        layout: layout(&state, &session).await?,
        form,
        errors,
    };

    Ok((jar, render(&state.templates, "add_category.html", &view)?).into_response())
}

#[derive(Serialize)]
struct AddPageView {
    #[serde(flatten)]
    layout: Layout,
    category_name: String,
    category_name_url: String,
    category: Option<Category>,
    form: PageForm,
    errors: FieldErrors,
}

fn add_page_path(raw_slug: &str) -> String {
    format!("/rango/category/{raw_slug}/add_page/")
}

fn missing_category(errors: &mut FieldErrors, category_name: &str) {
    errors.add(
        "category",
        format!("The category {category_name} does not exist."),
    );
}

fn add_page_response(
    state: &AppState,
    jar: CookieJar,
    view: &AddPageView,
) -> Result<Response, AppError> {
    let status = if view.category.is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    let html = render(&state.templates, "add_page.html", view)?;

    Ok((status, jar, html).into_response())
}

pub async fn add_page_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    uri: Uri,
) -> Result<Response, AppError> {
    let raw_slug = category_slug(&uri).ok_or(AppError::MalformedPayload)?;
    let (jar, session) = Session::open(&state.pool, jar).await?;
    session.require_user(&add_page_path(raw_slug))?;

    let (category_name, category) = resolve_category(&state, raw_slug).await?;

    let mut errors = FieldErrors::default();
    if category.is_none() {
        missing_category(&mut errors, &category_name);
    }

    let view = AddPageView {
        layout: layout(&state, &session).await?,
        category_name,
        category_name_url: raw_slug.to_string(),
        category,
        form: PageForm::default(),
        errors,
    };

    add_page_response(&state, jar, &view)
}

pub async fn add_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    uri: Uri,
    Form(form): Form<PageForm>,
) -> Result<Response, AppError> {
    let raw_slug = category_slug(&uri).ok_or(AppError::MalformedPayload)?;
    let (jar, session) = Session::open(&state.pool, jar).await?;
    session.require_user(&add_page_path(raw_slug))?;

    let (category_name, category) = resolve_category(&state, raw_slug).await?;

    let errors = match (&category, form.clean()) {
        (Some(category), Ok(page)) => {
            store::insert_page(&state.pool, category, &page.title, &page.url).await?;
            info!("Added page {} to {}", page.title, category.name);

            let target = format!("/rango/category/{}/", slug::encode(&category.name));
            return Ok((jar, Redirect::to(&target)).into_response());
        }
        (None, _) => {
            let mut errors = FieldErrors::default();
            missing_category(&mut errors, &category_name);
            errors
        }
        (Some(_), Err(errors)) => errors,
    };

    warn!("Invalid page form: {errors:?}");

    let view = AddPageView {
        layout: layout(&state, &session).await?,
        category_name,
        category_name_url: raw_slug.to_string(),
        category,
        form,
        errors,
    };

    add_page_response(&state, jar, &view)
}

#[derive(Serialize)]
struct RegisterView {
    #[serde(flatten)]
    layout: Layout,
    form: RegistrationForm,
    errors: FieldErrors,
    registered: bool,
}

pub async fn register_form(State(state): State<Arc<AppState>>, jar: CookieJar) -> HtmlPage {
    let (jar, session) = Session::open(&state.pool, jar).await?;

    let view = RegisterView {
        layout: layout(&state, &session).await?,
        form: RegistrationForm::default(),
        errors: FieldErrors::default(),
        registered: false,
    };

    Ok((jar, render(&state.templates, "register.html", &view)?))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Multipart,
) -> HtmlPage {
    let (jar, session) = Session::open(&state.pool, jar).await?;

    let form = RegistrationForm::from_multipart(multipart)
        .await
        .map_err(|e| {
            warn!("Unreadable registration payload: {e}");
            AppError::MalformedPayload
        })?;

    let (errors, registered) = match form.clean() {
        Ok(clean) => match create_account(&state, &clean).await {
            Ok(user) => {
                info!("Registered user {}", user.username);
                (FieldErrors::default(), true)
            }
            Err(AppError::Directory(DirectoryError::Duplicate(_))) => {
                let mut errors = FieldErrors::default();
                errors.add("username", "A user with that username already exists.");
                (errors, false)
            }
            Err(e) => return Err(e),
        },
        Err(errors) => (errors, false),
    };

    if !registered {
        warn!("Invalid registration form: {errors:?}");
    }

    let view = RegisterView {
        layout: layout(&state, &session).await?,
        form,
        errors,
        registered,
    };

    Ok((jar, render(&state.templates, "register.html", &view)?))
}

/// Creates the user, its profile and picture, or none of them.
///
/// The picture is written while the transaction holds the new username and
/// removed again when the transaction does not commit.
async fn create_account(state: &AppState, clean: &CleanRegistration) -> Result<User, AppError> {
    let mut tx = state.pool.begin().await.map_err(DirectoryError::from)?;

    let user = users::create_user(&mut *tx, &clean.username, &clean.email, &clean.password).await?;

    let picture = match &clean.picture {
        Some((extension, bytes)) => {
            Some(save_picture(state, &user.username, extension, bytes).await?)
        }
        None => None,
    };

    let profile = users::save_profile(
        &mut *tx,
        user.id,
        clean.website.as_deref(),
        picture.as_deref(),
    )
    .await;

    let saved = match profile {
        Ok(_) => tx.commit().await.map_err(DirectoryError::from),
        Err(e) => Err(e),
    };

    if let Err(e) = saved {
        if let Some(relative) = &picture {
            let path = state.config.media_root.join(relative);
            if let Err(remove) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove {}: {remove}", path.display());
            }
        }
        return Err(e.into());
    }

    Ok(user)
}

/// Stores the picture under `MEDIA_ROOT/profile_images/`, returning its
/// path relative to the media root.
async fn save_picture(
    state: &AppState,
    username: &str,
    extension: &str,
    bytes: &[u8],
) -> Result<String, AppError> {
    let relative = format!("profile_images/{username}.{extension}");
    let path = state.config.media_root.join(&relative);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, bytes).await?;

    Ok(relative)
}

#[derive(Serialize)]
struct LoginView {
    #[serde(flatten)]
    layout: Layout,
    username: String,
    next: String,
    error: Option<&'static str>,
}

#[derive(Deserialize)]
pub struct NextParams {
    next: Option<String>,
}

pub async fn login_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<NextParams>,
) -> HtmlPage {
    let (jar, session) = Session::open(&state.pool, jar).await?;

    let view = LoginView {
        layout: layout(&state, &session).await?,
        username: String::new(),
        next: params.next.unwrap_or_default(),
        error: None,
    };

    Ok((jar, render(&state.templates, "login.html", &view)?))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let (jar, mut session) = Session::open(&state.pool, jar).await?;

    let (status, error) =
        match users::authenticate(&state.pool, &form.username, &form.password).await? {
            LoginOutcome::Authenticated(user) => {
                info!("User {} logged in", user.username);
                let jar = session.login(&state.pool, jar, user).await?;

                let target = safe_next(form.next.as_deref().filter(|n| !n.is_empty()));
                return Ok((jar, Redirect::to(target)).into_response());
            }
            LoginOutcome::Disabled => {
                info!("Disabled account {} tried to log in", form.username);
                (StatusCode::FORBIDDEN, DISABLED_LOGIN)
            }
            LoginOutcome::Rejected => {
                info!("Invalid login details for {}", form.username);
                (StatusCode::UNAUTHORIZED, INVALID_LOGIN)
            }
        };

    let view = LoginView {
        layout: layout(&state, &session).await?,
        username: form.username,
        next: form.next.unwrap_or_default(),
        error: Some(error),
    };
    let html = render(&state.templates, "login.html", &view)?;

    Ok((status, jar, html).into_response())
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let (jar, session) = Session::open(&state.pool, jar).await?;
    session.require_user("/rango/logout/")?;

    let jar = session.end(&state.pool, jar).await?;

    Ok((jar, Redirect::to(HOME_PATH)))
}

pub async fn restricted(State(state): State<Arc<AppState>>, jar: CookieJar) -> HtmlPage {
    let (jar, session) = Session::open(&state.pool, jar).await?;
    session.require_user("/rango/restricted/")?;

    let view = layout(&state, &session).await?;

    Ok((jar, render(&state.templates, "restricted.html", &view)?))
}

#[derive(Serialize)]
struct ProfileView {
    #[serde(flatten)]
    layout: Layout,
    username: String,
    email: String,
    profile: Option<UserProfile>,
}

pub async fn profile(State(state): State<Arc<AppState>>, jar: CookieJar) -> HtmlPage {
    let (jar, session) = Session::open(&state.pool, jar).await?;
    let user = session.require_user("/rango/profile/")?;

    let view = ProfileView {
        username: user.username.clone(),
        email: user.email.clone(),
        profile: users::get_profile(&state.pool, user.id).await?,
        layout: layout(&state, &session).await?,
    };

    Ok((jar, render(&state.templates, "profile.html", &view)?))
}

#[derive(Serialize)]
struct SearchView {
    #[serde(flatten)]
    layout: Layout,
    query: String,
    result_list: Vec<SearchResult>,
}

pub async fn search_form(State(state): State<Arc<AppState>>, jar: CookieJar) -> HtmlPage {
    let (jar, session) = Session::open(&state.pool, jar).await?;

    let view = SearchView {
        layout: layout(&state, &session).await?,
        query: String::new(),
        result_list: Vec::new(),
    };

    Ok((jar, render(&state.templates, "search.html", &view)?))
}

pub async fn run_search(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<QueryForm>,
) -> HtmlPage {
    let (jar, session) = Session::open(&state.pool, jar).await?;

    let query = form.query.trim();
    let result_list = if query.is_empty() {
        Vec::new()
    } else {
        state.search.search(query).await
    };

    let view = SearchView {
        layout: layout(&state, &session).await?,
        query: query.to_string(),
        result_list,
    };

    Ok((jar, render(&state.templates, "search.html", &view)?))
}

#[derive(Deserialize)]
pub struct TrackParams {
    page_id: Option<String>,
}

pub async fn track_url(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrackParams>,
) -> Redirect {
    let target = store::track_view(&state.pool, params.page_id.as_deref()).await;

    if HeaderValue::from_str(&target).is_err() {
        warn!("Stored url {target:?} is not a valid redirect");
        return Redirect::to(FALLBACK_PATH);
    }

    Redirect::to(&target)
}

#[derive(Deserialize)]
pub struct LikeParams {
    category_id: Option<String>,
}

/// Plain-text like count for the AJAX button; `0` when nothing was liked.
pub async fn like_category(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    uri: Uri,
    Query(params): Query<LikeParams>,
) -> Result<(CookieJar, String), AppError> {
    let (jar, session) = Session::open(&state.pool, jar).await?;
    session.require_user(uri.path_and_query().map_or(uri.path(), |pq| pq.as_str()))?;

    let Some(id) = params
        .category_id
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
    else {
        return Ok((jar, "0".to_string()));
    };

    let likes = match store::like_category(&state.pool, id).await {
        Ok(likes) => likes.unwrap_or(0),
        Err(e) => {
            warn!("Failed to like category {id}: {e}");
            0
        }
    };

    Ok((jar, likes.to_string()))
}

#[derive(Deserialize)]
pub struct SuggestParams {
    suggestion: Option<String>,
}

#[derive(Serialize)]
struct SuggestView {
    cat_list: Vec<CategoryLink>,
}

async fn suggestions(state: &AppState, prefix: Option<&str>) -> Result<Html<String>, AppError> {
    let cat_list =
        store::list_categories(&state.pool, SUGGESTION_COUNT, prefix.unwrap_or_default()).await?;

    render(
        &state.templates,
        "category_list.html",
        &SuggestView { cat_list },
    )
}

pub async fn suggest_category(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestParams>,
) -> Result<Html<String>, AppError> {
    suggestions(&state, params.suggestion.as_deref()).await
}

pub async fn suggest_category_post(
    State(state): State<Arc<AppState>>,
    Form(params): Form<SuggestParams>,
) -> Result<Html<String>, AppError> {
    suggestions(&state, params.suggestion.as_deref()).await
}
