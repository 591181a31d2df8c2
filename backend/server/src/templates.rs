//! # Templates
//!
//! Server-rendered HTML, minijinja based. Sources are compiled into the
//! binary so a deployment is a single file plus its database.
//!
//! Every page extends `base.html`, which expects the layout fields
//! `user` (optional username) and `cat_list` (sidebar categories).
use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;

use crate::error::AppError;

const TEMPLATES: [(&str, &str); 13] = [
    ("base.html", include_str!("../templates/base.html")),
    ("category_list.html", include_str!("../templates/category_list.html")),
    ("results.html", include_str!("../templates/results.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("about.html", include_str!("../templates/about.html")),
    ("category.html", include_str!("../templates/category.html")),
    ("add_category.html", include_str!("../templates/add_category.html")),
    ("add_page.html", include_str!("../templates/add_page.html")),
    ("register.html", include_str!("../templates/register.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("profile.html", include_str!("../templates/profile.html")),
    ("restricted.html", include_str!("../templates/restricted.html")),
    ("search.html", include_str!("../templates/search.html")),
];

pub fn load() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();

    for (name, source) in TEMPLATES {
        env.add_template(name, source)?;
    }

    Ok(env)
}

pub fn render<S: Serialize>(
    env: &Environment<'static>,
    name: &str,
    context: &S,
) -> Result<Html<String>, AppError> {
    let html = env.get_template(name)?.render(context)?;

    Ok(Html(html))
}

#[cfg(test)]
mod tests {
    use minijinja::context;

    use super::*;

    #[test]
    fn test_all_templates_compile() {
        let env = load().unwrap();

        for (name, _) in TEMPLATES {
            assert!(env.get_template(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_output_is_escaped() {
        let env = load().unwrap();
        let html = render(
            &env,
            "category_list.html",
            &context! { cat_list => vec![context! { name => "<script>", url => "x" }] },
        )
        .unwrap();

        assert!(html.0.contains("&lt;script&gt;"));
        assert!(!html.0.contains("<script>"));
    }
}
