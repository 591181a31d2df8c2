//! # Populate
//!
//! Seeds a Rango store with a few starter categories and pages.
//!
//! Safe to rerun: categories that already exist are left alone, together
//! with their pages.
use directory::{DirectoryError, DirectoryResult, SqlitePool, store};

pub struct SeedCategory {
    pub name: &'static str,
    pub views: i64,
    pub likes: i64,
    pub pages: &'static [(&'static str, &'static str)],
}

pub const SEED: [SeedCategory; 3] = [
    SeedCategory {
        name: "Python",
        views: 128,
        likes: 64,
        pages: &[
            ("Official Python Tutorial", "http://docs.python.org/2/tutorial/"),
            ("How to Think like a Computer Scientist", "http://www.greenteapress.com/thinkpython/"),
            ("Learn Python in 10 Minutes", "http://www.korokithakis.net/tutorials/python/"),
        ],
    },
    SeedCategory {
        name: "Django",
        views: 64,
        likes: 32,
        pages: &[
            ("Official Django Tutorial", "https://docs.djangoproject.com/en/1.5/intro/tutorial01/"),
            ("Django Rocks", "http://www.djangorocks.com/"),
            ("How to Tango with Django", "http://www.tangowithdjango.com/"),
        ],
    },
    SeedCategory {
        name: "Other Frameworks",
        views: 32,
        likes: 16,
        pages: &[
            ("Bottle", "http://bottlepy.org/docs/dev/"),
            ("Flask", "http://flask.pocoo.org"),
        ],
    },
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub new_categories: usize,
    pub new_pages: usize,
    pub skipped_categories: usize,
}

pub async fn populate(pool: &SqlitePool, seed: &[SeedCategory]) -> DirectoryResult<Summary> {
    let mut summary = Summary::default();

    for entry in seed {
        let category = match store::insert_category(pool, entry.name, entry.views, entry.likes).await
        {
            Ok(category) => category,
            Err(DirectoryError::Duplicate(_)) => {
                println!("Skipping existing category {}", entry.name);
                summary.skipped_categories += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        summary.new_categories += 1;

        for (title, url) in entry.pages {
            store::insert_page(pool, &category, title, url).await?;
            println!("- {} - {}", category.name, title);
            summary.new_pages += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use directory::store::{connect_in_memory, get_category_by_name, list_categories, pages_for_category};

    use super::*;

    #[tokio::test]
    async fn test_seed_then_rerun() {
        let pool = connect_in_memory().await.unwrap();

        let first = populate(&pool, &SEED).await.unwrap();
        assert_eq!(
            first,
            Summary {
                new_categories: 3,
                new_pages: 8,
                skipped_categories: 0,
            }
        );

        let second = populate(&pool, &SEED).await.unwrap();
        assert_eq!(second.new_categories, 0);
        assert_eq!(second.skipped_categories, 3);

        assert_eq!(list_categories(&pool, 0, "").await.unwrap().len(), 3);

        let django = get_category_by_name(&pool, "Django").await.unwrap().unwrap();
        assert_eq!(django.views, 64);
        assert_eq!(django.likes, 32);
        assert_eq!(pages_for_category(&pool, django.id).await.unwrap().len(), 3);
    }
}
