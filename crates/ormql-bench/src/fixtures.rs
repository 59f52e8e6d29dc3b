//! Mappings and flat result rows for benchmarks.
//!
//! Row generation is seeded so runs are reproducible.

use ormql_core::{CollectionNavigation, EntityMapping, ForeignKey, MappingRegistry, Result};
use ormql_proto::Value;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Scale factor for generated result sets.
#[derive(Clone, Copy, Debug, Default)]
pub enum Scale {
    /// 10 users, 2 posts each, 1 comment per post.
    Tiny,
    /// 100 users, 5 posts each, 3 comments per post.
    Small,
    /// 2,000 users, 5 posts each, 2 comments per post.
    #[default]
    Medium,
    /// 20,000 users, 10 posts each, 5 comments per post.
    Large,
}

impl Scale {
    /// Number of users (root entities).
    pub fn count(&self) -> usize {
        match self {
            Scale::Tiny => 10,
            Scale::Small => 100,
            Scale::Medium => 2_000,
            Scale::Large => 20_000,
        }
    }

    pub fn posts_per_user(&self) -> usize {
        match self {
            Scale::Tiny => 2,
            Scale::Small | Scale::Medium => 5,
            Scale::Large => 10,
        }
    }

    pub fn comments_per_post(&self) -> usize {
        match self {
            Scale::Tiny => 1,
            Scale::Small => 3,
            Scale::Medium => 2,
            Scale::Large => 5,
        }
    }

    /// Flat rows produced by `User -> Posts -> Comments`.
    pub fn row_count(&self) -> usize {
        self.count() * self.posts_per_user() * self.comments_per_post()
    }
}

/// User / Post / Comment blog mappings.
///
/// `User.Posts` and `Post.Comments` are collections; `Post.Author` and
/// `Comment.Post` are references.
pub fn blog_registry() -> Result<MappingRegistry> {
    let user = EntityMapping::builder("User", "users")
        .key("Id")
        .column("Id")
        .column("Name")
        .column("Email")
        .column("Age")
        .column("Status")
        .collection(CollectionNavigation::list("Posts", "Post"))
        .build();

    let post = EntityMapping::builder("Post", "posts")
        .key("Id")
        .column("Id")
        .column("Title")
        .column("AuthorId")
        .column("Views")
        .foreign_key(ForeignKey::new("Author", "AuthorId", "User", "Id"))
        .collection(CollectionNavigation::list("Comments", "Comment"))
        .build();

    let comment = EntityMapping::builder("Comment", "comments")
        .key("Id")
        .column("Id")
        .column("PostId")
        .column("Body")
        .foreign_key(ForeignKey::new("Post", "PostId", "Post", "Id"))
        .build();

    let registry = MappingRegistry::new()
        .with_mapping(user?)
        .with_mapping(post?)
        .with_mapping(comment?);
    registry.validate()?;
    Ok(registry)
}

fn random_string(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Flat rows for `User` with `Posts` then `Comments`, in plan column order.
pub fn blog_rows(scale: Scale, seed: u64) -> Vec<Vec<Value>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(scale.row_count());
    let mut post_id = 0i64;
    let mut comment_id = 0i64;

    for user_id in 0..scale.count() as i64 {
        let name = random_string(&mut rng, 12);
        let email = format!("{}@example.com", name.to_lowercase());
        let age = Value::Int32(rng.gen_range(18..80));
        let status = Value::from(if rng.gen_bool(0.8) { "active" } else { "inactive" });

        for _ in 0..scale.posts_per_user() {
            post_id += 1;
            let title = random_string(&mut rng, 24);
            let views = Value::Int64(rng.gen_range(0..10_000));

            for _ in 0..scale.comments_per_post() {
                comment_id += 1;
                rows.push(vec![
                    Value::Int64(user_id),
                    Value::from(name.as_str()),
                    Value::from(email.as_str()),
                    age.clone(),
                    status.clone(),
                    Value::Int64(post_id),
                    Value::from(title.as_str()),
                    Value::Int64(user_id),
                    views.clone(),
                    Value::Int64(comment_id),
                    Value::Int64(post_id),
                    Value::from(random_string(&mut rng, 40)),
                ]);
            }
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormql_core::MappingResolver;

    #[test]
    fn test_rows_match_scale() {
        let rows = blog_rows(Scale::Tiny, 7);
        assert_eq!(rows.len(), Scale::Tiny.row_count());
        assert!(rows.iter().all(|row| row.len() == 12));
        assert_eq!(rows, blog_rows(Scale::Tiny, 7));
    }

    #[test]
    fn test_registry_resolves_all_types() {
        let registry = blog_registry().unwrap();
        for entity in ["User", "Post", "Comment"] {
            assert!(registry.resolve(entity).is_some());
        }
    }
}
