//! Slug generation for events, posts and job postings.
//!
//! Slugs are the public identifiers in detail URLs. The repository supplies a
//! uniqueness predicate so generation itself stays pure.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

/// Errors of [`generate_unique_slug`], whose uniqueness check can fail.
#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Produce a slug that does not collide according to `is_unique`.
///
/// The predicate returns `true` when the candidate is free (for example after
/// asking a repository). Collisions are resolved by suffixing a counter
/// (`-2`, `-3`, …).
pub async fn generate_unique_slug<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(base.clone()).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_unique(candidate.clone())
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        let slug = derive_slug("RustConf 2026: Day One").expect("slug");
        assert_eq!(slug, "rustconf-2026-day-one");
    }

    #[test]
    fn blank_input_is_rejected() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn punctuation_only_input_is_unrepresentable() {
        assert!(matches!(
            derive_slug("!!!"),
            Err(SlugError::Unrepresentable { .. })
        ));
    }

    #[derive(Debug, Error)]
    #[error("lookup failed")]
    struct LookupFailed;

    #[tokio::test]
    async fn generate_unique_slug_appends_counter() {
        let existing = ["senior-rust-engineer".to_string()];
        let slug = generate_unique_slug("Senior Rust Engineer", |candidate| {
            let free = !existing.contains(&candidate);
            async move { Ok::<_, LookupFailed>(free) }
        })
        .await
        .expect("unique slug");

        assert_eq!(slug, "senior-rust-engineer-2");
    }

    #[tokio::test]
    async fn generate_unique_slug_gives_up_eventually() {
        let err = generate_unique_slug("Meetup", |_| async { Ok::<_, LookupFailed>(false) })
            .await
            .expect_err("exhausted");
        assert!(matches!(
            err,
            SlugAsyncError::Slug(SlugError::Exhausted { ref base }) if base == "meetup"
        ));
    }

    #[tokio::test]
    async fn predicate_errors_are_propagated() {
        let err = generate_unique_slug("Meetup", |_| async { Err::<bool, _>(LookupFailed) })
            .await
            .expect_err("predicate failure");
        assert!(matches!(err, SlugAsyncError::Predicate(LookupFailed)));
    }
}
