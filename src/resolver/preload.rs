use std::future::Future;

use super::ImageSourceResolver;
use crate::state::session::SessionStore;

/// What happened to a warm-up request. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadOutcome {
    Warmed { name: String },
    Failed { name: String, reason: String },
}

/// Resolves the image after the cursor in the background so the next
/// navigation finds its URI cached.
#[derive(Clone)]
pub struct Preloader {
    resolver: ImageSourceResolver,
    enabled: bool,
}

impl Preloader {
    pub fn new(resolver: ImageSourceResolver, enabled: bool) -> Self {
        Self { resolver, enabled }
    }

    /// Build the warm-up future for the record after the cursor.
    ///
    /// Returns None when preloading is off, the session is empty or the
    /// cursor is on the last image. The future never fails; errors are
    /// logged and reported as [`PreloadOutcome::Failed`].
    pub fn warm_next(
        &self,
        session: &SessionStore,
    ) -> Option<impl Future<Output = PreloadOutcome> + Send + 'static> {
        if !self.enabled {
            return None;
        }
        session.current_image()?;
        let next = session.peek_next()?.clone();
        let resolver = self.resolver.clone();

        Some(async move {
            match resolver.resolve(&next).await {
                Ok(_) => {
                    log::debug!("Preloaded {}", next.name);
                    PreloadOutcome::Warmed { name: next.name }
                }
                Err(e) => {
                    log::warn!("Preload of {} failed: {}", next.name, e);
                    PreloadOutcome::Failed {
                        name: next.name,
                        reason: e.to_string(),
                    }
                }
            }
        })
    }
}
