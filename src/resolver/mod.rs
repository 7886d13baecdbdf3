//! Image source resolution
//!
//! This module turns an image path into something the display can load:
//! - Capability probe deciding between direct file URIs and base64 (capability.rs)
//! - Bounded cache of resolved URIs (cache.rs)
//! - Look-ahead warm-up of the next image (preload.rs)

pub mod cache;
pub mod capability;
pub mod preload;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::HostBridge;
use crate::error::{ProbeError, ResolveError};
use crate::state::data::ImageRecord;
use crate::uri;

pub use cache::UriCache;
pub use capability::{CapabilityContext, ProbeState, Strategy};
pub use preload::{PreloadOutcome, Preloader};

/// How long the probe waits for the decoder before giving up
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Converts image records into display URIs.
///
/// Cloning is cheap; clones share the bridge, the capability verdict and
/// the URI cache.
#[derive(Clone)]
pub struct ImageSourceResolver {
    bridge: Arc<dyn HostBridge>,
    capability: Arc<CapabilityContext>,
    cache: Arc<UriCache>,
    probe_timeout: Duration,
}

impl ImageSourceResolver {
    pub fn new(
        bridge: Arc<dyn HostBridge>,
        capability: Arc<CapabilityContext>,
        probe_timeout: Duration,
        cache_capacity: usize,
    ) -> Self {
        Self {
            bridge,
            capability,
            cache: Arc::new(UriCache::new(cache_capacity)),
            probe_timeout,
        }
    }

    /// Resolve a record into a URI the display can load.
    ///
    /// The first call in the lifetime of the capability context runs the
    /// probe; later calls reuse its verdict. Fails only when the base64
    /// fallback cannot read the file.
    pub async fn resolve(&self, record: &ImageRecord) -> Result<String, ResolveError> {
        if let Some(uri) = self.cache.get(&record.path) {
            log::debug!("URI cache hit: {}", record.name);
            return Ok(uri);
        }

        let strategy = self
            .capability
            .get_or_probe(|| self.probe(&record.path))
            .await;

        match strategy {
            Strategy::Direct => match self.bridge.convert_path_to_display_uri(&record.path) {
                Ok(display_uri) => {
                    self.cache.insert(&record.path, display_uri.clone());
                    Ok(display_uri)
                }
                Err(e) => {
                    // Last resort: hand the raw path to the display
                    log::warn!("Direct conversion failed, using raw path: {}", e);
                    Ok(record.path.clone())
                }
            },
            Strategy::Base64 => self.encode(record).await,
        }
    }

    /// Re-read one record through the base64 path after it failed to display.
    ///
    /// The capability verdict is left alone: one broken file says nothing
    /// about the environment. The new data URI replaces any cached entry for
    /// the path.
    pub async fn resolve_as_base64(&self, record: &ImageRecord) -> Result<String, ResolveError> {
        log::info!("Reloading {} as base64", record.name);
        self.cache.remove(&record.path);
        self.encode(record).await
    }

    pub fn probe_state(&self) -> ProbeState {
        self.capability.state()
    }

    #[cfg(test)]
    pub fn capability(&self) -> &Arc<CapabilityContext> {
        &self.capability
    }

    /// Drop every cached URI (called when the image list is replaced)
    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    #[cfg(test)]
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    async fn encode(&self, record: &ImageRecord) -> Result<String, ResolveError> {
        let payload = self
            .bridge
            .read_file_as_base64(&record.path)
            .await
            .map_err(|reason| ResolveError::ResolutionFailure {
                path: record.path.clone(),
                reason,
            })?;
        let display_uri = uri::data_uri(record.mime_type(), &payload);
        self.cache.insert(&record.path, display_uri.clone());
        Ok(display_uri)
    }

    async fn probe(&self, path: &str) -> Strategy {
        log::debug!("Probing direct display support with {}", path);
        match self.run_probe(path).await {
            Ok(()) => {
                log::info!("Direct file URIs are usable, using direct strategy");
                Strategy::Direct
            }
            Err(e) => {
                log::warn!("{}; falling back to base64 data URIs", e);
                Strategy::Base64
            }
        }
    }

    async fn run_probe(&self, path: &str) -> Result<(), ProbeError> {
        let candidate = self
            .bridge
            .convert_path_to_display_uri(path)
            .map_err(ProbeError::Conversion)?;

        match tokio::time::timeout(self.probe_timeout, self.bridge.load_display_uri(&candidate)).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::Decode(e)),
            Err(_) => Err(ProbeError::Timeout(self.probe_timeout)),
        }
    }
}

/// A resolved URI in the shape the image widget consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySource {
    File(PathBuf),
    Encoded { mime: String, bytes: Vec<u8> },
}

impl DisplaySource {
    /// Interpret a URI produced by [`ImageSourceResolver::resolve`].
    /// Anything that is neither a file nor a data URI is treated as a raw path.
    pub fn from_uri(display_uri: &str) -> Option<Self> {
        if display_uri.starts_with("data:") {
            let (mime, bytes) = uri::decode_data_uri(display_uri)?;
            return Some(DisplaySource::Encoded { mime, bytes });
        }
        if display_uri.starts_with("file:") {
            return uri::path_from_file_uri(display_uri).map(DisplaySource::File);
        }
        if display_uri.is_empty() {
            return None;
        }
        Some(DisplaySource::File(PathBuf::from(display_uri)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::MockBridge;
    use crate::state::data::fixtures::{record, records};
    use std::sync::atomic::Ordering;

    fn resolver_with(bridge: Arc<MockBridge>, timeout: Duration) -> ImageSourceResolver {
        ImageSourceResolver::new(bridge, Arc::new(CapabilityContext::new()), timeout, 32)
    }

    #[tokio::test]
    async fn test_capable_environment_uses_file_uri() {
        let bridge = Arc::new(MockBridge::new());
        let resolver = resolver_with(bridge.clone(), DEFAULT_PROBE_TIMEOUT);

        let uri = resolver.resolve(&record("a.jpg")).await.unwrap();

        assert_eq!(uri, "file:///photos/a.jpg");
        assert_eq!(resolver.probe_state(), ProbeState::Capable);
        assert_eq!(MockBridge::count(&bridge.base64_calls), 0);
    }

    #[tokio::test]
    async fn test_decode_failure_selects_fallback_with_extension_mime() {
        let bridge = Arc::new(MockBridge::new());
        bridge.decode_fails.store(true, Ordering::SeqCst);
        let resolver = resolver_with(bridge.clone(), DEFAULT_PROBE_TIMEOUT);

        let png = resolver.resolve(&record("a.png")).await.unwrap();
        let tiff = resolver.resolve(&record("b.TIFF")).await.unwrap();

        assert_eq!(png, "data:image/png;base64,AQID");
        assert_eq!(tiff, "data:image/tiff;base64,AQID");
        assert_eq!(resolver.probe_state(), ProbeState::Fallback);
    }

    #[tokio::test]
    async fn test_probe_timeout_is_permanent() {
        let bridge = Arc::new(MockBridge::new());
        bridge.set_decode_delay(Duration::from_millis(200));
        let resolver = resolver_with(bridge.clone(), Duration::from_millis(20));

        let uri = resolver.resolve(&record("slow.jpg")).await.unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert_eq!(resolver.probe_state(), ProbeState::Fallback);

        // The environment becomes healthy; the verdict must not flip
        bridge.set_decode_delay(Duration::ZERO);
        let uri = resolver.resolve(&record("later.gif")).await.unwrap();
        assert!(uri.starts_with("data:image/gif;base64,"));
        assert_eq!(resolver.probe_state(), ProbeState::Fallback);
        assert_eq!(MockBridge::count(&bridge.decode_calls), 1);
    }

    #[tokio::test]
    async fn test_conversion_failure_during_probe_selects_fallback() {
        let bridge = Arc::new(MockBridge::new());
        bridge.conversion_fails.store(true, Ordering::SeqCst);
        let resolver = resolver_with(bridge.clone(), DEFAULT_PROBE_TIMEOUT);

        let uri = resolver.resolve(&record("a.webp")).await.unwrap();
        assert_eq!(uri, "data:image/webp;base64,AQID");
        assert_eq!(MockBridge::count(&bridge.decode_calls), 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_probe_once() {
        let bridge = Arc::new(MockBridge::new());
        bridge.set_decode_delay(Duration::from_millis(30));
        let resolver = resolver_with(bridge.clone(), DEFAULT_PROBE_TIMEOUT);

        let mut handles = Vec::new();
        for item in records(10) {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move { resolver.resolve(&item).await }));
        }

        for handle in handles {
            let uri = handle.await.unwrap().unwrap();
            assert!(uri.starts_with("file://"));
        }
        assert_eq!(MockBridge::count(&bridge.decode_calls), 1);
        assert_eq!(resolver.capability().probes_started(), 1);
    }

    #[tokio::test]
    async fn test_capable_conversion_error_degrades_to_raw_path() {
        let bridge = Arc::new(MockBridge::new());
        let resolver = resolver_with(bridge.clone(), DEFAULT_PROBE_TIMEOUT);
        resolver.resolve(&record("probe.jpg")).await.unwrap();

        bridge.conversion_fails.store(true, Ordering::SeqCst);
        let uri = resolver.resolve(&record("odd.jpg")).await.unwrap();

        assert_eq!(uri, "/photos/odd.jpg");
        assert_eq!(resolver.probe_state(), ProbeState::Capable);
        assert_eq!(resolver.cached_entries(), 1);
    }

    #[tokio::test]
    async fn test_fallback_read_failure_is_resolution_failure() {
        let bridge = Arc::new(MockBridge::new());
        bridge.decode_fails.store(true, Ordering::SeqCst);
        bridge.base64_fails.store(true, Ordering::SeqCst);
        let resolver = resolver_with(bridge.clone(), DEFAULT_PROBE_TIMEOUT);

        let err = resolver.resolve(&record("locked.bmp")).await.unwrap_err();
        let ResolveError::ResolutionFailure { path, .. } = err;
        assert_eq!(path, "/photos/locked.bmp");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_bridge_and_invalidation_clears() {
        let bridge = Arc::new(MockBridge::new());
        bridge.decode_fails.store(true, Ordering::SeqCst);
        let resolver = resolver_with(bridge.clone(), DEFAULT_PROBE_TIMEOUT);
        let item = record("again.png");

        resolver.resolve(&item).await.unwrap();
        resolver.resolve(&item).await.unwrap();
        assert_eq!(MockBridge::count(&bridge.base64_calls), 1);

        resolver.invalidate_cache();
        resolver.resolve(&item).await.unwrap();
        assert_eq!(MockBridge::count(&bridge.base64_calls), 2);
    }

    #[tokio::test]
    async fn test_base64_reload_keeps_the_verdict() {
        let bridge = Arc::new(MockBridge::new());
        let resolver = resolver_with(bridge.clone(), DEFAULT_PROBE_TIMEOUT);
        let broken = record("broken.png");

        assert_eq!(resolver.resolve(&broken).await.unwrap(), "file:///photos/broken.png");
        assert_eq!(resolver.probe_state(), ProbeState::Capable);

        let reloaded = resolver.resolve_as_base64(&broken).await.unwrap();
        assert_eq!(reloaded, "data:image/png;base64,AQID");
        assert_eq!(resolver.probe_state(), ProbeState::Capable);
        assert_eq!(resolver.capability().probes_started(), 1);

        // The reloaded record now comes from the cache; other records stay direct
        assert_eq!(resolver.resolve(&broken).await.unwrap(), reloaded);
        assert_eq!(
            resolver.resolve(&record("fine.png")).await.unwrap(),
            "file:///photos/fine.png"
        );
        assert_eq!(MockBridge::count(&bridge.base64_calls), 1);
        assert_eq!(MockBridge::count(&bridge.decode_calls), 1);
    }

    #[test]
    fn test_display_source_from_uri() {
        assert_eq!(
            DisplaySource::from_uri("data:image/png;base64,AQID"),
            Some(DisplaySource::Encoded {
                mime: "image/png".to_string(),
                bytes: vec![1, 2, 3],
            })
        );
        assert_eq!(
            DisplaySource::from_uri("/raw/path.jpg"),
            Some(DisplaySource::File(PathBuf::from("/raw/path.jpg")))
        );
        assert_eq!(DisplaySource::from_uri("data:broken"), None);
        assert_eq!(DisplaySource::from_uri(""), None);
    }
}
