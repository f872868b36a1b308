use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::audit::AuditLog;
use crate::cache::GeocodeCache;
use crate::extract::extract_document;
use crate::indexer::IndexWriter;
use crate::model::{normalize_query, GeocodeResult, GeocodeSuggestion};
use crate::providers::{GeocodeProvider, ProviderHit};
use crate::zip::{is_zip_candidate, ZipTable};

/// Queries containing any of these as a whole word are classified
/// non-domestic and skip the self-hosted index, which only covers one
/// country.
const NON_DOMESTIC_MARKERS: &[&str] = &[
    "uk",
    "united kingdom",
    "great britain",
    "england",
    "scotland",
    "wales",
    "northern ireland",
    "ireland",
    "canada",
    "australia",
    "new zealand",
    "germany",
    "france",
    "spain",
    "italy",
    "portugal",
    "netherlands",
    "belgium",
    "switzerland",
    "austria",
    "sweden",
    "norway",
    "denmark",
    "finland",
    "poland",
    "czechia",
    "japan",
    "china",
    "taiwan",
    "korea",
    "singapore",
    "philippines",
    "mexico",
    "brazil",
    "argentina",
    "chile",
    "india",
    "south africa",
];

const MIN_AUTOCOMPLETE_CHARS: usize = 2;

/// Which optional providers participate in the cascade. Injected at
/// construction so enable/disable decisions live in one testable seam.
#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    pub self_hosted_enabled: bool,
}

/// The resolution orchestrator: fast-path postal lookup, result cache, then
/// the provider precedence cascade. Terminal on first success; every
/// provider failure is swallowed and treated as "no result".
pub struct Resolver {
    options: ResolverOptions,
    zip: ZipTable,
    cache: GeocodeCache,
    primary: Option<Arc<dyn GeocodeProvider>>,
    self_hosted: Arc<dyn GeocodeProvider>,
    public_fallback: Arc<dyn GeocodeProvider>,
    indexer: IndexWriter,
    audit: AuditLog,
}

impl Resolver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        options: ResolverOptions,
        zip: ZipTable,
        cache: GeocodeCache,
        primary: Option<Arc<dyn GeocodeProvider>>,
        self_hosted: Arc<dyn GeocodeProvider>,
        public_fallback: Arc<dyn GeocodeProvider>,
        indexer: IndexWriter,
        audit: AuditLog,
    ) -> Self {
        Self {
            options,
            zip,
            cache,
            primary,
            self_hosted,
            public_fallback,
            indexer,
            audit,
        }
    }

    /// Forward geocoding. `None` means the cascade exhausted without a match;
    /// the caller translates that into "not found", never into an error.
    pub async fn resolve(&self, query: &str) -> Option<GeocodeResult> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return None;
        }

        // Postal codes resolve from the reference table alone and never
        // consult the cache or a provider. A valid-looking code that is
        // missing falls through, since the table may be incomplete.
        if is_zip_candidate(&normalized) {
            if let Some(record) = self.zip.lookup(&normalized) {
                debug!(code = normalized, "postal fast path hit");
                return Some(record.to_result());
            }
            debug!(code = normalized, "postal code not in reference table");
        }

        if let Some(hit) = self.cache.get(&normalized) {
            debug!(query = normalized, "cache hit");
            return Some(hit);
        }

        if let Some(primary) = &self.primary {
            if let Some(hit) = self.try_forward(primary.as_ref(), query).await {
                self.cache.put(&normalized, &hit.result);
                return Some(hit.result);
            }
        }

        if self.options.self_hosted_enabled && !is_non_domestic(&normalized) {
            if let Some(hit) = self.try_forward(self.self_hosted.as_ref(), query).await {
                self.cache.put(&normalized, &hit.result);
                return Some(hit.result);
            }
        }

        if let Some(hit) = self.public_forward(query).await {
            self.cache.put(&normalized, &hit.result);
            return Some(hit.result);
        }

        None
    }

    /// Reverse geocoding. No cache on this path; the public provider is the
    /// universal last resort and is tried even when self-hosting is disabled.
    pub async fn resolve_reverse(&self, latitude: f64, longitude: f64) -> Option<GeocodeResult> {
        if let Some(primary) = &self.primary {
            if let Some(hit) = self.try_reverse(primary.as_ref(), latitude, longitude).await {
                return Some(hit.result);
            }
        }

        if self.options.self_hosted_enabled {
            if let Some(hit) = self
                .try_reverse(self.self_hosted.as_ref(), latitude, longitude)
                .await
            {
                return Some(hit.result);
            }
        }

        self.audit_public_call("reverse", &format!("{latitude},{longitude}"));
        let hit = self
            .try_reverse(self.public_fallback.as_ref(), latitude, longitude)
            .await?;
        self.maybe_index(None, &hit);
        Some(hit.result)
    }

    /// Autocomplete. Postal exact match short-circuits with one suggestion;
    /// the public provider is never used on this path.
    pub async fn suggest(&self, query: &str, limit: usize) -> Vec<GeocodeSuggestion> {
        let normalized = normalize_query(query);
        if normalized.chars().count() < MIN_AUTOCOMPLETE_CHARS {
            return Vec::new();
        }

        if is_zip_candidate(&normalized) {
            if let Some(record) = self.zip.lookup(&normalized) {
                return vec![record.to_suggestion()];
            }
        }

        if let Some(primary) = &self.primary {
            match primary.autocomplete(query, limit).await {
                Ok(suggestions) if !suggestions.is_empty() => {
                    return dedup_suggestions(suggestions);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(provider = primary.name(), ?err, "autocomplete failed; advancing cascade");
                }
            }
        }

        if self.options.self_hosted_enabled && !is_non_domestic(&normalized) {
            match self.self_hosted.autocomplete(query, limit).await {
                Ok(suggestions) => return dedup_suggestions(suggestions),
                Err(err) => {
                    warn!(provider = self.self_hosted.name(), ?err, "autocomplete failed");
                }
            }
        }

        Vec::new()
    }

    async fn public_forward(&self, query: &str) -> Option<ProviderHit> {
        self.audit_public_call("forward", query);
        let hit = self.try_forward(self.public_fallback.as_ref(), query).await?;
        self.maybe_index(Some(query), &hit);
        Some(hit)
    }

    async fn try_forward(&self, provider: &dyn GeocodeProvider, query: &str) -> Option<ProviderHit> {
        match provider.forward(query).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!(provider = provider.name(), ?err, "forward geocode failed; advancing cascade");
                None
            }
        }
    }

    async fn try_reverse(
        &self,
        provider: &dyn GeocodeProvider,
        latitude: f64,
        longitude: f64,
    ) -> Option<ProviderHit> {
        match provider.reverse(latitude, longitude).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!(provider = provider.name(), ?err, "reverse geocode failed; advancing cascade");
                None
            }
        }
    }

    /// A used public-index result feeds the self-hosted index. Best-effort
    /// end to end; a result is returned to the caller regardless.
    fn maybe_index(&self, query: Option<&str>, hit: &ProviderHit) {
        let Some(facts) = &hit.place else {
            return;
        };
        if let Some(document) = extract_document(query, facts) {
            self.indexer.enqueue(document);
        }
    }

    fn audit_public_call(&self, op: &str, input: &str) {
        if let Err(err) = self.audit.record(
            "photon_public_call",
            json!({
                "op": op,
                "input": input,
                "provider": self.public_fallback.name(),
            }),
        ) {
            warn!(?err, "failed to record public provider audit event");
        }
    }
}

/// Collapses suggestions sharing (display name, kind); first occurrence
/// wins and order is otherwise preserved. A single provider response often
/// repeats one named place under several administrative classifications.
pub fn dedup_suggestions(suggestions: Vec<GeocodeSuggestion>) -> Vec<GeocodeSuggestion> {
    let mut seen = HashSet::new();
    suggestions
        .into_iter()
        .filter(|s| seen.insert((s.display_name.clone(), s.kind.clone())))
        .collect()
}

/// Whole-word scan of the normalized query against the marker list.
pub fn is_non_domestic(normalized_query: &str) -> bool {
    NON_DOMESTIC_MARKERS
        .iter()
        .any(|marker| contains_word(normalized_query, marker))
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    let bytes = haystack.as_bytes();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let boundary_before = begin == 0 || !bytes[begin - 1].is_ascii_alphanumeric();
        let boundary_after = end == haystack.len() || !bytes[end].is_ascii_alphanumeric();
        if boundary_before && boundary_after {
            return true;
        }
        start = begin + 1;
    }
    false
}
