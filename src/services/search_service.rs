//! Proximity Search Service
//!
//! Decomposes a radius query into spatial-hash range scans, then
//! post-filters candidates by true haversine distance. Range scans are
//! best-effort: a failing scan drops one grid cell of candidates, not
//! the whole search.

use crate::db::sqlite::models::Provider;
use crate::error::{AppError, Result};
use crate::geo;
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Proximity search parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub lat: f64,
    pub lng: f64,
    /// Defaults to the configured search radius when absent
    pub radius_m: Option<f64>,
    pub category: Option<String>,
}

/// One provider within the search radius
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHit {
    pub provider: Provider,
    pub distance_m: f64,
}

/// Search service for business logic
pub struct SearchService;

impl SearchService {
    /// Find providers within `radius_m` of the given point, nearest first.
    pub fn search(state: &AppState, query: &SearchQuery) -> Result<Vec<ProviderHit>> {
        if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lng) {
            return Err(AppError::Validation(format!(
                "Invalid search center ({}, {})",
                query.lat, query.lng
            )));
        }

        let settings = state.sqlite.get_settings()?;
        let radius_m = query
            .radius_m
            .unwrap_or(settings.default_radius_m)
            .min(settings.max_radius_m);
        if radius_m <= 0.0 {
            return Err(AppError::Validation(
                "Search radius must be positive".to_string(),
            ));
        }

        let ranges = geo::cover_radius(query.lat, query.lng, radius_m);
        let category = query.category.as_deref();
        let candidates = Self::collect_ranges(&ranges, |range| {
            state
                .sqlite
                .find_providers_in_hash_range(&range.lo, &range.hi, category)
        })?;

        let mut hits: Vec<ProviderHit> = candidates
            .into_iter()
            .filter_map(|provider| {
                let distance_m =
                    geo::haversine_distance(query.lat, query.lng, provider.lat, provider.lng);
                if distance_m <= radius_m {
                    Some(ProviderHit {
                        provider,
                        distance_m,
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        Ok(hits)
    }

    /// Scan every range, dropping failed scans. Overlapping ranges can
    /// return the same provider twice; dedupe by id. Only when every scan
    /// fails is the store treated as unavailable.
    fn collect_ranges(
        ranges: &[geo::HashRange],
        mut scan: impl FnMut(&geo::HashRange) -> Result<Vec<Provider>>,
    ) -> Result<Vec<Provider>> {
        let mut candidates: Vec<Provider> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut failed = 0usize;

        for range in ranges {
            match scan(range) {
                Ok(providers) => {
                    for provider in providers {
                        if seen.insert(provider.id.clone()) {
                            candidates.push(provider);
                        }
                    }
                }
                Err(e) => {
                    warn!("Range scan [{}, {}] failed: {}", range.lo, range.hi, e);
                    failed += 1;
                }
            }
        }

        if !ranges.is_empty() && failed == ranges.len() {
            return Err(AppError::StoreUnavailable(
                "All spatial range scans failed".to_string(),
            ));
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::NewProvider;
    use tempfile::tempdir;

    fn seed_provider(state: &AppState, name: &str, lat: f64, lng: f64, category: &str) {
        state
            .sqlite
            .create_provider(&NewProvider {
                user_id: format!("u-{}", name),
                display_name: name.to_string(),
                categories: vec![category.to_string()],
                base_price: 100.0,
                lat,
                lng,
            })
            .unwrap();
    }

    #[test]
    fn test_radius_includes_and_excludes() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        // ~516 m from the search center
        seed_provider(&state, "nearby", 52.4100, 16.9300, "Hydraulik");

        let center = SearchQuery {
            lat: 52.4064,
            lng: 16.9252,
            radius_m: Some(5000.0),
            category: None,
        };
        let hits = SearchService::search(&state, &center).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].distance_m > 400.0 && hits[0].distance_m < 600.0);

        let tight = SearchQuery {
            radius_m: Some(500.0),
            ..center
        };
        assert!(SearchService::search(&state, &tight).unwrap().is_empty());
    }

    #[test]
    fn test_results_sorted_and_deduped() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        seed_provider(&state, "far", 52.4500, 16.9700, "Elektryk");
        seed_provider(&state, "near", 52.4080, 16.9260, "Elektryk");
        seed_provider(&state, "mid", 52.4200, 16.9400, "Elektryk");

        let hits = SearchService::search(
            &state,
            &SearchQuery {
                lat: 52.4064,
                lng: 16.9252,
                radius_m: Some(20_000.0),
                category: None,
            },
        )
        .unwrap();

        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|w| w[0].distance_m <= w[1].distance_m));
        let mut ids: Vec<&str> = hits.iter().map(|h| h.provider.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_category_filter() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        seed_provider(&state, "plumber", 52.4080, 16.9260, "Hydraulik");
        seed_provider(&state, "electrician", 52.4085, 16.9270, "Elektryk");

        let hits = SearchService::search(
            &state,
            &SearchQuery {
                lat: 52.4064,
                lng: 16.9252,
                radius_m: Some(5000.0),
                category: Some("Hydraulik".to_string()),
            },
        )
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].provider.display_name, "plumber");
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let hits = SearchService::search(
            &state,
            &SearchQuery {
                lat: 52.4064,
                lng: 16.9252,
                radius_m: Some(1000.0),
                category: None,
            },
        )
        .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_rejects_invalid_center() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let result = SearchService::search(
            &state,
            &SearchQuery {
                lat: 91.0,
                lng: 0.0,
                radius_m: None,
                category: None,
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    fn stub_provider(id: &str, lat: f64, lng: f64) -> Provider {
        Provider {
            id: id.to_string(),
            user_id: format!("u-{}", id),
            display_name: id.to_string(),
            categories: vec!["Hydraulik".to_string()],
            base_price: 100.0,
            rating: 0.0,
            review_count: 0,
            online: false,
            busy: false,
            lat,
            lng,
            geohash: geo::encode(lat, lng, geo::DEFAULT_PRECISION),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_tiny_radius_finds_provider_at_center() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        seed_provider(&state, "onsite", 52.4064, 16.9252, "Hydraulik");

        // Radius far below one stored grid cell
        let hits = SearchService::search(
            &state,
            &SearchQuery {
                lat: 52.4064,
                lng: 16.9252,
                radius_m: Some(1.0),
                category: None,
            },
        )
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].distance_m < 1.0);
    }

    #[test]
    fn test_partial_scan_failure_keeps_results() {
        let ranges = geo::cover_radius(52.4064, 16.9252, 5_000.0);
        let broken = ranges[0].lo.clone();

        let candidates = SearchService::collect_ranges(&ranges, |range| {
            if range.lo == broken {
                Err(AppError::StoreUnavailable("index offline".to_string()))
            } else {
                Ok(vec![stub_provider("survivor", 52.4080, 16.9260)])
            }
        })
        .unwrap();

        // One lost cell, and duplicates from the healthy scans collapse
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "survivor");
    }

    #[test]
    fn test_all_scans_failing_is_store_unavailable() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        seed_provider(&state, "lost", 52.4080, 16.9260, "Hydraulik");
        state
            .sqlite
            .with_conn(|conn| conn.execute_batch("DROP TABLE providers"))
            .unwrap();

        let result = SearchService::search(
            &state,
            &SearchQuery {
                lat: 52.4064,
                lng: 16.9252,
                radius_m: Some(5_000.0),
                category: None,
            },
        );
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    }

    #[test]
    fn test_radius_clamped_to_maximum() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        // ~60 km away, outside the 50 km configured maximum
        seed_provider(&state, "distant", 52.9450, 16.9252, "Malarz");

        let hits = SearchService::search(
            &state,
            &SearchQuery {
                lat: 52.4064,
                lng: 16.9252,
                radius_m: Some(500_000.0),
                category: None,
            },
        )
        .unwrap();
        assert!(hits.is_empty());
    }
}
