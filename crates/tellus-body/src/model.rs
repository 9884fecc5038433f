//! Priority-ordered elevation provider registry.

use std::sync::Arc;

use glam::DVec2;
use tellus_geo::{GeoPolygon, GeoPos};

use crate::provider::{ElevationProvider, ProviderId};

/// Resolution and variance hints aggregated over a polygon.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolygonHints {
    /// Finest resolution hint of any provider touching the polygon.
    pub resolution_hint_m: Option<f64>,
    /// Smallest minimum-variance threshold of any provider touching it.
    pub min_variance: Option<f64>,
}

/// The elevation-manager boundary: a priority-ordered list of providers with
/// dominant-provider lookup and polygon-level hint aggregation.
///
/// Earlier entries take priority over later ones.
#[derive(Clone, Default)]
pub struct ElevationModel {
    providers: Vec<(ProviderId, Arc<dyn ElevationProvider>)>,
    next_id: u32,
}

impl ElevationModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider at the lowest priority; returns its handle.
    pub fn add_provider(&mut self, provider: Arc<dyn ElevationProvider>) -> ProviderId {
        let id = ProviderId(self.next_id);
        self.next_id += 1;
        self.providers.push((id, provider));
        id
    }

    /// Remove a provider. Unknown handles are ignored.
    pub fn remove_provider(&mut self, id: ProviderId) {
        self.providers.retain(|(pid, _)| *pid != id);
    }

    /// Move a provider to a new priority rank (0 = highest).
    pub fn set_priority(&mut self, id: ProviderId, rank: usize) {
        if let Some(pos) = self.providers.iter().position(|(pid, _)| *pid == id) {
            let entry = self.providers.remove(pos);
            let rank = rank.min(self.providers.len());
            self.providers.insert(rank, entry);
        }
    }

    /// All providers in priority order.
    pub fn providers(&self) -> impl Iterator<Item = (ProviderId, &Arc<dyn ElevationProvider>)> {
        self.providers.iter().map(|(id, p)| (*id, p))
    }

    /// Look up a provider by handle.
    #[must_use]
    pub fn provider(&self, id: ProviderId) -> Option<&Arc<dyn ElevationProvider>> {
        self.providers
            .iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, p)| p)
    }

    /// The highest-priority provider covering the projected point.
    #[must_use]
    pub fn dominant_provider(&self, p: DVec2) -> Option<ProviderId> {
        self.providers
            .iter()
            .find(|(_, provider)| provider.bounding_box().contains(p))
            .map(|(id, _)| *id)
    }

    /// Terrain elevation at a position: the dominant provider's answer, or 0
    /// where no provider has coverage.
    #[must_use]
    pub fn elevation_at(&self, p: DVec2, allow_approx: bool) -> f64 {
        match self.dominant_provider(p) {
            Some(id) => {
                let pos = GeoPos::on_ellipsoid(p.y, p.x);
                self.provider(id)
                    .map(|prov| prov.elevation_m(&pos, allow_approx))
                    .unwrap_or(0.0)
            }
            None => 0.0,
        }
    }

    /// Finest resolution and smallest variance threshold of any provider
    /// whose coverage touches the polygon.
    #[must_use]
    pub fn hints_for_polygon(&self, polygon: &GeoPolygon) -> PolygonHints {
        let poly_bounds = polygon.bounds();
        let mut hints = PolygonHints::default();
        for (_, provider) in &self.providers {
            if !provider.bounding_box().intersects(&poly_bounds) {
                continue;
            }
            let res = provider.resolution_hint_m();
            hints.resolution_hint_m = Some(match hints.resolution_hint_m {
                Some(r) => r.min(res),
                None => res,
            });
            let var = provider.min_variance();
            hints.min_variance = Some(match hints.min_variance {
                Some(v) => v.min(var),
                None => var,
            });
        }
        hints
    }

    /// Whether any provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
