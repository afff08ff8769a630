use std::collections::BTreeMap;

use foundation::geo::GeoPoint;
use foundation::ids::EntityId;
use layers::layer::LayerStrategy;
use layers::popup::PopupContent;
use layers::symbology::MarkerVisual;
use scene::entity::Entity;
use serde::Serialize;
use surface::{MapSurface, MarkerBinding, MarkerHandle, SurfaceError};

/// Everything needed to draw one marker. Rebuilt from scratch on every
/// reconcile; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub binding: MarkerBinding,
    pub at: GeoPoint,
    pub visual: MarkerVisual,
    pub popup: PopupContent,
    pub selected: bool,
}

/// Builds one marker spec per map-eligible entity.
///
/// Ordering contract:
/// - Specs follow the order of `entities`; entities without a usable
///   position are skipped.
pub fn plan_markers(
    entities: &[&Entity],
    strategy: &dyn LayerStrategy,
    selected: Option<&EntityId>,
) -> Vec<MarkerSpec> {
    entities
        .iter()
        .filter_map(|e| {
            let at = e.map_position()?;
            let is_selected = selected == Some(&e.id);
            Some(MarkerSpec {
                binding: MarkerBinding::new(strategy.category(), e.id.clone()),
                at,
                visual: strategy.build_visual(e, is_selected),
                popup: strategy.build_popup(e),
                selected: is_selected,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied {
        created: usize,
        removed: usize,
        popup_opened: bool,
    },
    /// The surface went away; whatever was created so far stays with it.
    Aborted { created: usize, removed: usize },
}

impl ReconcileOutcome {
    pub fn created(&self) -> usize {
        match *self {
            ReconcileOutcome::Applied { created, .. } | ReconcileOutcome::Aborted { created, .. } => {
                created
            }
        }
    }

    pub fn removed(&self) -> usize {
        match *self {
            ReconcileOutcome::Applied { removed, .. } | ReconcileOutcome::Aborted { removed, .. } => {
                removed
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ReconcileOutcome::Aborted { .. })
    }
}

/// Makes the surface's marker layer match a plan by clearing it and
/// rebuilding every marker.
///
/// This is the only code that mutates the marker layer. Applying the same
/// plan twice yields the same markers, popups and open popup.
#[derive(Debug, Default)]
pub struct MarkerReconciler {
    live: BTreeMap<MarkerHandle, MarkerBinding>,
}

impl MarkerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn handle_for(&self, binding: &MarkerBinding) -> Option<MarkerHandle> {
        self.live
            .iter()
            .find(|(_, b)| *b == binding)
            .map(|(h, _)| *h)
    }

    pub fn apply<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        plan: &[MarkerSpec],
    ) -> ReconcileOutcome {
        let removed = match self.clear(surface) {
            Ok(n) => n,
            Err(_) => {
                return ReconcileOutcome::Aborted {
                    created: 0,
                    removed: 0,
                };
            }
        };

        let mut created = 0usize;
        let mut to_open = None;
        for spec in plan {
            // The container can disappear between two markers (route change
            // while a large layer is being built).
            if !surface.is_attached() {
                tracing::debug!(created, planned = plan.len(), "surface detached mid-reconcile");
                return ReconcileOutcome::Aborted { created, removed };
            }
            match self.place(surface, spec) {
                Ok(handle) => {
                    created += 1;
                    if spec.selected {
                        to_open = Some(handle);
                    }
                }
                Err(SurfaceError::Detached) => {
                    tracing::debug!(created, planned = plan.len(), "surface detached mid-reconcile");
                    return ReconcileOutcome::Aborted { created, removed };
                }
                Err(e) => {
                    tracing::warn!(entity = %spec.binding.entity_id, error = %e, "marker skipped");
                }
            }
        }

        let popup_opened = match to_open {
            Some(handle) => match surface.open_popup(handle) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "could not open selected popup");
                    false
                }
            },
            None => false,
        };
        ReconcileOutcome::Applied {
            created,
            removed,
            popup_opened,
        }
    }

    /// Removes every marker. A detached surface already lost its markers,
    /// so only the bookkeeping is reset.
    pub fn clear<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> Result<usize, SurfaceError> {
        self.live.clear();
        if !surface.is_attached() {
            return Err(SurfaceError::Detached);
        }
        surface.clear_markers()
    }

    fn place<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        spec: &MarkerSpec,
    ) -> Result<MarkerHandle, SurfaceError> {
        let handle = surface.add_marker(spec.at, &spec.visual)?;
        let wired = surface
            .bind_popup(handle, &spec.popup)
            .and_then(|()| surface.bind_click(handle, spec.binding.clone()));
        if let Err(e) = wired {
            // A half-wired marker must not stay on the map.
            if let Err(undo) = surface.remove_marker(handle) {
                tracing::debug!(handle = handle.0, error = %undo, "could not remove half-wired marker");
            }
            return Err(e);
        }
        self.live.insert(handle, spec.binding.clone());
        Ok(handle)
    }
}
