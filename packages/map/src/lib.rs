#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Map controller.
//!
//! A single task owns the [`MarkerSet`] and the rendering surface. Commands
//! from [`MapHandle`], map notifications, and source batches all arrive on
//! one inbox, so marker state has exactly one writer. Results go out on a
//! [`MapUpdate`] channel.

use std::sync::Arc;

use response_planner_marker::{IconResolver, MarkerSet, MatchKind, RenderSurface};
use response_planner_source::diagnostics::DiagnosticKind;
use response_planner_source::registry::{DispatchContext, SourceBatch, SourceRegistry};
use response_planner_source_models::{Feature, Position, SourceQuery};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Errors returned by [`MapHandle`].
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The controller task has stopped.
    #[error("Map controller has stopped")]
    Closed,

    /// The controller task panicked or was cancelled.
    #[error("Map controller task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Notifications coming from the map widget.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// The zoom level changed.
    ZoomChanged(u32),
    /// The user clicked the map.
    Clicked(Position),
    /// Geolocation succeeded.
    LocationFound {
        /// Where the device is.
        position: Position,
        /// Accuracy radius in meters.
        accuracy_m: f64,
    },
    /// Geolocation failed.
    LocationUnavailable {
        /// Whether the device supports geolocation at all.
        supported: bool,
    },
}

/// What the controller publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum MapUpdate {
    /// Markers were placed for one source's batch.
    MarkersPlaced {
        /// Source the batch came from.
        source_id: String,
        /// Markers placed from this batch.
        placed: usize,
        /// Markers in the set afterwards.
        total: usize,
    },
    /// Every marker was resized.
    Rescaled {
        /// The new zoom level.
        zoom: u32,
        /// The new marker size.
        size_px: u32,
        /// Number of markers resized.
        markers: usize,
    },
    /// Features near a clicked point, from one source. Not placed.
    Nearby {
        /// The clicked point.
        point: Position,
        /// Source the features came from.
        source_id: String,
        /// The features.
        features: Vec<Feature>,
    },
    /// Every source has answered a dispatch.
    DispatchFinished {
        /// The dispatched query.
        query: SourceQuery,
        /// Number of batches received.
        sources: usize,
    },
}

enum Command {
    LoadAll,
    Event(MapEvent),
    Batch(SourceBatch),
    DispatchFinished { query: SourceQuery, sources: usize },
    Shutdown,
}

/// Sends commands to a running controller.
#[derive(Clone)]
pub struct MapHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl MapHandle {
    fn send(&self, command: Command) -> Result<(), MapError> {
        self.tx.send(command).map_err(|_| MapError::Closed)
    }

    /// Queries every source for its full dataset and places the results.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Closed`] if the controller has stopped.
    pub fn load_all(&self) -> Result<(), MapError> {
        self.send(Command::LoadAll)
    }

    /// Forwards a map notification.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Closed`] if the controller has stopped.
    pub fn event(&self, event: MapEvent) -> Result<(), MapError> {
        self.send(Command::Event(event))
    }

    /// Stops the controller. Its task then resolves to the marker set.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Closed`] if the controller has already stopped.
    pub fn shutdown(&self) -> Result<(), MapError> {
        self.send(Command::Shutdown)
    }
}

/// The task that owns the markers.
pub struct MapController<S: RenderSurface> {
    registry: Arc<SourceRegistry>,
    resolver: Arc<IconResolver>,
    ctx: DispatchContext,
    markers: MarkerSet<S>,
    inbox: mpsc::UnboundedReceiver<Command>,
    inbox_tx: mpsc::WeakUnboundedSender<Command>,
    updates: mpsc::UnboundedSender<MapUpdate>,
}

impl<S> MapController<S>
where
    S: RenderSurface + Send + 'static,
    S::Handle: Send,
{
    /// Starts a controller drawing on `surface`.
    ///
    /// Returns the command handle, the update stream, and the task, which
    /// resolves to the final marker set after [`MapHandle::shutdown`] or once
    /// every handle is dropped.
    #[must_use]
    pub fn spawn(
        registry: Arc<SourceRegistry>,
        resolver: Arc<IconResolver>,
        surface: S,
        ctx: DispatchContext,
    ) -> (
        MapHandle,
        mpsc::UnboundedReceiver<MapUpdate>,
        JoinHandle<MarkerSet<S>>,
    ) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let (updates, updates_rx) = mpsc::unbounded_channel();

        let controller = Self {
            registry,
            resolver,
            ctx,
            markers: MarkerSet::new(surface),
            inbox,
            inbox_tx: tx.downgrade(),
            updates,
        };

        let task = tokio::spawn(controller.run());
        (MapHandle { tx }, updates_rx, task)
    }

    async fn run(mut self) -> MarkerSet<S> {
        while let Some(command) = self.inbox.recv().await {
            match command {
                Command::LoadAll => self.start_dispatch(SourceQuery::all().with_tag("startup")),
                Command::Event(event) => self.handle_event(event),
                Command::Batch(batch) => self.handle_batch(batch),
                Command::DispatchFinished { query, sources } => {
                    log::info!("{query}: {sources} sources answered");
                    self.publish(MapUpdate::DispatchFinished { query, sources });
                }
                Command::Shutdown => break,
            }
        }
        log::debug!("Map controller stopped with {} markers", self.markers.len());
        self.markers
    }

    fn handle_event(&mut self, event: MapEvent) {
        match event {
            MapEvent::ZoomChanged(zoom) => {
                self.markers.rescale(zoom);
                self.publish(MapUpdate::Rescaled {
                    zoom,
                    size_px: self.markers.current_size(),
                    markers: self.markers.len(),
                });
            }
            MapEvent::Clicked(point) => match SourceQuery::near(point) {
                Ok(query) => self.start_dispatch(query.with_tag("click")),
                Err(e) => log::warn!("Ignoring click: {e}"),
            },
            MapEvent::LocationFound {
                position,
                accuracy_m,
            } => {
                log::info!("Found you! Within {accuracy_m:.0} meters of {position}");
            }
            MapEvent::LocationUnavailable { supported: true } => {
                log::error!("Unable to get GPS signal");
            }
            MapEvent::LocationUnavailable { supported: false } => {
                log::error!("No supported GPS found");
            }
        }
    }

    fn handle_batch(&mut self, batch: SourceBatch) {
        if let Some(point) = batch.query.point() {
            self.publish(MapUpdate::Nearby {
                point,
                source_id: batch.source_id,
                features: batch.features,
            });
            return;
        }

        for feature in &batch.features {
            let found = self.resolver.resolve_match(&feature.category);
            if found.kind == MatchKind::Fallback {
                self.ctx.diagnostics.report(
                    &batch.source_id,
                    DiagnosticKind::LookupMiss,
                    format!("no icon for category {:?}", feature.category),
                );
            }
            self.markers.place(feature, found.asset);
        }

        log::info!(
            "{}: placed {} markers ({} total)",
            batch.source_id,
            batch.features.len(),
            self.markers.len()
        );
        self.publish(MapUpdate::MarkersPlaced {
            source_id: batch.source_id,
            placed: batch.features.len(),
            total: self.markers.len(),
        });
    }

    /// Fans `query` out and forwards each batch back into the inbox.
    fn start_dispatch(&self, query: SourceQuery) {
        let Some(tx) = self.inbox_tx.upgrade() else {
            return;
        };
        let mut batches = self.registry.dispatch_channel(&query, &self.ctx);

        tokio::spawn(async move {
            let mut sources = 0;
            while let Some(batch) = batches.recv().await {
                sources += 1;
                if tx.send(Command::Batch(batch)).is_err() {
                    return;
                }
            }
            let _ = tx.send(Command::DispatchFinished { query, sources });
        });
    }

    fn publish(&self, update: MapUpdate) {
        if self.updates.send(update).is_err() {
            log::trace!("No listener for map updates");
        }
    }
}
