use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::config::WisdomConfig;
use crate::content::annotate::{ReferenceAnnotator, ReferenceWatch, TooltipTable};
use crate::content::registry::ContentRegistry;
use crate::content::render::ContentRenderer;
use crate::content::{items_from_rows, ContentItem};
use crate::dom::sanitize::Sanitizer;
use crate::map::graph::SceneGraph;
use crate::map::layout::MapLayoutEngine;
use crate::map::shape::{parse_shape_rows, MapShapeRenderer, ShapeParts, ShapeScene};
use crate::nav::{NavOutcome, NavigationController};
use crate::net::sheet::ContentSource;

/// Error during start-up
#[derive(Debug, Error)]
#[error("[{phase}] {message}")]
pub struct BootError {
    pub message: String,
    pub phase: &'static str,
}

/// Everything fetched before the first frame
#[derive(Debug, Clone, Default)]
pub struct BootData {
    pub items: Vec<ContentItem>,
    pub tooltips: TooltipTable,
    pub shapes: ShapeParts,
}

/// Boot pipeline: (Index ∥ Tooltips ∥ Shapes) → Registry → Context
pub struct WisdomEngine {
    config: WisdomConfig,
    source: Arc<dyn ContentSource>,
}

impl WisdomEngine {
    pub fn new(config: WisdomConfig, source: Arc<dyn ContentSource>) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &WisdomConfig {
        &self.config
    }

    /// Fetch the index, tooltip and shape sheets in parallel.
    ///
    /// Only the index is required; the auxiliary sheets degrade to an empty
    /// tooltip table and the fallback glyph.
    pub fn fetch_boot_data(&self) -> Result<BootData, BootError> {
        let started = Instant::now();
        let source = &self.source;
        let config = &self.config;

        let (index, (tooltips, shapes)) = rayon::join(
            || source.fetch_rows(&config.index_url),
            || {
                rayon::join(
                    || source.fetch_rows(&config.tooltip_url),
                    || config.shape_url.as_deref().map(|url| source.fetch_rows(url)),
                )
            },
        );

        // Phase 1: Index
        let rows = index.map_err(|e| BootError {
            message: e.to_string(),
            phase: "index",
        })?;
        let items = items_from_rows(&rows);
        if items.is_empty() {
            return Err(BootError {
                message: "index sheet has no usable rows".to_string(),
                phase: "index",
            });
        }

        // Phase 2: Tooltips
        let tooltips = match tooltips {
            Ok(rows) => TooltipTable::from_rows(&rows, &Sanitizer::new()),
            Err(e) => {
                log::warn!("Tooltips unavailable: {}", e);
                TooltipTable::new()
            }
        };

        // Phase 3: Shapes
        let shapes = match shapes {
            Some(Ok(rows)) => parse_shape_rows(&rows),
            Some(Err(e)) => {
                log::warn!("Shape sheet unavailable, using fallback glyph: {}", e);
                ShapeParts::new()
            }
            None => ShapeParts::new(),
        };

        log::info!(
            "Boot data: {} items, {} tooltips, {} shape parts in {:.0} ms",
            items.len(),
            tooltips.len(),
            shapes.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(BootData {
            items,
            tooltips,
            shapes,
        })
    }

    /// Fetch and assemble in one go (blocking).
    pub fn boot(self) -> Result<WisdomContext, BootError> {
        let data = self.fetch_boot_data()?;
        WisdomContext::new(self.config, self.source, data)
    }
}

/// Application context built once at start-up.
pub struct WisdomContext {
    pub config: WisdomConfig,
    pub registry: ContentRegistry,
    pub nav: NavigationController,
    pub layout: MapLayoutEngine,
    pub shape_renderer: MapShapeRenderer,
    pub shapes: ShapeParts,
    pub reference_watch: ReferenceWatch,
}

impl WisdomContext {
    pub fn new(config: WisdomConfig, source: Arc<dyn ContentSource>, data: BootData) -> Result<Self, BootError> {
        let start = config.start_url().map_err(|e| BootError {
            message: e.to_string(),
            phase: "location",
        })?;

        let annotator = Arc::new(ReferenceAnnotator::new(data.tooltips));
        let mut registry = ContentRegistry::new(source, ContentRenderer::new(annotator));
        for item in data.items {
            registry.register(item);
        }

        Ok(Self {
            layout: MapLayoutEngine::new(config.geometry.clone(), config.override_points()),
            shape_renderer: MapShapeRenderer::new(config.geometry.clone()),
            reference_watch: ReferenceWatch::new(config.reference_debounce()),
            nav: NavigationController::new(start),
            shapes: data.shapes,
            registry,
            config,
        })
    }

    /// Resolve the configured start location.
    pub fn start(&mut self) -> Option<NavOutcome> {
        let location = self.nav.location().clone();
        self.nav.initial_load(&mut self.registry, location)
    }

    /// Per-frame housekeeping: finished loads, pending deep links and the
    /// reference watch. Returns the titles that finished.
    pub fn poll(&mut self, now: Instant) -> Vec<String> {
        let done = self.registry.poll();
        if !done.is_empty() {
            self.nav.on_loaded(&mut self.registry, &done);
            self.reference_watch.notify(now);
        }
        let registry = &mut self.registry;
        let active = self.nav.active_title().map(str::to_string);
        self.reference_watch.run_if_due(now, |_| {
            if let Some(title) = active {
                let created = registry.refresh_references(&title);
                if created > 0 {
                    log::debug!("{} new reference markers in '{}'", created, title);
                }
            }
        });
        done
    }

    /// Lay out every registered item onto `scene`.
    pub fn build_map(&self, scene: &mut SceneGraph) -> usize {
        scene.clear();
        let items: Vec<ContentItem> = self.registry.items().cloned().collect();
        self.layout.build(&items, &self.shapes, scene)
    }

    pub fn map_background(&self, scene: &SceneGraph) -> ShapeScene {
        self.shape_renderer.render(&self.shapes, scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::annotate::REFERENCE_CLASS;
    use crate::content::registry::LoadState;
    use crate::content::render::RenderedContent;
    use crate::content::ContentType;
    use crate::dom::DomNode;
    use crate::map::graph::GraphWidget;
    use crate::nav::NavOrigin;
    use crate::net::sheet::fake::FakeSource;
    use std::time::Duration;

    const INDEX: &str = "https://sheets.test/index.csv";
    const TIPS: &str = "https://sheets.test/tips.csv";
    const SHAPE: &str = "https://sheets.test/shape.csv";

    fn config() -> WisdomConfig {
        WisdomConfig {
            index_url: INDEX.into(),
            tooltip_url: TIPS.into(),
            shape_url: Some(SHAPE.into()),
            ..WisdomConfig::default()
        }
    }

    fn source() -> FakeSource {
        FakeSource::new()
            .with_sheet(
                INDEX,
                "Title,Link,Type,Tag,Parent\n\
                 Wisdom,https://sheets.test/wisdom.csv,Article,Wisdom,Root\n\
                 Republic,https://sheets.test/republic.csv,Book,Reason,Wisdom\n",
            )
            .with_sheet(TIPS, "References,Data\nLogos,Reason\n")
            .with_sheet(SHAPE, "Part,Order,X,Y\nseed,1,0,0\nseed,2,0,50\n")
            .with_sheet("https://sheets.test/republic.csv", "D:Greek,D:English\nλόγος,the Logos\n")
    }

    #[test]
    fn boots_with_all_sheets() {
        let source = Arc::new(source());
        let ctx = WisdomEngine::new(config(), source.clone()).boot().unwrap();
        assert_eq!(ctx.registry.len(), 2);
        assert_eq!(ctx.shapes.len(), 1);
        assert_eq!(source.fetch_count(), 3);
    }

    #[test]
    fn auxiliary_failures_degrade() {
        let source = FakeSource::new()
            .with_sheet(INDEX, "Title,Link,Type\nMeno,https://x.test/m.csv,Book\n")
            .with_failure(TIPS);
        let data = WisdomEngine::new(config(), Arc::new(source)).fetch_boot_data().unwrap();
        assert!(data.tooltips.is_empty());
        assert!(data.shapes.is_empty());
        assert_eq!(data.items.len(), 1);
    }

    #[test]
    fn index_failure_names_the_phase() {
        let err = WisdomEngine::new(config(), Arc::new(FakeSource::new().with_failure(INDEX)))
            .boot()
            .err()
            .unwrap();
        assert_eq!(err.phase, "index");
        assert!(err.to_string().starts_with("[index]"));
    }

    #[test]
    fn start_location_deep_links() {
        let mut cfg = config();
        cfg.start_location = "?type=book&content=Republic&row=1&tab=2".into();
        let mut ctx = WisdomEngine::new(cfg, Arc::new(source())).boot().unwrap();
        assert_eq!(ctx.start(), Some(NavOutcome::Shown(LoadState::Started)));

        let done = ctx.registry.wait_idle();
        ctx.nav.on_loaded(&mut ctx.registry, &done);
        let table = ctx.registry.get("Republic").unwrap().rows().unwrap();
        assert_eq!(table.groups[0].containers[0].active_tab, 2);
    }

    fn first_pane(ctx: &mut WisdomContext) -> &mut DomNode {
        let table = ctx
            .registry
            .get_mut("Republic")
            .and_then(RenderedContent::rows_mut)
            .unwrap();
        &mut table.groups[0].containers[0].pane
    }

    #[test]
    fn reference_pass_runs_after_debounce() {
        let mut ctx = WisdomEngine::new(config(), Arc::new(source())).boot().unwrap();
        ctx.nav
            .show_content(&mut ctx.registry, ContentType::Book, "Republic", NavOrigin::UserClick, None);

        let t0 = Instant::now();
        let mut done = Vec::new();
        for _ in 0..400 {
            done = ctx.poll(t0);
            if !done.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(done, vec!["Republic".to_string()]);
        assert!(ctx.reference_watch.is_pending());

        *first_pane(&mut ctx) = DomNode::fragment(vec![DomNode::text("Logos again")]);
        let markers = |ctx: &mut WisdomContext| {
            first_pane(ctx)
                .find_all(&|n| n.has_class(REFERENCE_CLASS))
                .len()
        };

        let debounce = ctx.config.reference_debounce();
        ctx.poll(t0 + debounce / 2);
        assert!(ctx.reference_watch.is_pending());
        assert_eq!(markers(&mut ctx), 0);

        ctx.poll(t0 + debounce);
        assert!(!ctx.reference_watch.is_pending());
        assert_eq!(markers(&mut ctx), 1);
    }

    #[test]
    fn map_uses_registry_items() {
        let ctx = WisdomEngine::new(config(), Arc::new(source())).boot().unwrap();
        let mut scene = SceneGraph::new();
        assert_eq!(ctx.build_map(&mut scene), 2);
        assert_eq!(scene.edges().len(), 1);
        assert!(scene.position("Wisdom").is_some());
        assert!(matches!(ctx.map_background(&scene), ShapeScene::Ribbons(_)));
    }
}
