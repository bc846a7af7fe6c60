//! One mounted globe: scene state, animation state and the rules that tie
//! data updates to them.
//!
//! The session is plain owned data with no browser dependencies. The wasm
//! entry points keep one in a thread-local slot and drive it from
//! `requestAnimationFrame`; tests drive it directly.

use std::rc::Rc;

use formats::affiliation::{Affiliation, filter_valid};
use formats::raster::{RasterError, RasterImage};
use foundation::time::Time;
use gpu::{Camera3D, RenderFrame, Renderer};
use runtime::{EventBus, EventKind, FrameClock, PulseState, RotationState, facing_angle};
use scene::World;
use scene::curves::{self, CurveGroup};
use scene::landmass::{Landmass, spawn_landmass};
use scene::markers::{self, MarkerGroup};
use scene::prefabs::{Globe, spawn_globe};
use scene::resources::Resources;
use tracing::{debug, error, info, warn};

use crate::config::GlobeConfig;

const DEFAULT_VIEWPORT: (u32, u32) = (1280, 720);

#[derive(Debug)]
pub struct GlobeSession {
    config: GlobeConfig,
    world: World,
    resources: Resources,
    globe: Option<Globe>,
    landmass: Option<Landmass>,
    land_image_attached: bool,
    markers: MarkerGroup,
    curves: CurveGroup,
    affiliations: Option<Rc<[Affiliation]>>,
    rotation: RotationState,
    pulse: PulseState,
    camera: Camera3D,
    viewport: (u32, u32),
    clock: FrameClock,
    events: EventBus,
    disposed: bool,
}

impl GlobeSession {
    pub fn new(config: GlobeConfig) -> Self {
        let mut world = World::new();
        let mut resources = Resources::new();
        let globe = spawn_globe(&mut world, &mut resources, &config.globe);

        let mut camera = Camera3D::from_config(&config.camera);
        camera.set_viewport(DEFAULT_VIEWPORT.0, DEFAULT_VIEWPORT.1);

        Self {
            config,
            world,
            resources,
            globe: Some(globe),
            landmass: None,
            land_image_attached: false,
            markers: MarkerGroup::default(),
            curves: CurveGroup::default(),
            affiliations: None,
            rotation: RotationState::default(),
            pulse: PulseState::default(),
            camera,
            viewport: DEFAULT_VIEWPORT,
            clock: FrameClock::new(),
            events: EventBus::new(),
            disposed: false,
        }
    }

    /// Replaces markers and curves with ones built from `list`.
    ///
    /// Returns `false` when nothing changed: the same allocation was passed
    /// again, both old and new are absent, or the session is disposed.
    pub fn set_affiliations(&mut self, list: Option<Rc<[Affiliation]>>) -> bool {
        if self.disposed {
            return false;
        }
        let unchanged = match (&self.affiliations, &list) {
            (Some(current), Some(next)) => Rc::ptr_eq(current, next),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            debug!("affiliation list unchanged; skipping rebuild");
            return false;
        }
        let Some(globe) = self.globe else {
            return false;
        };

        markers::remove_markers(&mut self.world, &mut self.resources, &mut self.markers);
        curves::dispose(&mut self.world, &mut self.resources, &mut self.curves);

        let received = list.as_ref().map_or(0, |l| l.len());
        let valid = list.as_deref().map(filter_valid).unwrap_or_default();

        self.markers = markers::create_markers(
            &mut self.world,
            &mut self.resources,
            globe.root,
            &valid,
            &self.config.markers,
        );
        let positions = self.markers.positions();
        self.curves = match positions.as_slice() {
            [] => {
                warn!(received, "no geocoded affiliations; showing bare globe");
                CurveGroup::default()
            }
            [only] => curves::self_loop(
                &mut self.world,
                &mut self.resources,
                globe.root,
                *only,
                &self.config.curves,
            ),
            _ => curves::connect(
                &mut self.world,
                &mut self.resources,
                globe.root,
                &positions,
                self.config.curves.close_loop,
                &self.config.curves,
            ),
        };

        if let Some(first) = valid.first() {
            let target = facing_angle(first.location());
            self.rotation = self.rotation.seek(target);
            debug!(
                target_rad = target,
                institution = first.institution(),
                "rotating toward first affiliation"
            );
        }

        info!(
            received,
            valid = valid.len(),
            curve_segments = self.curves.len(),
            "affiliations replaced"
        );
        self.events.emit(
            self.clock.last(),
            EventKind::AffiliationsReplaced {
                received,
                valid: valid.len(),
                curve_segments: self.curves.len(),
            },
        );
        self.affiliations = list;
        true
    }

    /// Builds the landmass from the first resolved image load; later calls
    /// are ignored.
    pub fn attach_land_image(&mut self, image: Result<RasterImage, RasterError>) {
        if self.disposed || self.land_image_attached {
            debug!("land image already attached; ignoring");
            return;
        }
        self.land_image_attached = true;
        let Some(globe) = self.globe else {
            return;
        };

        let image = match image {
            Ok(image) => image,
            Err(err) => {
                error!(%err, "land image unavailable; rendering without landmass");
                self.events.emit(
                    self.clock.last(),
                    EventKind::LandmassUnavailable {
                        reason: err.to_string(),
                    },
                );
                return;
            }
        };

        self.landmass = spawn_landmass(
            &mut self.world,
            &mut self.resources,
            globe.root,
            Some(&image),
            &self.config.landmass,
        );
        let kind = match &self.landmass {
            Some(landmass) => {
                info!(disks = landmass.disks, "landmass ready");
                EventKind::LandmassReady {
                    disks: landmass.disks,
                }
            }
            None => EventKind::LandmassUnavailable {
                reason: "image contains no land".to_string(),
            },
        };
        self.events.emit(self.clock.last(), kind);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if self.viewport == (width, height) {
            return;
        }
        self.viewport = (width, height);
        self.camera.set_viewport(width, height);
        self.events
            .emit(self.clock.last(), EventKind::Resized { width, height });
    }

    /// Advances animation to `now_s` (seconds, wall clock) and collects the
    /// draws for this frame.
    pub fn frame(&mut self, now_s: f64) -> RenderFrame {
        let frame = self.clock.tick(now_s);

        if !self.disposed {
            self.rotation = self.rotation.step(&self.config.rotation);
            if let Some(globe) = self.globe {
                globe.set_rotation(&mut self.world, self.rotation.current_angle);
            }
            self.pulse = markers::pulse(
                &mut self.world,
                &self.markers,
                frame.time.seconds(),
                &self.config.pulse,
            );
        }

        let mut render = Renderer::collect(
            &self.world,
            &self.resources,
            &self.camera,
            &self.config.lighting,
        );
        render.released_meshes = self.resources.drain_released_meshes();
        render
    }

    /// Releases everything the session owns. Safe to call twice.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        markers::remove_markers(&mut self.world, &mut self.resources, &mut self.markers);
        curves::dispose(&mut self.world, &mut self.resources, &mut self.curves);
        if let Some(landmass) = self.landmass.take() {
            landmass.release(&mut self.world, &mut self.resources);
        }
        if let Some(globe) = self.globe.take() {
            globe.release(&mut self.world, &mut self.resources);
        }
        self.affiliations = None;
        self.disposed = true;
        info!("globe session disposed");
        self.events.emit(self.clock.last(), EventKind::Disposed);
    }

    pub fn config(&self) -> &GlobeConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn globe(&self) -> Option<&Globe> {
        self.globe.as_ref()
    }

    pub fn landmass(&self) -> Option<&Landmass> {
        self.landmass.as_ref()
    }

    pub fn markers(&self) -> &MarkerGroup {
        &self.markers
    }

    pub fn curves(&self) -> &CurveGroup {
        &self.curves
    }

    pub fn rotation(&self) -> RotationState {
        self.rotation
    }

    pub fn pulse(&self) -> PulseState {
        self.pulse
    }

    pub fn camera(&self) -> &Camera3D {
        &self.camera
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Seconds of the most recent frame, if one has run.
    pub fn last_frame_time(&self) -> Option<Time> {
        self.clock.last().map(|f| f.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::math::Vec3;
    use gpu::RenderCommand;
    use pretty_assertions::assert_eq;
    use runtime::RotationPhase;

    fn geocoded(lat: f64, lon: f64) -> Affiliation {
        Affiliation {
            institution: format!("Institute {lat},{lon}"),
            country: "Somewhere".into(),
            latitude: Some(lat),
            longitude: Some(lon),
            geocoded: true,
            ..Affiliation::default()
        }
    }

    fn list(items: Vec<Affiliation>) -> Option<Rc<[Affiliation]>> {
        Some(Rc::from(items))
    }

    fn opaque_image() -> RasterImage {
        RasterImage::from_rgba(4, 2, vec![255; 4 * 2 * 4]).expect("raster")
    }

    fn small_config() -> GlobeConfig {
        let mut config = GlobeConfig::default();
        config.landmass.rows = 18;
        config.landmass.density = 4.0;
        config.curves.tubular_segments = 8;
        config
    }

    #[test]
    fn new_session_is_a_bare_globe() {
        let session = GlobeSession::new(GlobeConfig::default());
        assert_eq!(session.resources().live_meshes(), 1);
        assert_eq!(session.resources().live_materials(), 1);
        assert!(session.markers().is_empty());
        assert!(session.landmass().is_none());
        assert_eq!(session.rotation().phase(), RotationPhase::IdleSpin);
    }

    #[test]
    fn affiliations_build_markers_curves_and_seek() {
        let mut session = GlobeSession::new(small_config());
        let changed = session.set_affiliations(list(vec![
            geocoded(10.0, 20.0),
            Affiliation {
                geocoded: false,
                ..Affiliation::default()
            },
            geocoded(-33.9, 151.2),
            geocoded(51.5, -0.1),
        ]));
        assert!(changed);
        assert_eq!(session.markers().len(), 3);
        assert_eq!(session.curves().len(), 3);
        assert_eq!(
            session.rotation().phase(),
            RotationPhase::Seeking {
                target: facing_angle(foundation::math::GeoPoint::new(10.0, 20.0))
            }
        );
        assert_eq!(
            session.events().events().last().map(|e| e.kind.clone()),
            Some(EventKind::AffiliationsReplaced {
                received: 4,
                valid: 3,
                curve_segments: 3,
            })
        );
    }

    #[test]
    fn two_points_open_chain_single_point_self_loop() {
        let mut session = GlobeSession::new(small_config());
        session.set_affiliations(list(vec![geocoded(0.0, 0.0), geocoded(0.0, 90.0)]));
        assert_eq!(session.curves().len(), 1);

        session.set_affiliations(list(vec![geocoded(45.0, 45.0)]));
        assert_eq!(session.markers().len(), 1);
        assert_eq!(session.curves().len(), 1);
        assert_eq!(session.curves().segments[0].from, 0);
        assert_eq!(session.curves().segments[0].to, 0);
    }

    #[test]
    fn empty_valid_list_is_bare_globe_and_keeps_rotation() {
        let mut session = GlobeSession::new(small_config());
        session.frame(0.0);
        let before = session.rotation();
        assert!(session.set_affiliations(list(vec![Affiliation::default()])));
        assert!(session.markers().is_empty());
        assert!(session.curves().is_empty());
        assert_eq!(session.rotation(), before);
        assert_eq!(session.resources().live_meshes(), 1);
    }

    #[test]
    fn same_list_identity_is_a_no_op() {
        let mut session = GlobeSession::new(small_config());
        let shared = list(vec![geocoded(1.0, 2.0), geocoded(3.0, 4.0)]);
        assert!(session.set_affiliations(shared.clone()));
        let markers = session.markers().clone();
        assert!(!session.set_affiliations(shared));
        assert_eq!(session.markers(), &markers);

        // Equal contents in a new allocation still rebuild.
        assert!(session.set_affiliations(list(vec![geocoded(1.0, 2.0), geocoded(3.0, 4.0)])));
        assert!(session.set_affiliations(None));
        assert!(!session.set_affiliations(None));
    }

    #[test]
    fn repeated_updates_do_not_leak() {
        let mut session = GlobeSession::new(small_config());
        session.attach_land_image(Ok(opaque_image()));
        let baseline_meshes = session.resources().live_meshes();
        let baseline_materials = session.resources().live_materials();
        let baseline_entities = session.world().entity_count();

        for round in 0..20 {
            let n = 1 + round % 5;
            let items = (0..n).map(|i| geocoded(i as f64 * 10.0, i as f64 * 30.0)).collect();
            session.set_affiliations(list(items));
            session.frame(round as f64 / 60.0);
        }
        session.set_affiliations(None);
        session.frame(1.0);

        assert_eq!(session.resources().live_meshes(), baseline_meshes);
        assert_eq!(session.resources().live_materials(), baseline_materials);
        assert_eq!(session.world().entity_count(), baseline_entities);
    }

    #[test]
    fn land_image_attaches_once() {
        let mut session = GlobeSession::new(small_config());
        session.attach_land_image(Ok(opaque_image()));
        let disks = session.landmass().map(|l| l.disks);
        assert!(disks.is_some_and(|d| d > 0));

        session.attach_land_image(Ok(opaque_image()));
        assert_eq!(session.landmass().map(|l| l.disks), disks);
        assert_eq!(session.resources().live_meshes(), 2);
    }

    #[test]
    fn failed_land_image_leaves_globe_usable() {
        let mut session = GlobeSession::new(small_config());
        session.attach_land_image(Err(RasterError::Fetch("404".into())));
        assert!(session.landmass().is_none());
        assert!(matches!(
            session.events().events().last().map(|e| &e.kind),
            Some(EventKind::LandmassUnavailable { .. })
        ));
        // A late success is still ignored.
        session.attach_land_image(Ok(opaque_image()));
        assert!(session.landmass().is_none());
        assert_eq!(session.frame(0.0).commands.len(), 1);
    }

    #[test]
    fn frame_rotates_globe_and_pulses_markers() {
        let mut session = GlobeSession::new(small_config());
        session.set_affiliations(list(vec![geocoded(0.0, 0.0)]));

        let now = std::f64::consts::FRAC_PI_4;
        session.frame(now);
        let globe = *session.globe().expect("globe");
        assert_eq!(globe.rotation(session.world()), session.rotation().current_angle);

        let marker = session.markers().markers[0];
        let transform = session.world().transform(marker.entity).expect("marker");
        assert!((transform.scale - 1.3).abs() < 1e-12);
        assert_eq!(transform.position, marker.position);
    }

    #[test]
    fn seeking_converges_through_frames() {
        let mut session = GlobeSession::new(small_config());
        session.set_affiliations(list(vec![geocoded(0.0, 90.0), geocoded(10.0, 10.0)]));
        for i in 0..200 {
            session.frame(i as f64 / 60.0);
        }
        assert_eq!(session.rotation().phase(), RotationPhase::IdleSpin);

        // The first affiliation now faces the camera on +Z.
        let world_pos = session
            .world()
            .world_transform(session.markers().markers[0].entity)
            .expect("marker")
            .position;
        let facing = world_pos.normalize();
        assert!(facing.dot(Vec3::Z) > 0.99, "facing = {facing:?}");
    }

    #[test]
    fn frame_reports_released_meshes_once() {
        let mut session = GlobeSession::new(small_config());
        session.set_affiliations(list(vec![geocoded(0.0, 0.0), geocoded(5.0, 5.0)]));
        session.frame(0.0);
        session.set_affiliations(None);

        let released = session.frame(0.1).released_meshes;
        assert_eq!(released.len(), 2);
        assert!(session.frame(0.2).released_meshes.is_empty());
    }

    #[test]
    fn resize_updates_camera_and_clamps() {
        let mut session = GlobeSession::new(GlobeConfig::default());
        session.resize(0, 0);
        assert_eq!(session.viewport(), (1, 1));
        assert_eq!(session.camera().aspect, 1.0);
        session.resize(800, 400);
        assert_eq!(session.camera().aspect, 2.0);
    }

    #[test]
    fn event_log_stays_bounded_across_resizes() {
        let mut session = GlobeSession::new(GlobeConfig::default());
        for i in 0..10_000u32 {
            session.resize(800 + i % 2, 600);
            session.frame(f64::from(i) / 60.0);
        }
        let events = session.events();
        assert_eq!(events.len(), events.capacity());
        assert_eq!(
            events.events().last().map(|e| &e.kind),
            Some(&EventKind::Resized { width: 801, height: 600 })
        );
    }

    #[test]
    fn dispose_leaves_nothing_live() {
        let mut session = GlobeSession::new(small_config());
        session.attach_land_image(Ok(opaque_image()));
        session.set_affiliations(list(vec![geocoded(1.0, 1.0), geocoded(2.0, 2.0), geocoded(3.0, 3.0)]));
        session.frame(0.0);

        session.dispose();
        session.dispose();
        assert_eq!(session.resources().live_meshes(), 0);
        assert_eq!(session.resources().live_materials(), 0);
        assert_eq!(session.world().entity_count(), 0);
        assert!(session.is_disposed());
        assert!(!session.set_affiliations(list(vec![geocoded(1.0, 1.0)])));

        let frame = session.frame(1.0);
        assert!(frame.commands.is_empty());
        assert!(!frame.released_meshes.is_empty());
        let disposed_events = session
            .events()
            .events()
            .filter(|e| e.kind == EventKind::Disposed)
            .count();
        assert_eq!(disposed_events, 1);
    }

    #[test]
    fn render_commands_cover_scene() {
        let mut session = GlobeSession::new(small_config());
        session.attach_land_image(Ok(opaque_image()));
        session.set_affiliations(list(vec![geocoded(0.0, 0.0), geocoded(20.0, 20.0)]));
        let frame = session.frame(0.0);
        // Globe, landmass, two markers, one arc.
        assert_eq!(frame.commands.len(), 5);
        let RenderCommand::DrawMesh { material, .. } = frame.commands.last().expect("command");
        assert!(material.opacity < 1.0);
    }
}
