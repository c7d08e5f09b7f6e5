use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::animation::{AnimationClip, AnimationMixer};
use crate::assets::{AssetLoader, LoadEvent};
use crate::camera::PerspectiveCamera;
use crate::orbit::OrbitControls;
use crate::scene::{Scene, CRYSTAL_SLOTS};
use crate::stars;

/// Wall-clock frame timer. The first tick reports a zero delta so nothing
/// jumps on the opening frame.
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = self
            .last
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);
        dt
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the frame loop touches, gathered in one place and passed
/// explicitly instead of living in globals.
pub struct AppContext {
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    /// One mixer slot per crystal. A loaded crystal whose clip is missing
    /// keeps a `None` here and simply renders static.
    pub mixers: Vec<Option<AnimationMixer>>,
    loader: Option<AssetLoader>,
    clock: FrameClock,
    stop: Arc<AtomicBool>,
}

impl AppContext {
    pub fn new(width: u32, height: u32, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut scene = Scene::new();
        scene.stars = stars::generate_stars(&mut rng);

        let mut controls = OrbitControls::new();
        controls.set_viewport_height(height);

        Self {
            scene,
            camera: PerspectiveCamera::new(width, height),
            controls,
            mixers: vec![None; CRYSTAL_SLOTS],
            loader: None,
            clock: FrameClock::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Kicks off every asset load concurrently. Results arrive through
    /// `pump_loads` on later frames.
    pub fn begin_loading(&mut self, asset_root: &Path) {
        info!("loading assets from {}", asset_root.display());
        self.loader = Some(AssetLoader::spawn(asset_root));
    }

    /// Drains finished loads and folds them into the scene. Call once per
    /// frame; returns how many events were handled.
    pub fn pump_loads(&mut self) -> usize {
        let Some(loader) = &self.loader else {
            return 0;
        };
        let events = loader.poll();
        let handled = events.len();
        for event in events {
            self.apply_load_event(event);
        }
        handled
    }

    /// Blocks until every outstanding load has finished, then folds in the
    /// results. Used by headless runs.
    pub fn finish_loading(&mut self) {
        if let Some(mut loader) = self.loader.take() {
            loader.wait();
            for event in loader.poll() {
                self.apply_load_event(event);
            }
        }
    }

    fn apply_load_event(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::Crystal { slot, name, result } => match result {
                Ok(fragment) => {
                    let clip_name = format!("{name}-action");
                    let clip =
                        AnimationClip::find_by_name(&fragment.clips, &clip_name).cloned();
                    if let Some(clip) = clip {
                        self.mixers[slot] = Some(AnimationMixer::new(clip));
                    } else {
                        warn!("crystal {name} has no clip named {clip_name}, rendering static");
                    }
                    info!("loaded crystal {name} ({} meshes)", fragment.mesh_count());
                    self.scene.insert_crystal(slot, fragment);
                }
                Err(err) => error!("crystal {name} failed to load: {err}"),
            },
            LoadEvent::Cloud(result) => match result {
                Ok(fragment) => {
                    info!("loaded cloud ({} meshes)", fragment.mesh_count());
                    self.scene.set_cloud(fragment);
                }
                Err(err) => error!("cloud failed to load: {err}"),
            },
        }
    }

    /// Advances animation and camera state by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        for (slot, mixer) in self.mixers.iter_mut().enumerate() {
            if let Some(mixer) = mixer {
                mixer.update(dt);
                if let Some(instance) = self.scene.crystals[slot].as_mut() {
                    mixer.apply_to(&mut instance.fragment);
                }
            }
        }
        self.controls.update(&mut self.camera);
    }

    /// One windowed frame step: pumps loads, ticks the clock, advances the
    /// scene. Returns the frame delta.
    pub fn frame(&mut self) -> f32 {
        self.pump_loads();
        let dt = self.clock.tick();
        self.advance(dt);
        dt
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_viewport(width, height);
        self.controls.set_viewport_height(height);
    }

    pub fn stop_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

pub fn print_summary(context: &AppContext) {
    println!("Scene summary:");
    println!(" - stars: {}", context.scene.star_count());
    println!(
        " - crystals loaded: {} of {}",
        context.scene.loaded_crystal_count(),
        CRYSTAL_SLOTS
    );
    println!(
        " - cloud: {}",
        if context.scene.cloud.is_some() {
            "loaded"
        } else {
            "missing"
        }
    );
    for (slot, mixer) in context.mixers.iter().enumerate() {
        if let Some(mixer) = mixer {
            println!(
                " - {} playing {} at t={:.2}",
                crate::assets::CRYSTAL_NAMES[slot],
                mixer.clip_name(),
                mixer.wrapped_time()
            );
        }
    }
    let position = context.camera.position;
    println!(
        " - camera pos=({:.2}, {:.2}, {:.2}) target=({:.2}, {:.2}, {:.2})",
        position.x,
        position.y,
        position.z,
        context.controls.target.x,
        context.controls.target.y,
        context.controls.target.z
    );
}
