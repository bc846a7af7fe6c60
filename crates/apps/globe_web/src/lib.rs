use gloo_net::http::Request;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use formats::affiliation::parse_affiliations;
use formats::raster::{RasterError, RasterImage};

pub mod config;
pub mod session;
mod wgpu;

use config::GlobeConfig;
use session::GlobeSession;
use wgpu::{WgpuContext, init_wgpu_from_canvas_id, release_all, render_frame, resize_wgpu};

#[derive(Debug)]
struct MountedGlobe {
    /// Distinguishes async work started by an earlier mount.
    generation: u64,
    session: GlobeSession,
    gpu: Option<WgpuContext>,
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

struct AnimationLoop {
    callback: FrameCallback,
    request_id: Rc<Cell<Option<i32>>>,
}

thread_local! {
    static STATE: RefCell<Option<MountedGlobe>> = const { RefCell::new(None) };
    static ANIMATION: RefCell<Option<AnimationLoop>> = const { RefCell::new(None) };
    static NEXT_GENERATION: Cell<u64> = const { Cell::new(0) };
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn with_mounted<R>(generation: u64, f: impl FnOnce(&mut MountedGlobe) -> R) -> Option<R> {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        match state.as_mut() {
            Some(mounted) if mounted.generation == generation => Some(f(mounted)),
            _ => None,
        }
    })
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
    Ok(())
}

/// Mounts a globe on `canvas_id`, replacing any globe already mounted.
///
/// `config_json` may be empty for defaults.
#[wasm_bindgen]
pub fn mount(canvas_id: String, land_image_url: String, config_json: String) -> Result<(), JsValue> {
    let config = GlobeConfig::from_json(&config_json).map_err(to_js)?;
    unmount();

    let generation = NEXT_GENERATION.with(|next| {
        let generation = next.get() + 1;
        next.set(generation);
        generation
    });
    STATE.with(|state| {
        *state.borrow_mut() = Some(MountedGlobe {
            generation,
            session: GlobeSession::new(config),
            gpu: None,
        });
    });

    spawn_local(async move {
        match init_wgpu_from_canvas_id(&canvas_id).await {
            Ok(ctx) => {
                let (width, height) = wgpu::surface_size(&ctx);
                let attached = with_mounted(generation, |mounted| {
                    mounted.session.resize(width, height);
                    mounted.gpu = Some(ctx);
                });
                if attached.is_none() {
                    warn!(%canvas_id, "globe unmounted before wgpu was ready");
                }
            }
            Err(err) => error!(?err, %canvas_id, "wgpu init failed"),
        }
    });

    spawn_local(async move {
        let image = fetch_land_image(&land_image_url).await;
        with_mounted(generation, |mounted| mounted.session.attach_land_image(image));
    });

    start_animation_loop()?;
    info!(generation, "globe mounted");
    Ok(())
}

/// Replaces the affiliation list.
///
/// `""`, `"null"` and `"undefined"` clear it. Malformed JSON is returned as
/// an error and leaves the scene unchanged.
#[wasm_bindgen]
pub fn set_affiliations(json: &str) -> Result<(), JsValue> {
    let parsed = parse_affiliations(json).map_err(to_js)?;
    let list = parsed.map(Rc::from);
    STATE.with(|state| match state.borrow_mut().as_mut() {
        Some(mounted) => {
            mounted.session.set_affiliations(list);
            Ok(())
        }
        None => Err(JsValue::from_str("globe is not mounted")),
    })
}

#[wasm_bindgen]
pub fn set_canvas_sizes(width: f64, height: f64) {
    let (width, height) = (width.max(1.0) as u32, height.max(1.0) as u32);
    STATE.with(|state| {
        if let Some(mounted) = state.borrow_mut().as_mut() {
            mounted.session.resize(width, height);
            if let Some(ctx) = &mut mounted.gpu {
                resize_wgpu(ctx, width, height);
            }
        }
    });
}

/// Stops the render loop and releases the mounted globe. No-op when nothing
/// is mounted.
#[wasm_bindgen]
pub fn unmount() {
    stop_animation_loop();
    let mounted = STATE.with(|state| state.borrow_mut().take());
    if let Some(mut mounted) = mounted {
        mounted.session.dispose();
        if let Some(ctx) = &mut mounted.gpu {
            release_all(ctx);
        }
        info!(generation = mounted.generation, "globe unmounted");
    }
}

/// Runs one frame. Returns `false` once nothing is mounted.
fn render_current_frame(now_s: f64) -> bool {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        let Some(mounted) = state.as_mut() else {
            return false;
        };
        let frame = mounted.session.frame(now_s);
        if let Some(ctx) = &mut mounted.gpu
            && let Err(err) = render_frame(ctx, mounted.session.resources(), &frame)
        {
            warn!(?err, "frame render failed");
        }
        true
    })
}

fn request_animation_frame(callback: &Closure<dyn FnMut(f64)>) -> Result<i32, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window missing"))?;
    window.request_animation_frame(callback.as_ref().unchecked_ref())
}

fn start_animation_loop() -> Result<(), JsValue> {
    let callback: FrameCallback = Rc::new(RefCell::new(None));
    let request_id = Rc::new(Cell::new(None));

    let next_callback = callback.clone();
    let next_request_id = request_id.clone();
    *callback.borrow_mut() = Some(Closure::new(move |timestamp_ms: f64| {
        next_request_id.set(None);
        if !render_current_frame(timestamp_ms / 1000.0) {
            return;
        }
        if let Some(cb) = next_callback.borrow().as_ref() {
            match request_animation_frame(cb) {
                Ok(id) => next_request_id.set(Some(id)),
                Err(err) => error!(?err, "requestAnimationFrame failed"),
            }
        }
    }));

    let first = match callback.borrow().as_ref() {
        Some(cb) => request_animation_frame(cb)?,
        None => return Err(JsValue::from_str("frame callback missing")),
    };
    request_id.set(Some(first));

    ANIMATION.with(|slot| {
        *slot.borrow_mut() = Some(AnimationLoop {
            callback,
            request_id,
        });
    });
    Ok(())
}

fn stop_animation_loop() {
    let Some(animation) = ANIMATION.with(|slot| slot.borrow_mut().take()) else {
        return;
    };
    if let Some(id) = animation.request_id.take()
        && let Some(window) = web_sys::window()
        && let Err(err) = window.cancel_animation_frame(id)
    {
        warn!(?err, "cancelAnimationFrame failed");
    }
    // Breaks the closure's reference to itself.
    animation.callback.borrow_mut().take();
}

async fn fetch_land_image(url: &str) -> Result<RasterImage, RasterError> {
    let resp = Request::get(url)
        .send()
        .await
        .map_err(|e| RasterError::Fetch(e.to_string()))?;
    if !resp.ok() {
        return Err(RasterError::Fetch(format!("{url} returned {}", resp.status())));
    }
    let bytes = resp
        .binary()
        .await
        .map_err(|e| RasterError::Fetch(e.to_string()))?;
    RasterImage::decode(&bytes)
}
