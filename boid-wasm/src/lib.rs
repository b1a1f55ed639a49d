use boid_core::{Flock, FlockParams};
use boid_shared::{BoidSnapshot, SettingsUpdate};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

macro_rules! console_log {
    ($($t:tt)*) => (log(&format_args!($($t)*).to_string()))
}

const BOID_COLOR: &str = "#558cf4";
const PREDATOR_COLOR: &str = "#f4558c";
const BOID_TRAIL_COLOR: &str = "#558cf466";
const PREDATOR_TRAIL_COLOR: &str = "#f4558c66";

/// Length and half-width of the drawn triangle
const BOID_LENGTH: f64 = 15.0;
const BOID_HALF_WIDTH: f64 = 5.0;

fn fill_color(is_predator: bool) -> &'static str {
    if is_predator {
        PREDATOR_COLOR
    } else {
        BOID_COLOR
    }
}

fn trail_color(is_predator: bool) -> &'static str {
    if is_predator {
        PREDATOR_TRAIL_COLOR
    } else {
        BOID_TRAIL_COLOR
    }
}

/// Triangle vertices in boid-local space: tip at the origin, pointing along +x
fn triangle() -> [(f64, f64); 3] {
    [
        (0.0, 0.0),
        (-BOID_LENGTH, BOID_HALF_WIDTH),
        (-BOID_LENGTH, -BOID_HALF_WIDTH),
    ]
}

fn to_js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct BoidSimulation {
    flock: Flock,
    params: FlockParams,
    width: f32,
    height: f32,
    draw_trail: bool,
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

#[wasm_bindgen]
impl BoidSimulation {
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas_id: &str,
        width: f64,
        height: f64,
        boid_count: usize,
        predator: bool,
    ) -> Result<BoidSimulation, JsValue> {
        console_log!(
            "Initializing boid simulation with {} boids (predator: {})",
            boid_count,
            predator
        );

        let window = web_sys::window().ok_or("no global window")?;
        let document = window.document().ok_or("no document")?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or("canvas not found")?
            .dyn_into::<HtmlCanvasElement>()?;

        canvas.set_width(width as u32);
        canvas.set_height(height as u32);

        let context = canvas
            .get_context("2d")?
            .ok_or("no 2d context")?
            .dyn_into::<CanvasRenderingContext2d>()?;

        let flock =
            Flock::random(boid_count, width as f32, height as f32, predator).map_err(to_js_error)?;

        Ok(BoidSimulation {
            flock,
            params: FlockParams::default(),
            width: width as f32,
            height: height as f32,
            draw_trail: false,
            canvas,
            context,
        })
    }

    pub fn update(&mut self) {
        self.flock.step(self.width, self.height, &self.params);
    }

    pub fn render(&self) -> Result<(), JsValue> {
        let width = self.canvas.width() as f64;
        let height = self.canvas.height() as f64;

        self.context.clear_rect(0.0, 0.0, width, height);

        for snapshot in BoidSnapshot::from_flock(&self.flock, self.draw_trail) {
            self.draw_boid(&snapshot)?;
            if self.draw_trail {
                self.stroke_trail(&snapshot);
            }
        }

        Ok(())
    }

    /// One animation frame; call from `requestAnimationFrame`
    pub fn tick(&mut self) -> Result<(), JsValue> {
        self.update();
        self.render()
    }

    fn draw_boid(&self, boid: &BoidSnapshot) -> Result<(), JsValue> {
        let [tip, left, right] = triangle();

        self.context.save();
        self.context
            .translate(boid.position.x as f64, boid.position.y as f64)?;
        self.context.rotate(boid.heading as f64)?;

        self.context.begin_path();
        self.context.move_to(tip.0, tip.1);
        self.context.line_to(left.0, left.1);
        self.context.line_to(right.0, right.1);
        self.context.close_path();

        self.context.set_fill_style_str(fill_color(boid.is_predator));
        self.context.fill();

        self.context.restore();

        Ok(())
    }

    fn stroke_trail(&self, boid: &BoidSnapshot) {
        let Some((first, rest)) = boid.trail.split_first() else {
            return;
        };

        self.context.set_stroke_style_str(trail_color(boid.is_predator));
        self.context.begin_path();
        self.context.move_to(first.x as f64, first.y as f64);
        for point in rest {
            self.context.line_to(point.x as f64, point.y as f64);
        }
        self.context.stroke();
    }

    /// Only the bounds rule sees the new viewport; boids stay where they are
    pub fn resize(&mut self, width: f64, height: f64) {
        self.canvas.set_width(width as u32);
        self.canvas.set_height(height as u32);
        self.width = width as f32;
        self.height = height as f32;
        console_log!("Resized to {}x{}", width, height);
    }

    pub fn boid_count(&self) -> usize {
        self.flock.len()
    }

    pub fn set_speed_limit(&mut self, speed: f32) {
        self.params.speed_limit = speed;
    }

    pub fn set_visual_range(&mut self, range: f32) {
        self.params.visual_range = range;
    }

    pub fn set_velocity_factor(&mut self, factor: f32) {
        self.params.velocity_factor = factor;
    }

    pub fn set_avoid_factor(&mut self, factor: f32) {
        self.params.avoid_factor = factor;
    }

    pub fn set_centering_factor(&mut self, factor: f32) {
        self.params.centering_factor = factor;
    }

    pub fn set_draw_trail(&mut self, enabled: bool) {
        self.draw_trail = enabled;
    }

    /// Changing the count starts a fresh flock
    pub fn set_boid_count(&mut self, count: usize) -> Result<(), JsValue> {
        self.reinitialize(count, self.flock.predator().is_some())
    }

    pub fn set_predator(&mut self, enabled: bool) -> Result<(), JsValue> {
        self.reinitialize(self.flock.len(), enabled)
    }

    /// Applies a JSON-encoded `SettingsUpdate` from the page's controls
    pub fn apply_settings_json(&mut self, json: &str) -> Result<(), JsValue> {
        let update = SettingsUpdate::from_json(json).map_err(to_js_error)?;
        let (width, height) = (self.width, self.height);

        let respawned = update
            .settings
            .commit(&mut self.flock, &mut self.params, |count, predator| {
                Flock::random(count, width, height, predator).map_err(to_js_error)
            })?;

        if respawned {
            console_log!(
                "Reinitialized with {} boids (predator: {})",
                update.settings.boid_count,
                update.settings.predator
            );
        }

        Ok(())
    }

    fn reinitialize(&mut self, count: usize, predator: bool) -> Result<(), JsValue> {
        self.flock = Flock::random(count, self.width, self.height, predator).map_err(to_js_error)?;
        console_log!("Reinitialized with {} boids (predator: {})", count, predator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_follow_predator_flag() {
        assert_eq!(fill_color(false), BOID_COLOR);
        assert_eq!(fill_color(true), PREDATOR_COLOR);
        assert_ne!(trail_color(true), trail_color(false));
    }

    #[test]
    fn test_triangle_points_along_heading() {
        let [tip, left, right] = triangle();
        assert_eq!(tip, (0.0, 0.0));
        assert!(left.0 < 0.0 && right.0 < 0.0);
        assert_eq!(left.1, -right.1);
    }

    #[test]
    fn test_invalid_count_maps_to_js_error_text() {
        let err = Flock::seeded(0, 10.0, 10.0, false, 0).unwrap_err();
        assert_eq!(err.to_string(), "invalid configuration: boid count must be positive");
    }
}
