// Browser smoke tests for the MapEngine facade.
#![cfg(target_arch = "wasm32")]

use citymap_engine::{MapEngine, ViewportState};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::HtmlCanvasElement;

wasm_bindgen_test_configure!(run_in_browser);

const GRID_JSON_ROW: &str = "mmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmmm";

fn grid_json() -> String {
    let rows: Vec<String> = (0..54).map(|_| format!("\"{GRID_JSON_ROW}\"")).collect();
    format!("[{}]", rows.join(","))
}

fn canvas() -> HtmlCanvasElement {
    let document = web_sys::window().unwrap().document().unwrap();
    // Detached, so the engine waits for an explicit resize before placing the grid.
    document
        .create_element("canvas")
        .unwrap()
        .dyn_into()
        .unwrap()
}

fn viewport(engine: &MapEngine) -> ViewportState {
    serde_json::from_str(&engine.viewport_json().unwrap()).unwrap()
}

#[wasm_bindgen_test]
fn engine_sizes_to_min_scale() {
    let engine = MapEngine::new(canvas(), "{}", &grid_json()).unwrap();
    engine.resize(900.0, 900.0, 2.0).unwrap();
    let view = viewport(&engine);
    assert_eq!(view.scale, 2.0);
    assert_eq!(view.offset_y, -90.0);
}

#[wasm_bindgen_test]
fn rejects_wrong_grid_size() {
    assert!(MapEngine::new(canvas(), "{}", "[\"mmm\"]").is_err());
}

#[wasm_bindgen_test]
fn occupants_load_and_selection_mode_toggles() {
    let engine = MapEngine::new(canvas(), "{}", &grid_json()).unwrap();
    engine.resize(450.0, 540.0, 1.0).unwrap();
    engine
        .load_occupants(r##"[{"cellX":10,"cellY":10,"color":"#ff0000"}]"##)
        .unwrap();
    engine.enter_selection_mode();
    engine.exit_selection_mode();
    engine
        .refresh(r##"[{"imageX":10,"imageY":10,"color":"#ff0000"},{"imageX":2,"imageY":3,"color":"#00ff00"}]"##)
        .unwrap();
    assert!(engine.refresh("not json").is_err());
    assert_eq!(viewport(&engine).scale, 1.0);
}
