//! WebAssembly bindings for the Contrast engine.
//!
//! This module exposes the engine to JavaScript through wasm-bindgen so a
//! browser worker can host it.

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
use crate::board::{CellIndex, Player};
#[cfg(feature = "wasm")]
use crate::codec::{self, ActionId};
#[cfg(feature = "wasm")]
use crate::engine::{ContrastEngine, Engine, StartupPayload};

/// Initialize panic hook for better error messages in browser console
#[cfg(feature = "wasm")]
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WASM-exposed engine wrapper
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub struct WasmEngine {
    engine: ContrastEngine,
}

#[cfg(feature = "wasm")]
#[wasm_bindgen]
impl WasmEngine {
    /// Create and initialize an engine. `seed` may be omitted.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: Option<u64>) -> Result<WasmEngine, JsValue> {
        let mut engine = ContrastEngine::new();
        engine
            .initialize(&StartupPayload {
                model_path: None,
                seed,
            })
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmEngine { engine })
    }

    /// Start a new game
    #[wasm_bindgen(js_name = resetGame)]
    pub fn reset_game(&mut self, player: u8) -> Result<(), JsValue> {
        let player = Player::try_from(player).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.engine
            .reset(player)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Get the current snapshot as JSON
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        self.engine
            .snapshot()
            .ok()
            .and_then(|s| serde_json::to_string(&s).ok())
            .unwrap_or_else(|| "null".to_string())
    }

    /// Legal destinations for the piece on `cell` as a JSON array
    #[wasm_bindgen(js_name = getValidMoves)]
    pub fn get_valid_moves(&self, cell: u8) -> String {
        let destinations = CellIndex::try_from(cell)
            .map(|c| self.engine.legal_destinations(c))
            .unwrap_or_default();
        serde_json::to_string(&destinations).unwrap_or_else(|_| "[]".to_string())
    }

    /// Apply an encoded action
    pub fn step(&mut self, action: u32) -> Result<(), JsValue> {
        self.engine
            .apply_action(ActionId(action))
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Undo the last action; false when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        self.engine.reverse_last_action().is_ok()
    }

    /// Let the AI search and play; returns `{action, value}` as JSON
    #[wasm_bindgen(js_name = aiThink)]
    pub fn ai_think(&mut self, simulations: u32) -> Result<String, JsValue> {
        let outcome = self
            .engine
            .run_ai_search(simulations)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        serde_json::to_string(&outcome).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Decode an action id into `{origin, destination, modification}` JSON
    #[wasm_bindgen(js_name = decodeAction)]
    pub fn decode_action(&self, action: u32) -> String {
        codec::decode(ActionId(action))
            .ok()
            .and_then(|m| serde_json::to_string(&m).ok())
            .unwrap_or_else(|| "null".to_string())
    }
}
