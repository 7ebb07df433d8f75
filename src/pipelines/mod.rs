//! Render pipeline construction.
//!
//! - `light` holds the spot light uniform, its shadow map and bind groups
//! - `scene` builds the lit main pipeline and the shared pipeline helper
//! - `shadow` builds the depth-only pipeline rendered from the light

pub mod light;
pub mod scene;
pub mod shadow;
