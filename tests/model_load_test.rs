//! End-to-end load path without a GPU: decode a GLB from bytes, push the
//! resulting events through the same sequencing the frame loop uses and
//! assert on the scene graph.

#![cfg(not(target_arch = "wasm32"))]

use std::sync::mpsc;

use vantage::Vector3;
use vantage::config::{GroundConfig, LightConfig};
use vantage::loader::{LoadError, LoadEvent, LogIndicator, apply_load_event, decode_scene};
use vantage::scene::{NodeKind, Scene};

/// Assemble a binary glTF container from a JSON chunk and an optional
/// binary chunk.
fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json_bytes = json.as_bytes().to_vec();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
    let mut bin_bytes = bin.to_vec();
    while bin_bytes.len() % 4 != 0 {
        bin_bytes.push(0);
    }

    let mut total = 12 + 8 + json_bytes.len();
    if !bin.is_empty() {
        total += 8 + bin_bytes.len();
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&0x4654_6C67u32.to_le_bytes()); // "glTF"
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes()); // "JSON"
    out.extend_from_slice(&json_bytes);
    if !bin.is_empty() {
        out.extend_from_slice(&(bin_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&0x004E_4942u32.to_le_bytes()); // "BIN"
        out.extend_from_slice(&bin_bytes);
    }
    out
}

/// One translated node holding a single non-indexed triangle.
fn triangle_glb() -> Vec<u8> {
    let json = r#"{
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0, "translation": [1.0, 2.0, 3.0]}],
        "meshes": [{"name": "triangle", "primitives": [{"attributes": {"POSITION": 0}}]}],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }],
        "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36}],
        "buffers": [{"byteLength": 36}]
    }"#;

    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let mut bin = Vec::with_capacity(36);
    for v in positions {
        bin.extend_from_slice(&v.to_le_bytes());
    }
    glb(json, &bin)
}

fn initial_scene() -> Scene {
    Scene::with_initial_contents(&GroundConfig::default(), &LightConfig::default())
}

#[tokio::test]
async fn decodes_a_glb_into_a_mesh_node() {
    let bytes = triangle_glb();
    let root = decode_scene(&bytes, "assets", "triangle.glb")
        .await
        .expect("decode failed");

    let NodeKind::Mesh(data) = &root.kind else {
        panic!("expected a mesh node, got {:?}", root.kind);
    };
    assert_eq!(data.name, "triangle");
    assert_eq!(data.vertices.len(), 3);
    // Non-indexed geometry draws vertices in order.
    assert_eq!(data.indices, vec![0, 1, 2]);
    assert_eq!(data.base_color, [1.0, 1.0, 1.0, 1.0]);
    assert_eq!(root.transform.position, Vector3::new(1.0, 2.0, 3.0));
}

#[tokio::test]
async fn rejects_gltf_without_scenes() {
    let bytes = glb(r#"{"asset": {"version": "2.0"}}"#, &[]);
    let result = decode_scene(&bytes, "assets", "empty.glb").await;
    assert!(matches!(result, Err(LoadError::EmptyScene { .. })));
}

#[tokio::test]
async fn rejects_garbage_bytes() {
    let result = decode_scene(b"not a gltf file", "assets", "junk.gltf").await;
    assert!(matches!(result, Err(LoadError::Gltf { .. })));
}

#[tokio::test]
async fn load_sequence_attaches_model_after_progress() {
    let root = decode_scene(&triangle_glb(), "assets", "triangle.glb")
        .await
        .expect("decode failed");

    let mut scene = initial_scene();
    assert_eq!(scene.child_count(), 2);

    // The viewer drains the channel exactly like this each frame.
    let (tx, rx) = mpsc::channel();
    tx.send(LoadEvent::Progress {
        loaded: 10,
        total: 20,
    })
    .unwrap();
    tx.send(LoadEvent::Success(root)).unwrap();

    let offset = Vector3::new(0.0, 1.05, -1.0);
    let mut spent = false;
    while let Ok(event) = rx.try_recv() {
        if apply_load_event(&mut scene, &LogIndicator, offset, event) {
            spent = true;
            break;
        }
    }

    assert!(spent);
    assert_eq!(scene.child_count(), 3);
    let attached = &scene.root.children[2];
    assert_eq!(attached.transform.position, offset);
    assert!(attached.is_mesh());
    assert!(attached.cast_shadow);
    assert!(attached.receive_shadow);
}

#[test]
fn failed_load_leaves_the_scene_untouched() {
    let mut scene = initial_scene();
    let offset = Vector3::new(0.0, 1.05, -1.0);

    let terminal = apply_load_event(
        &mut scene,
        &LogIndicator,
        offset,
        LoadEvent::Failure(LoadError::Fetch {
            path: "scene.gltf".to_string(),
            message: "unreachable".to_string(),
        }),
    );

    assert!(terminal);
    assert_eq!(scene.child_count(), 2);
}
