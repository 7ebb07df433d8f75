//! Asynchronous model loading and scene integration.
//!
//! A load request is issued once at startup and reports back over a
//! single-shot event channel polled by the frame loop. The three outcomes
//! are mutually exclusive: zero or more `Progress` events, then either one
//! `Success` carrying the parsed model root or one `Failure`. On failure the
//! scene is left untouched and no retry is attempted. No timeout is
//! enforced; a request that never resolves simply leaves the progress
//! indicator visible.
//!
//! Decoding produces a plain [`Node`] tree, so everything downstream of the
//! fetch (shadow tagging, offset placement, insertion, indicator
//! notification) runs without a GPU device or any real I/O.

use std::sync::mpsc::{self, Receiver};

use cgmath::Vector3;
use thiserror::Error;

use crate::mesh::{MeshData, MeshVertex};
use crate::resources::load_binary;
use crate::scene::{Node, Scene, Transform};

/// The single error kind produced by the loader. Network, filesystem and
/// parse failures all collapse into it; callers only log and move on.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not fetch {path}: {message}")]
    Fetch { path: String, message: String },
    #[error("invalid glTF in {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("{path} contains no scenes")]
    EmptyScene { path: String },
}

/// Events delivered over the load channel.
#[derive(Debug)]
pub enum LoadEvent {
    /// Bytes fetched so far; reporting only, no state changes.
    Progress { loaded: u64, total: u64 },
    /// The parsed model root. Fires at most once.
    Success(Node),
    /// Fires at most once, instead of `Success`.
    Failure(LoadError),
}

/// External progress-UI collaborator. The viewer only writes to it: progress
/// reports while loading and one hide on success.
pub trait ProgressIndicator {
    fn report(&self, loaded: u64, total: u64);
    fn hide(&self);
}

/// Native indicator: reports to the log.
pub struct LogIndicator;

impl ProgressIndicator for LogIndicator {
    fn report(&self, loaded: u64, total: u64) {
        if total > 0 {
            log::info!("loading model: {}%", loaded * 100 / total);
        }
    }

    fn hide(&self) {
        log::info!("model loaded");
    }
}

/// WASM indicator: hides a DOM element looked up by id. The element's
/// lifecycle is owned by the hosting page; only its visibility is written.
#[cfg(target_arch = "wasm32")]
pub struct DomIndicator {
    pub element_id: String,
}

#[cfg(target_arch = "wasm32")]
impl ProgressIndicator for DomIndicator {
    fn report(&self, loaded: u64, total: u64) {
        if total > 0 {
            log::info!("loading model: {}%", loaded * 100 / total);
        }
    }

    fn hide(&self) {
        let element = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(&self.element_id));
        match element {
            Some(element) => {
                let _ = element.set_attribute("style", "display:none");
            }
            None => log::warn!("progress element #{} not found", self.element_id),
        }
    }
}

/// Issue the load request. Returns the receiving end of the event channel;
/// the request itself runs on the async runtime and cannot be cancelled.
#[cfg(not(target_arch = "wasm32"))]
pub fn begin_load(
    handle: &tokio::runtime::Handle,
    base: &str,
    file_name: &str,
) -> Receiver<LoadEvent> {
    let (tx, rx) = mpsc::channel();
    let base = base.to_string();
    let file_name = file_name.to_string();
    handle.spawn(async move {
        let outcome = async {
            let path = std::path::Path::new(&base).join(&file_name);
            let bytes = read_with_progress(&path, &tx).await?;
            decode_scene(&bytes, &base, &file_name).await
        }
        .await;
        let event = match outcome {
            Ok(node) => LoadEvent::Success(node),
            Err(e) => LoadEvent::Failure(e),
        };
        // The receiver may already be gone when the window closed.
        let _ = tx.send(event);
    });
    rx
}

/// WASM variant: the file is fetched relative to the page origin.
#[cfg(target_arch = "wasm32")]
pub fn begin_load(base: &str, file_name: &str) -> Receiver<LoadEvent> {
    let (tx, rx) = mpsc::channel();
    let base = base.to_string();
    let file_name = file_name.to_string();
    wasm_bindgen_futures::spawn_local(async move {
        let outcome = async {
            let bytes = load_binary(&base, &file_name).await?;
            let total = bytes.len() as u64;
            let _ = tx.send(LoadEvent::Progress {
                loaded: total,
                total,
            });
            decode_scene(&bytes, &base, &file_name).await
        }
        .await;
        let event = match outcome {
            Ok(node) => LoadEvent::Success(node),
            Err(e) => LoadEvent::Failure(e),
        };
        let _ = tx.send(event);
    });
    rx
}

#[cfg(not(target_arch = "wasm32"))]
async fn read_with_progress(
    path: &std::path::Path,
    tx: &mpsc::Sender<LoadEvent>,
) -> Result<Vec<u8>, LoadError> {
    use tokio::io::AsyncReadExt;

    let io_err = |source| LoadError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let total = file.metadata().await.map_err(io_err)?.len();

    let mut data = Vec::with_capacity(total as usize);
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await.map_err(io_err)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        let _ = tx.send(LoadEvent::Progress {
            loaded: data.len() as u64,
            total,
        });
    }
    Ok(data)
}

/// Decode glTF bytes into a scene node tree. External buffer and image
/// references resolve against `base`.
pub async fn decode_scene(bytes: &[u8], base: &str, name: &str) -> Result<Node, LoadError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|source| LoadError::Gltf {
        path: name.to_string(),
        source,
    })?;

    // Buffer payloads: either the GLB blob or external files.
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                if let Some(blob) = gltf.blob.as_deref() {
                    buffer_data.push(blob.into());
                }
            }
            gltf::buffer::Source::Uri(uri) => {
                buffer_data.push(load_binary(base, uri).await?);
            }
        }
    }

    // Image payloads, indexed by glTF image index. Fetched up front so tree
    // construction stays synchronous.
    let mut image_data: Vec<(Vec<u8>, Option<String>)> = Vec::new();
    for image in gltf.images() {
        match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let buffer = &buffer_data[view.buffer().index()];
                let bytes = buffer[view.offset()..view.offset() + view.length()].to_vec();
                image_data.push((bytes, extension_from_mime(Some(mime_type))));
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let bytes = load_binary(base, uri).await?;
                let format =
                    extension_from_mime(mime_type).or_else(|| extension_from_path(uri));
                image_data.push((bytes, format));
            }
        }
    }

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| LoadError::EmptyScene {
            path: name.to_string(),
        })?;

    let mut roots: Vec<Node> = scene
        .nodes()
        .map(|node| build_node(node, &buffer_data, &image_data))
        .collect();

    Ok(if roots.len() == 1 {
        roots.remove(0)
    } else {
        let mut root = Node::group();
        for child in roots {
            root.add_child(child);
        }
        root
    })
}

fn extension_from_mime(mime_type: Option<&str>) -> Option<String> {
    mime_type
        .and_then(|mt| mt.split('/').next_back())
        .map(str::to_string)
}

fn extension_from_path(path: &str) -> Option<String> {
    path.rsplit('.').next().map(str::to_string)
}

fn build_node(
    node: gltf::scene::Node,
    buffer_data: &[Vec<u8>],
    image_data: &[(Vec<u8>, Option<String>)],
) -> Node {
    let mut meshes: Vec<MeshData> = node
        .mesh()
        .map(|mesh| {
            mesh.primitives()
                .map(|primitive| read_primitive(&mesh, primitive, buffer_data, image_data))
                .collect()
        })
        .unwrap_or_default();

    // A single primitive becomes the node itself; multiple primitives become
    // mesh children under a group so each keeps its own material.
    let mut scene_node = if meshes.len() == 1 {
        Node::mesh(meshes.remove(0))
    } else if meshes.is_empty() {
        Node::group()
    } else {
        let mut group = Node::group();
        for mesh in meshes {
            group.add_child(Node::mesh(mesh));
        }
        group
    };

    let (position, rotation, scale) = node.transform().decomposed();
    scene_node.transform = Transform {
        position: position.into(),
        rotation: rotation.into(),
        scale: scale.into(),
    };

    for child in node.children() {
        scene_node.add_child(build_node(child, buffer_data, image_data));
    }
    scene_node
}

fn read_primitive(
    mesh: &gltf::Mesh,
    primitive: gltf::Primitive,
    buffer_data: &[Vec<u8>],
    image_data: &[(Vec<u8>, Option<String>)],
) -> MeshData {
    let reader = primitive.reader(|buffer| Some(&buffer_data[buffer.index()]));

    let mut vertices = Vec::new();
    if let Some(positions) = reader.read_positions() {
        positions.for_each(|position| {
            vertices.push(MeshVertex {
                position,
                tex_coords: Default::default(),
                normal: Default::default(),
            })
        });
    }
    if let Some(normals) = reader.read_normals() {
        for (i, normal) in normals.enumerate() {
            if let Some(vertex) = vertices.get_mut(i) {
                vertex.normal = normal;
            }
        }
    }
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|tc| tc.into_f32()) {
        for (i, uv) in tex_coords.enumerate() {
            if let Some(vertex) = vertices.get_mut(i) {
                vertex.tex_coords = uv;
            }
        }
    }

    let indices = match reader.read_indices() {
        Some(raw) => raw.into_u32().collect(),
        // Non-indexed geometry draws vertices in order.
        None => (0..vertices.len() as u32).collect(),
    };

    let material = primitive.material();
    let pbr = material.pbr_metallic_roughness();
    let base_color = pbr.base_color_factor();
    let (texture_bytes, texture_format) = match pbr.base_color_texture() {
        Some(info) => {
            let image = info.texture().source();
            let (bytes, format) = &image_data[image.index()];
            (Some(bytes.clone()), format.clone())
        }
        None => (None, None),
    };

    MeshData {
        name: mesh.name().unwrap_or("unnamed_mesh").to_string(),
        vertices,
        indices,
        base_color,
        texture_bytes,
        texture_format,
    }
}

/// Mark every renderable mesh in the subtree as casting and receiving
/// shadows. Non-mesh nodes are unaffected.
pub fn tag_shadow_casters(root: &mut Node) {
    root.visit_mut(&mut |node| {
        if node.is_mesh() {
            node.cast_shadow = true;
            node.receive_shadow = true;
        }
    });
}

/// Apply one load event to the scene. Returns `true` when the event was
/// terminal (`Success` or `Failure`), after which the channel is spent.
pub fn apply_load_event(
    scene: &mut Scene,
    indicator: &dyn ProgressIndicator,
    model_offset: Vector3<f32>,
    event: LoadEvent,
) -> bool {
    match event {
        LoadEvent::Progress { loaded, total } => {
            indicator.report(loaded, total);
            false
        }
        LoadEvent::Success(mut root) => {
            tag_shadow_casters(&mut root);
            root.transform.position = model_offset;
            scene.add_node(root);
            indicator.hide();
            true
        }
        LoadEvent::Failure(err) => {
            log::error!("failed to load model: {}", err);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroundConfig, LightConfig};
    use crate::mesh;
    use std::cell::Cell;

    struct CountingIndicator {
        reports: Cell<u32>,
        hides: Cell<u32>,
    }

    impl CountingIndicator {
        fn new() -> Self {
            Self {
                reports: Cell::new(0),
                hides: Cell::new(0),
            }
        }
    }

    impl ProgressIndicator for CountingIndicator {
        fn report(&self, _loaded: u64, _total: u64) {
            self.reports.set(self.reports.get() + 1);
        }

        fn hide(&self) {
            self.hides.set(self.hides.get() + 1);
        }
    }

    fn initial_scene() -> Scene {
        Scene::with_initial_contents(&GroundConfig::default(), &LightConfig::default())
    }

    fn model_root() -> Node {
        // A group with two mesh children and one empty group, roughly the
        // shape a small glTF file decodes into.
        let quad = || mesh::plane(1.0, 1, [1.0, 1.0, 1.0, 1.0]);
        let mut root = Node::group();
        root.add_child(Node::mesh(quad()));
        let mut inner = Node::group();
        inner.add_child(Node::mesh(quad()));
        root.add_child(inner);
        root
    }

    #[test]
    fn progress_reports_without_scene_mutation() {
        let mut scene = initial_scene();
        let indicator = CountingIndicator::new();
        let offset = Vector3::new(0.0, 1.05, -1.0);

        let terminal = apply_load_event(
            &mut scene,
            &indicator,
            offset,
            LoadEvent::Progress {
                loaded: 10,
                total: 100,
            },
        );

        assert!(!terminal);
        assert_eq!(scene.child_count(), 2);
        assert_eq!(indicator.reports.get(), 1);
        assert_eq!(indicator.hides.get(), 0);
    }

    #[test]
    fn success_attaches_model_at_offset_and_hides_indicator() {
        let mut scene = initial_scene();
        let indicator = CountingIndicator::new();
        let offset = Vector3::new(0.0, 1.05, -1.0);
        assert_eq!(scene.child_count(), 2);

        let terminal = apply_load_event(
            &mut scene,
            &indicator,
            offset,
            LoadEvent::Success(model_root()),
        );

        assert!(terminal);
        assert_eq!(scene.child_count(), 3);
        assert_eq!(indicator.hides.get(), 1);
        let attached = &scene.root.children[2];
        assert_eq!(attached.transform.position, offset);
    }

    #[test]
    fn success_tags_every_mesh_in_the_subtree() {
        let mut scene = initial_scene();
        let indicator = CountingIndicator::new();

        apply_load_event(
            &mut scene,
            &indicator,
            Vector3::new(0.0, 1.05, -1.0),
            LoadEvent::Success(model_root()),
        );

        let attached = &scene.root.children[2];
        let mut meshes = 0;
        let mut groups = 0;
        attached.visit(&mut |node| {
            if node.is_mesh() {
                meshes += 1;
                assert!(node.cast_shadow);
                assert!(node.receive_shadow);
            } else {
                groups += 1;
                assert!(!node.cast_shadow);
                assert!(!node.receive_shadow);
            }
        });
        assert_eq!(meshes, 2);
        assert_eq!(groups, 2);
    }

    #[test]
    fn failure_leaves_scene_and_indicator_alone() {
        let mut scene = initial_scene();
        let indicator = CountingIndicator::new();

        let terminal = apply_load_event(
            &mut scene,
            &indicator,
            Vector3::new(0.0, 1.05, -1.0),
            LoadEvent::Failure(LoadError::Fetch {
                path: "scene.gltf".to_string(),
                message: "unreachable".to_string(),
            }),
        );

        assert!(terminal);
        assert_eq!(scene.child_count(), 2);
        assert_eq!(indicator.hides.get(), 0);
    }

    #[test]
    fn ground_keeps_its_flags_after_model_attach() {
        let mut scene = initial_scene();
        let indicator = CountingIndicator::new();

        apply_load_event(
            &mut scene,
            &indicator,
            Vector3::new(0.0, 1.05, -1.0),
            LoadEvent::Success(model_root()),
        );

        let ground = &scene.root.children[0];
        assert!(ground.receive_shadow);
        assert!(!ground.cast_shadow);
    }

    #[test]
    fn tagging_is_idempotent() {
        let mut root = model_root();
        tag_shadow_casters(&mut root);
        tag_shadow_casters(&mut root);
        let mut meshes = 0;
        root.visit(&mut |node| {
            if node.is_mesh() {
                meshes += 1;
                assert!(node.cast_shadow && node.receive_shadow);
            }
        });
        assert_eq!(meshes, 2);
    }
}
