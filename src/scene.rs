//! Scene graph: nodes, transforms and the initial scene contents.
//!
//! A [`Node`] is a tree entity with a local transform, an optional payload
//! (mesh or light) and shadow flags. Children are owned by their parent.
//! The graph is plain data so it can be built and asserted on without a GPU
//! device; GPU buffers attach to mesh nodes lazily at render time.

use std::ops::Mul;

use cgmath::{Deg, Matrix3, Matrix4, One, Quaternion, Rotation3, Vector3};

use crate::config::{GroundConfig, LightConfig};
use crate::mesh::{self, GpuMesh, MeshData, Vertex};

/// Local transform: position, rotation (as quaternion) and scale.
#[derive(Clone, Debug)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> TransformRaw {
        TransformRaw {
            model: self.to_matrix().into(),
            normal: Matrix3::from(self.rotation).into(),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, 'b> Mul<&'b Transform> for &'a Transform {
    type Output = Transform;

    fn mul(self, rhs: &'b Transform) -> Self::Output {
        let rotation = self.rotation * rhs.rotation;
        let scale = Vector3::new(
            self.scale.x * rhs.scale.x,
            self.scale.y * rhs.scale.y,
            self.scale.z * rhs.scale.z,
        );
        let scaled_rhs_pos = Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        let position = self.position + (self.rotation * scaled_rhs_pos);

        Transform {
            position,
            rotation,
            scale,
        }
    }
}

impl Mul<Transform> for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Self::Output {
        &self * &rhs
    }
}

/// World transform as it is stored in the per-node instance buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

impl Vertex for TransformRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<TransformRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // The model matrix takes four vec4 slots.
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // The normal matrix takes three vec3 slots.
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Spot light parameters. The light's position is the owning node's
/// transform; `target` fixes the cone direction.
#[derive(Clone, Debug)]
pub struct SpotLight {
    pub target: Vector3<f32>,
    pub color: [f32; 3],
    pub intensity: f32,
    pub angle: Deg<f32>,
    pub penumbra: f32,
    pub shadow_bias: f32,
}

/// Node payload.
#[derive(Debug)]
pub enum NodeKind {
    Group,
    Mesh(MeshData),
    Light(SpotLight),
}

/// A scene graph node. Children are owned by their parent.
#[derive(Debug)]
pub struct Node {
    pub transform: Transform,
    pub kind: NodeKind,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub children: Vec<Node>,
    /// World transform, refreshed by `update_world_transforms`.
    pub(crate) world: Transform,
    /// GPU resources, uploaded lazily at render time.
    pub(crate) gpu: Option<GpuMesh>,
}

impl Node {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            transform: Transform::new(),
            kind,
            cast_shadow: false,
            receive_shadow: false,
            children: Vec::new(),
            world: Transform::new(),
            gpu: None,
        }
    }

    pub fn group() -> Self {
        Self::with_kind(NodeKind::Group)
    }

    pub fn mesh(data: MeshData) -> Self {
        Self::with_kind(NodeKind::Mesh(data))
    }

    pub fn light(light: SpotLight) -> Self {
        Self::with_kind(NodeKind::Light(light))
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh(_))
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Walk the full subtree, parents before children.
    pub fn visit(&self, f: &mut dyn FnMut(&Node)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Walk the full subtree mutably, parents before children.
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Node)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    /// Propagate the parent world transform down the subtree.
    pub fn update_world_transforms(&mut self, parent: &Transform) {
        self.world = parent * &self.transform;
        let world = self.world.clone();
        for child in &mut self.children {
            child.update_world_transforms(&world);
        }
    }

    pub fn world_transform(&self) -> &Transform {
        &self.world
    }
}

/// The scene graph container: a root group holding the ground, the light
/// and, once loaded, the model.
#[derive(Debug)]
pub struct Scene {
    pub root: Node,
}

impl Scene {
    pub fn new() -> Self {
        Self { root: Node::group() }
    }

    /// Build the initial scene contents: ground plane and spot light.
    pub fn with_initial_contents(ground: &GroundConfig, light: &LightConfig) -> Self {
        let mut scene = Self::new();
        scene.root.add_child(ground_plane(ground));
        scene.root.add_child(spot_light(light));
        scene
    }

    /// Number of direct children of the root.
    pub fn child_count(&self) -> usize {
        self.root.children.len()
    }

    pub fn add_node(&mut self, node: Node) {
        self.root.add_child(node);
    }

    pub fn update_world_transforms(&mut self) {
        self.root.update_world_transforms(&Transform::default());
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// One-time ground construction: a flat subdivided plane rotated to be
/// horizontal, receiving but not casting shadows.
pub fn ground_plane(config: &GroundConfig) -> Node {
    let mut node = Node::mesh(mesh::plane(config.size, config.subdivisions, config.color));
    node.transform.rotation = Quaternion::from_angle_x(Deg(-90.0));
    node.receive_shadow = true;
    node.cast_shadow = false;
    node
}

/// The scene's single spot light. Static after creation.
pub fn spot_light(config: &LightConfig) -> Node {
    let mut node = Node::light(SpotLight {
        target: Vector3::new(config.target.x, config.target.y, config.target.z),
        color: config.color,
        intensity: config.intensity,
        angle: config.angle,
        penumbra: config.penumbra,
        shadow_bias: config.shadow_bias,
    });
    node.transform.position = Vector3::new(config.position.x, config.position.y, config.position.z);
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Rad, Rotation};

    #[test]
    fn initial_scene_has_ground_and_light() {
        let scene =
            Scene::with_initial_contents(&GroundConfig::default(), &LightConfig::default());
        assert_eq!(scene.child_count(), 2);
        assert!(scene.root.children[0].is_mesh());
        assert!(matches!(scene.root.children[1].kind, NodeKind::Light(_)));
    }

    #[test]
    fn ground_receives_but_does_not_cast() {
        let ground = ground_plane(&GroundConfig::default());
        assert!(ground.receive_shadow);
        assert!(!ground.cast_shadow);
    }

    #[test]
    fn ground_rotation_turns_plane_normal_up() {
        let ground = ground_plane(&GroundConfig::default());
        let up = ground.transform.rotation.rotate_vector(Vector3::unit_z());
        assert!((up - Vector3::unit_y()).magnitude() < 1e-5);
    }

    #[test]
    fn transform_composition_applies_parent_first() {
        let mut parent = Transform::new();
        parent.position = Vector3::new(1.0, 0.0, 0.0);
        parent.scale = Vector3::new(2.0, 2.0, 2.0);
        let mut child = Transform::new();
        child.position = Vector3::new(0.0, 1.0, 0.0);

        let world = &parent * &child;
        assert!((world.position - Vector3::new(1.0, 2.0, 0.0)).magnitude() < 1e-5);
        assert!((world.scale - Vector3::new(2.0, 2.0, 2.0)).magnitude() < 1e-5);
    }

    #[test]
    fn world_transforms_propagate_down_the_tree() {
        let mut root = Node::group();
        root.transform.position = Vector3::new(0.0, 1.0, 0.0);
        let mut child = Node::group();
        child.transform.position = Vector3::new(0.0, 0.0, 2.0);
        let grandchild = Node::group();
        child.add_child(grandchild);
        root.add_child(child);

        root.update_world_transforms(&Transform::default());
        let world = root.children[0].children[0].world_transform();
        assert!((world.position - Vector3::new(0.0, 1.0, 2.0)).magnitude() < 1e-5);
    }

    #[test]
    fn visit_reaches_every_node() {
        let mut root = Node::group();
        let mut a = Node::group();
        a.add_child(Node::group());
        root.add_child(a);
        root.add_child(Node::group());

        let mut count = 0;
        root.visit(&mut |_| count += 1);
        assert_eq!(count, 4);
    }

    #[test]
    fn rotation_composition_matches_quaternion_product() {
        let mut a = Transform::new();
        a.rotation = Quaternion::from_angle_y(Rad(std::f32::consts::FRAC_PI_2));
        let mut b = Transform::new();
        b.rotation = Quaternion::from_angle_y(Rad(std::f32::consts::FRAC_PI_2));
        let combined = &a * &b;
        let rotated = combined.rotation.rotate_vector(Vector3::unit_x());
        assert!((rotated - Vector3::new(-1.0, 0.0, 0.0)).magnitude() < 1e-5);
    }
}
