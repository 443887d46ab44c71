//! Per-face virtual content.
//!
//! Each tracked face gets one [`VirtualContent`] controller, chosen by the
//! selected [`VirtualContentType`]. A controller turns anchor updates into a
//! small [`RenderNode`] tree that a scene renderer can walk.
//!
//! Extending content:
//! - add a strategy type in `strategies`
//! - add a variant to `VirtualContentType` and map it in `make_controller`

mod coordinator;
mod strategies;

pub use coordinator::ContentCoordinator;
pub use strategies::{BlendShapeCharacter, FaceOcclusionOverlay, TexturedFace, TransformVisualization, VideoTexturedFace};

use glam::Mat3;

use crate::math::{Pose, Transform4x4};
use crate::render::uv::DisplayTransform;
pub use crate::session::BlendShapes;
use crate::session::{AugmentedFace, FaceId, FaceMesh, RegionType};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum VirtualContentType {
    Transforms,
    #[default]
    Texture,
    Geometry,
    VideoTexture,
    BlendShape,
}

impl VirtualContentType {
    pub const ALL: [Self; 5] = [
        Self::Transforms,
        Self::Texture,
        Self::Geometry,
        Self::VideoTexture,
        Self::BlendShape,
    ];

    pub fn make_controller(self) -> Box<dyn VirtualContent> {
        match self {
            Self::Transforms => Box::new(TransformVisualization::default()),
            Self::Texture => Box::new(TexturedFace::default()),
            Self::Geometry => Box::new(FaceOcclusionOverlay::default()),
            Self::VideoTexture => Box::new(VideoTexturedFace::default()),
            Self::BlendShape => Box::new(BlendShapeCharacter::default()),
        }
    }
}

/// Snapshot of one face anchor handed to its controller.
#[derive(Debug, Clone, Copy)]
pub struct AnchorUpdate<'a> {
    pub id: FaceId,
    pub center_pose: Pose,
    pub region_poses: [(RegionType, Pose); 3],
    pub mesh: &'a FaceMesh,
    pub display_transform: DisplayTransform,
    pub blend_shapes: BlendShapes,
}

impl<'a> AnchorUpdate<'a> {
    pub fn from_face(face: &'a AugmentedFace, display_transform: DisplayTransform) -> Self {
        Self {
            id: face.id,
            center_pose: face.center_pose,
            region_poses: RegionType::ALL.map(|r| (r, face.region_pose(r))),
            mesh: &face.mesh,
            display_transform,
            blend_shapes: face.blend_shapes,
        }
    }

    /// Pose of `region`, or the face center when the anchor lacks it.
    pub fn region_pose(&self, region: RegionType) -> Pose {
        self.region_poses
            .iter()
            .find(|(r, _)| *r == region)
            .map_or(self.center_pose, |(_, pose)| *pose)
    }

    pub fn with_blend_shapes(mut self, blend_shapes: BlendShapes) -> Self {
        self.blend_shapes = blend_shapes;
        self
    }
}

/// What a node draws. Geometry is referenced, never copied out of the
/// session, except where a controller deforms it.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Grouping node.
    Empty,
    /// RGB axis triad with arms of `length` meters.
    Axes { length: f32 },
    /// Face mesh with a diffuse texture asset.
    TexturedMesh { texture: String },
    /// Face mesh written to depth only, hiding content behind the head.
    OcclusionMesh,
    /// Face mesh sampling the camera image through the display transform.
    VideoTexturedMesh { display_transform: Mat3 },
    /// Unit sphere scaled by the node transform.
    Sphere { color: [f32; 4] },
    /// The overlay model configured for `region`.
    RegionModel { region: RegionType },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub name: String,
    /// Parent-relative transform.
    pub transform: Transform4x4,
    pub kind: NodeKind,
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    pub fn new(name: impl Into<String>, transform: Transform4x4, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform,
            kind,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: RenderNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first lookup by name.
    pub fn find(&self, name: &str) -> Option<&RenderNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(RenderNode::node_count).sum::<usize>()
    }

    /// World transform and kind of every node, parents before children,
    /// siblings in order. That is the draw order.
    pub fn flatten(&self, parent: &Transform4x4) -> Vec<(Transform4x4, &NodeKind)> {
        let mut out = Vec::with_capacity(self.node_count());
        self.flatten_into(parent, &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, parent: &Transform4x4, out: &mut Vec<(Transform4x4, &'a NodeKind)>) {
        let world = *parent * self.transform;
        out.push((world, &self.kind));
        for child in &self.children {
            child.flatten_into(&world, out);
        }
    }
}

/// Strategy producing the content attached to one face anchor.
pub trait VirtualContent: std::fmt::Debug {
    fn content_type(&self) -> VirtualContentType;

    /// Builds the node tree for a newly tracked anchor.
    fn attach_to(&mut self, anchor: &AnchorUpdate<'_>) -> RenderNode;

    /// Refreshes `node` for a moved or deformed anchor. Rebuilds by default.
    fn update(&mut self, node: &mut RenderNode, anchor: &AnchorUpdate<'_>) {
        *node = self.attach_to(anchor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn flatten_composes_parent_transforms_in_draw_order() {
        let root = RenderNode::new("root", Mat4::from_translation(Vec3::X), NodeKind::Empty)
            .with_child(
                RenderNode::new("a", Mat4::from_translation(Vec3::Y), NodeKind::OcclusionMesh).with_child(
                    RenderNode::new("a1", Mat4::from_scale(Vec3::splat(2.0)), NodeKind::Sphere { color: [1.0; 4] }),
                ),
            )
            .with_child(RenderNode::new("b", Mat4::IDENTITY, NodeKind::Axes { length: 0.1 }));

        let flat = root.flatten(&Mat4::IDENTITY);
        let kinds: Vec<_> = flat.iter().map(|(_, k)| *k).collect();
        assert_eq!(
            kinds,
            [
                &NodeKind::Empty,
                &NodeKind::OcclusionMesh,
                &NodeKind::Sphere { color: [1.0; 4] },
                &NodeKind::Axes { length: 0.1 },
            ]
        );
        assert_eq!(flat[1].0.w_axis.truncate(), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(flat[2].0.x_axis.x, 2.0);
        assert_eq!(flat[3].0, Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn anchor_update_carries_session_blend_shapes() {
        let mut face = AugmentedFace::new(FaceId(0), Pose::IDENTITY, FaceMesh::default());
        face.blend_shapes.jaw_open = 0.75;
        let update = AnchorUpdate::from_face(&face, DisplayTransform::IDENTITY);
        assert_eq!(update.blend_shapes.jaw_open, 0.75);
    }
}
