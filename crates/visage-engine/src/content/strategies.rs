use glam::{Mat4, Quat, Vec3};

use crate::session::RegionType;

use super::{AnchorUpdate, NodeKind, RenderNode, VirtualContent, VirtualContentType};

const FACE_NODE: &str = "face";

/// Region overlays in draw order; the nose goes last so nothing hides it.
const REGION_DRAW_ORDER: [RegionType; 3] = [RegionType::ForeheadRight, RegionType::ForeheadLeft, RegionType::NoseTip];

fn region_name(region: RegionType) -> &'static str {
    match region {
        RegionType::NoseTip => "nose-tip",
        RegionType::ForeheadLeft => "forehead-left",
        RegionType::ForeheadRight => "forehead-right",
    }
}

/// Axis triads on the face center and on every region.
#[derive(Debug)]
pub struct TransformVisualization {
    pub axis_length: f32,
}

impl Default for TransformVisualization {
    fn default() -> Self {
        Self { axis_length: 0.1 }
    }
}

impl VirtualContent for TransformVisualization {
    fn content_type(&self) -> VirtualContentType {
        VirtualContentType::Transforms
    }

    fn attach_to(&mut self, anchor: &AnchorUpdate<'_>) -> RenderNode {
        // Region poses are world poses, so they hang off an identity root.
        let mut root = RenderNode::new("anchor", Mat4::IDENTITY, NodeKind::Empty).with_child(RenderNode::new(
            FACE_NODE,
            anchor.center_pose.to_matrix(),
            NodeKind::Axes {
                length: self.axis_length,
            },
        ));
        for (region, pose) in anchor.region_poses {
            root.children.push(RenderNode::new(
                region_name(region),
                pose.to_matrix(),
                NodeKind::Axes {
                    length: self.axis_length * 0.3,
                },
            ));
        }
        root
    }
}

/// Face mesh painted with a texture, plus the region overlay models.
#[derive(Debug)]
pub struct TexturedFace {
    pub texture: String,
}

impl Default for TexturedFace {
    fn default() -> Self {
        Self {
            texture: "models/freckles.png".into(),
        }
    }
}

impl VirtualContent for TexturedFace {
    fn content_type(&self) -> VirtualContentType {
        VirtualContentType::Texture
    }

    fn attach_to(&mut self, anchor: &AnchorUpdate<'_>) -> RenderNode {
        let mut root = RenderNode::new("anchor", Mat4::IDENTITY, NodeKind::Empty).with_child(RenderNode::new(
            FACE_NODE,
            anchor.center_pose.to_matrix(),
            NodeKind::TexturedMesh {
                texture: self.texture.clone(),
            },
        ));
        for region in REGION_DRAW_ORDER {
            root.children.push(RenderNode::new(
                region_name(region),
                anchor.region_pose(region).to_matrix(),
                NodeKind::RegionModel { region },
            ));
        }
        root
    }

    fn update(&mut self, node: &mut RenderNode, anchor: &AnchorUpdate<'_>) {
        for child in &mut node.children {
            child.transform = match child.kind {
                NodeKind::RegionModel { region } => anchor.region_pose(region).to_matrix(),
                _ => anchor.center_pose.to_matrix(),
            };
        }
    }
}

/// Depth-only face mesh with a marker on the nose, so virtual content
/// behind the head is hidden.
#[derive(Debug, Default)]
pub struct FaceOcclusionOverlay;

impl VirtualContent for FaceOcclusionOverlay {
    fn content_type(&self) -> VirtualContentType {
        VirtualContentType::Geometry
    }

    fn attach_to(&mut self, anchor: &AnchorUpdate<'_>) -> RenderNode {
        let marker = Mat4::from_scale_rotation_translation(
            Vec3::splat(0.015),
            Quat::IDENTITY,
            Vec3::new(0.0, -0.01, 0.08),
        );
        RenderNode::new(FACE_NODE, anchor.center_pose.to_matrix(), NodeKind::OcclusionMesh).with_child(
            RenderNode::new(
                "nose-marker",
                marker,
                NodeKind::Sphere {
                    color: [0.9, 0.1, 0.1, 1.0],
                },
            ),
        )
    }

    fn update(&mut self, node: &mut RenderNode, anchor: &AnchorUpdate<'_>) {
        node.transform = anchor.center_pose.to_matrix();
    }
}

/// Face mesh textured with the live camera image, lined up with the
/// background through the display transform.
#[derive(Debug, Default)]
pub struct VideoTexturedFace;

impl VirtualContent for VideoTexturedFace {
    fn content_type(&self) -> VirtualContentType {
        VirtualContentType::VideoTexture
    }

    fn attach_to(&mut self, anchor: &AnchorUpdate<'_>) -> RenderNode {
        RenderNode::new(
            FACE_NODE,
            anchor.center_pose.to_matrix(),
            NodeKind::VideoTexturedMesh {
                display_transform: anchor.display_transform.matrix(),
            },
        )
    }

    fn update(&mut self, node: &mut RenderNode, anchor: &AnchorUpdate<'_>) {
        node.transform = anchor.center_pose.to_matrix();
        if let NodeKind::VideoTexturedMesh { display_transform } = &mut node.kind {
            *display_transform = anchor.display_transform.matrix();
        }
    }
}

/// Simple character head whose eyes and jaw follow the blend shapes.
#[derive(Debug, Default)]
pub struct BlendShapeCharacter;

impl BlendShapeCharacter {
    const EYE_SIZE: f32 = 0.015;

    fn eye(x: f32, blink: f32) -> Mat4 {
        let openness = (1.0 - blink).clamp(0.1, 1.0);
        Mat4::from_scale_rotation_translation(
            Vec3::new(Self::EYE_SIZE, Self::EYE_SIZE * openness, Self::EYE_SIZE),
            Quat::IDENTITY,
            Vec3::new(x, 0.025, 0.07),
        )
    }

    fn jaw(open: f32) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::new(0.03, 0.01, 0.01),
            Quat::IDENTITY,
            Vec3::new(0.0, -0.045 - 0.03 * open.clamp(0.0, 1.0), 0.06),
        )
    }

    fn pose_children(node: &mut RenderNode, anchor: &AnchorUpdate<'_>) {
        let shapes = anchor.blend_shapes;
        for child in &mut node.children {
            child.transform = match child.name.as_str() {
                "eye-left" => Self::eye(-0.03, shapes.eye_blink_left),
                "eye-right" => Self::eye(0.03, shapes.eye_blink_right),
                "jaw" => Self::jaw(shapes.jaw_open),
                _ => continue,
            };
        }
    }
}

impl VirtualContent for BlendShapeCharacter {
    fn content_type(&self) -> VirtualContentType {
        VirtualContentType::BlendShape
    }

    fn attach_to(&mut self, anchor: &AnchorUpdate<'_>) -> RenderNode {
        let white = NodeKind::Sphere { color: [1.0; 4] };
        let mut node = RenderNode::new(FACE_NODE, anchor.center_pose.to_matrix(), NodeKind::Empty)
            .with_child(RenderNode::new(
                "head",
                Mat4::from_scale(Vec3::splat(0.08)),
                NodeKind::Sphere {
                    color: [1.0, 0.85, 0.2, 1.0],
                },
            ))
            .with_child(RenderNode::new("eye-left", Mat4::IDENTITY, white.clone()))
            .with_child(RenderNode::new("eye-right", Mat4::IDENTITY, white))
            .with_child(RenderNode::new(
                "jaw",
                Mat4::IDENTITY,
                NodeKind::Sphere {
                    color: [0.4, 0.1, 0.1, 1.0],
                },
            ));
        Self::pose_children(&mut node, anchor);
        node
    }

    fn update(&mut self, node: &mut RenderNode, anchor: &AnchorUpdate<'_>) {
        node.transform = anchor.center_pose.to_matrix();
        Self::pose_children(node, anchor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::BlendShapes;
    use crate::math::Pose;
    use crate::render::uv::DisplayTransform;
    use crate::session::{AugmentedFace, FaceId, FaceMesh};

    fn face() -> AugmentedFace {
        AugmentedFace::new(FaceId(3), Pose::from_translation(Vec3::new(0.0, 0.0, -0.5)), FaceMesh::default())
    }

    #[test]
    fn every_type_makes_its_own_controller() {
        for ty in VirtualContentType::ALL {
            assert_eq!(ty.make_controller().content_type(), ty);
        }
    }

    #[test]
    fn transforms_mark_center_and_regions() {
        let f = face();
        let node = TransformVisualization::default().attach_to(&AnchorUpdate::from_face(&f, DisplayTransform::IDENTITY));
        assert_eq!(node.node_count(), 5);
        let center = node.find(FACE_NODE).unwrap();
        assert_eq!(center.transform, f.center_pose.to_matrix());
        assert!(node.find("nose-tip").is_some());
    }

    #[test]
    fn textured_face_follows_anchor() {
        let mut f = face();
        let mut content = TexturedFace::default();
        let mut node = content.attach_to(&AnchorUpdate::from_face(&f, DisplayTransform::IDENTITY));
        f.center_pose = Pose::from_translation(Vec3::new(0.1, 0.0, -0.4));
        let nose = Pose::from_translation(Vec3::new(0.1, 0.0, -0.3));
        f.set_region_pose(RegionType::NoseTip, nose);
        content.update(&mut node, &AnchorUpdate::from_face(&f, DisplayTransform::IDENTITY));

        let mesh = node.find(FACE_NODE).unwrap();
        assert_eq!(mesh.transform, f.center_pose.to_matrix());
        assert_eq!(
            mesh.kind,
            NodeKind::TexturedMesh {
                texture: "models/freckles.png".into()
            }
        );
        assert_eq!(node.find("nose-tip").unwrap().transform, nose.to_matrix());
    }

    #[test]
    fn textured_face_draws_mesh_then_regions_nose_last() {
        let f = face();
        let node = TexturedFace::default().attach_to(&AnchorUpdate::from_face(&f, DisplayTransform::IDENTITY));
        let names: Vec<_> = node.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, [FACE_NODE, "forehead-right", "forehead-left", "nose-tip"]);
        assert_eq!(
            node.children[3].kind,
            NodeKind::RegionModel {
                region: RegionType::NoseTip
            }
        );
    }

    #[test]
    fn video_texture_tracks_display_transform() {
        let f = face();
        let mut content = VideoTexturedFace;
        let mut node = content.attach_to(&AnchorUpdate::from_face(&f, DisplayTransform::IDENTITY));
        let crop = DisplayTransform::center_crop(640, 480, 0.5, 90).unwrap();
        content.update(&mut node, &AnchorUpdate::from_face(&f, crop));
        assert_eq!(
            node.kind,
            NodeKind::VideoTexturedMesh {
                display_transform: crop.matrix()
            }
        );
    }

    #[test]
    fn blinking_flattens_the_eye() {
        let f = face();
        let mut content = BlendShapeCharacter;
        let open = AnchorUpdate::from_face(&f, DisplayTransform::IDENTITY);
        let mut node = content.attach_to(&open);
        let open_height = node.find("eye-left").unwrap().transform.y_axis.y;

        let blink = open.with_blend_shapes(BlendShapes {
            eye_blink_left: 1.0,
            ..BlendShapes::default()
        });
        content.update(&mut node, &blink);
        let closed_height = node.find("eye-left").unwrap().transform.y_axis.y;
        assert!(closed_height < open_height);
        assert_eq!(
            node.find("eye-right").unwrap().transform.y_axis.y,
            open_height
        );
    }

    #[test]
    fn occlusion_overlay_has_depth_only_root() {
        let f = face();
        let node = FaceOcclusionOverlay.attach_to(&AnchorUpdate::from_face(&f, DisplayTransform::IDENTITY));
        assert_eq!(node.kind, NodeKind::OcclusionMesh);
        assert_eq!(node.children.len(), 1);
    }
}
