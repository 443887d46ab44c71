use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::session::FaceId;

use super::{AnchorUpdate, RenderNode, TexturedFace, VirtualContent, VirtualContentType};

#[derive(Debug)]
struct Attached {
    controller: Box<dyn VirtualContent>,
    node: Option<RenderNode>,
}

/// Maps face anchors to their content controllers.
///
/// Switching the selected content type replaces every controller; the new
/// ones attach on the anchor's next update.
#[derive(Debug)]
pub struct ContentCoordinator {
    selected: VirtualContentType,
    face_texture: String,
    attached: BTreeMap<FaceId, Attached>,
}

impl Default for ContentCoordinator {
    fn default() -> Self {
        Self::new(VirtualContentType::default())
    }
}

fn controller_for(content: VirtualContentType, face_texture: &str) -> Box<dyn VirtualContent> {
    match content {
        VirtualContentType::Texture => Box::new(TexturedFace {
            texture: face_texture.to_string(),
        }),
        other => other.make_controller(),
    }
}

impl ContentCoordinator {
    pub fn new(selected: VirtualContentType) -> Self {
        Self {
            selected,
            face_texture: TexturedFace::default().texture,
            attached: BTreeMap::new(),
        }
    }

    /// Texture asset painted on the face by `VirtualContentType::Texture`.
    pub fn with_face_texture(mut self, texture: impl Into<String>) -> Self {
        self.face_texture = texture.into();
        self
    }

    #[inline]
    pub fn selected(&self) -> VirtualContentType {
        self.selected
    }

    pub fn select(&mut self, content: VirtualContentType) {
        if content == self.selected {
            return;
        }
        log::debug!("virtual content {:?} -> {:?}", self.selected, content);
        self.selected = content;
        for entry in self.attached.values_mut() {
            entry.controller = controller_for(content, &self.face_texture);
            entry.node = None;
        }
    }

    /// A new anchor appeared. Re-adding a known anchor rebuilds its content.
    pub fn did_add(&mut self, anchor: &AnchorUpdate<'_>) -> &RenderNode {
        let mut controller = controller_for(self.selected, &self.face_texture);
        let node = controller.attach_to(anchor);
        let entry = match self.attached.entry(anchor.id) {
            Entry::Occupied(o) => {
                let e = o.into_mut();
                e.controller = controller;
                e
            }
            Entry::Vacant(v) => v.insert(Attached { controller, node: None }),
        };
        entry.node.insert(node)
    }

    /// An anchor moved. Unknown anchors are ignored.
    pub fn did_update(&mut self, anchor: &AnchorUpdate<'_>) -> Option<&RenderNode> {
        let entry = self.attached.get_mut(&anchor.id)?;
        match &mut entry.node {
            Some(node) => entry.controller.update(node, anchor),
            None => entry.node = Some(entry.controller.attach_to(anchor)),
        }
        entry.node.as_ref()
    }

    pub fn did_remove(&mut self, id: FaceId) -> Option<RenderNode> {
        self.attached.remove(&id).and_then(|e| e.node)
    }

    /// Drops every anchor, as after a tracking reset.
    pub fn clear(&mut self) {
        self.attached.clear();
    }

    #[inline]
    pub fn contains(&self, id: FaceId) -> bool {
        self.attached.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.attached.keys().copied()
    }

    pub fn node(&self, id: FaceId) -> Option<&RenderNode> {
        self.attached.get(&id).and_then(|e| e.node.as_ref())
    }
}
