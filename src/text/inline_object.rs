//! Host-side objects embedded in text: images, inputs, buttons, selects and
//! the hit areas of links.
//!
//! The layout engine only needs a size per entity. Everything else, such as
//! creating nodes, attaching them and pooling them between rebuilds, goes
//! through the [`InlineHost`] the embedding application implements.

use std::collections::HashMap;

use euclid::default::{Box2D, Point2D, Size2D, Vector2D};

use crate::text::{
    ElementKind, ElementStatus, MarkupElement,
    layout::EntitySizer,
    mesh::LinkArea,
};

/// Placeholder size used when an image has no size at all.
const EMPTY_IMAGE_SIZE: Size2D<f32> = Size2D::new(5.0, 10.0);
const BUTTON_SIZE: Size2D<f32> = Size2D::new(100.0, 30.0);
const SELECT_SIZE: Size2D<f32> = Size2D::new(100.0, 20.0);
/// Inputs narrower than this take half of the owner width instead.
const MIN_INPUT_WIDTH: f32 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InlineObjectKind {
    Image,
    Input,
    Button,
    Select,
    Object,
    /// Hit area over the text of a link. Takes no room on the line.
    Link,
}

impl InlineObjectKind {
    /// Object kind an entity element maps to. `<input type="button">` and
    /// `type="submit"` become buttons.
    pub fn for_element(element: &MarkupElement) -> Option<Self> {
        match element.kind {
            ElementKind::Image => Some(Self::Image),
            ElementKind::Select => Some(Self::Select),
            ElementKind::Object => Some(Self::Object),
            ElementKind::Link => Some(Self::Link),
            ElementKind::Input => {
                let ty = element.get_string_or("type", "").to_ascii_lowercase();
                match ty.as_str() {
                    "button" | "submit" => Some(Self::Button),
                    _ => Some(Self::Input),
                }
            }
            _ => None,
        }
    }
}

/// Intrinsic size of a resource referenced by `src`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResourceInfo {
    pub width: f32,
    pub height: f32,
}

/// Lifecycle of an [`InlineObject`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ObjectState {
    #[default]
    Created,
    /// Content was taken from the element.
    Bound,
    Positioned,
    Added,
    Removed,
    Released,
    /// Sitting in a pool, ready for reuse.
    Pooled,
    Disposed,
}

/// A display node owned by the host.
pub trait InlineNode: Send {
    /// Takes content (image source, caption, options) from `element`.
    fn bind(&mut self, element: &MarkupElement);

    fn set_position(&mut self, position: Point2D<f32>);

    fn set_size(&mut self, _size: Size2D<f32>) {}

    /// Rects covered by a link, one per line, in content space.
    fn set_areas(&mut self, _areas: &[Box2D<f32>]) {}

    /// Clears bound content before the node goes back to the pool.
    fn release(&mut self) {}

    /// Destroyed by someone else; such nodes are dropped instead of pooled.
    fn is_disposed(&self) -> bool {
        false
    }

    /// Frees the node for good. It is dropped right after.
    fn dispose(&mut self) {}
}

/// The embedding application.
pub trait InlineHost {
    /// Creates a node for `kind`. `None` leaves the entity as an empty slot.
    fn create_node(&mut self, kind: InlineObjectKind) -> Option<Box<dyn InlineNode>>;

    /// Size of the resource named `src`, if the host knows it.
    fn load_resource(&mut self, _src: &str) -> Option<ResourceInfo> {
        None
    }

    fn attach(&mut self, node: &mut dyn InlineNode);

    fn detach(&mut self, node: &mut dyn InlineNode);
}

/// The object behind one entity element.
pub struct InlineObject {
    kind: InlineObjectKind,
    state: ObjectState,
    size: Size2D<f32>,
    node: Option<Box<dyn InlineNode>>,
    disposed: bool,
}

impl std::fmt::Debug for InlineObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineObject")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("size", &self.size)
            .field("has_node", &self.node.is_some())
            .finish()
    }
}

impl InlineObject {
    pub fn new(kind: InlineObjectKind, node: Option<Box<dyn InlineNode>>) -> Self {
        Self {
            kind,
            state: ObjectState::Created,
            size: Size2D::zero(),
            node,
            disposed: false,
        }
    }

    pub fn kind(&self) -> InlineObjectKind {
        self.kind
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    pub fn size(&self) -> Size2D<f32> {
        self.size
    }

    pub fn node_mut(&mut self) -> Option<&mut (dyn InlineNode + 'static)> {
        self.node.as_deref_mut()
    }

    /// The node will be disposed instead of pooled when released.
    pub fn mark_disposed(&mut self) {
        self.disposed = true;
    }
}

/// Size an entity occupies on its line.
///
/// `resource` is the intrinsic size of the referenced resource, if known.
/// Inputs without an explicit width use the space left on the line, or half
/// the owner when that space is unreasonable.
pub fn entity_size(
    kind: InlineObjectKind,
    element: &MarkupElement,
    owner_width: f32,
    resource: Option<ResourceInfo>,
) -> Size2D<f32> {
    let attr = |name: &str, default: f32| element.get_int(name, default as i32) as f32;

    match kind {
        InlineObjectKind::Image | InlineObjectKind::Object => {
            let intrinsic = resource.unwrap_or_default();
            let mut width = attr("width", intrinsic.width);
            let mut height = attr("height", intrinsic.height);
            if width == 0.0 {
                width = EMPTY_IMAGE_SIZE.width;
            }
            if height == 0.0 {
                height = EMPTY_IMAGE_SIZE.height;
            }
            Size2D::new(width, height)
        }
        InlineObjectKind::Input => {
            let mut width = attr("width", 0.0);
            let mut height = attr("height", 0.0);
            if width == 0.0 {
                width = element.space;
                if width > owner_width / 2.0 || width < MIN_INPUT_WIDTH {
                    width = (owner_width / 2.0).floor();
                }
            }
            if height == 0.0 {
                height = element.format.size as f32 + 10.0;
            }
            Size2D::new(width, height)
        }
        InlineObjectKind::Button => Size2D::new(
            attr("width", BUTTON_SIZE.width),
            attr("height", BUTTON_SIZE.height),
        ),
        InlineObjectKind::Select => Size2D::new(
            attr("width", SELECT_SIZE.width),
            attr("height", SELECT_SIZE.height),
        ),
        InlineObjectKind::Link => Size2D::zero(),
    }
}

/// Sizes entities from their attributes alone, without creating objects.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttributeSizer;

impl EntitySizer for AttributeSizer {
    fn entity_size(&mut self, element: &mut MarkupElement, owner_width: f32) -> Size2D<f32> {
        match InlineObjectKind::for_element(element) {
            Some(kind) => entity_size(kind, element, owner_width, None),
            None => Size2D::zero(),
        }
    }
}

/// Free lists of released nodes, one per kind.
#[derive(Default)]
pub struct InlineObjectPool {
    free: HashMap<InlineObjectKind, Vec<Box<dyn InlineNode>>, fxhash::FxBuildHasher>,
}

impl InlineObjectPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pooled nodes of `kind`.
    pub fn len(&self, kind: InlineObjectKind) -> usize {
        self.free.get(&kind).map_or(0, Vec::len)
    }

    /// Takes a pooled node or asks `host` for a new one, then binds it.
    pub fn acquire(
        &mut self,
        kind: InlineObjectKind,
        element: &MarkupElement,
        host: &mut dyn InlineHost,
    ) -> InlineObject {
        let node = match self.free.get_mut(&kind).and_then(Vec::pop) {
            Some(node) => Some(node),
            None => host.create_node(kind),
        };
        let mut object = InlineObject::new(kind, node);
        if let Some(node) = object.node.as_deref_mut() {
            node.bind(element);
            object.state = ObjectState::Bound;
        }
        object
    }

    /// Detaches `object` if needed and pools its node, or disposes it when
    /// the object was marked disposed.
    pub fn release(&mut self, mut object: InlineObject, added: bool, host: &mut dyn InlineHost) {
        let Some(mut node) = object.node.take() else {
            return;
        };
        if added {
            host.detach(node.as_mut());
        }
        node.release();
        object.state = ObjectState::Released;

        if object.disposed || node.is_disposed() {
            node.dispose();
            object.state = ObjectState::Disposed;
        } else {
            self.free.entry(object.kind).or_default().push(node);
            object.state = ObjectState::Pooled;
        }
    }

    /// Disposes every pooled node.
    pub fn clear(&mut self) {
        for (_, nodes) in self.free.drain() {
            for mut node in nodes {
                node.dispose();
            }
        }
    }
}

/// Creates inline objects on first sight and sizes them during layout.
pub struct ObjectBinder<'a> {
    pub pool: &'a mut InlineObjectPool,
    pub host: &'a mut dyn InlineHost,
}

impl EntitySizer for ObjectBinder<'_> {
    fn entity_size(&mut self, element: &mut MarkupElement, owner_width: f32) -> Size2D<f32> {
        let Some(kind) = InlineObjectKind::for_element(element) else {
            return Size2D::zero();
        };
        if element.object.is_none() {
            let object = self.pool.acquire(kind, element, self.host);
            element.object = Some(object);
        }

        let resource = element.get_string("src").and_then(|src| {
            let info = self.host.load_resource(src);
            if info.is_none() {
                log::warn!("Resource '{}' not found, using a placeholder.", src);
            }
            info
        });
        let size = entity_size(kind, element, owner_width, resource);
        if let Some(object) = element.object.as_mut() {
            object.size = size;
            if let Some(node) = object.node.as_deref_mut() {
                node.set_size(size);
            }
        }
        size
    }
}

/// Gives every link an object and hands it the rects its text covers.
/// Links whose text is not drawn are marked clipped.
pub fn bind_links(
    elements: &mut [MarkupElement],
    areas: &[LinkArea],
    pool: &mut InlineObjectPool,
    host: &mut dyn InlineHost,
) {
    for area in areas {
        let Some(element) = elements.get_mut(area.element_index) else {
            continue;
        };
        if element.kind != ElementKind::Link {
            continue;
        }
        if element.object.is_none() {
            let object = pool.acquire(InlineObjectKind::Link, element, host);
            element.object = Some(object);
        }

        let first = area.rects.first().copied();
        if let Some(rect) = first {
            element.position = rect.min;
            element.size = rect.size();
        }
        element.status.set(ElementStatus::CLIPPED, first.is_none());
        if let Some(node) = element.object.as_mut().and_then(|o| o.node.as_deref_mut()) {
            node.set_areas(&area.rects);
        }
    }
}

/// Moves every object to its composed position and attaches or detaches it
/// according to its element status.
pub fn sync_objects(elements: &mut [MarkupElement], offset: Vector2D<f32>, host: &mut dyn InlineHost) {
    for element in elements.iter_mut() {
        let visible = !element
            .status
            .intersects(ElementStatus::CLIPPED | ElementStatus::HIDDEN);
        let added = element.status.contains(ElementStatus::ADDED);
        let Some(object) = element.object.as_mut() else {
            continue;
        };
        let Some(node) = object.node.as_deref_mut() else {
            continue;
        };

        node.set_position(element.position + offset);
        if object.state == ObjectState::Bound {
            object.state = ObjectState::Positioned;
        }

        if visible && !added {
            host.attach(node);
            element.status.insert(ElementStatus::ADDED);
            object.state = ObjectState::Added;
        } else if !visible && added {
            host.detach(node);
            element.status.remove(ElementStatus::ADDED);
            object.state = ObjectState::Removed;
        }
    }
}

/// Returns every object to `pool`.
pub fn release_objects(
    elements: &mut [MarkupElement],
    pool: &mut InlineObjectPool,
    host: &mut dyn InlineHost,
) {
    for element in elements.iter_mut() {
        if let Some(object) = element.object.take() {
            let added = element.status.contains(ElementStatus::ADDED);
            pool.release(object, added, host);
            element.status.remove(ElementStatus::ADDED);
        }
    }
}
