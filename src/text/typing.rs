//! Typewriter reveal over an already composed mesh.

use euclid::default::Point2D;

use crate::text::{ElementStatus, TextField};

/// Reveals a text field one character per [`TypingEffect::print`].
///
/// The effect works on the live mesh: starting collapses every vertex to
/// the origin, and each step copies a character's vertices back from a
/// backup, in every layer (shadow, outline directions, main). Inline objects
/// are hidden until their placeholder is reached.
#[derive(Debug, Default)]
pub struct TypingEffect {
    backup: Vec<Point2D<f32>>,
    main_count: usize,
    layers: usize,
    print_index: usize,
    vertex_index: usize,
    generation: u64,
    layout_generation: u64,
    running: bool,
}

impl TypingEffect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Hides everything. Call [`TypingEffect::print`] to reveal.
    pub fn start(&mut self, field: &mut TextField) {
        if self.running {
            self.cancel(field);
        }
        field.ensure_mesh();
        self.generation = field.mesh_generation();
        self.layout_generation = field.layout_generation();

        let (composed, _, elements) = field.parts_mut();
        self.main_count = composed
            .char_positions
            .iter()
            .map(|cp| cp.vertex_count)
            .sum();
        let total = composed.mesh.vertex_count();
        self.layers = if self.main_count == 0 {
            1
        } else {
            total / self.main_count
        };
        self.backup.clone_from(&composed.mesh.vertices);
        composed.mesh.vertices.fill(Point2D::zero());

        for element in elements.iter_mut().filter(|e| e.is_entity()) {
            element.status.insert(ElementStatus::HIDDEN);
        }
        field.sync_inline_objects();

        self.print_index = 0;
        self.vertex_index = 0;
        self.running = true;
        log::trace!(
            "Typing started: {} vertices in {} layers.",
            self.main_count,
            self.layers
        );
    }

    /// Reveals up to the next visible character or inline object.
    ///
    /// Returns `false` once everything is shown; the effect is cancelled
    /// at that point.
    pub fn print(&mut self, field: &mut TextField) -> bool {
        if !self.running {
            return false;
        }
        field.ensure_mesh();
        if field.layout_generation() != self.layout_generation {
            log::debug!("Text was laid out again during typing, cancelling.");
            self.backup.clear();
            self.cancel(field);
            return false;
        }
        if field.mesh_generation() != self.generation && !self.follow_mesh(field) {
            return false;
        }

        let (composed, text, elements) = field.parts_mut();
        let count = composed.char_positions.len().saturating_sub(1);
        while self.print_index < count {
            let cp = composed.char_positions[self.print_index];
            self.print_index += 1;

            if cp.image_index > 0 {
                if let Some(element) = elements.get_mut(cp.image_index - 1) {
                    element.status.remove(ElementStatus::HIDDEN);
                }
                field.sync_inline_objects();
                return true;
            }

            if cp.vertex_count > 0 {
                let vertices = &mut composed.mesh.vertices;
                for layer in 0..self.layers {
                    let start = layer * self.main_count + self.vertex_index;
                    let end = start + cp.vertex_count;
                    if let (Some(dst), Some(src)) =
                        (vertices.get_mut(start..end), self.backup.get(start..end))
                    {
                        dst.copy_from_slice(src);
                    }
                }
                self.vertex_index += cp.vertex_count;
            }

            let visible = text.get(cp.char_index).is_some_and(|ch| !ch.is_whitespace());
            if visible {
                return true;
            }
        }

        self.cancel(field);
        false
    }

    /// Shows everything and stops.
    pub fn cancel(&mut self, field: &mut TextField) {
        if !self.running {
            return;
        }
        self.running = false;

        let (composed, _, elements) = field.parts_mut();
        if composed.mesh.vertex_count() == self.backup.len() {
            composed.mesh.vertices.copy_from_slice(&self.backup);
        }
        for element in elements.iter_mut() {
            element.status.remove(ElementStatus::HIDDEN);
        }
        field.sync_inline_objects();
        self.backup.clear();
    }

    /// The mesh was rebuilt over the same lines. Keeps going when the vertex
    /// count is unchanged, otherwise stops. Returns whether the effect is still running.
    fn follow_mesh(&mut self, field: &mut TextField) -> bool {
        self.generation = field.mesh_generation();
        let (composed, _, _) = field.parts_mut();

        if composed.mesh.vertex_count() != self.backup.len() {
            log::debug!("Mesh changed size during typing, cancelling.");
            self.backup.clear();
            self.cancel(field);
            return false;
        }

        self.backup.clone_from(&composed.mesh.vertices);
        let vertices = &mut composed.mesh.vertices;
        for layer in 0..self.layers {
            let start = layer * self.main_count + self.vertex_index;
            let end = (layer + 1) * self.main_count;
            if let Some(hidden) = vertices.get_mut(start..end) {
                hidden.fill(Point2D::zero());
            }
        }
        true
    }
}
