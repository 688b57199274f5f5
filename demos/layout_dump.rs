use std::sync::Arc;

use glyphweave::{
    FontRegistry,
    text::{AutoSize, Color32, TextField, TextFormat, TypingEffect},
};

const WIDTH: f32 = 240.0;

fn main() {
    env_logger::init();

    // 1. Setup fonts
    let registry = Arc::new(FontRegistry::new());
    registry.load_system_fonts();

    // 2. Create a field with some markup
    let mut field = TextField::new(registry);
    field.set_format(TextFormat {
        size: 16,
        color: Color32::rgb(230, 230, 230),
        outline: 1.0,
        ..Default::default()
    });
    field.set_size(WIDTH, 40.0);
    field.set_word_wrap(true);
    field.set_auto_size(AutoSize::Height);
    field.set_html(
        "Hello <b>world</b>! This line is long enough to wrap at least once, \
         with <font color='#ff4080'>colored</font>, <u>underlined</u> and \
         <a href='event:docs'>linked</a> text.<br/>x<sup>2</sup> + H<sub>2</sub>O",
    );

    // 3. Dump lines
    field.ensure_mesh();
    let (width, height) = field.size();
    println!(
        "Field: {:.1}x{:.1} text={:.1}x{:.1}",
        width,
        height,
        field.text_width(),
        field.text_height()
    );
    let chars = field.chars().to_vec();
    for (index, line) in field.lines().iter().enumerate() {
        let content: String = chars[line.char_index..line.end()].iter().collect();
        println!(
            "  line {index}: y={:.1} h={:.1} w={:.1} {:?}",
            line.y, line.height, line.width, content
        );
    }

    // 4. Dump mesh stats
    let composed = field.composed();
    println!(
        "Mesh: {} vertices ({} main), {} triangles, {} links",
        composed.mesh.vertex_count(),
        composed.main_vertex_count,
        composed.mesh.triangles.len() / 3,
        composed.link_areas.len()
    );

    // 5. Run the typing effect to completion
    let mut typing = TypingEffect::new();
    typing.start(&mut field);
    let mut steps = 0;
    while typing.print(&mut field) {
        steps += 1;
    }
    println!("Typing finished after {steps} steps");
}
