//! Direction detection and per-line visual reordering.

use unicode_bidi::{BidiClass, BidiInfo, Level, bidi_class};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl TextDirection {
    pub fn is_rtl(self) -> bool {
        self == Self::RightToLeft
    }

    fn level(self) -> Level {
        match self {
            Self::LeftToRight => Level::ltr(),
            Self::RightToLeft => Level::rtl(),
        }
    }
}

/// Whether any character of `text` is strongly right-to-left.
pub fn needs_bidi(text: &[char]) -> bool {
    text.iter()
        .any(|&ch| matches!(bidi_class(ch), BidiClass::R | BidiClass::AL))
}

/// Dominant direction, decided by majority of strong characters in the
/// first hundred characters.
pub fn detect_direction(text: &[char]) -> TextDirection {
    let (mut rtl, mut ltr) = (0usize, 0usize);
    for &ch in text.iter().take(100) {
        match bidi_class(ch) {
            BidiClass::R | BidiClass::AL => rtl += 1,
            BidiClass::L => ltr += 1,
            _ => {}
        }
    }
    if rtl > ltr {
        TextDirection::RightToLeft
    } else {
        TextDirection::LeftToRight
    }
}

/// Visual order of the characters of one line.
///
/// Returns offsets relative to the start of `line`, listed left to right.
pub fn visual_order(line: &[char], direction: TextDirection) -> Vec<usize> {
    let text: String = line.iter().collect();
    let byte_to_char: Vec<usize> = {
        let mut map = vec![0; text.len() + 1];
        for (i, (byte, ch)) in text.char_indices().enumerate() {
            map[byte..byte + ch.len_utf8()].fill(i);
        }
        map[text.len()] = line.len();
        map
    };

    let info = BidiInfo::new(&text, Some(direction.level()));
    let mut order = Vec::with_capacity(line.len());
    for para in &info.paragraphs {
        let (levels, runs) = info.visual_runs(para, para.range.clone());
        for run in runs {
            let chars = byte_to_char[run.start]..byte_to_char[run.end];
            if levels[run.start].is_rtl() {
                order.extend(chars.rev());
            } else {
                order.extend(chars);
            }
        }
    }
    order
}
