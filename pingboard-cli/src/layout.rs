//! Generate an HTML/SVG picture of the Pingboard keyboard.
//! Every key is labelled with its note and its (group, position) in the matrix.

use pingboard_core::{KeyPosition, NoteName};

/// White key size in SVG pixels.
const WHITE_W: f64 = 34.0;
const WHITE_H: f64 = 160.0;
/// Black key size.
const BLACK_W: f64 = 22.0;
const BLACK_H: f64 = 100.0;
/// Key corner radius.
const R: f64 = 3.0;
/// Margin around the SVG content.
const MARGIN: f64 = 20.0;
/// Room above the keys for the title.
const TITLE_H: f64 = 30.0;

/// Pitch classes that sit on black keys.
const BLACK_CLASSES: [u8; 5] = [1, 3, 6, 8, 10];

/// Physical key position for SVG rendering.
struct Key {
    x: f64,
    black: bool,
    pos: KeyPosition,
    note: u8,
}

fn is_black(note: u8) -> bool {
    BLACK_CLASSES.contains(&(note % 12))
}

/// Lay out all keys left to right. Black keys straddle the boundary after
/// the preceding white key.
fn build_keys() -> Vec<Key> {
    let mut keys = Vec::new();
    let mut whites = 0usize;

    for pos in KeyPosition::all() {
        let note = pos.note();
        let black = is_black(note);
        let x = if black {
            whites as f64 * WHITE_W - BLACK_W / 2.0
        } else {
            whites += 1;
            (whites - 1) as f64 * WHITE_W
        };
        keys.push(Key { x, black, pos, note });
    }

    keys
}

fn render_key(key: &Key) -> String {
    let (w, h) = if key.black {
        (BLACK_W, BLACK_H)
    } else {
        (WHITE_W, WHITE_H)
    };
    // Even groups carry C..F, odd groups F#..B
    let half = if key.pos.group % 2 == 0 { "lower" } else { "upper" };
    let colour = if key.black { "black" } else { "white" };

    let mut svg = format!(
        r#"<rect x="{}" y="0" width="{w}" height="{h}" rx="{R}" class="key {colour} {half}"><title>group {} position {}: {} ({})</title></rect>"#,
        key.x, key.pos.group, key.pos.position, NoteName(key.note), key.note,
    );

    let cx = key.x + w / 2.0;
    svg.push_str(&format!(
        r#"<text x="{cx}" y="{}" class="label {colour}">{}</text>"#,
        h - 26.0,
        NoteName(key.note),
    ));
    svg.push_str(&format!(
        r#"<text x="{cx}" y="{}" class="label small {colour}">{}.{}</text>"#,
        h - 12.0,
        key.pos.group,
        key.pos.position,
    ));
    svg
}

/// Generate the complete HTML document with inline SVG.
pub fn generate_html() -> String {
    let keys = build_keys();
    let whites = keys.iter().filter(|k| !k.black).count();
    let total_width = whites as f64 * WHITE_W + 2.0 * MARGIN;
    let total_height = WHITE_H + TITLE_H + 2.0 * MARGIN;

    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Pingboard Layout</title>
<style>
  body {{
    background: #1a1a2e;
    color: #eee;
    font-family: system-ui, -apple-system, sans-serif;
    display: flex;
    justify-content: center;
    padding: 2em;
  }}
  svg {{
    filter: drop-shadow(0 2px 8px rgba(0,0,0,0.3));
  }}
  .key {{
    stroke-width: 1.5;
  }}
  .key.white {{
    fill: #e8e8f0;
    stroke: #0f3460;
  }}
  .key.black {{
    fill: #16213e;
    stroke: #0f3460;
  }}
  .key.white.upper {{
    fill: #d6e6f0;
  }}
  .key.black.upper {{
    fill: #1b2e4e;
  }}
  .key:hover {{
    stroke: #e94560;
  }}
  .label {{
    font-family: "JetBrains Mono", "Fira Code", monospace;
    font-size: 11px;
    text-anchor: middle;
    dominant-baseline: middle;
    pointer-events: none;
  }}
  .label.white {{
    fill: #16213e;
  }}
  .label.black {{
    fill: #eee;
  }}
  .label.small {{
    font-size: 9px;
  }}
  .title {{
    fill: #e94560;
    font-size: 16px;
    font-weight: bold;
  }}
</style>
</head>
<body>
<svg width="{total_width}" height="{total_height}" xmlns="http://www.w3.org/2000/svg">
<text x="{MARGIN}" y="{}" class="title">Pingboard: 49 keys, 9 drive groups</text>
<g transform="translate({MARGIN}, {})">
"#,
        MARGIN + 10.0,
        MARGIN + TITLE_H,
    );

    // White keys first so the black keys are drawn on top
    for key in keys.iter().filter(|k| !k.black) {
        html.push_str(&render_key(key));
        html.push('\n');
    }
    for key in keys.iter().filter(|k| k.black) {
        html.push_str(&render_key(key));
        html.push('\n');
    }

    html.push_str("</g>\n</svg>\n</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingboard_core::NUM_KEYS;

    #[test]
    fn four_octaves_and_a_top_c() {
        let keys = build_keys();
        assert_eq!(keys.len(), NUM_KEYS);
        assert_eq!(keys.iter().filter(|k| !k.black).count(), 29);
        assert_eq!(keys.iter().filter(|k| k.black).count(), 20);
    }

    #[test]
    fn black_keys_straddle_white_keys() {
        let keys = build_keys();
        // C2, C#2, D2
        assert_eq!(keys[0].x, 0.0);
        assert_eq!(keys[1].x, WHITE_W - BLACK_W / 2.0);
        assert_eq!(keys[2].x, WHITE_W);
    }

    #[test]
    fn html_labels_every_key() {
        let html = generate_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert_eq!(html.matches("<rect").count(), NUM_KEYS);
        assert!(html.contains(">C2<"));
        assert!(html.contains(">C6<"));
        assert!(html.contains(">8.0<"));
    }
}
