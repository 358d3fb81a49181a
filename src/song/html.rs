use std::fmt::Write;

use super::{Line, Song};

#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders a song body as an HTML fragment.
#[must_use]
pub fn render_html(song: &Song) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<div class="song"><h1 class="song-title">{}</h1><h2 class="song-author">{}</h2>"#,
        escape_html(&song.title),
        escape_html(&song.artist)
    );
    if !song.album.is_empty() {
        let _ = write!(
            out,
            r#"<h3 class="song-album">{}</h3>"#,
            escape_html(&song.album)
        );
    }

    for line in &song.lines {
        match line {
            Line::Text(text) => {
                out.push_str(r#"<div class="line">"#);
                render_chords(&mut out, text);
                out.push_str("</div>");
            }
            Line::Directive { name, value } if name == "comment" || name == "c" => {
                let _ = write!(out, r#"<div class="comment">{}</div>"#, escape_html(value));
            }
            Line::Directive { .. } => {}
            Line::Blank => out.push_str(r#"<div class="line empty"></div>"#),
        }
    }

    out.push_str("</div>");
    out
}

fn render_chords(out: &mut String, text: &str) {
    let mut rest = text;
    while let Some(start) = rest.find('[') {
        let Some(len) = rest[start..].find(']') else {
            break;
        };
        out.push_str(&escape_html(&rest[..start]));
        let chord = &rest[start + 1..start + len];
        let _ = write!(out, r#"<span class="chord">{}</span>"#, escape_html(chord));
        rest = &rest[start + len + 1..];
    }
    out.push_str(&escape_html(rest));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_render_html_chords() {
        let song = Song::parse("{title: T}\n{artist: A}\n[C]Hello <world>\n");
        let html = render_html(&song);
        assert!(html.contains(r#"<h1 class="song-title">T</h1>"#));
        assert!(html.contains(r#"<span class="chord">C</span>Hello &lt;world&gt;"#));
    }

    #[test]
    fn test_render_html_comment_directive() {
        let song = Song::parse("{title: T}\n{artist: A}\n{c: Chorus}\n");
        assert!(render_html(&song).contains(r#"<div class="comment">Chorus</div>"#));
    }
}
