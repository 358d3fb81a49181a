//! HTML page chrome.

use std::fmt::Write;

use crate::auth::Role;
use crate::index::SongHit;
use crate::song::escape_html;

pub const SITE_TITLE: &str = "My SongBook";

/// Wraps `body` in the page header and footer. `alert_key` is the freshly
/// generated administrator key while the first-run alert is armed.
#[must_use]
pub fn page(title: &str, role: Role, alert_key: Option<&str>, path: &str, body: &str) -> String {
    let admin_links = if role.is_administrator() {
        r#"<a href="/new">New song</a> <a href="/admin">Admin</a>"#
    } else {
        r#"<a href="/signin">Sign in</a>"#
    };
    let alert = alert_key
        .map(|key| alert_key_creation(key, path))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="/css/songbook.css">
</head>
<body class="role-{role}">
<nav><a href="/">{site}</a> <form action="/search" method="get"><input type="search" name="query" placeholder="Search"></form> {admin_links}</nav>
{alert}<main>
{body}
</main>
<footer><a href="/consoleApi">Console API</a></footer>
</body>
</html>
"#,
        title = escape_html(title),
        role = role.as_str(),
        site = SITE_TITLE,
    )
}

fn alert_key_creation(key: &str, path: &str) -> String {
    let key = escape_html(key);
    let path = escape_html(path);
    format!(
        r#"<div class="alert alert-warning">An administrator key was created: <code>{key}</code>. Keep it safe, then <a href="{path}?key={key}">use it once</a> to hide this message.</div>
"#
    )
}

#[must_use]
pub fn alert(kind: &str, message: &str) -> String {
    format!(
        r#"<div class="alert alert-{kind}">{}</div>"#,
        escape_html(message)
    )
}

#[must_use]
pub fn search_results(hits: &[SongHit]) -> String {
    let mut out = String::from(r#"<ul class="results">"#);
    for hit in hits {
        let _ = write!(
            out,
            r#"<li><a href="/view/{id}"><span class="song-title">{title}</span></a> <span class="song-author">{author}</span>"#,
            id = escape_html(&hit.id),
            title = escape_html(&hit.title),
            author = escape_html(&hit.author),
        );
        if !hit.album.is_empty() {
            let _ = write!(
                out,
                r#" <span class="song-album">{}</span>"#,
                escape_html(&hit.album)
            );
        }
        out.push_str("</li>");
    }
    out.push_str("</ul>");
    out
}

/// Flat listing, one `id<TAB>title<TAB>author` line per hit.
#[must_use]
pub fn search_listing(hits: &[SongHit]) -> String {
    hits.iter()
        .map(|hit| format!("{}\t{}\t{}\n", hit.id, hit.title, hit.author))
        .collect()
}

#[must_use]
pub fn view_song(id: &str, song_html: &str, role: Role) -> String {
    let id = escape_html(id);
    let actions = if role.is_administrator() {
        format!(
            r#"<div class="actions"><a href="/edit/{id}">Edit</a> <a href="/delete/{id}">Delete</a></div>"#
        )
    } else {
        String::new()
    };
    format!(r#"<article data-id="{id}">{song_html}{actions}</article>"#)
}

#[must_use]
pub fn edit_song(id: &str, content: &str) -> String {
    let (action, method) = if id.is_empty() {
        ("/songs".to_string(), "POST")
    } else {
        (format!("/songs/{}", escape_html(id)), "PUT")
    };
    format!(
        r#"<form class="song-editor" action="{action}" data-method="{method}">
<textarea name="song" rows="30" cols="80">{}</textarea>
<button type="submit">Save</button>
</form>"#,
        escape_html(content)
    )
}

#[must_use]
pub fn admin() -> String {
    r#"<section class="admin">
<h1>Administration</h1>
<ul>
<li><a href="/admin/index/reset">Rebuild the search index</a></li>
<li><a href="/admin/keys/rotate">Rotate the administrator key</a></li>
</ul>
</section>"#
        .to_string()
}

#[must_use]
pub fn signin() -> String {
    r#"<form class="signin" action="/" method="get">
<label>Key <input type="password" name="key"></label>
<button type="submit">Sign in</button>
</form>"#
        .to_string()
}

#[must_use]
pub fn console_api() -> String {
    r#"<section class="console-api">
<h1>Console API</h1>
<pre>
curl -H 'Accept: text/plain' http://HOST/search/QUERY
curl -H 'Accept: text/song' http://HOST/songs/ID
curl -X POST --data-binary @song.txt 'http://HOST/songs?key=KEY'
curl -X PUT --data-binary @song.txt 'http://HOST/songs/ID?key=KEY'
curl -X DELETE 'http://HOST/songs/ID?key=KEY'
</pre>
</section>"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, title: &str) -> SongHit {
        SongHit {
            id: id.to_string(),
            title: title.to_string(),
            author: "Lennon".to_string(),
            album: String::new(),
            score: 1.0,
        }
    }

    #[test]
    fn test_page_shows_alert_only_when_armed() {
        let with = page("T", Role::User, Some("abc"), "/", "body");
        let without = page("T", Role::User, None, "/", "body");
        assert!(with.contains("<code>abc</code>"));
        assert!(!without.contains("alert-warning"));
    }

    #[test]
    fn test_page_role_chrome() {
        assert!(page("T", Role::Administrator, None, "/", "").contains(r#"href="/new""#));
        assert!(!page("T", Role::User, None, "/", "").contains(r#"href="/new""#));
    }

    #[test]
    fn test_search_results_escape() {
        let html = search_results(&[hit("a", "<b>")]);
        assert!(html.contains(r#"href="/view/a""#));
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_search_listing() {
        assert_eq!(
            search_listing(&[hit("a", "A"), hit("b", "B")]),
            "a\tA\tLennon\nb\tB\tLennon\n"
        );
    }

    #[test]
    fn test_edit_song_targets() {
        assert!(edit_song("", "x").contains(r#"data-method="POST""#));
        assert!(edit_song("id-1", "x").contains(r#"action="/songs/id-1""#));
    }
}
