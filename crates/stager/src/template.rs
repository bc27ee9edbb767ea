//! Path template rendering.
//!
//! Templates are plain strings with `{token}` placeholders filled from
//! the item's tags. A token may carry a zero-pad width for numeric
//! values, e.g. `{track:02}`. Tokens whose value is absent render a
//! named fallback ("Unknown Album" and friends) so templates always
//! produce a usable path segment.

use std::fmt::Write;

use spindle_interface::media::{PlaylistTags, Tags};

/// One substitutable value.
#[derive(Debug, Clone)]
enum TemplateValue {
    Text(String),
    Number(u32),
}

/// Token values for one item, resolved once and rendered against any
/// number of templates.
#[derive(Debug, Default)]
pub struct TemplateVars {
    entries: Vec<(&'static str, TemplateValue)>,
}

impl TemplateVars {
    pub fn from_tags(tags: &Tags, playlist_tags: Option<&PlaylistTags>) -> TemplateVars {
        let mut vars = TemplateVars::default();

        vars.text("album", tags.album.as_deref());
        vars.text("album_artist", tags.album_artist.as_deref());
        vars.text("artist", tags.artist.as_deref());
        vars.text("composer", tags.composer.as_deref());
        vars.text("copyright", tags.copyright.as_deref());
        vars.text("date", tags.date.map(|d| d.to_string()).as_deref());
        vars.number("disc", tags.disc);
        vars.number("disc_total", tags.disc_total);
        vars.text("genre", tags.genre.as_deref());
        vars.text("isrc", tags.isrc.as_deref());
        vars.text("label", tags.label.as_deref());
        vars.text("media_id", tags.media_id.as_deref());
        vars.text("media_type", tags.media_kind.map(|k| k.to_string()).as_deref());
        vars.text("producer", tags.producer.as_deref());
        vars.text("publisher", tags.publisher.as_deref());
        vars.text("rating", tags.rating.map(|r| r.to_string()).as_deref());
        vars.text("title", tags.title.as_deref());
        vars.number("track", tags.track);
        vars.number("track_total", tags.track_total);

        if let Some(playlist) = playlist_tags {
            vars.text("playlist_id", Some(&playlist.id));
            vars.text("playlist_title", Some(&playlist.title));
            vars.text("playlist_artist", Some(&playlist.artist));
            vars.number("playlist_track", Some(playlist.track));
            vars.number("playlist_track_total", Some(playlist.track_total));
        }

        vars
    }

    fn text(&mut self, name: &'static str, value: Option<&str>) {
        if let Some(value) = value {
            self.entries
                .push((name, TemplateValue::Text(value.to_string())));
        }
    }

    fn number(&mut self, name: &'static str, value: Option<u32>) {
        if let Some(value) = value {
            self.entries.push((name, TemplateValue::Number(value)));
        }
    }

    fn get(&self, name: &str) -> Option<&TemplateValue> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, value)| value)
    }

    /// Substitute every `{token}` in `template`. Unrecognized tokens
    /// are left verbatim so a typo is visible in the produced path.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '{' {
                out.push(c);
                continue;
            }
            if chars.peek() == Some(&'{') {
                chars.next();
                out.push('{');
                continue;
            }

            let mut token = String::new();
            let mut closed = false;
            for t in chars.by_ref() {
                if t == '}' {
                    closed = true;
                    break;
                }
                token.push(t);
            }
            if !closed {
                out.push('{');
                out.push_str(&token);
                break;
            }

            let (name, pad) = match token.split_once(':') {
                Some((name, spec)) => (name, parse_pad(spec)),
                None => (token.as_str(), None),
            };

            match self.get(name) {
                Some(TemplateValue::Text(value)) => out.push_str(value),
                Some(TemplateValue::Number(value)) => {
                    let width = pad.unwrap_or(0);
                    let _ = write!(out, "{value:0width$}");
                }
                None => match fallback(name) {
                    Some(fallback) => out.push_str(fallback),
                    None => {
                        out.push('{');
                        out.push_str(&token);
                        out.push('}');
                    }
                },
            }
        }

        out
    }
}

/// `02` / `03` style zero-pad widths; anything else is ignored.
fn parse_pad(spec: &str) -> Option<usize> {
    let digits = spec.strip_prefix('0')?.trim_end_matches('d');
    digits.parse().ok()
}

/// Stand-in text for a known token with no value. Numeric tokens fall
/// back to the empty string.
fn fallback(name: &str) -> Option<&'static str> {
    Some(match name {
        "album" => "Unknown Album",
        "album_artist" | "artist" => "Unknown Artist",
        "composer" => "Unknown Composer",
        "copyright" => "Unknown Copyright",
        "date" => "Unknown Date",
        "genre" => "Unknown Genre",
        "isrc" => "Unknown ISRC",
        "label" => "Unknown Label",
        "media_id" => "Unknown Media ID",
        "media_type" => "Unknown Media Type",
        "playlist_artist" => "Unknown Playlist Artist",
        "playlist_id" => "Unknown Playlist ID",
        "playlist_title" => "Unknown Playlist Title",
        "producer" => "Unknown Producer",
        "publisher" => "Unknown Publisher",
        "rating" => "Unknown Rating",
        "title" => "Unknown Title",
        "disc" | "disc_total" | "track" | "track_total" | "playlist_track"
        | "playlist_track_total" => "",
        _ => return None,
    })
}
