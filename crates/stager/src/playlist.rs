//! Playlist `.m3u8` maintenance.
//!
//! Each downloaded playlist item overwrites its own 1-based line with
//! a path relative to the playlist file, so items can finish in any
//! order and re-downloads land on the same line.

use std::fs;
use std::path::{Component, Path};

use crate::error::StageError;

/// Write `final_path` at line `position` (1-based) of the playlist
/// file, creating the file and padding missing lines as needed.
pub fn update_playlist_file(
    playlist_file_path: &Path,
    final_path: &Path,
    output_dir: &Path,
    position: u32,
) -> Result<(), StageError> {
    if let Some(parent) = playlist_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let relative = relative_entry(playlist_file_path, final_path, output_dir);

    let mut lines: Vec<String> = match fs::read_to_string(playlist_file_path) {
        Ok(contents) => contents.lines().map(str::to_string).collect(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(err) => return Err(err.into()),
    };

    let position = position as usize;
    if lines.len() < position {
        lines.resize(position, String::new());
    }
    lines[position - 1] = relative;

    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(playlist_file_path, contents)?;

    tracing::debug!(
        playlist = %playlist_file_path.display(),
        position,
        "updated playlist file"
    );
    Ok(())
}

/// Path of `final_path` relative to the playlist file's directory:
/// `../` once per directory level the playlist sits below the output
/// root, then the final path's components below the root.
fn relative_entry(playlist_file_path: &Path, final_path: &Path, output_dir: &Path) -> String {
    let playlist_dir_depth = playlist_file_path
        .parent()
        .map(component_count)
        .unwrap_or(0);
    let root_depth = component_count(output_dir);

    let mut parts: Vec<String> = Vec::new();
    for _ in root_depth..playlist_dir_depth {
        parts.push("..".to_string());
    }
    parts.extend(
        final_path
            .components()
            .filter(|part| !matches!(part, Component::CurDir))
            .skip(root_depth)
            .map(|part| part.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

fn component_count(path: &Path) -> usize {
    path.components()
        .filter(|part| !matches!(part, Component::CurDir))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn entries_climb_out_of_the_playlist_folder() {
        let relative = relative_entry(
            Path::new("/music/Playlists/curator/Mix.m3u8"),
            Path::new("/music/Artist/Album/01 Song.ogg"),
            Path::new("/music"),
        );
        assert_eq!(relative, "../../Artist/Album/01 Song.ogg");
    }

    #[test]
    fn updates_pad_and_stay_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("out");
        let playlist = output_dir.join("Playlists/curator/Mix.m3u8");
        let track3 = output_dir.join("A/B/03 Three.ogg");
        let track1 = output_dir.join("A/B/01 One.ogg");

        update_playlist_file(&playlist, &track3, &output_dir, 3).unwrap();
        let contents = fs::read_to_string(&playlist).unwrap();
        assert_eq!(contents, "\n\n../../A/B/03 Three.ogg\n");

        update_playlist_file(&playlist, &track1, &output_dir, 1).unwrap();
        update_playlist_file(&playlist, &track1, &output_dir, 1).unwrap();
        let contents = fs::read_to_string(&playlist).unwrap();
        assert_eq!(
            contents,
            "../../A/B/01 One.ogg\n\n../../A/B/03 Three.ogg\n"
        );
    }

    #[test]
    fn rewriting_a_position_changes_only_that_line() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("out");
        let playlist = output_dir.join("Mix.m3u8");
        let original = output_dir.join("A/05 Old.ogg");
        let replacement = output_dir.join("A/05 New.ogg");

        update_playlist_file(&playlist, &original, &output_dir, 5).unwrap();
        let before: Vec<String> = fs::read_to_string(&playlist)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();

        update_playlist_file(&playlist, &replacement, &output_dir, 5).unwrap();
        let after: Vec<String> = fs::read_to_string(&playlist)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();

        assert_eq!(before.len(), after.len());
        let changed: Vec<usize> = (0..before.len())
            .filter(|&line| before[line] != after[line])
            .collect();
        assert_eq!(changed, vec![4]);
        assert_eq!(after[4], "A/05 New.ogg");
    }

    #[test]
    fn playlist_at_the_root_needs_no_parent_hops() {
        let relative = relative_entry(
            Path::new("/music/Mix.m3u8"),
            Path::new("/music/Artist/Album/01 Song.ogg"),
            Path::new("/music"),
        );
        assert_eq!(relative, "Artist/Album/01 Song.ogg");
    }

    #[test]
    fn curdir_components_do_not_count() {
        let out = PathBuf::from("./out");
        let relative = relative_entry(
            Path::new("./out/Playlists/Mix.m3u8"),
            Path::new("./out/Artist/01 Song.ogg"),
            &out,
        );
        assert_eq!(relative, "../Artist/01 Song.ogg");
    }
}
