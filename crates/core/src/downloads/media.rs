//! Playable media selection.

use crate::engine::TransferFile;

/// First file (in torrent order) whose extension is in `extensions`.
///
/// Extensions are compared case-insensitively and without the leading dot.
pub fn select_playable_file<'a, S: AsRef<str>>(
    files: &'a [TransferFile],
    extensions: &[S],
) -> Option<&'a TransferFile> {
    files.iter().find(|file| {
        file.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                extensions
                    .iter()
                    .any(|allowed| allowed.as_ref().trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const DEFAULT: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm"];

    fn file(index: usize, path: &str) -> TransferFile {
        TransferFile {
            index,
            path: PathBuf::from(path),
            length: 100,
        }
    }

    #[test]
    fn test_first_playable_file_wins() {
        let files = vec![
            file(0, "Movie/readme.txt"),
            file(1, "Movie/sample.MKV"),
            file(2, "Movie/movie.mp4"),
        ];
        let selected = select_playable_file(&files, DEFAULT).unwrap();
        assert_eq!(selected.index, 1);
    }

    #[test]
    fn test_no_playable_file() {
        let files = vec![file(0, "Album/01.flac"), file(1, "Album/cover.jpg"), file(2, "noext")];
        assert!(select_playable_file(&files, DEFAULT).is_none());
        assert!(select_playable_file(&[], DEFAULT).is_none());
    }

    #[test]
    fn test_configured_extensions_with_dots() {
        let files = vec![file(0, "clip.ts"), file(1, "clip.mp4")];
        let selected = select_playable_file(&files, &[".ts".to_string()]).unwrap();
        assert_eq!(selected.index, 0);
    }
}
