//! Destination path policy.
//!
//! The on-disk location of every download is a pure function of the channel,
//! topic, grouping, media kind and message, so the same message always lands
//! in the same place no matter when it is crawled.

use std::path::{Path, PathBuf};

use crate::engine::filter::MediaKind;

/// Inputs for [`dest_path`]. All borrowed; building a path allocates only
/// the result.
#[derive(Clone, Copy, Debug)]
pub struct PathOptions<'a> {
    pub data_dir: &'a Path,
    pub channel_title: &'a str,
    pub channel_id: &'a str,
    pub topic_id: Option<&'a str>,
    pub grouped_id: Option<&'a str>,
    /// When set, grouped posts share a `<groupedId>` directory; when unset,
    /// the grouped id is folded into the filename instead.
    pub group_message: bool,
    /// When set, files are split into per-kind subdirectories.
    pub organize_by_type: bool,
    pub kind: MediaKind,
    pub message_id: i32,
    pub raw_file_name: Option<&'a str>,
    pub mime_type: Option<&'a str>,
}

/// Compute the destination path for a single media download.
pub fn dest_path(opts: &PathOptions) -> PathBuf {
    let mut path = opts
        .data_dir
        .join(sanitize_folder(opts.channel_title, opts.channel_id));
    if let Some(topic) = opts.topic_id {
        path.push(format!("_{topic}"));
    }
    if opts.group_message {
        if let Some(group) = opts.grouped_id {
            path.push(group);
        }
    }
    if opts.organize_by_type {
        path.push(opts.kind.as_str());
    }
    path.push(file_name(opts));
    path
}

/// Channel directory name: the title with filesystem-hostile characters
/// replaced, falling back to the channel id when nothing survives.
pub fn sanitize_folder(title: &str, fallback: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    if cleaned.trim().is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

fn file_name(opts: &PathOptions) -> String {
    let mut name = String::new();
    if !opts.group_message {
        if let Some(group) = opts.grouped_id {
            name.push_str(group);
            name.push('_');
        }
    }
    name.push_str(&opts.message_id.to_string());
    if let Some(raw) = opts.raw_file_name {
        name.push('_');
        name.push_str(raw);
        if has_extension(raw) {
            return name;
        }
    }
    name.push('.');
    name.push_str(&ext_for(opts.mime_type, opts.kind));
    name
}

/// Whether a raw filename already carries an extension: a dot after the last
/// path separator that is not the leading character (dotfiles don't count).
fn has_extension(name: &str) -> bool {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    match base.rfind('.') {
        Some(0) | None => false,
        Some(_) => true,
    }
}

fn ext_for(mime: Option<&str>, kind: MediaKind) -> String {
    mime.and_then(mime_to_ext)
        .unwrap_or(kind.default_ext())
        .to_string()
}

fn mime_to_ext(mime: &str) -> Option<&'static str> {
    Some(match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" => "m4a",
        "audio/wav" => "wav",
        "audio/flac" => "flac",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/x-rar-compressed" => "rar",
        "application/x-7z-compressed" => "7z",
        "text/plain" => "txt",
        "application/json" => "json",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_opts<'a>(data_dir: &'a Path) -> PathOptions<'a> {
        PathOptions {
            data_dir,
            channel_title: "c1",
            channel_id: "100",
            topic_id: None,
            grouped_id: None,
            group_message: false,
            organize_by_type: false,
            kind: MediaKind::Photo,
            message_id: 200,
            raw_file_name: None,
            mime_type: None,
        }
    }

    #[test]
    fn test_simple_photo_path() {
        let dir = Path::new("/data");
        let path = dest_path(&base_opts(dir));
        assert_eq!(path, Path::new("/data/c1/200.jpg"));
    }

    #[test]
    fn test_topic_segment() {
        let dir = Path::new("/data");
        let mut opts = base_opts(dir);
        opts.topic_id = Some("7");
        opts.message_id = 500;
        assert_eq!(dest_path(&opts), Path::new("/data/c1/_7/500.jpg"));
    }

    #[test]
    fn test_group_directory_vs_prefix() {
        let dir = Path::new("/data");
        let mut opts = base_opts(dir);
        opts.grouped_id = Some("g");
        opts.message_id = 300;

        opts.group_message = true;
        assert_eq!(dest_path(&opts), Path::new("/data/c1/g/300.jpg"));

        opts.group_message = false;
        assert_eq!(dest_path(&opts), Path::new("/data/c1/g_300.jpg"));
    }

    #[test]
    fn test_type_subfolder() {
        let dir = Path::new("/data");
        let mut opts = base_opts(dir);
        opts.organize_by_type = true;
        opts.kind = MediaKind::Video;
        opts.mime_type = Some("video/mp4");
        assert_eq!(dest_path(&opts), Path::new("/data/c1/video/200.mp4"));
    }

    #[test]
    fn test_raw_file_name_extension_policy() {
        let dir = Path::new("/data");
        let mut opts = base_opts(dir);
        opts.kind = MediaKind::File;

        // Filename with its own extension is used as-is.
        opts.raw_file_name = Some("report.pdf");
        assert_eq!(dest_path(&opts), Path::new("/data/c1/200_report.pdf"));

        // Dotfile names don't count as having an extension.
        opts.raw_file_name = Some(".bashrc");
        assert_eq!(dest_path(&opts), Path::new("/data/c1/200_.bashrc.dat"));

        // No extension: fall back to the mime table.
        opts.raw_file_name = Some("notes");
        opts.mime_type = Some("text/plain");
        assert_eq!(dest_path(&opts), Path::new("/data/c1/200_notes.txt"));

        // Unknown mime: per-kind default.
        opts.mime_type = Some("application/x-unknown");
        assert_eq!(dest_path(&opts), Path::new("/data/c1/200_notes.dat"));
    }

    #[test]
    fn test_sanitize_folder() {
        assert_eq!(sanitize_folder("a/b\\c:d", "id"), "a_b_c_d");
        assert_eq!(sanitize_folder("*?\"<>|", "id"), "______");
        assert_eq!(sanitize_folder("", "42"), "42");
        assert_eq!(sanitize_folder("   ", "42"), "42");
        assert_eq!(sanitize_folder("plain name", "42"), "plain name");
    }

    #[test]
    fn test_path_determinism() {
        let dir = Path::new("/data");
        let mut opts = base_opts(dir);
        opts.topic_id = Some("3");
        opts.grouped_id = Some("g");
        opts.raw_file_name = Some("x.bin");
        assert_eq!(dest_path(&opts), dest_path(&opts));
    }
}
