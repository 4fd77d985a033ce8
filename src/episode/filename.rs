use std::path::Path;

/// Sanitize an episode title or show name for use as a path component.
///
/// Strips path separators and other characters the filesystem rejects, and
/// trims surrounding whitespace.
pub fn sanitized_file_name(name: &str) -> String {
    sanitize_filename::sanitize(name.replace('/', "")).trim().to_string()
}

/// File name for a saved torrent file, with the extension appended only if
/// the title doesn't already carry it.
pub fn torrent_file_name(title: &str) -> String {
    file_name_with_extension(title, "torrent")
}

/// File name for a magnet-link bookmark file
pub fn webloc_file_name(title: &str) -> String {
    file_name_with_extension(title, "webloc")
}

fn file_name_with_extension(title: &str, extension: &str) -> String {
    let name = sanitized_file_name(title);

    let has_extension = Path::new(&name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

    if has_extension {
        name
    } else {
        format!("{name}.{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_path_separators() {
        assert_eq!(sanitized_file_name("Show/S01E01"), "ShowS01E01");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(sanitized_file_name("  Show.S01E01  "), "Show.S01E01");
    }

    #[test]
    fn appends_extension_when_absent() {
        assert_eq!(torrent_file_name("Show.S01E01"), "Show.S01E01.torrent");
        assert_eq!(webloc_file_name("Show.S01E01"), "Show.S01E01.webloc");
    }

    #[test]
    fn keeps_existing_extension() {
        assert_eq!(torrent_file_name("Show.S01E01.torrent"), "Show.S01E01.torrent");
        assert_eq!(torrent_file_name("Show.S01E01.TORRENT"), "Show.S01E01.TORRENT");
    }
}
