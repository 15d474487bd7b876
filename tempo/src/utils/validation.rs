use crate::error::{AppError, Result};

/// Reduces a client supplied name to its final path component.
///
/// Both `/` and `\` count as separators so a name crafted on one platform
/// cannot escape the upload root on another. Names that reduce to nothing,
/// `.` or `..` are rejected.
pub fn sanitize_filename(raw: &str) -> Result<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
        .trim();

    match name {
        "" | "." | ".." => Err(AppError::BadRequest(format!("invalid file name `{raw}`"))),
        _ if name.contains('\0') => Err(AppError::BadRequest(format!("invalid file name `{raw}`"))),
        _ => Ok(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_directory_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("..\\..\\windows\\win.ini").unwrap(), "win.ini");
        assert_eq!(sanitize_filename("/abs/path/report.pdf").unwrap(), "report.pdf");
    }

    #[test]
    fn keeps_plain_names() {
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("archive.tar.gz").unwrap(), "archive.tar.gz");
    }

    #[test]
    fn trailing_separator_uses_last_non_empty_segment() {
        assert_eq!(sanitize_filename("dir/file.txt/").unwrap(), "file.txt");
    }

    #[test]
    fn rejects_names_without_a_file_component() {
        for raw in ["", "/", "..", "../..", "./", "a/.."] {
            assert!(
                matches!(sanitize_filename(raw), Err(AppError::BadRequest(_))),
                "`{raw}` should be rejected"
            );
        }
    }
}
