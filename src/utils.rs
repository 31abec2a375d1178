//! General utilities, not particular to any step of the gridding.
use std::path::Path;

use error_stack::{AttachmentKind, FrameKind, Report};
use itertools::Itertools;

/// One-line description of an error report: every context and printable
/// attachment, outermost first, joined with ": ".
///
/// `Report`'s own `Display` only shows the outermost context, which hides the
/// actual cause when logging a skipped file.
pub fn report_chain<C>(report: &Report<C>) -> String {
    report
        .frames()
        .filter_map(|frame| match frame.kind() {
            FrameKind::Context(ctx) => Some(ctx.to_string()),
            FrameKind::Attachment(AttachmentKind::Printable(msg)) => Some(msg.to_string()),
            _ => None,
        })
        .join(": ")
}

/// The final path component as a string, for messages and tables.
pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
