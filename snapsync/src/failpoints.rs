use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};

pub const SCANNER__BEFORE_PAGE: &str = "scanner.before_page";
pub const FILE_STORE__BEFORE_BODY_RENAME: &str = "file_store.before_body_rename";
pub const FILE_STORE__AFTER_BODY_WRITE: &str = "file_store.after_body_write";
pub const DELETER__BEFORE_BATCH: &str = "deleter.before_batch";

/// Returns an error of `kind` when the failpoint `name` is configured with `return`.
///
/// Passing `io` as the failpoint parameter raises an [`ErrorKind::IoError`] instead.
pub fn sync_fail_point(name: &str, kind: ErrorKind) -> SyncResult<()> {
    fail_point!(name, |parameter| {
        let kind = match parameter.as_deref() {
            Some("io") => ErrorKind::IoError,
            _ => kind,
        };

        bail!(
            kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
