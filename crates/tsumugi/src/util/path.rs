use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

/// Flatten a remote segment name into a single local file name.
pub fn flatten_file_name(name: &str) -> String {
    let name = name.split(['?', '#']).next().unwrap_or_default();
    name.replace(['/', '\\'], "__")
}

/// Staging file name of a segment: `{track:02}_{index:06}_{name}`.
pub fn segment_file_name(track: usize, index: usize, name: &str) -> String {
    let name = flatten_file_name(name);
    format!("{track:02}_{index:06}_{name}")
}

pub trait TsumugiPathExt {
    /// Append an extra extension, keeping the existing one.
    ///
    /// `init.mp4` with `tmp` becomes `init.mp4.tmp`.
    fn append_extension<T: AsRef<OsStr>>(&self, extension: T) -> PathBuf;
}

impl TsumugiPathExt for Path {
    fn append_extension<T: AsRef<OsStr>>(&self, extension: T) -> PathBuf {
        let mut filename = OsString::new();
        if let Some(name) = self.file_name() {
            filename.push(name);
        }
        filename.push(".");
        filename.push(extension);

        self.with_file_name(filename)
    }
}
