//! Migrate member profile images from drive share links into local storage.
//!
//! Records whose `image` points at a drive share link are downloaded to
//! `{output_dir}/{id}.{ext}` and rewritten to `{url_prefix}/{id}.{ext}`.
//! The member JSON is rewritten once, and only when something changed.

pub mod logging;
pub mod migrator;
pub mod settings;
