//! One complete patch run: read, resolve, inject, write.

use std::path::{Path, PathBuf};

use log::info;

use crate::{reader, resolver, synthesizer, writer, Result, WriteOptions};

/// What to inject where.
///
/// # Examples
///
/// ```rust,no_run
/// use modinit::PatchOptions;
///
/// let options = PatchOptions::new("ModuleInitializer", "Run", "Library.dll")
///     .with_key_file("Library.snk");
/// modinit::patch(&options)?;
/// # Ok::<(), modinit::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOptions {
    /// Simple name of the type declaring the initializer
    pub type_name: String,
    /// Name of the initializer method
    pub method_name: String,
    /// Image to patch in place
    pub image: PathBuf,
    /// Strong name key pair used to re-sign the image
    pub key_file: Option<PathBuf>,
}

impl PatchOptions {
    /// Options for patching `image` without re-signing it.
    pub fn new(
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        image: impl Into<PathBuf>,
    ) -> Self {
        PatchOptions {
            type_name: type_name.into(),
            method_name: method_name.into(),
            image: image.into(),
            key_file: None,
        }
    }

    /// Re-sign the patched image with the `.snk` key pair at `key_file`.
    #[must_use]
    pub fn with_key_file(mut self, key_file: impl Into<PathBuf>) -> Self {
        self.key_file = Some(key_file.into());
        self
    }

    fn write_options(&self) -> WriteOptions {
        match &self.key_file {
            Some(key) => WriteOptions::new().with_key(key.clone()),
            None => WriteOptions::new(),
        }
    }
}

/// Inject a module initializer calling `type_name::method_name` into the image, then write
/// it (and its companion PDB) back in place.
///
/// Nothing is written unless every step succeeds.
///
/// # Errors
/// Whatever [`crate::read`], [`crate::resolve`], [`crate::inject`] or
/// [`crate::write_with`] report.
pub fn patch(options: &PatchOptions) -> Result<()> {
    let path: &Path = &options.image;

    let mut image = reader::read(path)?;
    let target = resolver::resolve(&image, &options.type_name, &options.method_name)?;
    synthesizer::inject(&mut image, &target)?;
    writer::write_with(&image, path, &options.write_options())?;

    info!(
        "Injected a call to {}::{} into {}",
        target.type_name(),
        target.method_name(),
        path.display()
    );
    Ok(())
}
