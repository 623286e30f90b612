//! A reserved [`ImageApplier`] stub. Unpacking a raw disk image onto a
//! mounted filesystem belongs to an image-handling collaborator this crate
//! does not implement; configs that declare `images` fail loudly instead of
//! silently skipping them.

use anyhow::bail;
use camino::Utf8Path;
use filesstage_config::Image;
use filesstage_core::ImageApplier;

#[derive(Debug, Default)]
pub struct UnimplementedImageApplier;

impl ImageApplier for UnimplementedImageApplier {
    fn apply(&self, image: &Image, _root: &Utf8Path) -> anyhow::Result<()> {
        bail!("image application is not implemented: {}", image.source)
    }
}
