//! Composite (sprite) assembly of sampled frames on a fixed grid.

use image::{imageops, DynamicImage, RgbaImage};

use crate::error::{MediaError, MediaResult};

/// Grid cell `(column, row)` for the image at `index`.
///
/// The row is `index / rows`, not `index / columns`. Stored fingerprints were
/// computed with this mapping, so it must not change even though it
/// interleaves oddly when `columns != rows`.
pub fn grid_cell(index: u32, columns: u32, rows: u32) -> (u32, u32) {
    (index % columns, index / rows)
}

/// Paste `images` onto a `columns x rows` grid.
///
/// The canvas is exactly `width * columns` by `height * rows`, starts fully
/// transparent, and images replace (not blend with) the pixels under them.
pub fn assemble(images: &[DynamicImage], columns: u32, rows: u32) -> MediaResult<RgbaImage> {
    if columns == 0 || rows == 0 {
        return Err(MediaError::InvalidComposite(format!(
            "degenerate grid {}x{}",
            columns, rows
        )));
    }

    let expected = (columns * rows) as usize;
    if images.len() != expected {
        return Err(MediaError::insufficient_samples(
            expected,
            images.len(),
            format!("a {}x{} grid needs exactly {} images", columns, rows, expected),
        ));
    }

    let (width, height) = (images[0].width(), images[0].height());
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidComposite("empty sample image".to_string()));
    }
    if let Some((index, img)) = images
        .iter()
        .enumerate()
        .find(|(_, img)| img.width() != width || img.height() != height)
    {
        return Err(MediaError::InvalidComposite(format!(
            "image {} is {}x{}, expected {}x{}",
            index,
            img.width(),
            img.height(),
            width,
            height
        )));
    }

    let mut montage = RgbaImage::new(width * columns, height * rows);
    for (index, img) in images.iter().enumerate() {
        let (column, row) = grid_cell(index as u32, columns, rows);
        let x = i64::from(width) * i64::from(column);
        let y = i64::from(height) * i64::from(row);
        imageops::replace(&mut montage, &img.to_rgba8(), x, y);
    }

    Ok(montage)
}
