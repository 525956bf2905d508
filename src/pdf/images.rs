use image::{DynamicImage, GenericImageView, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::pdf::PdfDocument;
use crate::raster;

/// A4 in points; larger images are scaled down to fit.
const MAX_PAGE_WIDTH: f32 = 595.0;
const MAX_PAGE_HEIGHT: f32 = 842.0;

const JPEG_EMBED_QUALITY: u8 = 95;

/// Build a PDF with one page per image, in input order.
///
/// PNGs are embedded losslessly (deflated RGB, alpha as a soft mask); every
/// other format is re-encoded as JPEG.
#[instrument(skip_all, fields(images = images.len()))]
pub fn images_to_pdf(images: &[&[u8]]) -> Result<PdfDocument> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(images.len());

    for (index, bytes) in images.iter().enumerate() {
        let format = image::guess_format(bytes).map_err(|e| Error::InvalidImage {
            reason: format!("image #{}: {}", index + 1, e),
        })?;
        let img = raster::decode(bytes)?;
        let (width, height) = img.dimensions();

        let image_id = if format == ImageFormat::Png {
            embed_lossless(&mut doc, &img)
        } else {
            embed_jpeg(&mut doc, &img)?
        };

        let (page_width, page_height) = fit_to_page(width, height);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        page_width.into(),
                        0.into(),
                        0.into(),
                        page_height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content.encode().map_err(|e| Error::Processing {
            reason: format!("Failed to encode page content: {}", e),
        })?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));

        debug!(index, width, height, ?format, "Image placed");
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    Ok(PdfDocument { doc })
}

/// Page size in points for an image of the given pixel size.
fn fit_to_page(width: u32, height: u32) -> (f32, f32) {
    let (w, h) = (width as f32, height as f32);
    if w > MAX_PAGE_WIDTH || h > MAX_PAGE_HEIGHT {
        let ratio = (MAX_PAGE_WIDTH / w).min(MAX_PAGE_HEIGHT / h);
        (w * ratio, h * ratio)
    } else {
        (w, h)
    }
}

fn image_dictionary(width: u32, height: u32, color_space: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    }
}

/// Raw samples, deflated later by `Document::compress`.
fn embed_lossless(doc: &mut Document, img: &DynamicImage) -> ObjectId {
    let (width, height) = img.dimensions();
    let mut dict = image_dictionary(width, height, "DeviceRGB");

    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let alpha: Vec<u8> = rgba.pixels().map(|p| p[3]).collect();
        let mask_id = doc.add_object(Stream::new(
            image_dictionary(width, height, "DeviceGray"),
            alpha,
        ));
        dict.set("SMask", mask_id);
    }

    doc.add_object(Stream::new(dict, img.to_rgb8().into_raw()))
}

fn embed_jpeg(doc: &mut Document, img: &DynamicImage) -> Result<ObjectId> {
    let (width, height) = img.dimensions();
    let jpeg = raster::encode_jpeg(img, JPEG_EMBED_QUALITY)?;

    let mut dict = image_dictionary(width, height, "DeviceRGB");
    dict.set("Filter", "DCTDecode");

    // Already compressed; keep Document::compress from deflating it again.
    Ok(doc.add_object(Stream::new(dict, jpeg).with_compression(false)))
}
