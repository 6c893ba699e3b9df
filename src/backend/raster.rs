//! Content previews: page thumbnails rasterized with `tiny-skia`.
//!
//! Paths, fills, strokes, images and form XObjects are drawn the way the
//! content stream describes them. Glyph outlines are not loaded; each shown
//! character becomes a box of roughly its size, which is enough to read the
//! layout of a page at thumbnail scale. Clipping, shadings and patterns are
//! skipped.

use super::lopdf_backend::PageGeometry;
use super::placeholder::{encode_preview, thumbnail_size};
use super::{LoadedPdf, LopdfDecoder, PreviewOptions, Renderer};
use crate::error::{Error, Result};
use crate::model::Preview;
use image::{Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, Stream};
use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    Transform,
};

/// Nesting limit for form XObjects drawing other forms.
const MAX_FORM_DEPTH: u32 = 12;

/// Renderer that draws page content into the thumbnail.
#[derive(Debug, Clone, Default)]
pub struct RasterRenderer {
    options: PreviewOptions,
}

impl RasterRenderer {
    /// Create a renderer with the given options.
    pub fn new(options: PreviewOptions) -> Self {
        Self { options }
    }

    /// Current options.
    pub fn options(&self) -> &PreviewOptions {
        &self.options
    }
}

impl Renderer<LopdfDecoder> for RasterRenderer {
    fn render_page(&self, document: &LoadedPdf, page_number: usize) -> Result<Preview> {
        let render_error = |reason: String| Error::Render {
            page: page_number,
            reason,
        };

        let geometry = document
            .page_geometry(page_number)
            .filter(|g| g.width() > 0.0 && g.height() > 0.0)
            .ok_or_else(|| render_error("page has no usable MediaBox".to_string()))?;
        let (page_width, page_height) = geometry.display_size();
        let (width, height) = thumbnail_size(&self.options, page_width, page_height);

        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| render_error(format!("Failed to create pixmap {}x{}", width, height)))?;
        let [r, g, b] = self.options.background;
        pixmap.fill(Color::from_rgba8(r, g, b, 255));

        let content = document.page_content(page_number)?;
        let operations = Content::decode(&content)
            .map_err(|e| render_error(format!("unreadable content stream: {}", e)))?
            .operations;

        let mut rasterizer = Rasterizer {
            document,
            pixmap,
            base: device_transform(&geometry, width, height),
        };
        rasterizer.execute_operators(
            &operations,
            document.page_resources(page_number),
            GraphicsState::default(),
            0,
        );
        log::trace!("Rasterized page {} ({} operators)", page_number, operations.len());

        let mut image = to_rgb(&rasterizer.pixmap);
        draw_frame(&mut image, Rgb(self.options.border));
        let data = encode_preview(&self.options, image).map_err(|e| render_error(e.to_string()))?;

        Ok(Preview {
            data,
            width,
            height,
            format: self.options.format,
        })
    }
}

/// Map default user space onto a `width` x `height` pixmap, honouring `/Rotate`.
fn device_transform(geometry: &PageGeometry, width: u32, height: u32) -> Transform {
    let [x0, _, _, y1] = geometry.rect;
    let (w, h) = (geometry.width(), geometry.height());
    // PDF origin is bottom-left; pixmap origin is top-left.
    let flip = Transform::from_row(1.0, 0.0, 0.0, -1.0, -x0, y1);
    let rotate = match geometry.rotation {
        90 => Transform::from_row(0.0, 1.0, -1.0, 0.0, h, 0.0),
        180 => Transform::from_row(-1.0, 0.0, 0.0, -1.0, w, h),
        270 => Transform::from_row(0.0, -1.0, 1.0, 0.0, 0.0, w),
        _ => Transform::identity(),
    };
    let (display_width, display_height) = geometry.display_size();
    flip.post_concat(rotate).post_concat(Transform::from_scale(
        width as f32 / display_width,
        height as f32 / display_height,
    ))
}

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Transform,
    fill: Color,
    stroke: Color,
    fill_alpha: f32,
    stroke_alpha: f32,
    line_width: f32,
    line_cap: LineCap,
    line_join: LineJoin,
    font_size: f32,
    leading: f32,
    char_space: f32,
    word_space: f32,
    render_mode: i64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Transform::identity(),
            fill: Color::BLACK,
            stroke: Color::BLACK,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            font_size: 0.0,
            leading: 0.0,
            char_space: 0.0,
            word_space: 0.0,
            render_mode: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TextPosition {
    matrix: Transform,
    line: Transform,
}

impl TextPosition {
    fn new() -> Self {
        Self {
            matrix: Transform::identity(),
            line: Transform::identity(),
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line = self.line.pre_translate(tx, ty);
        self.matrix = self.line;
    }
}

struct Rasterizer<'a> {
    document: &'a LoadedPdf,
    pixmap: Pixmap,
    base: Transform,
}

impl<'a> Rasterizer<'a> {
    fn execute_operators(
        &mut self,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: u32,
    ) {
        let mut gs = initial;
        let mut saved: Vec<GraphicsState> = Vec::new();
        let mut path = PathBuilder::new();
        let mut text = TextPosition::new();

        for op in operations {
            let nums = numbers(&op.operands);
            match op.operator.as_str() {
                // Graphics state
                "q" => saved.push(gs),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        gs = previous;
                    }
                },
                "cm" => {
                    if let Some(matrix) = matrix(&nums) {
                        gs.ctm = gs.ctm.pre_concat(matrix);
                    }
                },
                "w" => {
                    if let Some(&width) = nums.first() {
                        gs.line_width = width.abs();
                    }
                },
                "J" => {
                    gs.line_cap = match nums.first().map(|v| *v as i64) {
                        Some(1) => LineCap::Round,
                        Some(2) => LineCap::Square,
                        _ => LineCap::Butt,
                    };
                },
                "j" => {
                    gs.line_join = match nums.first().map(|v| *v as i64) {
                        Some(1) => LineJoin::Round,
                        Some(2) => LineJoin::Bevel,
                        _ => LineJoin::Miter,
                    };
                },
                "gs" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.apply_ext_g_state(&mut gs, name, resources);
                    }
                },

                // Colour
                "g" | "rg" | "k" | "sc" | "scn" => {
                    if let Some(color) = device_color(&nums) {
                        gs.fill = color;
                    }
                },
                "G" | "RG" | "K" | "SC" | "SCN" => {
                    if let Some(color) = device_color(&nums) {
                        gs.stroke = color;
                    }
                },
                "cs" => gs.fill = Color::BLACK,
                "CS" => gs.stroke = Color::BLACK,

                // Path construction
                "m" => {
                    if let [x, y] = nums[..] {
                        path.move_to(x, y);
                    }
                },
                "l" => {
                    if let [x, y] = nums[..] {
                        path.line_to(x, y);
                    }
                },
                "c" => {
                    if let [x1, y1, x2, y2, x3, y3] = nums[..] {
                        path.cubic_to(x1, y1, x2, y2, x3, y3);
                    }
                },
                "v" => {
                    if let ([x2, y2, x3, y3], Some(current)) = (&nums[..], path.last_point()) {
                        path.cubic_to(current.x, current.y, *x2, *y2, *x3, *y3);
                    }
                },
                "y" => {
                    if let [x1, y1, x3, y3] = nums[..] {
                        path.cubic_to(x1, y1, x3, y3, x3, y3);
                    }
                },
                "h" => path.close(),
                "re" => {
                    if let [x, y, w, h] = nums[..] {
                        path.move_to(x, y);
                        path.line_to(x + w, y);
                        path.line_to(x + w, y + h);
                        path.line_to(x, y + h);
                        path.close();
                    }
                },

                // Path painting
                "f" | "F" | "f*" | "S" | "s" | "B" | "B*" | "b" | "b*" => {
                    let operator = op.operator.as_str();
                    if matches!(operator, "s" | "b" | "b*") {
                        path.close();
                    }
                    let fill = match operator {
                        "f*" | "B*" | "b*" => Some(FillRule::EvenOdd),
                        "S" | "s" => None,
                        _ => Some(FillRule::Winding),
                    };
                    let stroke = matches!(operator, "S" | "s" | "B" | "B*" | "b" | "b*");
                    let finished = std::mem::replace(&mut path, PathBuilder::new());
                    self.paint_path(finished, &gs, fill, stroke);
                },
                "n" => path = PathBuilder::new(),
                // Clipping is not applied; the path is consumed by the painting operator that follows.
                "W" | "W*" => {},

                // Text state
                "BT" => text = TextPosition::new(),
                "ET" => {},
                "Tf" => {
                    if let Some(size) = op.operands.get(1).and_then(number) {
                        gs.font_size = size;
                    }
                },
                "TL" => {
                    if let Some(&leading) = nums.first() {
                        gs.leading = leading;
                    }
                },
                "Tc" => {
                    if let Some(&space) = nums.first() {
                        gs.char_space = space;
                    }
                },
                "Tw" => {
                    if let Some(&space) = nums.first() {
                        gs.word_space = space;
                    }
                },
                "Tr" => {
                    if let Some(&mode) = nums.first() {
                        gs.render_mode = mode as i64;
                    }
                },

                // Text positioning
                "Td" => {
                    if let [tx, ty] = nums[..] {
                        text.next_line(tx, ty);
                    }
                },
                "TD" => {
                    if let [tx, ty] = nums[..] {
                        gs.leading = -ty;
                        text.next_line(tx, ty);
                    }
                },
                "Tm" => {
                    if let Some(matrix) = matrix(&nums) {
                        text.matrix = matrix;
                        text.line = matrix;
                    }
                },
                "T*" => text.next_line(0.0, -gs.leading),

                // Text showing
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show_text(bytes, &gs, &mut text);
                    }
                },
                "'" => {
                    text.next_line(0.0, -gs.leading);
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show_text(bytes, &gs, &mut text);
                    }
                },
                "\"" => {
                    if let [word_space, char_space, ..] = nums[..] {
                        gs.word_space = word_space;
                        gs.char_space = char_space;
                    }
                    text.next_line(0.0, -gs.leading);
                    if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                        self.show_text(bytes, &gs, &mut text);
                    }
                },
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show_text(bytes, &gs, &mut text),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        text.matrix = text.matrix.pre_translate(-adjust / 1000.0 * gs.font_size, 0.0);
                                    }
                                },
                            }
                        }
                    }
                },

                // XObjects
                "Do" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.render_xobject(name, &gs, resources, depth);
                    }
                },

                _ => {},
            }
        }
    }

    fn paint_path(&mut self, builder: PathBuilder, gs: &GraphicsState, fill: Option<FillRule>, stroke: bool) {
        let Some(path) = builder.finish() else {
            return;
        };
        let transform = self.base.pre_concat(gs.ctm);

        if let Some(rule) = fill {
            let paint = solid_paint(gs.fill, gs.fill_alpha);
            self.pixmap.fill_path(&path, &paint, rule, transform, None);
        }
        if stroke {
            let paint = solid_paint(gs.stroke, gs.stroke_alpha);
            let stroke = Stroke {
                width: gs.line_width,
                line_cap: gs.line_cap,
                line_join: gs.line_join,
                ..Stroke::default()
            };
            self.pixmap.stroke_path(&path, &paint, &stroke, transform, None);
        }
    }

    /// Draw one box per shown character and advance the text matrix.
    fn show_text(&mut self, bytes: &[u8], gs: &GraphicsState, text: &mut TextPosition) {
        let size = gs.font_size;
        let char_width = size * 0.6;
        let visible = gs.render_mode != 3 && size != 0.0;

        let mut glyphs = PathBuilder::new();
        let mut x: f32 = 0.0;
        for &byte in bytes {
            if byte < 32 {
                continue;
            }
            let height = if byte.is_ascii_lowercase() {
                0.6
            } else if byte.is_ascii_uppercase() || byte.is_ascii_digit() {
                0.8
            } else {
                0.7
            };
            if visible && byte != b' ' {
                let (bottom, top) = (0.0f32.min(size * height), 0.0f32.max(size * height));
                let (left, right) = (x.min(x + char_width * 0.8), x.max(x + char_width * 0.8));
                if let Some(rect) = Rect::from_ltrb(left, bottom, right, top) {
                    glyphs.push_rect(rect);
                }
            }
            x += char_width + gs.char_space;
            if byte == b' ' {
                x += gs.word_space;
            }
        }

        if let Some(path) = glyphs.finish() {
            let transform = self.base.pre_concat(gs.ctm).pre_concat(text.matrix);
            let paint = solid_paint(gs.fill, gs.fill_alpha);
            self.pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
        }
        text.matrix = text.matrix.pre_translate(x, 0.0);
    }

    fn render_xobject(&mut self, name: &[u8], gs: &GraphicsState, resources: Option<&'a Dictionary>, depth: u32) {
        let Some(stream) = resources
            .and_then(|r| self.subdictionary(r, b"XObject"))
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|object| self.document.resolve(object))
            .and_then(|object| object.as_stream().ok())
        else {
            log::debug!("XObject /{} not found", String::from_utf8_lossy(name));
            return;
        };

        match stream.dict.get(b"Subtype") {
            Ok(Object::Name(subtype)) if subtype == b"Image" => self.render_image(stream, gs),
            Ok(Object::Name(subtype)) if subtype == b"Form" => self.render_form(stream, gs, resources, depth),
            _ => {},
        }
    }

    fn render_form(&mut self, form: &'a Stream, gs: &GraphicsState, parent: Option<&'a Dictionary>, depth: u32) {
        if depth >= MAX_FORM_DEPTH {
            log::debug!("Form XObjects nested deeper than {}, skipping", MAX_FORM_DEPTH);
            return;
        }
        let Some(operations) = stream_data(form).and_then(|data| Content::decode(&data).ok()) else {
            log::debug!("Skipping form XObject with unreadable content");
            return;
        };

        let form_matrix = form
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| m.as_array().ok())
            .and_then(|items| matrix(&items.iter().filter_map(number).collect::<Vec<_>>()))
            .unwrap_or_else(Transform::identity);
        let resources = self.subdictionary(&form.dict, b"Resources").or(parent);

        let mut inner = *gs;
        inner.ctm = gs.ctm.pre_concat(form_matrix);
        self.execute_operators(&operations.operations, resources, inner, depth + 1);
    }

    /// Draw an image XObject into the unit square of the current transform.
    fn render_image(&mut self, stream: &Stream, gs: &GraphicsState) {
        let Some(image) = self.decode_image_data(stream) else {
            log::debug!("Skipping image in unsupported encoding");
            return;
        };
        let (width, height) = (image.width() as f32, image.height() as f32);
        // Image row 0 is the top of the unit square.
        let unit_square = Transform::from_row(1.0 / width, 0.0, 0.0, -1.0 / height, 0.0, 1.0);
        let transform = self.base.pre_concat(gs.ctm).pre_concat(unit_square);
        let paint = PixmapPaint {
            opacity: gs.fill_alpha,
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, transform, None);
    }

    /// Decode 8-bit Gray/RGB/CMYK samples, or a baseline JPEG, to an opaque pixmap.
    fn decode_image_data(&self, stream: &Stream) -> Option<Pixmap> {
        let dict = &stream.dict;
        let filter = last_filter(dict);

        if filter.as_deref() == Some(b"DCTDecode".as_slice()) {
            let decoded = image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok()?;
            let rgba = decoded.to_rgba8();
            let size = IntSize::from_wh(rgba.width(), rgba.height())?;
            return Pixmap::from_vec(rgba.into_raw(), size);
        }
        if !matches!(filter.as_deref(), None | Some(b"FlateDecode")) {
            return None;
        }

        let width = dict.get(b"Width").ok().and_then(|o| self.document.number(o))? as u32;
        let height = dict.get(b"Height").ok().and_then(|o| self.document.number(o))? as u32;
        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| self.document.number(o))
            .unwrap_or(8.0);
        if bits != 8.0 {
            return None;
        }
        let components = self.color_components(dict.get(b"ColorSpace").ok()?)?;
        let data = stream_data(stream)?;
        let pixels = (width as usize).checked_mul(height as usize)?;
        if data.len() < pixels.checked_mul(components)? {
            return None;
        }

        let mut rgba = Vec::with_capacity(pixels * 4);
        for sample in data.chunks_exact(components).take(pixels) {
            let [r, g, b] = match sample {
                [gray] => [*gray; 3],
                [r, g, b] => [*r, *g, *b],
                [c, m, y, k] => {
                    let (r, g, b) = cmyk_to_rgb(unit(*c), unit(*m), unit(*y), unit(*k));
                    [to_byte(r), to_byte(g), to_byte(b)]
                },
                _ => return None,
            };
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
        Pixmap::from_vec(rgba, IntSize::from_wh(width, height)?)
    }

    /// Components per sample for device and ICC-based colour spaces.
    fn color_components(&self, space: &Object) -> Option<usize> {
        match self.document.resolve(space)? {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"G" | b"CalGray" => Some(1),
                b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(3),
                b"DeviceCMYK" | b"CMYK" => Some(4),
                _ => None,
            },
            Object::Array(items) => match items.as_slice() {
                [Object::Name(family), profile, ..] if family == b"ICCBased" => {
                    let stream = self.document.resolve(profile)?.as_stream().ok()?;
                    let n = stream.dict.get(b"N").ok().and_then(|o| self.document.number(o))? as usize;
                    matches!(n, 1 | 3 | 4).then_some(n)
                },
                _ => None,
            },
            _ => None,
        }
    }

    /// Apply fill/stroke alpha and line width from an `/ExtGState` entry.
    fn apply_ext_g_state(&self, gs: &mut GraphicsState, name: &[u8], resources: Option<&'a Dictionary>) {
        let Some(state) = resources
            .and_then(|r| self.subdictionary(r, b"ExtGState"))
            .and_then(|states| states.get(name).ok())
            .and_then(|object| self.document.resolve(object))
            .and_then(|object| object.as_dict().ok())
        else {
            return;
        };
        if let Some(alpha) = state.get(b"ca").ok().and_then(number) {
            gs.fill_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(alpha) = state.get(b"CA").ok().and_then(number) {
            gs.stroke_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(width) = state.get(b"LW").ok().and_then(number) {
            gs.line_width = width.abs();
        }
    }

    fn subdictionary(&self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        let object = dict.get(key).ok()?;
        self.document.resolve(object)?.as_dict().ok()
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

fn matrix(values: &[f32]) -> Option<Transform> {
    match values {
        [a, b, c, d, e, f] => Some(Transform::from_row(*a, *b, *c, *d, *e, *f)),
        _ => None,
    }
}

/// Gray, RGB or CMYK by operand count; pattern and named colours are ignored.
fn device_color(values: &[f32]) -> Option<Color> {
    let (r, g, b) = match values {
        [gray] => (*gray, *gray, *gray),
        [r, g, b] => (*r, *g, *b),
        [c, m, y, k] => cmyk_to_rgb(*c, *m, *y, *k),
        _ => return None,
    };
    Color::from_rgba(r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0), 1.0)
}

fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> (f32, f32, f32) {
    let r = (1.0 - c) * (1.0 - k);
    let g = (1.0 - m) * (1.0 - k);
    let b = (1.0 - y) * (1.0 - k);
    (r, g, b)
}

fn unit(sample: u8) -> f32 {
    sample as f32 / 255.0
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn solid_paint(color: Color, alpha: f32) -> Paint<'static> {
    let mut color = color;
    color.apply_opacity(alpha);
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

/// Name of the last filter in the chain, if any.
fn last_filter(dict: &Dictionary) -> Option<Vec<u8>> {
    match dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.clone()),
        Object::Array(items) => match items.last()? {
            Object::Name(name) => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Stream bytes with filters removed; raw bytes when unfiltered.
fn stream_data(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

fn to_rgb(pixmap: &Pixmap) -> RgbImage {
    let mut image = RgbImage::new(pixmap.width(), pixmap.height());
    for (target, source) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = source.demultiply();
        *target = Rgb([color.red(), color.green(), color.blue()]);
    }
    image
}

fn draw_frame(image: &mut RgbImage, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
            *pixel = color;
        }
    }
}
