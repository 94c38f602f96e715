use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use overlay_composer::font::FontFace;
use overlay_composer::layout::layout;
use overlay_composer::wrap::wrap;
use overlay_composer::{
    Artifact, BackendKind, Canvas, Color, ComposeOptions, Compositor, FontCache, FontLoader,
    FontMetrics, FontRequest, OverlayError, TextSpec,
};

const BACKGROUND: Rgba<u8> = Rgba([40, 90, 160, 255]);

fn canvas(width: u32, height: u32) -> Canvas {
    Canvas::from_rgba(RgbaImage::from_pixel(width, height, BACKGROUND)).unwrap()
}

fn builtin_options() -> ComposeOptions {
    ComposeOptions {
        font_family: "builtin".to_string(),
        fallback_family: None,
        ..ComposeOptions::default()
    }
}

fn decode_png(artifact: &Artifact) -> RgbaImage {
    let Artifact::Png(bytes) = artifact else {
        panic!("expected png, got {}", artifact.mime());
    };
    image::load_from_memory(bytes).unwrap().to_rgba8()
}

struct CountingLoader {
    loads: AtomicUsize,
    fail: bool,
}

impl CountingLoader {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
            fail,
        })
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl FontLoader for CountingLoader {
    fn load(&self, request: &FontRequest<'_>) -> Result<FontFace, OverlayError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        if self.fail {
            return Err(OverlayError::FontUnavailable {
                family: request.family.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(FontFace::builtin())
    }
}

#[test]
fn hello_is_centered_and_outlined() {
    let compositor = Compositor::new(Arc::new(FontCache::new()));
    let artifact = compositor
        .compose(
            &canvas(800, 600),
            &TextSpec::new("Hello", Color::WHITE),
            BackendKind::RasterBuffer,
            &builtin_options(),
        )
        .unwrap();
    let image = decode_png(&artifact);
    assert_eq!(image.dimensions(), (800, 600));

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, pixel) in image.enumerate_pixels() {
        if *pixel != BACKGROUND {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    assert!(min_x <= max_x, "nothing was drawn");
    let center_x = (min_x + max_x) as f32 * 0.5;
    let center_y = (min_y + max_y) as f32 * 0.5;
    assert!((center_x - 400.0).abs() <= 1.5, "center x {}", center_x);
    // glyph boxes sit above the baseline, so the ink is centered on the box
    assert!((center_y - 298.0).abs() <= 1.5, "center y {}", center_y);

    // fill inside the first glyph, outline just left of it
    assert_eq!(*image.get_pixel(356, 298), Rgba([255, 255, 255, 255]));
    assert_eq!(*image.get_pixel(346, 298), Rgba([0, 0, 0, 255]));
}

#[test]
fn unbreakable_token_overflows_without_error() {
    let canvas = canvas(100, 100);
    let token = "x".repeat(60);
    let options = builtin_options();
    let spec = TextSpec::new(token.clone(), Color::WHITE);

    let size = options.font_size_for(&canvas, &spec);
    let metrics = FontMetrics::new(Arc::new(FontFace::builtin()), size);
    let wrapped = wrap(&token, 100.0 * options.max_text_width_fraction, &metrics);
    assert_eq!(wrapped.lines(), &[token.clone()]);
    let result = layout(&canvas, &wrapped, &metrics);
    assert!(result.bounds.width > 100.0);
    assert!(result.bounds.x < 0.0);
    let (cx, cy) = result.bounds.center();
    assert!((cx - 50.0).abs() <= 0.5);
    assert!((cy - 50.0).abs() <= 0.5);

    let compositor = Compositor::new(Arc::new(FontCache::new()));
    let artifact = compositor
        .compose(&canvas, &spec, BackendKind::RasterBuffer, &options)
        .unwrap();
    assert_eq!(decode_png(&artifact).dimensions(), (100, 100));
}

#[test]
fn failing_loader_yields_no_artifact() {
    let loader = CountingLoader::new(true);
    let compositor = Compositor::with_loader(Arc::new(FontCache::new()), loader.clone());
    let options = ComposeOptions {
        fallback_family: None,
        ..ComposeOptions::default()
    };
    for backend in [
        BackendKind::CssOverlay,
        BackendKind::RasterBuffer,
        BackendKind::DocumentPage,
    ] {
        let err = compositor
            .compose(
                &canvas(64, 64),
                &TextSpec::new("வணக்கம்", Color::WHITE),
                backend,
                &options,
            )
            .unwrap_err();
        assert!(err.is_font_unavailable(), "{:?}", err);
    }
    assert_eq!(loader.loads(), 3);
}

#[test]
fn identical_requests_produce_identical_bytes() {
    let cache = Arc::new(FontCache::new());
    let warm = Compositor::new(cache.clone());
    let cold = Compositor::new(Arc::new(FontCache::new()));
    let canvas = canvas(320, 180);
    let spec = TextSpec::new("Same input\nsame bytes", Color::rgb(255, 220, 0));
    for backend in [BackendKind::RasterBuffer, BackendKind::DocumentPage] {
        let first = warm
            .compose(&canvas, &spec, backend, &builtin_options())
            .unwrap();
        let second = warm
            .compose(&canvas, &spec, backend, &builtin_options())
            .unwrap();
        let third = cold
            .compose(&canvas, &spec, backend, &builtin_options())
            .unwrap();
        assert_eq!(first, second, "{} output differs on warm cache", backend);
        assert_eq!(first, third, "{} output differs across caches", backend);
    }
    assert_eq!(cache.len(), 1);
}

#[test]
fn empty_text_reencodes_canvas() {
    let source = RgbaImage::from_fn(24, 16, |x, y| Rgba([x as u8 * 10, y as u8 * 15, 77, 255]));
    let canvas = Canvas::from_rgba(source.clone()).unwrap();
    let compositor = Compositor::new(Arc::new(FontCache::new()));
    let artifact = compositor
        .compose(
            &canvas,
            &TextSpec::new("", Color::WHITE),
            BackendKind::RasterBuffer,
            &builtin_options(),
        )
        .unwrap();

    let mut expected = Vec::new();
    source
        .write_to(&mut Cursor::new(&mut expected), image::ImageFormat::Png)
        .unwrap();
    assert_eq!(artifact, Artifact::Png(expected));
    assert_eq!(decode_png(&artifact), source);
}

#[test]
fn concurrent_first_use_loads_font_once() {
    let loader = CountingLoader::new(false);
    let compositor = Arc::new(Compositor::with_loader(
        Arc::new(FontCache::new()),
        loader.clone(),
    ));
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let compositor = compositor.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                compositor
                    .compose(
                        &canvas(200, 100),
                        &TextSpec::new("race", Color::WHITE),
                        BackendKind::RasterBuffer,
                        &ComposeOptions::default(),
                    )
                    .unwrap()
            })
        })
        .collect();
    let outputs: Vec<Artifact> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(loader.loads(), 1);
    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn unknown_backend_is_rejected() {
    let err = "gif".parse::<BackendKind>().unwrap_err();
    assert_eq!(err, OverlayError::UnsupportedBackend("gif".to_string()));
}
