//! Effect pipeline scenarios across crates.

use std::sync::Arc;

use reelkit_cache::{FrameCache, MemoryCache, PlaybackSource};
use reelkit_core::{
    Fraction, FrameReader, ImageBuffer, Interpolation, Keyframe, PatternReader, SphericalMetadata,
    VideoFrame,
};
use reelkit_effects::{
    ColorMap, Deinterlace, Effect, EffectChain, EffectDef, EffectReader, LensFlare, Mask,
    MaskSource, Sharpen, SphericalProjection,
};

const IDENTITY_CUBE: &str = "\
TITLE \"identity\"
LUT_3D_SIZE 2
0.0 0.0 0.0
1.0 0.0 0.0
0.0 1.0 0.0
1.0 1.0 0.0
0.0 0.0 1.0
1.0 0.0 1.0
0.0 1.0 1.0
1.0 1.0 1.0
";

#[test]
fn color_map_intensity_zero_is_exact_identity() {
    let mut map = ColorMap::from_cube_str(IDENTITY_CUBE);
    assert!(!map.is_identity(), "LUT should have loaded");
    map.intensity = Keyframe::constant(0.0);

    let mut frame = VideoFrame::new(1, 4, 4);
    frame.image = ImageBuffer::filled(4, 4, [10, 20, 30, 255]);
    let out = map.apply(frame, 1);
    assert_eq!(out.image.pixel_clamped(0, 0), [10, 20, 30, 255]);
}

#[test]
fn spherical_yaw_and_invert_pick_expected_stripes() {
    // Equirectangular fixture: eight coloured longitude stripes
    let colors: [[u8; 4]; 8] = [
        [255, 0, 0, 255],
        [0, 255, 0, 255],
        [0, 0, 255, 255],
        [255, 255, 0, 255],
        [0, 255, 255, 255],
        [255, 0, 255, 255],
        [128, 128, 128, 255],
        [255, 255, 255, 255],
    ];
    let make_frame = || {
        let mut frame = VideoFrame::new(1, 256, 128);
        for y in 0..128 {
            for x in 0..256u32 {
                frame.image.set_pixel(x, y, colors[(x * 8 / 256).min(7) as usize]);
            }
        }
        frame
    };
    let centre = |frame: &VideoFrame| frame.image.pixel_clamped(128, 64);

    // Centre ray maps to source column u = yaw/360 · W
    let mut effect = SphericalProjection::default();
    effect.yaw = Keyframe::constant(45.0);
    let out = effect.apply(make_frame(), 1);
    assert_eq!(centre(&out), colors[1]);

    // Inverting at yaw 0 lands on the antipodal stripe
    let mut inverted = SphericalProjection::default();
    inverted.invert = true;
    let out = inverted.apply(make_frame(), 1);
    assert_eq!(centre(&out), colors[4]);
}

#[test]
fn every_effect_round_trips_through_json() {
    let mut sharpen = Sharpen::default();
    sharpen.amount.set(24, 16.5, Interpolation::Linear);

    let mut flare = LensFlare::default();
    flare.spread = Keyframe::constant(0.4);

    let mut mask = Mask::default();
    mask.source = MaskSource::Video {
        path: "wipe.mp4".to_string(),
    };

    let defs: Vec<EffectDef> = vec![
        EffectDef::ColorMap(ColorMap::default()),
        EffectDef::Sharpen(sharpen),
        EffectDef::SphericalProjection(SphericalProjection::default()),
        EffectDef::Deinterlace(Deinterlace::new(false)),
        EffectDef::Mask(mask),
        EffectDef::LensFlare(flare),
    ];

    for def in defs {
        let json = def.to_json();
        let back = EffectDef::from_json(&json).unwrap();
        assert_eq!(back.name(), def.name());
        // Round-trip must be stable: serialising again is identical
        assert_eq!(back.to_json(), json);
    }
}

#[test]
fn chain_applies_in_order_through_reader() {
    let reader = Arc::new(PatternReader::new(64, 32, Fraction::new(30, 1), 10));
    reader.open().unwrap();

    let mut chain = EffectChain::new();
    chain.push(EffectDef::Deinterlace(Deinterlace::default()));
    chain.push(EffectDef::LensFlare(LensFlare::default()));

    let wrapped: Arc<dyn FrameReader> = Arc::new(EffectReader::new(reader, chain));
    let frame = wrapped.frame(3).unwrap();
    assert_eq!(frame.number, 3);
    assert_eq!(frame.image.width(), 64);
    assert_eq!(frame.image.height(), 32);
}

#[test]
fn effect_reader_feeds_playback_source() {
    let inner = Arc::new(PatternReader::new(32, 16, Fraction::new(25, 1), 20));
    inner.open().unwrap();

    let mut chain = EffectChain::new();
    chain.push(EffectDef::Sharpen(Sharpen::default()));
    let reader: Arc<dyn FrameReader> = Arc::new(EffectReader::new(inner, chain));

    let cache = MemoryCache::shared(16 << 20, 32);
    let source = PlaybackSource::new(reader, Arc::clone(&cache) as Arc<dyn FrameCache>);

    let first = source.frame(5).unwrap();
    assert!(cache.contains(5), "rendered frame should be cached");
    let second = source.frame(5).unwrap();
    // Cache hit returns the very same rendered frame
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn spherical_metadata_travels_reader_info() {
    let reader = PatternReader::new(16, 8, Fraction::new(30, 1), 5)
        .with_metadata("spherical", "1")
        .with_metadata("spherical_projection", "equirectangular")
        .with_metadata("spherical_yaw", "45")
        .with_metadata("spherical_pitch", "-10")
        .with_metadata("spherical_roll", "0");
    reader.open().unwrap();

    let meta = SphericalMetadata::from_metadata(&reader.info().metadata).unwrap();
    assert_eq!(meta.projection, "equirectangular");
    assert_eq!(meta.yaw, 45.0);
    assert_eq!(meta.pitch, -10.0);
}

#[test]
fn malformed_effect_json_is_rejected() {
    let bogus = serde_json::json!({"type": "Sharpen", "amount": "loud"});
    assert!(EffectDef::from_json(&bogus).is_err());
}
