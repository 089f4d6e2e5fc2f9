//! Profile round-trips and ordering.

use reelkit_core::{Fraction, Profile};

fn uhd_2160p() -> Profile {
    Profile {
        description: "UHD 2160p 59.94 fps".to_string(),
        width: 3840,
        height: 2160,
        fps: Fraction::new(60000, 1001),
        display_ratio: Fraction::new(16, 9),
        pixel_ratio: Fraction::new(1, 1),
        interlaced: false,
        spherical: false,
    }
}

#[test]
fn json_round_trip_is_field_exact() {
    let mut profile = uhd_2160p();
    profile.spherical = true;

    let json = serde_json::to_value(&profile).unwrap();
    let back: Profile = serde_json::from_value(json).unwrap();

    assert_eq!(back.description, profile.description);
    assert_eq!(back.width, profile.width);
    assert_eq!(back.height, profile.height);
    assert_eq!(back.fps, profile.fps);
    assert_eq!(back.display_ratio, profile.display_ratio);
    assert_eq!(back.pixel_ratio, profile.pixel_ratio);
    assert_eq!(back.interlaced, profile.interlaced);
    assert_eq!(back.spherical, profile.spherical);
    assert_eq!(back.key(), profile.key());
}

#[test]
fn text_file_round_trip() {
    let profile = uhd_2160p();
    let text = profile.to_text();
    assert!(text.contains("frame_rate_num=60000"));
    assert!(text.contains("progressive=1"));
    assert!(text.contains("spherical=0"));

    let back = Profile::from_text(&text).unwrap();
    assert_eq!(back, profile);
    assert_eq!(back.description, profile.description);
}

#[test]
fn keys_are_canonical_and_sortable() {
    let uhd = uhd_2160p();
    assert_eq!(uhd.key(), "03840x2160p59.94_16-9");

    let mut hd = uhd_2160p();
    hd.width = 1280;
    hd.height = 720;
    hd.fps = Fraction::new(30, 1);
    assert!(hd < uhd);

    let mut profiles = vec![uhd.clone(), hd.clone()];
    profiles.sort();
    assert_eq!(profiles[0].key(), hd.key());
    assert_eq!(profiles[1].key(), uhd.key());
}

#[test]
fn interlaced_sorts_after_progressive() {
    let progressive = uhd_2160p();
    let mut interlaced = uhd_2160p();
    interlaced.interlaced = true;
    assert!(progressive < interlaced);
    assert!(interlaced.key().contains('i'));
}
