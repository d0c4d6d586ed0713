use circular_gallery::config::{Configuration, GalleryItemConfig, ImageSource};
use circular_gallery::label::FontFamily;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn empty_document_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    assert!(cfg.items.is_empty());
    assert_eq!(cfg.text_color.rgba(), [255, 255, 255, 255]);
    assert!((cfg.border_radius - 0.05).abs() < f32::EPSILON);
    assert!((cfg.scroll_speed - 1.5).abs() < f32::EPSILON);
    assert!((cfg.scroll_ease - 0.08).abs() < f32::EPSILON);
    assert_eq!(cfg.snap_delay, Duration::from_millis(100));
    assert_eq!(cfg.font.size_px, 30.0);
    assert_eq!(cfg.font.weight, 700);
    assert_eq!(cfg.window.title, "Circular Gallery");
    assert_eq!(cfg.loader.max_concurrent_decodes, 4);
    assert_eq!(cfg.loader.max_texture_dim, 2048);
    assert_eq!(cfg, Configuration::default());
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r##"
items:
  - image: "file:///photos/bridge.jpg"
    text: "Bridge"
  - image: "placeholder:4"
text-color: "#ffcc00"
border-radius: 0.1
font: "italic 24px Figtree"
scroll-speed: 2.0
scroll-ease: 0.05
snap-delay: 250ms
camera:
  fov-degrees: 60
window:
  fullscreen: true
  background: "#101010"
loader:
  max-texture-dim: 1024
"##;
    let cfg = Configuration::from_yaml_str(yaml).unwrap().validated().unwrap();
    assert_eq!(
        cfg.items,
        vec![
            GalleryItemConfig {
                image: ImageSource::Path(PathBuf::from("/photos/bridge.jpg")),
                text: Some("Bridge".into()),
            },
            GalleryItemConfig {
                image: ImageSource::Placeholder(4),
                text: None,
            },
        ]
    );
    assert_eq!(cfg.text_color.rgba(), [255, 204, 0, 255]);
    assert!(cfg.font.italic);
    assert_eq!(cfg.font.family, FontFamily::Named("Figtree".into()));
    assert_eq!(cfg.snap_delay, Duration::from_millis(250));
    assert_eq!(cfg.camera.fov_degrees, 60.0);
    assert_eq!(cfg.camera.distance, 20.0);
    assert!(cfg.window.fullscreen);
    assert_eq!(cfg.loader.max_texture_dim, 1024);
    assert_eq!(cfg.loader.max_concurrent_decodes, 4);

    let settings = cfg.engine_settings();
    assert_eq!(settings.scroll_speed, 2.0);
    assert_eq!(settings.snap_delay, Duration::from_millis(250));
    assert_eq!(settings.camera.fov_degrees, 60.0);
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(Configuration::from_yaml_str("scroll-sped: 2.0").is_err());
    assert!(Configuration::from_yaml_str("camera:\n  zoom: 2").is_err());
}

#[test]
fn malformed_values_are_rejected() {
    assert!(Configuration::from_yaml_str("font: \"bold Figtree\"").is_err());
    assert!(Configuration::from_yaml_str("text-color: \"white\"").is_err());
    assert!(Configuration::from_yaml_str("items:\n  - image: \"placeholder:x\"").is_err());
}

#[test]
fn validation_enforces_ranges() {
    for yaml in [
        "border-radius: 0.6",
        "scroll-speed: 0",
        "scroll-ease: 0",
        "scroll-ease: 1.5",
        "camera:\n  fov-degrees: 0",
        "camera:\n  distance: -1",
        "loader:\n  max-concurrent-decodes: 0",
        "loader:\n  max-texture-dim: 0",
    ] {
        let cfg = Configuration::from_yaml_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "{yaml} should fail validation");
    }
    assert!(
        Configuration::from_yaml_str("scroll-ease: 1.0")
            .unwrap()
            .validated()
            .is_ok()
    );
}

#[test]
fn from_yaml_file_reads_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gallery.yaml");
    std::fs::write(&path, "scroll-speed: 3.0\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.scroll_speed, 3.0);
    assert!(Configuration::from_yaml_file(dir.path().join("missing.yaml")).is_err());
}

#[test]
fn effective_items_fall_back_in_order() {
    let cfg = Configuration::default();
    let items = cfg.effective_items().unwrap();
    assert_eq!(items, GalleryItemConfig::placeholders());

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("harbour.jpg"), b"").unwrap();
    let cfg = Configuration {
        library_path: Some(dir.path().to_path_buf()),
        ..Configuration::default()
    };
    let items = cfg.effective_items().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].text.as_deref(), Some("harbour"));

    let empty = tempfile::tempdir().unwrap();
    let cfg = Configuration {
        library_path: Some(empty.path().to_path_buf()),
        ..Configuration::default()
    };
    assert_eq!(cfg.effective_items().unwrap().len(), 3);

    let cfg = Configuration {
        items: vec![GalleryItemConfig {
            image: ImageSource::Placeholder(9),
            text: None,
        }],
        library_path: Some(dir.path().to_path_buf()),
        ..Configuration::default()
    };
    assert_eq!(cfg.effective_items().unwrap()[0].image, ImageSource::Placeholder(9));
}
