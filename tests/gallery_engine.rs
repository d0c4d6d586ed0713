use std::time::{Duration, Instant};

use circular_gallery::config::ImageSource;
use circular_gallery::gallery::ease::lerp;
use circular_gallery::gallery::item::{MIN_OPACITY, MIN_SCALE, focus_opacity, focus_scale};
use circular_gallery::gallery::scroll::snap_to_item;
use circular_gallery::gallery::{
    CarouselEngine, Direction, EngineSettings, GalleryEntry, GalleryItem, ScreenSize, ViewportGeometry,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn three_item_engine(settings: EngineSettings, screen: ScreenSize) -> CarouselEngine {
    CarouselEngine::new(settings, GalleryEntry::placeholders(), screen)
}

#[test]
fn single_wheel_tick_snaps_back_after_debounce() {
    let t0 = Instant::now();
    let mut engine = three_item_engine(EngineSettings::default(), ScreenSize::new(1280, 720));
    assert_eq!(engine.items().len(), 6);

    engine.wheel(100.0, t0);
    assert!((engine.scroll().target - 0.075).abs() < 1e-6);
    assert!(engine.snap_pending());

    engine.frame(t0 + Duration::from_millis(50), |_| ());
    assert!((engine.scroll().target - 0.075).abs() < 1e-6);

    engine.frame(t0 + Duration::from_millis(100), |_| ());
    assert!(!engine.snap_pending());
    assert_eq!(engine.scroll().target, 0.0);
}

#[test]
fn wheel_activity_restarts_the_debounce() {
    let t0 = Instant::now();
    let mut engine = three_item_engine(EngineSettings::default(), ScreenSize::new(1280, 720));

    engine.wheel(30.0, t0);
    engine.wheel(5.0, t0 + Duration::from_millis(60));
    assert!((engine.scroll().target - 0.15).abs() < 1e-6);

    engine.frame(t0 + Duration::from_millis(120), |_| ());
    assert!((engine.scroll().target - 0.15).abs() < 1e-6);

    engine.frame(t0 + Duration::from_millis(160), |_| ());
    assert_eq!(engine.scroll().target, 0.0);
}

#[test]
fn zero_wheel_delta_is_ignored() {
    let mut engine = three_item_engine(EngineSettings::default(), ScreenSize::new(1280, 720));
    engine.wheel(0.0, Instant::now());
    assert_eq!(engine.scroll().target, 0.0);
    assert!(!engine.snap_pending());
}

#[test]
fn drag_then_release_settles_on_an_item() {
    let mut engine = three_item_engine(EngineSettings::default(), ScreenSize::new(1280, 720));
    let width = engine.item_width();

    engine.pointer_down(600.0);
    engine.pointer_move(300.0);
    assert!((engine.scroll().target - 300.0 * 0.003 * 1.5).abs() < 1e-5);
    engine.pointer_up();
    assert_eq!(engine.scroll().target, 0.0);

    // a long drag lands on a whole item
    engine.pointer_down(2000.0);
    engine.pointer_move(0.0);
    engine.pointer_up();
    let target = engine.scroll().target;
    assert!(((target / width).round() * width - target).abs() < 1e-4);
    assert_eq!((target / width).round(), (9.0 / width).round());

    let now = Instant::now();
    for _ in 0..400 {
        engine.frame(now, |_| ());
    }
    let centred = engine
        .items()
        .iter()
        .filter(|item| item.transform().x.abs() < 1e-3)
        .count();
    assert_eq!(centred, 1);
}

#[test]
fn wrap_invariant_holds_under_random_input() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..8 {
        let screen = ScreenSize::new(rng.random_range(320..2560), rng.random_range(240..1600));
        let settings = EngineSettings {
            scroll_ease: rng.random_range(0.02..1.0),
            ..EngineSettings::default()
        };
        let entries = (0..rng.random_range(1..6))
            .map(|n| GalleryEntry::new(ImageSource::Placeholder(n)))
            .collect();
        let mut engine = CarouselEngine::new(settings, entries, screen);
        let now = Instant::now();

        for _ in 0..300 {
            if rng.random_bool(0.1) {
                let jump = rng.random_range(-150.0..150.0);
                engine.set_target(engine.scroll().target + jump);
            }
            engine.frame(now, |view| {
                for item in view.items {
                    let current = view.scroll.current;
                    match view.direction {
                        Direction::Right => assert!(!item.is_before(current)),
                        Direction::Left => assert!(!item.is_after(current)),
                    }
                }
            });
        }
    }
}

#[test]
fn multi_ring_jump_resolves_in_one_frame() {
    let settings = EngineSettings {
        scroll_ease: 1.0,
        ..EngineSettings::default()
    };
    let mut engine = three_item_engine(settings, ScreenSize::new(1280, 720));
    let width = engine.item_width();
    let ring = engine.items()[0].ring_width();

    engine.set_target(ring * 10.0 + width * 0.25);
    engine.frame(Instant::now(), |view| assert_eq!(view.direction, Direction::Right));
    let current = engine.scroll().current;
    assert!(engine.items().iter().all(|item| !item.is_before(current)));
    assert!(engine.items().iter().all(|item| item.wraps() <= -9));

    let mut xs: Vec<f32> = engine.items().iter().map(|i| i.world_x(current)).collect();
    xs.sort_by(f32::total_cmp);
    for pair in xs.windows(2) {
        assert!((pair[1] - pair[0] - width).abs() < 1e-3, "{xs:?}");
    }

    // and back the other way
    engine.set_target(-ring * 7.0);
    engine.frame(Instant::now(), |view| assert_eq!(view.direction, Direction::Left));
    let current = engine.scroll().current;
    assert!(engine.items().iter().all(|item| !item.is_after(current)));
}

#[test]
fn snap_is_a_fixed_point() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..1000 {
        let width = rng.random_range(0.5..20.0_f32);
        let target = rng.random_range(-500.0..500.0_f32);
        let once = snap_to_item(target, width);
        assert!((once / width - (once / width).round()).abs() < 1e-3);
        assert!((once - target).abs() <= width / 2.0 + 1e-3);
        assert_eq!(snap_to_item(once, width), once);
    }
}

#[test]
fn easing_converges_without_overshoot() {
    for &ease in &[0.02_f32, 0.08, 0.5] {
        let target = 10.0;
        let mut current = 0.0;
        let frames = (12.0 / ease).ceil() as usize;
        for _ in 0..frames {
            let next = lerp(current, target, ease);
            assert!(next >= current);
            assert!(next <= target);
            current = next;
        }
        assert!((target - current).abs() < 1e-4, "ease {ease} ended at {current}");
    }
}

#[test]
fn focus_values_stay_clamped() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..1000 {
        let half = rng.random_range(0.1..50.0_f32);
        let distance = rng.random_range(0.0..200.0_f32);
        let s = focus_scale(distance, half);
        let o = focus_opacity(distance, half);
        assert!((MIN_SCALE..=1.0).contains(&s));
        assert!((MIN_OPACITY..=1.0).contains(&o));
    }
    assert_eq!(focus_scale(0.0, 3.0), 1.0);
    assert_eq!(focus_opacity(0.0, 3.0), 1.0);
}

#[test]
fn resize_is_a_pure_function_of_inputs() {
    let settings = EngineSettings::default();
    let target = ScreenSize::new(900, 700);
    let viewport = ViewportGeometry::compute(target, &settings.camera);

    let fresh = GalleryItem::new(4, 8, ImageSource::Placeholder(0), None, viewport);
    let mut reused = GalleryItem::new(
        4,
        8,
        ImageSource::Placeholder(0),
        None,
        ViewportGeometry::compute(ScreenSize::new(400, 300), &settings.camera),
    );
    reused.on_resize(ViewportGeometry::compute(ScreenSize::new(2000, 1000), &settings.camera));
    reused.on_resize(viewport);

    assert_eq!(fresh.item_width(), reused.item_width());
    assert_eq!(fresh.base_x(), reused.base_x());
    assert_eq!(fresh.ring_width(), reused.ring_width());

    let mut a = three_item_engine(settings, target);
    let mut b = three_item_engine(settings, ScreenSize::new(1600, 900));
    b.resize(target);
    a.resize(target);
    assert_eq!(a.item_width(), b.item_width());
}

#[test]
fn teardown_stops_frames_and_late_loads() {
    let mut engine = three_item_engine(EngineSettings::default(), ScreenSize::new(1280, 720));
    let requests = engine.load_requests();
    engine.wheel(100.0, Instant::now());
    engine.teardown();
    engine.teardown();

    assert!(!engine.is_alive());
    assert!(!engine.snap_pending());
    assert!(engine.frame(Instant::now(), |_| ()).is_none());
    for request in requests {
        assert!(!engine.apply_image(request.slot, request.generation, 64, 64));
    }
}
